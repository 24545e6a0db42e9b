//! Raster image values and the codec seam.
//!
//! The store persists rasters as opaque encoded blobs; encoding and decoding
//! go through the [`RasterCodec`] trait so the surrounding system can plug in
//! its own pipeline. [`ImageCodec`] is the default implementation backed by
//! the `image` crate.

use crate::{Bounds, Crs, GeoPackageError, Result};
use image::DynamicImage;
use std::io::Cursor;

/// Encoding used for raster blobs and generated tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterFormat {
	Png,
	Jpeg,
}

impl RasterFormat {
	pub fn as_str(&self) -> &'static str {
		match self {
			RasterFormat::Png => "png",
			RasterFormat::Jpeg => "jpeg",
		}
	}

	pub fn mime_type(&self) -> &'static str {
		match self {
			RasterFormat::Png => "image/png",
			RasterFormat::Jpeg => "image/jpeg",
		}
	}

	fn image_format(&self) -> image::ImageFormat {
		match self {
			RasterFormat::Png => image::ImageFormat::Png,
			RasterFormat::Jpeg => image::ImageFormat::Jpeg,
		}
	}
}

/// A decoded raster with the georeferencing the manager derives entry
/// metadata from.
#[derive(Clone, Debug)]
pub struct RasterImage {
	pub name: Option<String>,
	pub bounds: Option<Bounds>,
	pub crs: Option<Crs>,
	pub image: DynamicImage,
}

impl RasterImage {
	pub fn new(image: DynamicImage) -> RasterImage {
		RasterImage {
			name: None,
			bounds: None,
			crs: None,
			image,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> RasterImage {
		self.name = Some(name.into());
		self
	}

	pub fn with_bounds(mut self, bounds: Bounds) -> RasterImage {
		self.bounds = Some(bounds);
		self
	}

	pub fn with_crs(mut self, crs: Crs) -> RasterImage {
		self.crs = Some(crs);
		self
	}
}

/// Hints handed to the codec when reading a stored raster back; carries the
/// entry bounds so a decoder can re-georeference the image.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeHints {
	pub bounds: Option<Bounds>,
}

/// Codec seam between the store and the external rendering stack.
pub trait RasterCodec: Send + Sync {
	fn encode(&self, raster: &RasterImage, format: RasterFormat) -> Result<Vec<u8>>;

	fn decode(&self, data: &[u8], format: RasterFormat, hints: &DecodeHints) -> Result<RasterImage>;
}

/// Default codec backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCodec;

impl RasterCodec for ImageCodec {
	fn encode(&self, raster: &RasterImage, format: RasterFormat) -> Result<Vec<u8>> {
		let mut buffer = Cursor::new(Vec::new());
		// JPEG has no alpha channel; flatten before encoding.
		let result = match (format, &raster.image) {
			(RasterFormat::Jpeg, image) => DynamicImage::from(image.to_rgb8()).write_to(&mut buffer, format.image_format()),
			(RasterFormat::Png, image) => image.write_to(&mut buffer, format.image_format()),
		};
		result.map_err(|e| GeoPackageError::Codec(format!("encoding {} failed: {e}", format.as_str())))?;
		Ok(buffer.into_inner())
	}

	fn decode(&self, data: &[u8], format: RasterFormat, hints: &DecodeHints) -> Result<RasterImage> {
		let image = image::load_from_memory_with_format(data, format.image_format())
			.map_err(|e| GeoPackageError::Codec(format!("decoding {} failed: {e}", format.as_str())))?;
		let mut raster = RasterImage::new(image);
		raster.bounds = hints.bounds;
		Ok(raster)
	}
}
