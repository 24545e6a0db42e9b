//! Seam to the external map renderer.

use crate::{Bounds, Crs, RasterFormat, Result};

/// One render call: produce an encoded image covering `bounds` at the given
/// pixel dimensions.
#[derive(Clone, Debug)]
pub struct RenderRequest {
	pub bounds: Bounds,
	pub width: u32,
	pub height: u32,
	pub crs: Crs,
	pub format: RasterFormat,
}

/// The rendering pipeline as the pyramid generator sees it: a synchronous
/// call that returns encoded tile bytes, plus a memory-reclamation hook the
/// generator invokes periodically between tiles.
pub trait TileRenderer {
	fn render(&self, request: &RenderRequest) -> Result<Vec<u8>>;

	/// Invoked after a configured number of tiles to let the rendering stack
	/// release per-image buffers. The default does nothing.
	fn reclaim(&self) {}
}

/// Description of the source map a pyramid is generated from.
#[derive(Clone, Debug)]
pub struct MapRequest {
	pub title: String,
	pub layers: Vec<String>,
	pub bounds: Bounds,
	pub crs: Crs,
	/// Requested output width in pixels; used to derive the request scale
	/// for zoom resolution.
	pub width: u32,
	pub height: u32,
}

impl MapRequest {
	/// The OGC scale denominator of this request, assuming the standard
	/// 0.28 mm pixel. `meters_per_unit` converts the map's CRS units.
	pub fn scale_denominator(&self, meters_per_unit: f64) -> f64 {
		let pixel_size = self.bounds.width() / f64::from(self.width);
		pixel_size * meters_per_unit / 0.000_28
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scale_denominator_uses_ogc_pixel() {
		let request = MapRequest {
			title: String::from("test"),
			layers: vec![],
			bounds: Bounds::new(0.0, 0.0, 28_000.0, 28_000.0).unwrap(),
			crs: Crs::new(3857, "WGS 84 / Pseudo-Mercator"),
			width: 1000,
			height: 1000,
		};
		// 28 m/pixel at 1 m per unit -> 1:100000
		assert!((request.scale_denominator(1.0) - 100_000.0).abs() < 1e-6);
	}
}
