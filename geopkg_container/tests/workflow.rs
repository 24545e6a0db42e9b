//! End-to-end workflow over one container file: vector, raster and tile
//! datasets side by side, plus a generated pyramid streamed back out.

use assert_fs::TempDir;
use assert_fs::prelude::*;
use geopkg_container::{GeoPackage, PyramidGenerator, PyramidOptions, TileQuery, WriteMode};
use geopkg_core::{
	Attribute, AttributeType, Bounds, Crs, CrsEngine, DataType, EpsgRegistry, Feature, FeatureEntrySpec, GeometryType,
	GridRegistry, ImageCodec, MapRequest, RasterCodec, RasterEntrySpec, RasterFormat, RasterImage, RenderRequest,
	Result, Schema, TileRenderer, Value,
};
use image::{DynamicImage, RgbaImage};
use std::{io::Read, sync::Arc};

fn engine() -> Arc<dyn CrsEngine> {
	Arc::new(EpsgRegistry::new())
}

struct SolidRenderer;

impl TileRenderer for SolidRenderer {
	fn render(&self, request: &RenderRequest) -> Result<Vec<u8>> {
		let image = RgbaImage::from_pixel(request.width, request.height, image::Rgba([0, 128, 255, 255]));
		ImageCodec.encode(&RasterImage::new(DynamicImage::ImageRgba8(image)), request.format)
	}
}

fn points_schema() -> Schema {
	Schema::new(
		"places",
		vec![
			Attribute {
				name: String::from("name"),
				attr_type: AttributeType::Text,
			},
			Attribute {
				name: String::from("geom"),
				attr_type: AttributeType::Geometry(GeometryType::Point, 2),
			},
		],
		Some(Crs::new(4326, "WGS 84")),
	)
	.unwrap()
}

#[test]
fn mixed_datasets_in_one_container() -> Result<()> {
	let dir = TempDir::new().unwrap();
	let path = dir.child("mixed.gpkg");
	let geopkg = GeoPackage::create(path.path(), engine())?;

	// vector dataset
	let entry = geopkg.feature_store().create(
		FeatureEntrySpec {
			bounds: Some(Bounds::new(-10.0, -10.0, 10.0, 10.0)?),
			..FeatureEntrySpec::default()
		},
		&points_schema(),
	)?;
	let mut writer = geopkg.feature_store().writer(&entry, WriteMode::Append)?;
	writer.write(&Feature::new(vec![
		Value::Text(String::from("origin")),
		Value::Geometry(vec![1, 2, 3, 4]),
	]))?;
	writer.finish()?;

	// raster dataset
	let raster = RasterImage::new(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)))
		.with_name("overview")
		.with_bounds(Bounds::new(0.0, 0.0, 8.0, 8.0)?)
		.with_crs(Crs::new(4326, "WGS 84"));
	geopkg.add_raster(RasterEntrySpec::default(), &raster, RasterFormat::Png, &ImageCodec)?;

	geopkg.close();

	// everything is still there after reopening
	let reopened = GeoPackage::open(path.path(), engine())?;
	assert_eq!(reopened.contents()?.len(), 2);
	assert_eq!(reopened.list(DataType::Feature)?.len(), 1);
	assert_eq!(reopened.list(DataType::Raster)?.len(), 1);

	let places = reopened.find("places")?.unwrap();
	let features: Vec<Feature> = reopened.feature_store().reader(&places, None)?.collect::<Result<_>>()?;
	assert_eq!(features.len(), 1);
	assert_eq!(features[0].values[1], Value::Geometry(vec![1, 2, 3, 4]));
	Ok(())
}

#[test]
fn generated_pyramid_streams_and_cleans_up() -> Result<()> {
	let dir = TempDir::new().unwrap();
	let path = dir.child("pyramid.gpkg");

	let generator = PyramidGenerator::new(
		SolidRenderer,
		Arc::new(GridRegistry::default()),
		engine(),
		PyramidOptions {
			min_zoom: Some(0),
			num_zooms: Some(1),
			..PyramidOptions::default()
		},
	);
	let e = 20_037_508.342_789_244;
	let request = MapRequest {
		title: String::from("ocean"),
		layers: vec![],
		bounds: Bounds::new(-e, -e, e, e)?,
		crs: Crs::new(3857, "WGS 84 / Pseudo-Mercator"),
		width: 512,
		height: 512,
	};

	let mut artifact = generator.generate(&request, path.path())?;

	// the file is a valid container before streaming
	{
		let geopkg = GeoPackage::open(path.path(), engine())?;
		let entry = geopkg.list(DataType::Tile)?.remove(0);
		assert_eq!(geopkg.tile_reader(&entry, TileQuery::at_zoom(0))?.count(), 1);
		assert_eq!(geopkg.tile_reader(&entry, TileQuery::at_zoom(1))?.count(), 4);
	}

	// streaming to the end consumes and deletes the temporary file
	let mut bytes = Vec::new();
	artifact.read_to_end(&mut bytes)?;
	assert_eq!(&bytes[0..15], b"SQLite format 3");
	drop(artifact);
	assert!(!path.path().exists());
	Ok(())
}
