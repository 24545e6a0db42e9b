use geopkg_core::RasterFormat;

/// Configuration for one pyramid generation run.
///
/// Every field has a documented default; an all-default options value
/// generates a PNG pyramid on the grid matching the map's reference system,
/// with the zoom range resolved from the request scale and tile counts.
#[derive(Clone, Debug)]
pub struct PyramidOptions {
	/// Encoding the renderer is asked to produce. Default: PNG.
	pub format: RasterFormat,
	/// Explicit grid set to tile against; overrides srid and layer based
	/// grid resolution.
	pub grid_name: Option<String>,
	/// Lowest zoom level; default is the level whose scale is closest to
	/// the request scale.
	pub min_zoom: Option<u8>,
	/// Highest zoom level; default is `min_zoom + num_zooms` when
	/// `num_zooms` is set, otherwise an auto-search bounded by the
	/// cumulative tile ceiling.
	pub max_zoom: Option<u8>,
	/// Number of levels above `min_zoom`; ignored when `max_zoom` is set.
	pub num_zooms: Option<u8>,
	/// Store rows counted from the northern edge instead of the southern.
	pub flip_y: bool,
	/// Memory budget in bytes the generation loop may assume; drives how
	/// often the renderer's reclamation hook runs. Default: 256 MiB.
	pub memory_budget: usize,
	/// Name of the tile table in the produced container. Default: `tiles`.
	pub table_name: Option<String>,
}

impl Default for PyramidOptions {
	fn default() -> Self {
		PyramidOptions {
			format: RasterFormat::Png,
			grid_name: None,
			min_zoom: None,
			max_zoom: None,
			num_zooms: None,
			flip_y: false,
			memory_budget: 256 * 1024 * 1024,
			table_name: None,
		}
	}
}
