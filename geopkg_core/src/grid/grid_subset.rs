use super::{GridLevel, GridSet};
use crate::{Bounds, Result, TileMatrix};

/// An inclusive rectangle of tile indices at one zoom level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
	pub col_min: u32,
	pub row_min: u32,
	pub col_max: u32,
	pub row_max: u32,
}

impl TileRect {
	pub fn count(&self) -> u64 {
		u64::from(self.col_max - self.col_min + 1) * u64::from(self.row_max - self.row_min + 1)
	}

	/// Iterates the contained `(column, row)` pairs row-major: all columns of
	/// the lowest row first.
	pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
		(self.row_min..=self.row_max).flat_map(move |row| (self.col_min..=self.col_max).map(move |col| (col, row)))
	}
}

/// A bounded instantiation of a [`GridSet`], usable for pyramid generation.
///
/// The subset restricts the grid to a coverage extent; tile indices outside
/// the coverage are never produced.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSubset {
	grid_set: GridSet,
	coverage: Bounds,
}

impl GridSubset {
	/// A subset covering the grid's full extent.
	pub fn covering(grid_set: GridSet) -> GridSubset {
		let coverage = grid_set.extent;
		GridSubset { grid_set, coverage }
	}

	/// A subset restricted to the part of `coverage` inside the grid extent.
	pub fn restricted(grid_set: GridSet, coverage: &Bounds) -> GridSubset {
		let coverage = grid_set.extent.intersected(coverage);
		GridSubset { grid_set, coverage }
	}

	pub fn grid_set(&self) -> &GridSet {
		&self.grid_set
	}

	pub fn name(&self) -> &str {
		&self.grid_set.name
	}

	pub fn srid(&self) -> i32 {
		self.grid_set.srid
	}

	pub fn tile_width(&self) -> u32 {
		self.grid_set.tile_width
	}

	pub fn tile_height(&self) -> u32 {
		self.grid_set.tile_height
	}

	pub fn num_levels(&self) -> u8 {
		self.grid_set.num_levels()
	}

	pub fn level(&self, zoom: u8) -> Result<&GridLevel> {
		self.grid_set.level(zoom)
	}

	/// Number of tile rows at a zoom level, for row flipping.
	pub fn tiles_high(&self, zoom: u8) -> Result<u32> {
		Ok(self.level(zoom)?.matrix_height)
	}

	/// Ground extent of one tile. Rows count from the southern edge.
	pub fn tile_bounds(&self, zoom: u8, column: u32, row: u32) -> Result<Bounds> {
		let level = self.level(zoom)?;
		let extent = &self.grid_set.extent;
		let span_x = level.pixel_size * f64::from(self.grid_set.tile_width);
		let span_y = level.pixel_size * f64::from(self.grid_set.tile_height);

		Bounds::new(
			extent.min_x + f64::from(column) * span_x,
			extent.min_y + f64::from(row) * span_y,
			extent.min_x + f64::from(column + 1) * span_x,
			extent.min_y + f64::from(row + 1) * span_y,
		)
	}

	/// The tile-index rectangle at `zoom` intersecting both `bounds` and the
	/// subset's coverage, or `None` when they are disjoint.
	pub fn coverage_intersection(&self, zoom: u8, bounds: &Bounds) -> Result<Option<TileRect>> {
		let level = self.level(zoom)?;
		let clipped = self.coverage.intersected(bounds);
		if clipped.is_empty() {
			return Ok(None);
		}

		let extent = &self.grid_set.extent;
		let span_x = level.pixel_size * f64::from(self.grid_set.tile_width);
		let span_y = level.pixel_size * f64::from(self.grid_set.tile_height);

		let to_index = |value: f64, origin: f64, span: f64, max: u32| -> u32 {
			(((value - origin) / span).floor().max(0.0) as u32).min(max)
		};
		let max_col = level.matrix_width - 1;
		let max_row = level.matrix_height - 1;

		// A max edge exactly on a tile boundary belongs to the previous tile.
		// For bounds thinner than the shave the max index is clamped to the
		// min index so the rect never inverts.
		let epsilon = span_x * 1e-9;
		let col_min = to_index(clipped.min_x, extent.min_x, span_x, max_col);
		let row_min = to_index(clipped.min_y, extent.min_y, span_y, max_row);
		Ok(Some(TileRect {
			col_min,
			row_min,
			col_max: to_index(clipped.max_x - epsilon, extent.min_x, span_x, max_col).max(col_min),
			row_max: to_index(clipped.max_y - epsilon, extent.min_y, span_y, max_row).max(row_min),
		}))
	}

	/// The tile matrix row describing one level of this subset, as persisted
	/// in the tile-matrix metadata table.
	pub fn matrix(&self, zoom: u8) -> Result<TileMatrix> {
		let level = self.level(zoom)?;
		TileMatrix::new(
			zoom,
			level.matrix_width,
			level.matrix_height,
			self.grid_set.tile_width,
			self.grid_set.tile_height,
			level.pixel_size,
			level.pixel_size,
		)
	}

	/// The ordered matrices for an inclusive zoom range.
	pub fn matrices(&self, min_zoom: u8, max_zoom: u8) -> Result<Vec<TileMatrix>> {
		(min_zoom..=max_zoom).map(|z| self.matrix(z)).collect()
	}
}
