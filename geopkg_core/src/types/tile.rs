use std::fmt::Debug;

/// One encoded tile addressed by `(zoom, column, row)` within a pyramid.
///
/// The payload is opaque to the store; whatever the renderer encoded is
/// written back out byte for byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Tile {
	pub zoom: u8,
	pub column: u32,
	pub row: u32,
	pub data: Vec<u8>,
}

impl Tile {
	pub fn new(zoom: u8, column: u32, row: u32, data: Vec<u8>) -> Tile {
		Tile {
			zoom,
			column,
			row,
			data,
		}
	}
}

impl Debug for Tile {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tile")
			.field("zoom", &self.zoom)
			.field("column", &self.column)
			.field("row", &self.row)
			.field("data_len", &self.data.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debug_hides_payload() {
		let tile = Tile::new(3, 5, 2, vec![0u8; 4096]);
		assert_eq!(
			format!("{tile:?}"),
			"Tile { zoom: 3, column: 5, row: 2, data_len: 4096 }"
		);
	}
}
