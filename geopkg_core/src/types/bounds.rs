use crate::{Result, ensure_valid};
use std::fmt::Debug;

/// A rectangular extent in the ground units of some coordinate reference
/// system.
///
/// Unlike a geographic bounding box this type is not limited to degree
/// ranges: a `Bounds` in a projected CRS can span millions of meters. The
/// checked constructor only enforces that all four values are finite and
/// that minima do not exceed maxima.
///
/// # Examples
/// ```
/// use geopkg_core::Bounds;
///
/// let bounds = Bounds::new(-10.0, -5.0, 10.0, 5.0).unwrap();
/// assert_eq!(bounds.width(), 20.0);
/// assert_eq!(bounds.height(), 10.0);
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct Bounds {
	pub min_x: f64,
	pub min_y: f64,
	pub max_x: f64,
	pub max_y: f64,
}

impl Bounds {
	/// Creates a checked `Bounds` from `min_x, min_y, max_x, max_y`.
	pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Bounds> {
		let bounds = Bounds {
			min_x,
			min_y,
			max_x,
			max_y,
		};
		bounds.checked()
	}

	fn checked(self) -> Result<Self> {
		ensure_valid!(
			self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite(),
			"bounds must be finite, got {self:?}"
		);
		ensure_valid!(
			self.min_x <= self.max_x,
			"min_x ({}) must be <= max_x ({})",
			self.min_x,
			self.max_x
		);
		ensure_valid!(
			self.min_y <= self.max_y,
			"min_y ({}) must be <= max_y ({})",
			self.min_y,
			self.max_y
		);
		Ok(self)
	}

	pub fn width(&self) -> f64 {
		self.max_x - self.min_x
	}

	pub fn height(&self) -> f64 {
		self.max_y - self.min_y
	}

	/// Expands `self` in place so that it also covers `other`.
	pub fn extend(&mut self, other: &Bounds) {
		self.min_x = self.min_x.min(other.min_x);
		self.min_y = self.min_y.min(other.min_y);
		self.max_x = self.max_x.max(other.max_x);
		self.max_y = self.max_y.max(other.max_y);
	}

	/// Shrinks `self` in place to the overlap with `other`. The result may
	/// be inverted when the two extents do not overlap; check with
	/// [`Bounds::is_empty`].
	pub fn intersect(&mut self, other: &Bounds) {
		self.min_x = self.min_x.max(other.min_x);
		self.min_y = self.min_y.max(other.min_y);
		self.max_x = self.max_x.min(other.max_x);
		self.max_y = self.max_y.min(other.max_y);
	}

	/// Non-mutating version of [`Bounds::intersect`].
	#[must_use]
	pub fn intersected(mut self, other: &Bounds) -> Bounds {
		self.intersect(other);
		self
	}

	/// True when the extent covers no area (also after a disjoint
	/// intersection).
	pub fn is_empty(&self) -> bool {
		self.min_x >= self.max_x || self.min_y >= self.max_y
	}

	/// Returns the four values in the order `[min_x, min_y, max_x, max_y]`.
	pub fn as_array(&self) -> [f64; 4] {
		[self.min_x, self.min_y, self.max_x, self.max_y]
	}

	/// Component-wise comparison within `tolerance`, for round-trip tests
	/// against values that passed through the database.
	pub fn approx_eq(&self, other: &Bounds, tolerance: f64) -> bool {
		self
			.as_array()
			.iter()
			.zip(other.as_array().iter())
			.all(|(a, b)| (a - b).abs() <= tolerance)
	}
}

impl Debug for Bounds {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"Bounds({}, {}, {}, {})",
			self.min_x, self.min_y, self.max_x, self.max_y
		)
	}
}

impl TryFrom<[f64; 4]> for Bounds {
	type Error = crate::GeoPackageError;

	fn try_from(input: [f64; 4]) -> Result<Self> {
		Bounds::new(input[0], input[1], input[2], input[3])
	}
}
