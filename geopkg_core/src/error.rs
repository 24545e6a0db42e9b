//! Error taxonomy shared by every geopkg crate.
//!
//! The taxonomy is deliberately closed: callers can match on the variant to
//! decide whether an input can be fixed (`Validation`, `Configuration`) or
//! whether the failure came from below (`Storage`, `Render`, `Io`). Validation
//! runs eagerly, before any persistent mutation, so a failed call never leaves
//! partial metadata behind.

use r2d2_sqlite::rusqlite;
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GeoPackageError>;

/// All failure modes of the container store and the pyramid generator.
#[derive(Debug, Error)]
pub enum GeoPackageError {
	/// Missing or invalid input: bounds, srid, geometry column, zoom
	/// ordering. Caller-fixable, never retried internally.
	#[error("validation failed: {0}")]
	Validation(String),

	/// No matching grid subset, inverted zoom range, or an otherwise
	/// unusable generation setup. Caller-fixable.
	#[error("configuration error: {0}")]
	Configuration(String),

	/// The underlying blob store reported a failure. Surfaced with the
	/// original cause, not retried automatically.
	#[error("storage error: {0}")]
	Storage(#[from] rusqlite::Error),

	/// A pooled connection could not be acquired.
	#[error("connection pool error: {0}")]
	Pool(#[from] r2d2::Error),

	/// A tile render call failed; aborts the enclosing generation run.
	#[error("tile render failed: {0}")]
	Render(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// Encoding or decoding a raster blob failed.
	#[error("raster codec error: {0}")]
	Codec(String),

	/// Filesystem-level failure around the container file.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl GeoPackageError {
	/// Shorthand for a [`GeoPackageError::Validation`] with a formatted message.
	pub fn validation(msg: impl Into<String>) -> GeoPackageError {
		GeoPackageError::Validation(msg.into())
	}

	/// Shorthand for a [`GeoPackageError::Configuration`] with a formatted message.
	pub fn configuration(msg: impl Into<String>) -> GeoPackageError {
		GeoPackageError::Configuration(msg.into())
	}

	/// Wraps an arbitrary renderer failure.
	pub fn render(err: impl std::error::Error + Send + Sync + 'static) -> GeoPackageError {
		GeoPackageError::Render(Box::new(err))
	}

	/// True when the caller can fix the input and retry.
	pub fn is_caller_fixable(&self) -> bool {
		matches!(
			self,
			GeoPackageError::Validation(_) | GeoPackageError::Configuration(_)
		)
	}
}

/// Fails with [`GeoPackageError::Validation`] unless the condition holds.
#[macro_export]
macro_rules! ensure_valid {
	($cond:expr, $($arg:tt)*) => {
		if !$cond {
			return Err($crate::GeoPackageError::Validation(format!($($arg)*)));
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caller_fixable_classification() {
		assert!(GeoPackageError::validation("no bounds").is_caller_fixable());
		assert!(GeoPackageError::configuration("no grid").is_caller_fixable());
		assert!(!GeoPackageError::Io(std::io::Error::other("boom")).is_caller_fixable());
	}

	#[test]
	fn display_includes_context() {
		let err = GeoPackageError::validation("entry 'roads' must have bounds");
		assert_eq!(err.to_string(), "validation failed: entry 'roads' must have bounds");
	}
}
