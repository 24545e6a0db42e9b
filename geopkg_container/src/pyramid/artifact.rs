use std::{
	fs::{self, File},
	io::{self, Read},
	path::{Path, PathBuf},
};

/// A finished pyramid container handed to the caller as a byte stream.
///
/// The artifact reads the backing file front to back exactly once. Once the
/// stream has been fully consumed the file is treated as temporary and is
/// deleted when the artifact drops; a partially read artifact leaves the
/// file in place. Deletion failures are logged, not surfaced.
pub struct PyramidArtifact {
	path: PathBuf,
	file: Option<File>,
	fully_streamed: bool,
	preserved: bool,
}

impl PyramidArtifact {
	pub(crate) fn new(path: PathBuf) -> PyramidArtifact {
		PyramidArtifact {
			path,
			file: None,
			fully_streamed: false,
			preserved: false,
		}
	}

	/// The backing container file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Gives up streaming and keeps the file; the caller owns it from here.
	pub fn into_path(mut self) -> PathBuf {
		self.preserved = true;
		self.path.clone()
	}
}

impl Read for PyramidArtifact {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.file.is_none() {
			self.file = Some(File::open(&self.path)?);
		}
		let n = self.file.as_mut().map_or(Ok(0), |f| f.read(buf))?;
		if n == 0 && !buf.is_empty() {
			self.fully_streamed = true;
		}
		Ok(n)
	}
}

impl Drop for PyramidArtifact {
	fn drop(&mut self) {
		if self.fully_streamed && !self.preserved {
			self.file.take();
			if let Err(e) = fs::remove_file(&self.path) {
				log::warn!("could not delete streamed pyramid file {:?}: {e}", self.path);
			}
		}
	}
}

impl std::fmt::Debug for PyramidArtifact {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PyramidArtifact")
			.field("path", &self.path)
			.field("fully_streamed", &self.fully_streamed)
			.finish()
	}
}
