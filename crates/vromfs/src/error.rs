//! Error type shared by the container and image engines.

use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Convenience return type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Combined error type for both archive layers.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum Error {
	/// Structural damage: unknown magic or tags, misplaced tables, trailer of
	/// an impossible length.
	#[error("malformed archive: {reason}")]
	#[diagnostic(code(vromfs::format))]
	Format {
		/// What the parser tripped on.
		reason: String,
	},

	/// The zstd layer refused a payload.
	#[error("zstd codec failure")]
	#[diagnostic(code(vromfs::decompression))]
	Decompression {
		/// Failure as surfaced by the zstd crate.
		#[source]
		source: io::Error,
	},

	/// A digest comparison failed during an explicit verification.
	#[error("digest mismatch for {subject}")]
	#[diagnostic(code(vromfs::integrity))]
	Integrity {
		/// What failed to verify.
		subject: String,
	},

	/// The caller asked for an impossible combination or passed a bad value.
	#[error("invalid argument: {reason}")]
	#[diagnostic(code(vromfs::invalid_argument))]
	InvalidArgument {
		/// Why the arguments were refused.
		reason: String,
	},

	/// Lookup by path found nothing. Distinct from any I/O failure.
	#[error("no entry {path:?} in the image")]
	#[diagnostic(code(vromfs::not_found))]
	NotFound {
		/// The path that was asked for.
		path: PathBuf,
	},

	/// Backing source or sink failure.
	#[error(transparent)]
	Io(io::Error),

	/// Operation the engine cannot honour, such as an end-relative seek on a
	/// compressed payload stream.
	#[error("unsupported operation: {reason}")]
	#[diagnostic(code(vromfs::unsupported))]
	Unsupported {
		/// The refused operation.
		reason: String,
	},
}

impl Error {
	pub(crate) fn format(reason: impl Into<String>) -> Self {
		Self::Format {
			reason: reason.into(),
		}
	}

	pub(crate) fn invalid(reason: impl Into<String>) -> Self {
		Self::InvalidArgument {
			reason: reason.into(),
		}
	}

	pub(crate) fn not_found(path: impl Into<PathBuf>) -> Self {
		Self::NotFound { path: path.into() }
	}

	pub(crate) fn decompression(source: io::Error) -> Self {
		Self::Decompression { source }
	}

	/// Remap end-of-file from a header read into a format error; headers are
	/// fixed-size, so running dry mid-record means the archive is cut short.
	pub(crate) fn truncated(what: &str) -> impl FnOnce(io::Error) -> Self + '_ {
		move |err| {
			if err.kind() == io::ErrorKind::UnexpectedEof {
				Self::format(format!("truncated {what}"))
			} else {
				Self::Io(err)
			}
		}
	}
}

impl From<io::Error> for Error {
	fn from(err: io::Error) -> Self {
		if err.kind() == io::ErrorKind::Unsupported {
			Self::Unsupported {
				reason: err.to_string(),
			}
		} else {
			Self::Io(err)
		}
	}
}
