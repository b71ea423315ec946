//! Error types shared by every Tessera executor
//!
//! Errors fall into three groups:
//! - argument errors (unsupported entity types, missing identifiers,
//!   malformed parameter bindings, result shapes that do not fit the target),
//!   raised before any driver call
//! - driver errors, wrapped verbatim and never reinterpreted
//! - task errors raised when an async handle is observed

use thiserror::Error;

/// Result type for Tessera operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Tessera operations
#[derive(Debug, Error)]
pub enum Error {
	/// The entity type cannot be mapped (not a struct or a string-keyed map)
	#[error("Unsupported type: {0}")]
	UnsupportedType(String),

	/// The entity has no identifier property, or its identifier is empty
	#[error("Missing id property on entity: {entity}")]
	MissingId { entity: String },

	/// A caller supplied argument is invalid (e.g. a parameter binding)
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// A value or result row cannot be converted to the target type
	#[error("Conversion error: {0}")]
	Conversion(String),

	/// Error reported by the wrapped native driver
	#[error("{backend} error: {message}")]
	Driver {
		backend: &'static str,
		message: String,
	},

	/// Serialization/deserialization error
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The task was cancelled before it started
	#[error("Task cancelled before execution")]
	Cancelled,

	/// The task panicked or its result channel was dropped
	#[error("Task failed: {0}")]
	TaskFailed(String),

	/// Invalid configuration value
	#[error("Configuration error: {0}")]
	Config(String),
}

impl Error {
	/// Wrap a driver error message for `backend`.
	pub fn driver(backend: &'static str, message: impl std::fmt::Display) -> Self {
		Error::Driver {
			backend,
			message: message.to_string(),
		}
	}

	/// Build a [`Error::MissingId`] for the named entity.
	pub fn missing_id(entity: impl Into<String>) -> Self {
		Error::MissingId {
			entity: entity.into(),
		}
	}

	/// Returns `true` for errors raised before any driver call.
	///
	/// # Examples
	///
	/// ```
	/// use tessera_core::Error;
	///
	/// assert!(Error::missing_id("User").is_argument_error());
	/// assert!(!Error::driver("mongodb", "connection refused").is_argument_error());
	/// ```
	pub fn is_argument_error(&self) -> bool {
		matches!(
			self,
			Error::UnsupportedType(_)
				| Error::MissingId { .. }
				| Error::InvalidArgument(_)
				| Error::Conversion(_)
				| Error::Serialization(_)
		)
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::Config(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Error::UnsupportedType("i32".into()), true)]
	#[case(Error::missing_id("User"), true)]
	#[case(Error::InvalidArgument("bad binding".into()), true)]
	#[case(Error::Conversion("3 columns".into()), true)]
	#[case(Error::driver("couchbase", "timeout"), false)]
	#[case(Error::Cancelled, false)]
	#[case(Error::Config("capacity".into()), false)]
	fn test_argument_error_classification(#[case] err: Error, #[case] expected: bool) {
		assert_eq!(err.is_argument_error(), expected);
	}

	#[rstest]
	fn test_driver_error_display() {
		let err = Error::driver("hbase", "region offline");
		assert_eq!(err.to_string(), "hbase error: region offline");
	}
}
