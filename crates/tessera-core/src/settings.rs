//! Executor settings
//!
//! Settings are plain serde structs, loadable from TOML and overridable from
//! the environment:
//!
//! ```toml
//! naming_policy = "camelCase"
//!
//! [pool]
//! max_concurrency = 64
//!
//! [statement_cache]
//! capacity = 500
//! max_query_length = 2048
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::naming::NamingPolicy;

/// Environment variable overriding [`ExecutorSettings::naming_policy`]
pub const ENV_NAMING_POLICY: &str = "TESSERA_NAMING_POLICY";
/// Environment variable overriding [`PoolSettings::max_concurrency`]
pub const ENV_MAX_CONCURRENCY: &str = "TESSERA_MAX_CONCURRENCY";
/// Environment variable overriding [`StatementCacheSettings::capacity`]
pub const ENV_STATEMENT_CACHE_CAPACITY: &str = "TESSERA_STATEMENT_CACHE_CAPACITY";

/// Settings shared by all executors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
	/// Property name translation
	pub naming_policy: NamingPolicy,

	/// Worker pool sizing
	pub pool: PoolSettings,

	/// Statement cache sizing (query executors)
	pub statement_cache: StatementCacheSettings,
}

/// Worker pool sizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
	/// Maximum concurrently running tasks; derived from the CPU count when unset
	pub max_concurrency: Option<usize>,

	/// Runtime worker threads; the runtime default when unset
	pub worker_threads: Option<usize>,
}

/// Statement cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementCacheSettings {
	/// Maximum number of cached statements
	pub capacity: usize,

	/// Queries of this length or longer are never cached
	pub max_query_length: usize,
}

impl Default for StatementCacheSettings {
	fn default() -> Self {
		Self {
			capacity: 1000,
			max_query_length: 1024,
		}
	}
}

impl ExecutorSettings {
	/// Parse settings from a TOML document.
	///
	/// # Examples
	///
	/// ```
	/// use tessera_core::{ExecutorSettings, NamingPolicy};
	///
	/// let settings = ExecutorSettings::from_toml_str(r#"
	///     naming_policy = "snake_case"
	///
	///     [statement_cache]
	///     capacity = 10
	/// "#).unwrap();
	///
	/// assert_eq!(settings.naming_policy, NamingPolicy::SnakeCase);
	/// assert_eq!(settings.statement_cache.capacity, 10);
	/// assert_eq!(settings.statement_cache.max_query_length, 1024);
	/// ```
	pub fn from_toml_str(source: &str) -> Result<Self> {
		let settings: Self = toml::from_str(source)?;
		settings.validate()?;
		Ok(settings)
	}

	/// Load settings from a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
		Self::from_toml_str(&source)
	}

	/// Apply `TESSERA_*` environment overrides.
	pub fn apply_env(mut self) -> Result<Self> {
		if let Ok(policy) = std::env::var(ENV_NAMING_POLICY) {
			self.naming_policy = policy.parse()?;
		}
		if let Ok(value) = std::env::var(ENV_MAX_CONCURRENCY) {
			self.pool.max_concurrency = Some(parse_env_number(ENV_MAX_CONCURRENCY, &value)?);
		}
		if let Ok(value) = std::env::var(ENV_STATEMENT_CACHE_CAPACITY) {
			self.statement_cache.capacity = parse_env_number(ENV_STATEMENT_CACHE_CAPACITY, &value)?;
		}
		self.validate()?;
		Ok(self)
	}

	/// Reject values no component can work with.
	pub fn validate(&self) -> Result<()> {
		if self.pool.max_concurrency == Some(0) {
			return Err(Error::Config("pool.max_concurrency must be at least 1".to_string()));
		}
		if self.pool.worker_threads == Some(0) {
			return Err(Error::Config("pool.worker_threads must be at least 1".to_string()));
		}
		if self.statement_cache.capacity == 0 {
			return Err(Error::Config(
				"statement_cache.capacity must be at least 1".to_string(),
			));
		}
		Ok(())
	}
}

fn parse_env_number(name: &str, value: &str) -> Result<usize> {
	value
		.trim()
		.parse()
		.map_err(|_| Error::Config(format!("{} must be a positive integer, got {:?}", name, value)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;
	use std::io::Write;

	#[rstest]
	fn test_defaults() {
		let settings = ExecutorSettings::default();
		assert_eq!(settings.naming_policy, NamingPolicy::Preserve);
		assert_eq!(settings.pool.max_concurrency, None);
		assert_eq!(settings.statement_cache.capacity, 1000);
		assert_eq!(settings.statement_cache.max_query_length, 1024);
	}

	#[rstest]
	#[case("naming_policy = \"shouting\"")]
	#[case("[pool]\nmax_concurrency = 0")]
	#[case("[statement_cache]\ncapacity = 0")]
	fn test_invalid_settings(#[case] source: &str) {
		assert!(matches!(
			ExecutorSettings::from_toml_str(source),
			Err(Error::Config(_))
		));
	}

	#[rstest]
	fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "naming_policy = \"kebab-case\"\n[pool]\nmax_concurrency = 4").unwrap();

		let settings = ExecutorSettings::from_file(file.path()).unwrap();
		assert_eq!(settings.naming_policy, NamingPolicy::KebabCase);
		assert_eq!(settings.pool.max_concurrency, Some(4));
	}

	#[rstest]
	#[serial]
	fn test_env_overrides() {
		// SAFETY: serialized with the other environment tests
		unsafe {
			std::env::set_var(ENV_NAMING_POLICY, "camelCase");
			std::env::set_var(ENV_STATEMENT_CACHE_CAPACITY, "12");
		}
		let settings = ExecutorSettings::default().apply_env();
		unsafe {
			std::env::remove_var(ENV_NAMING_POLICY);
			std::env::remove_var(ENV_STATEMENT_CACHE_CAPACITY);
		}

		let settings = settings.unwrap();
		assert_eq!(settings.naming_policy, NamingPolicy::LowerCamelCase);
		assert_eq!(settings.statement_cache.capacity, 12);
	}

	#[rstest]
	#[serial]
	fn test_env_override_rejects_garbage() {
		unsafe {
			std::env::set_var(ENV_MAX_CONCURRENCY, "many");
		}
		let result = ExecutorSettings::default().apply_env();
		unsafe {
			std::env::remove_var(ENV_MAX_CONCURRENCY);
		}
		assert!(matches!(result, Err(Error::Config(_))));
	}
}
