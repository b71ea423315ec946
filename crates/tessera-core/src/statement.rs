//! LRU cache of parsed statements keyed by the literal query string.
//!
//! Only queries shorter than `max_query_length` are cached; longer ones are
//! parsed on every call. Eviction only costs a re-parse.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::settings::StatementCacheSettings;

/// Statement cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatementCacheStats {
	pub entries: usize,
	pub hits: u64,
	pub misses: u64,
	/// Parses of queries too long to be cached
	pub uncached: u64,
}

/// Bounded LRU pool of parsed statements.
pub struct StatementCache<S> {
	entries: Mutex<LruCache<String, Arc<S>>>,
	max_query_length: usize,
	hits: AtomicU64,
	misses: AtomicU64,
	uncached: AtomicU64,
}

impl<S> std::fmt::Debug for StatementCache<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StatementCache")
			.field("max_query_length", &self.max_query_length)
			.field("stats", &self.stats())
			.finish()
	}
}

impl<S> StatementCache<S> {
	/// Create a cache from settings.
	pub fn new(settings: &StatementCacheSettings) -> Result<Self> {
		let capacity = NonZeroUsize::new(settings.capacity).ok_or_else(|| {
			Error::Config("statement cache capacity must be at least 1".to_string())
		})?;
		Ok(Self::with_capacity(capacity, settings.max_query_length))
	}

	pub fn with_capacity(capacity: NonZeroUsize, max_query_length: usize) -> Self {
		Self {
			entries: Mutex::new(LruCache::new(capacity)),
			max_query_length,
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			uncached: AtomicU64::new(0),
		}
	}

	/// Return the cached statement for `query`, parsing it on a miss.
	///
	/// Parse errors are returned and nothing is cached.
	pub fn get_or_parse<F>(&self, query: &str, parse: F) -> Result<Arc<S>>
	where
		F: FnOnce(&str) -> Result<S>,
	{
		if !self.is_cacheable(query) {
			self.uncached.fetch_add(1, Ordering::Relaxed);
			return parse(query).map(Arc::new);
		}

		if let Some(statement) = self.entries.lock().get(query) {
			self.hits.fetch_add(1, Ordering::Relaxed);
			tracing::trace!(query, "statement cache hit");
			return Ok(Arc::clone(statement));
		}

		self.misses.fetch_add(1, Ordering::Relaxed);
		let statement = Arc::new(parse(query)?);
		self.entries
			.lock()
			.put(query.to_string(), Arc::clone(&statement));
		tracing::trace!(query, "statement cached");
		Ok(statement)
	}

	/// Whether `query` is short enough to be cached.
	pub fn is_cacheable(&self, query: &str) -> bool {
		query.len() < self.max_query_length
	}

	pub fn contains(&self, query: &str) -> bool {
		self.entries.lock().contains(query)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	pub fn stats(&self) -> StatementCacheStats {
		StatementCacheStats {
			entries: self.len(),
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			uncached: self.uncached.load(Ordering::Relaxed),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::cell::Cell;

	fn cache(capacity: usize, max_query_length: usize) -> StatementCache<String> {
		StatementCache::with_capacity(NonZeroUsize::new(capacity).unwrap(), max_query_length)
	}

	#[rstest]
	fn test_second_lookup_is_a_hit() {
		let cache = cache(10, 64);
		let parses = Cell::new(0);
		let parse = |q: &str| {
			parses.set(parses.get() + 1);
			Ok(q.to_uppercase())
		};

		let first = cache.get_or_parse("select 1", parse).unwrap();
		let second = cache.get_or_parse("select 1", parse).unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(parses.get(), 1);
		assert_eq!(
			cache.stats(),
			StatementCacheStats {
				entries: 1,
				hits: 1,
				misses: 1,
				uncached: 0,
			}
		);
	}

	#[rstest]
	fn test_long_queries_are_never_cached() {
		let cache = cache(10, 8);
		let parses = Cell::new(0);
		let parse = |q: &str| {
			parses.set(parses.get() + 1);
			Ok(q.to_string())
		};

		let query = "select * from users";
		assert_eq!(*cache.get_or_parse(query, parse).unwrap(), query);
		assert_eq!(*cache.get_or_parse(query, parse).unwrap(), query);
		assert_eq!(parses.get(), 2);
		assert!(cache.is_empty());
		assert_eq!(cache.stats().uncached, 2);
	}

	#[rstest]
	fn test_least_recently_used_is_evicted() {
		let cache = cache(2, 64);
		let parse = |q: &str| Ok(q.to_string());
		cache.get_or_parse("a", parse).unwrap();
		cache.get_or_parse("b", parse).unwrap();
		cache.get_or_parse("a", parse).unwrap();
		cache.get_or_parse("c", parse).unwrap();

		assert!(cache.contains("a"));
		assert!(!cache.contains("b"));
		assert!(cache.contains("c"));
	}

	#[rstest]
	fn test_parse_errors_are_not_cached() {
		let cache = cache(4, 64);
		let result =
			cache.get_or_parse("bad", |_| Err(Error::InvalidArgument("unterminated".into())));
		assert!(result.is_err());
		assert!(!cache.contains("bad"));
	}

	#[rstest]
	fn test_zero_capacity_is_a_config_error() {
		let settings = StatementCacheSettings {
			capacity: 0,
			max_query_length: 10,
		};
		assert!(matches!(
			StatementCache::<String>::new(&settings),
			Err(Error::Config(_))
		));
	}
}
