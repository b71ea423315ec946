//! Session hand-off queue
//!
//! [`SessionQueue`] keeps a bounded set of idle sessions. [`acquire`]
//! hands out an idle session or opens a new one; the returned
//! [`SessionGuard`] gives the session back when dropped, unless it was
//! poisoned by a failed statement.
//!
//! [`acquire`]: SessionQueue::acquire

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tessera_core::{Error, Result};

use crate::session::{GraphSession, SessionFactory};

/// Idle sessions kept by default
pub const DEFAULT_IDLE_SESSIONS: usize = 8;

/// Bounded queue of idle sessions.
pub struct SessionQueue {
	factory: Arc<dyn SessionFactory>,
	idle: Mutex<VecDeque<Box<dyn GraphSession>>>,
	capacity: usize,
	opened: AtomicUsize,
}

impl std::fmt::Debug for SessionQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionQueue")
			.field("capacity", &self.capacity)
			.field("idle", &self.idle_count())
			.field("opened", &self.opened())
			.finish()
	}
}

impl SessionQueue {
	/// Queue keeping at most `capacity` idle sessions.
	pub fn new(factory: Arc<dyn SessionFactory>, capacity: usize) -> Result<Self> {
		if capacity == 0 {
			return Err(Error::Config(
				"session queue capacity must be at least 1".to_string(),
			));
		}
		Ok(Self {
			factory,
			idle: Mutex::new(VecDeque::with_capacity(capacity)),
			capacity,
			opened: AtomicUsize::new(0),
		})
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn idle_count(&self) -> usize {
		self.idle.lock().len()
	}

	/// Sessions opened through the factory so far.
	pub fn opened(&self) -> usize {
		self.opened.load(Ordering::Relaxed)
	}

	/// Take an idle session, or open one when none is idle.
	pub async fn acquire(&self) -> Result<SessionGuard<'_>> {
		let reused = self.idle.lock().pop_front();
		let session = match reused {
			Some(session) => session,
			None => {
				let session = self.factory.open().await?;
				self.opened.fetch_add(1, Ordering::Relaxed);
				tracing::debug!(opened = self.opened(), "opened graph session");
				session
			}
		};
		Ok(SessionGuard {
			queue: self,
			session: Some(session),
			poisoned: false,
		})
	}

	fn release(&self, session: Box<dyn GraphSession>) {
		let mut idle = self.idle.lock();
		if idle.len() < self.capacity {
			idle.push_back(session);
		} else {
			tracing::debug!(capacity = self.capacity, "idle queue full, closing session");
		}
	}

	/// Close every idle session.
	pub fn clear(&self) {
		self.idle.lock().clear();
	}
}

/// A session on loan from a [`SessionQueue`].
pub struct SessionGuard<'a> {
	queue: &'a SessionQueue,
	session: Option<Box<dyn GraphSession>>,
	poisoned: bool,
}

impl SessionGuard<'_> {
	/// Discard the session instead of handing it back.
	pub fn poison(&mut self) {
		self.poisoned = true;
	}

	pub fn is_poisoned(&self) -> bool {
		self.poisoned
	}
}

impl Deref for SessionGuard<'_> {
	type Target = dyn GraphSession;

	fn deref(&self) -> &Self::Target {
		match &self.session {
			Some(session) => session.as_ref(),
			// Only taken in drop
			None => unreachable!("session guard used after release"),
		}
	}
}

impl Drop for SessionGuard<'_> {
	fn drop(&mut self) {
		if let Some(session) = self.session.take() {
			if self.poisoned {
				tracing::debug!("discarding poisoned graph session");
			} else {
				self.queue.release(session);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use rstest::rstest;
	use tessera_core::Row;

	struct IdleSession;

	#[async_trait]
	impl GraphSession for IdleSession {
		async fn run(&self, _cypher: &str, _params: Row) -> Result<Vec<Row>> {
			Ok(Vec::new())
		}
	}

	struct Factory;

	#[async_trait]
	impl SessionFactory for Factory {
		async fn open(&self) -> Result<Box<dyn GraphSession>> {
			Ok(Box::new(IdleSession))
		}
	}

	fn queue(capacity: usize) -> SessionQueue {
		SessionQueue::new(Arc::new(Factory), capacity).unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_sessions_are_reused() {
		let queue = queue(2);

		drop(queue.acquire().await.unwrap());
		drop(queue.acquire().await.unwrap());

		assert_eq!(queue.opened(), 1);
		assert_eq!(queue.idle_count(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_concurrent_loans_open_new_sessions() {
		let queue = queue(2);

		let first = queue.acquire().await.unwrap();
		let second = queue.acquire().await.unwrap();
		let third = queue.acquire().await.unwrap();
		assert_eq!(queue.opened(), 3);
		assert_eq!(queue.idle_count(), 0);

		drop(first);
		drop(second);
		drop(third);
		// Bounded by capacity
		assert_eq!(queue.idle_count(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_poisoned_sessions_are_discarded() {
		let queue = queue(2);

		let mut guard = queue.acquire().await.unwrap();
		guard.poison();
		assert!(guard.is_poisoned());
		drop(guard);

		assert_eq!(queue.idle_count(), 0);
		drop(queue.acquire().await.unwrap());
		assert_eq!(queue.opened(), 2);
	}

	#[rstest]
	fn test_zero_capacity_is_rejected() {
		let err = SessionQueue::new(Arc::new(Factory), 0).unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_clear_closes_idle_sessions() {
		let queue = queue(4);
		drop(queue.acquire().await.unwrap());
		assert_eq!(queue.idle_count(), 1);

		queue.clear();
		assert_eq!(queue.idle_count(), 0);
	}
}
