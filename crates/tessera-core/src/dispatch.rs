//! Blocking and task-handle forms of executor operations.
//!
//! Every executor operation is an `async fn`. A [`Dispatcher`] turns any of
//! them into either form:
//!
//! - [`Dispatcher::block_on`] runs it on the calling thread until completion
//! - [`Dispatcher::submit`] schedules it on the shared worker pool and returns
//!   a [`TaskHandle`] that can be cancelled until the task starts
//!
//! ```rust,no_run
//! use tessera_core::{Dispatcher, Result};
//!
//! # async fn lookup(id: u32) -> Result<String> { Ok(id.to_string()) }
//! # fn example() -> Result<()> {
//! let dispatcher = Dispatcher::global()?;
//!
//! let name = dispatcher.block_on(lookup(1))?;
//!
//! let handle = dispatcher.submit(lookup(2));
//! let other = handle.wait()?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::{Semaphore, oneshot};

use crate::error::{Error, Result};
use crate::settings::PoolSettings;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;

/// Upper bound of the default concurrency.
const MAX_DEFAULT_CONCURRENCY: usize = 256;

/// Tasks allowed per available CPU by default; the work is I/O bound.
const TASKS_PER_CPU: usize = 8;

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

enum RuntimeRef {
	Owned(Arc<Runtime>),
	Borrowed(Handle),
}

/// Shared bounded worker pool for executor operations.
pub struct Dispatcher {
	runtime: RuntimeRef,
	permits: Arc<Semaphore>,
	max_concurrency: usize,
}

impl std::fmt::Debug for Dispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Dispatcher")
			.field("owned_runtime", &matches!(self.runtime, RuntimeRef::Owned(_)))
			.field("max_concurrency", &self.max_concurrency)
			.field("available_permits", &self.permits.available_permits())
			.finish()
	}
}

impl Dispatcher {
	/// Build a dispatcher with its own multi-thread runtime.
	pub fn new(settings: &PoolSettings) -> Result<Self> {
		let max_concurrency = settings.max_concurrency.unwrap_or_else(default_concurrency);
		if max_concurrency == 0 {
			return Err(Error::Config("max_concurrency must be at least 1".to_string()));
		}

		let mut builder = Builder::new_multi_thread();
		builder.enable_all().thread_name("tessera-worker");
		if let Some(threads) = settings.worker_threads {
			if threads == 0 {
				return Err(Error::Config("worker_threads must be at least 1".to_string()));
			}
			builder.worker_threads(threads);
		}
		let runtime = builder
			.build()
			.map_err(|e| Error::Config(format!("failed to build worker runtime: {}", e)))?;

		tracing::debug!(max_concurrency, "worker pool started");

		Ok(Self {
			runtime: RuntimeRef::Owned(Arc::new(runtime)),
			permits: Arc::new(Semaphore::new(max_concurrency)),
			max_concurrency,
		})
	}

	/// Build a dispatcher on an existing runtime.
	pub fn with_handle(handle: Handle, max_concurrency: usize) -> Self {
		let max_concurrency = max_concurrency.max(1);
		Self {
			runtime: RuntimeRef::Borrowed(handle),
			permits: Arc::new(Semaphore::new(max_concurrency)),
			max_concurrency,
		}
	}

	/// The process-wide dispatcher with default sizing, created on first use.
	pub fn global() -> Result<&'static Dispatcher> {
		if let Some(dispatcher) = GLOBAL.get() {
			return Ok(dispatcher);
		}
		let dispatcher = Dispatcher::new(&PoolSettings::default())?;
		Ok(GLOBAL.get_or_init(|| dispatcher))
	}

	pub fn max_concurrency(&self) -> usize {
		self.max_concurrency
	}

	/// Permits not currently held by running or queued tasks.
	pub fn available_permits(&self) -> usize {
		self.permits.available_permits()
	}

	fn handle(&self) -> &Handle {
		match &self.runtime {
			RuntimeRef::Owned(runtime) => runtime.handle(),
			RuntimeRef::Borrowed(handle) => handle,
		}
	}

	/// Run an operation to completion on the calling thread.
	///
	/// # Panics
	///
	/// Panics when called from within an asynchronous execution context.
	pub fn block_on<F: Future>(&self, operation: F) -> F::Output {
		self.handle().block_on(operation)
	}

	/// Schedule an operation on the worker pool.
	pub fn submit<F, T>(&self, operation: F) -> TaskHandle<T>
	where
		F: Future<Output = Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let (sender, receiver) = oneshot::channel();
		let state = Arc::new(AtomicU8::new(PENDING));
		let task_state = Arc::clone(&state);
		let permits = Arc::clone(&self.permits);

		self.handle().spawn(async move {
			let permit = match permits.acquire_owned().await {
				Ok(permit) => permit,
				Err(_) => {
					let _ = sender.send(Err(Error::TaskFailed("worker pool closed".to_string())));
					return;
				}
			};
			if !start(&task_state) {
				let _ = sender.send(Err(Error::Cancelled));
				return;
			}

			let result = AssertUnwindSafe(operation)
				.catch_unwind()
				.await
				.unwrap_or_else(|panic| Err(Error::TaskFailed(panic_message(panic))));
			drop(permit);
			task_state.store(FINISHED, Ordering::SeqCst);
			let _ = sender.send(result);
		});

		TaskHandle { state, receiver }
	}

	/// Schedule a blocking closure on the worker pool.
	pub fn submit_blocking<F, T>(&self, operation: F) -> TaskHandle<T>
	where
		F: FnOnce() -> Result<T> + Send + 'static,
		T: Send + 'static,
	{
		let (sender, receiver) = oneshot::channel();
		let state = Arc::new(AtomicU8::new(PENDING));
		let task_state = Arc::clone(&state);
		let permits = Arc::clone(&self.permits);

		self.handle().spawn(async move {
			let permit = match permits.acquire_owned().await {
				Ok(permit) => permit,
				Err(_) => {
					let _ = sender.send(Err(Error::TaskFailed("worker pool closed".to_string())));
					return;
				}
			};
			if !start(&task_state) {
				let _ = sender.send(Err(Error::Cancelled));
				return;
			}

			let result = match tokio::task::spawn_blocking(operation).await {
				Ok(result) => result,
				Err(e) => Err(Error::TaskFailed(e.to_string())),
			};
			drop(permit);
			task_state.store(FINISHED, Ordering::SeqCst);
			let _ = sender.send(result);
		});

		TaskHandle { state, receiver }
	}
}

fn start(state: &AtomicU8) -> bool {
	state
		.compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
		.is_ok()
}

fn default_concurrency() -> usize {
	let cpus = std::thread::available_parallelism()
		.map(|n| n.get())
		.unwrap_or(1);
	(cpus * TASKS_PER_CPU).min(MAX_DEFAULT_CONCURRENCY)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message.to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"task panicked".to_string()
	}
}

/// Eventual result of a submitted operation.
///
/// Errors of the operation are returned when the handle is observed.
#[must_use = "dropping a TaskHandle detaches the task"]
pub struct TaskHandle<T> {
	state: Arc<AtomicU8>,
	receiver: oneshot::Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
	/// Cancel the task if it has not started.
	///
	/// Returns `true` when the task will not run.
	pub fn cancel(&self) -> bool {
		self.state
			.compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
			.is_ok()
	}

	pub fn is_cancelled(&self) -> bool {
		self.state.load(Ordering::SeqCst) == CANCELLED
	}

	/// Returns `true` once the operation completed or was cancelled.
	pub fn is_finished(&self) -> bool {
		matches!(self.state.load(Ordering::SeqCst), FINISHED | CANCELLED)
	}

	/// Wait for the result asynchronously.
	pub async fn join(self) -> Result<T> {
		if self.is_cancelled() {
			return Err(Error::Cancelled);
		}
		self.receiver
			.await
			.unwrap_or_else(|_| Err(Error::TaskFailed("result channel closed".to_string())))
	}

	/// Block the calling thread until the result is available.
	///
	/// # Panics
	///
	/// Panics when called from within an asynchronous execution context.
	pub fn wait(self) -> Result<T> {
		if self.is_cancelled() {
			return Err(Error::Cancelled);
		}
		self.receiver
			.blocking_recv()
			.unwrap_or_else(|_| Err(Error::TaskFailed("result channel closed".to_string())))
	}
}
