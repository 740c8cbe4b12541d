//! Bounded storage executor.
//!
//! Callers submit units of work; a fixed set of worker threads, one per
//! pooled connection, runs them against SQLite and reports each result
//! through a oneshot channel. The number of workers caps concurrent storage
//! load no matter how many callers are waiting.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::schema::{apply_pragmas, initialize_schema};
use crate::config::StorageSettings;
use crate::observability::metrics::record_storage_failure;

/// Failure of a unit of storage work.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No connection could be checked out of the pool.
    #[error("storage unavailable: {0}")]
    Pool(#[from] r2d2::Error),

    /// A query failed for a reason other than a constraint.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),

    /// A constraint failed that upsert or check-then-act did not absorb.
    #[error("integrity violation: {0}")]
    IntegrityViolation(#[source] rusqlite::Error),

    /// The executor shut down before the work produced a result.
    #[error("storage executor shut down while work was pending")]
    ShutdownInterrupted,

    /// The unit of work panicked on its worker.
    #[error("storage worker panicked")]
    WorkerPanicked,

    /// The storage settings cannot be used to open a pool.
    #[error("invalid storage settings: {0}")]
    InvalidSettings(&'static str),

    /// A worker thread could not be started.
    #[error("failed to start storage worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::IntegrityViolation(err)
            }
            err => Self::Unavailable(err),
        }
    }
}

impl StorageError {
    /// Whether the failure comes from the storage backend being unreachable
    /// or failing, as opposed to executor lifecycle or data problems.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Pool(_) | Self::Unavailable(_))
    }
}

/// A unit of work bound to its result channel, ready to run on a worker.
type Job = Box<dyn FnOnce(&Pool<SqliteConnectionManager>) + Send + 'static>;

/// Pending result of a submitted unit of work.
///
/// Await it from async code or call [`StorageFuture::wait`] from a plain
/// thread.
#[must_use = "storage work reports its outcome only through this future"]
#[derive(Debug)]
pub struct StorageFuture<T> {
    rx: oneshot::Receiver<Result<T, StorageError>>,
}

impl<T> StorageFuture<T> {
    /// Block the current thread until the unit finishes.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an async runtime; use `.await` there.
    pub fn wait(self) -> Result<T, StorageError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(StorageError::ShutdownInterrupted))
    }
}

impl<T> Future for StorageFuture<T> {
    type Output = Result<T, StorageError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StorageError::ShutdownInterrupted)))
    }
}

/// Executes storage work on a bounded pool of connections and threads.
///
/// Cheap to clone; all clones share the same pool and workers.
#[derive(Clone)]
pub struct StorageExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` once shutdown has begun.
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Set after the grace period: queued work is dropped instead of run.
    discard: Arc<AtomicBool>,
    /// Taken on shutdown; workers hold their own clones.
    pool: Mutex<Option<Pool<SqliteConnectionManager>>>,
    shutdown_grace: Duration,
}

impl StorageExecutor {
    /// Open the database, create the schema if needed and start the workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are unusable, the pool cannot be
    /// built, the schema cannot be created, or a worker thread cannot be
    /// spawned.
    pub fn open(settings: &StorageSettings) -> Result<Self, StorageError> {
        if settings.pool_size == 0 {
            return Err(StorageError::InvalidSettings("pool size must be at least 1"));
        }
        if settings.connection_timeout.is_zero() {
            return Err(StorageError::InvalidSettings(
                "connection timeout must be positive",
            ));
        }

        let manager = SqliteConnectionManager::file(&settings.database);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .connection_timeout(settings.connection_timeout)
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;

        initialize_schema(&*pool.get()?)?;

        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let discard = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(settings.pool_size as usize);
        for index in 0..settings.pool_size {
            let receiver = Arc::clone(&receiver);
            let discard = Arc::clone(&discard);
            let pool = pool.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{}", settings.worker_name, index))
                .spawn(move || worker_loop(&receiver, &discard, &pool))
                .map_err(StorageError::WorkerSpawn)?;
            workers.push(handle);
        }

        tracing::info!(
            database = %settings.database.display(),
            pool_size = settings.pool_size,
            worker_name = %settings.worker_name,
            "Storage executor started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                discard,
                pool: Mutex::new(Some(pool)),
                shutdown_grace: settings.shutdown_grace,
            }),
        })
    }

    /// Submit a unit of work that produces a value.
    ///
    /// The unit gets a pooled connection for its duration only. After
    /// shutdown the returned future fails with
    /// [`StorageError::ShutdownInterrupted`].
    pub fn submit<T, F>(&self, unit: F) -> StorageFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |pool| {
            let result = run_unit(pool, unit);
            if let Err(ref e) = result {
                tracing::warn!(error = %e, "Failed to execute storage work");
                record_storage_failure();
            }
            // The caller may have stopped waiting
            let _ = tx.send(result);
        });

        // Once shut down the job is dropped here, and with it the result
        // sender, so the future resolves to ShutdownInterrupted
        if let Some(sender) = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = sender.send(job);
        }
        StorageFuture { rx }
    }

    /// Submit a unit of work that produces nothing.
    pub fn run<F>(&self, unit: F) -> StorageFuture<()>
    where
        F: FnOnce(&mut Connection) -> Result<(), StorageError> + Send + 'static,
    {
        self.submit(unit)
    }

    /// Get the current pool state for monitoring.
    ///
    /// `None` once the pool has been released by shutdown.
    pub fn pool_state(&self) -> Option<r2d2::State> {
        self.inner
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Pool::state)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting work and wind the workers down.
    ///
    /// Queued and running units get up to the configured grace period to
    /// finish. After that, queued units are dropped (their callers see
    /// [`StorageError::ShutdownInterrupted`]) and workers still busy are
    /// detached. The pool is released here; its connections close once the
    /// last worker drops its clone. Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        // Closing the channel lets workers exit once the queue is empty
        drop(sender);

        tracing::info!("Shutting down storage executor...");
        let workers = std::mem::take(
            &mut *self
                .inner
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let deadline = Instant::now() + self.inner.shutdown_grace;
        while workers.iter().any(|w| !w.is_finished()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let stragglers = workers.iter().filter(|w| !w.is_finished()).count();
        if stragglers > 0 {
            tracing::warn!(
                stragglers,
                "Grace period elapsed, discarding queued storage work"
            );
            self.inner.discard.store(true, Ordering::SeqCst);
        }

        for worker in workers.into_iter().filter(JoinHandle::is_finished) {
            if worker.join().is_err() {
                tracing::error!("Storage worker thread panicked");
            }
        }

        drop(
            self.inner
                .pool
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        tracing::info!(stragglers, "Storage executor shut down, connection pool released");
    }
}

fn run_unit<T, F>(pool: &Pool<SqliteConnectionManager>, unit: F) -> Result<T, StorageError>
where
    F: FnOnce(&mut Connection) -> Result<T, StorageError>,
{
    let mut conn = pool.get()?;
    panic::catch_unwind(AssertUnwindSafe(|| unit(&mut *conn)))
        .unwrap_or(Err(StorageError::WorkerPanicked))
}

fn worker_loop(
    receiver: &Mutex<mpsc::UnboundedReceiver<Job>>,
    discard: &AtomicBool,
    pool: &Pool<SqliteConnectionManager>,
) {
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blocking_recv();
        let Some(job) = job else {
            break;
        };
        if discard.load(Ordering::SeqCst) {
            // Dropping the job drops its result sender
            continue;
        }
        job(pool);
    }
    let current = thread::current();
    tracing::debug!(
        worker = current.name().unwrap_or("storage-worker"),
        "Storage worker stopped"
    );
}

/// Connection customizer that applies pragmas to every new connection.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        apply_pragmas(conn)
    }
}
