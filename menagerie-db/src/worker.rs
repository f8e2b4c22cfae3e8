//! The update queue and the thread that drains it.
//!
//! Producers never block: [`UpdateQueue::enqueue`] pushes onto an unbounded
//! channel. A single named thread pulls updates in FIFO order and applies
//! each one under the shared connection lock. A failing update is logged,
//! handed to every registered error handler, and skipped. Panics in an
//! update or a handler are caught and logged the same way.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::DatabaseError;
use crate::update::Update;

/// Callback for updates that failed to apply.
pub type ErrorHandler = Box<dyn Fn(&Update, &DatabaseError) + Send + Sync>;

/// Error handlers shared between the gateway and the worker thread.
pub type ErrorHandlers = Arc<Mutex<Vec<ErrorHandler>>>;

enum Message {
    Apply(Update),
    Shutdown,
}

/// Number of updates enqueued but not yet applied.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn reset(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) = 0;
        self.drained.notify_all();
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .drained
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle onto the worker's queue. Cheap to clone.
#[derive(Clone)]
pub struct UpdateQueue {
    sender: Sender<Message>,
    pending: Arc<Pending>,
}

impl UpdateQueue {
    /// Queue an update for the worker. Returns `false` if the worker has
    /// already shut down and the update was dropped.
    pub fn enqueue(&self, update: Update) -> bool {
        self.pending.increment();
        match self.sender.send(Message::Apply(update)) {
            Ok(()) => true,
            Err(mpsc::SendError(message)) => {
                self.pending.decrement();
                if let Message::Apply(update) = message {
                    log::warn!("Dropped {} update: persistence worker stopped", update.kind());
                }
                false
            }
        }
    }

    /// Updates waiting to be applied.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }
}

impl std::fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

pub struct Worker {
    queue: UpdateQueue,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread on a shared connection.
    pub fn spawn(
        conn: Arc<Mutex<Connection>>,
        handlers: ErrorHandlers,
        poll_interval: Duration,
    ) -> Result<Self, DatabaseError> {
        let (sender, receiver) = mpsc::channel();
        let pending = Arc::new(Pending::default());
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let pending = pending.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("menagerie-db-writer".to_string())
                .spawn(move || {
                    worker_loop(&conn, &handlers, &pending, &running, &receiver, poll_interval)
                })
                .map_err(DatabaseError::WorkerSpawn)?
        };
        log::debug!("Persistence worker started");

        Ok(Self {
            queue: UpdateQueue { sender, pending },
            running,
            handle: Some(handle),
        })
    }

    pub fn queue(&self) -> UpdateQueue {
        self.queue.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Block until every update enqueued so far has been applied or has
    /// failed. Returns immediately once the worker is stopped.
    pub fn flush(&self) {
        if self.is_running() {
            self.queue.pending.wait();
        }
    }

    /// Stop the worker and wait for its thread to exit. Updates still in
    /// the queue are discarded.
    pub fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        let _ = self.queue.sender.send(Message::Shutdown);
        if handle.join().is_err() {
            log::error!("Persistence worker panicked");
        }
        let dropped = self.queue.pending();
        if dropped > 0 {
            log::warn!("Persistence worker stopped with {dropped} unapplied update(s)");
        }
        self.queue.pending.reset();
        log::debug!("Persistence worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.close();
    }
}

/// Marks the worker stopped and releases `flush` waiters when the thread
/// exits, whether it returns or unwinds.
struct ExitGuard<'a> {
    pending: &'a Pending,
    running: &'a AtomicBool,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.pending.reset();
    }
}

fn worker_loop(
    conn: &Mutex<Connection>,
    handlers: &Mutex<Vec<ErrorHandler>>,
    pending: &Pending,
    running: &AtomicBool,
    receiver: &Receiver<Message>,
    poll_interval: Duration,
) {
    let _guard = ExitGuard { pending, running };
    while running.load(Ordering::Acquire) {
        match receiver.recv_timeout(poll_interval) {
            Ok(Message::Apply(update)) => {
                apply_one(conn, handlers, &update);
                pending.decrement();
            }
            Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn apply_one(conn: &Mutex<Connection>, handlers: &Mutex<Vec<ErrorHandler>>, update: &Update) {
    let result = {
        let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
        panic::catch_unwind(AssertUnwindSafe(|| update.apply(&conn)))
    };
    match result {
        Ok(Ok(rows)) => log::debug!("Applied {} ({rows} row(s))", update.kind()),
        Ok(Err(e)) => {
            log::error!("Failed to apply {}: {e}", update.kind());
            let handlers = handlers.lock().unwrap_or_else(PoisonError::into_inner);
            for handler in handlers.iter() {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(update, &e))) {
                    log::error!(
                        "Error handler panicked on {}: {}",
                        update.kind(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        Err(payload) => log::error!(
            "Panic while applying {}: {}",
            update.kind(),
            panic_message(payload.as_ref())
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
