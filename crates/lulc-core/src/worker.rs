//! Background execution of discovery and reclassification.
//!
//! Each operation runs on its own thread and reports exactly one [`Event`]
//! back over a channel; the caller polls with [`Worker::try_next`] from its
//! own loop or blocks with [`Worker::wait`]. Only one operation may be in
//! flight at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::assignment::ClassAssignment;
use crate::engine::{Discovery, ReclassReport, RemapEngine};
use crate::error::{RemapError, Result};
use crate::lookup::LookupTable;

/// Completion notice delivered to the caller's thread.
#[derive(Debug)]
pub enum Event {
    ClassesDiscovered {
        raster: PathBuf,
        result: Result<Discovery>,
    },
    Reclassified {
        output: PathBuf,
        result: Result<ReclassReport>,
    },
}

/// Run `op`, turning a panic into [`RemapError::Panicked`] so the event is
/// still sent and the worker can be reused.
fn guarded<T>(operation: &'static str, op: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(op)).unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        error!(operation, %message, "worker operation panicked");
        Err(RemapError::Panicked(operation, message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

pub struct Worker {
    engine: Arc<RemapEngine>,
    sender: Sender<Event>,
    receiver: Receiver<Event>,
    busy: AtomicBool,
}

impl Worker {
    pub fn new(engine: Arc<RemapEngine>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            engine,
            sender,
            receiver,
            busy: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &RemapEngine {
        &self.engine
    }

    /// True from a successful start until its event has been handed out.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn claim(&self) -> Result<()> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| RemapError::Busy)
    }

    /// Start class discovery on a background thread.
    pub fn discover(&self, raster: PathBuf, lookup: Arc<LookupTable>) -> Result<()> {
        self.claim()?;
        let engine = Arc::clone(&self.engine);
        let sender = self.sender.clone();
        thread::spawn(move || {
            let result = guarded("discovery", || engine.discover_classes(&raster, &lookup));
            // The receiver lives as long as the worker; a send error means the
            // worker was dropped and nobody is waiting.
            let _ = sender.send(Event::ClassesDiscovered { raster, result });
        });
        debug!("discovery started");
        Ok(())
    }

    /// Start a reclassification on a background thread. The assignments are
    /// a snapshot; later edits by the caller do not affect this run.
    pub fn reclassify(
        &self,
        raster: PathBuf,
        output: PathBuf,
        assignments: Vec<ClassAssignment>,
    ) -> Result<()> {
        self.claim()?;
        let engine = Arc::clone(&self.engine);
        let sender = self.sender.clone();
        thread::spawn(move || {
            let result = guarded("reclassification", || {
                engine.apply_reclassification(&raster, &output, &assignments)
            });
            let _ = sender.send(Event::Reclassified { output, result });
        });
        debug!("reclassification started");
        Ok(())
    }

    fn deliver(&self, event: Event) -> Event {
        self.busy.store(false, Ordering::Release);
        event
    }

    /// The finished operation's event, if there is one yet.
    pub fn try_next(&self) -> Option<Event> {
        self.receiver.try_recv().ok().map(|e| self.deliver(e))
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(self.deliver(event)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Block until the running operation finishes. `None` when idle.
    pub fn wait(&self) -> Option<Event> {
        if !self.is_busy() {
            return None;
        }
        self.receiver.recv().ok().map(|e| self.deliver(e))
    }
}
