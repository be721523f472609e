//! Background initial load.
//!
//! Parsing a long log can take a while, so the first full read and index
//! build run on a worker thread while the UI shows a loading state. The
//! worker owns the [`Ingestor`] for the duration and hands it back with the
//! index, so the UI thread continues incremental ingestion from the exact
//! offset the bulk load stopped at.
//!
//! Dropping the [`Loader`] abandons the worker; it is never joined.

use std::thread;

use crossbeam::channel::{self, Receiver, TryRecvError};

use crate::index::SeriesIndex;
use crate::ingest::{IngestError, Ingestor, LogSource};

/// Output of the bulk load.
#[derive(Debug)]
pub struct Loaded<S> {
    pub ingestor: Ingestor<S>,
    pub index: SeriesIndex,
    /// Set when the source could not be read; `index` is empty then.
    pub error: Option<IngestError>,
}

/// Progress of a background load.
#[derive(Debug)]
pub enum LoadPoll<S> {
    Pending,
    Ready(Box<Loaded<S>>),
    /// The worker died without reporting.
    Lost,
}

/// Handle to the worker thread.
pub struct Loader<S> {
    rx: Receiver<Loaded<S>>,
}

impl<S: LogSource + Send + 'static> Loader<S> {
    /// Start reading the whole source on a new thread.
    ///
    /// `complete` is forwarded to [`Ingestor::load_all`]: a static log has
    /// its unterminated last line decoded, a live one leaves it for later.
    pub fn spawn(ingestor: Ingestor<S>, complete: bool) -> Self {
        let (tx, rx) = channel::bounded(1);
        thread::spawn(move || {
            let loaded = load(ingestor, complete);
            // Receiver gone means the UI quit first.
            let _ = tx.send(loaded);
        });
        Self { rx }
    }
}

impl<S> Loader<S> {
    /// Non-blocking check for the result.
    pub fn poll(&self) -> LoadPoll<S> {
        match self.rx.try_recv() {
            Ok(loaded) => LoadPoll::Ready(Box::new(loaded)),
            Err(TryRecvError::Empty) => LoadPoll::Pending,
            Err(TryRecvError::Disconnected) => LoadPoll::Lost,
        }
    }

    /// Block until the worker reports. `None` if it died.
    pub fn wait(self) -> Option<Loaded<S>> {
        self.rx.recv().ok()
    }
}

/// Synchronous body of the worker, also usable without a thread.
pub fn load<S: LogSource>(mut ingestor: Ingestor<S>, complete: bool) -> Loaded<S> {
    match ingestor.load_all(complete) {
        Ok(samples) => {
            let (index, rejected) = SeriesIndex::from_samples(samples);
            ingestor.record_rejected(rejected);
            log::debug!(
                "initial load: {} sample(s) across {} device(s)",
                index.len(),
                index.device_count()
            );
            Loaded {
                ingestor,
                index,
                error: None,
            }
        }
        Err(e) => {
            log::warn!("initial load failed: {e}");
            Loaded {
                ingestor,
                index: SeriesIndex::new(),
                error: Some(e),
            }
        }
    }
}
