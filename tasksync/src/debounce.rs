//! Debounce scheduler for search input.
//!
//! Each keystroke cancels the scheduled timer and starts a new one. When a
//! timer survives the quiet interval it posts the query through the
//! engine's event channel. Delivery is generation-checked on arrival, so an
//! event that raced a later keystroke or a cancel is ignored.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default quiet interval.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(300);

/// A query that survived the quiet interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledQuery {
    /// Trimmed query text.
    pub query: String,
    generation: u64,
}

/// Coalesces bursts of input into one delayed event.
pub struct DebounceScheduler<E: Send + 'static> {
    quiet: Duration,
    tx: mpsc::Sender<E>,
    wrap: fn(SettledQuery) -> E,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

impl<E: Send + 'static> std::fmt::Debug for DebounceScheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceScheduler")
            .field("quiet", &self.quiet)
            .field("pending", &self.is_pending())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<E: Send + 'static> DebounceScheduler<E> {
    /// Creates a scheduler posting `wrap(settled)` to `tx`.
    pub const fn new(quiet: Duration, tx: mpsc::Sender<E>, wrap: fn(SettledQuery) -> E) -> Self {
        Self {
            quiet,
            tx,
            wrap,
            timer: None,
            generation: 0,
        }
    }

    /// Records a keystroke: cancels the scheduled event and schedules a new
    /// one carrying the trimmed `raw`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_input(&mut self, raw: &str) {
        self.abort_timer();
        self.generation += 1;
        let settled = SettledQuery {
            query: raw.trim().to_string(),
            generation: self.generation,
        };
        let quiet = self.quiet;
        let tx = self.tx.clone();
        let wrap = self.wrap;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if tx.send(wrap(settled)).await.is_err() {
                tracing::debug!("debounce target dropped");
            }
        }));
    }

    /// Accepts a delivered event if it is the latest one.
    ///
    /// Returns the query to act on, or `None` for a superseded event.
    pub fn acknowledge(&mut self, settled: SettledQuery) -> Option<String> {
        if settled.generation != self.generation || self.timer.is_none() {
            tracing::debug!(generation = settled.generation, "superseded search dropped");
            return None;
        }
        self.timer = None;
        Some(settled.query)
    }

    /// Whether an event is scheduled or in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancels the scheduled event, if any.
    pub fn cancel(&mut self) {
        self.abort_timer();
        self.generation += 1;
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<E: Send + 'static> Drop for DebounceScheduler<E> {
    fn drop(&mut self) {
        self.abort_timer();
    }
}
