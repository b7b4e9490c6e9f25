//! Time-of-day theme derivation.
//!
//! The display theme is a pure function of the local wall-clock hour,
//! recomputed once when the scheduler starts and again on a fixed cadence.
//! It is never persisted and has no connection to the weather state.

use chrono::{Local, Timelike};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time};

/// Default recomputation cadence.
pub const THEME_TICK: Duration = Duration::from_secs(60);

/// Binary display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// Theme for a local wall-clock hour: dark from 18:00 through 05:59,
    /// light from 06:00 through 17:59.
    pub fn for_hour(hour: u32) -> Self {
        if hour >= 18 || hour < 6 { Self::Dark } else { Self::Light }
    }

    /// Theme for the current local time.
    pub fn now() -> Self {
        Self::for_hour(Local::now().hour())
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// Periodically recomputes the theme and republishes it on a watch channel.
///
/// Publication is unconditional on every tick: the channel version advances
/// even when the value is unchanged, so subscribers wake each cadence. The
/// timer task is canceled by [`stop`](Self::stop), which is idempotent; the
/// scheduler also stops itself on drop so no tick can outlive it.
pub struct ThemeScheduler {
    tx: watch::Sender<Theme>,
    tick: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ThemeScheduler {
    /// Scheduler at the default 60-second cadence.
    pub fn new() -> Self {
        Self::with_interval(THEME_TICK)
    }

    /// Scheduler with an explicit cadence.
    pub fn with_interval(tick: Duration) -> Self {
        let (tx, _rx) = watch::channel(Theme::now());
        Self { tx, tick, task: Mutex::new(None) }
    }

    /// Receiver for the current theme and every subsequent publication.
    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.tx.subscribe()
    }

    /// Last published theme.
    pub fn current(&self) -> Theme {
        *self.tx.borrow()
    }

    /// Spawn the timer task. The theme is recomputed immediately and then on
    /// every tick. No-op if the scheduler is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let tx = self.tx.clone();
        let tick = self.tick;
        *task = Some(tokio::spawn(async move {
            let mut interval = time::interval(tick);
            loop {
                // The first tick fires immediately.
                interval.tick().await;
                tx.send_replace(Theme::now());
            }
        }));
    }

    /// Cancel the timer task. Safe to call when not running or twice in a
    /// row; after it returns no further publications are made.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Default for ThemeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThemeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
