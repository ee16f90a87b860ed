//! # Watcher
//!
//! Two change sources feed the save pipeline while a watcher runs:
//!
//! ```text
//! notify ──channel──▶ dispatcher thread ──▶ on_created / on_modified / on_moved
//!                                                 │
//! poller thread ── poll_tick every interval ──────┘ (pokes documents notify missed)
//! ```
//!
//! [`WatchController`] owns both threads and a cancellation token shared with them.
//! Starting claims the folder's liveness marker, so only one watcher runs per folder.
//! Stopping cancels the token, drops the notifier (which closes the channel), joins both
//! threads, rotates the session log, releases the marker and leaves the registry. Dropping
//! a running controller stops it.

use crate::api::RevtrackApi;
use crate::commands::poll::PollOutcome;
use crate::error::{Result, RevtrackError};
use crate::store::StorageBackend;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub mod dispatch;
pub mod marker;
pub mod registry;
pub mod session;

use marker::MarkerInfo;
use registry::WatcherRegistry;
use session::SessionLog;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub events: usize,
    /// Name of the rotated session log under `session/`.
    pub session_log: Option<String>,
}

pub struct WatchController<B: StorageBackend + 'static> {
    api: Arc<RevtrackApi<B>>,
    cancel: CancellationToken,
    session: Arc<Mutex<SessionLog>>,
    marker: MarkerInfo,
    watcher: Option<RecommendedWatcher>,
    dispatcher: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
    registry: Option<WatcherRegistry>,
    stopped: bool,
}

impl<B: StorageBackend + 'static> WatchController<B> {
    pub fn start(api: Arc<RevtrackApi<B>>, registry: Option<WatcherRegistry>) -> Result<Self> {
        let marker = marker::acquire(api.store())?;
        let session = SessionLog::begin(marker.pid);
        if let Err(err) = session.flush(api.store()) {
            let _ = marker::release(api.store());
            return Err(err);
        }

        let mut controller = Self {
            api,
            cancel: CancellationToken::new(),
            session: Arc::new(Mutex::new(session)),
            marker,
            watcher: None,
            dispatcher: None,
            poller: None,
            registry,
            stopped: false,
        };
        if let Err(err) = controller.spawn() {
            let _ = controller.shutdown();
            return Err(err);
        }

        if let Some(registry) = &controller.registry {
            let root = controller.api.workspace().root();
            if let Err(err) = registry.register(root, controller.marker.pid) {
                tracing::warn!(error = %err, "could not register watcher");
            }
        }
        tracing::info!(
            folder = %controller.api.workspace().root().display(),
            pid = controller.marker.pid,
            "watcher started"
        );
        Ok(controller)
    }

    fn spawn(&mut self) -> Result<()> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(self.api.workspace().root(), RecursiveMode::Recursive)?;
        self.watcher = Some(watcher);

        let api = Arc::clone(&self.api);
        let session = Arc::clone(&self.session);
        let cancel = self.cancel.clone();
        self.dispatcher = Some(
            thread::Builder::new()
                .name("revtrack-dispatch".to_string())
                .spawn(move || dispatch_loop(api, rx, session, cancel))
                .map_err(RevtrackError::Io)?,
        );

        let api = Arc::clone(&self.api);
        let cancel = self.cancel.clone();
        let interval = Duration::from_millis(self.api.config().poll_interval_ms);
        self.poller = Some(
            thread::Builder::new()
                .name("revtrack-poll".to_string())
                .spawn(move || poll_loop(api, interval, cancel))
                .map_err(RevtrackError::Io)?,
        );
        Ok(())
    }

    pub fn api(&self) -> &Arc<RevtrackApi<B>> {
        &self.api
    }

    pub fn pid(&self) -> u32 {
        self.marker.pid
    }

    /// Events recorded in the session log so far.
    pub fn events(&self) -> usize {
        self.session.lock().events()
    }

    pub fn is_running(&self) -> bool {
        !self.stopped && !self.cancel.is_cancelled()
    }

    pub fn stop(mut self) -> Result<StopReport> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<StopReport> {
        let events = self.events();
        if self.stopped {
            return Ok(StopReport {
                events,
                session_log: None,
            });
        }
        self.stopped = true;
        self.cancel.cancel();
        self.watcher = None;
        for handle in [self.dispatcher.take(), self.poller.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::warn!("watcher thread panicked");
            }
        }

        let store = self.api.store();
        let log = self.session.lock().clone();
        let session_log = match log.finish(store) {
            Ok(name) => Some(name),
            Err(err) => {
                tracing::warn!(error = %err, "could not rotate session log");
                None
            }
        };
        if let Some(registry) = &self.registry {
            if let Err(err) = registry.unregister(self.api.workspace().root(), self.marker.pid) {
                tracing::warn!(error = %err, "could not unregister watcher");
            }
        }
        marker::release(store)?;

        tracing::info!(events, "watcher stopped");
        Ok(StopReport {
            events,
            session_log,
        })
    }
}

impl<B: StorageBackend + 'static> Drop for WatchController<B> {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(err) = self.shutdown() {
                tracing::warn!(error = %err, "watcher did not stop cleanly");
            }
        }
    }
}

fn dispatch_loop<B: StorageBackend>(
    api: Arc<RevtrackApi<B>>,
    rx: Receiver<notify::Result<Event>>,
    session: Arc<Mutex<SessionLog>>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let event = match rx.recv_timeout(RECV_TIMEOUT) {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "notifier error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        for file_event in dispatch::classify(&event) {
            match dispatch::handle(&api, &file_event) {
                Ok(outcome) => {
                    let Some(label) = outcome.event_label() else {
                        continue;
                    };
                    let mut log = session.lock();
                    log.record(label);
                    if let Err(err) = log.flush(api.store()) {
                        tracing::warn!(error = %err, "could not write session log");
                    }
                }
                // nothing advanced, the next event or poll retries
                Err(err) => tracing::warn!(event = ?file_event, error = %err, "save skipped"),
            }
        }
    }
}

fn poll_loop<B: StorageBackend>(
    api: Arc<RevtrackApi<B>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        match api.poll_tick() {
            Ok(PollOutcome::Poked { file }) => tracing::debug!(file = %file, "poll poked"),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "poll failed"),
        }
        let deadline = Instant::now() + interval;
        while !cancel.is_cancelled() && Instant::now() < deadline {
            thread::sleep(SLEEP_SLICE);
        }
    }
}
