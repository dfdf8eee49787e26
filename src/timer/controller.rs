use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    models::ControlDocument,
    store::ControlChannel,
};

use super::{
    commands,
    state::{derive_view, PurificationStatus, PurificationView},
};

// Set to false to silence per-transition logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Owns the session's view of the purification cycle.
///
/// One spawned driver task merges the two event sources, snapshot-changed
/// and tick-elapsed, into a single ordered stream: snapshots apply in
/// delivery order, and a one-second tick runs only while the derived status
/// is Purifying. The derived [`PurificationView`] is published through a
/// watch channel; presentation consumers read it and call the command
/// methods, never the document itself.
pub struct PurificationController {
    channel: Arc<dyn ControlChannel>,
    clock: Arc<dyn Clock>,
    control_rx: watch::Receiver<ControlDocument>,
    view_rx: watch::Receiver<PurificationView>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl PurificationController {
    /// Subscribe to the channel and spawn the driver task. Must be called
    /// from within a tokio runtime.
    pub fn spawn(
        channel: Arc<dyn ControlChannel>,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
        default_total_secs: f64,
    ) -> Self {
        let control_rx = channel.subscribe_control();
        let initial = derive_view(&control_rx.borrow().clone(), clock.now(), default_total_secs);
        let (view_tx, view_rx) = watch::channel(initial);

        let cancel = CancellationToken::new();
        let driver = CycleDriver {
            channel: channel.clone(),
            clock: clock.clone(),
            control_rx: channel.subscribe_control(),
            view_tx,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            default_total_secs,
            stop_issued: false,
        };
        let handle = tokio::spawn(driver.run(cancel.clone()));

        Self {
            channel,
            clock,
            control_rx,
            view_rx,
            cancel,
            driver: Mutex::new(Some(handle)),
        }
    }

    /// Receiver for derived view updates; await `changed()` to follow the
    /// cycle.
    pub fn view(&self) -> watch::Receiver<PurificationView> {
        self.view_rx.clone()
    }

    pub fn current_view(&self) -> PurificationView {
        self.view_rx.borrow().clone()
    }

    fn snapshot(&self) -> ControlDocument {
        self.control_rx.borrow().clone()
    }

    /// Begin a fresh cycle from zero.
    pub async fn start(&self) -> Result<()> {
        self.channel
            .patch_control(commands::start_patch(self.clock.now()))
            .await
    }

    /// Freeze the running cycle. Elapsed time comes from this session's
    /// cached start timestamp, not a remote read; concurrent pausers race
    /// and the last write wins.
    pub async fn pause(&self) -> Result<()> {
        let start = self.snapshot().uvc_start_time.map(|ts| ts.0);
        self.channel
            .patch_control(commands::pause_patch(self.clock.now(), start))
            .await
    }

    /// Continue from the recorded paused elapsed with no progress jump.
    pub async fn resume(&self) -> Result<()> {
        let paused_elapsed = self.snapshot().paused_elapsed;
        self.channel
            .patch_control(commands::resume_patch(self.clock.now(), paused_elapsed))
            .await
    }

    /// Reset fully, from any state.
    pub async fn stop(&self) -> Result<()> {
        self.channel
            .patch_control(commands::stop_patch(self.clock.now()))
            .await
    }

    /// Dashboard toggle: maps to start or stop.
    pub async fn set_active(&self, active: bool) -> Result<()> {
        if active {
            self.start().await
        } else {
            self.stop().await
        }
    }

    /// Cancel the driver task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.driver.lock().await.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PurificationController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct CycleDriver {
    channel: Arc<dyn ControlChannel>,
    clock: Arc<dyn Clock>,
    control_rx: watch::Receiver<ControlDocument>,
    view_tx: watch::Sender<PurificationView>,
    tick_interval: Duration,
    default_total_secs: f64,
    /// Per-episode latch for the completion auto-stop.
    stop_issued: bool,
}

impl CycleDriver {
    async fn run(mut self, cancel: CancellationToken) {
        let mut ticker: Option<time::Interval> = None;

        // A snapshot that is already past its exposure time at subscribe
        // time must still complete and stop exactly once.
        self.recompute(&mut ticker).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log_info!("purification driver shutting down");
                    break;
                }
                changed = self.control_rx.changed() => {
                    if changed.is_err() {
                        log_warn!("control channel closed; purification driver exiting");
                        break;
                    }
                    self.recompute(&mut ticker).await;
                }
                _ = next_tick(ticker.as_mut()) => {
                    self.recompute(&mut ticker).await;
                }
            }
        }
    }

    async fn recompute(&mut self, ticker: &mut Option<time::Interval>) {
        let doc = self.control_rx.borrow_and_update().clone();
        let view = derive_view(&doc, self.clock.now(), self.default_total_secs);

        let previous = self.view_tx.borrow().status;
        if previous != view.status {
            log_info!("purification status {previous:?} -> {:?}", view.status);
        }

        self.arm_or_disarm(ticker, view.status);

        let completed = view.status == PurificationStatus::Completed;
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });

        if completed {
            self.auto_stop(&doc).await;
        } else {
            self.stop_issued = false;
        }
    }

    /// The tick runs only while Purifying. Entering the state arms a fresh
    /// interval (first fire one full period out); leaving it drops the
    /// interval, so no stale tick survives a stop, pause, or completion.
    fn arm_or_disarm(&self, ticker: &mut Option<time::Interval>, status: PurificationStatus) {
        let should_tick = status == PurificationStatus::Purifying;
        match (should_tick, ticker.is_some()) {
            (true, false) => {
                let mut interval =
                    time::interval_at(time::Instant::now() + self.tick_interval, self.tick_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                *ticker = Some(interval);
            }
            (false, true) => {
                *ticker = None;
            }
            _ => {}
        }
    }

    /// Edge-triggered: fires once per completed episode while the document
    /// still reads active. Once the stop lands the guard fails and the
    /// latch resets on the next non-completed derivation.
    async fn auto_stop(&mut self, doc: &ControlDocument) {
        if !doc.active || self.stop_issued {
            return;
        }
        self.stop_issued = true;
        log_info!("exposure time reached; issuing stop");
        if let Err(err) = self
            .channel
            .patch_control(commands::stop_patch(self.clock.now()))
            .await
        {
            // The document still reads active, so the next snapshot
            // delivery retries; the view stays Completed meanwhile.
            log_error!("auto-stop write failed: {err:#}");
            self.stop_issued = false;
        }
    }
}

async fn next_tick(ticker: Option<&mut time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
