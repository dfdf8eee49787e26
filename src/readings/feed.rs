use std::{
    collections::VecDeque,
    sync::{Arc, Mutex as StdMutex},
};

use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{models::SensorReading, store::ControlChannel};

// Set to false to silence per-reading logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Follows the store's sensor-reading stream for one session: the latest
/// reading is published through a watch channel, and a bounded buffer keeps
/// the most recent entries newest-first for sparkline-style consumers.
///
/// A lagged subscription drops the missed readings and carries on; history
/// beyond the buffer lives in the remote store, not here.
pub struct ReadingsFeed {
    latest_rx: watch::Receiver<Option<SensorReading>>,
    recent: Arc<StdMutex<VecDeque<SensorReading>>>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReadingsFeed {
    /// Subscribe and spawn the feed worker. Must be called from within a
    /// tokio runtime.
    pub fn spawn(channel: Arc<dyn ControlChannel>, retention: usize) -> Self {
        let rx = channel.subscribe_readings();
        let (latest_tx, latest_rx) = watch::channel(None);
        let recent = Arc::new(StdMutex::new(VecDeque::with_capacity(retention)));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(feed_loop(
            rx,
            latest_tx,
            recent.clone(),
            retention,
            cancel.clone(),
        ));

        Self {
            latest_rx,
            recent,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Most recently observed reading, if any has arrived yet.
    pub fn latest(&self) -> Option<SensorReading> {
        self.latest_rx.borrow().clone()
    }

    /// Receiver for latest-reading updates; await `changed()` to follow.
    pub fn watch_latest(&self) -> watch::Receiver<Option<SensorReading>> {
        self.latest_rx.clone()
    }

    /// Recent readings, newest first, bounded by the configured retention.
    pub fn recent(&self) -> Vec<SensorReading> {
        self.recent.lock().unwrap().iter().cloned().collect()
    }

    /// Cancel the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ReadingsFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn feed_loop(
    mut rx: broadcast::Receiver<SensorReading>,
    latest_tx: watch::Sender<Option<SensorReading>>,
    recent: Arc<StdMutex<VecDeque<SensorReading>>>,
    retention: usize,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log_info!("readings feed shutting down");
                break;
            }
            received = rx.recv() => match received {
                Ok(reading) => {
                    {
                        let mut buffer = recent.lock().unwrap();
                        buffer.push_front(reading.clone());
                        buffer.truncate(retention);
                    }
                    latest_tx.send_replace(Some(reading));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log_warn!("readings stream lagged; dropped {missed} readings");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    log_warn!("readings stream closed; feed exiting");
                    break;
                }
            }
        }
    }
}
