use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::models::{ControlDocument, ControlPatch, SensorReading};

use super::ControlChannel;

const READINGS_CHANNEL_CAPACITY: usize = 64;

/// In-process [`ControlChannel`]: the control document lives behind a watch
/// channel and merge-patches are applied field by field, which is exactly
/// the behavior the remote store promises. Every accepted patch is also
/// recorded so tests can assert on command shapes and counts.
pub struct MemoryControlChannel {
    control_tx: watch::Sender<ControlDocument>,
    readings_tx: broadcast::Sender<SensorReading>,
    patches: Mutex<Vec<ControlPatch>>,
}

impl MemoryControlChannel {
    pub fn new() -> Self {
        Self::with_document(ControlDocument::default())
    }

    pub fn with_document(doc: ControlDocument) -> Self {
        let (control_tx, _) = watch::channel(doc);
        let (readings_tx, _) = broadcast::channel(READINGS_CHANNEL_CAPACITY);
        Self {
            control_tx,
            readings_tx,
            patches: Mutex::new(Vec::new()),
        }
    }

    /// Current merged state of the control document.
    pub fn document(&self) -> ControlDocument {
        self.control_tx.borrow().clone()
    }

    /// Feed a sensor reading to all subscribers, as the device side would.
    pub fn publish_reading(&self, reading: SensorReading) {
        let _ = self.readings_tx.send(reading);
    }

    /// Every patch accepted so far, oldest first.
    pub fn recorded_patches(&self) -> Vec<ControlPatch> {
        self.patches.lock().unwrap().clone()
    }
}

impl Default for MemoryControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlChannel for MemoryControlChannel {
    fn subscribe_control(&self) -> watch::Receiver<ControlDocument> {
        self.control_tx.subscribe()
    }

    fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading> {
        self.readings_tx.subscribe()
    }

    async fn patch_control(&self, patch: ControlPatch) -> Result<()> {
        self.patches.lock().unwrap().push(patch.clone());
        self.control_tx.send_modify(|doc| patch.apply(doc));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn patches_merge_without_clobbering_unnamed_fields() {
        let channel = MemoryControlChannel::with_document(ControlDocument {
            exposure_time: Some(45.0),
            ..ControlDocument::default()
        });

        channel
            .patch_control(ControlPatch {
                active: Some(true),
                paused: Some(false),
                ..ControlPatch::default()
            })
            .await
            .unwrap();

        let doc = channel.document();
        assert!(doc.active);
        assert_eq!(doc.exposure_time, Some(45.0), "merge must not drop fields");
    }

    #[tokio::test]
    async fn subscribers_observe_every_revision_eventually() {
        let channel = MemoryControlChannel::new();
        let mut rx = channel.subscribe_control();

        channel
            .patch_control(ControlPatch {
                active: Some(true),
                ..ControlPatch::default()
            })
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().active);
    }

    #[tokio::test]
    async fn readings_reach_subscribers() {
        let channel = MemoryControlChannel::new();
        let mut rx = channel.subscribe_readings();

        channel.publish_reading(SensorReading {
            id: "r1".into(),
            turbidity: 2.0,
            ..SensorReading::default()
        });

        let reading = rx.recv().await.unwrap();
        assert_eq!(reading.id, "r1");
    }
}
