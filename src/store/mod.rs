//! Seam to the managed real-time document store.
//!
//! The store itself (auth, transport, retry) is an external collaborator;
//! this crate only defines the capabilities it must provide and ships an
//! in-process implementation for tests and loopback use.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::models::{ControlDocument, ControlPatch, SensorReading};

pub mod memory;

pub use memory::MemoryControlChannel;

/// Connection to the shared remote store.
///
/// `subscribe_control` delivers every observed revision of the control
/// document with at-least-once semantics; delivery eventually reflects the
/// latest remote write but carries no stronger ordering guarantee across
/// sessions. Dropping the receiver unsubscribes.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Revisions of the control document, latest value always readable.
    fn subscribe_control(&self) -> watch::Receiver<ControlDocument>;

    /// Stream of sensor readings as the device records them.
    fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading>;

    /// Merge-write the named fields of the control document. Resolves on
    /// acknowledged write, errors on transport failure; there is no
    /// application-level error contract beyond pass-through.
    async fn patch_control(&self, patch: ControlPatch) -> Result<()>;
}
