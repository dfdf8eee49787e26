//! Client core for a UV-C water-purification dashboard.
//!
//! The purification cycle's true state lives in a shared remote document
//! observed by any number of client sessions; this crate derives a
//! consistent, monotonically progressing view of that cycle and issues the
//! start / pause / resume / stop intents as merge-patches. The remote store
//! itself, authentication, and all rendering are external collaborators
//! behind the [`store::ControlChannel`] seam.

pub mod clock;
pub mod models;
pub mod readings;
pub mod settings;
pub mod store;
pub mod timer;
mod utils;

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::watch;
use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use models::{ControlDocument, ControlPatch, RemoteTimestamp, SensorReading};
pub use readings::ReadingsFeed;
pub use settings::{ClientSettings, SettingsStore};
pub use store::{ControlChannel, MemoryControlChannel};
pub use timer::{derive_view, PurificationController, PurificationStatus, PurificationView};
pub use utils::logging::init_logging;

/// One dashboard session: the purification controller and the sensor
/// readings feed wired to a shared channel and clock.
pub struct PurifierClient {
    session_id: Uuid,
    controller: PurificationController,
    feed: ReadingsFeed,
}

impl PurifierClient {
    /// Wire up a session and spawn its driver tasks. Must be called from
    /// within a tokio runtime.
    pub fn connect(
        channel: Arc<dyn ControlChannel>,
        clock: Arc<dyn Clock>,
        settings: ClientSettings,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!("purifier client session {session_id} connecting");

        let controller = PurificationController::spawn(
            channel.clone(),
            clock,
            settings.tick_interval(),
            settings.default_exposure_secs,
        );
        let feed = ReadingsFeed::spawn(channel, settings.readings_retention);

        Self {
            session_id,
            controller,
            feed,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Receiver for derived cycle view updates.
    pub fn view(&self) -> watch::Receiver<PurificationView> {
        self.controller.view()
    }

    pub fn current_view(&self) -> PurificationView {
        self.controller.current_view()
    }

    pub async fn start(&self) -> Result<()> {
        self.controller.start().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.controller.pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.controller.resume().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.controller.stop().await
    }

    pub async fn set_active(&self, active: bool) -> Result<()> {
        self.controller.set_active(active).await
    }

    pub fn latest_reading(&self) -> Option<SensorReading> {
        self.feed.latest()
    }

    pub fn watch_latest_reading(&self) -> watch::Receiver<Option<SensorReading>> {
        self.feed.watch_latest()
    }

    pub fn recent_readings(&self) -> Vec<SensorReading> {
        self.feed.recent()
    }

    /// Cancel both driver tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
        self.feed.shutdown().await;
        info!("purifier client session {} disconnected", self.session_id);
    }
}
