use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ControlDocument;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurificationStatus {
    Idle,
    Purifying,
    Paused,
    Completed,
}

impl Default for PurificationStatus {
    fn default() -> Self {
        PurificationStatus::Idle
    }
}

/// What the dashboard renders: a pure function of the latest control
/// document snapshot and the wall clock, recomputed on every tick and on
/// every snapshot change. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurificationView {
    pub status: PurificationStatus,
    pub progress_percent: f64,
    pub remaining_seconds: u64,
    pub total_seconds: u64,
}

impl PurificationView {
    pub fn idle(total_secs: f64) -> Self {
        Self {
            status: PurificationStatus::Idle,
            progress_percent: 0.0,
            remaining_seconds: 0,
            total_seconds: total_secs.round() as u64,
        }
    }
}

impl Default for PurificationView {
    fn default() -> Self {
        Self::idle(0.0)
    }
}

/// Derive the cycle view from a document snapshot. Evaluated in priority
/// order: Paused, then Purifying/Completed, then Idle.
///
/// Total derivation: inconsistent documents degrade (active without a start
/// time reads as Idle, zero duration completes immediately) instead of
/// erroring, since the next valid snapshot recovers the view.
pub fn derive_view(
    doc: &ControlDocument,
    now: DateTime<Utc>,
    default_total_secs: f64,
) -> PurificationView {
    let total = doc.exposure_time.unwrap_or(default_total_secs).max(0.0);

    if doc.paused {
        let elapsed = doc.paused_elapsed.max(0.0);
        let remaining = (total - elapsed).max(0.0);
        return PurificationView {
            status: PurificationStatus::Paused,
            progress_percent: progress(elapsed, total),
            remaining_seconds: remaining.round() as u64,
            total_seconds: total.round() as u64,
        };
    }

    if doc.active {
        let Some(start) = doc.uvc_start_time else {
            // Active without a start time is an inconsistent remote write.
            return PurificationView::idle(total);
        };

        let elapsed = elapsed_secs(start.0, now);
        if elapsed >= total {
            return PurificationView {
                status: PurificationStatus::Completed,
                progress_percent: 100.0,
                remaining_seconds: 0,
                total_seconds: total.round() as u64,
            };
        }

        return PurificationView {
            status: PurificationStatus::Purifying,
            progress_percent: progress(elapsed, total),
            remaining_seconds: (total - elapsed).round() as u64,
            total_seconds: total.round() as u64,
        };
    }

    PurificationView::idle(total)
}

/// Seconds since `start`, clamped to zero: another session's clock may have
/// written a start time that is still in our future.
fn elapsed_secs(start: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - start).num_milliseconds().max(0) as f64 / 1000.0
}

fn progress(elapsed: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 100.0;
    }
    (elapsed / total * 100.0).clamp(0.0, 100.0)
}
