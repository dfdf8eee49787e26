//! Intent-to-patch construction for the four cycle commands.
//!
//! Every command is a fire-and-forget idempotent merge: the patch is fully
//! determined by the local clock and the session's cached snapshot, never
//! by a read-back of the remote value. Concurrent sessions race and the
//! store's last-write-wins merge decides.

use chrono::{DateTime, Duration, Utc};

use crate::models::ControlPatch;

/// Begin a fresh cycle from zero. Callable from Idle or Completed; a
/// repeated start simply restarts the clock.
pub fn start_patch(now: DateTime<Utc>) -> ControlPatch {
    ControlPatch {
        active: Some(true),
        paused: Some(false),
        paused_elapsed: Some(0.0),
        uvc_start_time: Some(now.into()),
        last_updated: Some(now.into()),
        ..ControlPatch::default()
    }
}

/// Freeze the cycle, capturing elapsed time from the locally cached start
/// timestamp. A session with no cached start records zero elapsed.
pub fn pause_patch(now: DateTime<Utc>, start: Option<DateTime<Utc>>) -> ControlPatch {
    let elapsed = start
        .map(|s| (now - s).num_milliseconds().max(0) as f64 / 1000.0)
        .unwrap_or(0.0);

    ControlPatch {
        active: Some(false),
        paused: Some(true),
        paused_elapsed: Some(elapsed),
        last_updated: Some(now.into()),
        ..ControlPatch::default()
    }
}

/// Continue a paused cycle with no discontinuity: the start timestamp is
/// back-dated so that `now - start` equals the recorded paused elapsed.
/// `pausedElapsed` stays in the document but is not authoritative once
/// active again.
pub fn resume_patch(now: DateTime<Utc>, paused_elapsed: f64) -> ControlPatch {
    let offset = Duration::milliseconds((paused_elapsed.max(0.0) * 1000.0).round() as i64);

    ControlPatch {
        active: Some(true),
        paused: Some(false),
        uvc_start_time: Some((now - offset).into()),
        last_updated: Some(now.into()),
        ..ControlPatch::default()
    }
}

/// Reset fully. Callable from any state; also issued by the controller when
/// a running cycle reaches its exposure time.
pub fn stop_patch(now: DateTime<Utc>) -> ControlPatch {
    ControlPatch {
        active: Some(false),
        paused: Some(false),
        paused_elapsed: Some(0.0),
        last_updated: Some(now.into()),
        ..ControlPatch::default()
    }
}
