use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;

use crate::{
    clock::ManualClock,
    models::{ControlDocument, RemoteTimestamp},
    store::MemoryControlChannel,
    timer::{PurificationController, PurificationStatus, PurificationView},
};

const TOTAL: f64 = 30.0;
const TICK: Duration = Duration::from_secs(1);

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn doc_with_exposure(secs: f64) -> ControlDocument {
    ControlDocument {
        exposure_time: Some(secs),
        ..ControlDocument::default()
    }
}

fn spawn_controller(
    channel: &Arc<MemoryControlChannel>,
    clock: &Arc<ManualClock>,
) -> PurificationController {
    PurificationController::spawn(channel.clone(), clock.clone(), TICK, TOTAL)
}

async fn wait_for_view(
    rx: &mut watch::Receiver<PurificationView>,
    predicate: impl Fn(&PurificationView) -> bool,
) -> PurificationView {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            {
                let view = rx.borrow();
                if predicate(&view) {
                    return view.clone();
                }
            }
            rx.changed().await.expect("view channel closed");
        }
    })
    .await
    .expect("timed out waiting for view")
}

async fn wait_for_status(
    rx: &mut watch::Receiver<PurificationView>,
    status: PurificationStatus,
) -> PurificationView {
    wait_for_view(rx, |view| view.status == status).await
}

#[tokio::test(start_paused = true)]
async fn start_drives_view_to_purifying() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(TOTAL)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    assert_eq!(rx.borrow().status, PurificationStatus::Idle);

    controller.start().await.unwrap();
    let view = wait_for_status(&mut rx, PurificationStatus::Purifying).await;
    assert_eq!(view.remaining_seconds, 30);
    assert_eq!(view.total_seconds, 30);
    assert_eq!(view.progress_percent, 0.0);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn ticks_recompute_the_countdown() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(TOTAL)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    controller.start().await.unwrap();
    wait_for_status(&mut rx, PurificationStatus::Purifying).await;

    clock.advance_secs(10.0);
    let view = wait_for_view(&mut rx, |v| v.remaining_seconds == 20).await;
    assert_eq!(view.status, PurificationStatus::Purifying);
    assert!((view.progress_percent - 100.0 * 10.0 / 30.0).abs() < 0.01);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn completion_issues_exactly_one_stop() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(5.0)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    controller.start().await.unwrap();
    wait_for_status(&mut rx, PurificationStatus::Purifying).await;

    clock.advance_secs(6.0);
    wait_for_status(&mut rx, PurificationStatus::Idle).await;

    let patches = channel.recorded_patches();
    assert_eq!(patches.len(), 2, "expected the start and one auto-stop");
    let stop = &patches[1];
    assert_eq!(stop.active, Some(false));
    assert_eq!(stop.paused, Some(false));
    assert_eq!(stop.paused_elapsed, Some(0.0));

    // More ticks and time must not re-fire the stop for this episode.
    clock.advance_secs(10.0);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(channel.recorded_patches().len(), 2);

    let doc = channel.document();
    assert!(!doc.active);
    assert!(!doc.paused);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn snapshot_already_expired_at_subscribe_still_stops_once() {
    let channel = Arc::new(MemoryControlChannel::with_document(ControlDocument {
        active: true,
        uvc_start_time: Some(RemoteTimestamp(t0() - chrono::Duration::seconds(10))),
        exposure_time: Some(5.0),
        ..ControlDocument::default()
    }));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    wait_for_status(&mut rx, PurificationStatus::Idle).await;
    assert_eq!(channel.recorded_patches().len(), 1, "only the auto-stop");

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_the_view_and_resume_continues_seamlessly() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(TOTAL)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    controller.start().await.unwrap();
    wait_for_status(&mut rx, PurificationStatus::Purifying).await;

    clock.advance_secs(10.0);
    controller.pause().await.unwrap();
    let view = wait_for_status(&mut rx, PurificationStatus::Paused).await;
    assert_eq!(view.remaining_seconds, 20);
    assert!((view.progress_percent - 100.0 * 10.0 / 30.0).abs() < 0.01);
    assert_eq!(channel.document().paused_elapsed, 10.0);

    // Paused means no ticking: wall-clock time passing changes nothing.
    clock.advance_secs(5.0);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let frozen = rx.borrow().clone();
    assert_eq!(frozen.status, PurificationStatus::Paused);
    assert_eq!(frozen.remaining_seconds, 20);

    controller.resume().await.unwrap();
    let view = wait_for_status(&mut rx, PurificationStatus::Purifying).await;
    assert_eq!(view.remaining_seconds, 20, "no jump across resume");

    clock.advance_secs(5.0);
    let view = wait_for_view(&mut rx, |v| v.remaining_seconds == 15).await;
    assert_eq!(view.progress_percent, 50.0);

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn set_active_maps_to_start_and_stop() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(TOTAL)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let mut rx = controller.view();

    controller.set_active(true).await.unwrap();
    wait_for_status(&mut rx, PurificationStatus::Purifying).await;

    controller.set_active(false).await.unwrap();
    wait_for_status(&mut rx, PurificationStatus::Idle).await;

    let patches = channel.recorded_patches();
    assert_eq!(patches.len(), 2);
    assert!(patches[0].uvc_start_time.is_some());
    assert_eq!(patches[1].active, Some(false));
    assert!(patches[1].uvc_start_time.is_none());

    controller.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_processing_snapshots() {
    let channel = Arc::new(MemoryControlChannel::with_document(doc_with_exposure(TOTAL)));
    let clock = Arc::new(ManualClock::new(t0()));
    let controller = spawn_controller(&channel, &clock);
    let rx = controller.view();

    controller.shutdown().await;

    controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(rx.borrow().status, PurificationStatus::Idle);
}
