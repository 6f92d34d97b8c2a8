//! Integration tests for connection lifecycle and fan-out.
//!
//! Viewers here are in-memory recorders, so every property is checked
//! against exactly what each viewer was handed, without a network.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use axum::extract::ws::Utf8Bytes;
use sailwatch_core::TelemetrySink;
use sailwatch_relay::{BroadcastReport, BroadcastServer, RelayConfig, RelayError, SendError, Viewer};
use sailwatch_types::{ConnectionId, Location, MarkerRole, MarkerStore, TelemetrySnapshot, WireMessage};

/// How a [`RecordingViewer`] answers `send`.
#[derive(Debug, Clone, Copy)]
enum Mode {
    Accept,
    RejectEncoding,
    Closed,
    Backlogged,
    /// Accept this many frames, then report a closed channel.
    FailAfter(usize),
}

struct RecordingViewer {
    id: ConnectionId,
    mode: Mode,
    attempts: AtomicUsize,
    close_requested: AtomicBool,
    log: Mutex<Vec<WireMessage>>,
}

impl RecordingViewer {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            mode,
            attempts: AtomicUsize::new(0),
            close_requested: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        })
    }

    fn log(&self) -> Vec<WireMessage> {
        self.log.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Viewer for RecordingViewer {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: &Utf8Bytes) -> Result<(), SendError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let accept = match self.mode {
            Mode::Accept => Ok(()),
            Mode::RejectEncoding => Err(SendError::Encoding(String::from("bad value"))),
            Mode::Closed => Err(SendError::Closed),
            Mode::Backlogged => Err(SendError::Backlogged),
            Mode::FailAfter(n) if attempt < n => Ok(()),
            Mode::FailAfter(_) => Err(SendError::Closed),
        };
        accept?;
        let msg: WireMessage = serde_json::from_str(frame.as_str()).unwrap();
        self.log.lock().unwrap().push(msg);
        Ok(())
    }

    fn close(&self) {
        self.close_requested.store(true, Ordering::SeqCst);
    }
}

fn as_viewer(v: &Arc<RecordingViewer>) -> Arc<dyn Viewer> {
    Arc::clone(v) as Arc<dyn Viewer>
}

fn marker(role: MarkerRole, lat: f64, lon: f64) -> WireMessage {
    WireMessage::Marker {
        role,
        location: Location::new(lat, lon),
    }
}

fn server(targets: &[(f64, f64)], boundaries: &[(f64, f64)]) -> BroadcastServer {
    let to_locations =
        |pairs: &[(f64, f64)]| pairs.iter().map(|&(lat, lon)| Location::new(lat, lon)).collect();
    let store = MarkerStore::new(to_locations(targets), to_locations(boundaries));
    BroadcastServer::new(store, RelayConfig::default()).unwrap()
}

fn snapshot(timestamp: f64) -> TelemetrySnapshot {
    TelemetrySnapshot {
        timestamp,
        location: Location::new(5.0, 5.0),
        heading: 90.0,
        speed: 2.5,
        wind_dir: 45.0,
        roll: 1.0,
        pitch: -1.0,
        yaw: 88.0,
        state: 1,
    }
}

// =========================================================================
// Replay then register
// =========================================================================

#[test]
fn late_joiner_gets_markers_then_live_data() {
    let server = server(&[(1.0, 1.0)], &[(2.0, 2.0)]);
    let a = RecordingViewer::new(Mode::Accept);
    let b = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&a)).unwrap();
    server.open(as_viewer(&b)).unwrap();
    let a_before = a.log();
    let b_before = b.log();

    let c = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&c)).unwrap();
    assert_eq!(
        c.log(),
        vec![
            marker(MarkerRole::Target, 1.0, 1.0),
            marker(MarkerRole::Boundary, 2.0, 2.0),
        ]
    );

    let snap = TelemetrySnapshot {
        timestamp: 100.0,
        location: Location::new(5.0, 5.0),
        heading: 90.0,
        ..TelemetrySnapshot::default()
    };
    let report = server.broadcast(&snap);
    assert_eq!(report.delivered, 3);

    for (viewer, before) in [(&a, a_before), (&b, b_before)] {
        let mut expected = before;
        expected.push(WireMessage::Data(snap));
        assert_eq!(viewer.log(), expected);
    }
    assert_eq!(c.log().last(), Some(&WireMessage::Data(snap)));
    assert_eq!(c.log().len(), 3);
}

#[test]
fn replay_preserves_group_and_insertion_order() {
    let server = server(
        &[(10.0, 1.0), (11.0, 1.0)],
        &[(20.0, 2.0), (21.0, 2.0), (22.0, 2.0)],
    );
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();
    server.broadcast(&snapshot(1.0));

    assert_eq!(
        viewer.log(),
        vec![
            marker(MarkerRole::Target, 10.0, 1.0),
            marker(MarkerRole::Target, 11.0, 1.0),
            marker(MarkerRole::Boundary, 20.0, 2.0),
            marker(MarkerRole::Boundary, 21.0, 2.0),
            marker(MarkerRole::Boundary, 22.0, 2.0),
            WireMessage::Data(snapshot(1.0)),
        ]
    );
}

#[test]
fn failed_replay_never_registers() {
    let server = server(&[(1.0, 1.0)], &[(2.0, 2.0)]);
    let viewer = RecordingViewer::new(Mode::FailAfter(1));

    let err = server.open(as_viewer(&viewer)).unwrap_err();
    assert!(matches!(
        err,
        RelayError::Replay { sent: 1, source: SendError::Closed, .. }
    ));
    assert!(!server.is_registered(viewer.id()));
    assert_eq!(server.viewer_count(), 0);

    // The frame accepted before the failure stays delivered.
    assert_eq!(viewer.log(), vec![marker(MarkerRole::Target, 1.0, 1.0)]);

    // No live telemetry ever reaches it.
    let attempts = viewer.attempts();
    server.broadcast(&snapshot(2.0));
    assert_eq!(viewer.attempts(), attempts);
}

fn encoded_len(role: MarkerRole, lat: f64, lon: f64) -> usize {
    serde_json::to_string(&marker(role, lat, lon)).unwrap().len()
}

#[test]
fn marker_frames_over_the_frame_limit_are_rejected_at_construction() {
    let markers = || MarkerStore::new(vec![Location::new(1.0, 1.0)], vec![Location::new(2.0, 2.0)]);
    let target_len = encoded_len(MarkerRole::Target, 1.0, 1.0);
    let boundary_len = encoded_len(MarkerRole::Boundary, 2.0, 2.0);
    assert!(boundary_len > target_len);

    let config = |max_frame_bytes| RelayConfig {
        queue_capacity: 8,
        max_frame_bytes,
    };

    let err = BroadcastServer::new(markers(), config(32)).unwrap_err();
    assert!(matches!(err, RelayError::ReplayFrameTooLarge { index: 0, limit: 32, .. }));

    // The target fits, the boundary does not.
    let err = BroadcastServer::new(markers(), config(target_len)).unwrap_err();
    assert!(matches!(
        err,
        RelayError::ReplayFrameTooLarge { index: 1, len, .. } if len == boundary_len
    ));

    // A limit that fits every marker leaves the relay usable.
    let server = BroadcastServer::new(markers(), config(boundary_len)).unwrap();
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();
    assert_eq!(viewer.log().len(), 2);

    // Without markers any limit is accepted.
    assert!(BroadcastServer::new(MarkerStore::default(), config(1)).is_ok());
}

#[test]
fn viewer_without_markers_registers_immediately() {
    let server = server(&[], &[]);
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();
    assert!(viewer.log().is_empty());
    assert!(server.is_registered(viewer.id()));
}

// =========================================================================
// Membership
// =========================================================================

#[test]
fn repeated_open_and_disconnect_keep_single_membership() {
    let server = server(&[], &[]);
    let viewer = RecordingViewer::new(Mode::Accept);

    server.open(as_viewer(&viewer)).unwrap();
    server.open(as_viewer(&viewer)).unwrap();
    assert_eq!(server.viewer_count(), 1);

    server.broadcast(&snapshot(1.0));
    assert_eq!(viewer.log().len(), 1);

    server.disconnect(viewer.id());
    server.disconnect(viewer.id());
    server.disconnect(ConnectionId::new());
    assert_eq!(server.viewer_count(), 0);
}

#[test]
fn disconnected_viewer_receives_nothing_more() {
    let server = server(&[], &[]);
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();
    server.disconnect(viewer.id());

    let report = server.broadcast(&snapshot(1.0));
    assert_eq!(report, BroadcastReport::default());
    assert_eq!(viewer.attempts(), 0);
}

// =========================================================================
// Fan-out failure policy
// =========================================================================

#[test]
fn encoding_failure_is_isolated_and_keeps_the_viewer() {
    let server = server(&[], &[]);
    let healthy: Vec<_> = (0..4).map(|_| RecordingViewer::new(Mode::Accept)).collect();
    let faulty = RecordingViewer::new(Mode::RejectEncoding);

    let (before, after) = healthy.split_at(2);
    for viewer in before {
        server.open(as_viewer(viewer)).unwrap();
    }
    server.open(as_viewer(&faulty)).unwrap();
    for viewer in after {
        server.open(as_viewer(viewer)).unwrap();
    }

    let snap = snapshot(7.0);
    let report = server.broadcast(&snap);
    assert_eq!(
        report,
        BroadcastReport {
            delivered: 4,
            rejected: 1,
            dropped: 0,
        }
    );
    for viewer in &healthy {
        assert_eq!(viewer.log(), vec![WireMessage::Data(snap)]);
    }

    // Still registered, offered the next frame once, never a resend.
    assert!(server.is_registered(faulty.id()));
    assert_eq!(faulty.attempts(), 1);
    server.broadcast(&snapshot(8.0));
    assert_eq!(faulty.attempts(), 2);
}

#[test]
fn closed_viewer_is_removed_and_others_still_receive() {
    let server = server(&[], &[]);
    let healthy = RecordingViewer::new(Mode::Accept);
    let closed = RecordingViewer::new(Mode::Closed);

    // An empty marker set lets the closed viewer through replay.
    server.open(as_viewer(&closed)).unwrap();
    server.open(as_viewer(&healthy)).unwrap();

    let report = server.broadcast(&snapshot(1.0));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 1);
    assert!(!server.is_registered(closed.id()));

    server.broadcast(&snapshot(2.0));
    assert_eq!(closed.attempts(), 1);
    assert_eq!(healthy.log().len(), 2);
}

#[test]
fn backlogged_viewer_is_closed_and_removed() {
    let server = server(&[], &[]);
    let stalled = RecordingViewer::new(Mode::Backlogged);
    let healthy = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&stalled)).unwrap();
    server.open(as_viewer(&healthy)).unwrap();

    let report = server.broadcast(&snapshot(1.0));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 1);
    assert!(stalled.close_requested.load(Ordering::SeqCst));
    assert!(!server.is_registered(stalled.id()));
    assert!(server.is_registered(healthy.id()));
}

// =========================================================================
// Drop semantics
// =========================================================================

#[test]
fn broadcast_without_viewers_is_dropped() {
    let server = server(&[(1.0, 1.0)], &[]);
    assert_eq!(server.broadcast(&snapshot(1.0)), BroadcastReport::default());

    // A viewer joining afterwards gets markers only, no catch-up.
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();
    assert_eq!(viewer.log(), vec![marker(MarkerRole::Target, 1.0, 1.0)]);
}

// =========================================================================
// Close all
// =========================================================================

#[test]
fn close_all_requests_close_without_removing() {
    let server = server(&[], &[]);
    let viewers: Vec<_> = (0..3).map(|_| RecordingViewer::new(Mode::Accept)).collect();
    for viewer in &viewers {
        server.open(as_viewer(viewer)).unwrap();
    }

    assert_eq!(server.close_all(), 3);
    assert!(viewers.iter().all(|v| v.close_requested.load(Ordering::SeqCst)));
    assert_eq!(server.viewer_count(), 3);

    // Removal follows the transport's close signal.
    for viewer in &viewers {
        server.disconnect(viewer.id());
    }
    assert_eq!(server.viewer_count(), 0);
}

#[test]
fn close_all_with_no_viewers() {
    let server = server(&[], &[]);
    assert_eq!(server.close_all(), 0);
}

// =========================================================================
// Sink seam, log frames, concurrency
// =========================================================================

#[test]
fn publish_through_sink_trait() {
    let server = server(&[], &[]);
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();

    let sink: &dyn TelemetrySink = &server;
    sink.publish(&snapshot(3.0));
    assert_eq!(viewer.log(), vec![WireMessage::Data(snapshot(3.0))]);
}

#[test]
fn log_records_reach_viewers() {
    let server = server(&[], &[]);
    let viewer = RecordingViewer::new(Mode::Accept);
    server.open(as_viewer(&viewer)).unwrap();

    let report = server.broadcast_log("ERROR", "rudder servo not responding");
    assert_eq!(report.delivered, 1);
    assert_eq!(
        viewer.log(),
        vec![WireMessage::Log {
            level: String::from("ERROR"),
            message: String::from("rudder servo not responding"),
        }]
    );
}

#[test]
fn concurrent_joins_never_see_data_before_markers() {
    let server = Arc::new(server(&[(1.0, 1.0), (1.5, 1.5)], &[(2.0, 2.0)]));
    let viewers: Vec<_> = (0..32).map(|_| RecordingViewer::new(Mode::Accept)).collect();

    thread::scope(|scope| {
        let publisher = Arc::clone(&server);
        scope.spawn(move || {
            for tick in 0..200_u32 {
                publisher.broadcast(&snapshot(f64::from(tick)));
            }
        });
        for chunk in viewers.chunks(8) {
            let server = Arc::clone(&server);
            scope.spawn(move || {
                for viewer in chunk {
                    server.open(as_viewer(viewer)).unwrap();
                }
                // Half of them leave again while broadcasts continue.
                for viewer in chunk.iter().step_by(2) {
                    server.disconnect(viewer.id());
                }
            });
        }
    });

    for viewer in &viewers {
        let log = viewer.log();
        assert!(log.len() >= 3);
        let (replayed, live) = log.split_at(3);
        assert_eq!(replayed, &[
            marker(MarkerRole::Target, 1.0, 1.0),
            marker(MarkerRole::Target, 1.5, 1.5),
            marker(MarkerRole::Boundary, 2.0, 2.0),
        ]);
        assert!(live.iter().all(|m| matches!(m, WireMessage::Data(_))));

        // Per-viewer FIFO: timestamps only increase.
        let stamps: Vec<f64> = live
            .iter()
            .filter_map(|m| match m {
                WireMessage::Data(s) => Some(s.timestamp),
                _ => None,
            })
            .collect();
        assert!(stamps.iter().zip(stamps.iter().skip(1)).all(|(a, b)| a < b));
    }
    assert_eq!(server.viewer_count(), 16);
}
