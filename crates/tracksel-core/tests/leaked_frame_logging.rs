#![forbid(unsafe_code)]

//! A scope that unwinds past frames left open by inner code, or whose own
//! frame was popped from under it, reports that at WARN level, and tracking
//! keeps working afterwards.

use std::io;
use std::sync::{Arc, Mutex};

use tracksel_core::tracking::{
    TrackingScope, begin_tracking, end_tracking, track, tracking_depth,
};
use tracksel_core::{Node, TraceHooks};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn warn_logs(f: impl FnOnce()) -> String {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    capture.contents()
}

#[test]
fn leaked_frames_are_logged_and_discarded() {
    let logs = warn_logs(|| {
        let scope = TrackingScope::begin(TraceHooks::default());
        begin_tracking(TraceHooks::default());
        let _ = scope.finish();
    });

    assert_eq!(tracking_depth(), 0);
    assert!(logs.contains("tracking.leaked_frames"), "logs: {logs}");
    assert!(logs.contains("leaked=1"), "logs: {logs}");

    let node = Node::new();
    let ((), frame) = track(|| node.track_read());
    assert_eq!(frame.nodes().len(), 1);
}

#[test]
fn finishing_a_popped_scope_is_logged() {
    let node = Node::new();
    let logs = warn_logs(|| {
        let scope = TrackingScope::begin(TraceHooks::default());
        node.track_read();
        let popped = end_tracking().unwrap();
        assert_eq!(popped.nodes().len(), 1);
        let frame = scope.finish();
        assert!(frame.nodes().is_empty());
    });

    assert_eq!(tracking_depth(), 0);
    assert!(logs.contains("tracking.missing_frame"), "logs: {logs}");
    assert!(logs.contains("unbalanced"), "logs: {logs}");
}
