//! Notifications for the display surface.
//!
//! The core never renders. It publishes `HarnessEvent`s to any number of
//! channel subscribers and keeps a `DisplaySnapshot` that a render thread
//! can copy out at any time.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::gaze::GazePoint;
use crate::interaction::{TestKind, TestResult};
use crate::region::Region;

/// Event delivered to display subscribers.
#[derive(Debug, Clone)]
pub enum HarnessEvent {
    /// Emitted once per tick.
    Frame {
        current_region: Option<Region>,
        last_gaze: Option<GazePoint>,
    },
    RegionEntered(Region),
    RegionExited(Region),
    TestStarted {
        kind: TestKind,
        instruction: String,
    },
    TestCompleted(TestResult),
}

/// Per-subscriber queue depth; about half a minute of frames at 30 Hz.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

struct Subscriber {
    tx: SyncSender<HarnessEvent>,
    // Lossless events that did not fit, delivered in order once there is room.
    backlog: VecDeque<HarnessEvent>,
    dropped_frames: u64,
}

impl Subscriber {
    /// Returns false once the receiver is gone.
    fn deliver(&mut self, event: HarnessEvent) -> bool {
        while let Some(pending) = self.backlog.pop_front() {
            match self.tx.try_send(pending) {
                Ok(()) => {}
                Err(TrySendError::Full(pending)) => {
                    self.backlog.push_front(pending);
                    break;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }

        let is_frame = matches!(event, HarnessEvent::Frame { .. });
        if !self.backlog.is_empty() {
            if is_frame {
                self.drop_frame();
            } else {
                self.backlog.push_back(event);
            }
            return true;
        }

        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) if is_frame => {
                self.drop_frame();
                true
            }
            Err(TrySendError::Full(event)) => {
                self.backlog.push_back(event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    fn drop_frame(&mut self) {
        if self.dropped_frames == 0 {
            warn!("Event subscriber is not draining; dropping frames");
        }
        self.dropped_frames += 1;
    }
}

/// Fan-out of events to channel subscribers.
///
/// Each subscriber gets a bounded queue. When it is full, `Frame`s are
/// dropped; region and test events are held back and delivered on a later
/// `emit`, so they are never lost while the receiver is alive.
pub struct EventBus {
    subscribers: Vec<Subscriber>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<HarnessEvent> {
        let (tx, rx) = mpsc::sync_channel(self.capacity);
        self.subscribers.push(Subscriber {
            tx,
            backlog: VecDeque::new(),
            dropped_frames: 0,
        });
        rx
    }

    /// Deliver to all live subscribers; drop the ones whose receiver is gone.
    pub fn emit(&mut self, event: HarnessEvent) {
        if self.subscribers.is_empty() {
            return;
        }
        let before = self.subscribers.len();
        self.subscribers.retain_mut(|sub| sub.deliver(event.clone()));
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            debug!("Dropped {} disconnected event subscriber(s)", dropped);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Frames discarded so far across all live subscribers.
    pub fn dropped_frames(&self) -> u64 {
        self.subscribers.iter().map(|s| s.dropped_frames).sum()
    }
}

/// What a renderer needs to draw one frame.
#[derive(Debug, Clone, Default)]
pub struct DisplaySnapshot {
    pub current_region: Option<Region>,
    pub last_gaze: Option<GazePoint>,
    pub active_test: Option<TestKind>,
    pub instruction: Option<String>,
    /// Progress of the active test in [0, 1].
    pub progress: f64,
    pub completed_tests: usize,
}

/// Shared, wholesale-replaced snapshot. The tick path is the only writer.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<DisplaySnapshot>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the latest snapshot.
    pub fn read(&self) -> DisplaySnapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn publish(&self, snapshot: DisplaySnapshot) {
        match self.inner.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_and_prune() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(HarnessEvent::Frame {
            current_region: None,
            last_gaze: None,
        });
        assert!(matches!(a.try_recv(), Ok(HarnessEvent::Frame { .. })));
        assert!(matches!(b.try_recv(), Ok(HarnessEvent::Frame { .. })));

        drop(b);
        bus.emit(HarnessEvent::Frame {
            current_region: None,
            last_gaze: None,
        });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(a.try_recv().is_ok());
    }

    fn frame() -> HarnessEvent {
        HarnessEvent::Frame {
            current_region: None,
            last_gaze: None,
        }
    }

    fn started() -> HarnessEvent {
        HarnessEvent::TestStarted {
            kind: TestKind::Dwell,
            instruction: "look".to_string(),
        }
    }

    #[test]
    fn test_stalled_subscriber_is_bounded() {
        let mut bus = EventBus::with_capacity(4);
        let rx = bus.subscribe();

        for _ in 0..100 {
            bus.emit(frame());
        }
        assert_eq!(bus.dropped_frames(), 96);
        assert_eq!(rx.try_iter().count(), 4);
    }

    #[test]
    fn test_lossless_events_survive_full_queue() {
        let mut bus = EventBus::with_capacity(2);
        let rx = bus.subscribe();

        bus.emit(frame());
        bus.emit(frame());
        bus.emit(started());
        bus.emit(frame());
        bus.emit(HarnessEvent::TestCompleted(TestResult {
            kind: TestKind::Dwell,
            success: true,
            duration_s: 1.0,
            accuracy: 1.0,
            target_region: None,
            visited_regions: Vec::new(),
            timestamp_s: 0.0,
        }));

        // Queue holds the two frames; the rest waits in order.
        assert_eq!(rx.try_iter().count(), 2);
        bus.emit(frame());
        let next: Vec<HarnessEvent> = rx.try_iter().collect();
        assert!(matches!(next[0], HarnessEvent::TestStarted { .. }));
        assert!(matches!(next[1], HarnessEvent::TestCompleted(_)));

        // Backlog flushed; frames flow again.
        bus.emit(frame());
        assert!(matches!(rx.try_recv(), Ok(HarnessEvent::Frame { .. })));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let mut bus = EventBus::new();
        bus.emit(HarnessEvent::Frame {
            current_region: None,
            last_gaze: None,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_snapshot_copy_on_read() {
        let handle = SnapshotHandle::new();
        let reader = handle.clone();
        assert_eq!(reader.read().completed_tests, 0);

        handle.publish(DisplaySnapshot {
            completed_tests: 3,
            progress: 0.5,
            ..Default::default()
        });
        let snap = reader.read();
        assert_eq!(snap.completed_tests, 3);
        assert_eq!(snap.progress, 0.5);
    }
}
