//! Write-only visualization sink.
//!
//! The controller never reads anything back from the visualizer; it
//! only pushes primitive upserts and removals. Concrete sinks (marker
//! publishers, debug overlays) live in the host shell.

use std::sync::Mutex;

use crate::primitive::Primitive;

/// Observer of primitive geometry.
pub trait Visualizer: Send + Sync {
    /// A primitive was created or its parameters changed.
    fn upsert_primitive(&self, primitive: &Primitive);

    /// A primitive was removed; erase its visuals.
    fn remove_primitive(&self, name: &str);
}

/// Sink that discards everything.
#[derive(Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn upsert_primitive(&self, _primitive: &Primitive) {}
    fn remove_primitive(&self, _name: &str) {}
}

/// One recorded visualizer notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisualEvent {
    Upsert(String),
    Remove(String),
}

/// Sink that records every notification, for tests.
#[derive(Debug, Default)]
pub struct RecordingVisualizer {
    events: Mutex<Vec<VisualEvent>>,
}

impl RecordingVisualizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything recorded so far.
    #[must_use]
    pub fn take_events(&self) -> Vec<VisualEvent> {
        std::mem::take(&mut self.events.lock().expect("visualizer mutex poisoned"))
    }
}

impl Visualizer for RecordingVisualizer {
    fn upsert_primitive(&self, primitive: &Primitive) {
        self.events
            .lock()
            .expect("visualizer mutex poisoned")
            .push(VisualEvent::Upsert(primitive.name.clone()));
    }

    fn remove_primitive(&self, name: &str) {
        self.events
            .lock()
            .expect("visualizer mutex poisoned")
            .push(VisualEvent::Remove(name.to_string()));
    }
}
