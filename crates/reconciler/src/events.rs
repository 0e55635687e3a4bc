//! Events recorded against managed resources.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::managed::ResourceRef;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

/// Why an event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventReason {
    AlreadyExists,
    RepoCreated,
    RepoDeleted,
    CannotConnect,
    CannotObserve,
    CannotCreate,
    CannotUpdate,
    CannotDelete,
}

impl EventReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyExists => "AlreadyExists",
            Self::RepoCreated => "RepoCreated",
            Self::RepoDeleted => "RepoDeleted",
            Self::CannotConnect => "CannotConnectToProvider",
            Self::CannotObserve => "CannotObserveExternalResource",
            Self::CannotCreate => "CannotCreateExternalResource",
            Self::CannotUpdate => "CannotUpdateExternalResource",
            Self::CannotDelete => "CannotDeleteExternalResource",
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub object: ResourceRef,
    pub kind: EventType,
    pub reason: EventReason,
    pub message: String,
}

impl Event {
    pub fn normal(object: ResourceRef, reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            object,
            kind: EventType::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning(object: ResourceRef, reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            object,
            kind: EventType::Warning,
            reason,
            message: message.into(),
        }
    }
}

/// Sink for events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: Event);
}

/// Records events as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl EventRecorder for TracingRecorder {
    fn record(&self, event: Event) {
        match event.kind {
            EventType::Normal => info!(
                object = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => warn!(
                object = %event.object,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Keeps events in memory, for tests and summaries.
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    events: Mutex<Vec<Event>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded events with `reason`.
    pub fn with_reason(&self, reason: EventReason) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|event| event.reason == reason)
            .collect()
    }
}

impl EventRecorder for InMemoryRecorder {
    fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Records to several sinks.
#[derive(Default)]
pub struct FanoutRecorder {
    sinks: Vec<Arc<dyn EventRecorder>>,
}

impl FanoutRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn EventRecorder>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventRecorder for FanoutRecorder {
    fn record(&self, event: Event) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}
