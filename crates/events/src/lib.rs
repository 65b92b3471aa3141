#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in pakt
//!
//! This crate provides the event types and channel aliases used for
//! communication between crates. All output goes through events - no
//! direct logging or printing is allowed outside the CLI.

use serde::{Deserialize, Serialize};

/// Type alias for event sender
pub type EventSender = tokio::sync::mpsc::UnboundedSender<Event>;

/// Type alias for event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<Event>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Core event enum for all async communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Fetch lifecycle
    FetchStarting {
        direct_deps: usize,
    },
    FetchCompleted {
        packages: usize,
    },

    // Download events (emitted by the net client)
    DownloadStarted {
        url: String,
        size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        bytes_downloaded: u64,
        total_bytes: u64,
    },
    DownloadCompleted {
        url: String,
        size: u64,
    },

    // Resolution events
    DependencyResolved {
        alias: String,
        source: String,
        location: String,
    },
    DependencyReused {
        alias: String,
        source: String,
    },

    // Cache maintenance
    CacheEntryRemoved {
        name: String,
    },
    CacheCleaned {
        removed: usize,
    },

    // Errors and warnings
    Warning {
        message: String,
        context: Option<String>,
    },
    Error {
        message: String,
        details: Option<String>,
    },

    // Debug logging (when --debug enabled)
    DebugLog {
        message: String,
    },
}

impl Event {
    /// Create a warning event
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: None,
        }
    }

    /// Create a warning event with extra context
    pub fn warning_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            details: None,
        }
    }

    /// Create a debug log event
    pub fn debug(message: impl Into<String>) -> Self {
        Self::DebugLog {
            message: message.into(),
        }
    }
}

/// Helper to send events with error handling
pub trait EventSenderExt {
    /// Send an event, ignoring send errors (receiver dropped)
    fn emit(&self, event: Event);
}

impl EventSenderExt for EventSender {
    fn emit(&self, event: Event) {
        // Receiver may be gone during teardown; that is fine.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_channel() {
        let (tx, mut rx) = channel();

        tx.emit(Event::warning("test warning"));

        let event = rx.recv().await.unwrap();
        match event {
            Event::Warning { message, .. } => {
                assert_eq!(message, "test warning");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::DependencyResolved {
            alias: "ini".to_string(),
            source: "pkg".to_string(),
            location: "/cache/ini".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::DependencyResolved { alias, source, .. } => {
                assert_eq!(alias, "ini");
                assert_eq!(source, "pkg");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn emit_survives_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        tx.emit(Event::debug("no receiver"));
    }
}
