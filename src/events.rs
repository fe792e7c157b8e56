//! Typed outgoing event stream
//!
//! The pipeline announces its side effects as explicit, named events instead
//! of relying on readers noticing changed rows. The UI layer (or any other
//! consumer) installs a sink at startup; without one, events are logged and
//! dropped, which is fine for a poll-driven client.

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::orm::reports::{ReportKind, ReportStatus};

/// An observable side effect of the pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A moderation decision changed (or removed) a report.
    ReportModerated {
        report_id: i32,
        author_id: i32,
        /// None when the report was deleted
        status: Option<ReportStatus>,
    },
    /// The matching engine persisted a new proposed match.
    MatchProposed {
        match_id: i32,
        lost_report_id: i32,
        found_report_id: i32,
        confidence: f64,
    },
    /// The dispatcher stored a notification.
    NotificationCreated {
        notification_id: i32,
        recipient_id: i32,
        kind: String,
        report_kind: Option<ReportKind>,
    },
}

/// Consumer of pipeline events. Implementations must be cheap; publishing
/// happens inline on the write path.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &PipelineEvent);
}

static EVENT_SINK: OnceCell<Arc<dyn EventSink>> = OnceCell::new();

/// Install the process-wide event sink. May only be called once.
pub fn init_event_sink(sink: Arc<dyn EventSink>) {
    if EVENT_SINK.set(sink).is_err() {
        log::warn!("init_event_sink called more than once; keeping the existing sink");
    }
}

/// Publish an event to the installed sink, or log it if none is installed.
pub fn publish(event: PipelineEvent) {
    match EVENT_SINK.get() {
        Some(sink) => sink.publish(&event),
        None => log::debug!("pipeline event (no sink installed): {:?}", event),
    }
}
