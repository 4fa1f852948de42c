//! Event flow tracking for events crossing the relay
//!
//! A [`TraceContext`] rides along with a [`BusEvent`](crate::events::BusEvent)
//! and collects one span per component that handled it: the bus records a
//! `publish` span, the stream client records `relay` and closes the trace once
//! every listener has run.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::EventKind;

/// Trace context that follows an event through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    /// Unique identifier for this trace
    pub trace_id: Uuid,

    /// Component that created the event
    pub source: String,

    /// Kind of event being traced
    pub kind: EventKind,

    /// Components the event passed through, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,

    /// When the trace was created
    pub start_time: DateTime<Utc>,

    /// Individual processing steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<TraceSpan>,

    #[serde(skip)]
    pub completed: bool,

    /// Total processing time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
}

/// A single step in the trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// Name of this span (e.g. "publish", "relay")
    pub name: String,

    /// Component that processed this span
    pub component: String,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Additional context about this span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,

    #[serde(skip)]
    start_instant: Option<Instant>,
}

impl TraceSpan {
    /// Attach context to this span
    pub fn context(&mut self, ctx: Option<serde_json::Value>) -> &mut Self {
        self.context = ctx;
        self
    }

    fn finish(&mut self) {
        if self.duration_ms.is_none() {
            if let Some(start) = self.start_instant {
                self.duration_ms = Some(start.elapsed().as_millis() as u64);
            }
        }
    }
}

impl TraceContext {
    /// Create a new trace context
    pub fn new(source: impl Into<String>, kind: EventKind) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            source: source.into(),
            kind,
            path: Vec::new(),
            start_time: Utc::now(),
            spans: Vec::new(),
            completed: false,
            total_ms: None,
        }
    }

    /// Open a new span, closing the previous one
    pub fn add_span(&mut self, name: &str, component: &str) -> &mut TraceSpan {
        self.complete_span();
        self.path.push(component.to_string());

        let index = self.spans.len();
        self.spans.push(TraceSpan {
            name: name.to_string(),
            component: component.to_string(),
            start_time: Utc::now(),
            duration_ms: None,
            context: None,
            start_instant: Some(Instant::now()),
        });
        &mut self.spans[index]
    }

    /// Close the most recent span and record its duration
    pub fn complete_span(&mut self) -> &mut Self {
        if let Some(span) = self.spans.last_mut() {
            span.finish();
            debug!(
                trace_id = %self.trace_id,
                span = %span.name,
                component = %span.component,
                duration_ms = ?span.duration_ms,
                "Completed span"
            );
        }
        self
    }

    /// Mark the entire trace as completed
    pub fn complete(&mut self) {
        if let Some(span) = self.spans.last_mut() {
            span.finish();
        }

        let total = self
            .spans
            .first()
            .and_then(|s| s.start_instant)
            .map(|start| start.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.total_ms = Some(total);
        self.completed = true;

        info!(
            trace_id = %self.trace_id,
            source = %self.source,
            kind = %self.kind,
            path = ?self.path,
            total_ms = total,
            spans = self.spans.len(),
            "Completed event trace"
        );
    }

    /// Whether a component appears on the trace path
    pub fn visited(&self, component: &str) -> bool {
        self.path.iter().any(|c| c == component)
    }
}
