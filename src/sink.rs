// Driftwatch - Categorical drift detection engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Outbound alert delivery.
//!
//! The engine hands every [`AlertEvent`] to an [`AlertSink`]. How events
//! reach people (pager, chat, ticket) is the sink's business.

use crate::error::SinkError;
use crate::event::AlertEvent;
use std::sync::Mutex;
use tracing::{info, warn};

/// Receives alert events. Must be callable from any thread.
pub trait AlertSink: Send + Sync {
    fn publish(&self, event: &AlertEvent) -> Result<(), SinkError>;
}

impl<F> AlertSink for F
where
    F: Fn(&AlertEvent) -> Result<(), SinkError> + Send + Sync,
{
    fn publish(&self, event: &AlertEvent) -> Result<(), SinkError> {
        self(event)
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AlertEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything published so far.
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Remove and return everything published so far.
    pub fn drain(&self) -> Vec<AlertEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn publish(&self, event: &AlertEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AlertSink for TracingSink {
    fn publish(&self, event: &AlertEvent) -> Result<(), SinkError> {
        match event {
            AlertEvent::AlertFired { .. } => warn!(
                event = event.as_str(),
                metric_key = event.metric_key(),
                "{}",
                event.message()
            ),
            AlertEvent::AlertResolved { .. } => info!(
                event = event.as_str(),
                metric_key = event.metric_key(),
                "{}",
                event.message()
            ),
        }
        Ok(())
    }
}
