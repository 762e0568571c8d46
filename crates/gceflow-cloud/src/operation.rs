//! Long-running operation records
//!
//! Every mutating platform call returns an [`OperationHandle`]. The platform
//! drives the status forward (PENDING → RUNNING → DONE); callers only observe.

use crate::error::ErrorCode;
use crate::resource::{ResourceRef, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the operation does to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Delete,
    Update,
}

impl OperationKind {
    /// Map a platform `operationType` (`insert`, `delete`, `setTags`, ...)
    pub fn from_operation_type(operation_type: &str) -> Self {
        match operation_type {
            "insert" => OperationKind::Insert,
            "delete" => OperationKind::Delete,
            _ => OperationKind::Update,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Update => write!(f, "update"),
        }
    }
}

/// Identifies an in-flight asynchronous action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
    pub self_link: String,
    pub kind: OperationKind,
    /// Scope of the operation record itself (zone or global)
    pub scope: Scope,
    pub target: ResourceRef,
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {} {})",
            self.name, self.kind, self.target.kind, self.target.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "PENDING" => Some(OperationStatus::Pending),
            "RUNNING" => Some(OperationStatus::Running),
            "DONE" => Some(OperationStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Done => write!(f, "DONE"),
        }
    }
}

/// Error entry of a finished operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    pub code: ErrorCode,
    pub message: String,
    pub location: Option<String>,
}

impl OperationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }
}

/// Snapshot of an operation as last reported by the platform
#[derive(Debug, Clone)]
pub struct Operation {
    pub handle: OperationHandle,
    pub status: OperationStatus,
    /// Non-empty only once DONE, and only on failure
    pub errors: Vec<OperationError>,
    pub progress: Option<u8>,
    pub inserted_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }

    /// First reported error, which the platform treats as the primary one
    pub fn primary_error(&self) -> Option<&OperationError> {
        self.errors.first()
    }
}
