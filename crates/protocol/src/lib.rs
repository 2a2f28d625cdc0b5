//! Wire types shared between the control plane event stream and the
//! gridgate HTTP API.
//!
//! These types cross two boundaries: lifecycle events arriving from the
//! control plane deserialize into [`BrowserEvent`], and registry snapshots
//! serialize out as [`Session`] records. The backend `address` is internal
//! routing detail and is never part of any serialized form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a backend browser instance, as reported by the
/// control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

/// One live browser instance reachable for remote-desktop relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Stable identifier derived from the instance address; addresses the
    /// instance's VNC endpoint.
    pub session_id: String,
    /// Opaque key assigned by the control plane; primary key in the registry.
    pub browser_id: String,
    /// Network address of the backend instance. Internal only.
    #[serde(skip)]
    pub address: String,
    pub browser_name: String,
    pub browser_version: String,
    /// Creation timestamp, immutable once set.
    pub start_time: Option<DateTime<Utc>>,
    pub phase: Phase,
}

/// Kind of lifecycle event delivered by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

/// A lifecycle event for one browser instance.
///
/// `address` may be empty while the instance is still coming up; `Deleted`
/// events routinely carry no address at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserEvent {
    pub event_type: EventType,
    pub browser_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub browser_name: String,
    #[serde(default)]
    pub browser_version: String,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub phase: Phase,
}
