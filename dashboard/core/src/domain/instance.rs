// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Aggregate
//!
//! An [`Instance`] is one deployed application stack on the swarm, keyed by
//! its unique `name`. Two field groups evolve independently:
//!
//! - **Desired fields** (`desired_state`, `status`, `stopped_by`): written
//!   only by the lifecycle controller via [`DesiredPatch`].
//! - **Observed fields** (`state`, `services`, `stamp`): written only by the
//!   reconciler via [`ObservedPatch`], from agent-reported snapshots.
//!
//! The split is structural: the repository exposes one update path per group,
//! so neither writer can clobber the other's fields.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status text recorded when a start request has been handed to the agent.
pub const STATUS_REQUEST_SENT: &str = "Request sent to agent";

/// Status text recorded when a stop has been requested but not yet observed.
pub const STATUS_STOP_REQUESTED: &str = "Instance stop is requested";

// ============================================================================
// Value Objects
// ============================================================================

/// Unique record identifier for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observed lifecycle state, as last confirmed by the swarm agent.
///
/// Written only by the reconciler, except for the initial `Created` value
/// recorded when the lifecycle controller inserts the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Record inserted, agent has not yet confirmed existence.
    Created,
    /// Agent reports the stack as running.
    Running,
    /// Agent reports the stack as stopped.
    Stopped,
    /// Agent reports the stack as removed.
    Removed,
    /// Agent could not determine the state.
    Unknown,
}

impl InstanceState {
    /// True while the instance is awaiting its first agent report.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Removed => "removed",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// User intention for an instance. Written only by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Running,
    Stopped,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Opaque monotonic marker distinguishing the current reconciliation pass
/// from prior data. Compared for equality only; never exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReconcileStamp(pub u64);

impl std::fmt::Display for ReconcileStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues strictly increasing [`ReconcileStamp`]s.
///
/// Seeded from wall-clock milliseconds but always advancing by at least one
/// per draw, so ties are impossible within or across passes and clock skew
/// cannot reorder stamps.
#[derive(Debug, Default)]
pub struct StampClock {
    last: AtomicU64,
}

impl StampClock {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Draw the next stamp.
    pub fn next(&self) -> ReconcileStamp {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now) + 1)
            })
            .unwrap_or(now);
        ReconcileStamp(prev.max(now) + 1)
    }
}

/// Container runtime details for one service, as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Runtime info for one service within an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Primary published port, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Endpoint serving this service's log tail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerInfo>,
}

/// Caller-supplied start options.
///
/// Only `storage_bucket` is interpreted by the dashboard; everything else is
/// passed through to the agent untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl InstanceOptions {
    pub fn is_empty(&self) -> bool {
        self.storage_bucket.is_none() && self.extra.is_empty()
    }

    /// Derive the effective options for a start request: caller-supplied
    /// options take precedence; otherwise the storage bucket defaults to the
    /// instance name.
    pub fn effective(&self, instance_name: &str) -> InstanceOptions {
        if self.is_empty() {
            InstanceOptions {
                storage_bucket: Some(instance_name.to_string()),
                extra: BTreeMap::new(),
            }
        } else {
            self.clone()
        }
    }
}

/// Release descriptor embedded in an instance: the app identity plus the
/// enhanced compose definition shipped to the agent. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRelease {
    pub name: String,
    pub version: String,
    pub definition: String,
}

// ============================================================================
// Aggregate Root: Instance
// ============================================================================

/// Instance aggregate root. One per deployed workload, keyed by `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,

    /// Immutable identity key, unique across all records.
    pub name: String,

    /// Observed lifecycle state (reconciler-owned).
    pub state: InstanceState,

    /// User intention (controller-owned).
    pub desired_state: DesiredState,

    /// Human-readable progress text.
    pub status: String,

    /// Associated storage bucket, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,

    /// Release deployed for this instance.
    pub app: AppRelease,

    /// Per-service runtime info, populated from agent snapshots.
    #[serde(default)]
    pub services: HashMap<String, ServiceInfo>,

    /// Marker of the reconciliation pass that last touched this record.
    /// `None` until the agent first reports the instance. Staleness
    /// detection only; never serialized.
    #[serde(skip)]
    pub stamp: Option<ReconcileStamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_by: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    /// Build the record inserted by the lifecycle controller for a start
    /// request. The agent has not acted yet, so the observed state is
    /// `Created` and the service map is empty.
    pub fn created(
        name: impl Into<String>,
        app: AppRelease,
        storage_bucket: Option<String>,
        started_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InstanceId::new(),
            name: name.into(),
            state: InstanceState::Created,
            desired_state: DesiredState::Running,
            status: STATUS_REQUEST_SENT.to_string(),
            storage_bucket,
            app,
            services: HashMap::new(),
            stamp: None,
            started_by,
            stopped_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Field-Group Patches
// ============================================================================

/// One instance entry of an agent-reported snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObservedInstance {
    /// Lifecycle state reported by the agent. Absent means the agent saw the
    /// stack live without classifying it, which is treated as `Running`.
    #[serde(default)]
    pub state: Option<InstanceState>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub services: HashMap<String, ServiceInfo>,
}

impl ObservedInstance {
    pub fn observed_state(&self) -> InstanceState {
        self.state.unwrap_or(InstanceState::Running)
    }

    /// Convert into the observed-field patch applied during a pass.
    pub fn into_patch(self, stamp: ReconcileStamp) -> ObservedPatch {
        ObservedPatch {
            state: self.observed_state(),
            status: self.status,
            services: self.services,
            stamp,
        }
    }
}

/// Observed field group, written only by the reconciler.
#[derive(Debug, Clone)]
pub struct ObservedPatch {
    pub state: InstanceState,
    /// Replaces the status text when present.
    pub status: Option<String>,
    pub services: HashMap<String, ServiceInfo>,
    pub stamp: ReconcileStamp,
}

impl ObservedPatch {
    /// Defensive merge: materialize a record for an instance the agent knows
    /// about but the dashboard never created.
    pub fn into_instance(self, name: &str) -> Instance {
        let now = Utc::now();
        Instance {
            id: InstanceId::new(),
            name: name.to_string(),
            state: self.state,
            desired_state: DesiredState::Running,
            status: self.status.unwrap_or_else(|| self.state.to_string()),
            storage_bucket: None,
            app: AppRelease {
                name: name.to_string(),
                version: "unknown".to_string(),
                definition: String::new(),
            },
            services: self.services,
            stamp: Some(self.stamp),
            started_by: None,
            stopped_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Desired field group, written only by the lifecycle controller.
#[derive(Debug, Clone)]
pub struct DesiredPatch {
    pub desired_state: DesiredState,
    pub status: String,
    pub stopped_by: Option<String>,
}

// ============================================================================
// Filters
// ============================================================================

/// Conjunction of equality/inequality predicates over instance records.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    /// Match only the record with this name.
    pub name: Option<String>,

    /// Match records whose stamp differs from this one (including unstamped
    /// records).
    pub stamp_not: Option<ReconcileStamp>,

    /// Match records whose state differs from this one.
    pub state_not: Option<InstanceState>,
}

impl InstanceFilter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// The garbage-collection predicate for a pass: records the pass did not
    /// stamp, excluding those still awaiting their first agent report.
    pub fn stale(fresh: ReconcileStamp) -> Self {
        Self {
            name: None,
            stamp_not: Some(fresh),
            state_not: Some(InstanceState::Created),
        }
    }

    pub fn matches(&self, instance: &Instance) -> bool {
        if let Some(name) = &self.name {
            if instance.name != *name {
                return false;
            }
        }
        if let Some(stamp) = self.stamp_not {
            if instance.stamp == Some(stamp) {
                return false;
            }
        }
        if let Some(state) = self.state_not {
            if instance.state == state {
                return false;
            }
        }
        true
    }
}
