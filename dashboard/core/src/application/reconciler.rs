// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Reconciler
//!
//! Merges one agent-reported snapshot of live instances into the instance
//! store and garbage-collects records the pass did not observe.
//!
//! # Invariants
//!
//! - Every record surviving a pass carries that pass's stamp.
//! - A record still in `created` state is never collected by a pass that did
//!   not observe it: instance creation and the agent's first report are not
//!   atomic, so the record is protected until the agent confirms it.
//! - The GC sweep runs only after every upsert of the same pass has
//!   succeeded. A failed upsert aborts the pass: partial writes without the
//!   sweep are preferred over deleting records on incomplete information.
//!
//! Exactly one reconciliation pass runs at a time; scheduling that is the
//! caller's responsibility, stated here as a precondition.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::instance::{InstanceFilter, ObservedInstance, ReconcileStamp, StampClock};
use crate::domain::repository::{InstanceRepository, RepositoryError};
use crate::infrastructure::event_bus::NotificationBus;

/// Errors that can occur during a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("instance store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Statistics from one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileStats {
    pub stamp: ReconcileStamp,
    pub instances_observed: usize,
    pub instances_removed: usize,
}

/// The instance reconciler.
pub struct Reconciler {
    instances: Arc<dyn InstanceRepository>,
    bus: Arc<NotificationBus>,
    clock: StampClock,
}

impl Reconciler {
    pub fn new(instances: Arc<dyn InstanceRepository>, bus: Arc<NotificationBus>) -> Self {
        Self {
            instances,
            bus,
            clock: StampClock::new(),
        }
    }

    /// Run a single reconciliation pass against one agent snapshot.
    ///
    /// At the end of a successful pass the store's instance set equals the
    /// snapshot's instances plus any records still awaiting their first agent
    /// report.
    pub async fn reconcile(
        &self,
        snapshot: HashMap<String, ObservedInstance>,
    ) -> Result<ReconcileStats, ReconcileError> {
        let stamp = self.clock.next();
        let instances_observed = snapshot.len();
        debug!(%stamp, instances_observed, "Starting reconciliation pass");

        for (name, observed) in snapshot {
            self.instances
                .apply_observed(&name, observed.into_patch(stamp))
                .await?;
        }

        // All upserts of this pass succeeded; stale records are now safe to
        // collect.
        let instances_removed = self
            .instances
            .remove_where(InstanceFilter::stale(stamp))
            .await?;

        self.publish_snapshot().await;

        info!(
            %stamp,
            instances_observed,
            instances_removed,
            "Reconciliation pass complete"
        );

        Ok(ReconcileStats {
            stamp,
            instances_observed,
            instances_removed,
        })
    }

    /// Re-read the full collection and broadcast it. Best-effort: the store
    /// writes of this pass are already durable, and subscribers recover via
    /// the next pass's publish.
    async fn publish_snapshot(&self) {
        match self.instances.find_all(InstanceFilter::all()).await {
            Ok(all) => self.bus.publish_instances(all),
            Err(e) => warn!(error = %e, "Failed to re-read instances for snapshot publish"),
        }
    }
}
