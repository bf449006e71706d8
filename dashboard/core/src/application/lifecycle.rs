// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Lifecycle Application Service
//!
//! The write path for user intent. Start inserts the record and hands the
//! enhanced release to the agent; stop patches the desired field group and
//! dispatches. Observed state is never written here: every observed
//! transition flows through the reconciler, which keeps each field group
//! single-writer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::app::AppKey;
use crate::domain::command::{AgentChannel, AgentCommand, DispatchError, InstanceRef};
use crate::domain::compose::{self, ComposeError};
use crate::domain::instance::{
    DesiredPatch, DesiredState, Instance, InstanceFilter, InstanceOptions, STATUS_STOP_REQUESTED,
};
use crate::domain::repository::{AppRepository, InstanceRepository, RepositoryError};
use crate::infrastructure::event_bus::NotificationBus;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("App {0} does not exist")]
    AppNotFound(AppKey),

    #[error("Instance {0} does not exist")]
    InstanceNotFound(String),

    #[error("Instance {0} already exists")]
    InstanceExists(String),

    #[error("compose enhancement failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("instance store error: {0}")]
    Store(RepositoryError),

    /// The record mutation already persisted is not rolled back; the lost
    /// command must be re-derived externally.
    #[error("agent dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

impl From<RepositoryError> for LifecycleError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::AlreadyExists(name) => Self::InstanceExists(name),
            other => Self::Store(other),
        }
    }
}

/// Start request as accepted from the API surface.
#[derive(Debug, Clone)]
pub struct StartInstanceRequest {
    pub name: String,
    pub app_name: String,
    pub app_version: String,
    pub options: InstanceOptions,
    pub requested_by: Option<String>,
}

#[async_trait]
pub trait InstanceLifecycleService: Send + Sync {
    /// Create an instance and request its deployment.
    ///
    /// The returned record is authoritative only after the next
    /// reconciliation pass; its observed state is `created` until the agent
    /// reports.
    async fn start_instance(
        &self,
        request: StartInstanceRequest,
    ) -> Result<Instance, LifecycleError>;

    /// Request an instance stop. Patches desired state and dispatches; the
    /// observed state changes only once the agent reports.
    async fn stop_instance(
        &self,
        name: &str,
        requested_by: Option<String>,
    ) -> Result<Instance, LifecycleError>;
}

pub struct StandardInstanceLifecycleService {
    instances: Arc<dyn InstanceRepository>,
    apps: Arc<dyn AppRepository>,
    agent: Arc<dyn AgentChannel>,
    bus: Arc<NotificationBus>,
}

impl StandardInstanceLifecycleService {
    pub fn new(
        instances: Arc<dyn InstanceRepository>,
        apps: Arc<dyn AppRepository>,
        agent: Arc<dyn AgentChannel>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            instances,
            apps,
            agent,
            bus,
        }
    }

    /// Broadcast the full instance collection. Best-effort; a failed re-read
    /// only costs subscribers one update.
    async fn publish_instances(&self) {
        match self.instances.find_all(InstanceFilter::all()).await {
            Ok(all) => self.bus.publish_instances(all),
            Err(e) => warn!(error = %e, "Failed to re-read instances for snapshot publish"),
        }
    }
}

#[async_trait]
impl InstanceLifecycleService for StandardInstanceLifecycleService {
    async fn start_instance(
        &self,
        request: StartInstanceRequest,
    ) -> Result<Instance, LifecycleError> {
        let key = AppKey::new(request.app_name.clone(), request.app_version.clone());
        let app = self
            .apps
            .find_by_key(&key)
            .await?
            .ok_or_else(|| LifecycleError::AppNotFound(key.clone()))?;

        let options = request.options.effective(&request.name);
        let release = compose::enhance_release(&request.name, &options, &app)?;

        let instance = self
            .instances
            .insert(Instance::created(
                request.name.clone(),
                release.clone(),
                options.storage_bucket.clone(),
                request.requested_by,
            ))
            .await?;

        info!(name = %instance.name, app = %key, "Instance start requested");

        self.agent.dispatch(AgentCommand::Start {
            app: release,
            instance: InstanceRef {
                name: request.name,
                options,
            },
        })?;

        self.publish_instances().await;

        Ok(instance)
    }

    async fn stop_instance(
        &self,
        name: &str,
        requested_by: Option<String>,
    ) -> Result<Instance, LifecycleError> {
        let patch = DesiredPatch {
            desired_state: DesiredState::Stopped,
            status: STATUS_STOP_REQUESTED.to_string(),
            stopped_by: requested_by,
        };

        let updated = self
            .instances
            .apply_desired(name, patch)
            .await?
            .ok_or_else(|| LifecycleError::InstanceNotFound(name.to_string()))?;

        info!(name = %updated.name, "Instance stop requested");

        self.agent.dispatch(AgentCommand::Stop {
            app: updated.app.clone(),
            instance: InstanceRef {
                name: updated.name.clone(),
                options: InstanceOptions::default(),
            },
        })?;

        self.publish_instances().await;

        Ok(updated)
    }
}
