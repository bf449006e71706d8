// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # App Catalog Application Service
//!
//! Local app management (upsert, remove, list) plus the read-only app-store
//! fetch. Tags are derived from the compose definition at upsert time; the
//! stored payload itself is never rewritten.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::app::{App, AppKey, AppTemplate};
use crate::domain::compose::{self, ComposeError};
use crate::domain::repository::{AppRepository, RepositoryError};
use crate::infrastructure::appstore::{AppStoreClient, AppStoreError};
use crate::infrastructure::event_bus::NotificationBus;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("app definition rejected: {0}")]
    Compose(#[from] ComposeError),

    #[error("catalog store error: {0}")]
    Store(#[from] RepositoryError),

    #[error(transparent)]
    AppStore(#[from] AppStoreError),
}

#[async_trait]
pub trait AppCatalogService: Send + Sync {
    /// Insert or replace an app by (name, version), deriving tags from the
    /// definition.
    async fn create_or_update_app(
        &self,
        name: &str,
        version: &str,
        definition: &str,
    ) -> Result<App, CatalogError>;

    /// Remove an app, returning the number of records removed.
    async fn remove_app(&self, name: &str, version: &str) -> Result<usize, CatalogError>;

    /// All locally stored apps.
    async fn list_apps(&self) -> Result<Vec<App>, CatalogError>;

    /// Available templates from the remote app store.
    async fn appstore_apps(&self) -> Result<Vec<AppTemplate>, CatalogError>;
}

pub struct StandardAppCatalogService {
    apps: Arc<dyn AppRepository>,
    appstore: Arc<dyn AppStoreClient>,
    bus: Arc<NotificationBus>,
}

impl StandardAppCatalogService {
    pub fn new(
        apps: Arc<dyn AppRepository>,
        appstore: Arc<dyn AppStoreClient>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            apps,
            appstore,
            bus,
        }
    }

    async fn publish_apps(&self) {
        match self.apps.list_all().await {
            Ok(all) => self.bus.publish_apps(all),
            Err(e) => warn!(error = %e, "Failed to re-read apps for snapshot publish"),
        }
    }
}

#[async_trait]
impl AppCatalogService for StandardAppCatalogService {
    async fn create_or_update_app(
        &self,
        name: &str,
        version: &str,
        definition: &str,
    ) -> Result<App, CatalogError> {
        let tags = compose::derive_tags(definition)?;
        let stored = self
            .apps
            .upsert(App::new(name, version, definition, tags))
            .await?;

        info!(app = %stored.key(), "App upserted");
        self.publish_apps().await;

        Ok(stored)
    }

    async fn remove_app(&self, name: &str, version: &str) -> Result<usize, CatalogError> {
        let removed = self.apps.remove(&AppKey::new(name, version)).await?;

        info!(app = %AppKey::new(name, version), removed, "App removed");
        self.publish_apps().await;

        Ok(removed)
    }

    async fn list_apps(&self) -> Result<Vec<App>, CatalogError> {
        Ok(self.apps.list_all().await?)
    }

    async fn appstore_apps(&self) -> Result<Vec<AppTemplate>, CatalogError> {
        Ok(self.appstore.fetch_templates().await?)
    }
}
