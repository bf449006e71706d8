// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::app::AppTemplate;

/// Default location of the public app-store manifest.
pub const DEFAULT_APPSTORE_URL: &str =
    "https://raw.githubusercontent.com/100monkeys-ai/appstore/master/apps.yml";

#[derive(Debug, Error)]
pub enum AppStoreError {
    #[error("app store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("app store manifest is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Read-only client for the remote app-store manifest.
///
/// Each call is fire-and-forget with no retry; a failed fetch surfaces to the
/// caller and has no effect on local state.
#[async_trait]
pub trait AppStoreClient: Send + Sync {
    async fn fetch_templates(&self) -> Result<Vec<AppTemplate>, AppStoreError>;
}

/// HTTP implementation fetching a YAML manifest of app templates.
pub struct HttpAppStoreClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAppStoreClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Default for HttpAppStoreClient {
    fn default() -> Self {
        Self::new(DEFAULT_APPSTORE_URL)
    }
}

#[async_trait]
impl AppStoreClient for HttpAppStoreClient {
    async fn fetch_templates(&self) -> Result<Vec<AppTemplate>, AppStoreError> {
        debug!(url = %self.url, "Fetching app store manifest");
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let templates: Vec<AppTemplate> = serde_yaml::from_str(&body)?;
        Ok(templates)
    }
}
