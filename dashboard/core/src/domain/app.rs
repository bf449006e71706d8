// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # App Catalog Aggregate
//!
//! An [`App`] is a deployable application template, keyed by
//! (`name`, `version`). The compose definition payload is immutable once
//! stored; `tags` are derived from the definition's top-level `tags` list at
//! upsert time. [`AppTemplate`] is the shape of one entry in the remote
//! app-store manifest, which is read-only and never touches local state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique record identifier for an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(pub Uuid);

impl AppId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity key of an app: (`name`, `version`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppKey {
    pub name: String,
    pub version: String,
}

impl AppKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// App aggregate root: an immutable compose definition plus derived tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub name: String,
    pub version: String,

    /// Raw compose definition payload.
    pub definition: String,

    /// Tags derived from the definition at upsert time.
    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        definition: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AppId::new(),
            name: name.into(),
            version: version.into(),
            definition: definition.into(),
            tags,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> AppKey {
        AppKey::new(self.name.clone(), self.version.clone())
    }
}

/// One entry of the remote app-store manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppTemplate {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Compose definition offered by the store, when inlined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_key_display() {
        assert_eq!(AppKey::new("nginx", "1.0").to_string(), "nginx:1.0");
    }

    #[test]
    fn test_app_key_roundtrip() {
        let app = App::new("nginx", "1.0", "www:\n  image: nginx\n", vec![]);
        assert_eq!(app.key(), AppKey::new("nginx", "1.0"));
    }
}
