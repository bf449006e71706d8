// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Compose Definition Handling
//!
//! Pure functions over compose definition payloads: deriving catalog tags and
//! enhancing an app definition into the release descriptor shipped to the
//! agent. Definitions are either a bare service map or a document with a
//! top-level `services` mapping; both shapes are accepted.

use serde_yaml::Value;
use thiserror::Error;

use crate::domain::app::App;
use crate::domain::instance::{AppRelease, InstanceOptions};

/// Label identifying the owning instance on every enhanced service.
pub const INSTANCE_LABEL: &str = "ai.100monkeys.instance";

/// Label identifying the service name on every enhanced service.
pub const SERVICE_LABEL: &str = "ai.100monkeys.service";

/// Mount point of the storage bucket inside each container.
pub const BUCKET_MOUNT: &str = "/bucket";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("compose definition is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("compose definition is not a mapping of services")]
    NotAMapping,
}

/// Derive catalog tags from a definition's top-level `tags` list.
pub fn derive_tags(definition: &str) -> Result<Vec<String>, ComposeError> {
    let doc: Value = serde_yaml::from_str(definition)?;
    let tags = doc
        .get("tags")
        .and_then(Value::as_sequence)
        .map(|seq| {
            seq.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    Ok(tags)
}

/// Produce the enhanced release descriptor for a start request.
///
/// Every service gets a deterministic container name and instance/service
/// labels. When the effective options name a storage bucket, each service
/// also gets a volume mounting that bucket at [`BUCKET_MOUNT`].
pub fn enhance_release(
    instance_name: &str,
    options: &InstanceOptions,
    app: &App,
) -> Result<AppRelease, ComposeError> {
    let mut doc: Value = serde_yaml::from_str(&app.definition)?;

    let nested = matches!(doc.get("services"), Some(v) if v.is_mapping());
    let services = if nested {
        doc.get_mut("services")
            .and_then(Value::as_mapping_mut)
            .ok_or(ComposeError::NotAMapping)?
    } else {
        doc.as_mapping_mut().ok_or(ComposeError::NotAMapping)?
    };

    for (key, service) in services.iter_mut() {
        let Some(service_name) = key.as_str() else {
            continue;
        };
        // Top-level scalar keys (e.g. `tags`, `version`) are not services.
        let Some(service) = service.as_mapping_mut() else {
            continue;
        };

        service.insert(
            Value::from("container_name"),
            Value::from(format!("{}_{}", instance_name, service_name)),
        );

        let labels = service
            .entry(Value::from("labels"))
            .or_insert_with(|| Value::Sequence(Vec::new()));
        match labels {
            Value::Sequence(seq) => {
                seq.push(Value::from(format!("{}={}", INSTANCE_LABEL, instance_name)));
                seq.push(Value::from(format!("{}={}", SERVICE_LABEL, service_name)));
            }
            Value::Mapping(map) => {
                map.insert(Value::from(INSTANCE_LABEL), Value::from(instance_name));
                map.insert(Value::from(SERVICE_LABEL), Value::from(service_name));
            }
            _ => {}
        }

        if let Some(bucket) = &options.storage_bucket {
            let volumes = service
                .entry(Value::from("volumes"))
                .or_insert_with(|| Value::Sequence(Vec::new()));
            if let Value::Sequence(seq) = volumes {
                seq.push(Value::from(format!("{}:{}", bucket, BUCKET_MOUNT)));
            }
        }
    }

    Ok(AppRelease {
        name: app.name.clone(),
        version: app.version.clone(),
        definition: serde_yaml::to_string(&doc)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(definition: &str) -> App {
        App::new("nginx", "1.0", definition, vec![])
    }

    fn options_with_bucket(bucket: &str) -> InstanceOptions {
        InstanceOptions {
            storage_bucket: Some(bucket.to_string()),
            ..InstanceOptions::default()
        }
    }

    #[test]
    fn test_derive_tags() {
        let tags = derive_tags("tags:\n  - web\n  - demo\nwww:\n  image: nginx\n").unwrap();
        assert_eq!(tags, vec!["web", "demo"]);
    }

    #[test]
    fn test_derive_tags_absent() {
        assert!(derive_tags("www:\n  image: nginx\n").unwrap().is_empty());
    }

    #[test]
    fn test_enhance_bare_service_map() {
        let release = enhance_release(
            "web1",
            &options_with_bucket("web1"),
            &app("www:\n  image: nginx\n"),
        )
        .unwrap();

        let doc: Value = serde_yaml::from_str(&release.definition).unwrap();
        let www = doc.get("www").unwrap();
        assert_eq!(
            www.get("container_name").and_then(Value::as_str),
            Some("web1_www")
        );

        let labels: Vec<&str> = www
            .get("labels")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(labels.contains(&"ai.100monkeys.instance=web1"));
        assert!(labels.contains(&"ai.100monkeys.service=www"));

        let volumes: Vec<&str> = www
            .get("volumes")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(volumes.contains(&"web1:/bucket"));
    }

    #[test]
    fn test_enhance_nested_services() {
        let definition = "services:\n  db:\n    image: postgres\n";
        let release =
            enhance_release("data1", &InstanceOptions::default(), &app(definition)).unwrap();

        let doc: Value = serde_yaml::from_str(&release.definition).unwrap();
        let db = doc.get("services").unwrap().get("db").unwrap();
        assert_eq!(
            db.get("container_name").and_then(Value::as_str),
            Some("data1_db")
        );
        // No bucket in options means no volume injection.
        assert!(db.get("volumes").is_none());
    }

    #[test]
    fn test_enhance_preserves_existing_volumes() {
        let definition = "www:\n  image: nginx\n  volumes:\n    - ./conf:/etc/nginx\n";
        let release =
            enhance_release("web1", &options_with_bucket("shared"), &app(definition)).unwrap();

        let doc: Value = serde_yaml::from_str(&release.definition).unwrap();
        let volumes: Vec<&str> = doc
            .get("www")
            .unwrap()
            .get("volumes")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(volumes, vec!["./conf:/etc/nginx", "shared:/bucket"]);
    }

    #[test]
    fn test_enhance_rejects_scalar_document() {
        let err = enhance_release("web1", &InstanceOptions::default(), &app("just a string"));
        assert!(matches!(err, Err(ComposeError::NotAMapping)));
    }
}
