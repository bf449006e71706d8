use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::app::{App, AppKey};
use crate::domain::bucket::Bucket;
use crate::domain::instance::{DesiredPatch, Instance, InstanceFilter, ObservedPatch};
use crate::domain::repository::{
    AppRepository, BucketRepository, InstanceRepository, RepositoryError,
};

fn poisoned() -> RepositoryError {
    RepositoryError::Store("mutex poisoned".to_string())
}

/// In-memory instance store, keyed by instance name.
#[derive(Clone, Default)]
pub struct InMemoryInstanceRepository {
    records: Arc<Mutex<HashMap<String, Instance>>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn insert(&self, instance: Instance) -> Result<Instance, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        if records.contains_key(&instance.name) {
            return Err(RepositoryError::AlreadyExists(instance.name));
        }
        records.insert(instance.name.clone(), instance.clone());
        Ok(instance)
    }

    async fn find_all(&self, filter: InstanceFilter) -> Result<Vec<Instance>, RepositoryError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        let mut matching: Vec<Instance> = records
            .values()
            .filter(|instance| filter.matches(instance))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    async fn apply_observed(
        &self,
        name: &str,
        patch: ObservedPatch,
    ) -> Result<Instance, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let updated = match records.get_mut(name) {
            Some(instance) => {
                instance.state = patch.state;
                instance.services = patch.services;
                if let Some(status) = patch.status {
                    instance.status = status;
                }
                instance.stamp = Some(patch.stamp);
                instance.updated_at = Utc::now();
                instance.clone()
            }
            None => {
                let instance = patch.into_instance(name);
                records.insert(name.to_string(), instance.clone());
                instance
            }
        };
        Ok(updated)
    }

    async fn apply_desired(
        &self,
        name: &str,
        patch: DesiredPatch,
    ) -> Result<Option<Instance>, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let Some(instance) = records.get_mut(name) else {
            return Ok(None);
        };
        instance.desired_state = patch.desired_state;
        instance.status = patch.status;
        if patch.stopped_by.is_some() {
            instance.stopped_by = patch.stopped_by;
        }
        instance.updated_at = Utc::now();
        Ok(Some(instance.clone()))
    }

    async fn remove_where(&self, filter: InstanceFilter) -> Result<usize, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|_, instance| !filter.matches(instance));
        Ok(before - records.len())
    }
}

/// In-memory bucket store, keyed by bucket name.
#[derive(Clone, Default)]
pub struct InMemoryBucketRepository {
    records: Arc<Mutex<HashMap<String, Bucket>>>,
}

impl InMemoryBucketRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl BucketRepository for InMemoryBucketRepository {
    async fn insert(&self, bucket: Bucket) -> Result<Bucket, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        if records.contains_key(&bucket.name) {
            return Err(RepositoryError::AlreadyExists(bucket.name));
        }
        records.insert(bucket.name.clone(), bucket.clone());
        Ok(bucket)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Bucket>, RepositoryError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.get(name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Bucket>, RepositoryError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        let mut buckets: Vec<Bucket> = records.values().cloned().collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn set_locked(
        &self,
        name: &str,
        locked: bool,
    ) -> Result<Option<Bucket>, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let Some(bucket) = records.get_mut(name) else {
            return Ok(None);
        };
        bucket.is_locked = locked;
        bucket.updated_at = Utc::now();
        Ok(Some(bucket.clone()))
    }
}

/// In-memory app store, keyed by (name, version).
#[derive(Clone, Default)]
pub struct InMemoryAppRepository {
    records: Arc<Mutex<HashMap<AppKey, App>>>,
}

impl InMemoryAppRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl AppRepository for InMemoryAppRepository {
    async fn upsert(&self, app: App) -> Result<App, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        let key = app.key();
        let stored = match records.get(&key) {
            Some(existing) => {
                let mut updated = app;
                updated.id = existing.id;
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                updated
            }
            None => app,
        };
        records.insert(key, stored.clone());
        Ok(stored)
    }

    async fn find_by_key(&self, key: &AppKey) -> Result<Option<App>, RepositoryError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.get(key).cloned())
    }

    async fn list_all(&self) -> Result<Vec<App>, RepositoryError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        let mut apps: Vec<App> = records.values().cloned().collect();
        apps.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Ok(apps)
    }

    async fn remove(&self, key: &AppKey) -> Result<usize, RepositoryError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.remove(key).map(|_| 1).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instance::{
        AppRelease, DesiredState, InstanceState, ReconcileStamp, ServiceInfo,
    };
    use std::collections::HashMap as StdHashMap;

    fn release() -> AppRelease {
        AppRelease {
            name: "nginx".to_string(),
            version: "1.0".to_string(),
            definition: "www:\n  image: nginx\n".to_string(),
        }
    }

    fn observed(stamp: u64) -> ObservedPatch {
        let mut services = StdHashMap::new();
        services.insert(
            "www".to_string(),
            ServiceInfo {
                port: Some(80),
                ..ServiceInfo::default()
            },
        );
        ObservedPatch {
            state: InstanceState::Running,
            status: None,
            services,
            stamp: ReconcileStamp(stamp),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_name() {
        let repo = InMemoryInstanceRepository::new();
        repo.insert(Instance::created("web1", release(), None, None))
            .await
            .unwrap();

        let err = repo
            .insert(Instance::created("web1", release(), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_apply_observed_updates_only_observed_fields() {
        let repo = InMemoryInstanceRepository::new();
        repo.insert(Instance::created("web1", release(), Some("web1".into()), None))
            .await
            .unwrap();

        let updated = repo.apply_observed("web1", observed(5)).await.unwrap();
        assert_eq!(updated.state, InstanceState::Running);
        assert_eq!(updated.stamp, Some(ReconcileStamp(5)));
        assert_eq!(updated.services["www"].port, Some(80));
        // Controller-owned fields untouched.
        assert_eq!(updated.desired_state, DesiredState::Running);
        assert_eq!(updated.storage_bucket.as_deref(), Some("web1"));
    }

    #[tokio::test]
    async fn test_apply_observed_creates_missing_record() {
        let repo = InMemoryInstanceRepository::new();
        let created = repo.apply_observed("stray", observed(9)).await.unwrap();
        assert_eq!(created.name, "stray");
        assert_eq!(created.desired_state, DesiredState::Running);
        assert_eq!(created.stamp, Some(ReconcileStamp(9)));
    }

    #[tokio::test]
    async fn test_apply_desired_never_creates() {
        let repo = InMemoryInstanceRepository::new();
        let patch = DesiredPatch {
            desired_state: DesiredState::Stopped,
            status: "Instance stop is requested".to_string(),
            stopped_by: Some("admin".to_string()),
        };
        assert!(repo.apply_desired("ghost", patch).await.unwrap().is_none());
        assert!(repo.find_all(InstanceFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_where_stale() {
        let repo = InMemoryInstanceRepository::new();
        repo.apply_observed("old", observed(1)).await.unwrap();
        repo.apply_observed("fresh", observed(2)).await.unwrap();
        repo.insert(Instance::created("pending", release(), None, None))
            .await
            .unwrap();

        let removed = repo
            .remove_where(InstanceFilter::stale(ReconcileStamp(2)))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let names: Vec<String> = repo
            .find_all(InstanceFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["fresh", "pending"]);
    }

    #[tokio::test]
    async fn test_bucket_set_locked() {
        let repo = InMemoryBucketRepository::new();
        repo.insert(Bucket::new("data")).await.unwrap();

        let locked = repo.set_locked("data", true).await.unwrap().unwrap();
        assert!(locked.is_locked);
        assert!(repo.set_locked("ghost", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_app_upsert_keeps_identity() {
        let repo = InMemoryAppRepository::new();
        let first = repo
            .upsert(App::new("nginx", "1.0", "www:\n  image: nginx\n", vec![]))
            .await
            .unwrap();

        let second = repo
            .upsert(App::new(
                "nginx",
                "1.0",
                "www:\n  image: nginx:alpine\n",
                vec!["web".to_string()],
            ))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.tags, vec!["web"]);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_app_remove() {
        let repo = InMemoryAppRepository::new();
        repo.upsert(App::new("nginx", "1.0", "www: {}\n", vec![]))
            .await
            .unwrap();

        assert_eq!(repo.remove(&AppKey::new("nginx", "1.0")).await.unwrap(), 1);
        assert_eq!(repo.remove(&AppKey::new("nginx", "1.0")).await.unwrap(), 0);
    }
}
