// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the instance reconciliation loop:
//! merge semantics, stamp-based garbage collection, the created-state
//! exemption, and the abort-before-sweep guarantee on store failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use aegis_dashboard::application::Reconciler;
use aegis_dashboard::domain::events::Notification;
use aegis_dashboard::domain::instance::{
    AppRelease, DesiredPatch, Instance, InstanceFilter, InstanceState, ObservedInstance,
    ObservedPatch, ServiceInfo,
};
use aegis_dashboard::domain::repository::{InstanceRepository, RepositoryError};
use aegis_dashboard::infrastructure::event_bus::NotificationBus;
use aegis_dashboard::infrastructure::repositories::InMemoryInstanceRepository;

fn release() -> AppRelease {
    AppRelease {
        name: "nginx".to_string(),
        version: "1.0".to_string(),
        definition: "www:\n  image: nginx\n".to_string(),
    }
}

fn observed_running(port: u16) -> ObservedInstance {
    let mut services = HashMap::new();
    services.insert(
        "www".to_string(),
        ServiceInfo {
            port: Some(port),
            ..ServiceInfo::default()
        },
    );
    ObservedInstance {
        state: Some(InstanceState::Running),
        status: None,
        services,
    }
}

fn snapshot(entries: &[(&str, ObservedInstance)]) -> HashMap<String, ObservedInstance> {
    entries
        .iter()
        .map(|(name, observed)| (name.to_string(), observed.clone()))
        .collect()
}

fn setup() -> (Arc<InMemoryInstanceRepository>, Arc<NotificationBus>, Reconciler) {
    let instances = Arc::new(InMemoryInstanceRepository::new());
    let bus = Arc::new(NotificationBus::new(16));
    let reconciler = Reconciler::new(instances.clone(), bus.clone());
    (instances, bus, reconciler)
}

#[tokio::test]
async fn test_uniqueness_across_passes() {
    let (instances, _bus, reconciler) = setup();

    reconciler
        .reconcile(snapshot(&[("web1", observed_running(80))]))
        .await
        .unwrap();
    reconciler
        .reconcile(snapshot(&[("web1", observed_running(80))]))
        .await
        .unwrap();

    let all = instances.find_all(InstanceFilter::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "web1");
}

#[tokio::test]
async fn test_created_instance_survives_unobserved_pass() {
    let (instances, _bus, reconciler) = setup();

    instances
        .insert(Instance::created("pending", release(), None, None))
        .await
        .unwrap();

    reconciler.reconcile(HashMap::new()).await.unwrap();

    let all = instances.find_all(InstanceFilter::all()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "pending");
    assert_eq!(all[0].state, InstanceState::Created);
}

#[tokio::test]
async fn test_stale_running_instance_is_collected() {
    let (instances, _bus, reconciler) = setup();

    // First pass stamps "old" as running.
    reconciler
        .reconcile(snapshot(&[("old", observed_running(80))]))
        .await
        .unwrap();

    // Second pass does not observe it.
    let stats = reconciler
        .reconcile(snapshot(&[("new", observed_running(81))]))
        .await
        .unwrap();

    assert_eq!(stats.instances_removed, 1);
    let names: Vec<String> = instances
        .find_all(InstanceFilter::all())
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert_eq!(names, vec!["new"]);
}

#[tokio::test]
async fn test_merge_replaces_observed_fields_and_stamps() {
    let (instances, _bus, reconciler) = setup();

    let stats = reconciler
        .reconcile(snapshot(&[("web1", observed_running(80))]))
        .await
        .unwrap();

    let all = instances.find_all(InstanceFilter::all()).await.unwrap();
    let web1 = &all[0];
    assert_eq!(web1.state, InstanceState::Running);
    assert_eq!(web1.services["www"].port, Some(80));
    assert_eq!(web1.stamp, Some(stats.stamp));
}

#[tokio::test]
async fn test_reconcile_is_idempotent_up_to_stamp() {
    let (instances, _bus, reconciler) = setup();

    let first = reconciler
        .reconcile(snapshot(&[
            ("web1", observed_running(80)),
            ("db1", observed_running(5432)),
        ]))
        .await
        .unwrap();
    let before = instances.find_all(InstanceFilter::all()).await.unwrap();

    let second = reconciler
        .reconcile(snapshot(&[
            ("web1", observed_running(80)),
            ("db1", observed_running(5432)),
        ]))
        .await
        .unwrap();
    let after = instances.find_all(InstanceFilter::all()).await.unwrap();

    assert!(second.stamp > first.stamp);
    assert_eq!(second.instances_removed, 0);
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.name, a.name);
        assert_eq!(b.state, a.state);
        assert_eq!(b.services, a.services);
        assert_eq!(b.desired_state, a.desired_state);
        // Only the stamp moved.
        assert!(a.stamp > b.stamp);
    }
}

#[tokio::test]
async fn test_pass_publishes_full_snapshot() {
    let (_instances, bus, reconciler) = setup();
    let mut receiver = bus.subscribe();

    reconciler
        .reconcile(snapshot(&[("web1", observed_running(80))]))
        .await
        .unwrap();

    match receiver.recv().await.unwrap() {
        Notification::Instances(published) => {
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].name, "web1");
        }
        other => panic!("Wrong notification topic: {:?}", other.topic()),
    }
}

/// Store double that fails `apply_observed` for one instance name, delegating
/// everything else to an in-memory repository.
struct FailingObservedRepository {
    inner: InMemoryInstanceRepository,
    fail_on: String,
}

#[async_trait]
impl InstanceRepository for FailingObservedRepository {
    async fn insert(&self, instance: Instance) -> Result<Instance, RepositoryError> {
        self.inner.insert(instance).await
    }

    async fn find_all(&self, filter: InstanceFilter) -> Result<Vec<Instance>, RepositoryError> {
        self.inner.find_all(filter).await
    }

    async fn apply_observed(
        &self,
        name: &str,
        patch: ObservedPatch,
    ) -> Result<Instance, RepositoryError> {
        if name == self.fail_on {
            return Err(RepositoryError::Store("injected upsert failure".to_string()));
        }
        self.inner.apply_observed(name, patch).await
    }

    async fn apply_desired(
        &self,
        name: &str,
        patch: DesiredPatch,
    ) -> Result<Option<Instance>, RepositoryError> {
        self.inner.apply_desired(name, patch).await
    }

    async fn remove_where(&self, filter: InstanceFilter) -> Result<usize, RepositoryError> {
        self.inner.remove_where(filter).await
    }
}

#[tokio::test]
async fn test_failed_upsert_aborts_pass_before_sweep() {
    let inner = InMemoryInstanceRepository::new();
    let store = Arc::new(FailingObservedRepository {
        inner: inner.clone(),
        fail_on: "flaky".to_string(),
    });
    let bus = Arc::new(NotificationBus::new(16));
    let reconciler = Reconciler::new(store.clone(), bus);

    // Seed a record under an old stamp via a clean pass.
    reconciler
        .reconcile(snapshot(&[("survivor", observed_running(80))]))
        .await
        .unwrap();

    // This pass fails mid-upsert; "survivor" is unobserved and would be
    // stale, but the sweep must not run.
    let err = reconciler
        .reconcile(snapshot(&[("flaky", observed_running(81))]))
        .await;
    assert!(err.is_err());

    let names: Vec<String> = inner
        .find_all(InstanceFilter::all())
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.name)
        .collect();
    assert!(names.contains(&"survivor".to_string()));
}
