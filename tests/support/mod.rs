#![allow(dead_code)]

use std::sync::Arc;

use inkpost::application::repos::ContentRepo;
use inkpost::application::{ContentMutationCoordinator, ViewConfig};
use inkpost::cache::{CacheBackend, CacheConfig, CacheIndex, MemoryCacheBackend};
use inkpost::domain::entities::Actor;
use inkpost::domain::types::Role;
use inkpost::infra::memory::InMemoryContentRepo;
use inkpost::util::clock::ManualClock;
use time::macros::datetime;

pub struct Harness {
    pub repo: Arc<InMemoryContentRepo>,
    pub clock: Arc<ManualClock>,
    pub coordinator: ContentMutationCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(datetime!(2026-03-01 09:00 UTC)));
        let config = CacheConfig::default();
        let backend = Arc::new(MemoryCacheBackend::new(&config, clock.clone()));
        Self::with_backend(clock, backend, config)
    }

    pub fn with_backend(
        clock: Arc<ManualClock>,
        backend: Arc<dyn CacheBackend>,
        config: CacheConfig,
    ) -> Self {
        let repo = Arc::new(InMemoryContentRepo::new(clock.clone()));
        let coordinator = build_coordinator(repo.clone(), clock.clone(), backend, config);
        Self {
            repo,
            clock,
            coordinator,
        }
    }

    pub async fn user(&self, role: Role) -> Actor {
        self.repo.add_user(role).await
    }

    /// A second coordinator sharing this clock but driving `repo`.
    pub fn coordinator_over(&self, repo: Arc<dyn ContentRepo>) -> ContentMutationCoordinator {
        let config = CacheConfig::default();
        let backend = Arc::new(MemoryCacheBackend::new(&config, self.clock.clone()));
        build_coordinator(repo, self.clock.clone(), backend, config)
    }
}

fn build_coordinator(
    repo: Arc<dyn ContentRepo>,
    clock: Arc<ManualClock>,
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
) -> ContentMutationCoordinator {
    ContentMutationCoordinator::new(
        repo,
        CacheIndex::new(backend, config),
        &ViewConfig {
            fingerprint_salt: "test-salt".to_string(),
            ..Default::default()
        },
        clock,
    )
}
