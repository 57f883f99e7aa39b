#![allow(dead_code)]

use sea_quota::{
    AllocatorConfig, MemoryStore, NewResource, PessimisticAllocator, RecordStore, Resource,
    StoreErr,
};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestContext {
    pub store: MemoryStore,
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        Self {
            store: MemoryStore::new(),
        }
    }

    pub async fn resource(&self, capacity: Option<u32>) -> Result<Resource, StoreErr> {
        self.store
            .insert_resource(NewResource::new("Limited Campaign", capacity))
            .await
    }

    pub fn pessimistic(&self, config: AllocatorConfig) -> Arc<PessimisticAllocator<MemoryStore>> {
        Arc::new(PessimisticAllocator::new(self.store.clone(), config))
    }

    pub async fn claims(&self, resource_id: i64) -> Result<u64, StoreErr> {
        self.store.count_claims(resource_id).await
    }
}

pub fn requester(n: usize) -> String {
    format!("user{n}")
}
