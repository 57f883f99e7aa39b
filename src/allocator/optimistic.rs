use super::{Allocator, admit, locked_resource, refuse};
use crate::{
    AllocationError, AllocatorConfig, Claim, ClaimDefaults, RecordStore, StoreTransaction,
};
use tracing::{debug, instrument};

/// Admits claims against an unlocked read and validates the resource
/// `version` on the way out.
///
/// The count happens without holding the row lock. Before committing, the
/// row is locked just long enough to check that its version is still the one
/// read at the start; every committed admission bumps the version, so a
/// match proves no claim was committed in between. A lost race fails with
/// [AllocationError::StaleVersion] and nothing is written.
///
/// Safe to run side by side with [PessimisticAllocator](super::PessimisticAllocator)
/// on the same resources.
#[derive(Debug, Clone)]
pub struct OptimisticAllocator<S> {
    store: S,
    config: AllocatorConfig,
    defaults: ClaimDefaults,
}

impl<S> OptimisticAllocator<S>
where
    S: RecordStore,
{
    pub fn new(store: S, config: AllocatorConfig) -> Self {
        Self {
            store,
            config,
            defaults: ClaimDefaults::default(),
        }
    }

    /// Replace the producers used to fill in new claims
    pub fn with_defaults(mut self, defaults: ClaimDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait::async_trait]
impl<S> Allocator for OptimisticAllocator<S>
where
    S: RecordStore,
{
    #[instrument(level = "debug", skip(self))]
    async fn try_allocate(
        &self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<Claim, AllocationError> {
        let mut txn = self.store.begin().await?;
        let Some(read) = txn.find_resource(resource_id).await? else {
            return refuse(txn, AllocationError::ResourceNotFound { resource_id }).await;
        };

        let claim = match admit(&mut txn, &self.config, &self.defaults, &read, requester_id).await
        {
            Ok(claim) => claim,
            Err(err) => return refuse(txn, err).await,
        };

        let request = self.config.lock_request();
        let outcome = txn.lock_resource(resource_id, request).await?;
        let current = match locked_resource(outcome, resource_id, &request) {
            Ok(current) => current,
            Err(err) => return refuse(txn, err).await,
        };
        if current.version != read.version
            || !txn.bump_version(resource_id, read.version).await?
        {
            debug!(
                resource_id,
                read = read.version,
                current = current.version,
                "version moved on"
            );
            return refuse(txn, AllocationError::StaleVersion { resource_id }).await;
        }
        txn.commit().await?;
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LockRequest, MemoryStore, NewResource, PessimisticAllocator, StoreErr};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn commit_between_read_and_write_is_stale() -> Result<(), StoreErr> {
        let store = MemoryStore::new();
        let resource = store
            .insert_resource(NewResource::bounded("Workshop", 5))
            .await?;

        // hold the row so the optimistic writer parks at its version check
        let mut holder = store.begin().await?;
        holder
            .lock_resource(resource.id, LockRequest::blocking())
            .await?;

        let optimistic = OptimisticAllocator::new(store.clone(), AllocatorConfig::new());
        let racing = tokio::spawn(async move { optimistic.try_allocate(resource.id, "ann").await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        holder.bump_version(resource.id, 0).await?;
        holder.commit().await?;

        assert_eq!(
            racing.await.map_err(|e| StoreErr::Exec(e.to_string()))?,
            Err(AllocationError::StaleVersion {
                resource_id: resource.id
            })
        );
        assert_eq!(store.count_claims(resource.id).await?, 0);

        let pessimistic = PessimisticAllocator::new(store.clone(), AllocatorConfig::new());
        assert!(pessimistic.try_allocate(resource.id, "ben").await.is_ok());
        Ok(())
    }
}
