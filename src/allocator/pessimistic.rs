use super::{Allocator, admit, locked_resource, refuse};
use crate::{
    AllocationError, AllocatorConfig, Claim, ClaimDefaults, LockRequest, RecordStore,
    StoreTransaction,
};
use tracing::{debug, instrument};

/// Serializes allocations per resource with an exclusive row lock.
///
/// The resource row is locked before the claims are counted and stays locked
/// until the new claim is committed, so no two allocations on the same
/// resource ever interleave between count and insert. Allocations on
/// different resources take different locks and proceed in parallel.
#[derive(Debug, Clone)]
pub struct PessimisticAllocator<S> {
    store: S,
    config: AllocatorConfig,
    defaults: ClaimDefaults,
}

impl<S> PessimisticAllocator<S>
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

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Allocate with an explicit lock request instead of the configured one
    #[instrument(level = "debug", skip(self))]
    pub async fn try_allocate_with(
        &self,
        resource_id: i64,
        requester_id: &str,
        request: LockRequest,
    ) -> Result<Claim, AllocationError> {
        let mut txn = self.store.begin().await?;
        let outcome = txn.lock_resource(resource_id, request).await?;
        let resource = match locked_resource(outcome, resource_id, &request) {
            Ok(resource) => resource,
            Err(err) => {
                debug!(resource_id, %err, "lock not acquired");
                return refuse(txn, err).await;
            }
        };

        let claim = match admit(&mut txn, &self.config, &self.defaults, &resource, requester_id)
            .await
        {
            Ok(claim) => claim,
            Err(err) => return refuse(txn, err).await,
        };
        // the row lock is ours, so the version cannot have moved
        if !txn.bump_version(resource_id, resource.version).await? {
            return refuse(txn, AllocationError::StaleVersion { resource_id }).await;
        }
        txn.commit().await?;
        Ok(claim)
    }

    /// Take a seat on the first candidate that is free and has room.
    ///
    /// Candidates are locked with `SKIP LOCKED`, so a resource held by
    /// another allocation is passed over instead of waited for. When no
    /// candidate admits the claim, a contended candidate is reported first
    /// (retrying may help), then the last refusal, then a missing resource.
    #[instrument(level = "debug", skip(self))]
    pub async fn allocate_any(
        &self,
        resource_ids: &[i64],
        requester_id: &str,
    ) -> Result<Claim, AllocationError> {
        let mut busy = None;
        let mut refused = None;
        let mut missing = None;
        for &resource_id in resource_ids {
            match self
                .try_allocate_with(resource_id, requester_id, LockRequest::skip_locked())
                .await
            {
                Ok(claim) => return Ok(claim),
                Err(err @ AllocationError::ResourceBusy { .. }) => {
                    busy.get_or_insert(err);
                }
                Err(
                    err @ (AllocationError::CapacityExceeded { .. }
                    | AllocationError::DuplicateClaim { .. }),
                ) => refused = Some(err),
                Err(err @ AllocationError::ResourceNotFound { .. }) => {
                    missing.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(busy
            .or(refused)
            .or(missing)
            .unwrap_or(AllocationError::NoCandidates))
    }
}

#[async_trait::async_trait]
impl<S> Allocator for PessimisticAllocator<S>
where
    S: RecordStore,
{
    async fn try_allocate(
        &self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<Claim, AllocationError> {
        self.try_allocate_with(resource_id, requester_id, self.config.lock_request())
            .await
    }
}
