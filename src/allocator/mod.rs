//! Capacity gated allocation of claims against resources.
//!
//! An allocation either persists exactly one [Claim] or fails without
//! writing anything. The count and the insert always happen inside a single
//! store transaction; what differs between allocators is how that
//! transaction is protected from concurrent ones.

mod optimistic;
mod pessimistic;

pub use optimistic::*;
pub use pessimistic::*;

use crate::{
    AllocationError, AllocatorConfig, Claim, ClaimDefaults, ClaimDraft, LockOutcome, LockRequest,
    Resource, StoreErr, StoreTransaction,
};
use tracing::debug;

/// Admits allocation requests against capacity bounded resources
#[async_trait::async_trait]
pub trait Allocator: Send + Sync {
    /// Claim one seat of `resource_id` on behalf of `requester_id`.
    ///
    /// Never retries internally; see [AllocationError::is_transient] for the
    /// outcomes worth retrying.
    async fn try_allocate(
        &self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<Claim, AllocationError>;
}

/// Turn the outcome of a row lock attempt into the locked resource or the
/// matching allocation error
pub(crate) fn locked_resource(
    outcome: LockOutcome,
    resource_id: i64,
    request: &LockRequest,
) -> Result<Resource, AllocationError> {
    match outcome {
        LockOutcome::Acquired(resource) => Ok(resource),
        LockOutcome::NotFound => Err(AllocationError::ResourceNotFound { resource_id }),
        LockOutcome::Busy => Err(AllocationError::ResourceBusy { resource_id }),
        LockOutcome::TimedOut => Err(AllocationError::AllocationTimeout {
            resource_id,
            waited: request.wait_budget().unwrap_or_default(),
        }),
    }
}

/// Count, check and insert inside `txn`.
///
/// The caller decides how the transaction is protected and what happens to
/// it afterwards.
pub(crate) async fn admit<T>(
    txn: &mut T,
    config: &AllocatorConfig,
    defaults: &ClaimDefaults,
    resource: &Resource,
    requester_id: &str,
) -> Result<Claim, AllocationError>
where
    T: StoreTransaction,
{
    let resource_id = resource.id;
    let draft = ClaimDraft::new(resource_id, requester_id, defaults);
    let held = txn.count_claims(resource_id).await?;
    let capacity = config.effective_capacity(resource.capacity);

    if let Some(capacity) = capacity {
        if held >= u64::from(capacity) {
            debug!(resource_id, held, capacity, status = %draft.reject(), "resource is full");
            return Err(AllocationError::CapacityExceeded {
                resource_id,
                capacity,
            });
        }
    }

    if config.one_claim_per_requester
        && txn
            .count_claims_by_requester(resource_id, requester_id)
            .await?
            > 0
    {
        debug!(resource_id, requester_id, status = %draft.reject(), "duplicate claim");
        return Err(duplicate(resource_id, requester_id));
    }

    debug!(resource_id, held, ?capacity, "claim admitted");
    txn.insert_claim(draft.confirm())
        .await
        .map_err(|err| match err {
            StoreErr::UniqueViolation(_) => duplicate(resource_id, requester_id),
            err => err.into(),
        })
}

fn duplicate(resource_id: i64, requester_id: &str) -> AllocationError {
    AllocationError::DuplicateClaim {
        resource_id,
        requester_id: requester_id.to_owned(),
    }
}

/// Roll back and hand the refusal to the caller
pub(crate) async fn refuse<T>(txn: T, err: AllocationError) -> Result<Claim, AllocationError>
where
    T: StoreTransaction,
{
    txn.rollback().await?;
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn resource() -> Resource {
        Resource {
            id: 9,
            name: "Seats".to_owned(),
            capacity: Some(1),
            version: 0,
        }
    }

    #[test]
    fn lock_outcomes() {
        let request = LockRequest::blocking_for(Duration::from_millis(30));
        assert_eq!(
            locked_resource(LockOutcome::Acquired(resource()), 9, &request),
            Ok(resource())
        );
        assert_eq!(
            locked_resource(LockOutcome::NotFound, 9, &request),
            Err(AllocationError::ResourceNotFound { resource_id: 9 })
        );
        assert_eq!(
            locked_resource(LockOutcome::Busy, 9, &LockRequest::no_wait()),
            Err(AllocationError::ResourceBusy { resource_id: 9 })
        );
        assert_eq!(
            locked_resource(LockOutcome::TimedOut, 9, &request),
            Err(AllocationError::AllocationTimeout {
                resource_id: 9,
                waited: Duration::from_millis(30),
            })
        );
    }
}
