use crate::{Claim, LockRequest, NewClaim, Resource, StoreErr};

/// The result of trying to take the exclusive lock on a resource row
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock is held by this transaction until commit or rollback.
    /// The resource is read after the lock was granted.
    Acquired(Resource),
    /// No resource with this key exists
    NotFound,
    /// The row is held elsewhere and the request refused to wait
    Busy,
    /// The row stayed held elsewhere for the whole wait budget
    TimedOut,
}

/// One atomic unit of work against a [RecordStore](crate::RecordStore).
///
/// Writes become visible to other transactions on [StoreTransaction::commit]
/// and are discarded on [StoreTransaction::rollback] or drop. Row locks are
/// released at the same moment.
#[async_trait::async_trait]
pub trait StoreTransaction: Send {
    /// Take the exclusive row lock on a resource, honoring the wait discipline.
    /// Re-locking a row already held by this transaction succeeds at once.
    async fn lock_resource(
        &mut self,
        resource_id: i64,
        request: LockRequest,
    ) -> Result<LockOutcome, StoreErr>;

    /// Read a resource without locking it; sees this transaction's own writes
    async fn find_resource(&mut self, resource_id: i64) -> Result<Option<Resource>, StoreErr>;

    /// Count claims against a resource, including this transaction's own inserts
    async fn count_claims(&mut self, resource_id: i64) -> Result<u64, StoreErr>;

    /// Count claims a requester holds against a resource
    async fn count_claims_by_requester(
        &mut self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<u64, StoreErr>;

    /// Insert an admitted claim
    async fn insert_claim(&mut self, claim: NewClaim) -> Result<Claim, StoreErr>;

    /// Increment the resource version if it still equals `expected`.
    ///
    /// Returns `false` when the version moved on. Like a SQL `UPDATE`, this
    /// waits for the row lock when another transaction holds it.
    async fn bump_version(&mut self, resource_id: i64, expected: i64) -> Result<bool, StoreErr>;

    /// Commit the transaction, releasing every row lock it holds
    async fn commit(self) -> Result<(), StoreErr>;

    /// Roll back the transaction, releasing every row lock it holds
    async fn rollback(self) -> Result<(), StoreErr>;
}
