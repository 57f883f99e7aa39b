use crate::{Claim, NewResource, Resource, StoreErr, StoreTransaction};

/// A transactional record store holding resources and their claims.
///
/// Implementations own whatever connection handles they need and are cheap
/// to share between tasks; all cross-caller coordination happens inside the
/// store through [StoreTransaction::lock_resource].
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// The unit of work handed out by [RecordStore::begin]
    type Transaction: StoreTransaction;

    /// Start a transaction. Dropping it without commit rolls it back.
    async fn begin(&self) -> Result<Self::Transaction, StoreErr>;

    /// Insert a resource and return it with its assigned key
    async fn insert_resource(&self, resource: NewResource) -> Result<Resource, StoreErr>;

    /// Read a resource without locking it
    async fn find_resource(&self, resource_id: i64) -> Result<Option<Resource>, StoreErr>;

    /// Read many resources without locking them, in key order
    async fn find_resources(&self, resource_ids: &[i64]) -> Result<Vec<Resource>, StoreErr>;

    /// Count committed claims held against a resource
    async fn count_claims(&self, resource_id: i64) -> Result<u64, StoreErr>;

    /// Fetch every committed claim referencing any of the given resources,
    /// in one round trip, ordered by claim key
    async fn find_claims_by_resources(&self, resource_ids: &[i64]) -> Result<Vec<Claim>, StoreErr>;
}
