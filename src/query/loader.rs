use crate::{AllocatorConfig, Claim, RecordStore, Resource, ResourceState, StoreErr};
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resource together with the claims currently held against it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub resource: Resource,
    pub claims: Vec<Claim>,
    pub state: ResourceState,
}

/// Eager loading of claims for many resources at once.
///
/// Issues exactly one store query regardless of how many resources are
/// given: fetch the children with `resource_id IN (..)`, then group them
/// under their parent.
#[async_trait]
pub trait ClaimLoader {
    /// The claims of each resource, in the same order as the resources
    async fn load_claims<S>(&self, store: &S) -> Result<Vec<Vec<Claim>>, StoreErr>
    where
        S: RecordStore;

    /// Each resource with its claims and the [ResourceState] an allocator
    /// running under `config` would see
    async fn occupancy<S>(
        &self,
        store: &S,
        config: &AllocatorConfig,
    ) -> Result<Vec<Occupancy>, StoreErr>
    where
        S: RecordStore;
}

#[async_trait]
impl ClaimLoader for Vec<Resource> {
    async fn load_claims<S>(&self, store: &S) -> Result<Vec<Vec<Claim>>, StoreErr>
    where
        S: RecordStore,
    {
        self.as_slice().load_claims(store).await
    }

    async fn occupancy<S>(
        &self,
        store: &S,
        config: &AllocatorConfig,
    ) -> Result<Vec<Occupancy>, StoreErr>
    where
        S: RecordStore,
    {
        self.as_slice().occupancy(store, config).await
    }
}

#[async_trait]
impl ClaimLoader for &[Resource] {
    async fn load_claims<S>(&self, store: &S) -> Result<Vec<Vec<Claim>>, StoreErr>
    where
        S: RecordStore,
    {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<i64> = self.iter().map(|r| r.id).unique().collect();
        let children = store.find_claims_by_resources(&keys).await?;
        Ok(group_by_parent(self, children))
    }

    async fn occupancy<S>(
        &self,
        store: &S,
        config: &AllocatorConfig,
    ) -> Result<Vec<Occupancy>, StoreErr>
    where
        S: RecordStore,
    {
        let claims = self.load_claims(store).await?;
        Ok(self
            .iter()
            .zip(claims)
            .map(|(resource, claims)| Occupancy {
                state: config.resource_state(resource, claims.len() as u64),
                resource: resource.clone(),
                claims,
            })
            .collect())
    }
}

/// Distribute children over parents through a multimap keyed by `resource_id`
fn group_by_parent(parents: &[Resource], children: Vec<Claim>) -> Vec<Vec<Claim>> {
    let by_parent: HashMap<i64, Vec<Claim>> =
        children.into_iter().into_group_map_by(|c| c.resource_id);
    parents
        .iter()
        .map(|parent| by_parent.get(&parent.id).cloned().unwrap_or_default())
        .collect()
}
