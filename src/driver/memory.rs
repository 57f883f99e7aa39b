use crate::{
    Claim, LockOutcome, LockRequest, NewClaim, NewResource, RecordStore, Resource, StoreErr,
    StoreTransaction, WaitDiscipline,
};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::trace;

/// A record store living in process memory.
///
/// Every resource row carries its own async mutex, so exclusive row locks
/// behave like `SELECT ... FOR UPDATE`: they are held until the owning
/// transaction commits or rolls back, waiters queue, and `NOWAIT` /
/// `SKIP LOCKED` fail fast. Writes are staged per transaction and published
/// atomically on commit. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: Mutex<Tables>,
    resource_seq: AtomicI64,
    claim_seq: AtomicI64,
    queries: AtomicUsize,
}

#[derive(Debug, Default)]
struct Tables {
    resources: BTreeMap<i64, ResourceRow>,
    claims: BTreeMap<i64, Claim>,
}

#[derive(Debug)]
struct ResourceRow {
    model: Resource,
    lock: Arc<RowLock<()>>,
}

/// A unit of work against a [MemoryStore]
#[derive(Debug)]
pub struct MemoryTransaction {
    inner: Arc<MemoryInner>,
    held: HashMap<i64, OwnedMutexGuard<()>>,
    inserted: Vec<Claim>,
    versions: HashMap<i64, i64>,
    open: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read statements served outside transactions so far
    pub fn query_count(&self) -> usize {
        self.inner.queries.load(Ordering::SeqCst)
    }
}

impl MemoryInner {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreErr> {
        self.tables.lock().map_err(|_| StoreErr::MutexPoisonError)
    }

    fn row_lock(&self, resource_id: i64) -> Result<Option<Arc<RowLock<()>>>, StoreErr> {
        Ok(self
            .tables()?
            .resources
            .get(&resource_id)
            .map(|row| Arc::clone(&row.lock)))
    }

    fn resource(&self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        Ok(self
            .tables()?
            .resources
            .get(&resource_id)
            .map(|row| row.model.clone()))
    }

    fn count_claims<F>(&self, filter: F) -> Result<u64, StoreErr>
    where
        F: Fn(&Claim) -> bool,
    {
        Ok(self.tables()?.claims.values().filter(|&c| filter(c)).count() as u64)
    }

    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn observe_query(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, StoreErr> {
        Ok(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            held: HashMap::new(),
            inserted: Vec::new(),
            versions: HashMap::new(),
            open: true,
        })
    }

    async fn insert_resource(&self, resource: NewResource) -> Result<Resource, StoreErr> {
        let model = Resource {
            id: MemoryInner::next_id(&self.inner.resource_seq),
            name: resource.name,
            capacity: resource.capacity,
            version: 0,
        };
        self.inner.tables()?.resources.insert(
            model.id,
            ResourceRow {
                model: model.clone(),
                lock: Arc::new(RowLock::new(())),
            },
        );
        Ok(model)
    }

    async fn find_resource(&self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        self.inner.observe_query();
        self.inner.resource(resource_id)
    }

    async fn find_resources(&self, resource_ids: &[i64]) -> Result<Vec<Resource>, StoreErr> {
        self.inner.observe_query();
        let wanted: BTreeSet<i64> = resource_ids.iter().copied().collect();
        let tables = self.inner.tables()?;
        Ok(wanted
            .iter()
            .filter_map(|id| tables.resources.get(id))
            .map(|row| row.model.clone())
            .collect())
    }

    async fn count_claims(&self, resource_id: i64) -> Result<u64, StoreErr> {
        self.inner.observe_query();
        self.inner.count_claims(|c| c.resource_id == resource_id)
    }

    async fn find_claims_by_resources(&self, resource_ids: &[i64]) -> Result<Vec<Claim>, StoreErr> {
        self.inner.observe_query();
        let wanted: BTreeSet<i64> = resource_ids.iter().copied().collect();
        Ok(self
            .inner
            .tables()?
            .claims
            .values()
            .filter(|c| wanted.contains(&c.resource_id))
            .cloned()
            .collect())
    }
}

impl MemoryTransaction {
    /// The resource as this transaction sees it: committed state plus own version bumps
    fn view_resource(&self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        let mut resource = self.inner.resource(resource_id)?;
        if let (Some(resource), Some(version)) = (resource.as_mut(), self.versions.get(&resource_id))
        {
            resource.version = *version;
        }
        Ok(resource)
    }

    fn staged_count<F>(&self, filter: F) -> u64
    where
        F: Fn(&Claim) -> bool,
    {
        self.inserted.iter().filter(|&c| filter(c)).count() as u64
    }

    /// Publish staged writes, then release row locks
    fn publish(&mut self) -> Result<(), StoreErr> {
        {
            let mut tables = self.inner.tables()?;
            for (resource_id, version) in self.versions.drain() {
                if let Some(row) = tables.resources.get_mut(&resource_id) {
                    row.model.version = version;
                }
            }
            for claim in self.inserted.drain(..) {
                tables.claims.insert(claim.id, claim);
            }
        }
        self.open = false;
        self.held.clear();
        Ok(())
    }

    fn discard(&mut self) {
        self.versions.clear();
        self.inserted.clear();
        self.open = false;
        self.held.clear();
    }
}

#[async_trait::async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_resource(
        &mut self,
        resource_id: i64,
        request: LockRequest,
    ) -> Result<LockOutcome, StoreErr> {
        if !self.held.contains_key(&resource_id) {
            let Some(lock) = self.inner.row_lock(resource_id)? else {
                return Ok(LockOutcome::NotFound);
            };
            let guard = match request.discipline {
                WaitDiscipline::Blocking => match request.timeout {
                    Some(budget) => match tokio::time::timeout(budget, lock.lock_owned()).await {
                        Ok(guard) => guard,
                        Err(_) => return Ok(LockOutcome::TimedOut),
                    },
                    None => lock.lock_owned().await,
                },
                WaitDiscipline::NoWait | WaitDiscipline::Skip => match lock.try_lock_owned() {
                    Ok(guard) => guard,
                    Err(_) => return Ok(LockOutcome::Busy),
                },
            };
            self.held.insert(resource_id, guard);
        }
        Ok(match self.view_resource(resource_id)? {
            Some(resource) => LockOutcome::Acquired(resource),
            None => LockOutcome::NotFound,
        })
    }

    async fn find_resource(&mut self, resource_id: i64) -> Result<Option<Resource>, StoreErr> {
        self.view_resource(resource_id)
    }

    async fn count_claims(&mut self, resource_id: i64) -> Result<u64, StoreErr> {
        let committed = self.inner.count_claims(|c| c.resource_id == resource_id)?;
        Ok(committed + self.staged_count(|c| c.resource_id == resource_id))
    }

    async fn count_claims_by_requester(
        &mut self,
        resource_id: i64,
        requester_id: &str,
    ) -> Result<u64, StoreErr> {
        let matches = |c: &Claim| c.resource_id == resource_id && c.requester_id == requester_id;
        let committed = self.inner.count_claims(matches)?;
        Ok(committed + self.staged_count(matches))
    }

    async fn insert_claim(&mut self, claim: NewClaim) -> Result<Claim, StoreErr> {
        if self.inner.resource(claim.resource_id)?.is_none() {
            return Err(StoreErr::Exec(format!(
                "claims.resource_id {} references no resource",
                claim.resource_id
            )));
        }
        let claim = claim.into_claim(MemoryInner::next_id(&self.inner.claim_seq));
        self.inserted.push(claim.clone());
        Ok(claim)
    }

    async fn bump_version(&mut self, resource_id: i64, expected: i64) -> Result<bool, StoreErr> {
        // an UPDATE takes the row lock implicitly
        match self
            .lock_resource(resource_id, LockRequest::blocking())
            .await?
        {
            LockOutcome::Acquired(resource) if resource.version == expected => {
                self.versions.insert(resource_id, expected + 1);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(mut self) -> Result<(), StoreErr> {
        self.publish()
    }

    async fn rollback(mut self) -> Result<(), StoreErr> {
        self.discard();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.open {
            trace!(
                staged = self.inserted.len(),
                locks = self.held.len(),
                "transaction dropped without commit, rolling back"
            );
            self.discard();
        }
    }
}
