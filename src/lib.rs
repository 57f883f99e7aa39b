#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(
    missing_debug_implementations,
    clippy::print_stderr,
    clippy::print_stdout
)]

//! # SeaQuota
//!
//! Capacity gated allocation over a transactional record store.
//!
//! A [Resource] declares how many [Claim]s it may hold. An [Allocator]
//! admits a claim only if the resource still has room, and guarantees that
//! no schedule of concurrent callers, in one process or many, ever pushes a
//! resource past its capacity.
//!
//! ## Allocating
//!
//! ```
//! # use sea_quota::*;
//! # async fn function() -> Result<(), AllocationError> {
//! let store = MemoryStore::new();
//! let campaign = store
//!     .insert_resource(NewResource::bounded("Limited Campaign", 10))
//!     .await?;
//!
//! let mut config = AllocatorConfig::new();
//! config.wait_discipline(WaitDiscipline::NoWait);
//! let allocator = PessimisticAllocator::new(store, config);
//!
//! match allocator.try_allocate(campaign.id, "user1").await {
//!     Ok(claim) => assert_eq!(claim.status, ClaimStatus::Confirmed),
//!     Err(err) if err.is_transient() => { /* busy, try again later */ }
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Wait disciplines
//!
//! The pessimistic allocator locks the resource row before counting:
//!
//! + [WaitDiscipline::Blocking] queues behind the current holder, bounded by
//!   [AllocatorConfig::lock_timeout] if set
//! + [WaitDiscipline::NoWait] fails with [AllocationError::ResourceBusy] at once
//! + [WaitDiscipline::Skip] passes over held rows, see
//!   [PessimisticAllocator::allocate_any]
//!
//! [OptimisticAllocator] is the lock-light alternative; it validates the
//! resource `version` before committing and reports a lost race as
//! [AllocationError::StaleVersion].
//!
//! ## Stores
//!
//! [MemoryStore] keeps everything in process memory with real row locks.
//! With the `sqlx-postgres` feature, `SqlxPostgresStore` runs the same
//! statements against PostgreSQL.

mod allocator;
mod config;
mod database;
mod driver;
pub mod entity;
pub mod error;
mod lock;
pub mod query;

pub use allocator::*;
pub use config::*;
pub use database::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use lock::*;
pub use query::*;

pub use sea_query;
