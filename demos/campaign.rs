//! Twenty users apply to a campaign with ten seats.
//!
//! ```sh
//! RUST_LOG=sea_quota=debug cargo run --example campaign
//! ```

use futures_util::future::join_all;
use sea_quota::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AllocationError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = MemoryStore::new();
    let campaign = store
        .insert_resource(NewResource::bounded("Limited Campaign", 10))
        .await?;
    let config = AllocatorConfig::new();
    let allocator = Arc::new(PessimisticAllocator::new(store.clone(), config.clone()));

    let applications = (1..=20).map(|n| {
        let allocator = Arc::clone(&allocator);
        tokio::spawn(async move {
            let requester = format!("user{n}");
            let outcome = allocator.try_allocate(campaign.id, &requester).await;
            (requester, outcome)
        })
    });

    for joined in join_all(applications).await {
        let (requester, outcome) = joined.map_err(|e| StoreErr::Exec(e.to_string()))?;
        match outcome {
            Ok(claim) => println!("{requester}: seat confirmed (claim #{})", claim.id),
            Err(AllocationError::CapacityExceeded { .. }) => println!("{requester}: campaign full"),
            Err(err) => return Err(err),
        }
    }

    let report = vec![campaign].occupancy(&store, &config).await?;
    for occupancy in report {
        println!(
            "{}: {} claims, {:?}",
            occupancy.resource.name,
            occupancy.claims.len(),
            occupancy.state
        );
    }
    Ok(())
}
