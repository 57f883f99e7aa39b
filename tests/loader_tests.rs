pub mod common;

use common::TestContext;
use maplit::hashmap;
use pretty_assertions::assert_eq;
use sea_quota::*;
use std::collections::HashMap;

#[tokio::test]
async fn claims_load_in_one_query() -> Result<(), AllocationError> {
    let ctx = TestContext::new();
    let morning = ctx.resource(Some(2)).await?;
    let evening = ctx.resource(Some(3)).await?;
    let empty = ctx.resource(None).await?;

    let allocator = ctx.pessimistic(AllocatorConfig::new());
    allocator.try_allocate(morning.id, "ann").await?;
    allocator.try_allocate(evening.id, "ben").await?;
    allocator.try_allocate(morning.id, "cat").await?;

    let resources = ctx
        .store
        .find_resources(&[morning.id, evening.id, empty.id])
        .await?;
    let before = ctx.store.query_count();
    let claims = resources.load_claims(&ctx.store).await?;
    assert_eq!(ctx.store.query_count() - before, 1);

    let requesters: HashMap<i64, Vec<&str>> = resources
        .iter()
        .zip(&claims)
        .map(|(resource, claims)| {
            (
                resource.id,
                claims.iter().map(|c| c.requester_id.as_str()).collect(),
            )
        })
        .collect();
    assert_eq!(
        requesters,
        hashmap! {
            morning.id => vec!["ann", "cat"],
            evening.id => vec!["ben"],
            empty.id => vec![],
        }
    );
    Ok(())
}

#[tokio::test]
async fn occupancy_report() -> Result<(), AllocationError> {
    let ctx = TestContext::new();
    let small = ctx.resource(Some(1)).await?;
    let large = ctx.resource(Some(5)).await?;
    let allocator = ctx.pessimistic(AllocatorConfig::new());
    allocator.try_allocate(small.id, "ann").await?;
    allocator.try_allocate(large.id, "ben").await?;

    let report = vec![large.clone(), small.clone()]
        .occupancy(&ctx.store, &AllocatorConfig::new())
        .await?;

    let states: Vec<(i64, usize, ResourceState)> = report
        .iter()
        .map(|o| (o.resource.id, o.claims.len(), o.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (large.id, 1, ResourceState::Open),
            (small.id, 1, ResourceState::Full),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn occupancy_follows_fallback_capacity() -> Result<(), AllocationError> {
    let ctx = TestContext::new();
    let undeclared = ctx.resource(None).await?;

    let mut config = AllocatorConfig::new();
    config.fallback_capacity(1);
    let allocator = ctx.pessimistic(config.clone());
    allocator.try_allocate(undeclared.id, "ann").await?;
    assert!(matches!(
        allocator.try_allocate(undeclared.id, "ben").await,
        Err(AllocationError::CapacityExceeded { capacity: 1, .. })
    ));

    let report = vec![undeclared.clone()]
        .occupancy(&ctx.store, &config)
        .await?;
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].claims.len(), 1);
    assert_eq!(report[0].state, ResourceState::Full);

    let declared_only = vec![undeclared]
        .occupancy(&ctx.store, &AllocatorConfig::new())
        .await?;
    assert_eq!(declared_only[0].state, ResourceState::Open);
    Ok(())
}

#[tokio::test]
async fn nothing_to_load() -> Result<(), AllocationError> {
    let ctx = TestContext::new();
    let resources: Vec<Resource> = Vec::new();

    assert_eq!(resources.load_claims(&ctx.store).await?, Vec::<Vec<Claim>>::new());
    assert_eq!(ctx.store.query_count(), 0);
    Ok(())
}
