use sea_query::Iden;
use serde::{Deserialize, Serialize};

/// Table and column identifiers of the `resources` table
#[derive(Iden, Copy, Clone, Debug)]
pub enum Resources {
    /// The table itself
    Table,
    /// Primary key
    Id,
    /// Display label
    Name,
    /// Maximum number of claims, `NULL` for unbounded
    Capacity,
    /// Row version, bumped by every committed admission
    Version,
}

/// A resource whose capacity is protected from overshoot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    /// `None` means unbounded
    pub capacity: Option<u32>,
    pub version: i64,
}

/// The attributes needed to create a [Resource]; the store assigns the rest
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    pub name: String,
    pub capacity: Option<u32>,
}

/// Whether a resource can still admit claims.
///
/// Always derived from a fresh count and never stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Fewer claims than capacity, or no capacity at all
    Open,
    /// Claims have reached capacity
    Full,
}

impl ResourceState {
    /// Classify `held` claims against a capacity, `None` meaning unbounded
    pub fn classify(capacity: Option<u32>, held: u64) -> Self {
        match capacity {
            Some(capacity) if held >= u64::from(capacity) => Self::Full,
            _ => Self::Open,
        }
    }
}

impl Resource {
    /// Classify the resource by its declared capacity given the number of
    /// claims currently held against it
    pub fn state(&self, held: u64) -> ResourceState {
        ResourceState::classify(self.capacity, held)
    }

    /// Seats left, or `None` when unbounded
    pub fn remaining(&self, held: u64) -> Option<u64> {
        self.capacity
            .map(|capacity| u64::from(capacity).saturating_sub(held))
    }
}

impl NewResource {
    pub fn new<N: Into<String>>(name: N, capacity: Option<u32>) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }

    /// A resource that admits at most `capacity` claims
    pub fn bounded<N: Into<String>>(name: N, capacity: u32) -> Self {
        Self::new(name, Some(capacity))
    }

    /// A resource without an upper bound
    pub fn unbounded<N: Into<String>>(name: N) -> Self {
        Self::new(name, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(capacity: Option<u32>) -> Resource {
        Resource {
            id: 1,
            name: "Limited Campaign".to_owned(),
            capacity,
            version: 0,
        }
    }

    #[test]
    fn state_is_derived_from_count() {
        let bounded = campaign(Some(10));
        assert_eq!(bounded.state(0), ResourceState::Open);
        assert_eq!(bounded.state(9), ResourceState::Open);
        assert_eq!(bounded.state(10), ResourceState::Full);
        assert_eq!(bounded.state(11), ResourceState::Full);
        assert_eq!(bounded.remaining(7), Some(3));
        assert_eq!(bounded.remaining(12), Some(0));

        let unbounded = campaign(None);
        assert_eq!(unbounded.state(u64::MAX), ResourceState::Open);
        assert_eq!(unbounded.remaining(1_000), None);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        assert_eq!(campaign(Some(0)).state(0), ResourceState::Full);
    }
}
