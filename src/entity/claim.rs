use super::ClaimDefaults;
use chrono::{DateTime, Utc};
use sea_query::Iden;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Table and column identifiers of the `claims` table
#[derive(Iden, Copy, Clone, Debug)]
pub enum Claims {
    Table,
    Id,
    ResourceId,
    RequesterId,
    Status,
    CreatedAt,
}

/// Where a claim is in its admission
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Drafted, admission check in progress. Never persisted.
    Pending,
    /// Admitted and durably recorded
    Confirmed,
    /// Refused by the admission check. Never persisted.
    Rejected,
}

/// One successful allocation against a [Resource](super::Resource)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub resource_id: i64,
    pub requester_id: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
}

/// A claim awaiting its admission decision
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimDraft {
    resource_id: i64,
    requester_id: String,
    created_at: DateTime<Utc>,
}

/// An admitted claim, ready to be inserted.
///
/// Only obtainable through [ClaimDraft::confirm], so the store never sees a
/// pending row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewClaim {
    pub(crate) resource_id: i64,
    pub(crate) requester_id: String,
    pub(crate) created_at: DateTime<Utc>,
}

impl ClaimDraft {
    pub fn new(resource_id: i64, requester_id: &str, defaults: &ClaimDefaults) -> Self {
        Self {
            resource_id,
            requester_id: requester_id.to_owned(),
            created_at: defaults.now(),
        }
    }

    pub fn status(&self) -> ClaimStatus {
        ClaimStatus::Pending
    }

    pub fn resource_id(&self) -> i64 {
        self.resource_id
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    /// The draft passed the admission check
    pub fn confirm(self) -> NewClaim {
        NewClaim {
            resource_id: self.resource_id,
            requester_id: self.requester_id,
            created_at: self.created_at,
        }
    }

    /// The draft failed the admission check and is discarded
    pub fn reject(self) -> ClaimStatus {
        ClaimStatus::Rejected
    }
}

impl NewClaim {
    pub fn resource_id(&self) -> i64 {
        self.resource_id
    }

    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The row as it reads back once the store has assigned `id`
    pub fn into_claim(self, id: i64) -> Claim {
        Claim {
            id,
            resource_id: self.resource_id,
            requester_id: self.requester_id,
            status: ClaimStatus::Confirmed,
            created_at: self.created_at,
        }
    }
}
