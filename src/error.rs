use std::time::Duration;
use thiserror::Error;

/// An error from an unsuccessful record store operation
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum StoreErr {
    /// There was a problem with the database connection
    #[error("Connection Error: {0}")]
    Conn(String),
    /// An operation did not execute successfully
    #[error("Execution Error: {0}")]
    Exec(String),
    /// An error occurred while performing a query
    #[error("Query Error: {0}")]
    Query(String),
    /// Error occurred while parsing a column value as target type
    #[error("Type Error: {0}")]
    Type(String),
    /// A unique constraint rejected the write
    #[error("Unique Constraint Violated: {0}")]
    UniqueViolation(String),
    /// The in-process store's bookkeeping lock was poisoned by a panicking holder
    #[error("Mutex poisoned")]
    MutexPoisonError,
}

/// The outcome of a rejected allocation attempt
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum AllocationError {
    /// No resource with this identifier exists
    #[error("Resource {resource_id} not found")]
    ResourceNotFound {
        /// The requested resource
        resource_id: i64,
    },
    /// Every seat of the resource is already claimed
    #[error("Resource {resource_id} has no capacity remaining ({capacity} claimed)")]
    CapacityExceeded {
        /// The requested resource
        resource_id: i64,
        /// The effective capacity at the time of the check
        capacity: u32,
    },
    /// Another in-flight allocation holds the resource and the caller refused to wait
    #[error("Resource {resource_id} is busy, try again")]
    ResourceBusy {
        /// The requested resource
        resource_id: i64,
    },
    /// The exclusive hold could not be acquired within the wait budget
    #[error("Timed out after {waited:?} waiting for resource {resource_id}")]
    AllocationTimeout {
        /// The requested resource
        resource_id: i64,
        /// The configured wait budget
        waited: Duration,
    },
    /// The requester already holds a claim on this resource
    #[error("Requester '{requester_id}' already holds a claim on resource {resource_id}")]
    DuplicateClaim {
        /// The requested resource
        resource_id: i64,
        /// The requester holding the existing claim
        requester_id: String,
    },
    /// The resource changed between the optimistic read and the write
    #[error("Resource {resource_id} was modified concurrently")]
    StaleVersion {
        /// The requested resource
        resource_id: i64,
    },
    /// `allocate_any` was handed an empty candidate list
    #[error("No candidate resources given")]
    NoCandidates,
    /// The record store failed
    #[error(transparent)]
    Store(#[from] StoreErr),
}

impl AllocationError {
    /// Whether the same request may succeed if retried later.
    ///
    /// Contention outcomes are transient. Missing resources, exhausted
    /// capacity and duplicate claims are not, and neither are store failures
    /// which the caller has to inspect.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResourceBusy { .. } | Self::AllocationTimeout { .. } | Self::StaleVersion { .. }
        )
    }

    /// The resource this error refers to, if any
    pub fn resource_id(&self) -> Option<i64> {
        match self {
            Self::ResourceNotFound { resource_id }
            | Self::CapacityExceeded { resource_id, .. }
            | Self::ResourceBusy { resource_id }
            | Self::AllocationTimeout { resource_id, .. }
            | Self::DuplicateClaim { resource_id, .. }
            | Self::StaleVersion { resource_id } => Some(*resource_id),
            Self::NoCandidates | Self::Store(_) => None,
        }
    }
}

pub(crate) fn type_err<T: ToString>(s: T) -> StoreErr {
    StoreErr::Type(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn transient_classification() {
        assert!(AllocationError::ResourceBusy { resource_id: 1 }.is_transient());
        assert!(
            AllocationError::AllocationTimeout {
                resource_id: 1,
                waited: Duration::from_millis(5),
            }
            .is_transient()
        );
        assert!(AllocationError::StaleVersion { resource_id: 1 }.is_transient());

        assert!(
            !AllocationError::CapacityExceeded {
                resource_id: 1,
                capacity: 3,
            }
            .is_transient()
        );
        assert!(!AllocationError::ResourceNotFound { resource_id: 1 }.is_transient());
        assert!(!AllocationError::Store(StoreErr::Conn("refused".into())).is_transient());
    }

    #[test]
    fn display() {
        assert_eq!(
            AllocationError::CapacityExceeded {
                resource_id: 4,
                capacity: 10,
            }
            .to_string(),
            "Resource 4 has no capacity remaining (10 claimed)"
        );
        assert_eq!(
            AllocationError::from(StoreErr::Query("syntax".into())).to_string(),
            "Query Error: syntax"
        );
        assert_eq!(AllocationError::NoCandidates.resource_id(), None);
        assert_eq!(
            AllocationError::DuplicateClaim {
                resource_id: 2,
                requester_id: "alice".into(),
            }
            .resource_id(),
            Some(2)
        );
    }
}
