use rtpc_types::{ParamId, SubscriberId};
use thiserror::Error;

use crate::targets::TargetHandle;

/// Result type for engine operations.
pub type RtpcResult<T = ()> = Result<T, RtpcError>;

/// Errors surfaced by the engine. A failed operation is never partially applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtpcError {
    #[error("allocation failed, change not applied")]
    Allocation,
    #[error("parameter {0} does not fit the target parameter bitset")]
    ParamOutOfRange(ParamId),
    #[error("unknown subscriber {0}")]
    UnknownSubscriber(SubscriberId),
    #[error("subscriber {parent} cannot parent {child}: it is a descendant")]
    HierarchyCycle {
        child: SubscriberId,
        parent: SubscriberId,
    },
    #[error("stale or unknown target handle {0:?}")]
    StaleTarget(TargetHandle),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<std::collections::TryReserveError> for RtpcError {
    fn from(_: std::collections::TryReserveError) -> Self {
        RtpcError::Allocation
    }
}
