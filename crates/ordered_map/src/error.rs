use std::collections::TryReserveError;

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to allocate a tree node: {0}")]
    Alloc(#[from] TryReserveError),
    #[error("node arena is full ({0} slots)")]
    CapacityExceeded(usize),
}
