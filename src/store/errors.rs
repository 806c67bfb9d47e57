use crate::{cache::CacheError, codec::FormatError, eid::Eid, remote::RemoteError};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("identity could not be verified")]
    IdentityUnverified,

    /// The record changed under us; the write was rejected and is not
    /// retried.
    #[error("record changed concurrently, write rejected")]
    Conflict,

    #[error("folder parent chain revisits {0}")]
    CycleDetected(Eid),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("payload format error: {0}")]
    Format(#[from] FormatError),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}
