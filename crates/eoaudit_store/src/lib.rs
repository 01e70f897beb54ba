//! Object store listing for eoaudit.
//!
//! Only listing is needed: the audit never reads or writes object bodies.
//! Backends implement a single paged call, [`ObjectStore::list_page`], with
//! ListObjectsV2 semantics; the walking helpers in [`listing`] build on it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eoaudit_store::{list_common_prefixes, MemoryStore, RetryPolicy, RetryingStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = RetryingStore::new(MemoryStore::new("bucket"), RetryPolicy::default());
//! let platforms = list_common_prefixes(&store, "raw/", "/", &CancellationToken::new()).await?;
//! ```

mod error;
pub mod listing;
mod memory;
pub mod retry;
#[cfg(feature = "s3")]
mod s3;

pub use error::{Result, StoreError, Transient};
pub use listing::{list_common_prefixes, list_objects, ObjectPages};
pub use memory::MemoryStore;
pub use retry::{with_retry, RetryPolicy};
#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3Store};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One object returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Full object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Parameters of a single listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix are folded
    /// into common prefixes instead of being returned as objects.
    pub delimiter: Option<String>,
    /// Token from the previous page's `next_continuation`.
    pub continuation: Option<String>,
}

impl ListRequest {
    /// Delimited listing (virtual directories).
    pub fn delimited(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(delimiter.into()),
            continuation: None,
        }
    }

    /// Flat listing of every object under the prefix.
    pub fn flat(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            continuation: None,
        }
    }

    /// Same request, resumed at the given continuation token.
    pub fn resume(&self, continuation: String) -> Self {
        Self {
            continuation: Some(continuation),
            ..self.clone()
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Virtual directories, in listing order, each ending with the delimiter
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectEntry>,
    /// Present when more pages follow.
    pub next_continuation: Option<String>,
}

/// Paginated, hierarchical key listing.
///
/// Implementations retry nothing themselves; wrap them in
/// [`RetryingStore`] to apply a [`RetryPolicy`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this store lists.
    fn bucket(&self) -> &str;

    /// Fetch one page of results.
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<S> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        (**self).list_page(request).await
    }
}

/// Applies a [`RetryPolicy`] to every page request of the wrapped store.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        with_retry(&self.policy, "list_objects_v2", || self.inner.list_page(request)).await
    }
}
