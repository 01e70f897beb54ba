//! In-memory object store for testing and offline dry runs.
//!
//! Emulates ListObjectsV2: lexicographic key order, delimiter folding into
//! common prefixes, a page size limit and opaque continuation tokens.

use crate::{ListPage, ListRequest, ObjectEntry, ObjectStore, Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    size: u64,
    last_modified: DateTime<Utc>,
}

/// In-memory backend. Not suitable for production.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    objects: BTreeMap<String, StoredObject>,
    page_size: usize,
    transient_failures: AtomicUsize,
    broken_prefixes: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            transient_failures: AtomicUsize::new(0),
            broken_prefixes: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Limit the number of entries (objects plus common prefixes) per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add or replace an object.
    pub fn insert(&mut self, key: impl Into<String>, size: u64, last_modified: DateTime<Utc>) {
        self.objects.insert(
            key.into(),
            StoredObject {
                size,
                last_modified,
            },
        );
    }

    /// Builder form of [`MemoryStore::insert`].
    pub fn with_object(mut self, key: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        self.insert(key, size, last_modified);
        self
    }

    /// Fail the next `count` page requests with a transient error.
    pub fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every request under `prefix` with a permanent error.
    pub fn break_prefix(&self, prefix: impl Into<String>) {
        if let Ok(mut broken) = self.broken_prefixes.lock() {
            broken.push(prefix.into());
        }
    }

    /// Number of page requests served (including failed ones).
    pub fn list_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_transient_failure(&self) -> bool {
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn is_broken(&self, prefix: &str) -> bool {
        self.broken_prefixes
            .lock()
            .map(|broken| broken.iter().any(|b| prefix.starts_with(b.as_str())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(&self, request: &ListRequest) -> Result<ListPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.take_transient_failure() {
            return Err(StoreError::transient(&request.prefix, "SlowDown: injected failure"));
        }
        if self.is_broken(&request.prefix) {
            return Err(StoreError::listing(&request.prefix, "AccessDenied: injected failure"));
        }

        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let start = match &request.continuation {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut page = ListPage::default();
        let mut emitted = 0usize;
        let mut last_token: Option<String> = None;

        for (key, object) in self.objects.range::<String, _>((start, Bound::Unbounded)) {
            if !key.starts_with(&request.prefix) {
                if key.as_str() > request.prefix.as_str() {
                    break;
                }
                continue;
            }

            let folded = delimiter.and_then(|d| {
                let rest = &key[request.prefix.len()..];
                rest.find(d)
                    .map(|idx| format!("{}{}", request.prefix, &rest[..idx + d.len()]))
            });

            // Everything under a common prefix already handed out is skipped,
            // including on a resumed page.
            if let (Some(common), Some(token)) = (&folded, &last_token) {
                if common == token {
                    continue;
                }
            }
            if let (Some(common), Some(token)) = (&folded, &request.continuation) {
                if common == token {
                    continue;
                }
            }

            if emitted == self.page_size {
                page.next_continuation = last_token;
                return Ok(page);
            }

            match folded {
                Some(common) => {
                    last_token = Some(common.clone());
                    page.common_prefixes.push(common);
                }
                None => {
                    last_token = Some(key.clone());
                    page.objects.push(ObjectEntry {
                        key: key.clone(),
                        size: object.size,
                        last_modified: object.last_modified,
                    });
                }
            }
            emitted += 1;
        }

        Ok(page)
    }
}
