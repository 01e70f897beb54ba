//! Walking helpers over [`ObjectStore::list_page`].

use crate::{ListRequest, ObjectEntry, ObjectStore, Result, StoreError};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// List every common prefix directly under `prefix`, across all pages.
///
/// Order follows the store's listing order; a prefix reported on more than
/// one page is kept once.
pub async fn list_common_prefixes<S: ObjectStore + ?Sized>(
    store: &S,
    prefix: &str,
    delimiter: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let mut request = ListRequest::delimited(prefix, delimiter);
    let mut seen = HashSet::new();
    let mut prefixes = Vec::new();
    let mut pages = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let page = store.list_page(&request).await?;
        pages += 1;
        for common in page.common_prefixes {
            if seen.insert(common.clone()) {
                prefixes.push(common);
            }
        }
        match page.next_continuation {
            Some(token) => request = request.resume(token),
            None => break,
        }
    }

    debug!(prefix, pages, found = prefixes.len(), "Listed common prefixes");
    Ok(prefixes)
}

/// Start a lazy listing of every object under `prefix`.
pub fn list_objects<'a, S: ObjectStore + ?Sized>(
    store: &'a S,
    prefix: &str,
    cancel: &'a CancellationToken,
) -> ObjectPages<'a, S> {
    ObjectPages::new(store, prefix, cancel)
}

/// Lazy cursor over a flat listing.
///
/// Pages are fetched one at a time, so a caller that does not need the whole
/// prefix in memory never holds more than one page.
pub struct ObjectPages<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    request: ListRequest,
    cancel: &'a CancellationToken,
    done: bool,
    pages_read: usize,
}

impl<'a, S: ObjectStore + ?Sized> ObjectPages<'a, S> {
    pub fn new(store: &'a S, prefix: &str, cancel: &'a CancellationToken) -> Self {
        Self {
            store,
            request: ListRequest::flat(prefix),
            cancel,
            done: false,
            pages_read: 0,
        }
    }

    /// Next page of objects, or `None` once the listing is exhausted.
    ///
    /// A listing with no results yields a single empty page at most; callers
    /// must not assume any page exists.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ObjectEntry>>> {
        if self.done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            self.done = true;
            return Err(StoreError::Cancelled);
        }

        let page = self.store.list_page(&self.request).await?;
        self.pages_read += 1;
        match page.next_continuation {
            Some(token) => self.request = self.request.resume(token),
            None => self.done = true,
        }
        Ok(Some(page.objects))
    }

    /// Pages fetched so far.
    pub fn pages_read(&self) -> usize {
        self.pages_read
    }

    /// Drain the cursor into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<ObjectEntry>> {
        let mut objects = Vec::new();
        while let Some(page) = self.next_page().await? {
            objects.extend(page);
        }
        Ok(objects)
    }
}
