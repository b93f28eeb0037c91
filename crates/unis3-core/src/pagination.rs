//! Cursor-based pagination shared by every list operation.
//!
//! A list operation is described by a single-page fetch function taking the
//! current cursor. [`Paginator`] drives it until the server returns an empty
//! cursor. Three cursor shapes cover the S3 list family:
//!
//! | Cursor               | Used by                                  |
//! |----------------------|------------------------------------------|
//! | [`TokenCursor`]      | `ListBuckets`, `ListObjectsV2`           |
//! | [`DualCursor`]       | `ListObjectVersions`, `ListMultipartUploads` |
//! | [`PartNumberCursor`] | `ListParts`                              |

use std::fmt;

use unis3_model::{S3Error, S3Result};

/// A continuation position. The default value means "from the start".
pub trait Cursor: Clone + Default + PartialEq + fmt::Debug {
    /// Whether the cursor carries no position, i.e. the walk is finished
    /// (or has not started).
    fn is_empty(&self) -> bool;
}

/// A single opaque continuation token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TokenCursor {
    /// The token, if any.
    pub token: Option<String>,
}

impl TokenCursor {
    /// Cursor at `token`; an empty string is treated as no token.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

impl Cursor for TokenCursor {
    fn is_empty(&self) -> bool {
        self.token.is_none()
    }
}

/// A key marker plus a secondary marker (version id or upload id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DualCursor {
    /// The key marker.
    pub key: Option<String>,
    /// The version-id or upload-id marker.
    pub secondary: Option<String>,
}

impl DualCursor {
    /// Cursor at (`key`, `secondary`); empty strings count as absent.
    #[must_use]
    pub fn new(key: Option<String>, secondary: Option<String>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()),
            secondary: secondary.filter(|s| !s.is_empty()),
        }
    }
}

impl Cursor for DualCursor {
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.secondary.is_none()
    }
}

/// The last part number seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PartNumberCursor {
    /// The marker, if any. `0` is normalised to `None`.
    pub marker: Option<u32>,
}

impl PartNumberCursor {
    /// Cursor after part `marker`.
    #[must_use]
    pub fn new(marker: Option<u32>) -> Self {
        Self {
            marker: marker.filter(|m| *m > 0),
        }
    }
}

impl Cursor for PartNumberCursor {
    fn is_empty(&self) -> bool {
        self.marker.is_none()
    }
}

/// One page of a list operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    /// Items in server order.
    pub items: Vec<T>,
    /// Prefixes rolled up by a delimiter.
    pub common_prefixes: Vec<String>,
    /// Where the next page starts; empty on the last page.
    pub next: C,
}

impl<T, C: Cursor> Page<T, C> {
    /// A page with no common prefixes.
    #[must_use]
    pub fn new(items: Vec<T>, next: C) -> Self {
        Self {
            items,
            common_prefixes: Vec::new(),
            next,
        }
    }

    /// Whether this is the final page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next.is_empty()
    }
}

/// Iterator over the pages of a list operation.
///
/// Yields `Ok(page)` until a page with an empty cursor, or a single `Err`
/// after which it is exhausted. A paginator is a single sequential walk;
/// create a new one per walk.
pub struct Paginator<T, C, F> {
    fetch: F,
    cursor: C,
    done: bool,
    pages: usize,
    _items: std::marker::PhantomData<fn() -> T>,
}

impl<T, C, F> fmt::Debug for Paginator<T, C, F>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("cursor", &self.cursor)
            .field("done", &self.done)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl<T, C, F> Paginator<T, C, F>
where
    C: Cursor,
    F: FnMut(&C) -> S3Result<Page<T, C>>,
{
    /// Walk from the beginning.
    pub fn new(fetch: F) -> Self {
        Self::starting_at(C::default(), fetch)
    }

    /// Walk from `cursor`.
    pub fn starting_at(cursor: C, fetch: F) -> Self {
        Self {
            fetch,
            cursor,
            done: false,
            pages: 0,
            _items: std::marker::PhantomData,
        }
    }

    /// Flatten the pages into individual items.
    pub fn items(self) -> Items<T, C, F> {
        Items {
            pages: self,
            current: Vec::new().into_iter(),
        }
    }

    /// Collect every item, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error a page fetch produced.
    pub fn collect_all(self) -> S3Result<Vec<T>> {
        self.items().collect()
    }
}

impl<T, C, F> Iterator for Paginator<T, C, F>
where
    C: Cursor,
    F: FnMut(&C) -> S3Result<Page<T, C>>,
{
    type Item = S3Result<Page<T, C>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let page = match (self.fetch)(&self.cursor) {
            Ok(page) => page,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        self.pages += 1;

        if page.next.is_empty() {
            self.done = true;
        } else if page.next == self.cursor {
            self.done = true;
            tracing::debug!(cursor = ?page.next, pages = self.pages, "server repeated cursor");
            return Some(Err(S3Error::malformed_response(format!(
                "server returned the same continuation cursor twice: {:?}",
                page.next
            ))));
        } else {
            self.cursor = page.next.clone();
        }
        Some(Ok(page))
    }
}

/// Item-level view of a [`Paginator`].
pub struct Items<T, C, F> {
    pages: Paginator<T, C, F>,
    current: std::vec::IntoIter<T>,
}

impl<T, C, F> fmt::Debug for Items<T, C, F>
where
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Items")
            .field("pages", &self.pages)
            .field("buffered", &self.current.len())
            .finish()
    }
}

impl<T, C, F> Iterator for Items<T, C, F>
where
    C: Cursor,
    F: FnMut(&C) -> S3Result<Page<T, C>>,
{
    type Item = S3Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.current.next() {
                return Some(Ok(item));
            }
            match self.pages.next()? {
                Ok(page) => self.current = page.items.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Slice an already-sorted sequence into one page.
///
/// Items strictly after `after` (by `key_of`) are taken, up to `limit`.
/// The returned cursor is the key of the last taken item when more remain.
/// Used by servers that paginate by a sortable key.
pub fn take_page<'a, T, K>(
    sorted: impl IntoIterator<Item = &'a T>,
    after: Option<&K>,
    limit: usize,
    key_of: impl Fn(&T) -> K,
) -> (Vec<&'a T>, Option<K>)
where
    T: 'a,
    K: Ord,
{
    let mut items = Vec::new();
    let mut truncated = false;
    for item in sorted {
        if after.is_some_and(|a| key_of(item) <= *a) {
            continue;
        }
        if items.len() == limit {
            truncated = true;
            break;
        }
        items.push(item);
    }
    let next = if truncated {
        items.last().map(|item| key_of(item))
    } else {
        None
    };
    (items, next)
}
