//! Page-number pagination for the storefront JSON endpoints.
//!
//! The endpoints accept `?page=N&limit=L` and return an empty array once the
//! listing is exhausted. There is no cursor and no total count, so the only
//! signals are the batch itself and its size:
//!
//! - an empty batch is the end of the listing;
//! - a batch shorter than the requested `limit` is the last page;
//! - a full batch means another page may follow.
//!
//! A listing whose size is an exact multiple of the limit therefore costs one
//! extra request, which returns the empty terminator.

/// One fetched page of entries plus the "more pages" signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Returns `true` when a page of `batch_len` raw entries fetched with
/// `page_size` as its limit may be followed by another page.
///
/// `batch_len` is the upstream count before any entries were dropped during
/// parsing, so a skipped entry never ends pagination early.
#[must_use]
pub fn has_more(batch_len: usize, page_size: u32) -> bool {
    batch_len > 0 && batch_len >= page_size as usize
}
