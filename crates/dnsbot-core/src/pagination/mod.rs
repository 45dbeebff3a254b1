//! Record pagination
//!
//! Slices an ordered record snapshot into fixed-size pages and hands out
//! page-local selector keys for the records on the page being shown.
//!
//! ## Selector keys
//!
//! Each visible record gets a [`RecordKey`] made of the page number and its
//! slot on that page (`p1r3`). Rendering a page rebuilds the key → index map
//! from scratch, so a key taken from an earlier render of a different page no
//! longer resolves.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of records per page
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Number of pages needed for `len` records
pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Page-local selector for one rendered record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Page the key was rendered on
    pub page: usize,
    /// Position on that page
    pub slot: usize,
}

impl RecordKey {
    pub fn new(page: usize, slot: usize) -> Self {
        Self { page, slot }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}r{}", self.page, self.slot)
    }
}

impl FromStr for RecordKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::invalid_input(format!("Invalid record key: {}", s));

        let rest = s.strip_prefix('p').ok_or_else(invalid)?;
        let (page, slot) = rest.split_once('r').ok_or_else(invalid)?;

        Ok(Self {
            page: page.parse().map_err(|_| invalid())?,
            slot: slot.parse().map_err(|_| invalid())?,
        })
    }
}

/// Pagination cursor over a snapshot of known length
///
/// `current_page` always lies in `[0, total_pages)` unless the snapshot is
/// empty, in which case both are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub current_page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl PageCursor {
    /// Cursor on the first page of `record_count` records
    pub fn new(record_count: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            current_page: 0,
            page_size,
            total_pages: total_pages(record_count, page_size),
        }
    }

    /// Advance one page; out-of-range requests are absorbed
    ///
    /// # Returns
    ///
    /// `true` if the page changed
    pub fn next_page(&mut self) -> bool {
        if self.current_page + 1 < self.total_pages {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page; out-of-range requests are absorbed
    ///
    /// # Returns
    ///
    /// `true` if the page changed
    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    pub fn is_first(&self) -> bool {
        self.current_page == 0
    }

    pub fn is_last(&self) -> bool {
        self.current_page + 1 >= self.total_pages
    }

    /// Snapshot indices covered by the current page
    pub fn range(&self, record_count: usize) -> Range<usize> {
        let start = (self.current_page * self.page_size).min(record_count);
        let end = (start + self.page_size).min(record_count);
        start..end
    }

    /// Lay out the current page
    pub fn layout(&self, record_count: usize) -> PageLayout {
        let entries = self
            .range(record_count)
            .enumerate()
            .map(|(slot, index)| (RecordKey::new(self.current_page, slot), index))
            .collect();

        PageLayout {
            page: self.current_page,
            total_pages: self.total_pages,
            entries,
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}

/// The records shown on one page, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Zero-based page number
    pub page: usize,
    /// Total number of pages
    pub total_pages: usize,
    /// Selector key and snapshot index for each visible record
    pub entries: Vec<(RecordKey, usize)>,
}

impl PageLayout {
    /// Key → snapshot index map for exactly the records on this page
    pub fn selector_map(&self) -> HashMap<RecordKey, usize> {
        self.entries.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 5), 0);
        assert_eq!(total_pages(1, 5), 1);
        assert_eq!(total_pages(5, 5), 1);
        assert_eq!(total_pages(6, 5), 2);
        assert_eq!(total_pages(12, 5), 3);
        assert_eq!(total_pages(12, 0), 0);
    }

    #[test]
    fn next_page_clamps_at_last_page() {
        let mut cursor = PageCursor::new(12, 5);
        assert!(cursor.next_page());
        assert!(cursor.next_page());
        assert_eq!(cursor.current_page, 2);

        let before = cursor;
        assert!(!cursor.next_page());
        assert_eq!(cursor, before);
    }

    #[test]
    fn prev_page_clamps_at_first_page() {
        let mut cursor = PageCursor::new(12, 5);
        let before = cursor;
        assert!(!cursor.prev_page());
        assert_eq!(cursor, before);
    }

    #[test]
    fn last_page_is_partial() {
        let mut cursor = PageCursor::new(12, 5);
        cursor.next_page();
        cursor.next_page();
        assert_eq!(cursor.range(12), 10..12);
    }

    #[test]
    fn layout_positions_match_page_offset() {
        let mut cursor = PageCursor::new(12, 5);
        cursor.next_page();

        let layout = cursor.layout(12);
        for (key, index) in &layout.entries {
            assert_eq!(key.page, 1);
            assert_eq!(*index, key.page * 5 + key.slot);
        }
        assert_eq!(layout.entries.len(), 5);
    }

    #[test]
    fn layout_is_idempotent() {
        let cursor = PageCursor::new(7, 3);
        assert_eq!(cursor.layout(7), cursor.layout(7));
        assert_eq!(cursor.layout(7).selector_map(), cursor.layout(7).selector_map());
    }

    #[test]
    fn keys_from_other_pages_do_not_resolve() {
        let mut cursor = PageCursor::new(12, 5);
        let first = cursor.layout(12).selector_map();
        cursor.next_page();
        let second = cursor.layout(12).selector_map();

        let stale = RecordKey::new(0, 2);
        assert_eq!(first.get(&stale), Some(&2));
        assert_eq!(second.get(&stale), None);
    }

    #[test]
    fn record_key_text_form() {
        let key = RecordKey::new(1, 3);
        assert_eq!(key.to_string(), "p1r3");
        assert_eq!("p1r3".parse::<RecordKey>().unwrap(), key);
        assert!("r3".parse::<RecordKey>().is_err());
        assert!("p1rX".parse::<RecordKey>().is_err());
    }

    #[test]
    fn empty_snapshot_has_no_pages() {
        let cursor = PageCursor::new(0, 5);
        assert_eq!(cursor.total_pages, 0);
        assert!(cursor.layout(0).is_empty());
    }
}
