// Continuation cursors learned for the current filter/sort configuration.
use std::collections::HashMap;
use watchtower_wire::{Cursor, QueryDescriptor};

/// Where a page fetch starts in the result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAnchor {
    Cursor(Cursor),
    Offset(u64),
}

impl PageAnchor {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            PageAnchor::Cursor(cursor) => cursor.params().to_vec(),
            PageAnchor::Offset(offset) => vec![("offset", offset.to_string())],
        }
    }
}

/// Page index -> continuation token. Page 0 is always the start of the
/// result set and never holds a token.
#[derive(Debug, Default)]
pub struct CursorTable {
    cursors: HashMap<usize, Cursor>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, page: usize) -> Option<&Cursor> {
        if page == 0 {
            return None;
        }
        self.cursors.get(&page)
    }

    /// Records the token for `page`, learned from the response of `page - 1`.
    pub fn record(&mut self, page: usize, cursor: Cursor) {
        if page == 0 {
            return;
        }
        self.cursors.insert(page, cursor);
    }

    /// Cursor when one is known, otherwise the raw offset.
    pub fn anchor(&self, descriptor: &QueryDescriptor) -> PageAnchor {
        match self.get(descriptor.page) {
            Some(cursor) => PageAnchor::Cursor(cursor.clone()),
            None => PageAnchor::Offset(descriptor.offset()),
        }
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
