//! Offset pagination over immutable cached lists.
//!
//! Cursors are base64 text of a decimal offset. They only mean something to
//! the process that issued them; the lists they index never change while it
//! runs.

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Opaque position in a cached list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn encode(offset: usize) -> Self {
        Self(general_purpose::STANDARD.encode(offset.to_string()))
    }

    /// `None` when the text is not a cursor this process could have issued.
    pub fn decode(text: &str) -> Option<usize> {
        let bytes = general_purpose::STANDARD.decode(text.trim()).ok()?;
        let digits = std::str::from_utf8(&bytes).ok()?;
        digits.parse::<usize>().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    pub cursor: Cursor,
    pub node: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

/// Window `items` to `[start, start + first)` where `start` is one past the
/// `after` cursor, or 0 when there is no usable cursor.
pub fn paginate<T: Clone>(items: &[T], first: usize, after: Option<&str>) -> Connection<T> {
    let start = after
        .filter(|text| !text.is_empty())
        .and_then(Cursor::decode)
        .map(|offset| offset.saturating_add(1))
        .unwrap_or(0);
    let end = start.saturating_add(first);

    let lower = start.min(items.len());
    let upper = end.min(items.len());
    let edges = items[lower..upper]
        .iter()
        .enumerate()
        .map(|(i, item)| Edge {
            cursor: Cursor::encode(lower + i),
            node: item.clone(),
        })
        .collect::<Vec<_>>();

    let page_info = PageInfo {
        has_next_page: end < items.len(),
        has_previous_page: start > 0,
        start_cursor: (!edges.is_empty()).then(|| Cursor::encode(start)),
        end_cursor: (!edges.is_empty()).then(|| Cursor::encode(end - 1)),
    };

    Connection {
        edges,
        page_info,
        total_count: items.len(),
    }
}
