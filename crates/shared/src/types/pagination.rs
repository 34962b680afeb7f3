//! Cursor pagination types for list queries.
//!
//! Pages are keyed on `(date, id)` in descending order. The next page is
//! everything strictly below the cursor tuple, so inserts and deletes
//! between calls never shift rows across page boundaries.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Upper bound for a requested page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A malformed cursor token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    /// Token is not valid base64url.
    #[error("cursor is not valid base64url")]
    Encoding,
    /// Token decoded but its contents are not `timestamp|uuid`.
    #[error("cursor payload is malformed: {0}")]
    Payload(String),
}

/// Position of the last row on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cursor {
    /// Sort date of the row.
    pub date: DateTime<Utc>,
    /// Row id, tiebreaker within the same date.
    pub id: Uuid,
}

impl Cursor {
    /// Creates a cursor for the given sort key.
    #[must_use]
    pub const fn new(date: DateTime<Utc>, id: Uuid) -> Self {
        Self { date, id }
    }

    /// Encodes the cursor as an opaque token.
    #[must_use]
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.date.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.id
        );
        base64_url::encode(&raw)
    }

    /// Decodes a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = base64_url::decode(token.trim()).map_err(|_| CursorError::Encoding)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError::Encoding)?;
        let (date, id) = raw
            .split_once('|')
            .ok_or_else(|| CursorError::Payload("missing separator".to_string()))?;

        let date = DateTime::parse_from_rfc3339(date)
            .map_err(|e| CursorError::Payload(e.to_string()))?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).map_err(|e| CursorError::Payload(e.to_string()))?;

        Ok(Self { date, id })
    }
}

/// Request parameters for a cursor-paginated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    /// Rows strictly below this key are returned; `None` starts from the top.
    pub cursor: Option<Cursor>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            cursor: None,
        }
    }
}

impl PageRequest {
    /// Creates a request, clamping `limit` to `[1, MAX_PAGE_SIZE]`.
    #[must_use]
    pub fn new(limit: Option<u32>, cursor: Option<Cursor>) -> Self {
        Self {
            limit: limit.map_or(DEFAULT_PAGE_SIZE, |l| l.clamp(1, MAX_PAGE_SIZE)),
            cursor,
        }
    }

    /// Effective page size.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to fetch: one extra to detect a following page.
    #[must_use]
    pub fn fetch_limit(&self) -> u64 {
        u64::from(self.limit) + 1
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in descending key order.
    pub items: Vec<T>,
    /// Opaque token for the following page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Builds a page from rows fetched with [`PageRequest::fetch_limit`].
    ///
    /// When the extra row is present it is dropped and the cursor points at
    /// the last row actually returned.
    #[must_use]
    pub fn from_overfetch(mut rows: Vec<T>, request: &PageRequest, key: impl Fn(&T) -> Cursor) -> Self {
        let limit = request.limit() as usize;
        if rows.len() <= limit {
            return Self {
                items: rows,
                next_cursor: None,
            };
        }

        rows.truncate(limit);
        let next_cursor = rows.last().map(|row| key(row).encode());
        Self {
            items: rows,
            next_cursor,
        }
    }
}
