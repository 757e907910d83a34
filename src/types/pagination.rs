//! Cursor and page types for keyset pagination.
//!
//! Collections are totally ordered by `(created_at DESC, id DESC)`; the
//! `created_at` timestamp is the primary ordering key and the record id
//! breaks ties. A [`PageCursor`] names a position in that order by value, so
//! page boundaries stay stable while writers insert or delete rows
//! concurrently — unlike offset-based pagination, which drifts.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RegistryError, SearchError, ValidationError};

/// Page size applied when the caller supplies no limit (or a non-positive one).
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound on the page size; larger requests are clamped, never rejected.
pub const MAX_LIMIT: i64 = 200;

/// Separates the timestamp from the id inside the decoded cursor. Neither an
/// RFC 3339 timestamp nor a canonical UUID can contain it.
const CURSOR_DELIMITER: char = '|';

/// Formats a timestamp the way the store persists it: RFC 3339 UTC with a
/// fixed microsecond width, so lexicographic comparison of the stored strings
/// equals chronological comparison.
pub(crate) fn storage_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// An opaque keyset-pagination cursor.
///
/// Logically the `(created_at, id)` pair of a boundary record. Cursors are
/// derived on every response and consumed on the next request; they are never
/// persisted and carry no expiry. A cursor remains usable after its boundary
/// record is deleted, because the page queries compare against the tuple
/// values relationally rather than looking the row up.
///
/// # Wire format
///
/// `base64url("<ISO-8601 created_at>|<canonical uuid>")`, unpadded. No other
/// format is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    created_at: DateTime<Utc>,
    id: Uuid,
}

impl PageCursor {
    /// Creates a cursor at the given boundary.
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// The boundary timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The boundary id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The boundary timestamp in the store's string form, for SQL binding.
    pub(crate) fn timestamp_str(&self) -> String {
        storage_timestamp(self.created_at)
    }

    /// Encodes the cursor to its opaque wire form.
    pub fn encode(&self) -> String {
        let raw = format!("{}{}{}", self.timestamp_str(), CURSOR_DELIMITER, self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decodes a cursor from its opaque wire form.
    ///
    /// Pure parsing; never touches the record store. Fails with
    /// [`SearchError::InvalidCursor`] on bad base64, a wrong part count, an
    /// unparseable timestamp, or a malformed id.
    pub fn decode(s: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidCursor {
            cursor: s.to_string(),
        };

        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;

        let parts: Vec<&str> = raw.split(CURSOR_DELIMITER).collect();
        let [timestamp, id] = parts.as_slice() else {
            return Err(invalid());
        };

        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(Self { created_at, id })
    }
}

/// A pagination request: a raw limit, at most one boundary cursor, and an
/// optional legacy numeric offset.
///
/// `skip` is only consulted when neither cursor is present; it is translated
/// into an `after` cursor by one bounded seek query (see the store's skip
/// translator) rather than threaded through the page queries as an offset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// Requested page size; clamped to `[1, MAX_LIMIT]` with `DEFAULT_LIMIT`
    /// applied when absent or non-positive.
    pub limit: Option<i64>,

    /// Cursor pointing at the last item of the previous page (fetch older).
    pub after: Option<String>,

    /// Cursor pointing at the first item of the next page (fetch newer).
    pub before: Option<String>,

    /// Legacy row offset, supported for callers that have not migrated to
    /// cursors.
    pub skip: Option<i64>,
}

/// Which side of a boundary cursor a page fetch explores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CursorMode {
    /// No cursor: the newest page.
    First,
    /// Strictly older than the boundary.
    After(PageCursor),
    /// Strictly newer than the boundary.
    Before(PageCursor),
}

impl PageRequest {
    /// Creates an empty request (first page, default limit).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the `after` cursor.
    pub fn with_after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Sets the `before` cursor.
    pub fn with_before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Sets the legacy offset.
    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// The effective page size after clamping. Clamping never errors.
    pub fn clamped_limit(&self) -> i64 {
        match self.limit {
            Some(n) if n > MAX_LIMIT => MAX_LIMIT,
            Some(n) if n > 0 => n,
            _ => DEFAULT_LIMIT,
        }
    }

    /// Resolves the cursor mode, decoding whichever cursor is present.
    ///
    /// Fails with a validation error when both cursors are supplied, or with
    /// an invalid-cursor error when one fails to decode. `skip` is not
    /// resolved here; it needs a store query.
    pub(crate) fn cursor_mode(&self) -> Result<CursorMode, RegistryError> {
        match (&self.after, &self.before) {
            (Some(_), Some(_)) => Err(ValidationError::ConflictingCursors.into()),
            (Some(after), None) => Ok(CursorMode::After(PageCursor::decode(after)?)),
            (None, Some(before)) => Ok(CursorMode::Before(PageCursor::decode(before)?)),
            (None, None) => Ok(CursorMode::First),
        }
    }
}

/// Direction of an existence probe relative to a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Strictly older than the boundary (later in DESC order).
    Older,
    /// Strictly newer than the boundary (earlier in DESC order).
    Newer,
}

/// One page of records, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items in this page, at most `limit` of them.
    pub items: Vec<T>,

    /// Cursor for the next (older) page. Present iff strictly-older records
    /// exist beyond the last item.
    pub next_cursor: Option<String>,

    /// Cursor for the previous (newer) page. Present iff strictly-newer
    /// records exist beyond the first item.
    pub prev_cursor: Option<String>,

    /// The effective limit the page was fetched with.
    pub limit: i64,
}

impl<T> Page<T> {
    /// An empty page with no cursors in either direction.
    pub fn empty(limit: i64) -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            prev_cursor: None,
            limit,
        }
    }

    /// Returns true if this page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}
