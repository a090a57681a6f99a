//! Remote Diigo library access.
//!
//! Two transports enumerate a library:
//! - `ApiTransport`: the versioned API, offset/count pagination, an empty
//!   page marks the end.
//! - `FeedTransport`: the outliner feed, page-number pagination behind a
//!   session cookie, no reliable end marker.

pub mod client;
pub mod records;
pub mod url;

use crate::error::SyncResult;
use records::Bookmark;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use client::{ApiTransport, FeedTransport, build_http_client};

/// Which remote interface a run enumerates the library through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Versioned bookmarks API (basic auth + API key)
    #[default]
    Api,
    /// Outliner feed (session cookie)
    Feed,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Api => "api",
            TransportMode::Feed => "feed",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Paged { start: u64, count: u64 },
    Feed { page_num: u64 },
}

impl Cursor {
    /// First cursor of a run resuming at `offset` (record offset for the
    /// API, page number for the feed).
    pub fn initial(mode: TransportMode, offset: u64, page_size: u64) -> Self {
        match mode {
            TransportMode::Api => Cursor::Paged {
                start: offset,
                count: page_size.max(1),
            },
            TransportMode::Feed => Cursor::Feed { page_num: offset },
        }
    }

    pub fn advance(&mut self) {
        match self {
            Cursor::Paged { start, count } => *start += *count,
            Cursor::Feed { page_num } => *page_num += 1,
        }
    }
}

/// A source of bookmark pages.
pub trait Transport {
    fn mode(&self) -> TransportMode;

    /// Fetch one page. A non-success response is a fatal transport failure.
    fn fetch_page(&self, cursor: &Cursor) -> SyncResult<Vec<Bookmark>>;
}
