//! The fetch-and-merge cycle.
//!
//! The crate never opens a network connection. Callers hand in a fetch
//! capability — any `FnOnce() -> anyhow::Result<Vec<u8>>` — and the held
//! [`Feed`] value; persistence of that value between cycles is likewise the
//! caller's job. [`Feed::update_with`] refuses to do useful work before the
//! feed's refresh instant and reports that as [`UpdateError::NotReady`],
//! which means "try again later", not "the fetch failed".

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::Feed;
use crate::parse::{parse, ParseError};
use crate::store::IdentityStore;

/// Errors from the fetch-and-merge entry points.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Called before the feed's refresh instant; the held feed is untouched.
    #[error("refresh not due until {refresh}")]
    NotReady { refresh: DateTime<Utc> },

    /// The caller-supplied fetch capability failed.
    #[error("fetch failed: {0}")]
    Fetch(anyhow::Error),

    /// The fetched document failed to decode.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Fetches and decodes a feed for the first time.
///
/// `url` labels where the document came from; it is stored on the feed
/// unless the document itself already names its fetch URL (JSON Feed's
/// `feed_url`).
pub fn fetch_with<F>(url: &str, store: &IdentityStore, fetch: F) -> Result<Feed, UpdateError>
where
    F: FnOnce() -> anyhow::Result<Vec<u8>>,
{
    let data = fetch().map_err(UpdateError::Fetch)?;
    let mut feed = parse(&data, store)?;
    if feed.update_url.is_empty() {
        feed.update_url = url.to_string();
    }
    Ok(feed)
}

impl Feed {
    /// Whether the refresh instant has elapsed.
    pub fn refresh_due(&self) -> bool {
        Utc::now() >= self.refresh
    }

    /// Re-fetches the feed and merges the result into `self`.
    ///
    /// Returns the number of newly appended items. Fails with
    /// [`UpdateError::NotReady`] before the refresh instant, leaving the
    /// feed untouched.
    pub fn update_with<F>(&mut self, store: &IdentityStore, fetch: F) -> Result<usize, UpdateError>
    where
        F: FnOnce() -> anyhow::Result<Vec<u8>>,
    {
        if !self.refresh_due() {
            return Err(UpdateError::NotReady {
                refresh: self.refresh,
            });
        }
        let data = fetch().map_err(UpdateError::Fetch)?;
        let fresh = parse(&data, store)?;
        Ok(self.merge(fresh))
    }

    /// Merges a freshly fetched version of this feed into the held state.
    ///
    /// Title, description and refresh instant take the fresh values. Every
    /// fresh item whose identifier is not yet in `item_ids` is appended in
    /// encounter order; held items are never reordered or removed. The
    /// unread count grows by exactly the number of appended items, so
    /// merging the same document twice never double-counts.
    pub fn merge(&mut self, fresh: Feed) -> usize {
        self.title = fresh.title;
        self.description = fresh.description;
        self.refresh = fresh.refresh;

        let mut appended: usize = 0;
        for item in fresh.items {
            if self.item_ids.contains(&item.id) {
                continue;
            }
            self.item_ids.insert(item.id.clone());
            self.items.push(item);
            appended += 1;
        }
        self.unread += appended as u32;
        appended
    }
}

// ============================================================================
// Tests
// ============================================================================
