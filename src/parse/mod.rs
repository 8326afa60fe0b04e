//! Format detection and per-schema decoding.
//!
//! [`parse`] sniffs which of the four wire schemas a document uses and hands
//! it to the matching decoder. All four decoders share one contract: decode
//! the wire schema into an intermediate form mirroring its own field names,
//! then assemble canonical [`Item`]s through [`collect_items`], which owns
//! the identity, dedup, and timestamp rules:
//!
//! - an item's identifier is its native id, falling back to its link; an
//!   item with neither is dropped with a warning, never given an empty id,
//! - a duplicate identifier within the same document is skipped on the
//!   second occurrence,
//! - an identifier the [`IdentityStore`] already knows is skipped silently,
//! - a timestamp that fails to resolve leaves the item's date absent and
//!   never aborts the decode.
//!
//! Detection is a raw prefix/substring test — no document is fully parsed
//! twice. Unrecognized input falls through to the Atom decoder and fails
//! there with a structural error.

mod atom;
mod jsonfeed;
mod rss1;
mod rss2;
mod xml;

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Timelike, Utc};
use thiserror::Error;

use crate::charset::CharsetError;
use crate::feed::{Enclosure, Feed, Item};
use crate::store::IdentityStore;
use crate::timestamp::{parse_time, TimeError};

/// Errors that end a decode with no [`Feed`] produced.
///
/// Item-level problems (missing identifiers, bad dates) are not here — those
/// degrade the single item and the parse continues.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Malformed JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The declared charset has no decoder.
    #[error(transparent)]
    Charset(#[from] CharsetError),

    /// No channel/feed root element in the document.
    #[error("no channel element found in document")]
    NoChannel,

    /// The schema requires at least one item and the document has none.
    #[error("no items found in document")]
    NoItems,

    /// A JSON document without a recognizable JSON Feed version.
    #[error("not a JSON Feed document (version {0:?})")]
    Version(String),
}

/// The wire schema a document was detected as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Rss1,
    Rss2,
    Atom,
    JsonFeed,
}

/// Picks the decoder for a raw document by cheap content sniffing.
///
/// `<rss` selects RSS 0.92/2.0, the RSS 1.0 RDF namespace URI selects RSS
/// 1.0, a JSON-looking document selects JSON Feed, and everything else falls
/// through to Atom.
pub fn detect(data: &[u8]) -> Format {
    if contains(data, b"<rss") {
        return Format::Rss2;
    }
    if contains(data, b"http://purl.org/rss/1.0/") {
        return Format::Rss1;
    }
    let first = data.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'{') || contains(data, b"jsonfeed.org/version/") {
        return Format::JsonFeed;
    }
    Format::Atom
}

/// Decodes one fetched document into a [`Feed`], consulting `store` to drop
/// items already delivered by an earlier fetch.
pub fn parse(data: &[u8], store: &IdentityStore) -> Result<Feed, ParseError> {
    match detect(data) {
        Format::Rss2 => rss2::parse(data, store),
        Format::Rss1 => rss1::parse(data, store),
        Format::Atom => atom::parse(data, store),
        Format::JsonFeed => jsonfeed::parse(data, store),
    }
}

fn contains(data: &[u8], needle: &[u8]) -> bool {
    data.windows(needle.len()).any(|w| w == needle)
}

// ============================================================================
// Refresh scheduling
// ============================================================================

static DEFAULT_REFRESH_SECS: AtomicI64 = AtomicI64::new(600);

/// Overrides the package-level default refresh interval (normally 10
/// minutes), used when a document carries no `ttl` of its own.
pub fn set_default_refresh_interval(interval: Duration) {
    DEFAULT_REFRESH_SECS.store(interval.num_seconds(), Ordering::SeqCst);
}

/// The interval applied to documents without refresh metadata.
pub fn default_refresh_interval() -> Duration {
    Duration::seconds(DEFAULT_REFRESH_SECS.load(Ordering::SeqCst))
}

/// A document skipping every hour of every day never converges; stop
/// advancing after a week's worth of steps.
const MAX_SKIP_STEPS: u32 = 24 * 8;

/// Computes the next permissible refresh instant.
///
/// Advances `now` by `mins_to_live`, then past any skipped hour and skipped
/// weekday. Weekday comparison is case-insensitive on the full English name.
/// With no `mins_to_live` the package default applies and skip lists are
/// ignored.
pub(crate) fn next_refresh(
    now: DateTime<Utc>,
    mins_to_live: u32,
    skip_hours: &[u32],
    skip_days: &[String],
) -> DateTime<Utc> {
    if mins_to_live == 0 {
        return now + default_refresh_interval();
    }

    let mut next = now + Duration::minutes(i64::from(mins_to_live));
    for _ in 0..MAX_SKIP_STEPS {
        if skip_hours.contains(&next.hour()) {
            // Advance to the top of the following hour.
            next += Duration::minutes(i64::from(60 - next.minute()));
            continue;
        }
        let weekday = next.format("%A").to_string();
        if skip_days.iter().any(|d| d.eq_ignore_ascii_case(&weekday)) {
            next += Duration::hours(i64::from(24 - next.hour()));
            continue;
        }
        return next;
    }

    tracing::debug!(%next, "skip lists never converged, using current candidate");
    next
}

// ============================================================================
// Shared item assembly
// ============================================================================

/// A not-yet-identified item as one of the wire schemas delivered it.
#[derive(Debug, Default)]
pub(crate) struct Candidate {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub categories: Vec<String>,
    pub link: String,
    /// The raw date string, empty when the schema carried none.
    pub date: String,
    pub id: String,
    pub enclosures: Vec<Enclosure>,
}

/// Resolves identity, drops duplicates, and parses timestamps for the items
/// of one document.
///
/// Returns the surviving items in encounter order, the set of their
/// identifiers, and the unread count (always the number of items returned).
pub(crate) fn collect_items(
    candidates: Vec<Candidate>,
    store: &IdentityStore,
) -> (Vec<Item>, HashSet<String>, u32) {
    let mut items = Vec::with_capacity(candidates.len());
    let mut ids = HashSet::new();
    let mut unread = 0u32;

    for mut candidate in candidates {
        if candidate.id.is_empty() {
            if candidate.link.is_empty() {
                tracing::warn!(
                    title = %candidate.title,
                    "item has no identifier or link and will be ignored"
                );
                continue;
            }
            candidate.id = candidate.link.clone();
        }

        if ids.contains(&candidate.id) {
            tracing::debug!(id = %candidate.id, "duplicate identifier within document, skipping");
            continue;
        }

        // Already delivered by an earlier fetch.
        if store.seen(&candidate.id) {
            continue;
        }

        let date = if candidate.date.is_empty() {
            None
        } else {
            match parse_time(&candidate.date) {
                Ok(t) => Some(t),
                Err(TimeError::UnknownZone { zone, partial }) => {
                    tracing::warn!(zone = %zone, "unknown time zone, keeping instant as UTC");
                    Some(partial)
                }
                Err(e) => {
                    tracing::debug!(date = %candidate.date, error = %e, "unparseable item date");
                    None
                }
            }
        };

        ids.insert(candidate.id.clone());
        items.push(Item {
            title: candidate.title,
            summary: candidate.summary,
            content: candidate.content,
            categories: candidate.categories,
            link: candidate.link,
            date,
            id: candidate.id,
            enclosures: candidate.enclosures,
            read: false,
        });
        unread += 1;
    }

    (items, ids, unread)
}

// ============================================================================
// Tests
// ============================================================================
