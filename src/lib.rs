//! Syndication feed parsing with incremental merge and duplicate tracking.
//!
//! Feeds arrive in four incompatible wire schemas (RSS 0.92/2.0, RSS 1.0,
//! Atom, JSON Feed), in heterogeneous and sometimes non-UTF-8 encodings,
//! with timestamps in dozens of textual layouts. This crate reconciles all
//! of that into one canonical [`Feed`]/[`Item`] model and remembers which
//! items have already been delivered across repeated fetches of the same
//! source.
//!
//! # Architecture
//!
//! - [`parse`] sniffs the wire schema and decodes one fetched document,
//!   consulting an [`IdentityStore`] to suppress items delivered by an
//!   earlier fetch.
//! - [`Feed::update_with`] and [`Feed::merge`] fold a fresh fetch into held
//!   feed state without losing or duplicating items, and refuse to run
//!   before the feed's computed refresh instant.
//! - [`charset`] normalizes declared legacy encodings to UTF-8 as the XML
//!   parser pulls bytes; [`timestamp`] resolves free-form date strings
//!   through caller-extensible layout lists.
//!
//! The crate performs no I/O of its own: network transport is a capability
//! the caller passes to [`fetch_with`], and persisting the held [`Feed`]
//! between cycles (it serializes with serde) is likewise the caller's job.
//!
//! # Example
//!
//! ```
//! use syndic::{parse, IdentityStore};
//!
//! let doc = br#"<?xml version="1.0"?>
//! <rss version="2.0"><channel>
//!   <title>Example</title>
//!   <item><guid>1</guid><title>First post</title><link>https://example.com/1</link></item>
//! </channel></rss>"#;
//!
//! let store = IdentityStore::new();
//! let feed = parse(doc, &store).expect("well-formed feed");
//! assert_eq!(feed.title, "Example");
//! assert_eq!(feed.unread, 1);
//!
//! // The same document again: every item is already known.
//! let again = parse(doc, &store).expect("well-formed feed");
//! assert_eq!(again.unread, 0);
//! ```

pub mod charset;
pub mod feed;
pub mod parse;
pub mod store;
pub mod timestamp;

pub use feed::{fetch_with, Enclosure, Feed, Image, Item, UpdateError};
pub use parse::{
    default_refresh_interval, detect, parse, set_default_refresh_interval, Format, ParseError,
};
pub use store::IdentityStore;
pub use timestamp::{parse_time, parse_time_with, with_layouts, Layouts, TimeError};
