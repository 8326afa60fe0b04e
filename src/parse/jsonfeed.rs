//! JSON Feed v1 decoder.
//!
//! The only non-XML schema. Wire structs mirror the JSON Feed field names;
//! `attachments` map to enclosures, `tags` to categories. A JSON Feed knows
//! its own fetch URL (`feed_url`), and an empty `items` array is a valid
//! empty feed — the schema, unlike the XML ones, does not require items.

use chrono::Utc;
use serde::Deserialize;

use super::{collect_items, default_refresh_interval, Candidate, ParseError};
use crate::feed::{Enclosure, Feed, Image};
use crate::store::IdentityStore;

const VERSION_MARKER: &str = "jsonfeed.org/version/";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFeed {
    version: String,
    title: String,
    home_page_url: String,
    feed_url: String,
    description: String,
    favicon: String,
    icon: String,
    expired: bool,
    items: Vec<WireItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireItem {
    id: String,
    url: String,
    title: String,
    content_html: String,
    content_text: String,
    summary: String,
    date_published: String,
    date_modified: String,
    tags: Vec<String>,
    attachments: Vec<WireAttachment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAttachment {
    url: String,
    mime_type: String,
    size_in_bytes: u64,
}

pub(super) fn parse(data: &[u8], store: &IdentityStore) -> Result<Feed, ParseError> {
    let wire: WireFeed = serde_json::from_slice(data)?;
    if !wire.version.contains(VERSION_MARKER) {
        return Err(ParseError::Version(wire.version));
    }
    if wire.expired {
        tracing::debug!(title = %wire.title, "feed declares itself expired");
    }

    let candidates = wire
        .items
        .into_iter()
        .map(|item| Candidate {
            title: item.title,
            summary: item.summary,
            content: if item.content_html.is_empty() {
                item.content_text
            } else {
                item.content_html
            },
            categories: item.tags,
            link: item.url,
            // Modified beats published, matching how aggregators surface
            // revisions.
            date: if item.date_modified.is_empty() {
                item.date_published
            } else {
                item.date_modified
            },
            id: item.id,
            enclosures: item
                .attachments
                .into_iter()
                .map(|a| Enclosure {
                    url: a.url,
                    mime_type: a.mime_type,
                    length: a.size_in_bytes,
                })
                .collect(),
        })
        .collect();

    let (items, item_ids, unread) = collect_items(candidates, store);

    let favicon = if wire.favicon.is_empty() {
        wire.icon
    } else {
        wire.favicon
    };

    Ok(Feed {
        title: wire.title,
        description: wire.description,
        link: wire.home_page_url,
        update_url: wire.feed_url,
        image: if favicon.is_empty() {
            None
        } else {
            Some(Image {
                url: favicon,
                ..Image::default()
            })
        },
        items,
        item_ids,
        refresh: Utc::now() + default_refresh_interval(),
        unread,
    })
}

// ============================================================================
// Tests
// ============================================================================
