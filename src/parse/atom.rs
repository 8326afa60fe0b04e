//! Atom decoder.
//!
//! The `<feed>`/`<entry>` schema differs from RSS in two ways that matter
//! here: links are attributed `<link rel=... href=...>` elements, where
//! non-alternate relations describe attachments rather than the story link,
//! and entries carry a mandatory `<id>` with no link fallback in the wild.
//! Atom is also the fallback decoder for undetected input, so an absent
//! `<feed>` root is the structural error unrecognized documents die on.

use chrono::Utc;
use quick_xml::events::{BytesStart, Event};

use super::xml::{self, FeedReader};
use super::{collect_items, default_refresh_interval, Candidate, ParseError};
use crate::feed::{Enclosure, Feed, Image};
use crate::store::IdentityStore;

/// Intermediate form of `<feed>`, field names per the Atom schema.
#[derive(Debug, Default)]
struct WireFeed {
    title: String,
    subtitle: String,
    link: String,
    image: Option<Image>,
    entries: Vec<WireEntry>,
}

/// Intermediate form of `<entry>`.
#[derive(Debug, Default)]
struct WireEntry {
    title: String,
    summary: String,
    content: String,
    categories: Vec<String>,
    link: String,
    updated: String,
    id: String,
    enclosures: Vec<Enclosure>,
}

pub(super) fn parse(data: &[u8], store: &IdentityStore) -> Result<Feed, ParseError> {
    let wire = read_feed(data)?.ok_or(ParseError::NoChannel)?;
    if wire.entries.is_empty() {
        return Err(ParseError::NoItems);
    }

    let candidates = wire
        .entries
        .into_iter()
        .map(|entry| Candidate {
            title: entry.title,
            summary: entry.summary,
            content: entry.content,
            categories: entry.categories,
            link: entry.link,
            date: entry.updated,
            id: entry.id,
            enclosures: entry.enclosures,
        })
        .collect();

    let (items, item_ids, unread) = collect_items(candidates, store);

    Ok(Feed {
        title: wire.title,
        description: wire.subtitle,
        link: wire.link,
        update_url: String::new(),
        image: wire.image,
        items,
        item_ids,
        refresh: Utc::now() + default_refresh_interval(),
        unread,
    })
}

fn read_feed(data: &[u8]) -> Result<Option<WireFeed>, ParseError> {
    let mut reader = xml::reader_for(data)?;

    let mut feed: Option<WireFeed> = None;
    let mut entry: Option<WireEntry> = None;
    let mut image: Option<Image> = None;
    let mut field = String::new();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::Xml(e.to_string()))?;
        match event {
            Event::Start(e) => {
                let local = e.name().local_name().as_ref().to_vec();
                match local.as_slice() {
                    b"feed" if feed.is_none() => {
                        feed = Some(WireFeed::default());
                        field.clear();
                    }
                    b"entry" if feed.is_some() && entry.is_none() => {
                        entry = Some(WireEntry::default());
                        field.clear();
                    }
                    b"image" if feed.is_some() && entry.is_none() && image.is_none() => {
                        image = Some(Image::default());
                        field.clear();
                    }
                    b"link" => {
                        record_link(&reader, &e, feed.as_mut(), entry.as_mut());
                        field.clear();
                    }
                    b"category" => {
                        if let Some(entry) = entry.as_mut() {
                            if let Some(term) = xml::attr(&reader, &e, b"term") {
                                entry.categories.push(term);
                            }
                        }
                        field.clear();
                    }
                    other => field = String::from_utf8_lossy(other).into_owned(),
                }
            }
            Event::Empty(e) => {
                let local = e.name().local_name().as_ref().to_vec();
                match local.as_slice() {
                    b"link" => record_link(&reader, &e, feed.as_mut(), entry.as_mut()),
                    b"category" => {
                        if let Some(entry) = entry.as_mut() {
                            if let Some(term) = xml::attr(&reader, &e, b"term") {
                                entry.categories.push(term);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                match e.name().local_name().as_ref() {
                    b"entry" => {
                        if let (Some(feed), Some(done)) = (feed.as_mut(), entry.take()) {
                            feed.entries.push(done);
                        }
                    }
                    b"image" => {
                        if let (Some(feed), Some(done)) = (feed.as_mut(), image.take()) {
                            feed.image = Some(done);
                        }
                    }
                    _ => {}
                }
                field.clear();
            }
            Event::Text(e) => {
                let text = xml::unescape_text(&e)?;
                record(&text, &field, &mut feed, &mut entry, &mut image);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                record(&text, &field, &mut feed, &mut entry, &mut image);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

/// Routes a `<link>` element: alternate (or unqualified) relations carry the
/// story or feed link; anything else on an entry describes an attachment.
fn record_link(
    reader: &FeedReader<'_>,
    e: &BytesStart<'_>,
    feed: Option<&mut WireFeed>,
    entry: Option<&mut WireEntry>,
) {
    let rel = xml::attr(reader, e, b"rel").unwrap_or_default();
    let href = xml::attr(reader, e, b"href").unwrap_or_default();

    if let Some(entry) = entry {
        if rel == "alternate" || rel.is_empty() {
            entry.link = href;
        } else {
            entry.enclosures.push(Enclosure {
                url: href,
                mime_type: xml::attr(reader, e, b"type").unwrap_or_default(),
                length: xml::attr(reader, e, b"length")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0),
            });
        }
        return;
    }

    if let Some(feed) = feed {
        if (rel == "alternate" || rel.is_empty()) && feed.link.is_empty() {
            feed.link = href;
        }
    }
}

fn record(
    text: &str,
    field: &str,
    feed: &mut Option<WireFeed>,
    entry: &mut Option<WireEntry>,
    image: &mut Option<Image>,
) {
    if field.is_empty() {
        return;
    }
    let Some(feed) = feed.as_mut() else {
        return;
    };

    if let Some(entry) = entry.as_mut() {
        match field {
            "title" => entry.title.push_str(text),
            "summary" => entry.summary.push_str(text),
            "content" => entry.content.push_str(text),
            "updated" => entry.updated.push_str(text),
            "id" => entry.id.push_str(text),
            _ => {}
        }
        return;
    }

    if let Some(image) = image.as_mut() {
        match field {
            "title" => image.title.push_str(text),
            "url" => image.url.push_str(text),
            "height" => image.height = text.trim().parse().unwrap_or(0),
            "width" => image.width = text.trim().parse().unwrap_or(0),
            _ => {}
        }
        return;
    }

    match field {
        "title" => feed.title.push_str(text),
        "subtitle" => feed.subtitle.push_str(text),
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::ParseError;
    use crate::store::IdentityStore;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Feed</title>
  <subtitle>Insert witty subtitle here.</subtitle>
  <link href="http://example.org/feed/" rel="self"/>
  <link href="http://example.org/"/>
  <updated>2003-12-13T18:30:02Z</updated>
  <entry>
    <title>Atom-Powered Robots Run Amok</title>
    <link href="http://example.org/2003/12/13/atom03"/>
    <link rel="enclosure" type="audio/mpeg" length="1234"
          href="http://example.org/audio.mp3"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2003-12-13T18:30:02Z</updated>
    <summary>Some text.</summary>
    <category term="robots"/>
  </entry>
  <entry>
    <title>No identifier</title>
    <updated>2003-12-13T18:30:02Z</updated>
    <summary>Dropped for lack of id and link.</summary>
  </entry>
</feed>"#;

    fn parse(data: &[u8]) -> Result<crate::Feed, ParseError> {
        super::parse(data, &IdentityStore::new())
    }

    #[test]
    fn test_parse_feed_metadata() {
        let feed = parse(ATOM_FEED.as_bytes()).unwrap();
        assert_eq!(feed.title, "Example Feed");
        assert_eq!(feed.description, "Insert witty subtitle here.");
        // rel="self" is not the site link.
        assert_eq!(feed.link, "http://example.org/");
    }

    #[test]
    fn test_entries_and_identity() {
        let feed = parse(ATOM_FEED.as_bytes()).unwrap();
        // The id-less, link-less entry is dropped.
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.unread, 1);

        let item = &feed.items[0];
        assert_eq!(item.id, "urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a");
        assert_eq!(item.link, "http://example.org/2003/12/13/atom03");
        assert_eq!(item.summary, "Some text.");
        assert_eq!(item.categories, vec!["robots"]);
        assert_eq!(
            item.date,
            Some(Utc.with_ymd_and_hms(2003, 12, 13, 18, 30, 2).unwrap())
        );
    }

    #[test]
    fn test_non_alternate_entry_links_become_enclosures() {
        let feed = parse(ATOM_FEED.as_bytes()).unwrap();
        let enc = &feed.items[0].enclosures[0];
        assert_eq!(enc.url, "http://example.org/audio.mp3");
        assert_eq!(enc.mime_type, "audio/mpeg");
        assert_eq!(enc.length, 1234);
    }

    #[test]
    fn test_missing_feed_root_is_structural_error() {
        let result = parse(b"<html><body>not a feed</body></html>");
        assert!(matches!(result, Err(ParseError::NoChannel)));
    }

    #[test]
    fn test_no_entries_is_structural_error() {
        let doc = br#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title></feed>"#;
        assert!(matches!(parse(doc), Err(ParseError::NoItems)));
    }

    #[test]
    fn test_entry_link_fallback_identity() {
        let doc = br#"<feed xmlns="http://www.w3.org/2005/Atom">
          <title>t</title>
          <entry><title>linked</title><link href="http://example.org/a"/></entry>
        </feed>"#;

        let feed = parse(doc).unwrap();
        assert_eq!(feed.items[0].id, "http://example.org/a");
    }

    #[test]
    fn test_store_dedup_across_parses() {
        let store = IdentityStore::new();
        assert_eq!(super::parse(ATOM_FEED.as_bytes(), &store).unwrap().unread, 1);
        assert_eq!(super::parse(ATOM_FEED.as_bytes(), &store).unwrap().unread, 0);
    }
}
