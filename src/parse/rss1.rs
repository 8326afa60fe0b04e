//! RSS 1.0 (RDF) decoder.
//!
//! RDF feeds keep `<item>` elements outside `<channel>`, reference enclosure
//! targets through `rdf:resource`, and usually date items with `dc:date`.
//! Everything else follows the RSS 2.0 mapping.

use chrono::Utc;
use quick_xml::events::Event;

use super::xml::{self, FeedReader};
use super::{collect_items, next_refresh, Candidate, ParseError};
use crate::feed::{Enclosure, Feed, Image};
use crate::store::IdentityStore;

/// Intermediate form of the RDF document, field names per the RSS 1.0 schema.
#[derive(Debug, Default)]
struct WireFeed {
    channel: Option<Channel>,
    items: Vec<WireItem>,
    image: Option<Image>,
}

#[derive(Debug, Default)]
struct Channel {
    title: String,
    description: String,
    link: String,
    mins_to_live: u32,
    skip_hours: Vec<u32>,
    skip_days: Vec<String>,
}

#[derive(Debug, Default)]
struct WireItem {
    title: String,
    description: String,
    /// `content:encoded`, when present.
    content: String,
    link: String,
    pub_date: String,
    /// `dc:date`; preferred over `pubDate` when both appear.
    date: String,
    guid: String,
    enclosures: Vec<Enclosure>,
}

pub(super) fn parse(data: &[u8], store: &IdentityStore) -> Result<Feed, ParseError> {
    let wire = read_feed(data)?;
    let channel = wire.channel.ok_or(ParseError::NoChannel)?;
    if wire.items.is_empty() {
        return Err(ParseError::NoItems);
    }

    let refresh = next_refresh(
        Utc::now(),
        channel.mins_to_live,
        &channel.skip_hours,
        &channel.skip_days,
    );

    let candidates = wire
        .items
        .into_iter()
        .map(|item| Candidate {
            title: item.title,
            summary: item.description,
            content: item.content,
            categories: Vec::new(),
            link: item.link,
            date: if item.date.is_empty() {
                item.pub_date
            } else {
                item.date
            },
            id: item.guid,
            enclosures: item.enclosures,
        })
        .collect();

    let (items, item_ids, unread) = collect_items(candidates, store);

    Ok(Feed {
        title: channel.title,
        description: channel.description,
        link: channel.link,
        update_url: String::new(),
        image: wire.image,
        items,
        item_ids,
        refresh,
        unread,
    })
}

fn read_feed(data: &[u8]) -> Result<WireFeed, ParseError> {
    let mut reader = xml::reader_for(data)?;

    let mut wire = WireFeed::default();
    let mut in_channel = false;
    let mut item: Option<WireItem> = None;
    let mut image: Option<Image> = None;
    let mut in_skip_hours = false;
    let mut in_skip_days = false;
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
                    b"channel" if wire.channel.is_none() => {
                        wire.channel = Some(Channel::default());
                        in_channel = true;
                        field.clear();
                    }
                    // RDF puts items at the root, as siblings of the channel.
                    b"item" if item.is_none() => {
                        item = Some(WireItem::default());
                        field.clear();
                    }
                    b"image" if item.is_none() && image.is_none() => {
                        image = Some(Image::default());
                        field.clear();
                    }
                    b"skipHours" => {
                        in_skip_hours = true;
                        field.clear();
                    }
                    b"skipDays" => {
                        in_skip_days = true;
                        field.clear();
                    }
                    b"textinput" | b"textInput" => skip_subtree(&mut reader, &e)?,
                    b"link" if item.is_none() && xml::has_attributes(&e) => field.clear(),
                    b"enclosure" => {
                        if let Some(item) = item.as_mut() {
                            item.enclosures.push(read_enclosure(&reader, &e));
                        }
                        field.clear();
                    }
                    other => field = String::from_utf8_lossy(other).into_owned(),
                }
            }
            Event::Empty(e) => {
                if e.name().local_name().as_ref() == b"enclosure" {
                    if let Some(item) = item.as_mut() {
                        item.enclosures.push(read_enclosure(&reader, &e));
                    }
                }
            }
            Event::End(e) => {
                match e.name().local_name().as_ref() {
                    b"channel" => in_channel = false,
                    b"item" => {
                        if let Some(done) = item.take() {
                            wire.items.push(done);
                        }
                    }
                    b"image" => {
                        if let Some(done) = image.take() {
                            wire.image = Some(done);
                        }
                    }
                    b"skipHours" => in_skip_hours = false,
                    b"skipDays" => in_skip_days = false,
                    _ => {}
                }
                field.clear();
            }
            Event::Text(e) => {
                let text = xml::unescape_text(&e)?;
                record(
                    &text,
                    &field,
                    &mut wire,
                    in_channel,
                    &mut item,
                    &mut image,
                    in_skip_hours,
                    in_skip_days,
                );
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                record(
                    &text,
                    &field,
                    &mut wire,
                    in_channel,
                    &mut item,
                    &mut image,
                    in_skip_hours,
                    in_skip_days,
                );
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(wire)
}

fn skip_subtree(
    reader: &mut FeedReader<'_>,
    e: &quick_xml::events::BytesStart<'_>,
) -> Result<(), ParseError> {
    let end = e.to_end().into_owned();
    let mut skipped = Vec::new();
    reader
        .read_to_end_into(end.name(), &mut skipped)
        .map_err(|err| ParseError::Xml(err.to_string()))?;
    Ok(())
}

fn read_enclosure(reader: &FeedReader<'_>, e: &quick_xml::events::BytesStart<'_>) -> Enclosure {
    Enclosure {
        // RDF spells the target rdf:resource; plain url also occurs.
        url: xml::attr(reader, e, b"resource")
            .or_else(|| xml::attr(reader, e, b"url"))
            .unwrap_or_default(),
        mime_type: xml::attr(reader, e, b"type").unwrap_or_default(),
        length: xml::attr(reader, e, b"length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
    }
}

#[allow(clippy::too_many_arguments)]
fn record(
    text: &str,
    field: &str,
    wire: &mut WireFeed,
    in_channel: bool,
    item: &mut Option<WireItem>,
    image: &mut Option<Image>,
    in_skip_hours: bool,
    in_skip_days: bool,
) {
    if field.is_empty() {
        return;
    }

    if let Some(item) = item.as_mut() {
        match field {
            "title" => item.title.push_str(text),
            "description" => item.description.push_str(text),
            "encoded" => item.content.push_str(text),
            "link" => item.link.push_str(text),
            "pubDate" => item.pub_date.push_str(text),
            "date" => item.date.push_str(text),
            "guid" => item.guid.push_str(text),
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

    let Some(channel) = wire.channel.as_mut() else {
        return;
    };
    if !in_channel {
        return;
    }

    if in_skip_hours {
        if field == "hour" {
            if let Ok(hour) = text.trim().parse() {
                channel.skip_hours.push(hour);
            }
        }
        return;
    }
    if in_skip_days {
        if field == "day" {
            channel.skip_days.push(text.trim().to_string());
        }
        return;
    }

    match field {
        "title" => channel.title.push_str(text),
        "description" => channel.description.push_str(text),
        "link" => {
            if channel.link.is_empty() {
                channel.link.push_str(text);
            }
        }
        "ttl" => channel.mins_to_live = text.trim().parse().unwrap_or(0),
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

    const RDF_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns="http://purl.org/rss/1.0/">
  <channel rdf:about="http://www.golem.de/">
    <title>Golem.de</title>
    <link>http://www.golem.de/</link>
    <description>IT-News fuer Profis</description>
    <items>
      <rdf:Seq>
        <rdf:li rdf:resource="http://www.golem.de/news/first.html"/>
        <rdf:li rdf:resource="http://www.golem.de/news/second.html"/>
      </rdf:Seq>
    </items>
  </channel>
  <item rdf:about="http://www.golem.de/news/first.html">
    <title>First article</title>
    <link>http://www.golem.de/news/first.html</link>
    <description>The first article.</description>
    <dc:date>2015-07-01T09:27:00Z</dc:date>
  </item>
  <item rdf:about="http://www.golem.de/news/second.html">
    <title>Second article</title>
    <link>http://www.golem.de/news/second.html</link>
    <description>The second article.</description>
    <enclosure rdf:resource="http://foo.bar/baz.mp3" type="audio/mpeg" length="65535"/>
  </item>
</rdf:RDF>"#;

    fn parse(data: &[u8]) -> Result<crate::Feed, ParseError> {
        super::parse(data, &IdentityStore::new())
    }

    #[test]
    fn test_parse_rdf_feed() {
        let feed = parse(RDF_FEED.as_bytes()).unwrap();
        assert_eq!(feed.title, "Golem.de");
        assert_eq!(feed.link, "http://www.golem.de/");
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.unread, 2);
        // No guid: the link is promoted to the identifier.
        assert_eq!(feed.items[0].id, "http://www.golem.de/news/first.html");
        assert_eq!(
            feed.items[0].date,
            Some(Utc.with_ymd_and_hms(2015, 7, 1, 9, 27, 0).unwrap())
        );
    }

    #[test]
    fn test_rdf_resource_enclosure() {
        let feed = parse(RDF_FEED.as_bytes()).unwrap();
        let enc = &feed.items[1].enclosures[0];
        assert_eq!(enc.url, "http://foo.bar/baz.mp3");
        assert_eq!(enc.mime_type, "audio/mpeg");
        assert_eq!(enc.length, 65535);
    }

    #[test]
    fn test_no_channel_is_structural_error() {
        let doc = br#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
            xmlns="http://purl.org/rss/1.0/">
            <item><title>stray</title><link>http://a/</link></item></rdf:RDF>"#;
        assert!(matches!(parse(doc), Err(ParseError::NoChannel)));
    }

    #[test]
    fn test_no_items_is_structural_error() {
        let doc = br#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
            xmlns="http://purl.org/rss/1.0/">
            <channel><title>Empty</title></channel></rdf:RDF>"#;
        assert!(matches!(parse(doc), Err(ParseError::NoItems)));
    }

    #[test]
    fn test_store_dedup_across_parses() {
        let store = IdentityStore::new();
        assert_eq!(super::parse(RDF_FEED.as_bytes(), &store).unwrap().unread, 2);
        assert_eq!(super::parse(RDF_FEED.as_bytes(), &store).unwrap().unread, 0);
    }
}
