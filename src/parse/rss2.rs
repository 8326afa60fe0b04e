//! RSS 0.92/2.0 decoder.
//!
//! Maps the `<rss><channel>` wire schema onto the canonical model. Item
//! identity is the `<guid>`, falling back to `<link>`. The channel's `ttl`,
//! `skipHours` and `skipDays` drive the next-refresh instant.

use chrono::Utc;
use quick_xml::events::Event;

use super::xml::{self, FeedReader};
use super::{collect_items, next_refresh, Candidate, ParseError};
use crate::feed::{Enclosure, Feed, Image};
use crate::store::IdentityStore;

/// Intermediate form of `<channel>`, field names per the RSS 2.0 schema.
#[derive(Debug, Default)]
struct Channel {
    title: String,
    description: String,
    link: String,
    image: Option<Image>,
    items: Vec<WireItem>,
    mins_to_live: u32,
    skip_hours: Vec<u32>,
    skip_days: Vec<String>,
}

/// Intermediate form of `<item>`.
#[derive(Debug, Default)]
struct WireItem {
    title: String,
    description: String,
    /// `content:encoded`, when present.
    content: String,
    categories: Vec<String>,
    link: String,
    pub_date: String,
    /// `dc:date`; preferred over `pubDate` when both appear.
    date: String,
    guid: String,
    enclosures: Vec<Enclosure>,
}

pub(super) fn parse(data: &[u8], store: &IdentityStore) -> Result<Feed, ParseError> {
    let channel = read_channel(data)?.ok_or(ParseError::NoChannel)?;
    if channel.items.is_empty() {
        return Err(ParseError::NoItems);
    }

    let refresh = next_refresh(
        Utc::now(),
        channel.mins_to_live,
        &channel.skip_hours,
        &channel.skip_days,
    );

    let candidates = channel
        .items
        .into_iter()
        .map(|item| Candidate {
            title: item.title,
            summary: item.description,
            content: item.content,
            categories: item.categories,
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
        image: channel.image,
        items,
        item_ids,
        refresh,
        unread,
    })
}

fn read_channel(data: &[u8]) -> Result<Option<Channel>, ParseError> {
    let mut reader = xml::reader_for(data)?;

    let mut channel: Option<Channel> = None;
    let mut item: Option<WireItem> = None;
    let mut image: Option<Image> = None;
    let mut in_skip_hours = false;
    let mut in_skip_days = false;
    // Local name of the element whose text is being captured.
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
                    b"channel" if channel.is_none() => {
                        channel = Some(Channel::default());
                        field.clear();
                    }
                    b"item" if channel.is_some() && item.is_none() => {
                        item = Some(WireItem::default());
                        field.clear();
                    }
                    b"image" if channel.is_some() && item.is_none() && image.is_none() => {
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
                    b"textInput" | b"textinput" => {
                        // Carries its own <title> and <link>; skip the subtree
                        // so they cannot shadow the channel's.
                        skip_subtree(&mut reader, &e)?;
                    }
                    b"category" if item.is_some() => {
                        if let Some(item) = item.as_mut() {
                            item.categories.push(String::new());
                        }
                        field = "category".to_string();
                    }
                    b"link" if item.is_none() && xml::has_attributes(&e) => {
                        // An attributed <link> is an Atom-style self link,
                        // not the channel link.
                        field.clear();
                    }
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
                    b"item" => {
                        if let (Some(channel), Some(done)) = (channel.as_mut(), item.take()) {
                            channel.items.push(done);
                        }
                    }
                    b"image" => {
                        if let (Some(channel), Some(done)) = (channel.as_mut(), image.take()) {
                            channel.image = Some(done);
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
                    &mut channel,
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
                    &mut channel,
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

    Ok(channel)
}

fn skip_subtree(reader: &mut FeedReader<'_>, e: &quick_xml::events::BytesStart<'_>) -> Result<(), ParseError> {
    let end = e.to_end().into_owned();
    let mut skipped = Vec::new();
    reader
        .read_to_end_into(end.name(), &mut skipped)
        .map_err(|err| ParseError::Xml(err.to_string()))?;
    Ok(())
}

fn read_enclosure(reader: &FeedReader<'_>, e: &quick_xml::events::BytesStart<'_>) -> Enclosure {
    Enclosure {
        url: xml::attr(reader, e, b"url").unwrap_or_default(),
        mime_type: xml::attr(reader, e, b"type").unwrap_or_default(),
        length: xml::attr(reader, e, b"length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
    }
}

fn record(
    text: &str,
    field: &str,
    channel: &mut Option<Channel>,
    item: &mut Option<WireItem>,
    image: &mut Option<Image>,
    in_skip_hours: bool,
    in_skip_days: bool,
) {
    if field.is_empty() {
        return;
    }
    let Some(channel) = channel.as_mut() else {
        return;
    };

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

    if let Some(item) = item.as_mut() {
        match field {
            "title" => item.title.push_str(text),
            "description" => item.description.push_str(text),
            "encoded" => item.content.push_str(text),
            "category" => {
                if let Some(last) = item.categories.last_mut() {
                    last.push_str(text);
                }
            }
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
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const LIFTOFF: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Liftoff News</title>
    <link>http://liftoff.msfc.nasa.gov/</link>
    <description>Liftoff to Space Exploration.</description>
    <item>
      <title>Star City</title>
      <link>http://liftoff.msfc.nasa.gov/news/2003/news-starcity.asp</link>
      <description>How do Americans get ready to work with Russians aboard the
        International Space Station?</description>
      <pubDate>Tue, 03 Jun 2003 09:39:21 GMT</pubDate>
      <guid>http://liftoff.msfc.nasa.gov/2003/06/03.html#item573</guid>
    </item>
    <item>
      <title>The Engine That Does More</title>
      <link>http://liftoff.msfc.nasa.gov/news/2003/news-VASIMR.asp</link>
      <description>Before man travels to Mars, NASA hopes to design new engines.</description>
      <pubDate>not a real date</pubDate>
      <guid>http://liftoff.msfc.nasa.gov/2003/05/27.html#item571</guid>
    </item>
  </channel>
</rss>"#;

    fn parse(data: &[u8]) -> Result<crate::Feed, ParseError> {
        super::parse(data, &IdentityStore::new())
    }

    #[test]
    fn test_parse_channel_metadata() {
        let feed = parse(LIFTOFF.as_bytes()).unwrap();
        assert_eq!(feed.title, "Liftoff News");
        assert_eq!(feed.link, "http://liftoff.msfc.nasa.gov/");
        assert_eq!(feed.description, "Liftoff to Space Exploration.");
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.unread, 2);
    }

    #[test]
    fn test_item_dates() {
        let feed = parse(LIFTOFF.as_bytes()).unwrap();
        assert_eq!(
            feed.items[0].date,
            Some(Utc.with_ymd_and_hms(2003, 6, 3, 9, 39, 21).unwrap())
        );
        // An unparseable date degrades the item, never the parse.
        assert_eq!(feed.items[1].date, None);
    }

    #[test]
    fn test_no_channel_is_structural_error() {
        let result = parse(b"<?xml version=\"1.0\"?><rss version=\"2.0\"></rss>");
        assert!(matches!(result, Err(ParseError::NoChannel)));
    }

    #[test]
    fn test_no_items_is_structural_error() {
        let doc = r#"<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        assert!(matches!(parse(doc.as_bytes()), Err(ParseError::NoItems)));
    }

    #[test]
    fn test_identity_fallback_and_drop() {
        let doc = r#"<rss version="2.0"><channel>
            <title>Identities</title>
            <item><title>linked</title><link>http://example.com/a</link></item>
            <item><title>orphan</title></item>
            <item><title>guided</title><guid>g-1</guid></item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        // The orphan has neither guid nor link and is excluded.
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.unread, 2);
        assert_eq!(feed.items[0].id, "http://example.com/a");
        assert_eq!(feed.items[1].id, "g-1");
    }

    #[test]
    fn test_duplicate_guid_within_document() {
        let doc = r#"<rss version="2.0"><channel>
            <title>Dups</title>
            <item><title>first</title><guid>same</guid></item>
            <item><title>second</title><guid>same</guid></item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, "first");
    }

    #[test]
    fn test_store_drops_items_from_earlier_fetch() {
        let store = IdentityStore::new();
        let first = super::parse(LIFTOFF.as_bytes(), &store).unwrap();
        assert_eq!(first.unread, 2);

        let second = super::parse(LIFTOFF.as_bytes(), &store).unwrap();
        assert_eq!(second.items.len(), 0);
        assert_eq!(second.unread, 0);
    }

    #[test]
    fn test_latin1_document() {
        let mut doc = Vec::new();
        doc.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
        doc.extend_from_slice(b"<rss version=\"2.0\"><channel><title>Caf\xE9</title>");
        doc.extend_from_slice(b"<item><guid>1</guid><title>R\xE9sum\xE9</title></item>");
        doc.extend_from_slice(b"</channel></rss>");

        let feed = parse(&doc).unwrap();
        assert_eq!(feed.title, "Café");
        assert_eq!(feed.items[0].title, "Résumé");
    }

    #[test]
    fn test_unsupported_charset_is_fatal() {
        let doc = b"<?xml version=\"1.0\" encoding=\"x-mystery\"?><rss><channel>\
            <item><guid>1</guid></item></channel></rss>";
        assert!(matches!(parse(doc), Err(ParseError::Charset(_))));
    }

    #[test]
    fn test_content_encoded_and_summary() {
        let doc = r#"<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
        <channel><title>Content</title>
          <item>
            <guid>1</guid>
            <description>plain summary</description>
            <content:encoded><![CDATA[<p><a href="https://example.com/">Example.com</a> is an example site.</p>]]></content:encoded>
          </item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].summary, "plain summary");
        assert_eq!(
            feed.items[0].content,
            "<p><a href=\"https://example.com/\">Example.com</a> is an example site.</p>"
        );
    }

    #[test]
    fn test_dc_date_preferred_over_pub_date() {
        let doc = r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
        <channel><title>Dates</title>
          <item>
            <guid>1</guid>
            <pubDate>Tue, 03 Jun 2003 09:39:21 GMT</pubDate>
            <dc:date>2004-01-01T12:00:00Z</dc:date>
          </item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        assert_eq!(
            feed.items[0].date,
            Some(Utc.with_ymd_and_hms(2004, 1, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_enclosures() {
        let doc = r#"<rss version="2.0"><channel><title>Enc</title>
          <item>
            <guid>1</guid>
            <enclosure url="http://example.com/file.mp3" type="audio/mpeg" length="65535"/>
          </item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        let enc = &feed.items[0].enclosures[0];
        assert_eq!(enc.url, "http://example.com/file.mp3");
        assert_eq!(enc.mime_type, "audio/mpeg");
        assert_eq!(enc.length, 65535);
    }

    #[test]
    fn test_categories() {
        let doc = r#"<rss version="2.0"><channel><title>Cats</title>
          <item><guid>1</guid><category>space</category><category>news</category></item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        assert_eq!(feed.items[0].categories, vec!["space", "news"]);
    }

    #[test]
    fn test_channel_image_and_skip_metadata() {
        let doc = r#"<rss version="2.0"><channel>
          <title>Imaged</title>
          <image><title>Logo</title><url>http://example.com/logo.png</url>
            <height>32</height><width>96</width></image>
          <ttl>60</ttl>
          <item><guid>1</guid></item>
        </channel></rss>"#;

        let before = Utc::now();
        let feed = parse(doc.as_bytes()).unwrap();
        let image = feed.image.unwrap();
        assert_eq!(image.title, "Logo");
        assert_eq!(image.url, "http://example.com/logo.png");
        assert_eq!(image.height, 32);
        assert_eq!(image.width, 96);
        // ttl drives the refresh instant.
        assert!(feed.refresh >= before + Duration::minutes(59));
    }

    #[test]
    fn test_attributed_channel_link_ignored() {
        let doc = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
          <title>Links</title>
          <atom:link href="http://example.com/feed.xml" rel="self" type="application/rss+xml"/>
          <link>http://example.com/</link>
          <item><guid>1</guid></item>
        </channel></rss>"#;

        let feed = parse(doc.as_bytes()).unwrap();
        assert_eq!(feed.link, "http://example.com/");
    }

    #[test]
    fn test_malformed_xml_is_structural_error() {
        let result = parse(b"<rss version=\"2.0\"><channel><title>broken");
        // Either the parser reports the truncation or no channel survives;
        // both are structural.
        assert!(result.is_err());
    }
}
