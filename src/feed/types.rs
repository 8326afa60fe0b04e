//! The canonical feed model.
//!
//! Every wire schema — RSS 0.92/1.0/2.0, Atom, JSON Feed — decodes into these
//! types. They derive serde traits because persisting the held [`Feed`]
//! between fetch cycles is the caller's job; a feed round-trips through JSON
//! and keeps working.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical representation of one syndication source after decoding.
///
/// Created by a successful parse and mutated only by
/// [`merge`](Feed::merge); `unread` counts the items appended since the
/// known-identifier set was last empty and only decreases on an explicit
/// reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub title: String,
    pub description: String,
    /// Canonical link of the feed's site.
    pub link: String,
    /// URL the feed document is fetched from. Stamped by
    /// [`fetch_with`](crate::fetch_with); JSON Feed documents that carry
    /// their own `feed_url` keep it.
    pub update_url: String,
    pub image: Option<Image>,
    pub items: Vec<Item>,
    /// Identifier of every item this feed has ever held.
    pub item_ids: HashSet<String>,
    /// The earliest instant the feed should next be re-fetched.
    pub refresh: DateTime<Utc>,
    pub unread: u32,
}

impl Feed {
    /// Marks every item read and resets the unread count.
    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.read = true;
        }
        self.unread = 0;
    }
}

/// One story within a [`Feed`].
///
/// Two items with the same `id` are the same logical story. An item lacking
/// both a native identifier and a link is unidentifiable and never makes it
/// into the model; when only the native identifier is missing, the link
/// serves as `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub categories: Vec<String>,
    pub link: String,
    /// Publication instant. `None` when the document carried no date or the
    /// date did not resolve to an instant.
    pub date: Option<DateTime<Utc>>,
    pub id: String,
    pub enclosures: Vec<Enclosure>,
    pub read: bool,
}

impl Item {
    /// The content body with inline `<img>` tags removed.
    pub fn raw_content(&self) -> String {
        strip_img_tags(&self.content)
    }
}

/// Media attached to an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
    /// Byte length of the attachment.
    pub length: u64,
}

/// Feed- or item-level illustration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub title: String,
    pub url: String,
    pub height: u32,
    pub width: u32,
}

fn strip_img_tags(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<img") {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            // Unterminated tag: drop the tail.
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item_with_content(content: &str) -> Item {
        Item {
            title: "Title".to_string(),
            summary: String::new(),
            content: content.to_string(),
            categories: Vec::new(),
            link: String::new(),
            date: None,
            id: "id".to_string(),
            enclosures: Vec::new(),
            read: false,
        }
    }

    #[test]
    fn test_raw_content_strips_images() {
        let cases = [
            (
                "Some Content<img src=\"http://link/to/image.jpg\"/>",
                "Some Content",
            ),
            (
                "Before <img src=\"http://link/to/image.jpg\"/> After",
                "Before  After",
            ),
            (
                "<img src=\"http://link/to/image.jpg\"/>Image was at the beginning.",
                "Image was at the beginning.",
            ),
            (
                "Image had no <img src=\"http://link/to/image.jpg\">slash at the end of the tag",
                "Image had no slash at the end of the tag",
            ),
            (
                "All <img src=\"a.jpg\"/>images <img src=\"b.jpg\"/>are <img src=\"c.jpg\"/>gone",
                "All images are gone",
            ),
            ("No images here", "No images here"),
            ("Unterminated <img src=\"a.jpg\"", "Unterminated "),
        ];

        for (orig, expected) in cases {
            assert_eq!(item_with_content(orig).raw_content(), expected);
        }
    }

    #[test]
    fn test_mark_all_read() {
        let mut feed = Feed {
            title: "t".to_string(),
            description: String::new(),
            link: String::new(),
            update_url: String::new(),
            image: None,
            items: vec![item_with_content("a"), item_with_content("b")],
            item_ids: HashSet::new(),
            refresh: Utc::now(),
            unread: 2,
        };

        feed.mark_all_read();
        assert_eq!(feed.unread, 0);
        assert!(feed.items.iter().all(|i| i.read));
    }
}
