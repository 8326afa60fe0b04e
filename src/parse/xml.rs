//! Plumbing shared by the XML decoders.
//!
//! Builds the event reader over the charset-normalizing stream and handles
//! the repetitive parts of text and attribute extraction.

use std::io::BufReader;

use quick_xml::events::{BytesStart, BytesText};
use quick_xml::Reader;

use super::ParseError;
use crate::charset::{self, CharsetReader};

pub(super) type FeedReader<'d> = Reader<BufReader<CharsetReader<&'d [u8]>>>;

/// Opens an event reader over `data`, transcoding through the charset
/// declared in the XML prolog. The parser pulls bytes through the transcoder
/// lazily.
pub(super) fn reader_for(data: &[u8]) -> Result<FeedReader<'_>, ParseError> {
    let declared = charset::declared_encoding(data).unwrap_or_default();
    let source = charset::for_charset(&declared, data)?;
    let mut reader = Reader::from_reader(BufReader::new(source));
    reader.config_mut().trim_text(true);
    Ok(reader)
}

pub(super) fn unescape_text(e: &BytesText<'_>) -> Result<String, ParseError> {
    e.unescape()
        .map(|s| s.into_owned())
        .map_err(|err| ParseError::Xml(err.to_string()))
}

/// Looks up an attribute value by local name, skipping malformed attributes
/// with a warning.
pub(super) fn attr(reader: &FeedReader<'_>, e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    for attr in e.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed attribute");
                continue;
            }
        };
        if attr.key.local_name().as_ref() == name {
            match attr.decode_and_unescape_value(reader.decoder()) {
                Ok(value) => return Some(value.into_owned()),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping undecodable attribute value");
                    return None;
                }
            }
        }
    }
    None
}

pub(super) fn has_attributes(e: &BytesStart<'_>) -> bool {
    e.attributes().next().is_some()
}
