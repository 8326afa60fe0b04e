//! Character encoding normalization for XML documents.
//!
//! Feeds declare their charset in the XML prolog and are not required to be
//! UTF-8 on the wire. [`CharsetReader`] wraps the raw byte source and yields
//! valid UTF-8, so the XML parser can pull through it lazily — transcoding
//! happens as the document is read, one source byte at a time.
//!
//! Three tiers of support:
//! - the empty string and `UTF-8` pass bytes through untouched,
//! - the ISO-8859-1 alias family transcodes directly (Latin-1 code points
//!   equal their Unicode scalar values),
//! - every other name is looked up in `encoding_rs`'s label table; names it
//!   does not know yield [`CharsetError::Unsupported`].

use std::io::{self, Read};

use thiserror::Error;

/// Errors raised while setting up charset normalization.
#[derive(Debug, Error)]
pub enum CharsetError {
    /// The declared charset is not UTF-8, not a Latin-1 alias, and not a
    /// label known to the embedded legacy-encoding table.
    #[error("unsupported charset: {0:?}")]
    Unsupported(String),
}

/// IANA name and aliases for ISO-8859-1.
/// http://www.iana.org/assignments/character-sets
const ISO_8859_1_NAMES: &[&str] = &[
    "ISO_8859-1:1987",
    "ISO-8859-1",
    "iso-ir-100",
    "ISO_8859-1",
    "latin1",
    "l1",
    "IBM819",
    "CP819",
    "csISOLatin1",
];

fn is_charset(charset: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(charset))
}

fn is_utf8(charset: &str) -> bool {
    // The empty string is the default when no encoding was declared.
    charset.is_empty() || charset.eq_ignore_ascii_case("UTF-8")
}

fn is_latin1(charset: &str) -> bool {
    is_charset(charset, ISO_8859_1_NAMES)
}

enum Mode {
    PassThrough,
    Latin1,
    Legacy(encoding_rs::Decoder),
}

/// A reader that yields valid UTF-8 regardless of the source encoding.
///
/// Pulls from the wrapped reader one byte at a time, staging at most one
/// decoded code point between reads, so it is safe to hand to a streaming
/// parser that consumes input incrementally.
pub struct CharsetReader<R: Read> {
    inner: R,
    mode: Mode,
    // Staged UTF-8 not yet handed to the caller.
    out: [u8; 16],
    out_len: usize,
    out_pos: usize,
    eof: bool,
}

/// Builds a [`CharsetReader`] for the given declared charset name.
///
/// Charset matching is case-insensitive. Returns
/// [`CharsetError::Unsupported`] naming the charset when no decoder exists
/// for it.
pub fn for_charset<R: Read>(charset: &str, input: R) -> Result<CharsetReader<R>, CharsetError> {
    let mode = if is_utf8(charset) {
        Mode::PassThrough
    } else if is_latin1(charset) {
        Mode::Latin1
    } else if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
        Mode::Legacy(encoding.new_decoder())
    } else {
        return Err(CharsetError::Unsupported(charset.to_string()));
    };

    Ok(CharsetReader {
        inner: input,
        mode,
        out: [0; 16],
        out_len: 0,
        out_pos: 0,
        eof: false,
    })
}

/// Extracts the charset name declared in an XML prolog, e.g.
/// `<?xml version="1.0" encoding="iso-8859-1"?>`.
///
/// Every supported encoding is an ASCII superset, so scanning the raw prefix
/// is sound. Returns `None` when there is no prolog or no encoding attribute.
pub fn declared_encoding(data: &[u8]) -> Option<String> {
    let head = &data[..data.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.iter().position(|&b| b == b'>')?;
    let decl = &head[..end];

    let attr = b"encoding";
    let at = decl.windows(attr.len()).position(|w| w == attr)?;
    let mut rest = decl[at + attr.len()..].iter().copied();
    // Skip to the opening quote, tolerating whitespace around '='.
    let quote = rest.find(|b| *b == b'"' || *b == b'\'')?;
    let name: Vec<u8> = rest.take_while(|&b| b != quote).collect();
    String::from_utf8(name).ok()
}

impl<R: Read> std::fmt::Debug for CharsetReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::PassThrough => "PassThrough",
            Mode::Latin1 => "Latin1",
            Mode::Legacy(_) => "Legacy",
        };
        f.debug_struct("CharsetReader")
            .field("mode", &mode)
            .field("out_len", &self.out_len)
            .field("out_pos", &self.out_pos)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}

impl<R: Read> CharsetReader<R> {
    fn read_source_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Stages the next decoded code point. Returns false at end of input.
    fn fill(&mut self) -> io::Result<bool> {
        self.out_pos = 0;
        self.out_len = 0;

        match &mut self.mode {
            Mode::PassThrough => unreachable!("pass-through bypasses staging"),
            Mode::Latin1 => {
                let Some(b) = self.read_source_byte()? else {
                    self.eof = true;
                    return Ok(false);
                };
                // ISO-8859-1 bytes are their own Unicode scalar values.
                let encoded = char::from(b).encode_utf8(&mut self.out);
                self.out_len = encoded.len();
                Ok(true)
            }
            Mode::Legacy(decoder) => loop {
                // Read one source byte via direct field access so the
                // `decoder` borrow of `self.mode` does not overlap a
                // whole-`self` method call.
                let mut byte = [0u8; 1];
                let next = loop {
                    match self.inner.read(&mut byte) {
                        Ok(0) => break None,
                        Ok(_) => break Some(byte[0]),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e),
                    }
                };
                match next {
                    Some(b) => {
                        let (_, _, written, _) =
                            decoder.decode_to_utf8(&[b], &mut self.out, false);
                        if written > 0 {
                            self.out_len = written;
                            return Ok(true);
                        }
                        // Mid-sequence: keep feeding bytes.
                    }
                    None => {
                        // Flush; a truncated sequence becomes U+FFFD.
                        let (_, _, written, _) = decoder.decode_to_utf8(&[], &mut self.out, true);
                        self.eof = true;
                        self.out_len = written;
                        return Ok(written > 0);
                    }
                }
            },
        }
    }
}

impl<R: Read> Read for CharsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if matches!(self.mode, Mode::PassThrough) {
            return self.inner.read(buf);
        }

        let mut written = 0;
        while written < buf.len() {
            if self.out_pos < self.out_len {
                buf[written] = self.out[self.out_pos];
                self.out_pos += 1;
                written += 1;
                continue;
            }
            if self.eof || !self.fill()? {
                break;
            }
        }
        Ok(written)
    }
}

// ============================================================================
// Tests
// ============================================================================
