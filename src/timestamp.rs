//! Free-form timestamp resolution.
//!
//! Feed timestamps arrive in dozens of inconsistent textual layouts: RFC 822
//! and 1123 with two- or four-digit years, RFC 850, RFC 3339, ANSI C and Ruby
//! conventions, with numeric offsets, named zone abbreviations, or no zone at
//! all. [`parse_time`] tries an ordered list of layouts and returns the first
//! match as an absolute instant.
//!
//! Layouts are chrono `strftime` patterns, with `%Z` marking a named-zone
//! token. Two lists are tried in order: layouts carrying an explicit numeric
//! offset (or no zone) first, named-zone layouts second. A name like "PST"
//! can mean different rules in different places, so an unambiguous offset
//! always wins over a name; layouts containing both parse the offset and
//! discard the name.
//!
//! Zone names resolve through an RFC 822 abbreviation table to IANA regions,
//! falling back to parsing the token as a full region name ("Asia/Tokyo").
//! When the name is unknown, [`TimeError::UnknownZone`] carries the
//! partially-parsed instant read as UTC, so callers can degrade instead of
//! discarding the timestamp.
//!
//! The default lists are mutable process-wide configuration: embedding
//! applications can prepend or append their own layouts via [`with_layouts`].

use std::sync::{LazyLock, PoisonError, RwLock};

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors from timestamp resolution.
///
/// Never fatal to a feed parse: decoders map these to an absent or degraded
/// item date and keep going.
#[derive(Debug, Error)]
pub enum TimeError {
    /// No layout in either list matched the input.
    #[error("unrecognized date format: {0:?}")]
    Unrecognized(String),

    /// A named-zone layout matched but the zone name is not in the
    /// abbreviation table and is not an IANA region. `partial` is the
    /// wall-clock time read as UTC.
    #[error("unknown time zone {zone:?}")]
    UnknownZone {
        zone: String,
        partial: DateTime<Utc>,
    },
}

/// Layouts carrying an explicit numeric offset, or no zone at all. Tried
/// first. Two-digit-year variants precede their four-digit siblings because
/// `%Y` also accepts two digits and would otherwise claim them.
const WITH_OFFSET: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S Z",
    "%a, %d %b %y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %y %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%a %b %e %H:%M:%S %Y",
    "%a %b %e %H:%M:%S %z %Y",
    "%d %b %y %H:%M %z",
    "%+",
    // Odd zone-and-offset pairs. They do occur, but only get checked late,
    // and the offset is what gets used.
    "%d %b %y %H:%M:%S %z %Z",
    "%d %b %y %H:%M:%S %Z %z",
    "%d %b %Y %H:%M:%S %z %Z",
    "%d %b %Y %H:%M:%S %Z %z",
    "%a, %d %b %Y %H:%M:%S %z %Z",
    "%a, %d %b %Y %H:%M:%S %Z %z",
    "%b %e, %y %H:%M %p %z %Z",
    "%b %e, %y %H:%M %p %Z %z",
    "%b %e, %Y %H:%M %p %z %Z",
    "%b %e, %Y %H:%M %p %Z %z",
];

/// Layouts whose only zone information is a named abbreviation. Tried second;
/// the name is resolved through the zone table.
const NAMED_ZONE: &[&str] = &[
    "%a, %d %b %y %H:%M:%S %Z",
    "%a, %d %b %Y %H:%M:%S %Z",
    "%d %b %y %H:%M:%S %Z",
    "%d %b %Y %H:%M:%S %Z",
    "%b %e, %y %H:%M %p %Z",
    "%b %e, %Y %H:%M %p %Z",
    "%d %b %y %H:%M %Z",
    "%A, %d-%b-%y %H:%M:%S %Z",
    "%a %b %e %H:%M:%S %Z %Y",
];

/// The ordered layout lists used by [`parse_time_with`].
#[derive(Debug, Clone)]
pub struct Layouts {
    /// Layouts with an explicit numeric offset or no zone; tried first.
    pub with_offset: Vec<String>,
    /// Layouts ending in a named zone abbreviation; tried second.
    pub named_zone: Vec<String>,
}

impl Default for Layouts {
    fn default() -> Self {
        Self {
            with_offset: WITH_OFFSET.iter().map(|s| s.to_string()).collect(),
            named_zone: NAMED_ZONE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

static DEFAULT_LAYOUTS: LazyLock<RwLock<Layouts>> =
    LazyLock::new(|| RwLock::new(Layouts::default()));

/// Runs `f` with mutable access to the process-wide default layout lists.
///
/// Applications prepend or append their own layouts here; [`parse_time`]
/// picks the change up immediately.
pub fn with_layouts<T>(f: impl FnOnce(&mut Layouts) -> T) -> T {
    let mut layouts = DEFAULT_LAYOUTS
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    f(&mut layouts)
}

/// Parses a free-form date string using the process-wide default layouts.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, TimeError> {
    let layouts = DEFAULT_LAYOUTS
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    parse_time_with(&layouts, s)
}

/// Parses a free-form date string against explicit layout lists.
///
/// Surrounding whitespace is trimmed. The `with_offset` list is exhausted
/// before any named-zone layout is tried. A named-zone match whose zone
/// cannot be resolved returns [`TimeError::UnknownZone`] immediately, carrying
/// the partial instant.
pub fn parse_time_with(layouts: &Layouts, s: &str) -> Result<DateTime<Utc>, TimeError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeError::Unrecognized(String::new()));
    }

    for layout in &layouts.with_offset {
        if let Attempt::Hit(t) = attempt(layout, s) {
            return Ok(t);
        }
    }

    for layout in &layouts.named_zone {
        match attempt(layout, s) {
            Attempt::Hit(t) => return Ok(t),
            Attempt::UnknownZone { zone, partial } => {
                return Err(TimeError::UnknownZone { zone, partial });
            }
            Attempt::NoMatch => {}
        }
    }

    Err(TimeError::Unrecognized(s.to_string()))
}

enum Attempt {
    NoMatch,
    Hit(DateTime<Utc>),
    UnknownZone {
        zone: String,
        partial: DateTime<Utc>,
    },
}

fn attempt(layout: &str, s: &str) -> Attempt {
    let (pattern, input, zone) = if layout.contains("%Z") {
        match split_zone_token(layout, s) {
            Some((pattern, input, zone)) => (pattern, input, Some(zone)),
            None => return Attempt::NoMatch,
        }
    } else {
        (layout.to_string(), s.to_string(), None)
    };

    if pattern.contains("%z") || pattern.contains("%+") {
        // The offset resolves the instant; any zone name was decorative.
        return match DateTime::parse_from_str(&input, &pattern) {
            Ok(t) => Attempt::Hit(t.with_timezone(&Utc)),
            Err(_) => Attempt::NoMatch,
        };
    }

    let local = match NaiveDateTime::parse_from_str(&input, &pattern) {
        Ok(t) => t,
        Err(_) => return Attempt::NoMatch,
    };

    match zone {
        None => Attempt::Hit(local.and_utc()),
        Some(zone) => match zone_by_name(&zone) {
            Some(tz) => Attempt::Hit(resolve_local(tz, local)),
            None => Attempt::UnknownZone {
                zone,
                partial: local.and_utc(),
            },
        },
    }
}

/// Splits the zone-name token out of `s`, pairing whitespace-separated tokens
/// of the layout against those of the input. Returns the layout and input
/// with that token removed, plus the zone name itself. `None` when the token
/// arity differs or the candidate token is not a plausible zone name.
fn split_zone_token(layout: &str, s: &str) -> Option<(String, String, String)> {
    let layout_tokens: Vec<&str> = layout.split_whitespace().collect();
    let input_tokens: Vec<&str> = s.split_whitespace().collect();
    if layout_tokens.len() != input_tokens.len() {
        return None;
    }

    let idx = layout_tokens.iter().position(|t| *t == "%Z")?;
    let zone = input_tokens[idx];
    if zone.is_empty()
        || !zone
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '/' || c == '_')
    {
        return None;
    }

    let strip = |tokens: &[&str]| -> String {
        tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, t)| *t)
            .collect::<Vec<_>>()
            .join(" ")
    };

    Some((strip(&layout_tokens), strip(&input_tokens), zone.to_string()))
}

/// Resolves a zone abbreviation to an IANA region.
///
/// Covers the RFC 822 zone names plus a handful of abbreviations common in
/// feeds; anything else must be a full region name like "America/New_York".
/// Deliberately omits abbreviations with conflicting regional meanings
/// (e.g. "IST").
fn zone_by_name(name: &str) -> Option<Tz> {
    let tz = match name.to_ascii_uppercase().as_str() {
        "Z" | "UT" | "GMT" | "UTC" => chrono_tz::UTC,
        "EST" | "EDT" => chrono_tz::America::New_York,
        "CST" | "CDT" => chrono_tz::America::Chicago,
        "MST" | "MDT" => chrono_tz::America::Denver,
        "PST" | "PDT" => chrono_tz::America::Los_Angeles,
        "AKST" | "AKDT" => chrono_tz::America::Anchorage,
        "HST" => chrono_tz::Pacific::Honolulu,
        "BST" => chrono_tz::Europe::London,
        "CET" | "CEST" => chrono_tz::Europe::Berlin,
        "EET" | "EEST" => chrono_tz::Europe::Athens,
        "JST" => chrono_tz::Asia::Tokyo,
        "AEST" | "AEDT" => chrono_tz::Australia::Sydney,
        "NZST" | "NZDT" => chrono_tz::Pacific::Auckland,
        _ => return name.parse::<Tz>().ok(),
    };
    Some(tz)
}

fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Nonexistent local time (DST spring-forward gap): keep the wall
        // clock as UTC.
        LocalResult::None => local.and_utc(),
    }
}

// ============================================================================
// Tests
// ============================================================================
