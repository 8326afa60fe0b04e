//! The canonical feed model and its update cycle.
//!
//! Every supported wire schema decodes into [`Feed`] and [`Item`]; repeated
//! fetches of the same source flow through [`Feed::update_with`] or
//! [`Feed::merge`], which append only genuinely new items.

mod types;
mod update;

pub use types::{Enclosure, Feed, Image, Item};
pub use update::{fetch_with, UpdateError};
