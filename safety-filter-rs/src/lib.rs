//! Wardrobe grounding filter
//!
//! Keeps generated outfits honest: every item an outfit mentions must be
//! something the user actually owns.

pub mod filters;

pub use filters::{filter_valid_outfits, filter_with_report, normalize_item_name, FilterReport};
