//! Outfit Filtering Module
//!
//! Matches outfit items against the wardrobe snapshot. Matching is
//! case-insensitive and whitespace-collapsed, against both item names and ids.

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use shared_types::{Outfit, WardrobeItem};

/// What the filter removed, for debug output and telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReport {
    /// Item strings that matched nothing in the wardrobe
    pub removed_items: Vec<String>,
    /// Outfits dropped because none of their items matched
    pub dropped_outfits: usize,
}

impl FilterReport {
    pub fn is_clean(&self) -> bool {
        self.removed_items.is_empty() && self.dropped_outfits == 0
    }
}

/// Lowercase and collapse runs of whitespace into single spaces.
pub fn normalize_item_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn wardrobe_keys(wardrobe: &[WardrobeItem]) -> HashSet<String> {
    wardrobe
        .iter()
        .flat_map(|item| std::iter::once(item.name.as_str()).chain(item.id.as_deref()))
        .map(normalize_item_name)
        .filter(|key| !key.is_empty())
        .collect()
}

/// Drop outfit items the user does not own; drop outfits left empty.
pub fn filter_valid_outfits(outfits: Vec<Outfit>, wardrobe: &[WardrobeItem]) -> Vec<Outfit> {
    filter_with_report(outfits, wardrobe).0
}

/// Same as [`filter_valid_outfits`], also reporting what was removed.
///
/// An empty wardrobe leaves the outfits untouched: without a snapshot there
/// is nothing to ground against.
pub fn filter_with_report(
    outfits: Vec<Outfit>,
    wardrobe: &[WardrobeItem],
) -> (Vec<Outfit>, FilterReport) {
    let mut report = FilterReport::default();

    if wardrobe.is_empty() {
        debug!("Wardrobe is empty, skipping outfit filtering");
        return (outfits, report);
    }

    let owned = wardrobe_keys(wardrobe);
    let total = outfits.len();

    let kept: Vec<Outfit> = outfits
        .into_iter()
        .filter_map(|mut outfit| {
            let (valid, invalid): (Vec<String>, Vec<String>) = outfit
                .items
                .into_iter()
                .partition(|item| owned.contains(&normalize_item_name(item)));

            report.removed_items.extend(invalid);

            if valid.is_empty() {
                debug!("Dropping outfit '{}': no items found in wardrobe", outfit.title);
                report.dropped_outfits += 1;
                return None;
            }

            outfit.items = valid;
            Some(outfit)
        })
        .collect();

    if !report.is_clean() {
        info!(
            "Outfit filter removed {} item(s) and dropped {} of {} outfit(s)",
            report.removed_items.len(),
            report.dropped_outfits,
            total
        );
    }

    (kept, report)
}
