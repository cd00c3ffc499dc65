//! Colour tags that point at the same image content.

use std::collections::{BTreeMap, HashMap};

use super::Tag;

/// Hex characters of a revision used as the group colour.
const COLOR_LENGTH: usize = 6;

/// Set `tag_revision_background_color` on every tag.
///
/// Tags sharing a non-empty revision with at least one other tag get the
/// first six characters of that revision; every other tag gets `""`. The
/// result depends only on the current tag set.
pub fn assign_revision_colors(tags: &mut BTreeMap<String, Tag>) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for revision in tags.values().filter_map(|t| t.revision.as_deref()) {
        if !revision.is_empty() {
            *counts.entry(revision.to_string()).or_default() += 1;
        }
    }

    for tag in tags.values_mut() {
        tag.tag_revision_background_color = match tag.revision.as_deref() {
            Some(revision) if counts.get(revision).copied().unwrap_or(0) >= 2 => {
                revision.chars().take(COLOR_LENGTH).collect()
            }
            _ => String::new(),
        };
    }
}
