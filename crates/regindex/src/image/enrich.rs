//! Derived fields of an image record.

use chrono::{DateTime, Utc};

use super::age::{CalendarDelta, UNKNOWN_AGE};
use super::readme::render_readme;
use super::revision::assign_revision_colors;
use super::size::human_bytes;
use super::time::format_human;
use super::ContainerImage;

/// Compute every derived field of `image` relative to `now`.
pub fn enrich(image: &mut ContainerImage, now: DateTime<Utc>) {
    summarize(image, now);
    assign_revision_colors(&mut image.tags);
}

/// Size, freshness and age fields.
///
/// Tags are visited in name order and the first tag holding the newest
/// `created_at` wins, so the result is stable across cycles.
pub fn summarize(image: &mut ContainerImage, now: DateTime<Utc>) {
    let mut size = 0u64;
    let mut newest: Option<(DateTime<Utc>, &str)> = None;

    for tag in image.tags.values_mut() {
        size = size.saturating_add(tag.total_size);
        tag.total_size_human_readable = human_bytes(tag.total_size);
        tag.created_at_human_readable = tag.created_at.as_ref().map(format_human).unwrap_or_default();
    }

    for tag in image.tags.values() {
        if let Some(created_at) = tag.created_at
            && newest.is_none_or(|(current, _)| current < created_at)
        {
            newest = Some((created_at, tag.name.as_str()));
        }
    }

    let last_update = newest.map(|(ts, _)| ts);
    let last_update_tag = newest.map(|(_, name)| name.to_string());
    let age = last_update.map(|ts| CalendarDelta::between(now, ts));

    image.size = size;
    image.size_human_readable = human_bytes(size);
    image.last_update = last_update;
    image.tag = last_update_tag.clone();
    image.last_update_tag = last_update_tag;
    image.age_human_readable = age
        .map(|a| a.humanize())
        .unwrap_or_else(|| UNKNOWN_AGE.to_string());
    image.created = age.map(|a| a.subtract_from(now));
    image.age = age;
}

/// Store the README source and its rendered HTML.
pub fn attach_readme(image: &mut ContainerImage, markdown: String) {
    image.readme_html = Some(render_readme(&markdown));
    image.readme_md = Some(markdown);
}
