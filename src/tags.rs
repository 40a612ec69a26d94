use std::collections::HashMap;

use crate::grouping::ObservationGroup;
use crate::models::{Observation, Tag, TagCount};

/// Tags shown in the chip strip before the "Show All" control.
pub const DEFAULT_VISIBLE_TAGS: usize = 3;

/// Occurrence count per tag id in first-seen order. Ids missing from the
/// tag table are still counted.
pub fn summarize<'a, I>(observations: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<TagCount> = Vec::new();

    for observation in observations {
        for tag_id in observation.tag_id_list() {
            match index.get(tag_id) {
                Some(&slot) => counts[slot].count += 1,
                None => {
                    index.insert(tag_id, counts.len());
                    counts.push(TagCount {
                        tag_id: tag_id.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    counts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSummaryItem {
    pub tag_id: String,
    pub name: String,
    pub count: usize,
    pub active: bool,
}

/// Pairs counts with tag names. Unknown ids are skipped without touching
/// the other counts.
pub fn label_summary(counts: &[TagCount], tags: &[Tag], active: Option<&str>) -> Vec<TagSummaryItem> {
    counts
        .iter()
        .filter_map(|count| {
            let tag = tags.iter().find(|tag| tag.tag_id == count.tag_id)?;
            Some(TagSummaryItem {
                tag_id: count.tag_id.clone(),
                name: tag.name.clone(),
                count: count.count,
                active: active == Some(count.tag_id.as_str()),
            })
        })
        .collect()
}

/// Keeps groups with at least one member carrying `tag_id`, narrowed to
/// those members. Groups without a match are dropped entirely.
pub fn filter_by_tag<'a>(
    groups: &[ObservationGroup<'a>],
    tag_id: &str,
) -> Vec<ObservationGroup<'a>> {
    groups
        .iter()
        .filter_map(|group| {
            let members: Vec<&'a Observation> = group
                .observations
                .iter()
                .copied()
                .filter(|observation| observation.has_tag(tag_id))
                .collect();
            (!members.is_empty()).then(|| ObservationGroup {
                key: group.key.clone(),
                description: group.description.clone(),
                observations: members,
            })
        })
        .collect()
}

/// The single active tag filter of the report, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    active: Option<String>,
}

impl TagFilter {
    pub fn select(&mut self, tag_id: &str) {
        self.active = Some(tag_id.to_string());
    }

    pub fn reset(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn apply<'a>(&self, groups: Vec<ObservationGroup<'a>>) -> Vec<ObservationGroup<'a>> {
        match &self.active {
            Some(tag_id) => filter_by_tag(&groups, tag_id),
            None => groups,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChip {
    pub tag_id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagChips {
    pub chips: Vec<TagChip>,
    /// Total tag count for the "Show All N" control when the strip is cut.
    pub show_all: Option<usize>,
}

/// Chip strip for tagging a new note, in backend order.
pub fn tag_chips(tags: &[Tag], selected: &[String], show_all: bool) -> TagChips {
    let limit = if show_all { tags.len() } else { DEFAULT_VISIBLE_TAGS };
    let chips = tags
        .iter()
        .take(limit)
        .map(|tag| TagChip {
            tag_id: tag.tag_id.clone(),
            name: tag.name.clone(),
            selected: selected.contains(&tag.tag_id),
        })
        .collect();

    TagChips {
        chips,
        show_all: (!show_all && tags.len() > DEFAULT_VISIBLE_TAGS).then_some(tags.len()),
    }
}
