use std::collections::HashMap;
use std::fmt;

use crate::grouping::ObservationGroup;
use crate::models::{initials, Goal, Observation, Tag};
use crate::tags::{label_summary, summarize, TagFilter, TagSummaryItem};
use crate::visibility::{EntryState, GroupToggle, VisibilityState};

pub const EMPTY_REPORT: &str = "No observations found for this student.";

pub const GOAL_COLORS: [&str; 8] = [
    "#4285F4", "#DB4437", "#F4B400", "#0F9D58", "#AB47BC", "#00ACC1", "#FF7043", "#5C6BC0",
];

/// Positional goal colors, rebuilt on every goal reload. The same goal can
/// land on a different color after the list changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalColors(HashMap<String, &'static str>);

impl GoalColors {
    pub fn assign(goals: &[Goal]) -> Self {
        Self(
            goals
                .iter()
                .enumerate()
                .map(|(position, goal)| {
                    (goal.goal_id.clone(), GOAL_COLORS[position % GOAL_COLORS.len()])
                })
                .collect(),
        )
    }

    pub fn get(&self, goal_id: &str) -> Option<&'static str> {
        self.0.get(goal_id).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accent {
    Goal(&'static str),
    General,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub observation_id: String,
    pub date: String,
    pub initials: String,
    pub author: String,
    pub note: String,
    pub tags: Vec<String>,
    pub accent: Accent,
    pub state: EntryState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupView {
    pub key: String,
    pub description: Option<String>,
    pub entries: Vec<EntryView>,
    pub toggle: Option<GroupToggle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportView {
    Empty,
    Groups {
        groups: Vec<GroupView>,
        summary: Vec<TagSummaryItem>,
        filter: Option<String>,
        show_hidden: bool,
    },
}

/// Everything the renderer reads, borrowed from the session.
pub struct ReportInputs<'a> {
    pub observations: &'a [Observation],
    pub groups: Vec<ObservationGroup<'a>>,
    pub tags: &'a [Tag],
    pub colors: &'a GoalColors,
    pub filter: &'a TagFilter,
    pub show_hidden: bool,
}

/// Pure projection of grouped, filtered and disclosure state into a view.
/// The tag summary always covers the full report list.
pub fn render_report(inputs: ReportInputs<'_>, visibility: &VisibilityState) -> ReportView {
    let ReportInputs {
        observations,
        groups,
        tags,
        colors,
        filter,
        show_hidden,
    } = inputs;

    if observations.is_empty() {
        return ReportView::Empty;
    }

    let summary = label_summary(&summarize(observations), tags, filter.active());
    let filtering = filter.active().is_some();
    let groups = filter
        .apply(groups)
        .iter()
        .map(|group| render_group(group, tags, colors, visibility, filtering))
        .collect();

    ReportView::Groups {
        groups,
        summary,
        filter: filter.active().map(str::to_string),
        show_hidden,
    }
}

fn render_group(
    group: &ObservationGroup<'_>,
    tags: &[Tag],
    colors: &GoalColors,
    visibility: &VisibilityState,
    filtering: bool,
) -> GroupView {
    let states = visibility.entry_states(group);
    let entries = group
        .observations
        .iter()
        .zip(states)
        .map(|(observation, state)| {
            // a tag filter shows every match, collapsed or not
            let state = match state {
                EntryState::Collapsed if filtering => EntryState::Visible,
                state => state,
            };
            render_entry(observation, group.is_general(), tags, colors, state)
        })
        .collect();

    GroupView {
        key: group.key.clone(),
        description: (!group.is_general() && !group.description.is_empty())
            .then(|| group.description.clone()),
        entries,
        toggle: if filtering {
            None
        } else {
            visibility.toggle_for(group)
        },
    }
}

fn render_entry(
    observation: &Observation,
    general: bool,
    tags: &[Tag],
    colors: &GoalColors,
    state: EntryState,
) -> EntryView {
    let accent = match observation
        .goal_id
        .as_deref()
        .and_then(|goal_id| colors.get(goal_id))
    {
        Some(color) => Accent::Goal(color),
        None if general => Accent::General,
        None => Accent::Plain,
    };

    EntryView {
        observation_id: observation.observation_id.clone(),
        date: observation.display_date(),
        initials: initials(&observation.author),
        author: observation.author.clone(),
        note: observation.note.clone(),
        tags: observation
            .tag_id_list()
            .filter_map(|tag_id| tags.iter().find(|tag| tag.tag_id == tag_id))
            .map(|tag| tag.name.clone())
            .collect(),
        accent,
        state,
    }
}

impl ReportView {
    /// Entries a reader would see, with hidden-from-report entries only when
    /// the show-hidden toggle is on.
    pub fn displayed_entries(&self) -> usize {
        match self {
            ReportView::Empty => 0,
            ReportView::Groups {
                groups,
                show_hidden,
                ..
            } => groups
                .iter()
                .flat_map(|group| group.entries.iter())
                .filter(|entry| match entry.state {
                    EntryState::Visible => true,
                    EntryState::HiddenFromReport => *show_hidden,
                    EntryState::Collapsed => false,
                })
                .count(),
        }
    }
}

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (groups, summary, filter, show_hidden) = match self {
            ReportView::Empty => return writeln!(f, "{EMPTY_REPORT}"),
            ReportView::Groups {
                groups,
                summary,
                filter,
                show_hidden,
            } => (groups, summary, filter, *show_hidden),
        };

        if !summary.is_empty() {
            let chips: Vec<String> = summary
                .iter()
                .map(|item| {
                    let marker = if item.active { "*" } else { "" };
                    format!("{marker}{} ({}) [{}]", item.name, item.count, item.tag_id)
                })
                .collect();
            writeln!(f, "Tags: {}", chips.join("  "))?;
        }
        if let Some(tag_id) = filter {
            writeln!(f, "Filtered by tag {tag_id}")?;
        }
        for group in groups {
            writeln!(f)?;
            writeln!(f, "## {}", group.key)?;
            if let Some(description) = &group.description {
                writeln!(f, "{description}")?;
            }
            for entry in &group.entries {
                let marker = match entry.state {
                    EntryState::Collapsed => continue,
                    EntryState::HiddenFromReport if !show_hidden => continue,
                    EntryState::HiddenFromReport => " [hidden]",
                    EntryState::Visible => "",
                };
                write!(f, "- {} ", entry.date)?;
                if !entry.initials.is_empty() {
                    write!(f, "({}) ", entry.initials)?;
                }
                writeln!(f, "[{}]{marker}: {}", entry.observation_id, entry.note)?;
                if !entry.tags.is_empty() {
                    writeln!(f, "  tags: {}", entry.tags.join(", "))?;
                }
            }
            if let Some(toggle) = &group.toggle {
                writeln!(f, "  [{}]", toggle.label)?;
            }
        }
        Ok(())
    }
}
