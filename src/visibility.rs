use std::collections::HashSet;
use std::ops::Deref;

use crate::grouping::ObservationGroup;

/// Non-hidden entries shown in a group before the rest collapse.
pub const COLLAPSE_THRESHOLD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Visible,
    Collapsed,
    /// Persisted exclusion; rendered with a marker so it can be un-hidden.
    HiddenFromReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupToggle {
    pub label: String,
    pub expanded: bool,
}

/// Transient progressive-disclosure state of one displayed report. A fresh
/// value means every group starts collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityState {
    expanded: HashSet<String>,
    export_override: bool,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.expanded.clear();
        self.export_override = false;
    }

    /// Flips one group between collapsed and fully expanded. Returns the new
    /// expanded flag.
    pub fn toggle(&mut self, group_key: &str) -> bool {
        if self.expanded.remove(group_key) {
            false
        } else {
            self.expanded.insert(group_key.to_string());
            true
        }
    }

    pub fn is_expanded(&self, group_key: &str) -> bool {
        self.is_overridden() || self.expanded.contains(group_key)
    }

    pub fn is_overridden(&self) -> bool {
        self.export_override
    }

    /// Display state per member of `group`, in member order. Only non-hidden
    /// entries count toward the threshold.
    pub fn entry_states(&self, group: &ObservationGroup<'_>) -> Vec<EntryState> {
        let expanded = self.is_expanded(&group.key);
        let mut shown = 0usize;

        group
            .observations
            .iter()
            .map(|observation| {
                if observation.hidden_from_report {
                    return EntryState::HiddenFromReport;
                }
                shown += 1;
                if shown <= COLLAPSE_THRESHOLD || expanded {
                    EntryState::Visible
                } else {
                    EntryState::Collapsed
                }
            })
            .collect()
    }

    /// Toggle control for groups with more non-hidden entries than the
    /// threshold. Suppressed while an export override is active.
    pub fn toggle_for(&self, group: &ObservationGroup<'_>) -> Option<GroupToggle> {
        if self.is_overridden() {
            return None;
        }
        let total = group.non_hidden_count();
        if total <= COLLAPSE_THRESHOLD {
            return None;
        }

        let expanded = self.expanded.contains(&group.key);
        Some(GroupToggle {
            label: toggle_label(total, expanded),
            expanded,
        })
    }

    /// Forces every entry visible and every toggle hidden until the guard
    /// drops, whichever way the export ends.
    pub fn export_override(&mut self) -> ExportOverride<'_> {
        let previous = self.export_override;
        self.export_override = true;
        tracing::debug!("export visibility override applied");
        ExportOverride {
            state: self,
            previous,
        }
    }
}

pub fn toggle_label(total: usize, expanded: bool) -> String {
    if expanded {
        "Show Less".to_string()
    } else {
        format!(
            "Show All {} Entries ({} more)",
            total,
            total.saturating_sub(COLLAPSE_THRESHOLD)
        )
    }
}

pub struct ExportOverride<'a> {
    state: &'a mut VisibilityState,
    previous: bool,
}

impl Deref for ExportOverride<'_> {
    type Target = VisibilityState;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl Drop for ExportOverride<'_> {
    fn drop(&mut self) {
        self.state.export_override = self.previous;
        tracing::debug!("export visibility override restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_by_goal;
    use crate::grouping::tests::observation;
    use crate::models::Observation;

    fn reading(count: usize) -> Vec<Observation> {
        (0..count)
            .map(|i| observation(&i.to_string(), Some("Reading"), "2024-01-01"))
            .collect()
    }

    fn visible(states: &[EntryState]) -> usize {
        states
            .iter()
            .filter(|state| **state == EntryState::Visible)
            .count()
    }

    #[test]
    fn six_entries_show_four_until_expanded() {
        let observations = reading(6);
        let groups = group_by_goal(&observations);
        let mut state = VisibilityState::new();

        assert_eq!(visible(&state.entry_states(&groups[0])), 4);
        let toggle = state.toggle_for(&groups[0]).unwrap();
        assert_eq!(toggle.label, "Show All 6 Entries (2 more)");
        assert!(!toggle.expanded);

        assert!(state.toggle("Reading"));
        assert_eq!(visible(&state.entry_states(&groups[0])), 6);
        assert_eq!(state.toggle_for(&groups[0]).unwrap().label, "Show Less");

        assert!(!state.toggle("Reading"));
        assert_eq!(state, VisibilityState::new());
        assert_eq!(visible(&state.entry_states(&groups[0])), 4);
    }

    #[test]
    fn hidden_entries_do_not_count_toward_threshold() {
        let mut observations = reading(7);
        observations[0].hidden_from_report = true;
        observations[2].hidden_from_report = true;
        let groups = group_by_goal(&observations);
        let state = VisibilityState::new();

        let states = state.entry_states(&groups[0]);
        assert_eq!(
            states,
            [
                EntryState::HiddenFromReport,
                EntryState::Visible,
                EntryState::HiddenFromReport,
                EntryState::Visible,
                EntryState::Visible,
                EntryState::Visible,
                EntryState::Collapsed,
            ]
        );
        assert_eq!(
            state.toggle_for(&groups[0]).unwrap().label,
            "Show All 5 Entries (1 more)"
        );
    }

    #[test]
    fn no_toggle_at_or_below_threshold() {
        let mut observations = reading(6);
        observations[4].hidden_from_report = true;
        observations[5].hidden_from_report = true;
        let groups = group_by_goal(&observations);

        assert!(VisibilityState::new().toggle_for(&groups[0]).is_none());
    }

    #[test]
    fn toggling_one_group_leaves_others_collapsed() {
        let mut observations = reading(5);
        observations.extend(
            (10..15).map(|i| observation(&i.to_string(), Some("Math"), "2024-01-01")),
        );
        let groups = group_by_goal(&observations);
        let mut state = VisibilityState::new();

        state.toggle("Reading");

        let math = groups.iter().find(|group| group.key == "Math").unwrap();
        let reading = groups.iter().find(|group| group.key == "Reading").unwrap();
        assert_eq!(visible(&state.entry_states(math)), 4);
        assert_eq!(visible(&state.entry_states(reading)), 5);
    }

    #[test]
    fn export_override_is_restored_on_drop() {
        let observations = reading(9);
        let groups = group_by_goal(&observations);
        let mut state = VisibilityState::new();

        {
            let forced = state.export_override();
            assert_eq!(visible(&forced.entry_states(&groups[0])), 9);
            assert!(forced.toggle_for(&groups[0]).is_none());
        }

        assert!(!state.is_overridden());
        assert_eq!(visible(&state.entry_states(&groups[0])), 4);
        assert!(state.toggle_for(&groups[0]).is_some());
    }
}
