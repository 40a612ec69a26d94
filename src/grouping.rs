use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::Observation;

pub const GENERAL_NOTES: &str = "General Notes";

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationGroup<'a> {
    pub key: String,
    pub description: String,
    pub observations: Vec<&'a Observation>,
}

impl ObservationGroup<'_> {
    pub fn is_general(&self) -> bool {
        self.key == GENERAL_NOTES
    }

    pub fn non_hidden_count(&self) -> usize {
        self.observations
            .iter()
            .filter(|observation| !observation.hidden_from_report)
            .count()
    }
}

/// Goal title when the observation carries both a goal id and a title,
/// otherwise the General Notes bucket.
pub fn group_key(observation: &Observation) -> &str {
    match (&observation.goal_id, observation.goal_title.is_empty()) {
        (Some(_), false) => observation.goal_title.as_str(),
        _ => GENERAL_NOTES,
    }
}

/// Partitions observations by goal. Members keep input order; groups sort
/// alphabetically with General Notes last.
pub fn group_by_goal<'a, I>(observations: I) -> Vec<ObservationGroup<'a>>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<ObservationGroup<'a>> = Vec::new();

    for observation in observations {
        let key = group_key(observation);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(ObservationGroup {
                key: key.to_string(),
                description: String::new(),
                observations: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        if group.description.is_empty() && !observation.goal_description.is_empty() {
            group.description = observation.goal_description.clone();
        }
        group.observations.push(observation);
    }

    groups.sort_by(|a, b| compare_keys(&a.key, &b.key));
    groups
}

pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a == GENERAL_NOTES, b == GENERAL_NOTES) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b)),
    }
}
