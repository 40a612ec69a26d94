use std::fmt::Write;

use crate::grouping::ObservationGroup;
use crate::models::{initials, Observation, Student};

pub const NOTHING_VISIBLE: &str = "No visible content to copy.";

pub fn has_visible_content(observations: &[Observation]) -> bool {
    observations
        .iter()
        .any(|observation| !observation.hidden_from_report)
}

/// Plain-text transcript of the report. Hidden observations are left out
/// and each group is listed oldest first; ties keep their input order.
/// Entries without a readable timestamp come first with a blank date.
pub fn to_plain_text(student: &Student, groups: &[ObservationGroup<'_>]) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "Report for {} {}",
        student.first_name, student.last_name
    );
    let _ = writeln!(output);

    for group in groups {
        let mut entries: Vec<&Observation> = group
            .observations
            .iter()
            .copied()
            .filter(|observation| !observation.hidden_from_report)
            .collect();
        if entries.is_empty() {
            continue;
        }
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let _ = writeln!(output, "--- {} ---", group.key);
        if !group.description.is_empty() {
            let _ = writeln!(output, "Description: {}", group.description);
        }
        for observation in entries {
            let _ = writeln!(
                output,
                "  Date: {} ({})",
                observation.display_date(),
                initials(&observation.author)
            );
            let _ = writeln!(output, "  Observation: {}", observation.note);
            let _ = writeln!(output);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::group_by_goal;
    use crate::grouping::tests::observation;

    fn student() -> Student {
        Student {
            student_id: "S1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            grade_level: "4".to_string(),
            active: true,
        }
    }

    #[test]
    fn lists_entries_oldest_first_per_group() {
        let mut observations = vec![
            observation("1", Some("Reading"), "2024-01-02"),
            observation("2", Some("Reading"), "2024-01-01"),
            observation("3", None, "2024-01-03"),
        ];
        observations[1].goal_description = "Fluency".to_string();
        observations[2].author = "bob@school.org".to_string();

        let text = to_plain_text(&student(), &group_by_goal(&observations));

        assert_eq!(
            text,
            "Report for Ada Lovelace\n\
             \n\
             --- Reading ---\n\
             Description: Fluency\n\
             \x20 Date: 1/1/2024 (JD)\n\
             \x20 Observation: note 2\n\
             \n\
             \x20 Date: 1/2/2024 (JD)\n\
             \x20 Observation: note 1\n\
             \n\
             --- General Notes ---\n\
             \x20 Date: 1/3/2024 (BO)\n\
             \x20 Observation: note 3\n\
             \n"
        );
    }

    #[test]
    fn hidden_observations_are_excluded() {
        let mut observations = vec![
            observation("1", Some("Reading"), "2024-01-02"),
            observation("2", Some("Math"), "2024-01-01"),
        ];
        observations[1].hidden_from_report = true;

        let text = to_plain_text(&student(), &group_by_goal(&observations));

        assert!(text.contains("--- Reading ---"));
        assert!(!text.contains("Math"));
        assert!(has_visible_content(&observations));

        observations[0].hidden_from_report = true;
        assert!(!has_visible_content(&observations));
    }

    #[test]
    fn timestamp_ties_are_deterministic() {
        let observations: Vec<Observation> = (0..6)
            .map(|i| observation(&i.to_string(), Some("Reading"), "2024-05-05"))
            .collect();

        let first = to_plain_text(&student(), &group_by_goal(&observations));
        let second = to_plain_text(&student(), &group_by_goal(&observations));

        assert_eq!(first, second);
        let positions: Vec<usize> = (0..6)
            .map(|i| first.find(&format!("note {i}\n")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn undated_entries_lead_their_group() {
        let observations = vec![
            observation("1", Some("Reading"), "2024-01-02"),
            observation("2", Some("Reading"), ""),
            observation("3", Some("Reading"), "2024-01-01"),
        ];

        let text = to_plain_text(&student(), &group_by_goal(&observations));

        let undated = text.find("  Date:  (JD)\n  Observation: note 2").unwrap();
        let oldest = text.find("note 3").unwrap();
        let newest = text.find("note 1").unwrap();
        assert!(undated < oldest && oldest < newest);
    }
}
