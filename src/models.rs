use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "StudentID", default, deserialize_with = "lenient::string")]
    pub student_id: String,
    #[serde(rename = "FirstName", default, deserialize_with = "lenient::string")]
    pub first_name: String,
    #[serde(rename = "LastName", default, deserialize_with = "lenient::string")]
    pub last_name: String,
    #[serde(rename = "GradeLevel", default, deserialize_with = "lenient::string")]
    pub grade_level: String,
    #[serde(rename = "Active", default, deserialize_with = "lenient::flag")]
    pub active: bool,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(rename = "GoalID", default, deserialize_with = "lenient::string")]
    pub goal_id: String,
    #[serde(rename = "StudentID", default, deserialize_with = "lenient::string")]
    pub student_id: String,
    #[serde(rename = "GoalTitle", default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(rename = "GoalDescription", default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(rename = "GoalCategory", default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(rename = "Active", default, deserialize_with = "lenient::flag")]
    pub active: bool,
}

/// Tags are global to the account, not owned by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "TagID", default, deserialize_with = "lenient::string")]
    pub tag_id: String,
    #[serde(rename = "TagName", default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(rename = "TagDescription", default, deserialize_with = "lenient::string")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "ObservationID", default, deserialize_with = "lenient::string")]
    pub observation_id: String,
    #[serde(rename = "StudentID", default, deserialize_with = "lenient::string")]
    pub student_id: String,
    #[serde(rename = "GoalID", default, deserialize_with = "lenient::optional_id")]
    pub goal_id: Option<String>,
    #[serde(rename = "GoalTitle", default, deserialize_with = "lenient::string")]
    pub goal_title: String,
    #[serde(rename = "GoalDescription", default, deserialize_with = "lenient::string")]
    pub goal_description: String,
    #[serde(rename = "ObservationNote", default, deserialize_with = "lenient::string")]
    pub note: String,
    /// `None` when the cell is blank or in a format we cannot read.
    #[serde(rename = "Timestamp", default, deserialize_with = "lenient::timestamp")]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(rename = "TeacherEmail", default, deserialize_with = "lenient::string")]
    pub author: String,
    /// Comma-joined tag ids exactly as stored by the backend.
    #[serde(rename = "TagIDs", default, deserialize_with = "lenient::string")]
    pub tag_ids: String,
    #[serde(rename = "HiddenFromReport", default, deserialize_with = "lenient::flag")]
    pub hidden_from_report: bool,
}

impl Observation {
    /// Non-empty members of the tag-id list, in stored order. Duplicates are kept.
    pub fn tag_id_list(&self) -> impl Iterator<Item = &str> {
        self.tag_ids.split(',').filter(|id| !id.is_empty())
    }

    /// Element-wise match against the split list; `"1"` does not match `"12"`.
    pub fn has_tag(&self, tag_id: &str) -> bool {
        self.tag_ids.split(',').any(|id| id == tag_id)
    }

    /// `M/D/YYYY`, taken from the wall-clock date the backend recorded.
    /// Empty when the timestamp could not be read.
    pub fn display_date(&self) -> String {
        self.timestamp.as_ref().map(format_date).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    LastUpdated,
    Alphabetical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag_id: String,
    pub count: usize,
}

pub fn format_date(timestamp: &NaiveDateTime) -> String {
    format!(
        "{}/{}/{}",
        timestamp.month(),
        timestamp.day(),
        timestamp.year()
    )
}

/// Initials from an email-like author id: `jane.doe@x.com` is `JD`,
/// `bob@x.com` is `BO`.
pub fn initials(author: &str) -> String {
    let local = author.split('@').next().unwrap_or_default();
    let tokens: Vec<&str> = local
        .split(['.', '_', ' '])
        .filter(|token| !token.is_empty())
        .collect();

    match tokens.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(2).collect::<String>().to_uppercase(),
        many => many
            .iter()
            .filter_map(|token| token.chars().next())
            .collect::<String>()
            .to_uppercase(),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    for pattern in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(parsed);
        }
    }
    ["%Y-%m-%d", "%m/%d/%Y"]
        .into_iter()
        .find_map(|pattern| NaiveDate::parse_from_str(raw, pattern).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Spreadsheet-backed responses are loosely typed: ids arrive as numbers,
/// flags as `"TRUE"`, blank cells as `""` or `null`.
mod lenient {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => String::new(),
            Value::String(value) => value,
            Value::Number(value) => value.to_string(),
            Value::Bool(value) => value.to_string(),
            other => other.to_string(),
        })
    }

    pub fn optional_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = string(deserializer)?;
        let value = value.trim();
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(value) => value,
            Value::String(value) => value.trim().eq_ignore_ascii_case("true"),
            Value::Number(value) => value.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        })
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = string(deserializer)?;
        let parsed = super::parse_timestamp(&raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            tracing::warn!(timestamp = %raw, "unreadable observation timestamp");
        }
        Ok(parsed)
    }
}
