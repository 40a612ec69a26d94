use chrono::NaiveDate;

use crate::backend::{self, Backend, NewObservation, NewTag, SavedStudent};
use crate::error::SessionError;
use crate::export::pagination::PageLayout;
use crate::export::pdf::FontConfig;
use crate::export::{export_to_document, has_visible_content, to_plain_text, ExportedDocument, Rasterizer};
use crate::grouping::group_by_goal;
use crate::models::{Goal, Observation, SortOrder, Student, Tag};
use crate::render::{render_report, GoalColors, ReportInputs, ReportView};
use crate::tags::{tag_chips, TagChips, TagFilter};
use crate::visibility::VisibilityState;

/// Client-side state for one signed-in teacher. Single writer: every
/// mutation goes through `&mut self`, and a failed backend call returns
/// before anything is replaced.
pub struct Session<B> {
    backend: B,
    students: Vec<Student>,
    tags: Vec<Tag>,
    selected_student: Option<Student>,
    goals: Vec<Goal>,
    goal_colors: GoalColors,
    selected_goal: Option<String>,
    observations: Vec<Observation>,
    visibility: VisibilityState,
    filter: TagFilter,
    show_hidden: bool,
    sort_order: SortOrder,
    show_inactive: bool,
    selected_tag_ids: Vec<String>,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            students: Vec::new(),
            tags: Vec::new(),
            selected_student: None,
            goals: Vec::new(),
            goal_colors: GoalColors::default(),
            selected_goal: None,
            observations: Vec::new(),
            visibility: VisibilityState::new(),
            filter: TagFilter::default(),
            show_hidden: false,
            sort_order: SortOrder::default(),
            show_inactive: false,
            selected_tag_ids: Vec::new(),
        }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn selected_student(&self) -> Option<&Student> {
        self.selected_student.as_ref()
    }

    pub fn selected_goal(&self) -> Option<&Goal> {
        let goal_id = self.selected_goal.as_deref()?;
        self.goals.iter().find(|goal| goal.goal_id == goal_id)
    }

    #[cfg(test)]
    pub fn goal_colors(&self) -> &GoalColors {
        &self.goal_colors
    }

    pub async fn load_initial_data(&mut self) -> Result<(), SessionError> {
        let data = backend::fetch_initial_data(&self.backend, self.sort_order).await?;
        tracing::info!(
            students = data.students.len(),
            tags = data.tags.len(),
            "initial data loaded"
        );
        self.students = data.students;
        self.tags = data.tags;
        Ok(())
    }

    /// Reloads the roster when the order actually changes. Returns whether
    /// a reload happened; the current selection is dropped with it.
    pub async fn set_sort_order(&mut self, order: SortOrder) -> Result<bool, SessionError> {
        if self.sort_order == order {
            return Ok(false);
        }
        let data = backend::fetch_initial_data(&self.backend, order).await?;
        self.sort_order = order;
        self.students = data.students;
        self.tags = data.tags;
        self.clear_selection();
        Ok(true)
    }

    pub fn set_show_inactive(&mut self, show: bool) {
        self.show_inactive = show;
    }

    /// Case-insensitive match on "First Last". Inactive students only show
    /// up when the show-inactive toggle is on.
    pub fn search_students(&self, text: &str) -> Vec<&Student> {
        let needle = text.trim().to_lowercase();
        self.students
            .iter()
            .filter(|student| self.show_inactive || student.active)
            .filter(|student| {
                needle.is_empty() || student.full_name().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Resolves a student by id, or by full name ignoring case.
    pub fn find_student(&self, query: &str) -> Option<&Student> {
        let query = query.trim();
        self.students
            .iter()
            .find(|student| student.student_id == query)
            .or_else(|| {
                self.students
                    .iter()
                    .find(|student| student.full_name().eq_ignore_ascii_case(query))
            })
    }

    pub async fn select_student(&mut self, student_id: &str) -> Result<(), SessionError> {
        let student = self
            .students
            .iter()
            .find(|student| student.student_id == student_id)
            .cloned()
            .ok_or_else(|| SessionError::StudentNotFound(student_id.to_string()))?;

        let data = backend::fetch_student_data(&self.backend, &student.student_id).await?;
        tracing::info!(
            student = %student.full_name(),
            goals = data.goals.len(),
            observations = data.observations.len(),
            "student report loaded"
        );

        self.goal_colors = GoalColors::assign(&data.goals);
        self.goals = data.goals;
        self.observations = data.observations;
        self.selected_student = Some(student);
        self.selected_goal = None;
        self.visibility.reset();
        self.filter.reset();
        self.show_hidden = false;
        Ok(())
    }

    async fn reload_student(&mut self) -> Result<(), SessionError> {
        let student_id = self
            .selected_student
            .as_ref()
            .map(|student| student.student_id.clone())
            .ok_or(SessionError::NoStudentSelected)?;
        self.select_student(&student_id).await
    }

    fn clear_selection(&mut self) {
        self.selected_student = None;
        self.selected_goal = None;
        self.goals.clear();
        self.goal_colors = GoalColors::default();
        self.observations.clear();
        self.visibility.reset();
        self.filter.reset();
        self.show_hidden = false;
    }

    /// Selecting the already selected goal clears the selection.
    pub fn select_goal(&mut self, goal_id: &str) -> Option<&Goal> {
        if self.selected_goal.as_deref() == Some(goal_id) {
            self.selected_goal = None;
        } else if self.goals.iter().any(|goal| goal.goal_id == goal_id) {
            self.selected_goal = Some(goal_id.to_string());
        }
        self.selected_goal()
    }

    /// Toggles a tag for the next note. Returns whether it is now selected.
    pub fn toggle_tag_selection(&mut self, tag_id: &str) -> bool {
        if let Some(position) = self.selected_tag_ids.iter().position(|id| id == tag_id) {
            self.selected_tag_ids.remove(position);
            false
        } else {
            self.selected_tag_ids.push(tag_id.to_string());
            true
        }
    }

    pub fn tag_chips(&self, show_all: bool) -> TagChips {
        tag_chips(&self.tags, &self.selected_tag_ids, show_all)
    }

    /// Saves a note for the selected student under the selected goal and
    /// tags. A blank note is ignored and returns `false`.
    pub async fn submit_observation(
        &mut self,
        note: &str,
        author: &str,
    ) -> Result<bool, SessionError> {
        let note = note.trim();
        if note.is_empty() {
            return Ok(false);
        }
        let student = self
            .selected_student
            .as_ref()
            .ok_or(SessionError::NoStudentSelected)?;

        let observation = NewObservation {
            student_id: student.student_id.clone(),
            goal_id: self.selected_goal.clone().unwrap_or_default(),
            observation_note: note.to_string(),
            teacher_email: author.to_string(),
            tag_ids: self.selected_tag_ids.clone(),
        };
        backend::save_observation(&self.backend, &observation).await?;

        self.selected_goal = None;
        self.selected_tag_ids.clear();
        self.reload_student().await?;
        Ok(true)
    }

    pub async fn save_student(&mut self, mut student: Student) -> Result<SavedStudent, SessionError> {
        student.first_name = student.first_name.trim().to_string();
        student.last_name = student.last_name.trim().to_string();
        student.grade_level = student.grade_level.trim().to_string();
        if student.first_name.is_empty() || student.last_name.is_empty() {
            return Err(SessionError::MissingStudentName);
        }

        let saved = backend::save_student(&self.backend, &student).await?;
        tracing::info!(message = %saved.message, "student saved");
        self.load_initial_data().await?;
        if self
            .students
            .iter()
            .any(|student| student.student_id == saved.student.student_id)
        {
            self.select_student(&saved.student.student_id).await?;
        }
        Ok(saved)
    }

    pub async fn save_goal(&mut self, mut goal: Goal) -> Result<(), SessionError> {
        let student = self
            .selected_student
            .as_ref()
            .ok_or(SessionError::NoStudentSelected)?;
        goal.student_id = student.student_id.clone();
        goal.title = goal.title.trim().to_string();
        goal.description = goal.description.trim().to_string();
        if goal.title.is_empty() {
            return Err(SessionError::MissingGoalTitle);
        }

        backend::save_goal(&self.backend, &goal).await?;
        self.reload_student().await
    }

    pub async fn save_tag(&mut self, name: &str, description: &str) -> Result<Tag, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::MissingTagName);
        }
        let tag = backend::save_tag(
            &self.backend,
            &NewTag {
                tag_name: name.to_string(),
                tag_description: description.trim().to_string(),
            },
        )
        .await?;
        self.tags.push(tag.clone());
        Ok(tag)
    }

    pub async fn set_hidden(&mut self, observation_id: &str, hidden: bool) -> Result<(), SessionError> {
        backend::set_hidden(&self.backend, observation_id, hidden).await?;
        self.reload_student().await
    }

    pub async fn delete_observation(&mut self, observation_id: &str) -> Result<(), SessionError> {
        backend::delete_observation(&self.backend, observation_id).await?;
        self.reload_student().await
    }

    pub fn toggle_group(&mut self, group_key: &str) -> bool {
        self.visibility.toggle(group_key)
    }

    pub fn filter_by_tag(&mut self, tag_id: &str) {
        self.filter.select(tag_id);
    }

    /// Back to the unfiltered report with every group collapsed again.
    pub fn reset_filter(&mut self) {
        self.filter.reset();
        self.visibility.reset();
    }

    pub fn set_show_hidden(&mut self, show: bool) {
        self.show_hidden = show;
    }

    pub fn report_view(&self) -> ReportView {
        render_report(
            ReportInputs {
                observations: &self.observations,
                groups: group_by_goal(&self.observations),
                tags: &self.tags,
                colors: &self.goal_colors,
                filter: &self.filter,
                show_hidden: self.show_hidden,
            },
            &self.visibility,
        )
    }

    /// Transcript of the visible report, or `None` when every observation is
    /// hidden.
    pub fn plain_text(&self) -> Result<Option<String>, SessionError> {
        let student = self
            .selected_student
            .as_ref()
            .ok_or(SessionError::NoStudentSelected)?;
        if !has_visible_content(&self.observations) {
            return Ok(None);
        }
        let visible = self
            .observations
            .iter()
            .filter(|observation| !observation.hidden_from_report);
        Ok(Some(to_plain_text(student, &group_by_goal(visible))))
    }

    /// Snapshots the fully expanded report and lays it out as a PDF. The
    /// expansion is undone before this returns, success or not.
    pub async fn export_pdf<R: Rasterizer>(
        &mut self,
        rasterizer: &R,
        generated: NaiveDate,
        layout: &PageLayout,
        fonts: &FontConfig,
    ) -> Result<Option<ExportedDocument>, SessionError> {
        let student = self
            .selected_student
            .as_ref()
            .ok_or(SessionError::NoStudentSelected)?;
        if !has_visible_content(&self.observations) {
            return Ok(None);
        }

        let snapshot = {
            let forced = self.visibility.export_override();
            let view = render_report(
                ReportInputs {
                    observations: &self.observations,
                    groups: group_by_goal(&self.observations),
                    tags: &self.tags,
                    colors: &self.goal_colors,
                    filter: &self.filter,
                    show_hidden: false,
                },
                &forced,
            );
            tracing::info!(entries = view.displayed_entries(), "rasterizing report");
            let snapshot = rasterizer.rasterize(&view).await;
            snapshot
        };
        let snapshot = snapshot.inspect_err(|err| {
            tracing::warn!(error = %err, "report rasterization failed");
        })?;

        Ok(Some(export_to_document(
            &snapshot, student, generated, layout, fonts,
        )?))
    }
}
