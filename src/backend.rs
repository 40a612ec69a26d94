use std::future::Future;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{BackendError, UNKNOWN_API_ERROR};
use crate::models::{Goal, Observation, SortOrder, Student, Tag};

const SUCCESS: &str = "SUCCESS";

/// The fixed request vocabulary of the tracker backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    GetInitialData,
    GetDataForStudent,
    SaveObservation,
    DeleteObservation,
    SaveStudentRecord,
    SaveGoalRecord,
    SaveNewTag,
    UpdateHiddenStatus,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetInitialData => "getInitialData",
            Action::GetDataForStudent => "getDataForStudent",
            Action::SaveObservation => "saveObservation",
            Action::DeleteObservation => "deleteObservation",
            Action::SaveStudentRecord => "saveStudentRecord",
            Action::SaveGoalRecord => "saveGoalRecord",
            Action::SaveNewTag => "saveNewTag",
            Action::UpdateHiddenStatus => "updateHiddenStatus",
        }
    }
}

/// One request, one response. Failures surface the server's message as-is.
pub trait Backend {
    fn request(
        &self,
        action: Action,
        payload: Value,
    ) -> impl Future<Output = Result<Value, BackendError>> + Send;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    fn into_result(self) -> Result<Value, BackendError> {
        if self.status == SUCCESS {
            Ok(self.data)
        } else {
            Err(BackendError::Api(
                self.message
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string()),
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    id_token: Option<String>,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>, id_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            id_token,
        }
    }
}

impl Backend for HttpBackend {
    async fn request(&self, action: Action, payload: Value) -> Result<Value, BackendError> {
        tracing::debug!(action = action.as_str(), "backend request");
        let body = json!({ "action": action, "payload": payload });

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body.to_string());
        if let Some(token) = &self.id_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.inspect_err(|err| {
            tracing::warn!(action = action.as_str(), error = %err, "backend unreachable");
        })?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(action = action.as_str(), %status, "backend returned an error status");
            return Err(BackendError::Api(format!("{status}: {text}")));
        }

        let envelope: Envelope = serde_json::from_str(&text)?;
        envelope.into_result().inspect_err(|err| {
            tracing::warn!(action = action.as_str(), error = %err, "backend rejected request");
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InitialData {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StudentData {
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(rename = "reportData", default)]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewObservation {
    pub student_id: String,
    /// Empty when the note is not attached to a goal.
    pub goal_id: String,
    pub observation_note: String,
    pub teacher_email: String,
    pub tag_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedStudent {
    #[serde(default)]
    pub message: String,
    pub student: Student,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTag {
    pub tag_name: String,
    pub tag_description: String,
}

async fn call<B, T>(backend: &B, action: Action, payload: Value) -> Result<T, BackendError>
where
    B: Backend,
    T: DeserializeOwned,
{
    let data = backend.request(action, payload).await?;
    Ok(serde_json::from_value(data)?)
}

pub async fn fetch_initial_data<B: Backend>(
    backend: &B,
    sort: SortOrder,
) -> Result<InitialData, BackendError> {
    call(backend, Action::GetInitialData, json!({ "sortBy": sort })).await
}

pub async fn fetch_student_data<B: Backend>(
    backend: &B,
    student_id: &str,
) -> Result<StudentData, BackendError> {
    call(
        backend,
        Action::GetDataForStudent,
        json!({ "studentId": student_id }),
    )
    .await
}

pub async fn save_observation<B: Backend>(
    backend: &B,
    observation: &NewObservation,
) -> Result<(), BackendError> {
    backend
        .request(Action::SaveObservation, serde_json::to_value(observation)?)
        .await?;
    Ok(())
}

pub async fn delete_observation<B: Backend>(
    backend: &B,
    observation_id: &str,
) -> Result<(), BackendError> {
    backend
        .request(
            Action::DeleteObservation,
            json!({ "observationId": observation_id }),
        )
        .await?;
    Ok(())
}

pub async fn set_hidden<B: Backend>(
    backend: &B,
    observation_id: &str,
    hidden: bool,
) -> Result<(), BackendError> {
    backend
        .request(
            Action::UpdateHiddenStatus,
            json!({ "observationId": observation_id, "isHidden": hidden }),
        )
        .await?;
    Ok(())
}

pub async fn save_student<B: Backend>(
    backend: &B,
    student: &Student,
) -> Result<SavedStudent, BackendError> {
    call(
        backend,
        Action::SaveStudentRecord,
        serde_json::to_value(student)?,
    )
    .await
}

pub async fn save_goal<B: Backend>(backend: &B, goal: &Goal) -> Result<(), BackendError> {
    backend
        .request(Action::SaveGoalRecord, serde_json::to_value(goal)?)
        .await?;
    Ok(())
}

pub async fn save_tag<B: Backend>(backend: &B, tag: &NewTag) -> Result<Tag, BackendError> {
    call(backend, Action::SaveNewTag, serde_json::to_value(tag)?).await
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory stand-in recording every request it receives.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        responses: Mutex<HashMap<Action, Result<Value, String>>>,
        pub(crate) calls: Mutex<Vec<(Action, Value)>>,
    }

    impl FakeBackend {
        pub(crate) fn respond(&self, action: Action, data: Value) {
            self.responses.lock().unwrap().insert(action, Ok(data));
        }

        pub(crate) fn fail(&self, action: Action, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(action, Err(message.to_string()));
        }

        pub(crate) fn actions(&self) -> Vec<Action> {
            self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
        }

        pub(crate) fn last_payload(&self, action: Action) -> Option<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(a, _)| *a == action)
                .map(|(_, payload)| payload.clone())
        }
    }

    impl Backend for FakeBackend {
        async fn request(&self, action: Action, payload: Value) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push((action, payload));
            let response = self.responses.lock().unwrap().get(&action).cloned();
            match response {
                Some(Ok(data)) => Ok(data),
                Some(Err(message)) => Err(BackendError::Api(message)),
                None => Ok(Value::Null),
            }
        }
    }

    #[test]
    fn envelope_success_yields_data() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "status": "SUCCESS", "data": { "ok": 1 } })).unwrap();
        assert_eq!(envelope.into_result().unwrap(), json!({ "ok": 1 }));
    }

    #[test]
    fn envelope_error_keeps_message_verbatim() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "status": "ERROR", "message": "Sheet locked" }))
                .unwrap();
        assert_eq!(envelope.into_result().unwrap_err().to_string(), "Sheet locked");

        let envelope: Envelope = serde_json::from_value(json!({ "status": "ERROR" })).unwrap();
        assert_eq!(
            envelope.into_result().unwrap_err().to_string(),
            UNKNOWN_API_ERROR
        );
    }

    #[test]
    fn action_names_match_wire_format() {
        for action in [
            Action::GetInitialData,
            Action::GetDataForStudent,
            Action::SaveObservation,
            Action::DeleteObservation,
            Action::SaveStudentRecord,
            Action::SaveGoalRecord,
            Action::SaveNewTag,
            Action::UpdateHiddenStatus,
        ] {
            assert_eq!(serde_json::to_value(action).unwrap(), json!(action.as_str()));
        }
    }

    #[tokio::test]
    async fn typed_calls_shape_payloads() {
        let backend = FakeBackend::default();
        backend.respond(
            Action::GetDataForStudent,
            json!({
                "goals": [{ "GoalID": "G1", "StudentID": "S1", "GoalTitle": "Reading", "Active": true }],
                "reportData": [{ "ObservationID": "O1", "GoalID": "G1", "GoalTitle": "Reading",
                                 "Timestamp": "2024-01-02T09:00:00Z", "TagIDs": "t1" }]
            }),
        );

        let data = fetch_student_data(&backend, "S1").await.unwrap();
        assert_eq!(data.goals.len(), 1);
        assert_eq!(data.observations[0].goal_id.as_deref(), Some("G1"));
        assert_eq!(
            backend.last_payload(Action::GetDataForStudent),
            Some(json!({ "studentId": "S1" }))
        );

        set_hidden(&backend, "O1", true).await.unwrap();
        assert_eq!(
            backend.last_payload(Action::UpdateHiddenStatus),
            Some(json!({ "observationId": "O1", "isHidden": true }))
        );

        backend.respond(Action::GetInitialData, json!({ "students": [], "tags": [] }));
        fetch_initial_data(&backend, SortOrder::Alphabetical)
            .await
            .unwrap();
        assert_eq!(
            backend.last_payload(Action::GetInitialData),
            Some(json!({ "sortBy": "alphabetical" }))
        );
    }

    #[tokio::test]
    async fn spreadsheet_dates_keep_the_rest_of_the_report() {
        let backend = FakeBackend::default();
        backend.respond(
            Action::GetDataForStudent,
            json!({
                "goals": [],
                "reportData": [
                    { "ObservationID": "O1", "Timestamp": "2024-01-02T09:00:00Z" },
                    { "ObservationID": "O2", "Timestamp": "1/3/2024 10:00:00" },
                    { "ObservationID": "O3", "Timestamp": "" }
                ]
            }),
        );

        let data = fetch_student_data(&backend, "S1").await.unwrap();

        let dates: Vec<String> = data.observations.iter().map(|o| o.display_date()).collect();
        assert_eq!(dates, ["1/2/2024", "1/3/2024", ""]);
    }

    #[tokio::test]
    async fn backend_failure_surfaces_message() {
        let backend = FakeBackend::default();
        backend.fail(Action::SaveNewTag, "Tag already exists");

        let err = save_tag(
            &backend,
            &NewTag {
                tag_name: "Focus".to_string(),
                tag_description: String::new(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Tag already exists");
    }
}
