//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::NaiveDateTime;
use eldercare_core::{
    alarm::AlarmPhase,
    domain::{
        ActivityTask, ActivityType, CareProfile, FamilyContact, NewTask, NoticeKind, StatusNotice,
        TaskChanges, TimeOfDay, VerificationResult,
    },
    workflow::{PhotoOutcome, TaskView, WorkflowSnapshot},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_state_handler,
        list_tasks_handler,
        create_task_handler,
        update_task_handler,
        delete_task_handler,
        history_handler,
        task_photo_handler,
        trigger_alarm_handler,
        test_alarm_handler,
        cancel_alarm_handler,
        dismiss_alarm_handler,
        submit_photo_handler,
        get_profile_handler,
        update_profile_handler,
        clear_notice_handler,
    ),
    components(
        schemas(
            ActivityType, AlarmPhase, NoticeKind, StatusNotice, VerificationResult, EvidenceDto,
            TaskDto, ActiveAlarmDto, ProfileDto, StateResponse, CreateTaskRequest,
            UpdateTaskRequest, TriggerResponse, PhotoResponse
        )
    ),
    tags(
        (name = "ElderCare Guard API", description = "Daily reminders with photo-verified completion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Metadata of the photo that proved a task. The image itself is served by
/// `GET /tasks/{id}/photo`.
#[derive(Serialize, ToSchema, Debug)]
pub struct EvidenceDto {
    pub id: Uuid,
    pub mime_type: String,
    pub captured_at: NaiveDateTime,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TaskDto {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity: ActivityType,
    pub label: String,
    /// `HH:MM`, 24-hour.
    #[schema(example = "08:00")]
    pub scheduled_time: String,
    pub completed: bool,
    pub phase: AlarmPhase,
    pub verified_at: Option<NaiveDateTime>,
    pub photo_evidence: Option<EvidenceDto>,
}

impl TaskDto {
    fn from_task(task: &ActivityTask, phase: AlarmPhase) -> Self {
        Self {
            id: task.id,
            activity: task.activity,
            label: task.label.clone(),
            scheduled_time: task.scheduled_time.to_string(),
            completed: task.completed,
            phase,
            verified_at: task.verified_at,
            photo_evidence: task.photo_evidence.as_ref().map(|e| EvidenceDto {
                id: e.id,
                mime_type: e.mime_type.clone(),
                captured_at: e.captured_at,
            }),
        }
    }
}

impl From<&TaskView> for TaskDto {
    fn from(view: &TaskView) -> Self {
        Self::from_task(&view.task, view.phase)
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ActiveAlarmDto {
    pub task_id: Uuid,
    pub raised_at: NaiveDateTime,
    /// Missing when the task was deleted while its alarm was ringing.
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub activity: Option<ActivityType>,
}

/// The person being cared for and the family contact who gets the messages.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ProfileDto {
    pub user_name: String,
    pub contact_name: String,
    pub contact_phone: String,
}

impl From<CareProfile> for ProfileDto {
    fn from(profile: CareProfile) -> Self {
        Self {
            user_name: profile.user_name,
            contact_name: profile.contact.name,
            contact_phone: profile.contact.phone,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StateResponse {
    pub profile: ProfileDto,
    pub tasks: Vec<TaskDto>,
    pub active_alarm: Option<ActiveAlarmDto>,
    pub is_verifying: bool,
    pub is_notifying: bool,
    pub notice: Option<StatusNotice>,
    pub completed_count: usize,
    pub total_count: usize,
}

impl From<WorkflowSnapshot> for StateResponse {
    fn from(snapshot: WorkflowSnapshot) -> Self {
        Self {
            profile: snapshot.profile.into(),
            tasks: snapshot.tasks.iter().map(TaskDto::from).collect(),
            active_alarm: snapshot.active_alarm.map(|alarm| ActiveAlarmDto {
                task_id: alarm.session.task_id,
                raised_at: alarm.session.raised_at,
                label: alarm.task.as_ref().map(|t| t.label.clone()),
                activity: alarm.task.as_ref().map(|t| t.activity),
            }),
            is_verifying: snapshot.is_verifying,
            is_notifying: snapshot.is_notifying,
            notice: snapshot.notice,
            completed_count: snapshot.completed_count,
            total_count: snapshot.total_count,
        }
    }
}

/// Every field is optional; omitted fields take the defaults of a new alarm.
#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct CreateTaskRequest {
    #[serde(default, rename = "type")]
    pub activity: Option<ActivityType>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    #[schema(example = "12:00")]
    pub scheduled_time: Option<String>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct UpdateTaskRequest {
    #[serde(default, rename = "type")]
    pub activity: Option<ActivityType>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    #[schema(example = "19:30")]
    pub scheduled_time: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TriggerResponse {
    pub task_id: Uuid,
}

/// The result of a photo submission.
///
/// `status` is one of `verified`, `rejected`, `no_active_alarm`, `busy`,
/// `processing_error` or `discarded`.
#[derive(Serialize, ToSchema, Debug)]
pub struct PhotoResponse {
    pub status: String,
    pub verdict: Option<VerificationResult>,
    /// Whether the family contact was informed. Only set for `verified`.
    pub notified: Option<bool>,
}

impl PhotoResponse {
    fn from_outcome(outcome: PhotoOutcome) -> (StatusCode, Self) {
        let bare = |status: &str| Self {
            status: status.to_string(),
            verdict: None,
            notified: None,
        };
        match outcome {
            PhotoOutcome::Verified { result, notified } => (
                StatusCode::OK,
                Self {
                    status: "verified".to_string(),
                    verdict: Some(result),
                    notified: Some(notified),
                },
            ),
            PhotoOutcome::Rejected { result } => (
                StatusCode::OK,
                Self {
                    status: "rejected".to_string(),
                    verdict: Some(result),
                    notified: None,
                },
            ),
            PhotoOutcome::NoActiveAlarm => (StatusCode::CONFLICT, bare("no_active_alarm")),
            PhotoOutcome::Busy => (StatusCode::CONFLICT, bare("busy")),
            PhotoOutcome::Discarded => (StatusCode::CONFLICT, bare("discarded")),
            PhotoOutcome::ProcessingError => {
                (StatusCode::UNPROCESSABLE_ENTITY, bare("processing_error"))
            }
        }
    }
}

fn parse_time(raw: &str) -> Result<TimeOfDay, HandlerError> {
    raw.parse::<TimeOfDay>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn not_found(task_id: Uuid) -> HandlerError {
    (StatusCode::NOT_FOUND, format!("Task {} not found", task_id))
}

//=========================================================================================
// State and Task Handlers
//=========================================================================================

/// The full application state, as the alarm screen renders it.
#[utoipa::path(
    get,
    path = "/state",
    responses((status = 200, description = "Current state", body = StateResponse))
)]
pub async fn get_state_handler(State(app_state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(app_state.workflow.snapshot().await.into())
}

/// All tasks in registry order.
#[utoipa::path(
    get,
    path = "/tasks",
    responses((status = 200, description = "Task list", body = Vec<TaskDto>))
)]
pub async fn list_tasks_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<TaskDto>> {
    let snapshot = app_state.workflow.snapshot().await;
    Json(snapshot.tasks.iter().map(TaskDto::from).collect())
}

/// Add a new alarm.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskDto),
        (status = 400, description = "Invalid time or empty label")
    )
)]
pub async fn create_task_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let defaults = NewTask::default();
    let label = match payload.label {
        Some(label) if label.trim().is_empty() => {
            return Err((StatusCode::BAD_REQUEST, "label must not be empty".to_string()))
        }
        Some(label) => label,
        None => defaults.label,
    };
    let scheduled_time = match payload.scheduled_time.as_deref() {
        Some(raw) => parse_time(raw)?,
        None => defaults.scheduled_time,
    };
    let new_task = NewTask {
        activity: payload.activity.unwrap_or(defaults.activity),
        label,
        scheduled_time,
    };

    let task = app_state.workflow.add_task(new_task).await;
    info!(task_id = %task.id, "Task created.");
    Ok((
        StatusCode::CREATED,
        Json(TaskDto::from_task(&task, AlarmPhase::Pending)),
    ))
}

/// Edit the type, label or time of a task. Completion state is untouched.
#[utoipa::path(
    patch,
    path = "/tasks/{id}",
    request_body = UpdateTaskRequest,
    params(("id" = Uuid, Path, description = "The task id.")),
    responses(
        (status = 200, description = "Task updated", body = TaskDto),
        (status = 400, description = "Invalid field value"),
        (status = 404, description = "Unknown task")
    )
)]
pub async fn update_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<TaskDto>, HandlerError> {
    if payload.label.as_deref().is_some_and(|l| l.trim().is_empty()) {
        return Err((StatusCode::BAD_REQUEST, "label must not be empty".to_string()));
    }
    let changes = TaskChanges {
        activity: payload.activity,
        label: payload.label,
        scheduled_time: payload.scheduled_time.as_deref().map(parse_time).transpose()?,
    };

    let workflow = &app_state.workflow;
    workflow
        .update_task(task_id, &changes)
        .await
        .ok_or_else(|| not_found(task_id))?;
    let snapshot = workflow.snapshot().await;
    snapshot
        .tasks
        .iter()
        .find(|view| view.task.id == task_id)
        .map(|view| Json(TaskDto::from(view)))
        .ok_or_else(|| not_found(task_id))
}

/// Remove a task.
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = Uuid, Path, description = "The task id.")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Unknown task")
    )
)]
pub async fn delete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    if app_state.workflow.delete_task(task_id).await {
        info!(%task_id, "Task deleted.");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(task_id))
    }
}

/// Completed tasks, most recently verified first.
#[utoipa::path(
    get,
    path = "/history",
    responses((status = 200, description = "Completed tasks", body = Vec<TaskDto>))
)]
pub async fn history_handler(State(app_state): State<Arc<AppState>>) -> Json<Vec<TaskDto>> {
    let history = app_state.workflow.history().await;
    Json(
        history
            .iter()
            .map(|task| TaskDto::from_task(task, AlarmPhase::Completed))
            .collect(),
    )
}

/// The photo that proved a completed task.
#[utoipa::path(
    get,
    path = "/tasks/{id}/photo",
    params(("id" = Uuid, Path, description = "The task id.")),
    responses(
        (status = 200, description = "The image bytes", content_type = "image/jpeg"),
        (status = 404, description = "Unknown task or no evidence")
    )
)]
pub async fn task_photo_handler(
    State(app_state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let evidence = app_state
        .workflow
        .photo_evidence(task_id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No photo for task {}", task_id)))?;
    Ok(([(header::CONTENT_TYPE, evidence.mime_type)], evidence.bytes))
}

//=========================================================================================
// Alarm Handlers
//=========================================================================================

/// Ring the alarm for a specific task now.
#[utoipa::path(
    post,
    path = "/alarm/trigger/{id}",
    params(("id" = Uuid, Path, description = "The task id.")),
    responses(
        (status = 200, description = "Alarm raised", body = TriggerResponse),
        (status = 404, description = "Unknown task"),
        (status = 409, description = "Task completed or another alarm is active")
    )
)]
pub async fn trigger_alarm_handler(
    State(app_state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TriggerResponse>, HandlerError> {
    let workflow = &app_state.workflow;
    if !workflow.tasks().await.iter().any(|t| t.id == task_id) {
        return Err(not_found(task_id));
    }
    if workflow.trigger_alarm_manually(task_id).await {
        Ok(Json(TriggerResponse { task_id }))
    } else {
        Err((
            StatusCode::CONFLICT,
            "The task is completed or another alarm is active".to_string(),
        ))
    }
}

/// Ring a trial alarm for the first pending task, or for the first task
/// when all are done.
#[utoipa::path(
    post,
    path = "/alarm/test",
    responses(
        (status = 200, description = "Alarm raised", body = TriggerResponse),
        (status = 409, description = "No tasks or another alarm is active")
    )
)]
pub async fn test_alarm_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<TriggerResponse>, HandlerError> {
    app_state
        .workflow
        .trigger_test_alarm()
        .await
        .map(|task_id| Json(TriggerResponse { task_id }))
        .ok_or_else(|| {
            (
                StatusCode::CONFLICT,
                "No tasks or another alarm is active".to_string(),
            )
        })
}

/// Give up on the active alarm. The family contact is told.
#[utoipa::path(
    post,
    path = "/alarm/cancel",
    responses(
        (status = 204, description = "Alarm cancelled"),
        (status = 409, description = "No alarm is active or a photo is being processed")
    )
)]
pub async fn cancel_alarm_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    if app_state.workflow.cancel_alarm().await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::CONFLICT,
            "No alarm can be cancelled right now".to_string(),
        ))
    }
}

/// Silence and clear the active alarm without messaging anyone.
#[utoipa::path(
    post,
    path = "/alarm/dismiss",
    responses(
        (status = 204, description = "Alarm dismissed"),
        (status = 409, description = "No alarm is active or a photo is being processed")
    )
)]
pub async fn dismiss_alarm_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    if app_state.workflow.dismiss_alarm().await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::CONFLICT,
            "No alarm can be dismissed right now".to_string(),
        ))
    }
}

/// Submit the proof photo for the active alarm.
///
/// Accepts a multipart/form-data request with a single image part.
#[utoipa::path(
    post,
    path = "/alarm/photo",
    request_body(content_type = "multipart/form-data", description = "The photo to verify."),
    responses(
        (status = 200, description = "Verdict reached (verified or rejected)", body = PhotoResponse),
        (status = 400, description = "Missing or non-image part"),
        (status = 409, description = "No active alarm, or a photo is already in flight", body = PhotoResponse),
        (status = 422, description = "The image could not be processed", body = PhotoResponse)
    )
)]
pub async fn submit_photo_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read multipart data: {}", e),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "Multipart form must include an image".to_string(),
            )
        })?;

    let mime_type = field.content_type().unwrap_or("image/jpeg").to_string();
    if !mime_type.starts_with("image/") {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Expected an image, got {}", mime_type),
        ));
    }
    let data = field.bytes().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read image bytes: {}", e),
        )
    })?;

    let outcome = app_state.workflow.submit_photo(data, &mime_type).await;
    if !matches!(outcome, PhotoOutcome::Verified { .. }) {
        warn!(?outcome, "Photo did not complete the alarm.");
    }
    let (status, body) = PhotoResponse::from_outcome(outcome);
    Ok((status, Json(body)))
}

//=========================================================================================
// Profile and Notice Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "Current profile", body = ProfileDto))
)]
pub async fn get_profile_handler(State(app_state): State<Arc<AppState>>) -> Json<ProfileDto> {
    Json(app_state.workflow.profile().await.into())
}

/// Replace the names and the contact's phone number.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileDto,
    responses(
        (status = 200, description = "Profile saved", body = ProfileDto),
        (status = 400, description = "A field is empty")
    )
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ProfileDto>,
) -> Result<Json<ProfileDto>, HandlerError> {
    if [&payload.user_name, &payload.contact_name, &payload.contact_phone]
        .iter()
        .any(|v| v.trim().is_empty())
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "user_name, contact_name and contact_phone are required".to_string(),
        ));
    }
    let profile = CareProfile {
        user_name: payload.user_name.clone(),
        contact: FamilyContact {
            name: payload.contact_name.clone(),
            phone: payload.contact_phone.clone(),
        },
    };
    app_state.workflow.update_profile(profile).await;
    Ok(Json(payload))
}

/// Dismiss the current toast.
#[utoipa::path(
    delete,
    path = "/notice",
    responses((status = 204, description = "Notice cleared"))
)]
pub async fn clear_notice_handler(State(app_state): State<Arc<AppState>>) -> StatusCode {
    app_state.workflow.clear_notice().await;
    StatusCode::NO_CONTENT
}
