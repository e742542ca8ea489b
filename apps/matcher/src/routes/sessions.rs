use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::editor::DocumentEdit;
use crate::errors::AppError;
use crate::gateway::{DocumentId, SourceFile};
use crate::identity::Identity;
use crate::skills::Bucket;
use crate::state::AppState;
use crate::workflow::{CommitOutcome, Draft, Outcome, SessionView, WorkflowEngine};

#[derive(Serialize)]
pub struct CreatedSession {
    pub id: Uuid,
    pub session: SessionView,
}

#[derive(Serialize)]
pub struct StepResponse {
    pub outcome: Outcome,
    pub session: SessionView,
}

#[derive(Serialize)]
pub struct ChangeResponse {
    pub changed: bool,
    pub session: SessionView,
}

#[derive(Deserialize)]
pub struct SelectJdRequest {
    pub document_id: DocumentId,
}

#[derive(Deserialize)]
pub struct AddSkillRequest {
    pub name: String,
    pub bucket: Bucket,
}

#[derive(Deserialize)]
pub struct MoveSkillRequest {
    pub skill: String,
    pub from: Bucket,
    pub to: Bucket,
}

#[derive(Deserialize)]
pub struct RemoveSkillRequest {
    pub skill: String,
    pub bucket: Bucket,
}

/// Edits applied to a working copy; all or nothing.
#[derive(Deserialize)]
pub struct EditRequest {
    pub edits: Vec<DocumentEdit>,
}

pub(crate) async fn load_session(state: &AppState, id: Uuid) -> Result<WorkflowEngine, AppError> {
    state
        .sessions
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

async fn saved_view(
    state: &AppState,
    id: Uuid,
    engine: &WorkflowEngine,
) -> Result<SessionView, AppError> {
    state.sessions.persist(id, engine).await?;
    Ok(engine.view())
}

async fn stepped(
    state: &AppState,
    id: Uuid,
    engine: &WorkflowEngine,
    outcome: Outcome,
) -> Result<Json<StepResponse>, AppError> {
    let session = saved_view(state, id, engine).await?;
    Ok(Json(StepResponse { outcome, session }))
}

async fn read_files(mut multipart: Multipart) -> Result<Vec<SourceFile>, AppError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let file = SourceFile::new(name, bytes);
        files.push(match content_type {
            Some(content_type) => file.with_content_type(content_type),
            None => file,
        });
    }
    Ok(files)
}

/// POST /api/v1/sessions
pub async fn handle_create(
    State(state): State<AppState>,
    Json(identity): Json<Identity>,
) -> Result<(StatusCode, Json<CreatedSession>), AppError> {
    if identity.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id is required".to_string()));
    }
    let (id, engine) = state.sessions.create(identity).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            id,
            session: engine.view(),
        }),
    ))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(load_session(&state, id).await?.view()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/files/jd
pub async fn handle_upload_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    let file = read_files(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("No JD file in upload".to_string()))?;
    engine.choose_jd_file(file)?;
    Ok(Json(engine.view()))
}

/// DELETE /api/v1/sessions/:id/files/jd
pub async fn handle_clear_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    engine.clear_jd_file()?;
    Ok(Json(engine.view()))
}

/// POST /api/v1/sessions/:id/files/cvs
pub async fn handle_upload_cvs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    let files = read_files(multipart).await?;
    if files.is_empty() {
        return Err(AppError::Validation("No resume files in upload".to_string()));
    }
    engine.choose_cv_files(files)?;
    Ok(Json(engine.view()))
}

/// DELETE /api/v1/sessions/:id/files/cvs/:index
pub async fn handle_remove_cv(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    engine.remove_cv_file(index)?;
    Ok(Json(engine.view()))
}

/// POST /api/v1/sessions/:id/select_jd
pub async fn handle_select_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectJdRequest>,
) -> Result<Json<StepResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let outcome = engine.select_jd(&req.document_id).await?;
    stepped(&state, id, &engine, outcome).await
}

/// POST /api/v1/sessions/:id/extract_jd
pub async fn handle_extract_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let outcome = engine.extract_primary().await?;
    stepped(&state, id, &engine, outcome).await
}

/// POST /api/v1/sessions/:id/extract_resumes
pub async fn handle_extract_resumes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let outcome = engine.extract_secondary().await?;
    stepped(&state, id, &engine, outcome).await
}

/// POST /api/v1/sessions/:id/match
pub async fn handle_match(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let outcome = engine.run_match().await?;
    stepped(&state, id, &engine, outcome).await
}

/// POST /api/v1/sessions/:id/save_jd
pub async fn handle_save_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let outcome = engine.save_document().await?;
    stepped(&state, id, &engine, outcome).await
}

/// POST /api/v1/sessions/:id/back
pub async fn handle_back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    engine.back()?;
    Ok(Json(saved_view(&state, id, &engine).await?))
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let engine = load_session(&state, id).await?;
    engine.reset();
    Ok(Json(saved_view(&state, id, &engine).await?))
}

async fn skill_change(
    state: &AppState,
    id: Uuid,
    engine: &WorkflowEngine,
    changed: bool,
) -> Result<Json<ChangeResponse>, AppError> {
    let session = saved_view(state, id, engine).await?;
    Ok(Json(ChangeResponse { changed, session }))
}

/// POST /api/v1/sessions/:id/skills
pub async fn handle_add_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddSkillRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let changed = engine.add_skill(&req.name, req.bucket)?;
    skill_change(&state, id, &engine, changed).await
}

/// POST /api/v1/sessions/:id/skills/move
pub async fn handle_move_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveSkillRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let changed = engine.move_skill(&req.skill, req.from, req.to)?;
    skill_change(&state, id, &engine, changed).await
}

/// POST /api/v1/sessions/:id/skills/remove
pub async fn handle_remove_skill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RemoveSkillRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let changed = engine.remove_skill(&req.skill, req.bucket)?;
    skill_change(&state, id, &engine, changed).await
}

async fn commit_edits(
    state: &AppState,
    id: Uuid,
    engine: &WorkflowEngine,
    mut draft: Draft,
    edits: Vec<DocumentEdit>,
) -> Result<Json<ChangeResponse>, AppError> {
    for edit in edits {
        draft.apply(edit)?;
    }
    let outcome = engine.commit(draft)?;
    let session = saved_view(state, id, engine).await?;
    Ok(Json(ChangeResponse {
        changed: outcome == CommitOutcome::Applied,
        session,
    }))
}

/// PATCH /api/v1/sessions/:id/jd
pub async fn handle_edit_jd(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EditRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let draft = engine.open_jd_draft()?;
    commit_edits(&state, id, &engine, draft, req.edits).await
}

/// PATCH /api/v1/sessions/:id/candidates/:index
pub async fn handle_edit_candidate(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(req): Json<EditRequest>,
) -> Result<Json<ChangeResponse>, AppError> {
    let engine = load_session(&state, id).await?;
    let draft = engine.open_candidate_draft(index)?;
    commit_edits(&state, id, &engine, draft, req.edits).await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use crate::gateway::Gateways;
    use crate::routes::build_router;
    use crate::storage::SessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    pub(crate) struct TestApp {
        pub router: Router,
        pub fake: Arc<FakeGateway>,
        _dir: TempDir,
    }

    pub(crate) fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeGateway::default());
        let state = AppState::new(Gateways::shared(fake.clone()), SessionStore::new(dir.path()));
        TestApp {
            router: build_router(state),
            fake,
            _dir: dir,
        }
    }

    async fn respond(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub(crate) async fn send(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        respond(router, request).await
    }

    async fn upload(
        router: &Router,
        uri: &str,
        field: &str,
        files: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let boundary = "matcher-test-boundary";
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        respond(router, request).await
    }

    pub(crate) async fn create(router: &Router, role: &str) -> String {
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/sessions",
            Some(json!({"user_id": "u-1", "role": role})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_reviewer_flow_over_http() {
        let app = app();
        let id = create(&app.router, "recruiter").await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = send(
            &app.router,
            "POST",
            &format!("{base}/select_jd"),
            Some(json!({"document_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], json!({"status": "advanced", "step": 2}));

        let (status, body) = upload(
            &app.router,
            &format!("{base}/files/cvs"),
            "resume_files",
            &[("a.pdf", "%PDF-a"), ("b.pdf", "%PDF-b")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending_cvs"], json!(["a.pdf", "b.pdf"]));

        let (_, body) = send(&app.router, "POST", &format!("{base}/extract_resumes"), None).await;
        assert_eq!(body["session"]["step"], json!(4));
        assert_eq!(body["session"]["candidates"].as_array().unwrap().len(), 2);

        let (_, body) = send(&app.router, "POST", &format!("{base}/match"), None).await;
        assert_eq!(body["session"]["step"], json!(6));
        assert_eq!(
            body["session"]["report"]["results"][0]["candidate_name"],
            json!("Ana")
        );

        let (_, body) = send(&app.router, "POST", &format!("{base}/back"), None).await;
        assert_eq!(body["step"], json!(4));
        let (_, body) = send(&app.router, "GET", &base, None).await;
        assert_eq!(body["step"], json!(4));
        assert_eq!(body["topology"], json!("reviewer"));
    }

    #[tokio::test]
    async fn test_errors_map_to_statuses() {
        let app = app();
        let id = create(&app.router, "recruiter").await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = send(&app.router, "POST", &format!("{base}/extract_jd"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], json!("FORBIDDEN"));

        let (status, _) = send(&app.router, "POST", &format!("{base}/match"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        app.fake.fail("select_document");
        let (status, body) = send(
            &app.router,
            "POST",
            &format!("{base}/select_jd"),
            Some(json!({"document_id": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], json!("GATEWAY_ERROR"));
        let (_, body) = send(&app.router, "GET", &base, None).await;
        assert_eq!(body["step"], json!(1));
        assert!(body["error"].is_string());

        let missing = format!("/api/v1/sessions/{}", Uuid::new_v4());
        let (status, _) = send(&app.router, "GET", &missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/v1/sessions",
            Some(json!({"user_id": " ", "role": "admin"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_preparer_triage_edit_and_save() {
        let app = app();
        let id = create(&app.router, "admin").await;
        let base = format!("/api/v1/sessions/{id}");

        let (status, body) = upload(
            &app.router,
            &format!("{base}/files/jd"),
            "jd_file",
            &[("jd.pdf", "%PDF-jd")],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pending_jd"], json!("jd.pdf"));

        let (_, body) = send(&app.router, "POST", &format!("{base}/extract_jd"), None).await;
        assert_eq!(body["session"]["step"], json!(3));

        let (_, body) = send(
            &app.router,
            "POST",
            &format!("{base}/skills/move"),
            Some(json!({"skill": "Kafka", "from": "critical", "to": "extra"})),
        )
        .await;
        assert_eq!(body["changed"], json!(true));
        let (_, body) = send(
            &app.router,
            "POST",
            &format!("{base}/skills"),
            Some(json!({"name": "Kafka", "bucket": "important"})),
        )
        .await;
        assert_eq!(body["changed"], json!(false));
        assert_eq!(
            body["session"]["skills"],
            json!({"critical": ["Rust", "SQL"], "important": [], "extra": ["Kafka"]})
        );

        let (status, body) = send(
            &app.router,
            "PATCH",
            &format!("{base}/jd"),
            Some(json!({"edits": [
                {"op": "set", "path": "jobTitle", "value": "Staff Engineer"},
                {"op": "list", "path": "keyResponsibilities", "edit": {"add": "Own the pipeline"}}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], json!(true));
        assert_eq!(body["session"]["jd"]["jobTitle"], json!("Staff Engineer"));
        assert_eq!(
            body["session"]["jd"]["keyResponsibilities"],
            json!(["Own the pipeline"])
        );

        let (status, _) = send(
            &app.router,
            "PATCH",
            &format!("{base}/jd"),
            Some(json!({"edits": [
                {"op": "set", "path": "jobTitle", "value": "Not applied"},
                {"op": "list", "path": "keyResponsibilities",
                 "edit": {"update": {"index": 9, "record": "x"}}}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, body) = send(&app.router, "GET", &base, None).await;
        assert_eq!(body["jd"]["jobTitle"], json!("Staff Engineer"));

        let (_, body) = send(&app.router, "POST", &format!("{base}/save_jd"), None).await;
        assert_eq!(body["session"]["step"], json!(1));
        let saved = app.fake.saved.lock().clone();
        assert_eq!(saved[0].get("jobTitle"), Some(&json!("Staff Engineer")));
        assert_eq!(
            saved[0].get("requiredSkills"),
            Some(&json!({"critical": ["Rust", "SQL"], "important": [], "extra": ["Kafka"]}))
        );
    }

    #[tokio::test]
    async fn test_candidate_edit_and_file_removal() {
        let app = app();
        let id = create(&app.router, "recruiter").await;
        let base = format!("/api/v1/sessions/{id}");
        send(
            &app.router,
            "POST",
            &format!("{base}/select_jd"),
            Some(json!({"document_id": "3"})),
        )
        .await;
        upload(
            &app.router,
            &format!("{base}/files/cvs"),
            "resume_files",
            &[("a.pdf", "1"), ("b.pdf", "2"), ("c.pdf", "3")],
        )
        .await;

        let (_, body) = send(&app.router, "DELETE", &format!("{base}/files/cvs/0"), None).await;
        assert_eq!(body["pending_cvs"], json!(["b.pdf", "c.pdf"]));
        let (status, _) = send(&app.router, "DELETE", &format!("{base}/files/cvs/7"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app.router, "POST", &format!("{base}/extract_resumes"), None).await;
        let (status, body) = send(
            &app.router,
            "PATCH",
            &format!("{base}/candidates/1"),
            Some(json!({"edits": [
                {"op": "set", "path": "Personal Data.email", "value": "bo@example.com"},
                {"op": "list", "path": "Experiences", "edit": {"remove": {"index": 0}}}
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let candidate = &body["session"]["candidates"][1];
        assert_eq!(candidate["cv_json"]["Personal Data"]["email"], json!("bo@example.com"));
        assert_eq!(candidate["cv_json"]["Experiences"], json!([]));
        assert_eq!(candidate["skill_presence"]["Rust"], json!(true));

        let (status, _) = send(
            &app.router,
            "PATCH",
            &format!("{base}/candidates/4"),
            Some(json!({"edits": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_and_reset() {
        let app = app();
        let id = create(&app.router, "recruiter").await;
        let base = format!("/api/v1/sessions/{id}");
        send(
            &app.router,
            "POST",
            &format!("{base}/select_jd"),
            Some(json!({"document_id": "1"})),
        )
        .await;

        let (_, body) = send(&app.router, "POST", &format!("{base}/reset"), None).await;
        assert_eq!(body["step"], json!(1));
        assert_eq!(body["jd"], Value::Null);

        let (status, _) = send(&app.router, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app.router, "GET", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app.router, "DELETE", &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        create(&app.router, "admin").await;
        let (status, body) = send(&app.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("ok"));
        assert_eq!(body["active_sessions"], json!(1));
    }
}
