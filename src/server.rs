use crate::client::GenerationService;
use crate::config::Limits;
use crate::data::{EditorState, TimetableRequest};
use crate::editor::{Command, EditorView, History, offerable_slots};
use crate::error::{AppError, CoverageGap, EditError, ValidationError};
use crate::grid::{TimetableView, interpret};
use crate::payload::build_request;
use crate::slots::{OwnerRef, SlotKey};
use crate::store::{DraftStore, ResultStore};
use crate::validate::validate;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// The single operator's editing session and caches.
#[derive(Debug)]
pub struct Session {
    pub history: History,
    pub drafts: DraftStore,
    pub results: ResultStore,
}

impl Session {
    pub fn new(drafts: DraftStore, results: ResultStore) -> Self {
        Self {
            history: History::default(),
            drafts,
            results,
        }
    }

    fn save_draft(&mut self) -> Result<EditorView, AppError> {
        self.drafts
            .save(self.history.present(), SystemTime::now())?;
        Ok(self.history.view())
    }
}

pub struct AppState<G> {
    generator: Arc<G>,
    limits: Arc<Limits>,
    session: Arc<Mutex<Session>>,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            limits: Arc::clone(&self.limits),
            session: Arc::clone(&self.session),
        }
    }
}

impl<G: GenerationService> AppState<G> {
    pub fn new(generator: G, limits: Limits, session: Session) -> Self {
        Self {
            generator: Arc::new(generator),
            limits: Arc::new(limits),
            session: Arc::new(Mutex::new(session)),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    gaps: Vec<CoverageGap>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Edit(EditError::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
            Self::Edit(_) => StatusCode::CONFLICT,
            Self::Generation(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            error!("{self}");
        }
        let gaps = match &self {
            Self::Validation(ValidationError::Coverage(gaps)) => gaps.clone(),
            _ => Vec::new(),
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
            gaps,
        });
        (status, body).into_response()
    }
}

fn validated_request(
    editor: &EditorState,
    limits: &Limits,
) -> Result<TimetableRequest, AppError> {
    info!(
        "Checking configuration: {} sections, {} subjects, {} faculty, {} + {} rooms",
        editor.sections_count,
        editor.subjects.len(),
        editor.faculty.len(),
        editor.theory_rooms.len(),
        editor.lab_rooms.len()
    );
    validate(editor, limits)?;
    Ok(build_request(editor))
}

async fn validate_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
    Json(editor): Json<EditorState>,
) -> Result<Json<TimetableRequest>, AppError> {
    Ok(Json(validated_request(&editor, &app.limits)?))
}

async fn generate_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
    Json(editor): Json<EditorState>,
) -> Result<Json<TimetableView>, AppError> {
    let request = validated_request(&editor, &app.limits)?;
    info!("Submitting request to the timetable generator");
    let timetable = app.generator.generate(&request).await?;

    app.session.lock().await.results.save(&timetable)?;
    Ok(Json(interpret(&timetable)))
}

async fn latest_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
) -> Result<Json<TimetableView>, AppError> {
    let timetable = app
        .session
        .lock()
        .await
        .results
        .load()?
        .ok_or(AppError::NotFound("No timetable has been generated yet."))?;
    Ok(Json(interpret(&timetable)))
}

/// Forgets the cached timetable and the draft.
async fn start_over_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
) -> Result<StatusCode, AppError> {
    let mut session = app.session.lock().await;
    session.results.clear()?;
    session.drafts.clear()?;
    session.history.reset(EditorState::default());
    info!("Session reset");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_draft_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
) -> Result<Json<EditorView>, AppError> {
    let mut session = app.session.lock().await;
    // an edited session outranks the stored copy
    if session.history.is_pristine() {
        let resumed = session.drafts.load(SystemTime::now())?.unwrap_or_default();
        if &resumed != session.history.present() {
            session.history.reset(resumed);
        }
    }
    Ok(Json(session.history.view()))
}

async fn put_draft_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
    Json(editor): Json<EditorState>,
) -> Result<Json<EditorView>, AppError> {
    let mut session = app.session.lock().await;
    session.history.reset(editor);
    Ok(Json(session.save_draft()?))
}

async fn command_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
    Json(command): Json<Command>,
) -> Result<Json<EditorView>, AppError> {
    let mut session = app.session.lock().await;
    session.history.apply(command, &app.limits)?;
    Ok(Json(session.save_draft()?))
}

async fn undo_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
) -> Result<Json<EditorView>, AppError> {
    let mut session = app.session.lock().await;
    session.history.undo()?;
    Ok(Json(session.save_draft()?))
}

async fn redo_handler<G: GenerationService>(
    State(app): State<AppState<G>>,
) -> Result<Json<EditorView>, AppError> {
    let mut session = app.session.lock().await;
    session.history.redo()?;
    Ok(Json(session.save_draft()?))
}

#[derive(Debug, Deserialize)]
struct OptionsRequest {
    state: EditorState,
    faculty: usize,
    row: usize,
}

async fn options_handler(Json(body): Json<OptionsRequest>) -> Json<Vec<SlotKey>> {
    let owner = OwnerRef {
        faculty: body.faculty,
        row: body.row,
    };
    Json(offerable_slots(&body.state, owner))
}

pub fn build_router<G: GenerationService>(state: AppState<G>) -> Router {
    Router::new()
        .route("/v1/timetable/validate", post(validate_handler::<G>))
        .route("/v1/timetable/generate", post(generate_handler::<G>))
        .route(
            "/v1/timetable",
            get(latest_handler::<G>).delete(start_over_handler::<G>),
        )
        .route(
            "/v1/draft",
            get(get_draft_handler::<G>).put(put_draft_handler::<G>),
        )
        .route("/v1/draft/commands", post(command_handler::<G>))
        .route("/v1/draft/undo", post(undo_handler::<G>))
        .route("/v1/draft/redo", post(redo_handler::<G>))
        .route("/v1/editor/options", post(options_handler))
        .with_state(state)
}

pub async fn run_server<G: GenerationService>(
    listen: std::net::SocketAddr,
    state: AppState<G>,
) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
