//! HTTP handlers: the HTML upload → result flow and the JSON API.

use askama::Template;
use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::documents::{extract_upload, normalize_display};
use crate::errors::AppError;
use crate::matching::highlight::{highlight, HighlightBuckets};
use crate::report::{run_analysis, MatchReport};
use crate::session::{session_cookie, session_id_from_headers, session_id_or_new, SessionData};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Templates
// ────────────────────────────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate;

#[derive(Template)]
#[template(path = "upload.html")]
struct UploadTemplate;

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate<'a> {
    report: &'a MatchReport,
    resume_text: &'a str,
    jd_text: &'a str,
}

// ────────────────────────────────────────────────────────────────────────────
// Upload helpers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    text: Option<String>,
}

async fn read_upload(
    mut multipart: Multipart,
    file_field: &str,
    text_field: &str,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            if !filename.is_empty() && !data.is_empty() {
                form.file = Some((filename, data));
            }
        } else if name == text_field {
            form.text = Some(field.text().await?);
        }
    }
    Ok(form)
}

/// Text from the uploaded file, falling back to the pasted text.
async fn resolve_text(form: UploadForm) -> String {
    let mut text = String::new();
    if let Some((filename, data)) = form.file {
        text = extract_upload(filename, data.to_vec()).await;
    }
    if text.trim().is_empty() {
        text = form.text.map(|t| normalize_display(&t)).unwrap_or_default();
    }
    text
}

fn redirect_with_cookie(to: &str, session_id: &str, is_new: bool) -> Response {
    let mut response = Redirect::to(to).into_response();
    if is_new {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(session_id)) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }
    response
}

async fn load_session(state: &AppState, headers: &HeaderMap) -> Result<Option<SessionData>, AppError> {
    match session_id_from_headers(headers) {
        Some(id) => Ok(state.sessions.load(&id).await?),
        None => Ok(None),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HTML flow
// ────────────────────────────────────────────────────────────────────────────

/// GET / — starts over: clears the session and shows the résumé form.
pub async fn handle_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    if let Some(id) = session_id_from_headers(&headers) {
        state.sessions.clear(&id).await?;
    }
    Ok(Html(IndexTemplate.render()?))
}

/// POST /process_resume
pub async fn handle_process_resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_upload(multipart, "resume_file", "resume_text").await?;
    let resume_text = resolve_text(form).await;
    if resume_text.trim().is_empty() {
        return Ok(Redirect::to("/").into_response());
    }

    let (id, is_new) = session_id_or_new(&headers);
    let data = SessionData {
        resume_text: Some(resume_text),
        ..Default::default()
    };
    state.sessions.save(&id, &data).await?;
    Ok(redirect_with_cookie("/upload_jd", &id, is_new))
}

/// GET /upload_jd
pub async fn handle_upload_jd(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let has_resume = load_session(&state, &headers)
        .await?
        .is_some_and(|s| s.resume_text.is_some());
    if !has_resume {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(UploadTemplate.render()?).into_response())
}

/// POST /process_jd — runs the pipeline and stores the report.
pub async fn handle_process_jd(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_upload(multipart, "jd_file", "jd_text").await?;
    let jd_text = resolve_text(form).await;

    let Some(id) = session_id_from_headers(&headers) else {
        return Ok(Redirect::to("/").into_response());
    };
    let Some(mut session) = state.sessions.load(&id).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let Some(resume_text) = session.resume_text.clone() else {
        return Ok(Redirect::to("/").into_response());
    };
    if jd_text.trim().is_empty() {
        return Ok(Redirect::to("/upload_jd").into_response());
    }

    info!(
        "Analyzing résumé ({} chars) against JD ({} chars)",
        resume_text.len(),
        jd_text.len()
    );
    let report = run_analysis(&state, &resume_text, &jd_text).await;

    session.jd_text = Some(jd_text);
    session.report = Some(report);
    state.sessions.save(&id, &session).await?;
    Ok(Redirect::to("/result").into_response())
}

/// GET /result
pub async fn handle_result(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(session) = load_session(&state, &headers).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let Some(report) = session.report.as_ref() else {
        return Ok(Redirect::to("/").into_response());
    };

    let page = ResultTemplate {
        report,
        resume_text: session.resume_text.as_deref().unwrap_or_default(),
        jd_text: session.jd_text.as_deref().unwrap_or_default(),
    };
    Ok(Html(page.render()?).into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// JSON API
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_text: String,
    pub jd_text: String,
}

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<MatchReport>, AppError> {
    let resume_text = normalize_display(&req.resume_text);
    let jd_text = normalize_display(&req.jd_text);
    if resume_text.is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".to_string()));
    }
    if jd_text.is_empty() {
        return Err(AppError::Validation("jd_text must not be empty".to_string()));
    }
    Ok(Json(run_analysis(&state, &resume_text, &jd_text).await))
}

#[derive(Debug, Deserialize)]
pub struct HighlightRequest {
    pub text: String,
    #[serde(flatten)]
    pub buckets: HighlightBuckets,
}

#[derive(Debug, Serialize)]
pub struct HighlightResponse {
    pub html: String,
}

/// POST /api/v1/highlight
pub async fn handle_highlight(Json(req): Json<HighlightRequest>) -> Json<HighlightResponse> {
    Json(HighlightResponse {
        html: highlight(&req.text, &req.buckets),
    })
}
