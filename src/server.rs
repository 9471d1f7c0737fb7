//!
//! atrium HTTP server
//! ------------------
//! Axum-based HTTP API for browsing, searching and administering the shared
//! public directory.
//!
//! Responsibilities:
//! - Session management with a simple cookie model; sessions carry folder-key
//!   grants and the show-hidden preference and are minted lazily.
//! - Browse endpoint serving file bytes, directory listings, filename search
//!   and hybrid (semantic + filename) search results.
//! - Folder-key validation endpoint feeding the session grant cache.
//! - Administrative endpoints for protection, visibility, folder creation,
//!   deletion, uploads and semantic index rebuilds.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path as UrlPath, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use getrandom::getrandom;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::access::{self, Access};
use crate::authz::AuthIndex;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::files::{EntryInfo, FileStore};
use crate::paths;
use crate::search::{self, NoSemanticBackend, SemanticBackend};
use crate::session::Session;
use crate::visibility::VisibilityIndex;

const SESSION_COOKIE: &str = "atrium_session";

/// Shared server state injected into all handlers.
///
/// The two indexes guard their own maps internally; the session map is the
/// only state owned here. Sessions are per-cookie and only the request
/// holding a cookie mutates its session, so the map lock is held briefly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthIndex>,
    pub visibility: Arc<VisibilityIndex>,
    pub files: Arc<FileStore>,
    pub semantic: Arc<dyn SemanticBackend>,
    /// Session id -> session state mapping.
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    /// Serializes semantic index rebuilds: at most one in flight.
    pub rebuild_lock: Arc<tokio::sync::Mutex<()>>,
}

/// Start the atrium HTTP server with the default (disabled) semantic backend.
pub async fn run(config: Config) -> anyhow::Result<()> {
    run_with_backend(config, Arc::new(NoSemanticBackend)).await
}

pub async fn run_with_backend(config: Config, semantic: Arc<dyn SemanticBackend>) -> anyhow::Result<()> {
    config.ensure_directories()?;
    info!(
        public_dir = %config.public_dir.display(),
        config_dir = %config.config_dir.display(),
        upload_key = config.upload_key.is_some(),
        delete_key = config.delete_key_configured(),
        hidden_key = config.hidden_key_configured(),
        "atrium starting"
    );

    let (auth, auth_corrupt) = AuthIndex::open(config.folder_keys_file());
    if let Some(e) = auth_corrupt {
        error!("folder key config corrupt, continuing with empty index: {}", e);
    }
    let (visibility, vis_corrupt) = VisibilityIndex::open(config.visibility_file());
    if let Some(e) = vis_corrupt {
        error!("visibility config corrupt, continuing with empty set: {}", e);
    }

    let http_port = config.http_port;
    let state = AppState {
        files: Arc::new(FileStore::new(&config.public_dir)),
        config: Arc::new(config),
        auth: Arc::new(auth),
        visibility: Arc::new(visibility),
        semantic,
        sessions: Arc::new(RwLock::new(HashMap::new())),
        rebuild_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    // The extractor's built-in body cap (2 MiB) would otherwise reject large
    // uploads before the handler's own size check runs.
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    Router::new()
        .route("/health", get(health))
        .route("/validate-key", post(validate_key))
        .route("/api/list-dirs", post(api_list_dirs))
        .route("/api/create-folder", post(api_create_folder))
        .route("/api/set-path-protection", post(api_set_protection))
        .route("/api/remove-path-protection", post(api_remove_protection))
        .route("/api/toggle-hidden", post(api_toggle_hidden))
        .route("/api/toggle-view-hidden", post(api_toggle_view_hidden))
        .route("/api/delete-items", post(api_delete_items))
        .route("/api/validate-upload-key", post(api_validate_upload_key))
        .route("/api/rebuild-index", post(api_rebuild_index))
        .route("/upload/{*path}", post(upload_file).layer(upload_limit))
        .route("/", get(browse_root))
        .route("/{*path}", get(browse))
        .with_state(state)
}

// ---- session plumbing ----------------------------------------------------

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom(&mut bytes);
    let mut sid = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes {
        let _ = write!(&mut sid, "{:02x}", b);
    }
    sid
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

/// Read-only view of the request's session; anonymous default if none.
async fn read_session(state: &AppState, headers: &HeaderMap) -> Session {
    if let Some(sid) = parse_cookie(headers, SESSION_COOKIE) {
        let map = state.sessions.read().await;
        if let Some(s) = map.get(&sid) {
            return s.clone();
        }
    }
    Session::new()
}

/// Existing session id, or a freshly minted one plus the Set-Cookie header
/// the response must carry. The session entry is created on first use.
async fn session_for_update(state: &AppState, headers: &HeaderMap) -> (String, HeaderMap) {
    let mut response_headers = HeaderMap::new();
    let sid = match parse_cookie(headers, SESSION_COOKIE) {
        Some(sid) if state.sessions.read().await.contains_key(&sid) => sid,
        _ => {
            let sid = new_session_id();
            response_headers.insert("Set-Cookie", set_session_cookie(&sid));
            sid
        }
    };
    state.sessions.write().await.entry(sid.clone()).or_default();
    (sid, response_headers)
}

// ---- response helpers ----------------------------------------------------

fn status_of(e: &AppError) -> StatusCode {
    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_json(e: &AppError) -> (StatusCode, Json<serde_json::Value>) {
    (status_of(e), Json(json!({"status": "error", "code": e.code_str(), "error": e.message()})))
}

/// Write-through results: a persistence failure still succeeded in memory,
/// so answer 200 with a durability warning rather than rolling back.
fn write_through_response(result: AppResult<()>, mut body: serde_json::Value) -> (StatusCode, Json<serde_json::Value>) {
    match result {
        Ok(()) => (StatusCode::OK, Json(body)),
        Err(e @ AppError::Persistence { .. }) => {
            warn!("write-through persistence failed: {}", e);
            body["warning"] = json!("Change applied but may not survive a restart.");
            (StatusCode::OK, Json(body))
        }
        Err(e) => error_json(&e),
    }
}

fn entry_json(info: &EntryInfo) -> serde_json::Value {
    json!({
        "path": info.path,
        "display_name": info.display_name,
        "href": format!("/{}", paths::url_encode(&info.path)),
        "is_dir": info.is_dir,
        "size_bytes": info.size_bytes,
        "size": info.size_display,
        "modified": info.modified,
        "is_protected": info.is_protected,
        "is_hidden": info.is_hidden,
    })
}

// ---- browse --------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BrowseParams {
    /// Filename substring search within the current directory.
    search: Option<String>,
    /// Hybrid semantic + filename search over the whole tree.
    smart: Option<String>,
    recursive: Option<bool>,
}

async fn browse_root(state: State<AppState>, headers: HeaderMap, params: Query<BrowseParams>) -> Response {
    browse_path(state, headers, String::new(), params).await
}

async fn browse(
    state: State<AppState>,
    headers: HeaderMap,
    UrlPath(path): UrlPath<String>,
    params: Query<BrowseParams>,
) -> Response {
    browse_path(state, headers, path, params).await
}

async fn browse_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw_path: String,
    Query(params): Query<BrowseParams>,
) -> Response {
    let session = read_session(&state, &headers).await;
    let (canonical, decision) = access::decide(&state.auth, &state.visibility, &state.files, &session, &raw_path);

    match decision {
        Access::OutOfBounds => {
            return error_json(&AppError::out_of_bounds("browse", "Path escapes the public root.")).into_response()
        }
        Access::NotFound => return error_json(&AppError::not_found("browse", "Path not found.")).into_response(),
        Access::RequiresKey => {
            let e = AppError::authentication_required();
            return (
                status_of(&e),
                Json(json!({
                    "status": "error",
                    "code": e.code_str(),
                    "error": e.message(),
                    "requires_key": true,
                    "path": canonical,
                })),
            )
                .into_response();
        }
        Access::Allowed { .. } => {}
    }

    if state.files.is_file(&canonical) {
        return serve_file(&state, &canonical).await;
    }

    let show_hidden = session.show_hidden;
    if let Some(query) = params.smart.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        return smart_search_response(&state, query, show_hidden);
    }
    if let Some(query) = params.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let recursive = params.recursive.unwrap_or(true);
        let entries =
            state.files.find_by_name(query, &canonical, recursive, show_hidden, &state.auth, &state.visibility);
        return (
            StatusCode::OK,
            Json(json!({
                "path": canonical,
                "search": query,
                "recursive": recursive,
                "entries": entries.iter().map(entry_json).collect::<Vec<_>>(),
            })),
        )
            .into_response();
    }

    match state.files.list_directory(&canonical, show_hidden, &state.auth, &state.visibility) {
        Ok(entries) => {
            let parent = if canonical.is_empty() {
                serde_json::Value::Null
            } else {
                json!(format!("/{}", paths::url_encode(paths::parent(&canonical))))
            };
            (
                StatusCode::OK,
                Json(json!({
                    "path": canonical,
                    "parent": parent,
                    "is_hidden": state.visibility.is_hidden(&canonical),
                    "show_hidden": show_hidden,
                    "semantic_available": state.semantic.is_available(),
                    "delete_configured": state.config.delete_key_configured(),
                    "hidden_configured": state.config.hidden_key_configured(),
                    "entries": entries.iter().map(entry_json).collect::<Vec<_>>(),
                })),
            )
                .into_response()
        }
        Err(e) => error_json(&e).into_response(),
    }
}

async fn serve_file(state: &AppState, canonical: &str) -> Response {
    let abs = state.files.absolute(canonical);
    match tokio::fs::read(&abs).await {
        Ok(bytes) => {
            let mut headers = HeaderMap::new();
            headers.insert("Content-Type", HeaderValue::from_static("application/octet-stream"));
            let name = paths::display_name(canonical).replace('"', "");
            if let Ok(v) = HeaderValue::from_str(&format!("inline; filename=\"{}\"", name)) {
                headers.insert("Content-Disposition", v);
            }
            (StatusCode::OK, headers, bytes).into_response()
        }
        Err(e) => {
            error!(path = %canonical, "failed to read file: {}", e);
            error_json(&AppError::from(e)).into_response()
        }
    }
}

fn smart_search_response(state: &AppState, query: &str, show_hidden: bool) -> Response {
    let status = state.semantic.status();
    let semantic_hits = if status.semantic_available && status.index_ready {
        state.semantic.search(query, 50)
    } else {
        Vec::new()
    };
    let name_entries = state.files.find_by_name(query, "", true, show_hidden, &state.auth, &state.visibility);
    let name_paths: Vec<String> = name_entries.iter().map(|e| e.path.clone()).collect();

    let ranked =
        search::rank_results(state.files.root(), &state.visibility, show_hidden, &semantic_hits, &name_paths);

    // Enrich ranked paths with listing metadata; anything that vanished
    // between ranking and stat is dropped, not an error.
    let mut entries = Vec::new();
    for hit in &ranked {
        if let Ok(info) = state.files.stat_entry(&hit.path, &state.auth, &state.visibility) {
            let mut value = entry_json(&info);
            value["score"] = match hit.score {
                Some(s) => json!(format!("{:.2}", s)),
                None => serde_json::Value::Null,
            };
            value["matched_name"] = json!(hit.matched_name);
            entries.push(value);
        }
    }

    (
        StatusCode::OK,
        Json(json!({
            "smart_query": query,
            "semantic_available": status.semantic_available,
            "index_ready": status.index_ready,
            "entries": entries,
        })),
    )
        .into_response()
}

// ---- key validation and session toggles ----------------------------------

#[derive(Debug, Deserialize)]
struct ValidateKeyPayload {
    path: String,
    key: String,
}

async fn validate_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ValidateKeyPayload>,
) -> impl IntoResponse {
    let raw = paths::url_decode(payload.path.trim_matches('/'));
    let canonical = paths::canonicalize(&raw);

    if state.auth.required_key(&canonical).is_none() {
        return (StatusCode::OK, HeaderMap::new(), Json(json!({"status": "success", "message": "Path is not protected."})));
    }

    let (sid, response_headers) = session_for_update(&state, &headers).await;
    let mut sessions = state.sessions.write().await;
    let session = sessions.entry(sid).or_default();
    if access::grant_access(&state.auth, session, &canonical, &payload.key) {
        (StatusCode::OK, response_headers, Json(json!({"status": "success", "message": "Access granted."})))
    } else {
        let e = AppError::authentication_required();
        (status_of(&e), response_headers, Json(json!({"status": "error", "code": e.code_str(), "error": e.message()})))
    }
}

#[derive(Debug, Deserialize)]
struct ToggleViewHiddenPayload {
    key: String,
}

async fn api_toggle_view_hidden(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ToggleViewHiddenPayload>,
) -> impl IntoResponse {
    if !state.config.hidden_key_configured() {
        return (
            StatusCode::NOT_IMPLEMENTED,
            HeaderMap::new(),
            Json(json!({"status": "error", "error": "Hidden feature not configured."})),
        );
    }
    if Some(payload.key.as_str()) != state.config.hidden_key.as_deref() {
        let e = AppError::authentication_required();
        return (status_of(&e), HeaderMap::new(), Json(json!({"status": "error", "code": e.code_str(), "error": e.message()})));
    }
    let (sid, response_headers) = session_for_update(&state, &headers).await;
    let mut sessions = state.sessions.write().await;
    let session = sessions.entry(sid).or_default();
    let new_state = session.toggle_show_hidden();
    (
        StatusCode::OK,
        response_headers,
        Json(json!({"status": "success", "show_hidden": new_state})),
    )
}

// ---- listings for the upload UI ------------------------------------------

#[derive(Debug, Deserialize)]
struct ListDirsPayload {
    #[serde(default)]
    path: String,
}

async fn api_list_dirs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ListDirsPayload>,
) -> impl IntoResponse {
    let session = read_session(&state, &headers).await;
    let (canonical, decision) = access::decide(&state.auth, &state.visibility, &state.files, &session, &payload.path);
    match decision {
        Access::OutOfBounds => return error_json(&AppError::out_of_bounds("list_dirs", "Access forbidden.")),
        Access::NotFound => return error_json(&AppError::not_found("list_dirs", "Path not found or not a directory.")),
        Access::RequiresKey => {
            let e = AppError::authentication_required();
            return (
                status_of(&e),
                Json(json!({"status": "error", "code": e.code_str(), "error": e.message(), "requires_key": true, "path": canonical})),
            );
        }
        Access::Allowed { .. } => {}
    }
    if !state.files.is_dir(&canonical) {
        return error_json(&AppError::not_found("list_dirs", "Path not found or not a directory."));
    }
    match state.files.list_directory(&canonical, session.show_hidden, &state.auth, &state.visibility) {
        Ok(entries) => {
            let subdirs: Vec<serde_json::Value> = entries
                .iter()
                .filter(|e| e.is_dir)
                .map(|e| json!({"name": e.display_name, "is_protected": e.is_protected}))
                .collect();
            (StatusCode::OK, Json(json!({"subdirs": subdirs, "current_path": canonical})))
        }
        Err(e) => error_json(&e),
    }
}

// ---- administration -------------------------------------------------------

fn require_upload_key(state: &AppState, provided: Option<&str>) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let Some(configured) = state.config.upload_key.as_deref() else {
        return Err((
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"status": "error", "error": "Server upload key not configured."})),
        ));
    };
    if provided != Some(configured) {
        let e = AppError::authentication_required();
        return Err(error_json(&e));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CreateFolderPayload {
    #[serde(default)]
    parent_path: String,
    folder_name: String,
    key: String,
    /// Optional folder key to set on the newly created folder.
    protection_key: Option<String>,
}

async fn api_create_folder(
    State(state): State<AppState>,
    Json(payload): Json<CreateFolderPayload>,
) -> impl IntoResponse {
    if payload.folder_name.is_empty() {
        return error_json(&AppError::user("missing_folder_name", "Folder name required."));
    }
    if let Err(resp) = require_upload_key(&state, Some(payload.key.as_str())) {
        return resp;
    }
    let parent = paths::canonicalize(&payload.parent_path);
    match state.files.create_folder(&parent, &payload.folder_name) {
        Ok(new_path) => {
            let body = json!({"status": "success", "message": "Folder created successfully.", "path": new_path});
            if let Some(protection_key) = payload.protection_key.filter(|k| !k.is_empty()) {
                let (status, body) =
                    write_through_response(state.auth.protect(&new_path, &protection_key), body);
                // The folder exists either way; keep the creation status.
                let status = if status == StatusCode::OK { StatusCode::CREATED } else { status };
                return (status, body);
            }
            (StatusCode::CREATED, Json(body))
        }
        Err(e) => error_json(&e),
    }
}

#[derive(Debug, Deserialize)]
struct SetProtectionPayload {
    path: String,
    key: String,
    protection_key: String,
}

async fn api_set_protection(
    State(state): State<AppState>,
    Json(payload): Json<SetProtectionPayload>,
) -> impl IntoResponse {
    if let Err(resp) = require_upload_key(&state, Some(payload.key.as_str())) {
        return resp;
    }
    if payload.protection_key.is_empty() {
        return error_json(&AppError::user("missing_protection_key", "Protection key required."));
    }
    let canonical = paths::canonicalize(&payload.path);
    if canonical.is_empty() {
        return error_json(&AppError::invalid_target("protect_root", "Cannot protect the public root."));
    }
    if !state.files.exists(&canonical) {
        return error_json(&AppError::not_found("set_protection", "Path not found."));
    }
    write_through_response(
        state.auth.protect(&canonical, &payload.protection_key),
        json!({"status": "success", "message": format!("Path '{}' is now protected.", canonical)}),
    )
}

#[derive(Debug, Deserialize)]
struct RemoveProtectionPayload {
    path: String,
    key: String,
}

async fn api_remove_protection(
    State(state): State<AppState>,
    Json(payload): Json<RemoveProtectionPayload>,
) -> impl IntoResponse {
    if let Err(resp) = require_upload_key(&state, Some(payload.key.as_str())) {
        return resp;
    }
    let canonical = paths::canonicalize(&payload.path);
    write_through_response(
        state.auth.unprotect(&canonical),
        json!({"status": "success", "message": format!("Path '{}' is no longer protected.", canonical)}),
    )
}

#[derive(Debug, Deserialize)]
struct ToggleHiddenPayload {
    path: String,
    key: String,
    hide: bool,
}

async fn api_toggle_hidden(
    State(state): State<AppState>,
    Json(payload): Json<ToggleHiddenPayload>,
) -> impl IntoResponse {
    if !state.config.hidden_key_configured() {
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"status": "error", "error": "Hidden feature not configured."})),
        );
    }
    if Some(payload.key.as_str()) != state.config.hidden_key.as_deref() {
        return error_json(&AppError::authentication_required());
    }
    let canonical = paths::canonicalize(&payload.path);
    if canonical.is_empty() {
        return error_json(&AppError::invalid_target("hide_root", "Cannot hide the public root."));
    }
    if !state.files.is_dir(&canonical) {
        return error_json(&AppError::not_found("toggle_hidden", "Invalid path."));
    }
    let action = if payload.hide { "hidden" } else { "unhidden" };
    write_through_response(
        state.visibility.set_hidden(&canonical, payload.hide),
        json!({
            "status": "success",
            "message": format!("Folder '{}' is now {}.", canonical, action),
            "path": canonical,
            "is_hidden": payload.hide,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct DeleteItemsPayload {
    items_to_delete: Vec<String>,
}

async fn api_delete_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DeleteItemsPayload>,
) -> impl IntoResponse {
    let Some(configured) = state.config.delete_key.as_deref() else {
        return (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"status": "error", "error": "Deletion not configured."})),
        );
    };
    let provided = headers.get("X-Delete-Key").and_then(|v| v.to_str().ok());
    if provided != Some(configured) {
        return error_json(&AppError::authentication_required());
    }
    let report = state.files.delete_items(&payload.items_to_delete);
    let status = if report.fail_count == 0 { StatusCode::OK } else { StatusCode::MULTI_STATUS };
    (status, Json(serde_json::to_value(&report).unwrap_or_else(|_| json!({}))))
}

#[derive(Debug, Deserialize)]
struct ValidateUploadKeyPayload {
    #[serde(default)]
    path: String,
    key: String,
}

async fn api_validate_upload_key(
    State(state): State<AppState>,
    Json(payload): Json<ValidateUploadKeyPayload>,
) -> impl IntoResponse {
    if payload.key.is_empty() {
        return error_json(&AppError::user("missing_key", "Upload key required."));
    }
    let canonical = paths::canonicalize(&payload.path);
    // A folder key on the destination overrides the global upload key.
    match state.auth.required_key(&canonical) {
        Some(required) => {
            if required == payload.key {
                (StatusCode::OK, Json(json!({"status": "success", "message": "Key valid."})))
            } else {
                error_json(&AppError::authentication_required())
            }
        }
        None => match require_upload_key(&state, Some(payload.key.as_str())) {
            Ok(()) => (StatusCode::OK, Json(json!({"status": "success", "message": "Key valid."}))),
            Err(resp) => resp,
        },
    }
}

// ---- uploads and index rebuild -------------------------------------------

async fn upload_file(
    State(state): State<AppState>,
    UrlPath(raw_path): UrlPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let canonical = paths::canonicalize(&raw_path);
    if canonical.is_empty() {
        return error_json(&AppError::user("missing_filename", "Upload destination must name a file."));
    }
    let abs = state.files.absolute(&canonical);
    if !state.files.is_safe(&abs) {
        return error_json(&AppError::out_of_bounds("upload", "Path escapes the public root."));
    }

    let provided = headers.get("X-Upload-Key").and_then(|v| v.to_str().ok());
    let target_dir = paths::parent(&canonical);
    let auth_ok = match state.auth.required_key(target_dir) {
        Some(required) => provided == Some(required.as_str()),
        None => match state.config.upload_key.as_deref() {
            Some(configured) => provided == Some(configured),
            None => false,
        },
    };
    if !auth_ok {
        return error_json(&AppError::authentication_required());
    }

    if body.is_empty() {
        return error_json(&AppError::user("empty_upload", "Empty upload body."));
    }
    if body.len() > state.config.max_upload_bytes {
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({"status": "error", "error": "Upload exceeds size limit."})),
        );
    }

    match state.files.save_upload(&canonical, &body) {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({"status": "success", "message": "File uploaded successfully", "filename": canonical})),
        ),
        Err(e) => error_json(&e),
    }
}

async fn api_rebuild_index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let provided = headers.get("X-Upload-Key").and_then(|v| v.to_str().ok());
    if let Err(resp) = require_upload_key(&state, provided) {
        return resp;
    }
    if !state.semantic.is_available() {
        return error_json(&AppError::internal("semantic_unavailable", "Search model not loaded."));
    }
    // Rebuilds are slow; refuse concurrent triggers instead of queueing them.
    let Ok(_guard) = state.rebuild_lock.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(json!({"status": "error", "error": "Index rebuild already in progress."})),
        );
    };
    info!("manual semantic index rebuild requested");
    match state.semantic.rebuild(state.files.root()) {
        Ok(indexed) => (
            StatusCode::OK,
            Json(json!({"status": "success", "message": "Semantic index rebuilt successfully.", "indexed": indexed})),
        ),
        Err(e) => error_json(&e),
    }
}

// ---- health ---------------------------------------------------------------

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "public_dir": state.files.root().display().to_string(),
        "semantic_available": state.semantic.is_available(),
    }))
}
