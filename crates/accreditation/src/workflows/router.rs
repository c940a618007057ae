use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::identity::{IdentityDirectory, UserRecord, UserRole};
use crate::notify::NotificationSink;

use super::vault::{
    DocumentId, DocumentRepository, DocumentType, DocumentVault, MalwareScanner, UploadRequest,
    DEFAULT_SCAN_BATCH, MAX_DOCUMENT_BYTES,
};
use super::verification::{
    StatusUpdate, VerificationId, VerificationRepository, VerificationService,
    VerificationSubmission,
};
use super::ErrorKind;

/// Header carrying the identity provider's user id, set by the upstream auth proxy.
pub const USER_HEADER: &str = "x-user-id";

// Base64 inflates uploads by a third; leave headroom for the JSON envelope.
const UPLOAD_BODY_LIMIT: usize = (MAX_DOCUMENT_BYTES as usize) * 4 / 3 + 64 * 1024;

/// Services and collaborators shared by the HTTP handlers.
pub struct AccreditationApi<R, N, V, M> {
    pub verifications: Arc<VerificationService<R, N>>,
    pub vault: Arc<DocumentVault<V, M>>,
    pub directory: Arc<dyn IdentityDirectory>,
}

/// Router exposing verification and document endpoints, plus the admin-only maintenance
/// sweep an external scheduler can call.
pub fn accreditation_router<R, N, V, M>(api: Arc<AccreditationApi<R, N, V, M>>) -> Router
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    Router::new()
        .route("/api/v1/verifications", post(create_handler::<R, N, V, M>))
        .route(
            "/api/v1/verifications/status",
            get(status_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/verifications/:verification_id",
            get(get_handler::<R, N, V, M>).delete(purge_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/verifications/:verification_id/status",
            post(review_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/verifications/:verification_id/cancel",
            post(cancel_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/verifications/:verification_id/documents",
            post(upload_handler::<R, N, V, M>).get(list_documents_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/documents/:document_id/content",
            get(content_handler::<R, N, V, M>),
        )
        .route(
            "/api/v1/maintenance/sweep",
            post(sweep_handler::<R, N, V, M>),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .with_state(api)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadBody {
    pub(crate) document_type: DocumentType,
    pub(crate) file_name: String,
    pub(crate) mime_type: String,
    pub(crate) size: u64,
    /// Standard base64 of the file bytes.
    pub(crate) content: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepParams {
    pub(crate) scan_limit: Option<usize>,
}

pub(crate) async fn create_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Json(submission): Json<VerificationSubmission>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match api.verifications.create(&caller.id, submission) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn status_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match api.verifications.status(&caller.id) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn get_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.get(&id) {
        Ok(view) if view.owner == caller.id || caller.role.can_review() => {
            (StatusCode::OK, Json(view)).into_response()
        }
        Ok(_) => not_found(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn review_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match reviewer(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.update_status(&id, update, &caller.id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn cancel_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.cancel(&id, &caller.id) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn purge_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match admin(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.purge(&id, &caller.id) {
        Ok(documents_purged) => (
            StatusCode::OK,
            Json(json!({ "verification_id": id, "documents_purged": documents_purged })),
        )
            .into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn sweep_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Query(params): Query<SweepParams>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    if let Err(response) = admin(api.directory.as_ref(), &headers) {
        return response;
    }

    match api.vault.sweep(params.scan_limit.unwrap_or(DEFAULT_SCAN_BATCH)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn upload_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
    Json(body): Json<UploadBody>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.get(&id) {
        Ok(view) if view.owner == caller.id => {}
        Ok(_) => return not_found(),
        Err(err) => return error_response(err.kind(), err.to_string()),
    }

    let bytes = match STANDARD.decode(body.content.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                ErrorKind::Validation,
                "content must be standard base64".to_string(),
            )
        }
    };

    let request = UploadRequest {
        verification_id: id,
        uploaded_by: caller.id,
        document_type: body.document_type,
        file_name: body.file_name,
        mime_type: body.mime_type,
        declared_size: body.size,
        bytes,
    };

    match api.vault.upload(request) {
        Ok(metadata) => (StatusCode::CREATED, Json(metadata)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn list_documents_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(verification_id): Path<String>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    let caller = match caller(api.directory.as_ref(), &headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };
    let Some(id) = parse_id(&verification_id).map(VerificationId) else {
        return not_found();
    };

    match api.verifications.get(&id) {
        Ok(view) if view.owner == caller.id || caller.role.can_review() => {}
        Ok(_) => return not_found(),
        Err(err) => return error_response(err.kind(), err.to_string()),
    }

    match api.vault.list(&id) {
        Ok(documents) => (StatusCode::OK, Json(documents)).into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

pub(crate) async fn content_handler<R, N, V, M>(
    State(api): State<Arc<AccreditationApi<R, N, V, M>>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Response
where
    R: VerificationRepository + 'static,
    N: NotificationSink + 'static,
    V: DocumentRepository + 'static,
    M: MalwareScanner + 'static,
{
    if let Err(response) = reviewer(api.directory.as_ref(), &headers) {
        return response;
    }
    let Some(id) = parse_id(&document_id).map(DocumentId) else {
        return not_found();
    };

    let metadata = match api.vault.metadata(&id) {
        Ok(metadata) => metadata,
        Err(err) => return error_response(err.kind(), err.to_string()),
    };

    match api.vault.retrieve(&id) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, metadata.mime_type.as_str())],
            bytes,
        )
            .into_response(),
        Err(err) => error_response(err.kind(), err.to_string()),
    }
}

fn caller(directory: &dyn IdentityDirectory, headers: &HeaderMap) -> Result<UserRecord, Response> {
    let external_id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(unauthorized)?;

    match directory.resolve(external_id) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized()),
        Err(err) => Err(error_response(ErrorKind::Storage, err.to_string())),
    }
}

fn reviewer(directory: &dyn IdentityDirectory, headers: &HeaderMap) -> Result<UserRecord, Response> {
    let user = caller(directory, headers)?;
    if user.role.can_review() {
        Ok(user)
    } else {
        Err(forbidden())
    }
}

fn admin(directory: &dyn IdentityDirectory, headers: &HeaderMap) -> Result<UserRecord, Response> {
    let user = caller(directory, headers)?;
    if user.role == UserRole::Admin {
        Ok(user)
    } else {
        Err(forbidden())
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Map an error kind onto a response. Integrity failures never echo details to the caller.
pub(crate) fn error_response(kind: ErrorKind, message: String) -> Response {
    let status = match kind {
        ErrorKind::Validation | ErrorKind::Eligibility => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => return not_found(),
        ErrorKind::Integrity => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
    };
    let message = match kind {
        ErrorKind::Integrity => "document failed integrity verification".to_string(),
        _ => message,
    };

    let payload = json!({
        "error": message,
        "kind": kind.label(),
    });
    (status, Json(payload)).into_response()
}

fn not_found() -> Response {
    let payload = json!({
        "error": "not found",
        "kind": ErrorKind::NotFound.label(),
    });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn unauthorized() -> Response {
    let payload = json!({ "error": "missing or unknown user identity" });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn forbidden() -> Response {
    let payload = json!({ "error": "caller lacks the required role" });
    (StatusCode::FORBIDDEN, Json(payload)).into_response()
}
