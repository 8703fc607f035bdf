//! The tus protocol surface: dispatch, create, append, head, download.

use crate::error::{ApiError, ApiResult};
use crate::events::UploadEvent;
use crate::headers;
use crate::metrics::{
    APPEND_CONFLICTS, BYTES_APPENDED, UPLOADS_ABORTED, UPLOADS_COMPLETED, UPLOADS_CREATED,
};
use crate::state::AppState;
use axum::body::{Body, BodyDataStream};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use hoist_core::{RecordTtl, UploadId, UploadMetadata, UploadRecord};
use hoist_storage::{SpoolFile, StorageError, TargetFile};

/// Protocol entrypoint for the upload base path and upload resources.
///
/// Resolves the effective method (honoring `X-HTTP-Method-Override`),
/// negotiates the protocol version, and routes to the per-method
/// handlers.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    match route(&state, req).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn route(state: &AppState, req: Request) -> ApiResult<Response> {
    let method = headers::effective_method(req.headers(), req.method())?;

    // GET is outside the protocol proper and skips version negotiation.
    if method != Method::GET {
        headers::require_version(req.headers())?;
    }

    match method.as_str() {
        "OPTIONS" => capabilities(state),
        "HEAD" => {
            let id = state
                .locations
                .upload_id(req.uri())
                .map_err(|e| ApiError::NotFound(e.to_string()))?;
            head_upload(state, id).await
        }
        "POST" => create_upload(state, req).await,
        "PATCH" => {
            if !headers::carries_upload_bytes(req.headers()) {
                return Err(unsupported_media_type());
            }
            let id = state
                .locations
                .upload_id(req.uri())
                .map_err(|e| ApiError::NotFound(e.to_string()))?;
            let offset = headers::u64_header(req.headers(), headers::UPLOAD_OFFSET)?
                .ok_or_else(|| ApiError::BadRequest("append requires Upload-Offset".into()))?;
            let (parts, body) = req.into_parts();
            append_upload(state, id, &parts.headers, body, offset).await
        }
        "GET" => download_upload(state, req.uri().clone()).await,
        other => Err(ApiError::BadRequest(format!("unsupported method: {other}"))),
    }
}

/// OPTIONS: advertise the protocol version, size ceiling, and extensions.
fn capabilities(state: &AppState) -> ApiResult<Response> {
    Ok((
        StatusCode::OK,
        [
            (headers::TUS_VERSION, hoist_core::PROTOCOL_VERSION.to_string()),
            (
                headers::TUS_MAX_SIZE,
                state.config.upload.max_size.to_string(),
            ),
            (
                headers::TUS_EXTENSION,
                headers::SUPPORTED_EXTENSIONS.to_string(),
            ),
        ],
    )
        .into_response())
}

/// HEAD: report the current offset, and the length when it is known.
#[tracing::instrument(skip_all, fields(upload_id = %id))]
async fn head_upload(state: &AppState, id: UploadId) -> ApiResult<Response> {
    let record = state.metadata.get(id).await?.ok_or_else(|| not_found(id))?;

    let target = TargetFile::new(&record.file);
    if !target.exists().await? {
        // The record outlived its file; drop it so the id stops resolving.
        state.metadata.delete(id).await?;
        return Err(not_found(id));
    }

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(headers::UPLOAD_OFFSET, target.size().await.to_string());
    if !record.defer {
        builder = builder.header(headers::UPLOAD_LENGTH, record.length.to_string());
    }
    builder
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// POST: create an upload resource. When the request body carries upload
/// bytes (creation-with-upload), the same request also performs the first
/// append.
#[tracing::instrument(skip_all)]
async fn create_upload(state: &AppState, req: Request) -> ApiResult<Response> {
    let (parts, body) = req.into_parts();
    let max_size = state.config.upload.max_size;

    let length = headers::u64_header(&parts.headers, headers::UPLOAD_LENGTH)?.unwrap_or(0);
    let defer = if length == 0 {
        if headers::str_header(&parts.headers, headers::UPLOAD_DEFER_LENGTH) != Some("1") {
            return Err(ApiError::BadRequest(
                "upload without a length must send Upload-Defer-Length: 1".into(),
            ));
        }
        true
    } else {
        if length > max_size {
            return Err(ApiError::TooLarge {
                size: length,
                max: max_size,
            });
        }
        false
    };

    let id = UploadId::new();
    let metadata = headers::str_header(&parts.headers, headers::UPLOAD_METADATA)
        .map(UploadMetadata::parse)
        .unwrap_or_default();

    let file = state.targets.target_path(id, &metadata);
    let record = if defer {
        UploadRecord::deferred(metadata.clone(), &file)
    } else {
        UploadRecord::sized(length, metadata.clone(), &file)
    };

    // Record first, then file: a failed create rolls the record back so
    // the two can never disagree about the upload's existence.
    state
        .metadata
        .put(id, &record, RecordTtl::StoreDefault)
        .await?;

    let target = TargetFile::new(&file);
    if let Err(e) = target.create().await {
        if let Err(rollback) = state.metadata.delete(id).await {
            tracing::warn!(
                upload_id = %id,
                error = %rollback,
                "failed to roll back record after file create failure"
            );
        }
        return Err(e.into());
    }

    UPLOADS_CREATED.inc();
    tracing::info!(
        upload_id = %id,
        file = %file.display(),
        length,
        defer,
        "created upload"
    );

    let location = state.locations.location(id, &parts.uri);

    if headers::carries_upload_bytes(&parts.headers) {
        // creation-with-upload: run the append engine against the new
        // resource and reuse its response. The body starts at offset zero
        // and UploadStarted is not dispatched on this path.
        let mut response = append_upload(state, id, &parts.headers, body, 0).await?;
        response.headers_mut().insert(
            header::LOCATION,
            HeaderValue::from_str(&location).map_err(|e| ApiError::Internal(e.to_string()))?,
        );
        return Ok(response);
    }

    let event = UploadEvent { id, file, metadata };
    state.events.upload_started(&event).await;

    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, location)
        .header(headers::UPLOAD_OFFSET, "0");
    if defer {
        builder = builder.header(headers::UPLOAD_DEFER_LENGTH, "1");
    }
    builder
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// PATCH: the append engine. Also serves the append half of
/// creation-with-upload, which starts at offset zero without carrying an
/// `Upload-Offset` header; standalone appends must send one.
#[tracing::instrument(skip_all, fields(upload_id = %id))]
async fn append_upload(
    state: &AppState,
    id: UploadId,
    req_headers: &HeaderMap,
    body: Body,
    offset: u64,
) -> ApiResult<Response> {
    // Callers gate the content type before delegating here.
    let max_size = state.config.upload.max_size;

    // Serialize the critical section per upload: record read, offset
    // check, write, completion.
    let _guard = state.append_locks.acquire(id).await;

    let mut record = state.metadata.get(id).await?.ok_or_else(|| not_found(id))?;
    let target = TargetFile::new(&record.file);
    if !target.exists().await? {
        return Err(not_found(id));
    }

    if record.complete {
        APPEND_CONFLICTS.inc();
        return Err(ApiError::Conflict(format!("upload {id} is already complete")));
    }

    // Deferred-length fix-up, one-shot: a non-zero Upload-Length on an
    // append pins the final size.
    if record.defer {
        if let Some(length) = headers::u64_header(req_headers, headers::UPLOAD_LENGTH)? {
            if length > 0 {
                if length > max_size {
                    return Err(ApiError::TooLarge {
                        size: length,
                        max: max_size,
                    });
                }
                record.fix_length(length);
                state
                    .metadata
                    .put(id, &record, RecordTtl::StoreDefault)
                    .await?;
            }
        }
    }

    // Offset gate: the append must start exactly at the current size.
    // On mismatch the file and record stay intact so the client can
    // resync with HEAD and retry.
    let current = target.size().await;
    if offset != current {
        APPEND_CONFLICTS.inc();
        return Err(ApiError::Conflict(format!(
            "Upload-Offset {offset} does not match current offset {current}"
        )));
    }

    let cap = if record.defer { max_size } else { record.length };
    let write_limit = cap.saturating_sub(offset);
    let stream = body.into_data_stream();

    let transferred = if state.config.upload.use_intermediate_chunk {
        append_via_spool(state, id, &target, offset, stream, write_limit).await?
    } else {
        let mut writer = target.open_at(offset).await?;
        match writer.copy_from(stream, Some(write_limit)).await {
            Ok(n) => n,
            Err(e @ StorageError::LimitExceeded { .. }) => {
                destroy_upload(state, id, &target).await;
                return Err(e.into());
            }
            // Body read or write failures leave the upload resumable:
            // durable bytes stay, the client re-syncs with HEAD.
            Err(e) => return Err(e.into()),
        }
    };

    // Post-write validation: the file itself has the final word on how
    // many bytes landed.
    let new_size = target.size().await;
    if record.defer {
        if offset + transferred > max_size {
            destroy_upload(state, id, &target).await;
            return Err(ApiError::Conflict(format!(
                "deferred upload grew past the {max_size}-byte ceiling"
            )));
        }
    } else if offset + transferred != new_size {
        destroy_upload(state, id, &target).await;
        return Err(ApiError::Conflict(format!(
            "wrote {transferred} bytes at offset {offset} but file size is {new_size}"
        )));
    }

    BYTES_APPENDED.inc_by(transferred);

    // Completion: flip once, rearm the record TTL for download retention.
    if !record.defer && new_size == record.length {
        record.mark_complete();
        state
            .metadata
            .put(id, &record, state.config.upload.completion_retention)
            .await?;

        UPLOADS_COMPLETED.inc();
        tracing::info!(upload_id = %id, size = new_size, "upload complete");

        let event = UploadEvent {
            id,
            file: record.file.clone(),
            metadata: record.metadata.clone(),
        };
        state.events.upload_complete(&event).await;
    }

    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(headers::UPLOAD_OFFSET, new_size.to_string());
    if record.defer {
        builder = builder.header(headers::UPLOAD_DEFER_LENGTH, "1");
    }
    builder
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Two-phase staging: body to spool file, spool file to target. The
/// spool is removed in every outcome; a spool-to-target shortfall is a
/// hard error that destroys the upload.
async fn append_via_spool(
    state: &AppState,
    id: UploadId,
    target: &TargetFile,
    offset: u64,
    stream: BodyDataStream,
    write_limit: u64,
) -> ApiResult<u64> {
    let chunk_dir = state.config.upload.chunk_dir();
    let mut spool = SpoolFile::create(&chunk_dir).await?;

    match spool.fill(stream, Some(write_limit)).await {
        Ok(_) => {}
        Err(e) => {
            remove_spool(&mut spool, id).await;
            if matches!(e, StorageError::LimitExceeded { .. }) {
                destroy_upload(state, id, target).await;
            }
            return Err(e.into());
        }
    }

    match spool.drain_into(target, offset).await {
        Ok(written) => {
            remove_spool(&mut spool, id).await;
            Ok(written)
        }
        Err(e) => {
            remove_spool(&mut spool, id).await;
            destroy_upload(state, id, target).await;
            Err(e.into())
        }
    }
}

/// GET: serve a completed (or, when allowed, partial) upload. Disabled
/// unless configured.
#[tracing::instrument(skip_all)]
async fn download_upload(state: &AppState, uri: Uri) -> ApiResult<Response> {
    let download = &state.config.download;
    if !download.enabled {
        return Err(ApiError::MethodNotAllowed("downloads are disabled".into()));
    }

    let id = state
        .locations
        .upload_id(&uri)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let record = state.metadata.get(id).await?.ok_or_else(|| not_found(id))?;

    let target = TargetFile::new(&record.file);
    if !target.exists().await? {
        return Err(not_found(id));
    }

    if !download.allow_partial && !record.complete {
        return Err(ApiError::Forbidden(format!("upload {id} is not complete")));
    }

    let size = target.size().await;
    let filename = record
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    // TODO: RFC 5987-encode the filename once clients need non-ASCII names.
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header("Content-Transfer-Encoding", "binary");

    if let Some(content_type) = record.metadata.get("type") {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            builder = builder.header(header::CONTENT_TYPE, value);
        }
    }

    let stream = target.read_stream().await?;
    builder
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Remove both the file and the record after an unrecoverable write.
/// Deletion failures are logged, not surfaced: the record is gone, so an
/// orphaned file is unreachable and harmless.
async fn destroy_upload(state: &AppState, id: UploadId, target: &TargetFile) {
    UPLOADS_ABORTED.inc();

    if let Err(e) = target.delete().await {
        tracing::warn!(
            upload_id = %id,
            file = %target.path().display(),
            error = %e,
            "failed to delete upload file"
        );
    }
    if let Err(e) = state.metadata.delete(id).await {
        tracing::warn!(upload_id = %id, error = %e, "failed to delete upload record");
    }
}

async fn remove_spool(spool: &mut SpoolFile, id: UploadId) {
    if let Err(e) = spool.remove().await {
        tracing::warn!(
            upload_id = %id,
            path = %spool.path().display(),
            error = %e,
            "failed to remove spool file"
        );
    }
}

fn not_found(id: UploadId) -> ApiError {
    ApiError::NotFound(format!("upload {id} not found"))
}

fn unsupported_media_type() -> ApiError {
    ApiError::UnsupportedMediaType(format!(
        "append requires Content-Type: {}",
        headers::OFFSET_CONTENT_TYPE
    ))
}
