use std::convert::Infallible;
use std::sync::Arc;

use appads_core::{validate_request, ExtractRequest, ValidatedRequest};
use appads_match::MatchEngine;
use appads_stream::{JsonStreamEmitter, ResultSink};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use super::{ApiError, AppState};
use crate::middleware::RequestId;
use crate::scheduler::{BatchScheduler, RunContext};

/// Parses and validates an extraction body. Nothing is streamed until this
/// succeeds, so every failure here is an ordinary error envelope.
pub(super) fn validate_payload(
    state: &AppState,
    request_id: &str,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<ValidatedRequest, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        ApiError::new(request_id, "validation_error", rejection.body_text())
    })?;
    validate_request(request, state.limits.max_identifiers).map_err(|err| {
        tracing::debug!(request_id, error = %err, "extract request rejected");
        ApiError::new(request_id, "validation_error", err.to_string())
    })
}

pub(super) type BodySender = mpsc::Sender<Result<String, Infallible>>;

/// Bounded frame channel; the receiver half becomes the response body.
pub(super) fn body_channel(state: &AppState) -> (BodySender, Body) {
    let (tx, rx) = mpsc::channel(state.limits.stream_buffer);
    (tx, Body::from_stream(ReceiverStream::new(rx)))
}

/// Runs the batch on its own task so the handler can return the streaming
/// response immediately. The task ends when the run completes or the client
/// goes away.
pub(super) fn spawn_run<S>(
    scheduler: Arc<BatchScheduler>,
    request: ValidatedRequest,
    mut ctx: RunContext,
    mut sink: S,
    request_id: String,
) where
    S: ResultSink + 'static,
{
    let span = tracing::info_span!("extract_run", request_id = %request_id, run_id = %ctx.run_id);
    tokio::spawn(
        async move {
            let engine = MatchEngine::new(&request.criteria);
            if let Err(err) = scheduler
                .run(&request.identifiers, &engine, &mut ctx, &mut sink)
                .await
            {
                tracing::debug!(error = %err, "run ended before completion");
            }
        }
        .instrument(span),
    );
}

/// `POST /api/v1/extract/stream`
pub(super) async fn extract_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = validate_payload(&state, &req_id.0, payload)?;
    let ctx = RunContext::new(request.identifiers.len(), state.limits.debug_mode);

    let (tx, body) = body_channel(&state);
    let emitter = JsonStreamEmitter::new(tx, ctx.debug_mode);
    spawn_run(state.scheduler.clone(), request, ctx, emitter, req_id.0);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
