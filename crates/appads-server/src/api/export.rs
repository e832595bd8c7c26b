use appads_core::ExtractRequest;
use appads_stream::CsvStreamEmitter;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Extension, Json,
};

use super::extract::{body_channel, spawn_run, validate_payload};
use super::{ApiError, AppState};
use crate::middleware::RequestId;
use crate::scheduler::RunContext;

/// `POST /api/v1/extract/csv`
///
/// Same input and scheduling as the JSON stream; rows are written as results
/// arrive. A failure after the header row ends the file with a
/// `# stream error:` line.
pub(super) async fn export_csv(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = validate_payload(&state, &req_id.0, payload)?;
    let ctx = RunContext::new(request.identifiers.len(), state.limits.debug_mode);
    let filename = format!(
        "app-ads-results-{}.csv",
        ctx.started_at.format("%Y%m%dT%H%M%SZ")
    );

    let (tx, body) = body_channel(&state);
    spawn_run(
        state.scheduler.clone(),
        request,
        ctx,
        CsvStreamEmitter::new(tx),
        req_id.0,
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
            (header::CACHE_CONTROL, "no-cache".to_owned()),
        ],
        body,
    )
        .into_response())
}

