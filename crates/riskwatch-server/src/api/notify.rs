use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::scheduler::{PassOutcome, PassReport};
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 立即执行一轮定时通知（与定时任务互斥）。
#[utoipa::path(
    post,
    path = "/v1/risk/notify/run",
    tag = "Notify",
    responses(
        (status = 200, description = "本轮执行结果", body = PassReport),
        (status = 409, description = "已有一轮正在执行", body = crate::api::ApiError)
    )
)]
async fn run_notify_pass(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.scheduler.run_once().await {
        PassOutcome::Completed(report) => success_response(StatusCode::OK, &trace_id, report),
        PassOutcome::Skipped => error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            "A notification pass is already running",
        ),
    }
}

pub fn notify_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(run_notify_pass))
}
