use crate::api::rules::rule_error_response;
use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::service::AlertQuery;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use riskwatch_alert::AlertFilters;
use riskwatch_common::types::{AlertItem, RiskLevel};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// 风险预警查询参数。筛选条件只影响展示，不影响规则命中。
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AlertsParams {
    /// 项目名称精确匹配
    #[param(required = false)]
    project: Option<String>,
    /// 任务状态精确匹配
    #[param(required = false)]
    status: Option<String>,
    /// 负责人模糊匹配
    #[param(required = false)]
    assignee: Option<String>,
    /// 风险等级（low / medium / high）
    #[param(required = false)]
    risk_level: Option<String>,
    /// 临时覆盖临期天数阈值（不保存）
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "crate::api::deserialize_optional_i64")]
    threshold_days: Option<i64>,
    /// 临时覆盖进度阈值（不保存）
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "crate::api::deserialize_optional_i64")]
    progress_threshold: Option<i64>,
}

/// 风险预警列表
#[derive(Serialize, ToSchema)]
struct AlertsResponse {
    /// 按剩余天数升序，无截止日期的排在最后
    items: Vec<AlertItem>,
    total: usize,
    /// 任务快照不可用时为 true，此时 items 为空
    degraded: bool,
}

/// 按当前规则实时评估任务快照。
#[utoipa::path(
    get,
    path = "/v1/risk/alerts",
    tag = "Alerts",
    params(AlertsParams),
    responses(
        (status = 200, description = "风险预警列表", body = AlertsResponse),
        (status = 400, description = "参数不合法", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> impl IntoResponse {
    let risk_level = match params.risk_level.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => match RiskLevel::from_hint(raw) {
            Some(level) => Some(level),
            None => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &trace_id,
                    "bad_request",
                    &format!("unknown risk level: {raw}"),
                )
            }
        },
        None => None,
    };

    let query = AlertQuery {
        filters: AlertFilters {
            project: params.project,
            status: params.status,
            assignee: params.assignee,
            risk_level,
        },
        threshold_days: params.threshold_days,
        progress_threshold: params.progress_threshold,
    };

    match state.service.evaluate_on_demand(&query).await {
        Ok(view) => success_response(
            StatusCode::OK,
            &trace_id,
            AlertsResponse {
                total: view.items.len(),
                items: view.items,
                degraded: view.degraded,
            },
        ),
        Err(e) => rule_error_response(&trace_id, &e),
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_alerts))
}
