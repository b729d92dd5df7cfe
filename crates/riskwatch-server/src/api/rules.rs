use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use riskwatch_alert::{RuleError, RulePatch};
use riskwatch_common::types::{Rule, RuleAction, RuleChangeLogEntry, RuleKind};
use riskwatch_storage::AuditQuery;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;

/// 风险规则
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    /// 规则唯一标识
    pub key: String,
    /// 规则名称
    pub name: String,
    /// 规则类型（deadline_progress / blocked / overdue）
    #[serde(rename = "type")]
    pub rule_type: String,
    pub enabled: bool,
    /// 命中时是否自动通知
    pub auto_notify: bool,
    /// 临期天数阈值（仅 deadline_progress）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_days: Option<u32>,
    /// 进度阈值 0-100（仅 deadline_progress）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_threshold: Option<u8>,
    /// 是否包含里程碑（仅 deadline_progress）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_milestones: Option<bool>,
    /// 阻塞标记值（仅 blocked，未设置时不命中任何记录）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_value: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Rule> for RuleResponse {
    fn from(rule: Rule) -> Self {
        let rule_type = rule.rule_type().to_string();
        let (threshold_days, progress_threshold, include_milestones, blocked_value) = match rule.kind {
            RuleKind::DeadlineProgress(s) => (
                Some(s.threshold_days),
                Some(s.progress_threshold),
                Some(s.include_milestones),
                None,
            ),
            RuleKind::Blocked(s) => (None, None, None, s.blocked_value),
            RuleKind::Overdue => (None, None, None, None),
        };
        Self {
            key: rule.key,
            name: rule.name,
            rule_type,
            enabled: rule.enabled,
            auto_notify: rule.auto_notify,
            threshold_days,
            progress_threshold,
            include_milestones,
            blocked_value,
            updated_at: rule.updated_at,
        }
    }
}

/// 规则更新请求（仅修改传入的字段）
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateRuleRequest {
    pub enabled: Option<bool>,
    pub auto_notify: Option<bool>,
    /// 必须 ≥ 0
    pub threshold_days: Option<i64>,
    /// 必须在 0-100 之间
    pub progress_threshold: Option<i64>,
    pub include_milestones: Option<bool>,
    /// 空字符串表示清除
    pub blocked_value: Option<String>,
}

impl From<UpdateRuleRequest> for RulePatch {
    fn from(req: UpdateRuleRequest) -> Self {
        RulePatch {
            enabled: req.enabled,
            auto_notify: req.auto_notify,
            threshold_days: req.threshold_days,
            progress_threshold: req.progress_threshold,
            include_milestones: req.include_milestones,
            blocked_value: req.blocked_value,
        }
    }
}

/// 查询全部风险规则。
#[utoipa::path(
    get,
    path = "/v1/risk/rules",
    tag = "Rules",
    responses(
        (status = 200, description = "规则列表", body = Vec<RuleResponse>)
    )
)]
async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rules: Vec<RuleResponse> = state
        .service
        .rules()
        .get_all()
        .into_iter()
        .map(RuleResponse::from)
        .collect();
    success_response(StatusCode::OK, &trace_id, rules)
}

pub(crate) fn rule_error_response(trace_id: &str, err: &RuleError) -> axum::response::Response {
    match err {
        RuleError::UnknownRuleKey(_) => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &err.to_string())
        }
        RuleError::InvalidThreshold(_) | RuleError::InvalidProgressThreshold(_) => error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            "invalid_threshold",
            &err.to_string(),
        ),
        RuleError::FieldNotApplicable { .. } => error_response(
            StatusCode::BAD_REQUEST,
            trace_id,
            "field_not_applicable",
            &err.to_string(),
        ),
        RuleError::Persistence(e) => {
            tracing::error!(error = %e, "Rule persistence failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 更新风险规则（部分字段）。每个变更字段写入一条变更日志。
#[utoipa::path(
    put,
    path = "/v1/risk/rules/{key}",
    tag = "Rules",
    params(("key" = String, Path, description = "规则 key")),
    request_body = UpdateRuleRequest,
    responses(
        (status = 200, description = "更新后的规则", body = RuleResponse),
        (status = 400, description = "参数不合法", body = crate::api::ApiError),
        (status = 404, description = "规则不存在", body = crate::api::ApiError)
    )
)]
async fn update_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<UpdateRuleRequest>,
) -> impl IntoResponse {
    let patch = RulePatch::from(req);
    match state.service.rules().update(&key, &patch) {
        Ok(rule) => success_response(StatusCode::OK, &trace_id, RuleResponse::from(rule)),
        Err(e) => rule_error_response(&trace_id, &e),
    }
}

/// 规则变更日志查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct RuleLogParams {
    /// 规则 key 精确匹配
    #[param(required = false)]
    rule_key: Option<String>,
    /// 变更类型（enabled / disabled / threshold_updated / blocked_value_updated / auto_notify_toggled / milestone_scope_updated）
    #[param(required = false)]
    action: Option<String>,
    /// 返回最近的条数（默认 100，最大 1000）
    #[param(required = false, value_type = Option<i64>)]
    #[serde(default, deserialize_with = "crate::api::deserialize_optional_i64")]
    limit: Option<i64>,
}

/// 查询规则变更日志（按写入顺序）。
#[utoipa::path(
    get,
    path = "/v1/risk/rule-logs",
    tag = "Rules",
    params(RuleLogParams),
    responses(
        (status = 200, description = "变更日志", body = Vec<RuleChangeLogEntry>),
        (status = 400, description = "参数不合法", body = crate::api::ApiError)
    )
)]
async fn list_rule_logs(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<RuleLogParams>,
) -> impl IntoResponse {
    let action = match params.action.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        Some(raw) => match raw.parse::<RuleAction>() {
            Ok(action) => Some(action),
            Err(msg) => {
                return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg)
            }
        },
        None => None,
    };
    let limit = match params.limit {
        None => DEFAULT_LOG_LIMIT,
        Some(l) if l > 0 => usize::try_from(l).unwrap_or(MAX_LOG_LIMIT).min(MAX_LOG_LIMIT),
        Some(l) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &format!("limit must be positive, got {l}"),
            )
        }
    };

    let query = AuditQuery {
        rule_key: params.rule_key.filter(|k| !k.trim().is_empty()),
        action,
        limit: Some(limit),
    };
    match state.service.audit().list(&query) {
        Ok(entries) => success_response(StatusCode::OK, &trace_id, entries),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list rule change log");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

pub fn rule_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_rules))
        .routes(routes!(update_rule))
        .routes(routes!(list_rule_logs))
}
