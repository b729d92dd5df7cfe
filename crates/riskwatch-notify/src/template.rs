//! Message rendering shared by all channels.

use riskwatch_common::types::{AlertItem, Rule};

/// Human-readable remaining time, e.g. `剩余 3 天`, `今天到期`, `已逾期 2 天`.
pub fn describe_days_left(days_left: Option<i64>) -> String {
    match days_left {
        None => "无截止日期".to_string(),
        Some(0) => "今天到期".to_string(),
        Some(d) if d > 0 => format!("剩余 {d} 天"),
        Some(d) => format!("已逾期 {} 天", -d),
    }
}

/// Progress as a whole percentage, `-` when unknown.
pub fn describe_progress(progress: Option<f64>) -> String {
    progress.map_or_else(|| "-".to_string(), |p| format!("{p:.0}%"))
}

/// Renders the plain-text notification body for one alert.
///
/// # Examples
///
/// ```
/// use riskwatch_notify::template::describe_days_left;
///
/// assert_eq!(describe_days_left(Some(3)), "剩余 3 天");
/// assert_eq!(describe_days_left(Some(-2)), "已逾期 2 天");
/// ```
pub fn render_message(alert: &AlertItem, rule: &Rule) -> String {
    let mut lines = vec![
        format!("【项目风险提醒】{}", rule.name),
        format!(
            "任务：{}",
            alert.task_name.as_deref().unwrap_or(&alert.record_id)
        ),
        format!("负责人：{}", alert.assignee.as_deref().unwrap_or("未分配")),
        format!("项目：{}", alert.project.as_deref().unwrap_or("-")),
    ];

    match alert.end_date {
        Some(end) => lines.push(format!(
            "截止：{}（{}）",
            end.format("%Y-%m-%d"),
            describe_days_left(alert.days_left)
        )),
        None => lines.push(format!("截止：{}", describe_days_left(None))),
    }
    lines.push(format!("进度：{}", describe_progress(alert.progress)));
    lines.push(format!("风险等级：{}", alert.risk_level.label()));

    if let Some(reason) = alert.blocked_reason.as_deref().filter(|r| !r.trim().is_empty()) {
        lines.push(format!("阻塞原因：{reason}"));
    }
    lines.join("\n")
}

/// Replaces `{{placeholder}}` tokens in a webhook body template.
///
/// Substituted values are JSON-escaped because templates are JSON documents.
pub fn fill_placeholders(template: &str, alert: &AlertItem, rule: &Rule) -> String {
    use crate::utils::json_escape;

    let days_left = alert.days_left.map_or_else(String::new, |d| d.to_string());
    let progress = alert.progress.map_or_else(String::new, |p| format!("{p:.0}"));
    template
        .replace("{{record_id}}", &json_escape(&alert.record_id))
        .replace(
            "{{task_name}}",
            &json_escape(alert.task_name.as_deref().unwrap_or(&alert.record_id)),
        )
        .replace("{{assignee}}", &json_escape(alert.assignee.as_deref().unwrap_or("")))
        .replace("{{project}}", &json_escape(alert.project.as_deref().unwrap_or("")))
        .replace("{{days_left}}", &days_left)
        .replace("{{progress}}", &progress)
        .replace("{{risk_level}}", &alert.risk_level.to_string())
        .replace("{{rule_key}}", &json_escape(&rule.key))
        .replace("{{rule_name}}", &json_escape(&rule.name))
        .replace("{{message}}", &json_escape(&render_message(alert, rule)))
}
