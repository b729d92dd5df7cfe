use crate::audit::RuleAuditLog;
use crate::dedup::NotificationDedupTracker;
use crate::evaluator::{evaluate, match_records, EvalContext};
use crate::filter::AlertFilters;
use crate::store::{RulePatch, RuleStore};
use crate::RuleError;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use riskwatch_common::types::{
    Blocked, DeadlineProgress, RiskLevel, Rule, RuleAction, RuleChangeLogEntry, RuleKind,
    TaskRecord,
};
use riskwatch_storage::{
    AuditPersistence, AuditQuery, MemoryStore, RulePersistence, SqliteRuleStore, StorageError,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

fn cst() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// 2026-03-10 10:00 in UTC+8
fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-10T02:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

fn ctx() -> EvalContext {
    EvalContext::new(now(), cst())
}

fn day(offset: i64) -> String {
    (today() + Duration::days(offset)).format("%Y-%m-%d").to_string()
}

fn deadline_rule(threshold_days: u32, progress_threshold: u8, include_milestones: bool) -> Rule {
    Rule {
        key: "deadline_progress".into(),
        name: "临期进度滞后".into(),
        enabled: true,
        auto_notify: false,
        kind: RuleKind::DeadlineProgress(DeadlineProgress {
            threshold_days,
            progress_threshold,
            include_milestones,
        }),
        updated_at: now(),
    }
}

fn blocked_rule(value: Option<&str>) -> Rule {
    Rule {
        key: "blocked".into(),
        name: "任务阻塞".into(),
        enabled: true,
        auto_notify: true,
        kind: RuleKind::Blocked(Blocked {
            blocked_value: value.map(str::to_string),
        }),
        updated_at: now(),
    }
}

fn overdue_rule() -> Rule {
    Rule {
        key: "overdue".into(),
        name: "任务逾期".into(),
        enabled: true,
        auto_notify: true,
        kind: RuleKind::Overdue,
        updated_at: now(),
    }
}

fn default_rules() -> Vec<Rule> {
    vec![
        blocked_rule(Some("是")),
        deadline_rule(7, 80, true),
        overdue_rule(),
    ]
}

fn record(id: &str, end_offset: Option<i64>, progress: serde_json::Value) -> TaskRecord {
    TaskRecord {
        record_id: id.into(),
        name: Some(format!("任务 {id}")),
        assignee: Some("张三".into()),
        project: Some("Apollo".into()),
        status: Some("进行中".into()),
        end_date: end_offset.map(|d| json!(day(d))),
        progress: Some(progress),
        ..Default::default()
    }
}

fn keys(items: &[riskwatch_common::types::AlertItem]) -> Vec<&str> {
    items.iter().map(|i| i.record_id.as_str()).collect()
}

// ---- AlertEvaluator ----

#[test]
fn days_left_is_ceiling_of_remaining_time() {
    let ctx = ctx();
    assert_eq!(ctx.days_left(today()), Some(0));
    assert_eq!(ctx.days_left(today() + Duration::days(1)), Some(1));
    assert_eq!(ctx.days_left(today() + Duration::days(3)), Some(3));
    assert_eq!(ctx.days_left(today() - Duration::days(1)), Some(-1));
    assert_eq!(ctx.days_left(today() - Duration::days(2)), Some(-2));
}

#[test]
fn deadline_progress_matches_near_due_low_progress() {
    let rules = vec![deadline_rule(7, 80, true)];
    let items = evaluate(&rules, &[record("r1", Some(3), json!(50))], &ctx(), &AlertFilters::default());

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.days_left, Some(3));
    assert_eq!(item.progress, Some(50.0));
    assert_eq!(item.matched_rule_keys, vec!["deadline_progress"]);
    assert!(item.risk_level >= RiskLevel::Medium);
}

#[test]
fn deadline_progress_skips_high_progress() {
    let rules = vec![deadline_rule(7, 80, true)];
    let items = evaluate(&rules, &[record("r1", Some(3), json!(95))], &ctx(), &AlertFilters::default());
    assert!(items.is_empty());
}

#[test]
fn excluded_milestones_never_match_deadline_progress() {
    let rules = vec![deadline_rule(365, 100, false)];
    let records: Vec<TaskRecord> = [-3, 0, 1, 30]
        .iter()
        .enumerate()
        .map(|(i, offset)| TaskRecord {
            is_milestone: true,
            ..record(&format!("m{i}"), Some(*offset), json!(0))
        })
        .collect();

    let items = match_records(&rules, &records, &ctx());
    assert!(items.iter().all(|i| !i.matched("deadline_progress")));
    assert!(items.is_empty());
}

#[test]
fn malformed_fields_only_disable_dependent_rules() {
    let rules = default_rules();
    let broken = TaskRecord {
        end_date: Some(json!("someday")),
        progress: Some(json!("lots")),
        blocked: Some("是".into()),
        ..record("broken", None, json!(null))
    };

    let items = match_records(&rules, &[broken], &ctx());
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].matched_rule_keys, vec!["blocked"]);
    assert_eq!(items[0].days_left, None);
    assert_eq!(items[0].progress, None);
}

#[test]
fn end_date_at_range_limit_is_treated_as_unparseable() {
    let rules = default_rules();
    let records: Vec<TaskRecord> = [json!("-262143-01-01"), json!(-8_334_601_228_800_000_i64)]
        .into_iter()
        .enumerate()
        .map(|(i, end_date)| TaskRecord {
            end_date: Some(end_date),
            blocked: Some("是".into()),
            ..record(&format!("edge{i}"), None, json!(0))
        })
        .collect();

    let items = match_records(&rules, &records, &ctx());
    assert_eq!(keys(&items), vec!["edge0", "edge1"]);
    for item in &items {
        assert_eq!(item.matched_rule_keys, vec!["blocked"]);
        assert_eq!(item.days_left, None);
        assert_eq!(item.end_date, None);
    }
    assert_eq!(ctx().days_left(NaiveDate::MIN), None);
}

#[test]
fn unparseable_progress_is_treated_as_zero() {
    let rules = vec![deadline_rule(7, 10, true)];
    let items = match_records(&rules, &[record("r1", Some(2), json!("n/a"))], &ctx());
    assert_eq!(keys(&items), vec!["r1"]);
}

#[test]
fn overdue_respects_terminal_status() {
    let rules = vec![overdue_rule()];
    let open = record("open", Some(-2), json!(100));
    let done = TaskRecord {
        status: Some("已完成".into()),
        ..record("done", Some(-2), json!(100))
    };
    let done_en = TaskRecord {
        status: Some("Done".into()),
        ..record("done_en", Some(-2), json!(100))
    };
    let due_today = record("today", Some(0), json!(0));

    let items = match_records(&rules, &[open, done, done_en, due_today], &ctx());
    assert_eq!(keys(&items), vec!["open"]);
    assert_eq!(items[0].risk_level, RiskLevel::High);
}

#[test]
fn custom_terminal_statuses_replace_defaults() {
    let ctx = ctx().with_terminal_statuses(vec!["Shipped".into()]);
    let shipped = TaskRecord {
        status: Some("shipped".into()),
        ..record("a", Some(-1), json!(0))
    };
    let done = TaskRecord {
        status: Some("已完成".into()),
        ..record("b", Some(-1), json!(0))
    };
    let items = match_records(&[overdue_rule()], &[shipped, done], &ctx);
    assert_eq!(keys(&items), vec!["b"]);
}

#[test]
fn disabling_a_rule_removes_only_its_matches() {
    let records = vec![
        TaskRecord {
            blocked: Some("是".into()),
            ..record("a", Some(2), json!(10))
        },
        record("b", Some(-1), json!(10)),
        TaskRecord {
            blocked: Some("是".into()),
            ..record("c", Some(30), json!(90))
        },
    ];

    let all = match_records(&default_rules(), &records, &ctx());
    let mut rules = default_rules();
    rules[1].enabled = false; // deadline_progress
    let without = match_records(&rules, &records, &ctx());

    for item in &all {
        let expected: Vec<&String> = item
            .matched_rule_keys
            .iter()
            .filter(|k| k.as_str() != "deadline_progress")
            .collect();
        let after = without.iter().find(|i| i.record_id == item.record_id);
        match after {
            Some(after) => assert_eq!(after.matched_rule_keys.iter().collect::<Vec<_>>(), expected),
            None => assert!(expected.is_empty()),
        }
    }
    assert!(without.iter().all(|i| !i.matched("deadline_progress")));
}

#[test]
fn severity_takes_max_of_hint_and_escalation() {
    let rules = default_rules();
    let blocked_hinted = TaskRecord {
        blocked: Some("是".into()),
        risk_level_hint: Some("高".into()),
        ..record("hinted", Some(30), json!(90))
    };
    let blocked_plain = TaskRecord {
        blocked: Some("是".into()),
        ..record("plain", Some(30), json!(90))
    };
    let overdue_low_hint = TaskRecord {
        risk_level_hint: Some("低".into()),
        ..record("late", Some(-1), json!(90))
    };

    let items = match_records(&rules, &[blocked_hinted, blocked_plain, overdue_low_hint], &ctx());
    let level = |id: &str| items.iter().find(|i| i.record_id == id).unwrap().risk_level;
    assert_eq!(level("hinted"), RiskLevel::High);
    assert_eq!(level("plain"), RiskLevel::Low);
    assert_eq!(level("late"), RiskLevel::High);
}

#[test]
fn results_sort_by_days_left_with_missing_last() {
    let rules = vec![blocked_rule(Some("是"))];
    let records: Vec<TaskRecord> = [("a", Some(5)), ("b", Some(-2)), ("c", None), ("d", Some(0))]
        .into_iter()
        .map(|(id, offset)| TaskRecord {
            blocked: Some("是".into()),
            ..record(id, offset, json!(0))
        })
        .collect();

    let items = match_records(&rules, &records, &ctx());
    let days: Vec<Option<i64>> = items.iter().map(|i| i.days_left).collect();
    assert_eq!(days, vec![Some(-2), Some(0), Some(5), None]);
}

#[test]
fn ties_break_by_record_id() {
    let rules = vec![blocked_rule(Some("是"))];
    let records: Vec<TaskRecord> = ["z", "m", "a"]
        .into_iter()
        .map(|id| TaskRecord {
            blocked: Some("是".into()),
            ..record(id, Some(1), json!(0))
        })
        .collect();
    assert_eq!(keys(&match_records(&rules, &records, &ctx())), vec!["a", "m", "z"]);
}

#[test]
fn evaluation_is_idempotent() {
    let rules = default_rules();
    let records = vec![
        record("x", Some(1), json!("30%")),
        TaskRecord {
            blocked: Some("是".into()),
            blocked_reason: Some("等待设计稿".into()),
            ..record("y", None, json!(null))
        },
        record("z", Some(-5), json!(0)),
    ];
    let first = serde_json::to_string(&evaluate(&rules, &records, &ctx(), &AlertFilters::default())).unwrap();
    let second = serde_json::to_string(&evaluate(&rules, &records, &ctx(), &AlertFilters::default())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn filters_narrow_output_after_matching() {
    let rules = default_rules();
    let records = vec![
        TaskRecord {
            project: Some("Apollo".into()),
            assignee: Some("张三".into()),
            ..record("a", Some(1), json!(0))
        },
        TaskRecord {
            project: Some("Gemini".into()),
            assignee: Some("李四".into()),
            ..record("b", Some(-3), json!(0))
        },
    ];

    let unfiltered = match_records(&rules, &records, &ctx());
    assert_eq!(unfiltered.len(), 2);

    let by_project = AlertFilters {
        project: Some("Gemini".into()),
        ..Default::default()
    };
    assert_eq!(keys(&evaluate(&rules, &records, &ctx(), &by_project)), vec!["b"]);

    let by_assignee = AlertFilters {
        assignee: Some("张".into()),
        ..Default::default()
    };
    assert_eq!(keys(&evaluate(&rules, &records, &ctx(), &by_assignee)), vec!["a"]);

    let by_level = AlertFilters {
        risk_level: Some(RiskLevel::High),
        ..Default::default()
    };
    assert_eq!(keys(&evaluate(&rules, &records, &ctx(), &by_level)), vec!["b"]);

    let blank = AlertFilters {
        project: Some("  ".into()),
        ..Default::default()
    };
    assert_eq!(evaluate(&rules, &records, &ctx(), &blank).len(), 2);

    // matching is unaffected by a filter that was applied before
    assert_eq!(match_records(&rules, &records, &ctx()), unfiltered);
}

#[test]
fn no_enabled_rules_yields_nothing() {
    let mut rules = default_rules();
    for rule in &mut rules {
        rule.enabled = false;
    }
    let items = match_records(&rules, &[record("a", Some(-1), json!(0))], &ctx());
    assert!(items.is_empty());
}

// ---- RuleStore ----

fn open_store() -> (Arc<MemoryStore>, RuleStore) {
    let backing = Arc::new(MemoryStore::new());
    let audit = Arc::new(RuleAuditLog::new(backing.clone()));
    let store = RuleStore::open(backing.clone(), audit, default_rules()).unwrap();
    (backing, store)
}

fn log_entries(backing: &MemoryStore) -> Vec<RuleChangeLogEntry> {
    backing.list(&AuditQuery::default()).unwrap()
}

#[test]
fn open_seeds_missing_rules_once() {
    let (backing, store) = open_store();
    let keys: Vec<String> = store.get_all().into_iter().map(|r| r.key).collect();
    assert_eq!(keys, vec!["blocked", "deadline_progress", "overdue"]);
    assert_eq!(backing.load().unwrap().len(), 3);

    store
        .update("blocked", &RulePatch { enabled: Some(false), ..Default::default() })
        .unwrap();

    // reopening keeps the persisted state instead of the defaults
    let audit = Arc::new(RuleAuditLog::new(backing.clone()));
    let reopened = RuleStore::open(backing.clone(), audit, default_rules()).unwrap();
    assert!(!reopened.get("blocked").unwrap().enabled);
}

#[test]
fn negative_threshold_is_rejected_without_log() {
    let (backing, store) = open_store();
    let before = store.get("deadline_progress").unwrap();

    let err = store
        .update(
            "deadline_progress",
            &RulePatch {
                threshold_days: Some(-1),
                enabled: Some(false),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, RuleError::InvalidThreshold(-1)));
    assert!(err.is_validation());
    assert_eq!(store.get("deadline_progress").unwrap(), before);
    assert!(log_entries(&backing).is_empty());
}

#[test]
fn progress_threshold_out_of_range_is_rejected() {
    let (backing, store) = open_store();
    for bad in [-5, 101] {
        let err = store
            .update(
                "deadline_progress",
                &RulePatch {
                    progress_threshold: Some(bad),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidProgressThreshold(v) if v == bad));
    }
    assert!(log_entries(&backing).is_empty());
}

#[test]
fn unknown_key_is_reported() {
    let (_backing, store) = open_store();
    let err = store.update("stale", &RulePatch::default()).unwrap_err();
    assert!(matches!(err, RuleError::UnknownRuleKey(ref k) if k == "stale"));
    assert!(!err.is_validation());
}

#[test]
fn fields_of_other_rule_types_are_rejected() {
    let (backing, store) = open_store();
    let err = store
        .update(
            "overdue",
            &RulePatch {
                blocked_value: Some("是".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RuleError::FieldNotApplicable { field: "blockedValue", .. }));

    let err = store
        .update(
            "blocked",
            &RulePatch {
                threshold_days: Some(3),
                auto_notify: Some(false),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, RuleError::FieldNotApplicable { field: "thresholdDays", .. }));
    assert!(store.get("blocked").unwrap().auto_notify);
    assert!(log_entries(&backing).is_empty());
}

#[test]
fn two_field_update_writes_two_entries() {
    let (backing, store) = open_store();
    let updated = store
        .update(
            "deadline_progress",
            &RulePatch {
                threshold_days: Some(5),
                progress_threshold: Some(60),
                ..Default::default()
            },
        )
        .unwrap();

    match &updated.kind {
        RuleKind::DeadlineProgress(s) => {
            assert_eq!(s.threshold_days, 5);
            assert_eq!(s.progress_threshold, 60);
        }
        other => panic!("unexpected kind {other:?}"),
    }

    let entries = log_entries(&backing);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, RuleAction::ThresholdUpdated);
    assert_eq!(entries[0].note, "thresholdDays: 7 → 5");
    assert_eq!(entries[1].note, "progressThreshold: 80 → 60");
    assert_eq!(entries[0].created_at, entries[1].created_at);
    assert_ne!(entries[0].id, entries[1].id);
    assert!(entries.iter().all(|e| e.rule_key == "deadline_progress"));
    assert_eq!(updated.updated_at, entries[0].created_at);
}

#[test]
fn action_categories_and_notes() {
    let (backing, store) = open_store();
    store
        .update("overdue", &RulePatch { enabled: Some(false), ..Default::default() })
        .unwrap();
    store
        .update("overdue", &RulePatch { enabled: Some(true), auto_notify: Some(false), ..Default::default() })
        .unwrap();
    store
        .update("blocked", &RulePatch { blocked_value: Some("阻塞".into()), ..Default::default() })
        .unwrap();
    store
        .update("blocked", &RulePatch { blocked_value: Some(" ".into()), ..Default::default() })
        .unwrap();
    store
        .update("deadline_progress", &RulePatch { include_milestones: Some(false), ..Default::default() })
        .unwrap();

    let got: Vec<(RuleAction, String)> = log_entries(&backing)
        .into_iter()
        .map(|e| (e.action, e.note))
        .collect();
    assert_eq!(
        got,
        vec![
            (RuleAction::Disabled, "enabled: true → false".to_string()),
            (RuleAction::Enabled, "enabled: false → true".to_string()),
            (RuleAction::AutoNotifyToggled, "autoNotify: true → false".to_string()),
            (RuleAction::BlockedValueUpdated, "blockedValue: \"是\" → \"阻塞\"".to_string()),
            (RuleAction::BlockedValueUpdated, "blockedValue: \"阻塞\" → (unset)".to_string()),
            (RuleAction::MilestoneScopeUpdated, "includeMilestones: true → false".to_string()),
        ]
    );
}

#[test]
fn no_op_update_writes_nothing() {
    let (backing, store) = open_store();
    let before = store.get("deadline_progress").unwrap();
    let after = store
        .update(
            "deadline_progress",
            &RulePatch {
                threshold_days: Some(7),
                enabled: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(before, after);
    assert!(log_entries(&backing).is_empty());
}

struct FailingAudit;

impl AuditPersistence for FailingAudit {
    fn append(&self, _entry: &RuleChangeLogEntry) -> riskwatch_storage::Result<()> {
        Err(StorageError::Other("disk full".into()))
    }

    fn list(&self, _query: &AuditQuery) -> riskwatch_storage::Result<Vec<RuleChangeLogEntry>> {
        Ok(Vec::new())
    }
}

#[test]
fn audit_failure_does_not_block_update() {
    let backing = Arc::new(MemoryStore::new());
    let audit = Arc::new(RuleAuditLog::new(Arc::new(FailingAudit)));
    let store = RuleStore::open(backing.clone(), audit, default_rules()).unwrap();

    let updated = store
        .update("overdue", &RulePatch { enabled: Some(false), ..Default::default() })
        .unwrap();
    assert!(!updated.enabled);
    assert!(!store.get("overdue").unwrap().enabled);
    let persisted = backing.load().unwrap();
    assert!(!persisted.iter().find(|r| r.key == "overdue").unwrap().enabled);
}

struct FailingRules(MemoryStore);

impl RulePersistence for FailingRules {
    fn load(&self) -> riskwatch_storage::Result<Vec<riskwatch_common::types::Rule>> {
        self.0.load()
    }

    fn save(&self, _rule: &riskwatch_common::types::Rule) -> riskwatch_storage::Result<()> {
        Err(StorageError::Other("read-only".into()))
    }
}

#[test]
fn persistence_failure_leaves_rule_unchanged() {
    let seeded = MemoryStore::new();
    for rule in default_rules() {
        seeded.save(&rule).unwrap();
    }
    let backing = Arc::new(MemoryStore::new());
    let audit = Arc::new(RuleAuditLog::new(backing.clone()));
    let store = RuleStore::open(Arc::new(FailingRules(seeded)), audit, default_rules()).unwrap();

    let err = store
        .update("overdue", &RulePatch { enabled: Some(false), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, RuleError::Persistence(_)));
    assert!(store.get("overdue").unwrap().enabled);
    assert!(log_entries(&backing).is_empty());
}

#[tokio::test]
async fn updates_are_broadcast() {
    let (_backing, store) = open_store();
    let mut rx = store.subscribe();
    store
        .update("deadline_progress", &RulePatch { threshold_days: Some(3), ..Default::default() })
        .unwrap();
    let change = rx.recv().await.unwrap();
    assert_eq!(change.rule.key, "deadline_progress");
    assert_eq!(change.entries.len(), 1);
    assert_eq!(change.entries[0].note, "thresholdDays: 7 → 3");
}

#[test]
fn concurrent_updates_to_one_key_serialize() {
    let (backing, store) = open_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for round in 0..25 {
                    let enabled = (i + round) % 2 == 0;
                    store
                        .update("overdue", &RulePatch { enabled: Some(enabled), ..Default::default() })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Replaying the log must reproduce the final state: every entry flips
    // the flag relative to the previous one.
    let entries = log_entries(&backing);
    let mut state = true;
    for entry in &entries {
        let expected = if state { RuleAction::Disabled } else { RuleAction::Enabled };
        assert_eq!(entry.action, expected);
        state = !state;
    }
    assert_eq!(store.get("overdue").unwrap().enabled, state);
}

#[test]
fn blocked_value_is_stored_verbatim() {
    let (_backing, store) = open_store();
    let updated = store
        .update("blocked", &RulePatch { blocked_value: Some(" 卡住 ".into()), ..Default::default() })
        .unwrap();
    assert_eq!(
        updated.kind,
        RuleKind::Blocked(Blocked {
            blocked_value: Some(" 卡住 ".into())
        })
    );

    let padded = TaskRecord {
        blocked: Some(" 卡住 ".into()),
        ..record("padded", None, json!(0))
    };
    let bare = TaskRecord {
        blocked: Some("卡住".into()),
        ..record("bare", None, json!(0))
    };
    let items = match_records(&store.get_all(), &[padded, bare], &ctx());
    assert_eq!(keys(&items), vec!["padded"]);
}

#[test]
fn store_state_survives_sqlite_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let db = Arc::new(SqliteRuleStore::open(dir.path()).unwrap());
        let audit = Arc::new(RuleAuditLog::new(db.clone()));
        let store = RuleStore::open(db.clone(), audit, default_rules()).unwrap();
        store
            .update("blocked", &RulePatch { blocked_value: Some("卡住".into()), ..Default::default() })
            .unwrap();
    }

    let db = Arc::new(SqliteRuleStore::open(dir.path()).unwrap());
    let audit = Arc::new(RuleAuditLog::new(db.clone()));
    let store = RuleStore::open(db.clone(), audit.clone(), default_rules()).unwrap();
    assert_eq!(
        store.get("blocked").unwrap().kind,
        RuleKind::Blocked(Blocked {
            blocked_value: Some("卡住".into())
        })
    );
    let entries = audit
        .list(&AuditQuery {
            rule_key: Some("blocked".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].note, "blockedValue: \"是\" → \"卡住\"");
}

// ---- NotificationDedupTracker ----

#[test]
fn should_notify_once_per_onset() {
    let tracker = NotificationDedupTracker::new();
    assert!(tracker.should_notify("rec1", "overdue"));
    assert!(!tracker.should_notify("rec1", "overdue"));
    // different rule on the same record is a separate condition
    assert!(tracker.should_notify("rec1", "blocked"));

    assert!(tracker.clear("rec1", "overdue"));
    assert!(tracker.should_notify("rec1", "overdue"));
}

#[test]
fn persisting_condition_notifies_exactly_once() {
    let tracker = NotificationDedupTracker::new();
    let notified = (0..10).filter(|_| tracker.should_notify("rec1", "overdue")).count();
    assert_eq!(notified, 1);
}

#[test]
fn mark_notified_records_delivery() {
    let tracker = NotificationDedupTracker::new();
    assert!(tracker.should_notify("rec1", "overdue"));
    assert!(tracker.entries()[0].notified_at.is_none());
    tracker.mark_notified("rec1", "overdue");
    let entry = &tracker.entries()[0];
    assert!(entry.notified_at.is_some());
    assert!(entry.first_seen_at <= entry.notified_at.unwrap());
}

#[test]
fn retain_active_clears_resolved_conditions() {
    let tracker = NotificationDedupTracker::new();
    for id in ["a", "b", "c"] {
        tracker.should_notify(id, "overdue");
    }
    tracker.should_notify("a", "blocked");

    let active: HashSet<&str> = ["b"].into_iter().collect();
    assert_eq!(tracker.retain_active("overdue", &active), 2);
    assert!(tracker.contains("b", "overdue"));
    assert!(tracker.contains("a", "blocked"));
    assert!(!tracker.contains("a", "overdue"));

    assert_eq!(tracker.clear_rule("blocked"), 1);
    assert_eq!(tracker.len(), 1);
}
