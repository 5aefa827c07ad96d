use change_intake::domain::payload::normalize_value;
use change_intake::{
    ChangeRequestService, ChangeRequestStore, ChangeSnapshot, ChangeStatus, DraftRequest,
    InMemoryChangeRequestStore, IntakeError, IntakePolicy, Payload, StaticActor,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn service(store: &Arc<InMemoryChangeRequestStore>) -> ChangeRequestService {
    ChangeRequestService::new(
        Arc::clone(store) as Arc<dyn ChangeRequestStore>,
        Arc::new(StaticActor::new("alice")),
        IntakePolicy::default(),
    )
}

fn map(v: Value) -> Payload {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

fn assert_duplicate(result: Result<impl std::fmt::Debug, IntakeError>) -> String {
    match result {
        Err(IntakeError::DuplicateConflict { message, .. }) => message,
        other => panic!("expected a duplicate conflict, got {other:?}"),
    }
}

// ─── Normalization & diff ─────────────────────────────────────────────────────

#[test]
fn normalization_is_idempotent() {
    let fixtures = [
        json!(null),
        json!("  padded  "),
        json!(3.5),
        json!([" a ", {"k": [" b ", null, true]}, 7]),
        json!({"outer": {"inner": {" key ": " value "}}, "list": [[" x "]], "n": 1}),
    ];
    for x in fixtures {
        let once = normalize_value(&x);
        assert_eq!(normalize_value(&once), once, "not idempotent for {x}");
    }
}

#[test]
fn diff_lists_each_differing_key_once() {
    let before = map(json!({"a": 1, "b": {"x": [1, 2]}, "c": "same", "d": null}));
    let after = map(json!({"a": 2, "b": {"x": [1, 2]}, "c": " same ", "e": false}));
    let snap = ChangeSnapshot::of(Some(&before), Some(&after));

    let fields: Vec<&str> = snap.changes().iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, vec!["a", "e"]);
    assert_eq!(snap.changes()[0].before, json!(1));
    assert_eq!(snap.changes()[1].before, Value::Null);
    assert_eq!(snap.changes()[1].after, json!(false));
}

#[test]
fn diff_survives_a_storage_round_trip() {
    let before = map(json!({"name": "ops", "perms": ["read"]}));
    let after = map(json!({"name": "ops", "perms": ["read", "write"], "desc": "x"}));
    let snap = ChangeSnapshot::of(Some(&before), Some(&after));

    assert_eq!(ChangeSnapshot::from_value(&snap.to_value()), snap);
    let text = serde_json::to_string(&snap.to_value()).unwrap();
    assert_eq!(ChangeSnapshot::from_json(&text), snap);
}

// ─── Duplicate detection ──────────────────────────────────────────────────────

#[tokio::test]
async fn resource_id_match_is_case_insensitive() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    svc.draft(DraftRequest::new("USER", "UPDATE").resource_id("alice"))
        .await
        .unwrap();

    let message = assert_duplicate(
        svc.draft(DraftRequest::new("user", "DELETE").resource_id(" ALICE "))
            .await,
    );
    assert!(message.contains("ALICE"), "{message}");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn menu_path_fingerprint_blocks_without_id() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    svc.draft(DraftRequest::new("PORTAL_MENU", "CREATE").after(json!({"path": "/reports/sales"})))
        .await
        .unwrap();

    assert_duplicate(
        svc.draft(
            DraftRequest::new("PORTAL_MENU", "CREATE").after(json!({"path": "/Reports/Sales"})),
        )
        .await,
    );
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn no_conflict_across_resource_types() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    svc.draft(DraftRequest::new("USER", "CREATE").after(json!({"username": "alice"})))
        .await
        .unwrap();
    svc.draft(DraftRequest::new("ROLE", "CREATE").after(json!({"name": "alice"})))
        .await
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn categories_are_derived_from_type() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let config = svc.draft(DraftRequest::new("config", "update")).await.unwrap();
    let other = svc.draft(DraftRequest::new("UNKNOWN_X", "update")).await.unwrap();
    assert_eq!(config.category.as_str(), "SYSTEM_CONFIG");
    assert_eq!(other.category.as_str(), "GENERAL");
}

#[tokio::test]
async fn non_deduplicated_types_skip_the_check() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let draft = || DraftRequest::new("ORG", "CREATE").after(json!({"name": "Finance"}));

    let (a, b) = tokio::join!(svc.draft(draft()), svc.draft(draft()));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(store.len(), 2);
    assert!(store.all().iter().all(|r| r.dedup_key.is_none()));
}

#[tokio::test]
async fn decided_requests_no_longer_block() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let mut first = svc
        .draft(DraftRequest::new("ROLE", "CREATE").after(json!({"name": "auditor"})))
        .await
        .unwrap();
    first.decide(ChangeStatus::Approved, "bob", None);
    store.save(first).await.unwrap();

    svc.draft(DraftRequest::new("ROLE", "UPDATE").after(json!({"name": "AUDITOR"})))
        .await
        .unwrap();
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn status_set_directly_does_not_keep_blocking() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let mut first = svc
        .draft(DraftRequest::new("USER", "CREATE").after(json!({"username": "alice"})))
        .await
        .unwrap();
    first.status = ChangeStatus::Approved;
    store.save(first).await.unwrap();

    svc.draft(DraftRequest::new("USER", "UPDATE").after(json!({"username": "alice"})))
        .await
        .unwrap();
    assert_eq!(store.len(), 2);
}

// ─── End to end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn drafting_an_email_fix() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let cr = svc
        .draft(DraftRequest {
            resource_type: Some("USER".into()),
            action: Some("update".into()),
            resource_id: None,
            after: Some(json!({"username": "bob", "email": "b@x.com"})),
            before: Some(json!({"username": "bob", "email": "old@x.com"})),
            reason: Some("fix email".into()),
        })
        .await
        .unwrap();

    assert!(cr.id.is_some());
    assert_eq!(cr.status, ChangeStatus::Pending);
    assert_eq!(cr.resource_type.as_str(), "USER");
    assert_eq!(cr.action.as_str(), "UPDATE");
    assert_eq!(cr.requested_by, "alice");
    assert_eq!(cr.reason.as_deref(), Some("fix email"));
    assert_eq!(cr.last_error, None);

    let snap = cr.snapshot();
    assert_eq!(snap.changes().len(), 1);
    let change = &snap.changes()[0];
    assert_eq!(change.field, "email");
    assert_eq!(change.before, json!("old@x.com"));
    assert_eq!(change.after, json!("b@x.com"));

    let stored = store.find_by_id(cr.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored, cr);
}

#[derive(Serialize)]
struct UserForm<'a> {
    username: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

#[tokio::test]
async fn drafting_from_typed_forms() {
    let store = Arc::new(InMemoryChangeRequestStore::new());
    let svc = service(&store);
    let before = UserForm {
        username: "bob",
        email: "old@x.com",
        phone: None,
    };
    let after = UserForm {
        username: " bob ",
        email: "b@x.com",
        phone: None,
    };
    let draft = DraftRequest::new("USER", "UPDATE")
        .after_from(&after)
        .unwrap()
        .before_from(&before)
        .unwrap();
    let cr = svc.draft(draft).await.unwrap();

    assert_eq!(
        cr.payload_json.as_deref(),
        Some(r#"{"username":"bob","email":"b@x.com"}"#)
    );
    let snap = cr.snapshot();
    assert_eq!(snap.changes().len(), 1);
    assert_eq!(snap.changes()[0].field, "email");

    let err = svc
        .draft(DraftRequest::new("USER", "UPDATE").after_from(&after).unwrap())
        .await
        .unwrap_err();
    assert!(err.is_duplicate());
}
