//! End-to-end reconciliation passes over the in-memory adapters.

use caselink::adapters::memory::{MemoryServices, MemorySite, MemoryStore};
use caselink::config::Config;
use caselink::drift::{detect_drift, run_drift_pass, NO_GROUP_MESSAGE};
use caselink::linking::{portal_link, reconcile_links, DOCUMENTS_NODE};
use caselink::ports::{FieldMap, RecordStore, Role};
use caselink::responses::reconcile_responses;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

const SITE: &str = "https://sites.example.org/case42";
const ROOT: &str = "Shared Documents/PA Submission";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 11, 9, 30, 0).unwrap()
}

struct Fixture {
    services: MemoryServices,
    config: Config,
    hub: MemoryStore,
    cases: MemoryStore,
    site: MemorySite,
}

impl Fixture {
    fn new() -> Self {
        let services = MemoryServices::new(now());
        let mut config = Config::default();
        config.drift.digest_recipients = vec!["digest@example.org".into()];
        let hub = services.store(&config.hub.site_url);
        let cases = services.store(&config.cases.site_url);
        let site = services.connector.add_site(SITE);
        site.grant_site_role("Case Members", Role::Contributor);
        site.push_navigation("Home", "https://sites.example.org/case42/home");
        site.push_navigation(DOCUMENTS_NODE, "https://sites.example.org/case42/docs");
        site.push_navigation("Recycle bin", "https://sites.example.org/case42/bin");
        services.directory.add_user("u0", "lead@example.org");
        services.directory.add_user("u1", "Ann@Example.org");
        services.directory.add_user("u2", "bo@example.org");
        services.directory.seed_member("g-42", "u0");
        services.directory.seed_member("g-42", "u1");
        services.directory.seed_member("g-42", "u2");
        services.directory.set_owners("g-42", &["lead@example.org"]);
        Self { services, config, hub, cases, site }
    }

    fn provisioned_request(&self, status: &str) {
        self.hub.insert(
            &self.config.hub.requests_list,
            "42",
            now() - Duration::days(1),
            json!({
                "Title": "HR-42",
                "Status": status,
                "SiteURL": SITE,
                "GroupID": "g-42",
                "ProjectName": "Harbour Works",
                "ProjectID": 1042,
                "Owners": [{"Email": "lead@example.org"}],
                "Members": [{"Email": "ann@example.org"}, {"Email": "bo@example.org"}]
            }),
        );
    }

    fn submission(&self, id: &str, unique_id: &str, documents: &Value, extra: &Value) {
        let mut fields = json!({
            "Title": "1042",
            "RequestUniqueID": unique_id,
            "CaseRequestId": 42,
            "DocumentsJSON": documents.to_string()
        });
        if let (Some(fields), Some(extra)) = (fields.as_object_mut(), extra.as_object()) {
            fields.extend(extra.clone());
        }
        self.cases.insert(&self.config.cases.submissions_list, id, now(), fields);
    }

    fn submission_field(&self, id: &str, field: &str) -> Option<Value> {
        self.cases
            .record(&self.config.cases.submissions_list, id)
            .and_then(|r| r.fields.get(field).cloned())
    }

    fn response(&self, id: &str, unique_id: &str, documents: &Value, kind: &str) {
        self.cases.insert(
            &self.config.cases.responses_list,
            id,
            now(),
            json!({
                "Title": format!("Response for: {unique_id}"),
                "RequestUniqueID": unique_id,
                "DocumentsJSON": documents.to_string(),
                "Completed": false,
                "ResponseKind": kind
            }),
        );
    }
}

fn call_in(names: &[(&str, &str)]) -> Value {
    let docs: Vec<Value> =
        names.iter().map(|(key, filename)| json!({"key": key, "filename": filename})).collect();
    json!({ "call_in_docs": docs })
}

#[tokio::test]
async fn provisioned_submission_is_linked_placed_and_announced() {
    let fx = Fixture::new();
    fx.provisioned_request("Site creation: Success");
    for key in ["b1", "b2", "b3", "b4"] {
        fx.services.blobs.put(key, format!("content {key}"));
    }
    let documents = json!({
        "call_in_docs": [
            {"key": "b1", "filename": "a.txt"},
            {"key": "b2", "filename": "a.txt"},
            {"key": "b3", "filename": "a.txt"}
        ],
        "submission_docs": [{"key": "b4", "filename": "report.pdf"}]
    });
    fx.submission("1", "u-1", &documents, &json!({}));
    let ctx = fx.services.context();

    let report = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.linked, vec!["1".to_string()]);
    assert_eq!(report.notified, 1);
    assert_eq!(
        fx.site.files_in(&format!("{ROOT}/Call in")),
        vec!["a (1).txt", "a (2).txt", "a.txt"]
    );
    assert_eq!(fx.site.file(&format!("{ROOT}/Call in"), "a (2).txt").unwrap(), b"content b3");
    assert_eq!(fx.site.files_in(&format!("{ROOT}/Summary of submission")), vec!["report.pdf"]);

    assert_eq!(fx.submission_field("1", "CaseSiteUrl"), Some(json!(SITE)));
    assert_eq!(fx.submission_field("1", "CaseGroupID"), Some(json!("g-42")));
    assert_eq!(fx.submission_field("1", "NavigationLinked"), Some(json!(true)));

    let roles = fx.site.folder_roles(ROOT).expect("root has unique permissions");
    assert!(roles.values().all(|role| *role == Role::Reader));
    assert!(roles.contains_key("Case Members"));

    let titles: Vec<String> = fx.site.navigation_nodes().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, ["Home", DOCUMENTS_NODE, "SAU1042", "Recycle bin"]);

    let sent = fx.services.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["lead@example.org", "ann@example.org", "bo@example.org"]);
    assert_eq!(sent[0].subject, "New request SAU1042 submitted");
    assert!(sent[0].html_body.contains("Harbour Works 1042"));

    assert_eq!(fx.services.connector.open_sessions(), 0);
}

#[tokio::test]
async fn linking_is_monotonic_across_passes() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    let ctx = fx.services.context();

    reconcile_links(&ctx, &fx.config).await.unwrap();
    let second = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(second.candidates, 0);
    assert_eq!(fx.services.outbox.sent().len(), 1);
    assert_eq!(fx.site.navigation_nodes().len(), 4);
}

#[tokio::test]
async fn blank_case_site_url_is_still_a_candidate() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({"CaseSiteUrl": "   "}));
    let ctx = fx.services.context();

    let report = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.linked, vec!["1".to_string()]);
    assert_eq!(fx.submission_field("1", "CaseSiteUrl"), Some(json!(SITE)));
}

#[tokio::test]
async fn unprovisioned_request_defers_until_the_site_exists() {
    let fx = Fixture::new();
    fx.provisioned_request("Provisioning");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    let ctx = fx.services.context();

    let first = reconcile_links(&ctx, &fx.config).await.unwrap();
    assert_eq!((first.deferred, first.linked.len()), (1, 0));
    assert_eq!(fx.submission_field("1", "CaseSiteUrl"), None);
    assert!(fx.services.outbox.sent().is_empty());

    let mut status = FieldMap::new();
    status.insert("Status".into(), json!("Site creation: Success"));
    fx.hub.update(&fx.config.hub.requests_list, "42", status).await.unwrap();

    let second = reconcile_links(&ctx, &fx.config).await.unwrap();
    assert_eq!(second.linked, vec!["1".to_string()]);
}

#[tokio::test]
async fn submission_without_request_id_waits() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({"CaseRequestId": 0}));
    let ctx = fx.services.context();

    let report = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.deferred, 1);
    assert!(fx.site.folders().is_empty());
}

#[tokio::test]
async fn failed_link_write_sends_no_email() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.cases.fail_updates_of("1");
    let ctx = fx.services.context();

    let report = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.failed, 1);
    assert!(fx.services.outbox.sent().is_empty());
    assert_eq!(fx.services.connector.open_sessions(), 0);
}

#[tokio::test]
async fn site_failures_do_not_block_the_link() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.services.blobs.put("b1", "one");
    fx.services.blobs.put("b2", "two");
    fx.site.fail_uploads_of("broken.pdf");
    fx.site.fail_permissions();
    fx.submission("1", "u-1", &call_in(&[("b1", "broken.pdf"), ("b2", "fine.pdf")]), &json!({}));
    let ctx = fx.services.context();

    let report = reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.linked.len(), 1);
    assert_eq!(fx.site.files_in(&format!("{ROOT}/Call in")), vec!["fine.pdf"]);
    assert_eq!(fx.services.outbox.sent().len(), 1);
}

#[tokio::test]
async fn navigation_marker_skips_the_node_on_retry() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({"NavigationLinked": true}));
    let ctx = fx.services.context();

    reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(fx.site.navigation_nodes().len(), 3);
}

#[tokio::test]
async fn existing_navigation_node_is_not_duplicated() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.site.push_navigation("SAU1042", &portal_link(&fx.config, "u-1"));
    fx.submission("1", "u-1", &json!({}), &json!({}));
    let ctx = fx.services.context();

    reconcile_links(&ctx, &fx.config).await.unwrap();

    assert_eq!(fx.site.navigation_nodes().len(), 4);
    assert_eq!(fx.submission_field("1", "NavigationLinked"), Some(json!(true)));
}

#[tokio::test]
async fn withdrawal_is_filed_into_a_timestamped_folder() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.services.blobs.put("r1", "withdrawal letter");
    fx.response("7", "u-1", &json!([{"key": "r1", "filename": "letter.docx"}]), "withdrawal");
    let ctx = fx.services.context();
    reconcile_links(&ctx, &fx.config).await.unwrap();

    let report = reconcile_responses(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.completed, vec!["7".to_string()]);
    let folder = format!("{ROOT}/Withdraw request/Withdrawal_2024_05_11_09_30");
    assert_eq!(fx.site.files_in(&folder), vec!["letter.docx"]);
    let sent = fx.services.outbox.sent();
    let email = sent.last().unwrap();
    assert_eq!(email.to, vec!["lead@example.org"]);
    assert_eq!(email.subject, "Request SAU1042 has been withdrawn");

    let again = reconcile_responses(&ctx, &fx.config).await.unwrap();
    assert_eq!(again.candidates, 0);
}

#[tokio::test]
async fn response_waits_for_its_submission_to_be_linked() {
    let fx = Fixture::new();
    fx.provisioned_request("Provisioning");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.response("7", "u-1", &json!([]), "information");
    fx.response("8", "u-unknown", &json!([]), "information");
    let ctx = fx.services.context();

    let report = reconcile_responses(&ctx, &fx.config).await.unwrap();

    assert_eq!((report.deferred, report.completed.len()), (2, 0));
    assert!(fx.services.outbox.sent().is_empty());
}

#[tokio::test]
async fn partially_placed_response_stays_pending() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.services.blobs.put("r1", "one");
    let documents =
        json!([{"key": "r1", "filename": "a.pdf"}, {"key": "gone", "filename": "b.pdf"}]);
    fx.response("7", "u-1", &documents, "information");
    let ctx = fx.services.context();
    reconcile_links(&ctx, &fx.config).await.unwrap();

    let report = reconcile_responses(&ctx, &fx.config).await.unwrap();

    assert_eq!(report.deferred, 1);
    let record = fx.cases.record(&fx.config.cases.responses_list, "7").unwrap();
    assert_eq!(record.fields["Completed"], json!(false));
}

#[tokio::test]
async fn retried_response_reuses_its_first_folder() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.services.blobs.put("r1", "one");
    let documents =
        json!([{"key": "r1", "filename": "a.pdf"}, {"key": "gone", "filename": "b.pdf"}]);
    fx.response("7", "u-1", &documents, "information");
    let ctx = fx.services.context();
    reconcile_links(&ctx, &fx.config).await.unwrap();

    for _ in 0..3 {
        let report = reconcile_responses(&ctx, &fx.config).await.unwrap();
        assert_eq!(report.deferred, 1);
        fx.services.clock.advance(Duration::minutes(5));
    }

    let parent = format!("{ROOT}/Information request responses/");
    let response_folders: Vec<String> =
        fx.site.folders().into_iter().filter(|f| f.starts_with(&parent)).collect();
    let folder = format!("{parent}Response_2024_05_11_09_30");
    assert_eq!(response_folders, vec![folder.clone()]);
    assert_eq!(fx.site.files_in(&folder), vec!["a.pdf"]);
    let record = fx.cases.record(&fx.config.cases.responses_list, "7").unwrap();
    assert_eq!(record.fields["ResponseFolder"], json!(folder));
    assert_eq!(record.fields["Completed"], json!(false));
}

#[tokio::test]
async fn response_with_ambiguous_submission_is_deferred() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.submission("1", "u-1", &json!({}), &json!({}));
    fx.submission("2", "u-1", &json!({}), &json!({}));
    fx.services.blobs.put("r1", "one");
    fx.response("7", "u-1", &json!([{"key": "r1", "filename": "a.pdf"}]), "information");
    let ctx = fx.services.context();
    let linked = reconcile_links(&ctx, &fx.config).await.unwrap();
    assert_eq!(linked.linked.len(), 2);

    let report = reconcile_responses(&ctx, &fx.config).await.unwrap();

    assert_eq!((report.deferred, report.completed.len()), (1, 0));
    let record = fx.cases.record(&fx.config.cases.responses_list, "7").unwrap();
    assert_eq!(record.fields["Completed"], json!(false));
    assert!(!record.fields.contains_key("ResponseFolder"));
    assert!(fx.site.files_in(&format!("{ROOT}/Information request responses")).is_empty());
}

#[tokio::test]
async fn drift_reports_unassigned_teams_in_the_digest() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.hub.insert(
        &fx.config.hub.requests_list,
        "43",
        now() - Duration::days(2),
        json!({"Title": "HR-43", "GroupID": "g-43", "Owners": [{"Email": "lead@example.org"}]}),
    );
    fx.services.directory.set_owners("g-43", &["someone.else@example.org"]);
    fx.hub.insert(&fx.config.hub.requests_list, "44", now(), json!({"Title": "HR-44"}));
    fx.hub.insert(
        &fx.config.hub.requests_list,
        "45",
        now() - Duration::days(30),
        json!({"Title": "HR-45"}),
    );
    let ctx = fx.services.context();

    let report = run_drift_pass(&ctx, &fx.config, 10).await.unwrap();

    let summary: Vec<(&str, bool)> =
        report.entries.iter().map(|e| (e.reference.as_str(), e.changed)).collect();
    assert_eq!(summary, [("HR-42", false), ("HR-43", true), ("HR-44", false)]);
    assert_eq!(report.entries[2].message.as_deref(), Some(NO_GROUP_MESSAGE));

    let sent = fx.services.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["digest@example.org"]);
    assert!(sent[0].html_body.contains("HR-42"));
    assert!(sent[0].html_body.contains("HR-44"));
    assert!(!sent[0].html_body.contains("HR-43"));
}

#[tokio::test]
async fn drift_skips_groups_the_directory_cannot_read() {
    let fx = Fixture::new();
    fx.provisioned_request("Success");
    fx.services.directory.fail_group("g-42");
    let ctx = fx.services.context();

    let report = detect_drift(&ctx, &fx.config, 10).await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn unreachable_case_store_fails_the_pass() {
    let services = MemoryServices::new(now());
    let config = Config::default();
    let ctx = services.context();

    assert!(reconcile_links(&ctx, &config).await.is_err());
    assert!(reconcile_responses(&ctx, &config).await.is_err());
    assert_eq!(services.connector.open_sessions(), 0);
}
