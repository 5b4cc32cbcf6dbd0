//! End-to-end check-in runs against a mock lightnovel server.
//!
//! Covers the full orchestrator pass over real HTTP: status-driven task
//! handling, the balance gate, the fresh list re-fetch for the
//! everything-done bonus, and the favorite cleanup.

use acg_checkin::config::LightnovelConfig;
use acg_checkin::lightnovel;
use acg_checkin::lightnovel::client::{SiteClient, TaskApi, TaskId};
use acg_checkin::lightnovel::tasks::{CheckinRun, TaskOutcome};
use acg_checkin::lightnovel::transport::Transport;
use acg_checkin::session::SessionStore;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pack(value: &serde_json::Value) -> String {
    let raw = serde_json::to_vec(value).unwrap();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}

fn packed(value: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(pack(&value))
}

fn user_info(coin: i64) -> ResponseTemplate {
    packed(json!({
        "code": 0,
        "data": {
            "uid": 7,
            "nickname": "kira",
            "balance": {"coin": coin},
            "level": {"exp": 100},
        },
    }))
}

async fn mount_claim(server: &MockServer, id: i64, coin: i64, exp: i64, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/task/complete"))
        .and(body_partial_json(json!({"d": {"id": id}})))
        .respond_with(packed(json!({"code": 0, "data": {"coin": coin, "exp": exp}})))
        .expect(times)
        .mount(server)
        .await;
}

/// Mount a mixed-status task list and one eligible article, then run the
/// whole pass. Exercises every branch: claimed (login), incomplete with
/// prerequisite (read, favorite, share), claimable without prerequisite
/// (like), balance-gated skip (coin), and the fresh-fetch bonus claim.
#[tokio::test]
async fn full_run_over_mock_server() {
    let server = MockServer::start().await;

    // First list fetch: mixed statuses. Second (for the bonus): claimable.
    Mock::given(method("POST"))
        .and(path("/api/task/list"))
        .respond_with(packed(json!({
            "code": 0,
            "data": {
                "status": 0,
                "items": [
                    {"id": 8, "status": 2},
                    {"id": 1, "status": 0},
                    {"id": 2, "status": 0},
                    {"id": 3, "status": 1},
                    {"id": 5, "status": 0},
                    {"id": 6, "status": 0},
                ],
            },
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/task/list"))
        .respond_with(packed(json!({"code": 0, "data": {"status": 1, "items": []}})))
        .expect(1)
        .mount(&server)
        .await;

    // Discovery: one candidate on page 1, nothing after.
    Mock::given(method("POST"))
        .and(path("/api/category/get-article-by-cate"))
        .and(body_partial_json(json!({"d": {"page": 1, "pageSize": 40}})))
        .respond_with(packed(json!({"code": 0, "data": {"list": [{"aid": 101}]}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/category/get-article-by-cate"))
        .respond_with(packed(json!({"code": 0, "data": {"list": []}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/article/get-detail"))
        .and(body_partial_json(json!({"d": {"aid": 101}})))
        .respond_with(packed(json!({
            "code": 0,
            "data": {"title": "x", "already_like": 0, "already_fav": 0, "already_coin": 0},
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Prerequisites: read and favorite fire; like is already claimable so
    // its prerequisite must not; the coin spend is gated off by balance.
    Mock::given(method("POST"))
        .and(path("/api/history/add-history"))
        .and(body_partial_json(json!({"d": {"fid": 101}})))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/history/add-collection"))
        .and(body_partial_json(json!({"d": {"fid": 101}})))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/article/like"))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/coin/use"))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(0)
        .mount(&server)
        .await;

    // Balance gate and final balances both read coin=5, below the threshold.
    Mock::given(method("POST"))
        .and(path("/api/user/info"))
        .respond_with(user_info(5))
        .expect(3)
        .mount(&server)
        .await;

    // Claims: read, favorite, like, share, and the bonus. Login is already
    // claimed and coin is skipped, so ids 8 and 6 never reach the wire.
    mount_claim(&server, 1, 2, 10, 1).await;
    mount_claim(&server, 2, 2, 10, 1).await;
    mount_claim(&server, 3, 2, 10, 1).await;
    mount_claim(&server, 5, 2, 10, 1).await;
    mount_claim(&server, 7, 0, 0, 1).await;
    mount_claim(&server, 8, 0, 0, 0).await;
    mount_claim(&server, 6, 0, 0, 0).await;

    // The favorite prerequisite fired this run, so the entry is removed.
    Mock::given(method("POST"))
        .and(path("/api/history/del-collection"))
        .and(body_partial_json(json!({"d": {"fid": 101}})))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        SiteClient::new(Transport::new(server.uri()).unwrap(), "sess:7:key").unwrap();
    let profile = client.user_info().await.unwrap();
    let summary = CheckinRun::new()
        .with_shuffle_seed(11)
        .execute(&client, &profile)
        .await
        .unwrap();

    assert_eq!(summary.outcome_of(TaskId::Login), Some(TaskOutcome::AlreadyDone));
    assert_eq!(
        summary.outcome_of(TaskId::Read),
        Some(TaskOutcome::NewlyClaimed { coin: 2, exp: 10 })
    );
    assert_eq!(
        summary.outcome_of(TaskId::Favorite),
        Some(TaskOutcome::NewlyClaimed { coin: 2, exp: 10 })
    );
    assert_eq!(
        summary.outcome_of(TaskId::Like),
        Some(TaskOutcome::NewlyClaimed { coin: 2, exp: 10 })
    );
    assert_eq!(
        summary.outcome_of(TaskId::Share),
        Some(TaskOutcome::NewlyClaimed { coin: 2, exp: 10 })
    );
    assert_eq!(summary.outcome_of(TaskId::Coin), Some(TaskOutcome::Skipped));
    assert_eq!(
        summary.outcome_of(TaskId::AllDone),
        Some(TaskOutcome::NewlyClaimed { coin: 0, exp: 0 })
    );
    assert_eq!(summary.total_coin, 8);
    assert_eq!(summary.total_exp, 40);
    assert_eq!(summary.coin_before, 5);
    assert_eq!(summary.coin_after, 5);
}

/// The whole entry point, report included, over a quiet server where
/// everything was claimed earlier today.
#[tokio::test]
async fn run_produces_a_report_when_nothing_is_left() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/user/info"))
        .respond_with(user_info(42))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/task/list"))
        .respond_with(packed(json!({
            "code": 0,
            "data": {
                "status": 2,
                "items": TaskId::ALL.map(|t| json!({"id": t.id(), "status": 2})),
            },
        })))
        .mount(&server)
        .await;
    // Discovery still runs; an ineligible pool is fine because no
    // prerequisite will use the article.
    Mock::given(method("POST"))
        .and(path("/api/category/get-article-by-cate"))
        .and(body_partial_json(json!({"d": {"page": 1}})))
        .respond_with(packed(json!({"code": 0, "data": {"list": [{"aid": 300}]}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/category/get-article-by-cate"))
        .respond_with(packed(json!({"code": 0, "data": {"list": []}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/article/get-detail"))
        .respond_with(packed(json!({
            "code": 0,
            "data": {"already_like": 0, "already_fav": 0, "already_coin": 0},
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/task/complete"))
        .respond_with(packed(json!({"code": 0, "data": {}})))
        .expect(0)
        .mount(&server)
        .await;

    let config = LightnovelConfig {
        security_key: "sess:7:key".to_owned(),
        username: String::new(),
        password: String::new(),
        base_url: server.uri(),
    };
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("cache.json"));

    let message = lightnovel::run(&config, &store).await.unwrap();
    assert!(message.contains("kira"), "{message}");
    assert!(message.contains("Daily login"), "{message}");
    assert!(message.contains("+0 coins"), "{message}");
}
