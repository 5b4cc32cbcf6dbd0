//! Typed client for the lightnovel API.
//!
//! [`TaskApi`] is the seam the check-in orchestrator drives; [`SiteClient`]
//! is its production implementation over [`Transport`] and the envelope
//! codec. Response records are explicit structs per endpoint; unknown
//! fields in the wire payload are ignored by design.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::transport::Transport;
use super::envelope;
use crate::error::{CheckinError, Result};

/// The seven server-tracked reward tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Daily login (id 8). No prerequisite.
    Login,
    /// Read a post (id 1). Prerequisite: add a history entry.
    Read,
    /// Favorite a post (id 2). Prerequisite: add a collection entry.
    Favorite,
    /// Like a post (id 3). Prerequisite: like the article.
    Like,
    /// Share a post (id 5). No client-side prerequisite.
    Share,
    /// Coin a post (id 6). Prerequisite: spend coins; gated by balance.
    Coin,
    /// Everything-done bonus (id 7). Claimed last from a fresh list fetch.
    AllDone,
}

impl TaskId {
    /// All tasks in display (and execution) order.
    pub const ALL: [TaskId; 7] = [
        TaskId::Login,
        TaskId::Read,
        TaskId::Favorite,
        TaskId::Like,
        TaskId::Share,
        TaskId::Coin,
        TaskId::AllDone,
    ];

    /// Wire identifier of the task.
    pub fn id(self) -> i64 {
        match self {
            TaskId::Login => 8,
            TaskId::Read => 1,
            TaskId::Favorite => 2,
            TaskId::Like => 3,
            TaskId::Share => 5,
            TaskId::Coin => 6,
            TaskId::AllDone => 7,
        }
    }

    /// Map a wire identifier back to a task.
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }

    /// Human-readable name for reports and logs.
    pub fn label(self) -> &'static str {
        match self {
            TaskId::Login => "Daily login",
            TaskId::Read => "Read a post",
            TaskId::Favorite => "Favorite a post",
            TaskId::Like => "Like a post",
            TaskId::Share => "Share a post",
            TaskId::Coin => "Coin a post",
            TaskId::AllDone => "All tasks done",
        }
    }
}

/// Remote completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Prerequisite not yet performed.
    Incomplete,
    /// Prerequisite satisfied server-side; only the claim remains.
    Claimable,
    /// Reward already claimed.
    Claimed,
}

impl TaskStatus {
    /// Map the wire status code. Unknown codes are treated as claimed so
    /// no action is taken on states we do not understand.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => TaskStatus::Incomplete,
            1 => TaskStatus::Claimable,
            _ => TaskStatus::Claimed,
        }
    }
}

/// Snapshot of the remote task list, valid for one run only.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    /// Overall completion status (drives the everything-done task).
    pub overall: TaskStatus,
    statuses: HashMap<TaskId, TaskStatus>,
}

impl TaskSnapshot {
    /// Status for a task; ids absent from the snapshot count as claimed.
    pub fn status_of(&self, task: TaskId) -> TaskStatus {
        self.statuses
            .get(&task)
            .copied()
            .unwrap_or(TaskStatus::Claimed)
    }

    /// Build a snapshot from explicit statuses (used by tests).
    pub fn from_parts(overall: TaskStatus, statuses: HashMap<TaskId, TaskStatus>) -> Self {
        Self { overall, statuses }
    }

    fn from_value(data: &Value) -> Self {
        let overall =
            TaskStatus::from_code(data.get("status").and_then(Value::as_i64).unwrap_or(2));
        let mut statuses = HashMap::new();
        if let Some(items) = data.get("items").and_then(Value::as_array) {
            for item in items {
                let id = item.get("id").and_then(Value::as_i64);
                let status = item.get("status").and_then(Value::as_i64);
                if let (Some(id), Some(status)) = (id, status)
                    && let Some(task) = TaskId::from_id(id)
                {
                    statuses.insert(task, TaskStatus::from_code(status));
                }
            }
        }
        Self { overall, statuses }
    }
}

/// Identity and balances, read fresh within a run and never cached.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub uid: i64,
    pub nickname: String,
    pub coin: i64,
    pub exp: i64,
}

/// One article from the discovery listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleSummary {
    pub aid: i64,
}

fn flag_taken() -> i64 {
    1
}

/// Article detail flags. Missing flags default to "already done" so an
/// incomplete payload is never mistaken for an eligible article.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleDetail {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "flag_taken")]
    pub already_like: i64,
    #[serde(default = "flag_taken")]
    pub already_fav: i64,
    #[serde(default = "flag_taken")]
    pub already_coin: i64,
}

impl ArticleDetail {
    /// Eligible for the prerequisite actions: not yet liked, favorited, or coined.
    pub fn is_untouched(&self) -> bool {
        self.already_like == 0 && self.already_fav == 0 && self.already_coin == 0
    }
}

/// Reward granted by a successful claim.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Reward {
    #[serde(default)]
    pub coin: i64,
    #[serde(default)]
    pub exp: i64,
}

/// Operations the check-in orchestrator needs from the site.
///
/// The prerequisite actions are idempotent from the caller's perspective;
/// repeating one is a no-op or a harmless remote error, never a crash.
#[async_trait]
pub trait TaskApi {
    /// Fetch identity and balances.
    async fn user_info(&self) -> Result<UserProfile>;
    /// Fetch the task list with per-task and overall statuses.
    async fn task_list(&self) -> Result<TaskSnapshot>;
    /// Fetch one page of candidate articles.
    async fn article_page(&self, page: u32, page_size: u32) -> Result<Vec<ArticleSummary>>;
    /// Fetch the already-X flags for one article.
    async fn article_detail(&self, aid: i64) -> Result<ArticleDetail>;
    /// Add a history entry (read-task prerequisite).
    async fn mark_read(&self, aid: i64) -> Result<()>;
    /// Add a collection entry (favorite-task prerequisite).
    async fn favorite(&self, aid: i64) -> Result<()>;
    /// Remove the collection entry added by [`TaskApi::favorite`].
    async fn unfavorite(&self, aid: i64) -> Result<()>;
    /// Like the article (like-task prerequisite).
    async fn like(&self, aid: i64) -> Result<()>;
    /// Spend coins on the article (coin-task prerequisite).
    async fn spend_coins(&self, aid: i64, number: i64) -> Result<()>;
    /// Claim a task's reward; a remote rejection surfaces as an API error.
    async fn claim(&self, task: TaskId) -> Result<Reward>;
}

#[derive(Debug, Deserialize)]
struct BalanceData {
    coin: i64,
}

#[derive(Debug, Deserialize)]
struct LevelData {
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    uid: i64,
    nickname: String,
    balance: BalanceData,
    level: LevelData,
}

/// Production [`TaskApi`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct SiteClient {
    transport: Transport,
    security_key: String,
    uid: i64,
}

impl SiteClient {
    /// Create a client from a security key.
    ///
    /// The key encodes the identity by convention (`<..>:<uid>:<..>`);
    /// a key without a parseable uid is an auth error, since the user-info
    /// endpoint needs it.
    pub fn new(transport: Transport, security_key: &str) -> Result<Self> {
        let uid = security_key
            .split(':')
            .nth(1)
            .and_then(|part| part.parse::<i64>().ok())
            .ok_or_else(|| {
                CheckinError::Auth("security key does not encode a uid".to_owned())
            })?;
        Ok(Self {
            transport,
            security_key: security_key.to_owned(),
            uid,
        })
    }

    /// The identity id parsed out of the security key.
    pub fn uid(&self) -> i64 {
        self.uid
    }

    async fn post(&self, path: &str, extra: Value) -> Result<Value> {
        let body = envelope::request_body(&self.security_key, extra);
        self.transport.post_envelope(path, &body).await?.into_data()
    }
}

#[async_trait]
impl TaskApi for SiteClient {
    async fn user_info(&self) -> Result<UserProfile> {
        let data = self
            .post("/api/user/info", serde_json::json!({"uid": self.uid}))
            .await?;
        let info: UserInfoData = serde_json::from_value(data).map_err(|e| {
            CheckinError::decode(format!("unexpected user info shape: {e}"), &[])
        })?;
        Ok(UserProfile {
            uid: info.uid,
            nickname: info.nickname,
            coin: info.balance.coin,
            exp: info.level.exp,
        })
    }

    async fn task_list(&self) -> Result<TaskSnapshot> {
        let data = self.post("/api/task/list", serde_json::json!({})).await?;
        Ok(TaskSnapshot::from_value(&data))
    }

    async fn article_page(&self, page: u32, page_size: u32) -> Result<Vec<ArticleSummary>> {
        let data = self
            .post(
                "/api/category/get-article-by-cate",
                serde_json::json!({
                    "parent_gid": 3,
                    "gid": 106,
                    "page": page,
                    "pageSize": page_size,
                }),
            )
            .await?;
        let list = data.get("list").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(list)
            .map_err(|e| CheckinError::decode(format!("unexpected article list shape: {e}"), &[]))
    }

    async fn article_detail(&self, aid: i64) -> Result<ArticleDetail> {
        let data = self
            .post(
                "/api/article/get-detail",
                serde_json::json!({"aid": aid, "simple": 1}),
            )
            .await?;
        serde_json::from_value(data)
            .map_err(|e| CheckinError::decode(format!("unexpected article detail shape: {e}"), &[]))
    }

    async fn mark_read(&self, aid: i64) -> Result<()> {
        self.post(
            "/api/history/add-history",
            serde_json::json!({"fid": aid, "class": 1}),
        )
        .await
        .map(|_| ())
    }

    async fn favorite(&self, aid: i64) -> Result<()> {
        self.post(
            "/api/history/add-collection",
            serde_json::json!({"fid": aid, "class": 1}),
        )
        .await
        .map(|_| ())
    }

    async fn unfavorite(&self, aid: i64) -> Result<()> {
        self.post(
            "/api/history/del-collection",
            serde_json::json!({"fid": aid, "class": 1}),
        )
        .await
        .map(|_| ())
    }

    async fn like(&self, aid: i64) -> Result<()> {
        self.post("/api/article/like", serde_json::json!({"aid": aid}))
            .await
            .map(|_| ())
    }

    async fn spend_coins(&self, aid: i64, number: i64) -> Result<()> {
        self.post(
            "/api/coin/use",
            serde_json::json!({
                "goods_id": 2,
                "params": aid,
                "price": 1,
                "number": number,
                "total_price": number,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn claim(&self, task: TaskId) -> Result<Reward> {
        tracing::info!(task = task.label(), id = task.id(), "claiming reward");
        let data = self
            .post("/api/task/complete", serde_json::json!({"id": task.id()}))
            .await?;
        let reward: Reward = serde_json::from_value(data).unwrap_or_default();
        tracing::info!(task = task.label(), coin = reward.coin, exp = reward.exp, "claimed");
        Ok(reward)
    }
}
