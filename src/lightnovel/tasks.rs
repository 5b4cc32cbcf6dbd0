//! The per-task check-in state machine.
//!
//! One run is one linear pass: read the task list once, discover an
//! eligible article, execute each task gated by its snapshot status, claim
//! the everything-done bonus from a fresh list fetch, reverse the favorite
//! side effect if this run introduced it, and aggregate the results.
//!
//! Claimed tasks cost no further network traffic; incomplete tasks get
//! their prerequisite exactly once before the claim; claimable tasks go
//! straight to the claim. The coin task is additionally gated by a
//! freshly re-fetched balance.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::client::{TaskApi, TaskId, TaskSnapshot, TaskStatus, UserProfile};
use crate::error::{CheckinError, Result};

/// How one task ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Reward claimed by this run, with the granted deltas.
    NewlyClaimed { coin: i64, exp: i64 },
    /// Already claimed before this run started.
    AlreadyDone,
    /// Deliberately not attempted (insufficient balance).
    Skipped,
    /// Claim attempted and rejected, or a step around it failed.
    Failed,
}

/// Outcome of one task, in execution order.
#[derive(Debug, Clone, Copy)]
pub struct TaskResult {
    pub task: TaskId,
    pub outcome: TaskOutcome,
}

/// Aggregated result of a full run.
#[derive(Debug, Clone)]
pub struct CheckinSummary {
    pub nickname: String,
    pub results: Vec<TaskResult>,
    /// Sum of deltas over newly-claimed tasks only.
    pub total_coin: i64,
    pub total_exp: i64,
    /// Balances read before the first task.
    pub coin_before: i64,
    pub exp_before: i64,
    /// Authoritative balances re-fetched after the run. May disagree with
    /// `coin_before + total_coin` due to concurrent activity elsewhere.
    pub coin_after: i64,
    pub exp_after: i64,
}

impl CheckinSummary {
    /// Look up the outcome recorded for a task, if any.
    pub fn outcome_of(&self, task: TaskId) -> Option<TaskOutcome> {
        self.results
            .iter()
            .find(|r| r.task == task)
            .map(|r| r.outcome)
    }
}

/// Prerequisite side effect attached to a task.
#[derive(Debug, Clone, Copy)]
enum Prereq {
    None,
    MarkRead,
    Favorite,
    Like,
    SpendCoins(i64),
}

/// One configured check-in pass over a [`TaskApi`].
#[derive(Debug, Clone)]
pub struct CheckinRun {
    coin_threshold: i64,
    coin_spend: i64,
    max_pages: u32,
    page_size: u32,
    shuffle_seed: Option<u64>,
}

impl Default for CheckinRun {
    fn default() -> Self {
        Self {
            coin_threshold: 10,
            coin_spend: 10,
            max_pages: 5,
            page_size: 40,
            shuffle_seed: None,
        }
    }
}

impl CheckinRun {
    /// Create a run with the default gates and discovery budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum balance required before the coin task is attempted.
    pub fn with_coin_threshold(mut self, threshold: i64) -> Self {
        self.coin_threshold = threshold;
        self
    }

    /// How many pages of candidates to pull during discovery.
    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// Candidates per discovery page.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Fix the shuffle permutation for deterministic tests.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Execute the full task pass.
    ///
    /// `profile` is the liveness-check profile; its balances become the
    /// "before" figures of the summary.
    ///
    /// # Errors
    ///
    /// Terminal failures only: the initial task-list fetch and article
    /// discovery. Individual task failures are recorded in the summary.
    pub async fn execute(
        &self,
        api: &impl TaskApi,
        profile: &UserProfile,
    ) -> Result<CheckinSummary> {
        let snapshot = api.task_list().await?;
        let aid = self.discover_article(api).await?;

        let mut results: Vec<TaskResult> = Vec::with_capacity(TaskId::ALL.len());
        let mut favorited_this_run = false;

        for (task, prereq) in [
            (TaskId::Login, Prereq::None),
            (TaskId::Read, Prereq::MarkRead),
            (TaskId::Favorite, Prereq::Favorite),
            (TaskId::Like, Prereq::Like),
            (TaskId::Share, Prereq::None),
        ] {
            let (result, prereq_fired) = self
                .attempt(api, task, snapshot.status_of(task), prereq, aid)
                .await;
            if task == TaskId::Favorite && prereq_fired {
                favorited_this_run = true;
            }
            results.push(result);
        }

        results.push(self.run_coin_task(api, &snapshot, aid).await);
        results.push(self.run_all_done_task(api, aid).await);

        if favorited_this_run {
            tracing::info!(aid, "reversing the favorite added by this run");
            if let Err(e) = api.unfavorite(aid).await {
                tracing::warn!(aid, error = %e, "unfavorite cleanup failed");
            }
        }

        let (coin_after, exp_after) = match api.user_info().await {
            Ok(after) => (after.coin, after.exp),
            Err(e) => {
                tracing::warn!(error = %e, "final profile fetch failed, reporting stale balances");
                (profile.coin, profile.exp)
            }
        };

        let total_coin = sum_deltas(&results, |c, _| c);
        let total_exp = sum_deltas(&results, |_, e| e);
        tracing::info!(total_coin, total_exp, coin_after, exp_after, "check-in pass complete");

        Ok(CheckinSummary {
            nickname: profile.nickname.clone(),
            results,
            total_coin,
            total_exp,
            coin_before: profile.coin,
            exp_before: profile.exp,
            coin_after,
            exp_after,
        })
    }

    /// Gate + attempt one ordinary task.
    ///
    /// Returns the result and whether the prerequisite fired successfully
    /// this run (drives the favorite cleanup).
    async fn attempt(
        &self,
        api: &impl TaskApi,
        task: TaskId,
        status: TaskStatus,
        prereq: Prereq,
        aid: i64,
    ) -> (TaskResult, bool) {
        if status == TaskStatus::Claimed {
            tracing::info!(task = task.label(), "already claimed, skipping");
            return (
                TaskResult {
                    task,
                    outcome: TaskOutcome::AlreadyDone,
                },
                false,
            );
        }

        // Claimable means the remote already saw the prerequisite; firing
        // it again would be redundant traffic.
        let mut prereq_fired = false;
        if status == TaskStatus::Incomplete {
            match self.run_prereq(api, prereq, aid).await {
                Ok(()) => prereq_fired = !matches!(prereq, Prereq::None),
                Err(e) => {
                    tracing::warn!(task = task.label(), error = %e, "prerequisite action failed");
                }
            }
        }

        let outcome = match api.claim(task).await {
            Ok(reward) => TaskOutcome::NewlyClaimed {
                coin: reward.coin,
                exp: reward.exp,
            },
            Err(e) => {
                tracing::warn!(task = task.label(), error = %e, "claim rejected");
                TaskOutcome::Failed
            }
        };

        (TaskResult { task, outcome }, prereq_fired)
    }

    /// The coin task, additionally gated by a freshly re-fetched balance.
    async fn run_coin_task(
        &self,
        api: &impl TaskApi,
        snapshot: &TaskSnapshot,
        aid: i64,
    ) -> TaskResult {
        let task = TaskId::Coin;
        let status = snapshot.status_of(task);
        if status == TaskStatus::Claimed {
            tracing::info!(task = task.label(), "already claimed, skipping");
            return TaskResult {
                task,
                outcome: TaskOutcome::AlreadyDone,
            };
        }

        let balance = match api.user_info().await {
            Ok(fresh) => fresh.coin,
            Err(e) => {
                tracing::warn!(error = %e, "balance re-fetch failed, not spending coins");
                return TaskResult {
                    task,
                    outcome: TaskOutcome::Failed,
                };
            }
        };

        if balance < self.coin_threshold {
            tracing::warn!(
                balance,
                threshold = self.coin_threshold,
                "balance below threshold, skipping coin task"
            );
            return TaskResult {
                task,
                outcome: TaskOutcome::Skipped,
            };
        }

        let (result, _) = self
            .attempt(api, task, status, Prereq::SpendCoins(self.coin_spend), aid)
            .await;
        result
    }

    /// The everything-done bonus, gated by the overall status of a fresh
    /// list fetch — the other claims may have transitioned it server-side.
    async fn run_all_done_task(&self, api: &impl TaskApi, aid: i64) -> TaskResult {
        let task = TaskId::AllDone;
        let overall = match api.task_list().await {
            Ok(fresh) => fresh.overall,
            Err(e) => {
                tracing::warn!(error = %e, "task list re-fetch failed");
                return TaskResult {
                    task,
                    outcome: TaskOutcome::Failed,
                };
            }
        };
        let (result, _) = self.attempt(api, task, overall, Prereq::None, aid).await;
        result
    }

    async fn run_prereq(&self, api: &impl TaskApi, prereq: Prereq, aid: i64) -> Result<()> {
        match prereq {
            Prereq::None => Ok(()),
            Prereq::MarkRead => api.mark_read(aid).await,
            Prereq::Favorite => api.favorite(aid).await,
            Prereq::Like => api.like(aid).await,
            Prereq::SpendCoins(number) => api.spend_coins(aid, number).await,
        }
    }

    /// Pull candidate pages, shuffle the pool, and probe details until an
    /// article with all three already-flags clear turns up.
    async fn discover_article(&self, api: &impl TaskApi) -> Result<i64> {
        let mut pool = Vec::new();
        for page in 1..=self.max_pages {
            match api.article_page(page, self.page_size).await {
                Ok(mut articles) => pool.append(&mut articles),
                Err(e) => tracing::warn!(page, error = %e, "candidate page fetch failed"),
            }
        }
        if pool.is_empty() {
            return Err(CheckinError::NoArticle { scanned: 0 });
        }

        tracing::info!(candidates = pool.len(), "probing shuffled candidates");

        // Shuffle so concurrent/repeated runs do not all converge on the
        // same article.
        let mut rng = match self.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        pool.shuffle(&mut rng);

        let scanned = pool.len();
        for article in &pool {
            match api.article_detail(article.aid).await {
                Ok(detail) if detail.is_untouched() => {
                    tracing::info!(
                        aid = article.aid,
                        title = detail.title.as_deref().unwrap_or(""),
                        "found eligible article"
                    );
                    return Ok(article.aid);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(aid = article.aid, error = %e, "detail probe failed"),
            }
        }

        Err(CheckinError::NoArticle { scanned })
    }
}

fn sum_deltas(results: &[TaskResult], pick: fn(i64, i64) -> i64) -> i64 {
    results
        .iter()
        .filter_map(|r| match r.outcome {
            TaskOutcome::NewlyClaimed { coin, exp } => Some(pick(coin, exp)),
            _ => None,
        })
        .sum()
}
