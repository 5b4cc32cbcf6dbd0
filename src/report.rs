//! Notification payload formatting.
//!
//! Builds the HTML-mode Telegram messages for both flows. Task lines are
//! listed in a fixed display order so consecutive daily reports line up.

use chrono::Local;

use crate::lightnovel::client::TaskId;
use crate::lightnovel::tasks::{CheckinSummary, TaskOutcome};
use crate::twodfan::TwodfanSummary;

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Success message for a completed lightnovel run.
pub fn lightnovel_success(summary: &CheckinSummary) -> String {
    let mut task_lines = Vec::new();
    for task in TaskId::ALL {
        let line = match summary.outcome_of(task) {
            Some(TaskOutcome::NewlyClaimed { coin, exp }) => {
                format!("• {}: +{coin} coins, +{exp} exp", task.label())
            }
            Some(TaskOutcome::AlreadyDone) => format!("• {}: already done", task.label()),
            Some(TaskOutcome::Skipped) => format!("• {}: skipped", task.label()),
            Some(TaskOutcome::Failed) => format!("• {}: failed", task.label()),
            None => continue,
        };
        task_lines.push(line);
    }
    let task_detail = if task_lines.is_empty() {
        "• no tasks recorded".to_owned()
    } else {
        task_lines.join("\n")
    };

    format!(
        "✅ <b>Lightnovel check-in complete</b>\n\
         \n\
         👤 User: {nickname}\n\
         \n\
         📋 Tasks:\n\
         {task_detail}\n\
         \n\
         💰 Claimed this run: +{total_coin} coins, +{total_exp} exp\n\
         📈 Balance: {coin_after} coins, {exp_after} exp (was {coin_before} / {exp_before})\n\
         \n\
         ⏰ {now}",
        nickname = summary.nickname,
        total_coin = summary.total_coin,
        total_exp = summary.total_exp,
        coin_after = summary.coin_after,
        exp_after = summary.exp_after,
        coin_before = summary.coin_before,
        exp_before = summary.exp_before,
        now = timestamp(),
    )
}

/// Failure message for an aborted lightnovel run.
pub fn lightnovel_failure(nickname: Option<&str>, reason: &str) -> String {
    format!(
        "❌ <b>Lightnovel check-in failed</b>\n\
         \n\
         👤 User: {user}\n\
         ❗ Reason: {reason}\n\
         \n\
         ⏰ {now}",
        user = nickname.unwrap_or("unknown"),
        now = timestamp(),
    )
}

/// Success message for a completed 2DFan run.
pub fn twodfan_success(summary: &TwodfanSummary) -> String {
    let (status, points_text) = if summary.outcome.already_checked {
        ("already checked in today", "+0 points".to_owned())
    } else {
        ("checked in", format!("+{} points", summary.outcome.points))
    };

    format!(
        "✅ <b>2DFan check-in complete</b>\n\
         \n\
         👤 User: {username}\n\
         📋 Status: {status}\n\
         \n\
         💰 Granted: {points_text}\n\
         📊 Streak: {streak} days\n\
         📈 Total check-ins: {total}\n\
         🎯 Points balance: {points_after}\n\
         \n\
         ⏰ {now}",
        username = summary.username,
        streak = summary.outcome.serial_checkins,
        total = summary.outcome.checkins_count,
        points_after = summary.points_after,
        now = timestamp(),
    )
}

/// Failure message for an aborted 2DFan run.
pub fn twodfan_failure(username: Option<&str>, reason: &str) -> String {
    format!(
        "❌ <b>2DFan check-in failed</b>\n\
         \n\
         👤 User: {user}\n\
         ❗ Reason: {reason}\n\
         \n\
         ⏰ {now}",
        user = username.unwrap_or("unknown"),
        now = timestamp(),
    )
}
