//! Daily check-in automation for two ACG community sites.
//!
//! Each invocation is one linear pass per site: resolve a session
//! credential (cached where possible, logging in only when needed), walk
//! the site's reward tasks, and push a summary to Telegram. The
//! lightnovel flow carries the interesting machinery — a compressed
//! response envelope, a seven-task state machine, and randomized article
//! discovery; the 2DFan flow is a strict subset with a single check-in
//! call.

pub mod config;
pub mod error;
pub mod lightnovel;
pub mod notify;
pub mod report;
pub mod session;
pub mod twodfan;

pub use error::{CheckinError, Result};
