// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;
use std::time::Duration;

/// Protocol/version string reported in the WS welcome message.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok())
}

fn bool_env(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Bind host (`ADS_WEB_HOST`, default 127.0.0.1).
pub fn web_host() -> String {
    std::env::var("ADS_WEB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Bind port (`ADS_WEB_PORT`, default 8787).
pub fn web_port() -> u16 {
    parse_env("ADS_WEB_PORT").unwrap_or(8787)
}

/// Directories clients may use as workspace roots (`ADS_WEB_ALLOWED_DIRS`,
/// colon-separated). Empty means every absolute path is allowed.
pub fn allowed_dirs() -> Vec<PathBuf> {
    std::env::var("ADS_WEB_ALLOWED_DIRS")
        .map(|raw| raw.split(':').filter(|s| !s.is_empty()).map(PathBuf::from).collect())
        .unwrap_or_default()
}

/// Accepted WS origins (`ADS_WEB_ALLOWED_ORIGINS`, comma-separated).
/// Empty means no origin check.
pub fn allowed_origins() -> Vec<String> {
    std::env::var("ADS_WEB_ALLOWED_ORIGINS")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

/// Max concurrent WS clients (`ADS_WEB_MAX_CLIENTS`, default 32; 0 means
/// unlimited).
pub fn max_clients() -> usize {
    parse_env("ADS_WEB_MAX_CLIENTS").unwrap_or(32)
}

/// WS heartbeat interval (`ADS_WEB_WS_PING_INTERVAL_MS`, default 15000).
pub fn ws_ping_interval() -> Duration {
    Duration::from_millis(parse_env("ADS_WEB_WS_PING_INTERVAL_MS").unwrap_or(15_000))
}

/// Missed pongs before the connection is dropped
/// (`ADS_WEB_WS_MAX_MISSED_PONGS`, default 3).
pub fn ws_max_missed_pongs() -> u32 {
    parse_env("ADS_WEB_WS_MAX_MISSED_PONGS").unwrap_or(3)
}

/// Optional bearer token required on WS and HTTP requests
/// (`ADS_WEB_AUTH_TOKEN`).
pub fn auth_token() -> Option<String> {
    std::env::var("ADS_WEB_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// Task queue feature switch (`TASK_QUEUE_ENABLED`, default true).
pub fn task_queue_enabled() -> bool {
    bool_env("TASK_QUEUE_ENABLED", true)
}

/// Start the queue running at boot (`TASK_QUEUE_AUTO_START`, default false).
pub fn task_queue_auto_start() -> bool {
    bool_env("TASK_QUEUE_AUTO_START", false)
}

/// Default model for queue tasks (`TASK_QUEUE_DEFAULT_MODEL`).
pub fn task_queue_default_model() -> Option<String> {
    std::env::var("TASK_QUEUE_DEFAULT_MODEL").ok().filter(|s| !s.is_empty())
}

/// Dedicated planning model (`TASK_QUEUE_PLAN_MODEL`).
pub fn task_queue_plan_model() -> Option<String> {
    std::env::var("TASK_QUEUE_PLAN_MODEL").ok().filter(|s| !s.is_empty())
}

/// Explored feed switches (`ADS_EXPLORED_{ENABLED,MAX_ITEMS,DEDUPE}`).
pub fn explored_enabled() -> bool {
    bool_env("ADS_EXPLORED_ENABLED", true)
}

pub fn explored_max_items() -> usize {
    parse_env("ADS_EXPLORED_MAX_ITEMS").unwrap_or(50)
}

pub fn explored_dedupe() -> ads_core::DedupeMode {
    match std::env::var("ADS_EXPLORED_DEDUPE").as_deref() {
        Ok("none") => ads_core::DedupeMode::None,
        _ => ads_core::DedupeMode::Consecutive,
    }
}

/// Notifier display timezone (`ADS_TELEGRAM_NOTIFY_TIMEZONE`,
/// default Asia/Shanghai; invalid values fall back silently downstream).
pub fn notify_timezone() -> String {
    std::env::var("ADS_TELEGRAM_NOTIFY_TIMEZONE")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Asia/Shanghai".to_string())
}

/// State directory: `ADS_STATE_DB_PATH` > `XDG_STATE_HOME/ads` >
/// `~/.local/state/ads`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ADS_STATE_DB_PATH") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("ads");
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".local/state/ads")
}

/// Log sinks: explicit file > directory > stdout.
pub fn log_file() -> Option<PathBuf> {
    std::env::var("ADS_LOG_FILE").ok().map(PathBuf::from)
}

pub fn log_dir() -> Option<PathBuf> {
    std::env::var("ADS_LOG_DIR").ok().map(PathBuf::from)
}

pub fn log_stdout() -> bool {
    bool_env("ADS_LOG_STDOUT", true)
}

/// Shutdown drain timeout (`ADS_DRAIN_TIMEOUT_MS`, default 5s).
pub fn drain_timeout() -> Duration {
    Duration::from_millis(parse_env("ADS_DRAIN_TIMEOUT_MS").unwrap_or(5_000))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
