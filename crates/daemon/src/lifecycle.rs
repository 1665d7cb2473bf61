// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: logging, PID file, shutdown signals.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::env;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another daemon appears to be running (pid file {0})")]
    AlreadyRunning(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize tracing according to `ADS_LOG_*`.
///
/// Returns the non-blocking writer guard when logging to a file; the guard
/// must live as long as the process.
pub fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(file) = env::log_file() {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "adsd.log".to_string());
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
        return Some(guard);
    }
    if let Some(dir) = env::log_dir() {
        let appender = tracing_appender::rolling::daily(dir, "adsd.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
        return Some(guard);
    }
    if env::log_stdout() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    None
}

/// Exclusive PID file under the state dir.
///
/// The file stays advisory-locked (fs2) for the life of the daemon, so a
/// crashed process never blocks the next start. Removed on drop.
pub struct PidFile {
    path: PathBuf,
    _file: std::fs::File,
}

impl PidFile {
    pub fn acquire(state_dir: &Path) -> Result<Self, LifecycleError> {
        use fs2::FileExt;

        std::fs::create_dir_all(state_dir)?;
        let path = state_dir.join("adsd.pid");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(LifecycleError::AlreadyRunning(path));
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Cancel `shutdown` on SIGINT/SIGTERM.
pub async fn wait_for_shutdown(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(signal) => signal,
            Err(_) => return shutdown.cancelled().await,
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(_) => return shutdown.cancelled().await,
        };
        tokio::select! {
            _ = interrupt.recv() => info!("SIGINT received"),
            _ = terminate.recv() => info!("SIGTERM received"),
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
