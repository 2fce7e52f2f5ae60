//! Core engine: acquisition scheduling, position monitoring and the
//! shared position cache.

pub mod cache;
pub mod executor;
pub mod monitor;
pub mod observer;
pub mod scheduler;

use tokio::sync::watch;

/// Resolves once shutdown is requested, or when the sender is dropped.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Shutdown channel shared by the scheduler and every monitor.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
