//! Comms subsystem: user-facing I/O channels.
//!
//! Each channel owns its sessions' [`SessionState`](crate::subsystems::router::SessionState)
//! and drives the shared [`Orchestrator`] directly. Only the console channel
//! exists today.

pub mod pty;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AppError;
use crate::orchestrator::Orchestrator;

pub type ChannelFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A long-running I/O channel.
pub trait Channel: Send {
    fn id(&self) -> &str;

    /// Run until input ends or `shutdown` is cancelled.
    fn run(self: Box<Self>, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> ChannelFuture;
}

/// Run `channel` to completion. An error cancels `shutdown` so the rest of
/// the process winds down with it.
pub async fn run(
    channel: Box<dyn Channel>,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let id = channel.id().to_string();
    info!(channel_id = %id, "starting comms channel");

    let result = channel.run(orchestrator, shutdown.clone()).await;
    match &result {
        Ok(()) => info!(channel_id = %id, "comms channel exited"),
        Err(e) => {
            warn!(channel_id = %id, error = %e, "comms channel failed");
            shutdown.cancel();
        }
    }
    result
}
