use crate::commands::{TraderCommand, TraderStatus};
use anyhow::Result;
use tokio::sync::{mpsc, oneshot};

/// Cloneable control handle for a spawned [`Trader`](crate::Trader) task.
#[derive(Clone)]
pub struct TraderHandle {
    tx: mpsc::Sender<TraderCommand>,
}

impl TraderHandle {
    /// Creates a new handle with the given command sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<TraderCommand>) -> Self {
        Self { tx }
    }

    /// Asks the trader to force-close open positions and shut down.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the trader task.
    pub async fn stop(&self) -> Result<()> {
        self.tx.send(TraderCommand::Stop).await?;
        Ok(())
    }

    /// Fetches a snapshot of capital, exposure, and trade counts.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent or the response
    /// cannot be received.
    pub async fn status(&self) -> Result<TraderStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(TraderCommand::GetStatus(tx)).await?;
        let status = rx.await?;
        Ok(status)
    }
}
