//! Stop/acknowledge handshake for the periodic loops
//!
//! A stop request carries a one-shot acknowledgement channel. The loop
//! answers it only after it has left its select loop, so a tick that is
//! already running finishes (including its join) before `stop` returns.

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Receiving side of the stop handshake, owned by a loop
pub struct StopSignal {
    rx: mpsc::Receiver<oneshot::Sender<()>>,
}

impl StopSignal {
    /// Create a signal and its sender half
    pub fn channel() -> (mpsc::Sender<oneshot::Sender<()>>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// Wait for a stop request. Also resolves when every sender is dropped.
    pub async fn requested(&mut self) -> StopAck {
        StopAck(self.rx.recv().await)
    }
}

/// Pending acknowledgement of a stop request
#[derive(Debug)]
pub struct StopAck(Option<oneshot::Sender<()>>);

impl StopAck {
    /// Tell the requester the loop has exited
    pub fn acknowledge(self) {
        if let Some(tx) = self.0 {
            let _ = tx.send(());
        }
    }
}

/// Handle to a spawned periodic loop
pub struct LoopHandle {
    name: &'static str,
    stop_tx: mpsc::Sender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Spawn a loop body that receives its stop signal
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(StopSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, signal) = StopSignal::channel();
        let task = tokio::spawn(body(signal));
        Self {
            name,
            stop_tx,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request the loop to stop and wait for its acknowledgement
    pub async fn stop(self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.stop_tx
            .send(ack_tx)
            .await
            .map_err(|_| anyhow!("{} loop exited before stop was requested", self.name))?;
        ack_rx
            .await
            .with_context(|| format!("{} loop dropped the stop acknowledgement", self.name))?;
        self.task
            .await
            .with_context(|| format!("{} loop task failed", self.name))?;
        debug!(name = self.name, "Loop stopped");
        Ok(())
    }
}
