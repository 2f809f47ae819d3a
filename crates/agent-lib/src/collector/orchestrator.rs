//! Lifecycle of the periodic loops
//!
//! The orchestrator owns the discovery, collection and housekeeping loops
//! until `start`, then only their handles. `stop` walks the handles in
//! start order and waits for each loop's acknowledgement.

use super::control::LoopHandle;
use super::discovery::DiscoveryLoop;
use super::housekeeping::HousekeepingLoop;
use super::r#loop::CollectionLoop;
use crate::health::{components, HealthRegistry};
use anyhow::{bail, Result};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Running,
    Stopped,
}

pub struct Orchestrator {
    state: OrchestratorState,
    discovery: Option<DiscoveryLoop>,
    collection: Option<CollectionLoop>,
    housekeeping: Option<HousekeepingLoop>,
    handles: Vec<LoopHandle>,
    health: HealthRegistry,
}

impl Orchestrator {
    pub fn new(
        collection: CollectionLoop,
        housekeeping: HousekeepingLoop,
        health: HealthRegistry,
    ) -> Self {
        Self {
            state: OrchestratorState::Idle,
            discovery: None,
            collection: Some(collection),
            housekeeping: Some(housekeeping),
            handles: Vec::new(),
            health,
        }
    }

    /// Also run a discovery loop feeding the store
    pub fn with_discovery(mut self, discovery: DiscoveryLoop) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Spawn every loop. Only valid from `Idle`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != OrchestratorState::Idle {
            bail!("Cannot start orchestrator in state {:?}", self.state);
        }

        let (Some(collection), Some(housekeeping)) =
            (self.collection.take(), self.housekeeping.take())
        else {
            bail!("Collection loops already consumed");
        };

        if let Some(discovery) = self.discovery.take() {
            self.health.register(components::DISCOVERY).await;
            self.handles.push(LoopHandle::spawn(components::DISCOVERY, |stop| {
                discovery.run(stop)
            }));
        }

        self.health.register(components::COLLECTOR).await;
        self.handles.push(LoopHandle::spawn(components::COLLECTOR, |stop| {
            collection.run(stop)
        }));

        self.health.register(components::HOUSEKEEPING).await;
        self.handles.push(LoopHandle::spawn(components::HOUSEKEEPING, |stop| {
            housekeeping.run(stop)
        }));

        self.health.set_ready(true).await;
        self.state = OrchestratorState::Running;
        info!(loops = self.handles.len(), "Orchestrator started");
        Ok(())
    }

    /// Stop every loop in start order. Every loop is asked to stop even if
    /// an earlier one fails; the first failure is returned.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != OrchestratorState::Running {
            bail!("Cannot stop orchestrator in state {:?}", self.state);
        }

        self.health.set_ready(false).await;

        let mut first_error = None;
        for handle in self.handles.drain(..) {
            let name = handle.name();
            match handle.stop().await {
                Ok(()) => self.health.set_unhealthy(name, "stopped").await,
                Err(e) => {
                    warn!(
                        loop_name = name,
                        error = %format!("{:#}", e),
                        "Loop did not stop cleanly"
                    );
                    self.health.set_unhealthy(name, e.to_string()).await;
                    first_error.get_or_insert(e);
                }
            }
        }

        self.state = OrchestratorState::Stopped;
        info!("Orchestrator stopped");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
