//! Caller-owned server lifecycle.
//!
//! The embedding app keeps one [`ChunkService`] and drives it with
//! start/stop requests. Start never fails outright: problems are reported
//! through [`StartupInfo::ready`].

use tracing::{info, warn};

use crate::info::StartupInfo;
use crate::local::{self, LocalReadRequest, LocalReadResponse};
use crate::options::StartOptions;
use crate::ports::{PortSelector, RandomPorts};
use crate::server::ServerHandle;

/// Owns at most one running [`ServerHandle`].
pub struct ChunkService {
    server: Option<ServerHandle>,
    selector: Box<dyn PortSelector>,
}

impl ChunkService {
    /// A service drawing random ports from OS entropy.
    pub fn new() -> Self {
        Self::with_selector(Box::new(RandomPorts::new()))
    }

    /// A service with a custom port selection strategy.
    pub fn with_selector(selector: Box<dyn PortSelector>) -> Self {
        Self {
            server: None,
            selector,
        }
    }

    /// Starts a fresh instance, stopping any running one first.
    pub async fn start(&mut self, options: &StartOptions) -> StartupInfo {
        self.stop().await;

        let config = match options.to_config() {
            Ok(config) => config,
            Err(e) => {
                warn!("rejecting start options: {e}");
                return StartupInfo::not_ready();
            }
        };

        match ServerHandle::start(&config, self.selector.as_mut()).await {
            Ok(server) => {
                let info = server.startup_info();
                self.server = Some(server);
                info
            }
            Err(e) => {
                warn!("chunk server not ready: {e}");
                StartupInfo::not_ready()
            }
        }
    }

    /// Stops the running instance, if any.
    pub async fn stop(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop().await;
            info!("chunk service stopped");
        }
    }

    /// Returns `true` while an instance is running.
    pub fn is_running(&self) -> bool {
        self.server.as_ref().is_some_and(ServerHandle::is_running)
    }

    /// The running instance, if any.
    pub fn server(&self) -> Option<&ServerHandle> {
        self.server.as_ref()
    }

    /// Reads a raw range without going through HTTP.
    pub async fn read_file_chunk(&self, request: &LocalReadRequest) -> LocalReadResponse {
        local::read_file_chunk(request).await
    }
}

impl Default for ChunkService {
    fn default() -> Self {
        Self::new()
    }
}
