//! Running server instance.
//!
//! [`ServerHandle::start`] validates the encryption settings, binds a
//! loopback port and spawns the HTTP serve loop. The handle is the only
//! owner of the instance; dropping or stopping it releases the port.

use std::net::SocketAddr;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::info::{EncryptionType, StartupInfo};
use crate::ports::{self, PortSelector};
use crate::{STOP_TIMEOUT, handler, token};

/// Handle to a running chunk server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    auth_token: String,
    chunk_size: u32,
    max_body_size: u64,
    encryption: EncryptionType,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ServerHandle {
    /// Starts a server instance.
    ///
    /// Fails without binding anything when encryption is requested with an
    /// unusable key.
    pub async fn start(
        config: &ServerConfig,
        selector: &mut dyn PortSelector,
    ) -> Result<Self, ServerError> {
        let codec = config.codec()?;
        let encryption = EncryptionType::of(&codec);
        let max_body_size = config.max_body_size(&codec);

        let listener = ports::bind(config, selector).await?;
        let local_addr = listener.local_addr()?;

        let auth_token = token::generate_token();
        let app = handler::router(auth_token.clone(), codec, max_body_size);

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            match served {
                Ok(()) => debug!(%local_addr, "chunk server stopped"),
                Err(e) => warn!(%local_addr, "chunk server terminated: {e}"),
            }
        });

        info!(
            %local_addr,
            chunk_size = config.chunk_size,
            encryption = encryption.as_str(),
            "chunk server started"
        );

        Ok(Self {
            local_addr,
            auth_token,
            chunk_size: config.chunk_size,
            max_body_size,
            encryption,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Base URL clients prefix file paths with (no trailing slash).
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Plaintext bytes per chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Largest accepted `PUT` body, framing included.
    pub fn max_body_size(&self) -> u64 {
        self.max_body_size
    }

    pub fn encryption(&self) -> EncryptionType {
        self.encryption
    }

    /// Startup payload describing this instance.
    pub fn startup_info(&self) -> StartupInfo {
        StartupInfo::ready(self)
    }

    /// Returns `true` until [`stop`](Self::stop) has been called.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stops the server. Safe to call more than once.
    ///
    /// The listener closes immediately. In-flight requests get
    /// [`STOP_TIMEOUT`] to finish before the serve task is aborted.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let Some(mut task) = self.task.lock().await.take() else {
            return;
        };
        if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
            warn!(local_addr = %self.local_addr, "in-flight requests outlived stop timeout, aborting");
            task.abort();
        }
        info!(local_addr = %self.local_addr, "chunk server stopped");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("local_addr", &self.local_addr)
            .field("chunk_size", &self.chunk_size)
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RandomPorts;

    fn ephemeral_config() -> ServerConfig {
        // A [0, 1) range draws port 0, which the OS replaces with a free one.
        ServerConfig {
            port_min: 0,
            port_max: 1,
            max_bind_retries: 1,
            chunk_size: 1024,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn start_binds_loopback() {
        let server = ServerHandle::start(&ephemeral_config(), &mut RandomPorts::seeded(0))
            .await
            .unwrap();
        assert!(server.local_addr().ip().is_loopback());
        assert!(server.port() > 0);
        assert_eq!(server.base_url(), format!("http://127.0.0.1:{}", server.port()));
        assert_eq!(server.chunk_size(), 1024);
        assert_eq!(server.max_body_size(), 1024);
        assert_eq!(server.encryption(), EncryptionType::None);
        server.stop().await;
    }

    #[tokio::test]
    async fn encrypted_instance_reports_overhead() {
        let config = ServerConfig {
            encryption_enabled: true,
            encryption_key: Some(vec![9u8; 32]),
            ..ephemeral_config()
        };
        let server = ServerHandle::start(&config, &mut RandomPorts::seeded(0))
            .await
            .unwrap();
        assert_eq!(server.encryption(), EncryptionType::ChaCha20Poly1305);
        assert_eq!(server.max_body_size(), 1024 + 28);
        server.stop().await;
    }

    #[tokio::test]
    async fn bad_key_fails_before_binding() {
        let config = ServerConfig {
            encryption_enabled: true,
            encryption_key: Some(vec![9u8; 31]),
            ..ephemeral_config()
        };
        let result = ServerHandle::start(&config, &mut RandomPorts::seeded(0)).await;
        assert!(matches!(result, Err(ServerError::EncryptionConfig(_))));
    }

    #[tokio::test]
    async fn tokens_differ_between_instances() {
        let a = ServerHandle::start(&ephemeral_config(), &mut RandomPorts::seeded(0))
            .await
            .unwrap();
        let b = ServerHandle::start(&ephemeral_config(), &mut RandomPorts::seeded(0))
            .await
            .unwrap();
        assert_ne!(a.auth_token(), b.auth_token());
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_aborts_serve_task_after_timeout() {
        let (held, released) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            let _held = held;
            std::future::pending::<()>().await;
        });
        let server = ServerHandle {
            local_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            auth_token: token::generate_token(),
            chunk_size: 1024,
            max_body_size: 1024,
            encryption: EncryptionType::None,
            cancel: CancellationToken::new(),
            task: Mutex::new(Some(stuck)),
        };

        let started = tokio::time::Instant::now();
        server.stop().await;
        assert!(started.elapsed() >= STOP_TIMEOUT);
        assert!(!server.is_running());

        // The aborted task drops its sender.
        assert!(released.await.is_err());
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_releases_port() {
        let server = ServerHandle::start(&ephemeral_config(), &mut RandomPorts::seeded(0))
            .await
            .unwrap();
        let addr = server.local_addr();

        server.stop().await;
        server.stop().await;
        assert!(!server.is_running());

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port should be free after stop");
    }
}
