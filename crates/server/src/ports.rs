//! Listening port acquisition with bounded retry.
//!
//! A fixed port (when configured) is tried once. After that, up to
//! `max_bind_retries` ports are drawn from `[port_min, port_max)` by a
//! [`PortSelector`]. Draws may repeat; the search is not exhaustive.

use std::net::{Ipv4Addr, SocketAddr};
use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;

/// One past the highest valid TCP port.
pub const PORT_LIMIT: u32 = 65536;

/// Address the server listens on.
pub const LISTEN_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Strategy for choosing the next port to try.
pub trait PortSelector: Send {
    /// Returns a port in `range`. `range` is never empty.
    fn next_port(&mut self, range: Range<u32>) -> u32;
}

/// Uniform random draws.
pub struct RandomPorts {
    rng: StdRng,
}

impl RandomPorts {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortSelector for RandomPorts {
    fn next_port(&mut self, range: Range<u32>) -> u32 {
        self.rng.gen_range(range)
    }
}

/// Binds a loopback listener according to `config`.
///
/// Returns [`ServerError::Bind`] once the fixed port and every random
/// draw have failed.
pub async fn bind(
    config: &ServerConfig,
    selector: &mut dyn PortSelector,
) -> Result<TcpListener, ServerError> {
    let mut attempts = 0u32;

    if let Some(port) = config.fixed_port {
        attempts += 1;
        if let Some(listener) = try_bind(port).await {
            return Ok(listener);
        }
        if config.max_bind_retries == 0 {
            warn!(port, "fixed port unavailable and no retries configured");
            return Err(ServerError::Bind { attempts });
        }
    }

    let upper = config.port_max.min(PORT_LIMIT);
    if config.port_min >= upper {
        warn!(
            port_min = config.port_min,
            port_max = config.port_max,
            "empty port range, skipping random search"
        );
        return Err(ServerError::Bind { attempts });
    }

    for _ in 0..config.max_bind_retries {
        attempts += 1;
        let candidate = selector.next_port(config.port_min..upper);
        let Ok(port) = u16::try_from(candidate) else {
            debug!(candidate, "selector returned an out-of-range port");
            continue;
        };
        if let Some(listener) = try_bind(port).await {
            return Ok(listener);
        }
    }

    warn!(attempts, "port search exhausted");
    Err(ServerError::Bind { attempts })
}

/// One bind+listen attempt on the loopback interface.
async fn try_bind(port: u16) -> Option<TcpListener> {
    let addr = SocketAddr::from((LISTEN_ADDR, port));
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            let bound = listener.local_addr().map(|a| a.port()).unwrap_or(port);
            info!(port = bound, "chunk server listener bound");
            Some(listener)
        }
        Err(e) => {
            debug!(port, "bind failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of ports, recording every request.
    struct Scripted {
        ports: VecDeque<u32>,
        calls: u32,
    }

    impl Scripted {
        fn new(ports: &[u32]) -> Self {
            Self {
                ports: ports.iter().copied().collect(),
                calls: 0,
            }
        }
    }

    impl PortSelector for Scripted {
        fn next_port(&mut self, _range: Range<u32>) -> u32 {
            self.calls += 1;
            self.ports.pop_front().unwrap_or(0)
        }
    }

    async fn occupied() -> (TcpListener, u16) {
        let listener = TcpListener::bind((LISTEN_ADDR, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn seeded_selector_is_deterministic() {
        let mut a = RandomPorts::seeded(42);
        let mut b = RandomPorts::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.next_port(50000..50010), b.next_port(50000..50010));
        }
    }

    #[test]
    fn random_draws_stay_in_range() {
        let mut selector = RandomPorts::seeded(7);
        for _ in 0..1000 {
            let port = selector.next_port(50000..50010);
            assert!((50000..50010).contains(&port));
        }
    }

    #[tokio::test]
    async fn fixed_port_used_when_free() {
        let (holder, port) = occupied().await;
        drop(holder);

        let config = ServerConfig {
            fixed_port: Some(port),
            max_bind_retries: 0,
            ..ServerConfig::default()
        };
        let mut selector = Scripted::new(&[]);
        let listener = bind(&config, &mut selector).await.unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
        assert_eq!(selector.calls, 0);
    }

    #[tokio::test]
    async fn fixed_port_taken_without_retries_fails() {
        let (_holder, port) = occupied().await;
        let config = ServerConfig {
            fixed_port: Some(port),
            max_bind_retries: 0,
            ..ServerConfig::default()
        };
        let mut selector = Scripted::new(&[0]);
        let result = bind(&config, &mut selector).await;
        assert!(matches!(result, Err(ServerError::Bind { attempts: 1 })));
        assert_eq!(selector.calls, 0);
    }

    #[tokio::test]
    async fn fixed_port_taken_falls_through_to_search() {
        let (_holder, port) = occupied().await;
        let config = ServerConfig {
            fixed_port: Some(port),
            port_min: 0,
            max_bind_retries: 2,
            ..ServerConfig::default()
        };
        // Port 0 lets the OS pick, so the first draw always succeeds.
        let mut selector = Scripted::new(&[0]);
        let listener = bind(&config, &mut selector).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), port);
        assert_eq!(selector.calls, 1);
    }

    #[tokio::test]
    async fn all_draws_colliding_exhausts_retries() {
        let (_a, pa) = occupied().await;
        let (_b, pb) = occupied().await;
        let (_c, pc) = occupied().await;
        let config = ServerConfig {
            port_min: 0,
            max_bind_retries: 3,
            ..ServerConfig::default()
        };
        let mut selector = Scripted::new(&[pa.into(), pb.into(), pc.into(), 0]);
        let result = bind(&config, &mut selector).await;
        assert!(matches!(result, Err(ServerError::Bind { attempts: 3 })));
        assert_eq!(selector.calls, 3);
    }

    #[tokio::test]
    async fn search_stops_at_first_success() {
        let (_a, taken) = occupied().await;
        let config = ServerConfig {
            port_min: 0,
            max_bind_retries: 5,
            ..ServerConfig::default()
        };
        let mut selector = Scripted::new(&[taken.into(), 0, 0]);
        assert!(bind(&config, &mut selector).await.is_ok());
        assert_eq!(selector.calls, 2);
    }

    #[tokio::test]
    async fn empty_range_makes_no_draws() {
        let config = ServerConfig {
            port_min: 50010,
            port_max: 50000,
            ..ServerConfig::default()
        };
        let mut selector = Scripted::new(&[0]);
        let result = bind(&config, &mut selector).await;
        assert!(matches!(result, Err(ServerError::Bind { attempts: 0 })));
        assert_eq!(selector.calls, 0);
    }

    #[tokio::test]
    async fn zero_retries_without_fixed_port_fails() {
        let config = ServerConfig {
            max_bind_retries: 0,
            ..ServerConfig::default()
        };
        let mut selector = RandomPorts::seeded(1);
        let result = bind(&config, &mut selector).await;
        assert!(matches!(result, Err(ServerError::Bind { attempts: 0 })));
    }
}
