//! Client-side reconnection with exponential backoff.
//!
//! When a connection drops, [`ReconnectState`] computes exponentially
//! increasing delays with jitter and [`reconnect_loop`] drives the actual
//! attempts. The defaults are tuned to the server's short resume window:
//! retries start fast and give up after a few seconds, because past that
//! point the session is gone and the application should join fresh.

use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;

use crate::tcp_client::{ConnectConfig, RoomConnection};

/// Configuration for reconnection behaviour.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first attempt. Default: 500 ms.
    pub initial_delay: Duration,
    /// Multiplier applied after each failed attempt. Default: 2.0.
    pub backoff_multiplier: f64,
    /// Ceiling on the delay between attempts. Default: 5 s.
    pub max_delay: Duration,
    /// Attempts before giving up. Default: 8.
    pub max_attempts: u32,
    /// Jitter factor in `0.0..=1.0`, applied as a uniform spread around
    /// the delay. Default: 0.25.
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            max_attempts: 8,
            jitter: 0.25,
        }
    }
}

/// Tracks the attempt count and computes the next backoff delay.
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: u32,
    current_delay: Duration,
}

impl ReconnectState {
    /// Create a new state from the given config.
    pub fn new(config: ReconnectConfig) -> Self {
        let initial = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial,
        }
    }

    /// Compute the next delay and advance the attempt counter. Returns
    /// `None` once the configured attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let base = self.current_delay;
        self.attempts += 1;

        // Uniform jitter in [base * (1 - jitter), base * (1 + jitter)].
        let jittered = if self.config.jitter > 0.0 {
            let mut rng = rand::rng();
            let factor = rng.random_range((1.0 - self.config.jitter)..=(1.0 + self.config.jitter));
            base.mul_f64(factor)
        } else {
            base
        };

        let next = self.current_delay.mul_f64(self.config.backoff_multiplier);
        self.current_delay = next.min(self.config.max_delay);

        Some(jittered.min(self.config.max_delay))
    }

    /// Reset after a successful reconnection.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Return the number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Errors produced by the reconnection system.
#[derive(Debug, thiserror::Error)]
pub enum ReconnectError {
    /// All configured attempts were used without success.
    #[error("maximum reconnection attempts exhausted")]
    MaxAttemptsExhausted,
    /// An I/O error occurred during a connection attempt.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attempt to reconnect to `addr` with exponential backoff.
///
/// On success the connection is ready for traffic; the caller is expected
/// to claim its previous session as the first message.
pub async fn reconnect_loop(
    addr: SocketAddr,
    config: ReconnectConfig,
    connect: ConnectConfig,
) -> Result<RoomConnection, ReconnectError> {
    let mut state = ReconnectState::new(config);

    loop {
        match state.next_delay() {
            None => return Err(ReconnectError::MaxAttemptsExhausted),
            Some(delay) => {
                tracing::info!(attempt = state.attempts(), ?delay, "reconnecting");
                tokio::time::sleep(delay).await;

                match RoomConnection::connect(addr, connect.clone()).await {
                    Ok(conn) => {
                        tracing::info!(attempts = state.attempts(), "reconnected");
                        return Ok(conn);
                    }
                    Err(e) => {
                        tracing::warn!(attempt = state.attempts(), error = %e, "reconnect attempt failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_no_jitter() -> ReconnectConfig {
        ReconnectConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_attempt_uses_initial_delay() {
        let mut state = ReconnectState::new(config_no_jitter());
        assert_eq!(state.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_backoff_doubles_each_attempt() {
        let mut state = ReconnectState::new(config_no_jitter());

        assert_eq!(state.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(state.next_delay(), Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let mut state = ReconnectState::new(config_no_jitter());

        let mut last = Duration::ZERO;
        for _ in 0..8 {
            if let Some(d) = state.next_delay() {
                last = d;
            }
        }
        assert_eq!(last, Duration::from_secs(5));
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut state = ReconnectState::new(ReconnectConfig {
            max_attempts: 3,
            jitter: 0.0,
            ..Default::default()
        });

        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_some());
        assert!(state.next_delay().is_none());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut state = ReconnectState::new(config_no_jitter());
        state.next_delay();
        state.next_delay();
        assert_eq!(state.attempts(), 2);

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert_eq!(state.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_jitter_varies_delay() {
        let mut delays = Vec::new();
        for _ in 0..10 {
            let mut state = ReconnectState::new(ReconnectConfig {
                jitter: 0.25,
                ..Default::default()
            });
            delays.push(state.next_delay().unwrap());
        }

        let all_same = delays.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_same, "jitter should vary the delays: {delays:?}");
    }

    #[tokio::test]
    async fn test_reconnect_loop_succeeds_against_live_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            jitter: 0.0,
            ..Default::default()
        };
        let conn = reconnect_loop(addr, config, ConnectConfig::default())
            .await
            .unwrap();
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_loop_gives_up_without_server() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts: 3,
            jitter: 0.0,
            ..Default::default()
        };
        let result = reconnect_loop(addr, config, ConnectConfig::default()).await;
        assert!(matches!(result, Err(ReconnectError::MaxAttemptsExhausted)));
    }
}
