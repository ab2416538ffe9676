//! Pipeline configuration types
//!
//! This module defines the tunables of the ingestion pipeline. Every field has a
//! default, so an empty configuration (or an empty TOML table in the application
//! layer) yields a working listener on UDP port 1234.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Floor for the bind retry backoff so an unavailable port is not hammered
const MIN_BIND_RETRY_BACKOFF_MS: u64 = 10;

/// Configuration for the telemetry pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Address the UDP listener binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port the listener binds to
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// Size of the datagram receive buffer in bytes
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Socket receive timeout in milliseconds (bounds shutdown latency)
    #[serde(default = "default_recv_timeout")]
    pub recv_timeout_ms: u64,

    /// Delay between bind attempts in milliseconds
    #[serde(default = "default_bind_retry_backoff")]
    pub bind_retry_backoff_ms: u64,

    /// Optional: give up binding after this many attempts (None = retry forever)
    #[serde(default)]
    pub max_bind_attempts: Option<u32>,

    /// Optional: capacity of the distribution channel (None = unbounded)
    #[serde(default)]
    pub channel_capacity: Option<usize>,

    /// Broadcaster dequeue timeout in milliseconds
    #[serde(default = "default_pop_timeout")]
    pub pop_timeout_ms: u64,

    /// Broadcaster idle pause after an empty dequeue, in milliseconds
    #[serde(default = "default_idle_sleep")]
    pub idle_sleep_ms: u64,

    /// Interval between status log lines, in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_udp_port() -> u16 {
    1234
}

fn default_recv_buffer_size() -> usize {
    1024
}

fn default_recv_timeout() -> u64 {
    500
}

fn default_bind_retry_backoff() -> u64 {
    5000
}

fn default_pop_timeout() -> u64 {
    500
}

fn default_idle_sleep() -> u64 {
    10
}

fn default_stats_interval() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            udp_port: default_udp_port(),
            recv_buffer_size: default_recv_buffer_size(),
            recv_timeout_ms: default_recv_timeout(),
            bind_retry_backoff_ms: default_bind_retry_backoff(),
            max_bind_attempts: None,
            channel_capacity: None,
            pop_timeout_ms: default_pop_timeout(),
            idle_sleep_ms: default_idle_sleep(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the bind address
    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Builder method: set the UDP port (0 lets the OS pick one)
    pub fn with_udp_port(mut self, port: u16) -> Self {
        self.udp_port = port;
        self
    }

    /// Builder method: set the receive timeout
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the bind retry policy
    pub fn with_bind_retry(mut self, backoff: Duration, max_attempts: Option<u32>) -> Self {
        self.bind_retry_backoff_ms = backoff.as_millis() as u64;
        self.max_bind_attempts = max_attempts;
        self
    }

    /// Builder method: bound the distribution channel
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Builder method: set the broadcaster dequeue timeout
    pub fn with_pop_timeout(mut self, timeout: Duration) -> Self {
        self.pop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Builder method: set the status log interval
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval_secs = interval.as_secs();
        self
    }

    /// Socket address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.udp_port)
    }

    pub fn recv_timeout(&self) -> Duration {
        // A zero read timeout is rejected by the OS
        Duration::from_millis(self.recv_timeout_ms.max(1))
    }

    pub fn bind_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.bind_retry_backoff_ms.max(MIN_BIND_RETRY_BACKOFF_MS))
    }

    /// Never zero, so an idle broadcaster always blocks between polls
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms.max(1))
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}
