//! Ingestion listener
//!
//! Owns the UDP socket. Each datagram is counted, parsed, decoded and its
//! updates are enqueued on the distribution channel. Nothing a single datagram
//! contains can stop the loop; only cancellation, a closed channel or running
//! out of bind attempts does.

use crate::channel::UpdateSender;
use crate::config::PipelineConfig;
use crate::decoder::Decoder;
use crate::shutdown::CancellationToken;
use crate::stats::Stats;
use crate::types::{ParseError, Result, TelemetryError};
use crate::wire::FrameParser;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Pause after an unexpected receive error so a persistent failure cannot spin
const RECV_ERROR_PAUSE: Duration = Duration::from_millis(10);

pub struct IngestionListener {
    config: PipelineConfig,
    decoder: Decoder,
    sender: UpdateSender,
    stats: Arc<Stats>,
    token: CancellationToken,
    bound_addr: Arc<OnceLock<SocketAddr>>,
}

impl IngestionListener {
    pub fn new(
        config: PipelineConfig,
        decoder: Decoder,
        sender: UpdateSender,
        stats: Arc<Stats>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            decoder,
            sender,
            stats,
            token,
            bound_addr: Arc::new(OnceLock::new()),
        }
    }

    /// Handle to the address the socket ends up bound to
    ///
    /// Filled in once the bind succeeds; useful when binding port 0.
    pub fn bound_addr(&self) -> Arc<OnceLock<SocketAddr>> {
        Arc::clone(&self.bound_addr)
    }

    /// Bind (with retries) and serve until cancelled
    pub fn run(&self) -> Result<()> {
        let socket = match self.bind() {
            Ok(socket) => socket,
            Err(_) if self.token.is_cancelled() => {
                log::info!("Listener cancelled before the socket was bound");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.serve(&socket)
    }

    /// Bind the UDP socket, retrying with a fixed backoff
    pub fn bind(&self) -> Result<UdpSocket> {
        let addr = self.config.socket_addr();
        let backoff = self.config.bind_retry_backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match UdpSocket::bind(addr) {
                Ok(socket) => {
                    let local = socket.local_addr()?;
                    let _ = self.bound_addr.set(local);
                    log::info!("UDP listener started on {}", local);
                    return Ok(socket);
                }
                Err(e) => e,
            };

            log::error!("Failed to bind UDP socket on {} (attempt {}): {}", addr, attempts, err);

            let exhausted = self
                .config
                .max_bind_attempts
                .is_some_and(|max| attempts >= max);
            if exhausted || !self.token.sleep(backoff) {
                return Err(TelemetryError::Bind {
                    addr,
                    attempts,
                    source: err,
                });
            }
            log::info!("Retrying UDP bind on {}", addr);
        }
    }

    /// Receive loop over an already bound socket
    pub fn serve(&self, socket: &UdpSocket) -> Result<()> {
        socket.set_read_timeout(Some(self.config.recv_timeout()))?;
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        while !self.token.is_cancelled() {
            let len = match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    log::trace!("Datagram of {} bytes from {}", len, from);
                    len
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(e) => {
                    log::error!("Error in UDP listener: {}", e);
                    self.token.sleep(RECV_ERROR_PAUSE);
                    continue;
                }
            };

            if let Err(TelemetryError::ChannelClosed) = self.handle_datagram(&buf[..len]) {
                log::warn!("Distribution channel closed, listener stopping");
                break;
            }
        }

        log::info!("UDP listener stopped");
        Ok(())
    }

    /// Count, parse, decode and enqueue one datagram
    ///
    /// Returns the number of updates enqueued. Parse failures are counted as
    /// malformed and yield `Ok(0)`; the only error is a closed channel.
    pub fn handle_datagram(&self, datagram: &[u8]) -> Result<usize> {
        self.stats.record_received();

        let frame = match FrameParser::parse(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_malformed();
                match e {
                    ParseError::InvalidUtf8 => {
                        log::warn!("Failed to decode UDP packet: {:?}", datagram)
                    }
                    other => log::debug!("Dropping malformed datagram: {}", other),
                }
                return Ok(0);
            }
        };

        let Some(updates) = self.decoder.decode(&frame) else {
            return Ok(0);
        };

        let count = updates.len();
        for update in updates {
            self.sender.push(update)?;
        }
        self.stats.record_processed();
        Ok(count)
    }
}
