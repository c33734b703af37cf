//! UDP sample source.
//!
//! Receives are bounded by `recv_timeout_ms` so silence and shutdown are
//! noticed without a datagram arriving. Silence longer than the quiet period
//! is reported once as a disconnect; the next datagram reports the sensor
//! back. Receive errors back off exponentially and the source gives up after
//! `max_consecutive_failures` in a row.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::Instrument;

use super::{InboundDatagram, InboundMessage, SampleSource, SourceContext};
use crate::config::TransportConfig;
use crate::error::{log_transport_error, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// Nothing received yet
    Waiting,
    Up,
    /// Quiet period elapsed; disconnect already reported
    Down,
}

pub struct UdpSampleSource {
    socket: UdpSocket,
    local_addr: SocketAddr,
    config: TransportConfig,
}

impl UdpSampleSource {
    /// Bind the configured address. Failure here is fatal to startup.
    pub async fn bind(config: &TransportConfig) -> Result<Self, TransportError> {
        let bind_failed = |reason: String| TransportError::BindFailed {
            addr: config.bind_addr.clone(),
            reason,
        };
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|err| bind_failed(err.to_string()))?;
        let local_addr = socket
            .local_addr()
            .map_err(|err| bind_failed(err.to_string()))?;

        log::info!("[UdpSampleSource] Listening on {}", local_addr);
        Ok(Self {
            socket,
            local_addr,
            config: config.clone(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn receive_loop(self, mut ctx: SourceContext) -> Result<(), TransportError> {
        let mut buf = vec![0u8; self.config.max_datagram_bytes.max(1)];
        let recv_timeout = Duration::from_millis(self.config.recv_timeout_ms.max(1));
        let quiet_period = Duration::from_secs(self.config.quiet_period_secs);
        let backoff_initial = Duration::from_millis(self.config.backoff_initial_ms);
        let backoff_max = Duration::from_millis(self.config.backoff_max_ms).max(backoff_initial);

        let mut link = Link::Waiting;
        let mut last_datagram = Instant::now();
        let mut failures: u32 = 0;
        let mut backoff = backoff_initial;

        loop {
            if ctx.is_shutting_down() {
                break;
            }

            let received = tokio::select! {
                biased;
                changed = ctx.shutdown.changed() => {
                    if changed.is_err() || ctx.is_shutting_down() {
                        break;
                    }
                    continue;
                }
                received = timeout(recv_timeout, self.socket.recv_from(&mut buf)) => received,
            };

            match received {
                // Receive timed out: only silence bookkeeping.
                Err(_) => {
                    let silent_for = last_datagram.elapsed();
                    if link == Link::Up && silent_for >= quiet_period {
                        link = Link::Down;
                        log::warn!(
                            "[UdpSampleSource] No data for {:.1}s, sensor considered disconnected",
                            silent_for.as_secs_f64()
                        );
                        ctx.notify(InboundMessage::Disconnected { silent_for })
                            .await?;
                    }
                }
                Ok(Ok((len, addr))) => {
                    failures = 0;
                    backoff = backoff_initial;
                    last_datagram = Instant::now();

                    if link != Link::Up {
                        let after_silence = link == Link::Down;
                        link = Link::Up;
                        log::info!("[UdpSampleSource] Sensor {} connected", addr);
                        ctx.notify(InboundMessage::Connected { after_silence })
                            .await?;
                    }

                    let payload = String::from_utf8_lossy(&buf[..len]).trim().to_string();
                    ctx.forward(InboundDatagram {
                        payload,
                        source: Some(addr),
                        received_at: ctx.clock.now(),
                    })?;
                }
                Ok(Err(err)) => {
                    failures += 1;
                    log::warn!(
                        "[UdpSampleSource] Receive failed ({}/{}): {}",
                        failures,
                        self.config.max_consecutive_failures,
                        err
                    );
                    if failures >= self.config.max_consecutive_failures {
                        let err = TransportError::ReceiveFailed {
                            attempts: failures,
                            reason: err.to_string(),
                        };
                        log_transport_error(&err, "receive_loop");
                        let _ = ctx.notify(InboundMessage::SourceFailed(err.clone())).await;
                        return Err(err);
                    }

                    tokio::select! {
                        _ = ctx.shutdown.changed() => {}
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(backoff_max);
                }
            }
        }

        log::info!("[UdpSampleSource] Receive loop stopped");
        Ok(())
    }
}

impl SampleSource for UdpSampleSource {
    fn describe(&self) -> String {
        format!("udp://{}", self.local_addr)
    }

    fn spawn(self: Box<Self>, ctx: SourceContext) -> JoinHandle<Result<(), TransportError>> {
        let span = tracing::info_span!("udp_source", addr = %self.local_addr);
        tokio::spawn((*self).receive_loop(ctx).instrument(span))
    }
}
