use bytes::Bytes;
use ratelink_common::Clock;
use ratelink_control::ControlSource;
use ratelink_link::{LinkError, LinkQueue, NoopTelemetry, PacketQueue, Telemetry};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, trace, warn};

use crate::TokioClock;

/// Why a [`LinkDriver`] stopped before its input closed.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The link failed, e.g. on a zero rate.
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
    /// Nobody receives delivered packets anymore.
    #[error("Output channel closed")]
    OutputClosed,
}

/// Runs a [`LinkQueue`] between two channels.
///
/// Packets received on the input channel enter the link when they arrive. Delivered packets
/// are sent on the output channel as soon as their opportunity passes. Between events the
/// driver sleeps until the next delivery opportunity.
///
/// The driver stops when:
/// - the input channel closes: the link is marked finished, delivered packets are forwarded and
///   the link is handed back;
/// - the output channel closes;
/// - the link reports a configuration error, such as a zero rate.
///
/// Oversized packets are logged and skipped.
#[derive(Debug)]
pub struct LinkDriver<C, Q, T = NoopTelemetry> {
    link: LinkQueue<C, Q, T>,
    clock: TokioClock,
    /// Packets entering the link.
    from_peer: mpsc::Receiver<Bytes>,
    /// Packets leaving the link.
    to_peer: mpsc::Sender<Bytes>,
}

impl<C, Q, T> LinkDriver<C, Q, T>
where
    C: ControlSource,
    Q: PacketQueue,
    T: Telemetry,
{
    /// Creates a driver for `link`. The link's timestamps must come from `clock`.
    pub fn new(
        link: LinkQueue<C, Q, T>,
        clock: TokioClock,
        from_peer: mpsc::Receiver<Bytes>,
        to_peer: mpsc::Sender<Bytes>,
    ) -> Self {
        Self { link, clock, from_peer, to_peer }
    }

    /// The driven link.
    pub const fn link(&self) -> &LinkQueue<C, Q, T> {
        &self.link
    }

    /// Runs the driver to completion and returns the finished link.
    pub async fn run(mut self) -> Result<LinkQueue<C, Q, T>, DriverError> {
        let name = self.link.name().to_string();
        debug!(link = %name, "link driver started");

        loop {
            let now = self.clock.now();
            let wait = match self.link.wait_time(now) {
                Ok(Some(wait)) => wait,
                // Only a finished link has no next opportunity.
                Ok(None) => break,
                Err(e) => {
                    debug!(link = %name, error = %e, "stopping driver");
                    return Err(e.into());
                }
            };

            self.forward_output().await?;

            let deadline = self.clock.instant(now) + wait;
            trace!(link = %name, %now, ?wait, "waiting for next opportunity");

            tokio::select! {
                biased;

                packet = self.from_peer.recv() => match packet {
                    Some(payload) => self.on_packet(payload)?,
                    None => {
                        debug!(link = %name, "input closed");
                        self.link.mark_finished();
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        self.forward_output().await?;
        Ok(self.link)
    }

    fn on_packet(&mut self, payload: Bytes) -> Result<(), DriverError> {
        match self.link.read_packet(payload, self.clock.now()) {
            Ok(admission) => {
                trace!(?admission, "packet offered");
                Ok(())
            }
            Err(LinkError::OversizedPacket { size, max }) => {
                warn!(size, max, "dropping oversized packet");
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "stopping driver");
                Err(e.into())
            }
        }
    }

    async fn forward_output(&mut self) -> Result<(), DriverError> {
        while let Some(payload) = self.link.pop_output() {
            self.to_peer.send(payload).await.map_err(|_| DriverError::OutputClosed)?;
        }

        Ok(())
    }
}

impl<C, Q, T> LinkDriver<C, Q, T>
where
    C: ControlSource + Send + 'static,
    Q: PacketQueue + Send + 'static,
    T: Telemetry + Send + 'static,
{
    /// Spawns the driver on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<Result<LinkQueue<C, Q, T>, DriverError>> {
        tokio::spawn(self.run())
    }
}
