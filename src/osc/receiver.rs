//! OSC command receiver
//!
//! VRChat avatars can expose buttons that send OSC parameters back to the
//! tracker, used to recenter or recalibrate the eyes from inside VR. This
//! listener decodes incoming packets, matches the configured command
//! addresses, and forwards [`OscCommand`]s for the estimator to consume.

use std::net::UdpSocket;
use std::time::Duration;

use crossbeam_channel::Sender;
use rosc::{OscPacket, OscType};
use tracing::{debug, info, warn};

use crate::error::OscError;
use crate::sync::CancellationToken;

/// Bounded receive wait; also the worst-case cancellation latency.
const RECV_WAIT: Duration = Duration::from_millis(100);

/// Commands an avatar can send back to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscCommand {
    Recenter,
    Recalibrate,
}

/// UDP listener for avatar-to-tracker commands.
pub struct OscCommandReceiver {
    socket: UdpSocket,
    recenter_address: String,
    recalibrate_address: String,
    commands: Sender<OscCommand>,
    cancellation: CancellationToken,
}

impl OscCommandReceiver {
    pub fn bind(
        port: u16,
        recenter_address: &str,
        recalibrate_address: &str,
        commands: Sender<OscCommand>,
        cancellation: CancellationToken,
    ) -> Result<Self, OscError> {
        let socket = UdpSocket::bind(("127.0.0.1", port))
            .map_err(|e| OscError::Bind(format!("127.0.0.1:{port}: {e}")))?;

        socket
            .set_read_timeout(Some(RECV_WAIT))
            .map_err(|e| OscError::Bind(e.to_string()))?;

        info!(
            "OSC command receiver listening on {}",
            socket
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| format!("port {port}"))
        );

        Ok(Self {
            socket,
            recenter_address: recenter_address.to_string(),
            recalibrate_address: recalibrate_address.to_string(),
            commands,
            cancellation,
        })
    }

    /// Local port the receiver is bound to.
    pub fn port(&self) -> Option<u16> {
        self.socket.local_addr().ok().map(|a| a.port())
    }

    /// Receive loop. Returns only when the cancellation token fires.
    pub fn run(&mut self) {
        let mut buf = [0u8; rosc::decoder::MTU];

        loop {
            if self.cancellation.is_cancelled() {
                info!("Exiting OSC command receiver");
                return;
            }

            match self.socket.recv(&mut buf) {
                Ok(size) => match rosc::decoder::decode_udp(&buf[..size]) {
                    Ok((_, packet)) => self.handle_packet(packet),
                    Err(e) => debug!("Undecodable OSC packet: {}", e),
                },
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    // Receive timeout; loop back for a cancellation check
                }
                Err(e) => {
                    warn!("OSC receive error: {}", e);
                }
            }
        }
    }

    fn handle_packet(&self, packet: OscPacket) {
        match packet {
            OscPacket::Message(msg) => {
                let command = if msg.addr == self.recenter_address {
                    Some(OscCommand::Recenter)
                } else if msg.addr == self.recalibrate_address {
                    Some(OscCommand::Recalibrate)
                } else {
                    None
                };

                if let Some(command) = command {
                    if triggered(&msg.args) {
                        debug!("OSC command: {:?}", command);
                        let _ = self.commands.send(command);
                    }
                }
            }
            OscPacket::Bundle(bundle) => {
                for packet in bundle.content {
                    self.handle_packet(packet);
                }
            }
        }
    }
}

/// Whether a command message's arguments count as "pressed". An argument-less
/// message is a trigger; otherwise the first argument decides.
fn triggered(args: &[OscType]) -> bool {
    match args.first() {
        None => true,
        Some(OscType::Bool(b)) => *b,
        Some(OscType::Int(i)) => *i != 0,
        Some(OscType::Float(f)) => *f > 0.5,
        Some(_) => false,
    }
}
