//! VRChat OSC output
//!
//! Eye-tracking results are republished as OSC avatar parameters over UDP,
//! one float message per datagram, fire and forget. VRChat listens on the
//! local machine; message loss self-corrects because the next result
//! re-sends current state.

pub mod receiver;
pub mod sender;

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use rosc::{encoder, OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};

use crate::error::OscError;

/// Which eye a tracking result (or parameter path) applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeId {
    Right,
    Left,
    Both,
}

impl EyeId {
    pub fn includes_right(self) -> bool {
        matches!(self, EyeId::Right | EyeId::Both)
    }

    pub fn includes_left(self) -> bool {
        matches!(self, EyeId::Left | EyeId::Both)
    }
}

/// One computed eye-tracking result from the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeResult {
    pub eye: EyeId,
    pub blink: bool,
    pub x: f32,
    pub y: f32,
}

/// VRChat avatar parameter paths
pub mod params {
    pub const RIGHT_EYE_X: &str = "/avatar/parameters/RightEyeXTrack";
    pub const LEFT_EYE_X: &str = "/avatar/parameters/LeftEyeXTrack";
    pub const EYES_Y: &str = "/avatar/parameters/EyesYTrack";
    pub const RIGHT_EYE_LID: &str = "/avatar/parameters/RightEyeLidTrack";
    pub const LEFT_EYE_LID: &str = "/avatar/parameters/LeftEyeLidTrack";
}

/// Minimal OSC client: one float parameter per UDP datagram.
pub struct OscClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscClient {
    pub fn new(address: &str, port: u16) -> Result<Self, OscError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| OscError::Bind(e.to_string()))?;

        let target = (address, port)
            .to_socket_addrs()
            .map_err(|e| OscError::Target(e.to_string()))?
            .next()
            .ok_or_else(|| OscError::Target(format!("{address}:{port} did not resolve")))?;

        Ok(Self { socket, target })
    }

    /// Send one float-typed parameter. No acknowledgment, no retry.
    pub fn send_float(&self, param: &str, value: f32) -> Result<(), OscError> {
        let packet = OscPacket::Message(OscMessage {
            addr: param.to_string(),
            args: vec![OscType::Float(value)],
        });

        let bytes = encoder::encode(&packet).map_err(|e| OscError::Encode(e.to_string()))?;

        self.socket
            .send_to(&bytes, self.target)
            .map_err(|e| OscError::Send(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn eye_id_selection() {
        assert!(EyeId::Right.includes_right());
        assert!(!EyeId::Right.includes_left());
        assert!(EyeId::Left.includes_left());
        assert!(!EyeId::Left.includes_right());
        assert!(EyeId::Both.includes_left());
        assert!(EyeId::Both.includes_right());
    }

    #[test]
    fn client_sends_decodable_float_message() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let target = receiver.local_addr().unwrap();

        let client = OscClient::new("127.0.0.1", target.port()).unwrap();
        client.send_float(params::EYES_Y, -0.25).unwrap();

        let mut buf = [0u8; rosc::decoder::MTU];
        let (size, _) = receiver.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..size]).unwrap();

        match packet {
            OscPacket::Message(msg) => {
                assert_eq!(msg.addr, params::EYES_Y);
                assert_eq!(msg.args, vec![OscType::Float(-0.25)]);
            }
            other => panic!("expected message, got {other:?}"),
        }
    }
}
