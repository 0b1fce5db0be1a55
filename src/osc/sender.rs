//! OSC output worker
//!
//! Consumes eye-tracking results in arrival order and republishes them as
//! avatar parameters, with blink hysteresis: the "eyelid open" value is
//! sent exactly once per blink-to-open transition instead of on every
//! frame, while "eyelid closed" is re-sent for every blinking result.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{info, warn};

use super::{params, EyeResult, OscClient};
use crate::sync::CancellationToken;

/// Bounded dequeue wait; also the worst-case cancellation latency.
const DEQUEUE_WAIT: Duration = Duration::from_millis(100);

/// Long-lived output worker. Owns the blink hysteresis state.
pub struct OscOutputWorker {
    client: OscClient,
    results: Receiver<EyeResult>,
    cancellation: CancellationToken,
    was_blinking: bool,
}

impl OscOutputWorker {
    pub fn new(
        client: OscClient,
        results: Receiver<EyeResult>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            client,
            results,
            cancellation,
            // Start in the blinking state so the first open result always
            // sends an explicit eyelid-open, leaving the avatar in a known
            // state no matter what
            was_blinking: true,
        }
    }

    /// Output loop. Returns only when the cancellation token fires.
    pub fn run(&mut self) {
        loop {
            if self.cancellation.is_cancelled() {
                info!("Exiting OSC output worker");
                return;
            }

            match self.results.recv_timeout(DEQUEUE_WAIT) {
                Ok(result) => self.handle_result(&result),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // Producers are gone; hold position until told to stop
                    if self.cancellation.wait_timeout(DEQUEUE_WAIT) {
                        info!("Exiting OSC output worker");
                        return;
                    }
                }
            }
        }
    }

    /// Translate one result into its parameter sends, strictly in order.
    fn handle_result(&mut self, result: &EyeResult) {
        if !result.blink {
            if result.eye.includes_right() {
                self.send(params::RIGHT_EYE_X, result.x);
            }
            if result.eye.includes_left() {
                self.send(params::LEFT_EYE_X, result.x);
            }
            self.send(params::EYES_Y, result.y);

            if self.was_blinking {
                if result.eye.includes_left() {
                    self.send(params::LEFT_EYE_LID, 1.0);
                }
                if result.eye.includes_right() {
                    self.send(params::RIGHT_EYE_LID, 1.0);
                }
                self.was_blinking = false;
            }
        } else {
            if result.eye.includes_left() {
                self.send(params::LEFT_EYE_LID, 0.0);
            }
            if result.eye.includes_right() {
                self.send(params::RIGHT_EYE_LID, 0.0);
            }
            self.was_blinking = true;
        }
    }

    fn send(&self, param: &str, value: f32) {
        // Fire and forget: the next result supersedes a lost datagram
        if let Err(e) = self.client.send_float(param, value) {
            warn!("OSC send failed ({}): {}", param, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::EyeId;
    use crossbeam_channel::bounded;
    use rosc::{OscPacket, OscType};
    use std::net::UdpSocket;

    struct Capture {
        socket: UdpSocket,
        worker: OscOutputWorker,
    }

    impl Capture {
        fn new() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket
                .set_read_timeout(Some(Duration::from_millis(200)))
                .unwrap();
            let port = socket.local_addr().unwrap().port();

            let client = OscClient::new("127.0.0.1", port).unwrap();
            let (_tx, rx) = bounded(1);
            let worker = OscOutputWorker::new(client, rx, CancellationToken::new());

            Self { socket, worker }
        }

        /// Drain every datagram sent so far into (path, value) pairs.
        fn sent(&self) -> Vec<(String, f32)> {
            let mut messages = Vec::new();
            let mut buf = [0u8; rosc::decoder::MTU];
            while let Ok((size, _)) = self.socket.recv_from(&mut buf) {
                let (_, packet) = rosc::decoder::decode_udp(&buf[..size]).unwrap();
                if let OscPacket::Message(msg) = packet {
                    if let Some(OscType::Float(v)) = msg.args.first() {
                        messages.push((msg.addr, *v));
                    }
                }
            }
            messages
        }
    }

    fn result(eye: EyeId, blink: bool, x: f32, y: f32) -> EyeResult {
        EyeResult { eye, blink, x, y }
    }

    #[test]
    fn both_eyes_non_blink_sends_three_position_messages() {
        let mut capture = Capture::new();
        capture.worker.was_blinking = false; // steady open state

        capture
            .worker
            .handle_result(&result(EyeId::Both, false, 0.3, -0.1));

        assert_eq!(
            capture.sent(),
            vec![
                (params::RIGHT_EYE_X.to_string(), 0.3),
                (params::LEFT_EYE_X.to_string(), 0.3),
                (params::EYES_Y.to_string(), -0.1),
            ]
        );
    }

    #[test]
    fn first_open_result_also_sends_eyelid_open() {
        let mut capture = Capture::new();
        assert!(capture.worker.was_blinking);

        capture
            .worker
            .handle_result(&result(EyeId::Both, false, 0.0, 0.0));

        let sent = capture.sent();
        assert_eq!(
            sent,
            vec![
                (params::RIGHT_EYE_X.to_string(), 0.0),
                (params::LEFT_EYE_X.to_string(), 0.0),
                (params::EYES_Y.to_string(), 0.0),
                (params::LEFT_EYE_LID.to_string(), 1.0),
                (params::RIGHT_EYE_LID.to_string(), 1.0),
            ]
        );
        assert!(!capture.worker.was_blinking);
    }

    #[test]
    fn hysteresis_sends_each_lid_transition_once() {
        let mut capture = Capture::new();

        for blink in [true, false, false, true] {
            capture
                .worker
                .handle_result(&result(EyeId::Left, blink, 0.5, 0.5));
        }

        let lid_messages: Vec<(String, f32)> = capture
            .sent()
            .into_iter()
            .filter(|(path, _)| path == params::LEFT_EYE_LID)
            .collect();

        // Closed on the first blink, open exactly once for the two open
        // results, closed again on the final blink
        assert_eq!(
            lid_messages,
            vec![
                (params::LEFT_EYE_LID.to_string(), 0.0),
                (params::LEFT_EYE_LID.to_string(), 1.0),
                (params::LEFT_EYE_LID.to_string(), 0.0),
            ]
        );
    }

    #[test]
    fn blink_result_targets_only_the_tagged_eye() {
        let mut capture = Capture::new();

        capture
            .worker
            .handle_result(&result(EyeId::Right, true, 0.0, 0.0));

        assert_eq!(
            capture.sent(),
            vec![(params::RIGHT_EYE_LID.to_string(), 0.0)]
        );
        assert!(capture.worker.was_blinking);
    }

    #[test]
    fn run_exits_on_cancellation() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = socket.local_addr().unwrap().port();
        let client = OscClient::new("127.0.0.1", port).unwrap();

        let (tx, rx) = bounded::<EyeResult>(4);
        let cancellation = CancellationToken::new();
        let mut worker = OscOutputWorker::new(client, rx, cancellation.clone());

        let handle = std::thread::spawn(move || worker.run());

        tx.send(result(EyeId::Both, false, 0.1, 0.2)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        cancellation.cancel();

        let start = std::time::Instant::now();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
