// THEORY:
// `NxtLink` speaks the LEGO NXT "direct command" protocol over any byte
// stream (a Bluetooth RFCOMM device node, a USB serial adapter, or an
// in-memory buffer in tests). Establishing that stream is the caller's job.
//
// Wire format, per telegram:
//
//     [len lo][len hi][type][opcode][payload ...]
//
// The brick is reached through a serial device (RFCOMM or USB adapter), which
// `NxtLink::open_serial` opens in raw mode so the line discipline never
// rewrites telegram bytes such as 0x03.
//
// `len` counts everything after the two prefix bytes. `type` is 0x00 when the
// brick should reply and 0x80 when it should not. A reply telegram looks like
// `[len lo][len hi][0x02][opcode][status]...` and status 0 means success.

use crate::core_modules::motor::{MotorCommand, MotorMode, RunState};
use crate::error::LinkError;
use crate::link::ActuatorLink;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

const DIRECT_COMMAND_REPLY: u8 = 0x00;
const DIRECT_COMMAND_NO_REPLY: u8 = 0x80;
const REPLY_TELEGRAM: u8 = 0x02;

const OP_PLAY_TONE: u8 = 0x03;
const OP_SET_OUTPUT_STATE: u8 = 0x04;

const MODE_MOTOR_ON: u8 = 0x01;
const REGULATION_IDLE: u8 = 0x00;
const RUN_STATE_IDLE: u8 = 0x00;
const RUN_STATE_RUNNING: u8 = 0x20;

/// Largest reply body we are willing to read.
const MAX_REPLY_LEN: usize = 64;

/// Frames a SETOUTPUTSTATE telegram for `command`.
pub fn encode_motor_command(command: &MotorCommand, reply: bool) -> Vec<u8> {
    let mode = match command.mode {
        MotorMode::On => MODE_MOTOR_ON,
        MotorMode::Off => 0x00,
    };
    let run_state = match command.run_state {
        RunState::Running => RUN_STATE_RUNNING,
        RunState::Idle => RUN_STATE_IDLE,
    };

    let mut body = Vec::with_capacity(12);
    body.push(telegram_type(reply));
    body.push(OP_SET_OUTPUT_STATE);
    body.push(command.axis.port());
    body.push(command.power as u8);
    body.push(mode);
    body.push(REGULATION_IDLE);
    body.push(command.turn_ratio as u8);
    body.push(run_state);
    body.extend_from_slice(&command.tacho_limit.to_le_bytes());
    frame(body)
}

/// Frames a PLAYTONE telegram.
pub fn encode_play_tone(frequency_hz: u16, duration_ms: u16, reply: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(6);
    body.push(telegram_type(reply));
    body.push(OP_PLAY_TONE);
    body.extend_from_slice(&frequency_hz.to_le_bytes());
    body.extend_from_slice(&duration_ms.to_le_bytes());
    frame(body)
}

fn telegram_type(reply: bool) -> u8 {
    if reply { DIRECT_COMMAND_REPLY } else { DIRECT_COMMAND_NO_REPLY }
}

fn frame(body: Vec<u8>) -> Vec<u8> {
    let mut packet = Vec::with_capacity(body.len() + 2);
    packet.extend_from_slice(&(body.len() as u16).to_le_bytes());
    packet.extend(body);
    packet
}

pub struct NxtLink<S> {
    stream: S,
    request_reply: bool,
}

impl<S: Read + Write> NxtLink<S> {
    pub fn new(stream: S, request_reply: bool) -> Self {
        Self { stream, request_reply }
    }

    /// Beeps the brick; handy as a "connected" cue.
    pub fn play_tone(&mut self, frequency_hz: u16, duration_ms: u16) -> Result<(), LinkError> {
        let packet = encode_play_tone(frequency_hz, duration_ms, self.request_reply);
        self.transact(OP_PLAY_TONE, &packet)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn transact(&mut self, opcode: u8, packet: &[u8]) -> Result<(), LinkError> {
        self.stream.write_all(packet)?;
        self.stream.flush()?;
        if self.request_reply {
            self.read_reply(opcode)?;
        }
        Ok(())
    }

    fn read_reply(&mut self, opcode: u8) -> Result<(), LinkError> {
        let mut prefix = [0u8; 2];
        self.stream.read_exact(&mut prefix)?;
        let len = u16::from_le_bytes(prefix) as usize;
        if !(3..=MAX_REPLY_LEN).contains(&len) {
            return Err(LinkError::MalformedReply(format!("reply length {len}")));
        }

        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body)?;
        if body[0] != REPLY_TELEGRAM || body[1] != opcode {
            return Err(LinkError::MalformedReply(format!(
                "expected reply to 0x{opcode:02x}, got type 0x{:02x} opcode 0x{:02x}",
                body[0], body[1]
            )));
        }
        match body[2] {
            0 => Ok(()),
            status => Err(LinkError::Rejected { command: opcode, status }),
        }
    }
}

impl NxtLink<Box<dyn SerialPort>> {
    /// Opens the serial device at `path` (8N1, raw, no flow control) with
    /// `timeout` applied to every read and write.
    pub fn open_serial(
        path: &str,
        baud_rate: u32,
        timeout: Duration,
        request_reply: bool,
    ) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud_rate).timeout(timeout).open()?;
        debug!(path, baud_rate, "serial port opened");
        Ok(Self::new(port, request_reply))
    }
}

impl<S: Read + Write + Send> ActuatorLink for NxtLink<S> {
    fn set_motor_state(&mut self, command: &MotorCommand) -> Result<(), LinkError> {
        let packet = encode_motor_command(command, self.request_reply);
        debug!(axis = %command.axis, bytes = ?packet, "SETOUTPUTSTATE");
        self.transact(OP_SET_OUTPUT_STATE, &packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::motor::{Axis, DEFAULT_TURN_RATIO};
    use std::io::Cursor;

    /// Reads replies from a canned buffer, records writes separately.
    struct Loopback {
        replies: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Loopback {
        fn with_replies(replies: Vec<u8>) -> Self {
            Self { replies: Cursor::new(replies), written: Vec::new() }
        }
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn running_command_layout() {
        let cmd = MotorCommand::for_power(Axis::B, 0.5, DEFAULT_TURN_RATIO);
        let packet = encode_motor_command(&cmd, false);
        assert_eq!(
            packet,
            vec![12, 0, 0x80, 0x04, 1, 57, 0x01, 0x00, 80, 0x20, 0, 0, 0, 0]
        );
    }

    #[test]
    fn negative_power_is_twos_complement() {
        let cmd = MotorCommand::for_power(Axis::A, -0.3, DEFAULT_TURN_RATIO);
        let packet = encode_motor_command(&cmd, true);
        assert_eq!(packet[2], 0x00);
        assert_eq!(packet[4], 0);
        assert_eq!(packet[5] as i8, -56);
    }

    #[test]
    fn idle_command_layout() {
        let packet = encode_motor_command(&MotorCommand::idle(Axis::A), false);
        assert_eq!(packet, vec![12, 0, 0x80, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn tone_layout() {
        assert_eq!(encode_play_tone(300, 300, false), vec![6, 0, 0x80, 0x03, 0x2c, 0x01, 0x2c, 0x01]);
    }

    #[test]
    fn successful_reply_is_accepted() {
        let stream = Loopback::with_replies(vec![3, 0, 0x02, 0x04, 0x00]);
        let mut link = NxtLink::new(stream, true);
        link.set_motor_state(&MotorCommand::idle(Axis::A)).unwrap();
        assert_eq!(link.into_inner().written.len(), 14);
    }

    #[test]
    fn error_status_is_surfaced() {
        let stream = Loopback::with_replies(vec![3, 0, 0x02, 0x04, 0xC0]);
        let mut link = NxtLink::new(stream, true);
        let err = link.set_motor_state(&MotorCommand::idle(Axis::A)).unwrap_err();
        assert!(matches!(err, LinkError::Rejected { command: 0x04, status: 0xC0 }));
    }

    #[test]
    fn truncated_reply_is_an_io_error() {
        let stream = Loopback::with_replies(vec![3, 0, 0x02]);
        let mut link = NxtLink::new(stream, true);
        let err = link.play_tone(300, 300).unwrap_err();
        assert!(matches!(err, LinkError::Io(_)));
    }

    #[test]
    fn reply_bytes_matching_tty_control_characters_survive() {
        // 0x03 is ^C to a cooked terminal; a raw stream must hand it through.
        let stream = Loopback::with_replies(vec![3, 0, 0x02, 0x03, 0x00]);
        let mut link = NxtLink::new(stream, true);
        link.play_tone(300, 300).unwrap();
    }

    #[test]
    fn missing_serial_device_is_a_link_error() {
        let result = NxtLink::open_serial("/nonexistent/rfcomm-nxt", 115_200, Duration::from_millis(100), true);
        assert!(matches!(result, Err(LinkError::Serial(_))));
    }

    #[test]
    fn no_reply_mode_never_reads() {
        let mut link = NxtLink::new(Loopback::with_replies(Vec::new()), false);
        link.set_motor_state(&MotorCommand::idle(Axis::B)).unwrap();
        link.play_tone(300, 300).unwrap();
        assert_eq!(link.into_inner().written.len(), 14 + 8);
    }
}
