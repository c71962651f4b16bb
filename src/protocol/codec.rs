//! Frame encoding and decoding.
//!
//! # Wire format (binary dialect)
//!
//! Outbound command frames and inbound response frames share one physical
//! layout; only the third and fourth header bytes differ in meaning:
//!
//! ```text
//! ┌─────┬─────┬──────────┬──────────┬────────┬───────────┬─────────┬──────────┐
//! │ 'V' │ 'C' │ prog=1   │ rev=1    │ opcode │ len (u16  │ payload │ checksum │
//! │     │     │ (cmd) /  │ (cmd) /  │        │ little-   │         │ (1 byte) │
//! │     │     │ fw rev   │ status   │        │ endian)   │         │          │
//! │     │     │ (resp)   │ (resp)   │        │           │         │          │
//! └─────┴─────┴──────────┴──────────┴────────┴───────────┴─────────┴──────────┘
//! ```
//!
//! The checksum is the two's-complement negation of the byte-wise sum of
//! everything before it, so the whole frame sums to zero mod 256.
//!
//! Firmware below `0x20` instead speaks two legacy ASCII frames — a play
//! frame `'*' intensity '@' duration code... 'Z'` and a one-byte stop frame
//! `'!'` — with no checksum and no response.

use crate::domain::models::RfidRead;
use tracing::trace;

/// Magic bytes opening every binary-dialect frame.
pub const MAGIC: [u8; 2] = [b'V', b'C'];

/// Program identifier carried in every outbound frame.
pub const PROGRAM_ID: u8 = 1;

/// Protocol revision carried in every outbound frame.
pub const PROTOCOL_REVISION: u8 = 1;

/// Heartbeat padding byte the device sends absent real data.
pub const HEARTBEAT_BYTE: u8 = b'W';

/// magic + programID/revision + opcode
const HEADER_LEN: usize = 5;

/// Device command opcodes (binary dialect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    PlayScent = 0,
    StopScent = 1,
    QueryStatus = 2,
    WriteTrack = 3,
    ReadTrack = 4,
    QueryRfid = 5,
    EnableTimeout = 6,
    WriteSettings = 7,
    QueryOfflineAnalytics = 8,
    ClearOfflineAnalytics = 9,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Opcode> {
        match value {
            0 => Some(Opcode::PlayScent),
            1 => Some(Opcode::StopScent),
            2 => Some(Opcode::QueryStatus),
            3 => Some(Opcode::WriteTrack),
            4 => Some(Opcode::ReadTrack),
            5 => Some(Opcode::QueryRfid),
            6 => Some(Opcode::EnableTimeout),
            7 => Some(Opcode::WriteSettings),
            8 => Some(Opcode::QueryOfflineAnalytics),
            9 => Some(Opcode::ClearOfflineAnalytics),
            _ => None,
        }
    }
}

/// A decoded inbound response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub firmware_revision: u8,
    pub status: u8,
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// Outcome of one incremental decode pass over the inbound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Not enough bytes yet for the next field; keep the buffer and wait.
    Incomplete,
    /// Magic mismatch or checksum failure; the buffer is garbage.
    Invalid,
    Valid(ResponseFrame),
}

/// Two's-complement additive checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

/// Encode a binary-dialect command frame.
pub fn encode(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + 2 + payload.len() + 1);
    frame.extend_from_slice(&MAGIC);
    frame.push(PROGRAM_ID);
    frame.push(PROTOCOL_REVISION);
    frame.push(opcode);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    frame
}

/// Encode a legacy play frame: `'*' intensity '@' duration code... 'Z'`.
///
/// Legacy firmware only takes a single duration byte, so durations above
/// 255 are clamped.
pub fn encode_legacy_play(intensity: u8, duration: u16, scent_code: &str) -> Vec<u8> {
    let code = scent_code.as_bytes();
    let mut frame = Vec::with_capacity(4 + code.len() + 1);
    frame.push(b'*');
    frame.push(intensity);
    frame.push(b'@');
    frame.push(duration.min(0xFF) as u8);
    frame.extend_from_slice(code);
    frame.push(b'Z');
    frame
}

/// Encode the one-byte legacy stop frame.
pub fn encode_legacy_stop() -> Vec<u8> {
    vec![b'!']
}

/// Incrementally decode a response frame from the accumulated buffer.
///
/// Every field is read positionally; a buffer too short for the next field
/// yields [`DecodeOutcome::Incomplete`] so the caller retains the bytes and
/// waits for more. The checksum is verified over exactly one frame, so a
/// strict prefix of a valid frame is always `Incomplete`, never `Invalid`.
pub fn decode(buffer: &[u8]) -> DecodeOutcome {
    let mut position = 0;

    let header_byte1 = match read_u8(buffer, position) {
        Some(b) => b,
        None => return DecodeOutcome::Incomplete,
    };
    position += 1;
    if header_byte1 != MAGIC[0] {
        return DecodeOutcome::Invalid;
    }

    let header_byte2 = match read_u8(buffer, position) {
        Some(b) => b,
        None => return DecodeOutcome::Incomplete,
    };
    position += 1;
    if header_byte2 != MAGIC[1] {
        return DecodeOutcome::Invalid;
    }

    let firmware_revision = match read_u8(buffer, position) {
        Some(b) => b,
        None => return DecodeOutcome::Incomplete,
    };
    position += 1;

    let status = match read_u8(buffer, position) {
        Some(b) => b,
        None => return DecodeOutcome::Incomplete,
    };
    position += 1;

    let opcode = match read_u8(buffer, position) {
        Some(b) => b,
        None => return DecodeOutcome::Incomplete,
    };
    position += 1;

    let payload_length = match read_u16_le(buffer, position) {
        Some(v) => v as usize,
        None => return DecodeOutcome::Incomplete,
    };
    position += 2;

    if buffer.len() - position < payload_length {
        return DecodeOutcome::Incomplete;
    }
    let payload = buffer[position..position + payload_length].to_vec();
    position += payload_length;

    if read_u8(buffer, position).is_none() {
        return DecodeOutcome::Incomplete;
    }

    let frame = &buffer[..position + 1];
    if !verify_checksum(frame) {
        return DecodeOutcome::Invalid;
    }

    trace!(
        "decoded frame: rev={:#04X} status={} opcode={} payload_len={}",
        firmware_revision,
        status,
        opcode,
        payload_length
    );
    DecodeOutcome::Valid(ResponseFrame {
        firmware_revision,
        status,
        opcode,
        payload,
    })
}

fn verify_checksum(frame: &[u8]) -> bool {
    frame.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)) == 0
}

fn read_u8(buffer: &[u8], position: usize) -> Option<u8> {
    buffer.get(position).copied()
}

fn read_u16_le(buffer: &[u8], position: usize) -> Option<u16> {
    let lo = *buffer.get(position)?;
    let hi = *buffer.get(position + 1)?;
    Some(u16::from_le_bytes([lo, hi]))
}

/// Battery status decoded from an opcode-2 payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub battery_percent: u8,
    pub device_state: u8,
    pub has_offline_analytics: bool,
}

/// Parse an opcode-2 status payload: raw level, device state, analytics flag.
///
/// The raw level maps linearly from the `0xAA..0xC8` sensor range onto
/// 10..100 percent, clamped to 2..100.
pub fn parse_status_payload(payload: &[u8]) -> Option<StatusReport> {
    if payload.len() < 3 {
        return None;
    }
    let raw = payload[0] as i32;
    let percent = 10 + (100 - 10) * (raw - 0xAA) / (0xC8 - 0xAA);
    let percent = percent.clamp(2, 100) as u8;
    Some(StatusReport {
        battery_percent: percent,
        device_state: payload[1],
        has_offline_analytics: payload[2] != 0,
    })
}

/// Parse an opcode-5 RFID payload:
/// `[u16LE familyCode][u16LE idLen][id bytes][u16LE trackLen][track bytes]`.
///
/// Returns `None` when any sub-field runs past the end of the payload; the
/// caller treats that as an invalid response.
pub fn parse_rfid_payload(payload: &[u8]) -> Option<RfidRead> {
    let mut position = 0;

    let family_code = read_u16_le(payload, position)?;
    position += 2;

    let identifier_length = read_u16_le(payload, position)? as usize;
    position += 2;
    if payload.len() - position < identifier_length {
        return None;
    }
    let identifier =
        String::from_utf8_lossy(&payload[position..position + identifier_length]).into_owned();
    position += identifier_length;

    let track_length = read_u16_le(payload, position)? as usize;
    position += 2;
    if payload.len() - position < track_length {
        return None;
    }
    let track = payload[position..position + track_length].to_vec();

    Some(RfidRead {
        family_code,
        identifier,
        track,
    })
}
