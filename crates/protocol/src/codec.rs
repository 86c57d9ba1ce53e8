//! Datagram wire format (RFC 7252 section 3).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Token (if any, TKL bytes) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Options (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Option delta and length nibbles use the 13/14 extensions; nibble 15 is
//! reserved for the payload marker.

use crate::ProtocolError;
use crate::constants::{COAP_VERSION, Code, MAX_TOKEN_LEN, MessageKind, PAYLOAD_MARKER};
use crate::message::{CoapOption, Message};

const HEADER_LEN: usize = 4;

/// Largest value an extended delta or length field can carry.
const MAX_EXTENDED: usize = 65535 + 269;

/// Decodes one datagram into a [`Message`].
pub fn decode(data: &[u8]) -> Result<Message, ProtocolError> {
    let (kind, message_id) = peek_header(data)?;
    let tkl = (data[0] & 0x0F) as usize;
    if tkl > MAX_TOKEN_LEN {
        return Err(ProtocolError::InvalidTokenLength(tkl));
    }
    let code = Code::from_byte(data[1]);

    if code == Code::EMPTY && data.len() > HEADER_LEN {
        return Err(ProtocolError::InvalidEmptyMessage);
    }
    if data.len() < HEADER_LEN + tkl {
        return Err(ProtocolError::TooShort(data.len()));
    }

    let token = data[HEADER_LEN..HEADER_LEN + tkl].to_vec();
    let mut pos = HEADER_LEN + tkl;
    let mut number: usize = 0;
    let mut options = Vec::new();
    let mut payload = Vec::new();

    while pos < data.len() {
        let byte = data[pos];
        pos += 1;
        if byte == PAYLOAD_MARKER {
            if pos == data.len() {
                return Err(ProtocolError::EmptyPayloadAfterMarker);
            }
            payload = data[pos..].to_vec();
            break;
        }

        let delta = read_extended(byte >> 4, data, &mut pos)?;
        let length = read_extended(byte & 0x0F, data, &mut pos)?;
        number += delta;
        if number > u16::MAX as usize {
            return Err(ProtocolError::InvalidOption(format!(
                "option number {number} out of range"
            )));
        }
        if pos + length > data.len() {
            return Err(ProtocolError::InvalidOption(format!(
                "option {number} truncated: need {length} bytes, have {}",
                data.len() - pos
            )));
        }
        options.push(CoapOption {
            number: number as u16,
            value: data[pos..pos + length].to_vec(),
        });
        pos += length;
    }

    Ok(Message {
        kind,
        code,
        message_id,
        token,
        options,
        payload,
    })
}

/// Encodes a [`Message`] into one datagram.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    if msg.token.len() > MAX_TOKEN_LEN {
        return Err(ProtocolError::InvalidTokenLength(msg.token.len()));
    }

    let mut buf = Vec::with_capacity(HEADER_LEN + msg.token.len() + msg.payload.len() + 16);
    buf.push((COAP_VERSION << 6) | (msg.kind.bits() << 4) | msg.token.len() as u8);
    buf.push(msg.code.as_byte());
    buf.extend_from_slice(&msg.message_id.to_be_bytes());
    buf.extend_from_slice(&msg.token);

    let mut sorted: Vec<&CoapOption> = msg.options.iter().collect();
    sorted.sort_by_key(|opt| opt.number);

    let mut previous: usize = 0;
    for opt in sorted {
        let delta = opt.number as usize - previous;
        let length = opt.value.len();
        if length > MAX_EXTENDED {
            return Err(ProtocolError::InvalidOption(format!(
                "option {} value too long: {length} bytes",
                opt.number
            )));
        }
        let (delta_nibble, delta_ext) = split_extended(delta);
        let (length_nibble, length_ext) = split_extended(length);
        buf.push((delta_nibble << 4) | length_nibble);
        buf.extend_from_slice(&delta_ext);
        buf.extend_from_slice(&length_ext);
        buf.extend_from_slice(&opt.value);
        previous = opt.number as usize;
    }

    if !msg.payload.is_empty() {
        buf.push(PAYLOAD_MARKER);
        buf.extend_from_slice(&msg.payload);
    }
    Ok(buf)
}

/// Reads the fixed header only: message type and id.
///
/// Lets a receiver identify a message whose body fails to decode.
pub fn peek_header(data: &[u8]) -> Result<(MessageKind, u16), ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::TooShort(data.len()));
    }
    let version = data[0] >> 6;
    if version != COAP_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let kind = MessageKind::from_bits(data[0] >> 4);
    let message_id = u16::from_be_bytes([data[2], data[3]]);
    Ok((kind, message_id))
}

/// Encodes an unsigned option value with leading zero bytes stripped.
pub fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

/// Decodes an unsigned option value of at most 4 bytes.
pub fn decode_uint(value: &[u8]) -> Option<u32> {
    if value.len() > 4 {
        return None;
    }
    Some(value.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

fn read_extended(nibble: u8, data: &[u8], pos: &mut usize) -> Result<usize, ProtocolError> {
    match nibble {
        0..=12 => Ok(nibble as usize),
        13 => {
            let byte = *data
                .get(*pos)
                .ok_or_else(|| ProtocolError::InvalidOption("truncated extended field".into()))?;
            *pos += 1;
            Ok(byte as usize + 13)
        }
        14 => {
            let bytes = data
                .get(*pos..*pos + 2)
                .ok_or_else(|| ProtocolError::InvalidOption("truncated extended field".into()))?;
            *pos += 2;
            Ok(u16::from_be_bytes([bytes[0], bytes[1]]) as usize + 269)
        }
        _ => Err(ProtocolError::InvalidOption(
            "reserved nibble 15 in option header".into(),
        )),
    }
}

fn split_extended(value: usize) -> (u8, Vec<u8>) {
    match value {
        0..=12 => (value as u8, Vec::new()),
        13..=268 => (13, vec![(value - 13) as u8]),
        _ => (14, ((value - 269) as u16).to_be_bytes().to_vec()),
    }
}
