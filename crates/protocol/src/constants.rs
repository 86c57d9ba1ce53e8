use std::fmt;

/// Protocol version carried in every message header.
pub const COAP_VERSION: u8 = 1;

/// Maximum token length in bytes.
pub const MAX_TOKEN_LEN: usize = 8;

/// Marker byte separating options from the payload.
pub const PAYLOAD_MARKER: u8 = 0xFF;

// Option numbers (RFC 7252 section 12.2, RFC 7959 section 6).
pub const OPTION_URI_HOST: u16 = 3;
pub const OPTION_URI_PORT: u16 = 7;
pub const OPTION_URI_PATH: u16 = 11;
pub const OPTION_CONTENT_FORMAT: u16 = 12;
pub const OPTION_MAX_AGE: u16 = 14;
pub const OPTION_URI_QUERY: u16 = 15;
pub const OPTION_ACCEPT: u16 = 17;
pub const OPTION_BLOCK2: u16 = 23;
pub const OPTION_BLOCK1: u16 = 27;
pub const OPTION_SIZE2: u16 = 28;

/// `application/octet-stream`.
pub const CONTENT_FORMAT_OCTET_STREAM: u16 = 42;

/// Message type from the two type bits of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

impl MessageKind {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => MessageKind::Confirmable,
            1 => MessageKind::NonConfirmable,
            2 => MessageKind::Acknowledgement,
            _ => MessageKind::Reset,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            MessageKind::Confirmable => 0,
            MessageKind::NonConfirmable => 1,
            MessageKind::Acknowledgement => 2,
            MessageKind::Reset => 3,
        }
    }
}

/// Method or response code, `class.detail` packed into one byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(u8);

impl Code {
    pub const EMPTY: Code = Code::new(0, 0);

    pub const GET: Code = Code::new(0, 1);
    pub const PUT: Code = Code::new(0, 3);

    pub const CONTENT: Code = Code::new(2, 5);

    pub const BAD_REQUEST: Code = Code::new(4, 0);
    pub const NOT_FOUND: Code = Code::new(4, 4);
    pub const METHOD_NOT_ALLOWED: Code = Code::new(4, 5);
    pub const REQUEST_ENTITY_INCOMPLETE: Code = Code::new(4, 8);

    pub const INTERNAL_SERVER_ERROR: Code = Code::new(5, 0);
    pub const SERVICE_UNAVAILABLE: Code = Code::new(5, 3);

    /// Builds a code from its class (3 bits) and detail (5 bits).
    pub const fn new(class: u8, detail: u8) -> Self {
        Code(((class & 0x07) << 5) | (detail & 0x1F))
    }

    pub const fn from_byte(byte: u8) -> Self {
        Code(byte)
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    /// Class 0 with a non-zero detail.
    pub fn is_request(self) -> bool {
        self.class() == 0 && self != Code::EMPTY
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({self})")
    }
}
