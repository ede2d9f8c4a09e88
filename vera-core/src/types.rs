//! Core types for the vera library
//!
//! This module defines the error taxonomy shared by the parser, the validator
//! and the codec, plus the canonical frame record consumed by the decoder and
//! the decoded values it emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, VeraError>;

/// Grammar fragment of a message header line
pub const MESSAGE_GRAMMAR: &str = "BO_ <MessageID> <MessageName>: <DLC> <TransmitterNode>";

/// Grammar fragment of a signal line
pub const SIGNAL_GRAMMAR: &str = "SG_ <SignalName> : <StartBit>|<Length>@<Order><Sign>[(<IntegerFigures>,<DecimalFigures>)] (<Factor>,<Offset>) [<Min>|<Max>] \"<Unit>\" <Receiver>[,<Receiver>...]";

/// Grammar fragment of a topic line
pub const TOPIC_GRAMMAR: &str = "TP_ <SignalName> <Topic>";

/// Any error the library can report
#[derive(Debug, thiserror::Error)]
pub enum VeraError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A grammar error, located at a 1-based source line
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// What was wrong with a record. Every message spells out the expected shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("expected a record starting with '{expected}', found '{found}'")]
    Keyword { expected: &'static str, found: String },

    #[error("message definition must be composed of 5 elements, found {found}:\n{grammar}", grammar = MESSAGE_GRAMMAR)]
    MessageStructure { found: usize },

    #[error("message ID '{0}' must be a base 10 or 0x-prefixed hexadecimal integer")]
    MessageId(String),

    #[error("message name '{0}' must end with a ':'")]
    MessageNameColon(String),

    #[error("message name cannot be empty, expected <MessageName>:")]
    MessageNameEmpty,

    #[error("message DLC '{0}' must be a base 10 integer between 0 and 255")]
    MessageDlc(String),

    #[error("signal line has {found} elements but is not well structured, must adhere to:\n{grammar}", grammar = SIGNAL_GRAMMAR)]
    SignalStructure { found: usize },

    #[error("signal line has '{0}' instead of a ':' between <SignalName> and <StartBit>")]
    SignalColon(String),

    #[error("invalid bit info '{0}', expected <StartBit>|<Length>@<Order><Sign>")]
    BitInfo(String),

    #[error("invalid start bit and length '{0}', expected <StartBit>|<Length>")]
    StartBitAndLength(String),

    #[error("invalid start bit '{0}', expected a base 10 integer")]
    StartBit(String),

    #[error("invalid length '{0}', expected a base 10 integer")]
    Length(String),

    #[error("invalid bit order and sign '{0}', expected <Order><Sign> such as 1+ or 0-")]
    OrderAndSign(String),

    #[error("invalid bit order '{0}', expected 0 (little endian) or 1 (big endian)")]
    BitOrder(String),

    #[error("invalid sign '{0}', expected + (unsigned) or - (signed)")]
    Sign(String),

    #[error("invalid decimal format '{0}', expected (<IntegerFigures>,<DecimalFigures>)")]
    Figures(String),

    #[error("invalid factor and offset '{0}', expected (<Factor>,<Offset>)")]
    FactorOffset(String),

    #[error("invalid factor '{0}', expected a floating point number")]
    Factor(String),

    #[error("invalid offset '{0}', expected a floating point number")]
    Offset(String),

    #[error("invalid min/max '{0}', expected [<Min>|<Max>]")]
    MinMax(String),

    #[error("invalid min '{0}', expected a floating point number")]
    Min(String),

    #[error("invalid max '{0}', expected a floating point number")]
    Max(String),

    #[error("invalid unit '{0}', expected \"<Unit>\"")]
    Unit(String),

    #[error("invalid receivers '{0}', expected <Receiver>[,<Receiver>...]")]
    Receivers(String),

    #[error("signal topic has wrong structure: '{0}'\nShould be:\n\t{grammar}", grammar = TOPIC_GRAMMAR)]
    TopicStructure(String),
}

/// A semantic error found while validating a parsed configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("message DLC {dlc} must be a number between 0 and 8")]
    DlcOutOfRange { dlc: u8 },

    #[error("signal start bit {start_bit} must be a number between 0 and 63")]
    StartBitOutOfRange { start_bit: u8 },

    #[error("signal length {length} must be a number between 1 and 64")]
    LengthOutOfRange { length: u8 },

    #[error("signal factor cannot be zero")]
    ZeroFactor,

    #[error("signal {field} must be a finite number, found {value}")]
    NonFinite { field: &'static str, value: f32 },

    #[error("sum of integer ({integer}) and decimal ({decimal}) figures must be equal to signal length {length}")]
    FiguresMismatch { integer: u8, decimal: u8, length: u8 },

    #[error("sum of signal lengths ({total} bits) is greater than message DLC * 8 ({capacity} bits)")]
    SignalLengthsExceedDlc { total: u32, capacity: u32 },

    #[error("signal '{signal}' ends at bit {end} but the message only has {capacity} bits")]
    SignalOutsideFrame { signal: String, end: u32, capacity: u32 },

    #[error("signals '{first}' and '{second}' cannot overlap")]
    Overlap { first: String, second: String },

    #[error("signal topic is invalid: signal '{signal}', topic '{topic}'")]
    InvalidTopic { signal: String, topic: String },

    #[error("duplicate signal topic '{topic}' for signal '{signal}'")]
    DuplicateSignalTopic { signal: String, topic: String },

    #[error("signal Nº{index} ({name}): {source}")]
    InSignal {
        index: usize,
        name: String,
        source: Box<ValidationError>,
    },

    #[error("message Nº{index} ({name}): {source}")]
    InMessage {
        index: usize,
        name: String,
        source: Box<ValidationError>,
    },

    #[error("topic Nº{index}: {source}")]
    InTopic {
        index: usize,
        source: Box<ValidationError>,
    },
}

impl ValidationError {
    /// Strip the index wrappers and return the underlying violation
    pub fn root(&self) -> &ValidationError {
        match self {
            ValidationError::InSignal { source, .. }
            | ValidationError::InMessage { source, .. }
            | ValidationError::InTopic { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised while moving values in and out of a frame payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("bit window {start}+{length} is out of bounds for a {frame_bits} bit payload")]
    OutOfBounds { start: u16, length: u16, frame_bits: usize },

    #[error("signal '{signal}': {source}")]
    Signal {
        signal: String,
        source: Box<CodecError>,
    },

    #[error("message not found: CAN ID 0x{0:X}")]
    UnknownMessage(u32),

    #[error("signal '{signal}' not found in message '{message}'")]
    UnknownSignal { message: String, signal: String },

    #[error("value {value} is not representable in signal '{signal}'")]
    Unrepresentable { signal: String, value: f32 },
}

/// Canonical CAN frame record
///
/// SDK adapters map their native frame structures into this record before
/// handing it to the decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub id: u32,
    /// Payload bytes (0-8 for classic CAN)
    pub data: Vec<u8>,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended_id: bool,
    /// True if this is a remote frame
    pub is_rtr: bool,
    /// True if this is a CAN-FD frame
    pub is_fd: bool,
    pub bit_rate_switch: bool,
    pub error_state_indicator: bool,
    /// Timestamp in nanoseconds since epoch
    pub timestamp_ns: u64,
}

impl CanFrame {
    /// Create a frame carrying `data` under `id`
    pub fn new(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
            ..Self::default()
        }
    }

    /// Builder method: set the receive timestamp
    pub fn with_timestamp_ns(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    /// Convert timestamp from nanoseconds to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nsecs = (self.timestamp_ns % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs, nsecs).unwrap_or_default()
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// A decoded signal with its physical value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the DBC
    pub name: String,
    /// Physical value after interpretation, scaling and clamping
    pub value: f32,
    /// Raw value after sign extension, before interpretation
    pub raw_value: i64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Routing topic attached by `TP_` records
    pub topic: Option<String>,
}

impl fmt::Display for DecodedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.3}", self.name, self.value)?;
        if let Some(unit) = &self.unit {
            write!(f, " {}", unit)?;
        }
        if let Some(topic) = &self.topic {
            write!(f, " -> {}", topic)?;
        }
        Ok(())
    }
}

/// A decoded CAN frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub timestamp: Timestamp,
    pub id: u32,
    pub name: String,
    pub transmitter: String,
    /// Signals that decoded successfully, in definition order
    pub signals: Vec<DecodedSignal>,
    /// Signals that could not be decoded from this frame
    pub skipped: Vec<CodecError>,
}

impl DecodedMessage {
    /// Look up a decoded signal by name
    pub fn signal(&self, name: &str) -> Option<&DecodedSignal> {
        self.signals.iter().find(|s| s.name == name)
    }
}
