//! Bus description model
//!
//! The parsed and validated content of a DBC file: messages, their signals,
//! and the topic records that route signals to application channels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of payload bytes in a classic CAN frame
pub const MAX_DLC: u8 = 8;

/// Number of addressable bits in a classic CAN payload
pub const FRAME_BITS: usize = MAX_DLC as usize * 8;

/// Root of a parsed bus description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Message definitions, in source order
    pub messages: Vec<Message>,
    /// Topic records, in source order
    pub topics: Vec<SignalTopic>,
}

/// A CAN frame definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Declared payload size in bytes
    pub dlc: u8,
    /// Transmitting node
    pub transmitter: Node,
    /// All signals in this message
    pub signals: Vec<Signal>,
    /// 1-based source line of the `BO_` record (0 if built in code)
    #[serde(default, skip_serializing)]
    pub line: usize,
}

/// A named field within a message payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    /// First bit of the window; bit 0 is the MSB of payload byte 0
    pub start_bit: u8,
    /// Window length in bits
    pub length: u8,
    pub endianness: Endianness,
    pub signed: bool,
    /// Integer bits of a fixed-point value (0 with `decimal_figures == 0` means plain integer)
    pub integer_figures: u8,
    /// Fractional bits of a fixed-point value
    pub decimal_figures: u8,
    pub factor: f32,
    pub offset: f32,
    /// Lower clamp bound of the physical value
    pub min: f32,
    /// Upper clamp bound of the physical value
    pub max: f32,
    pub unit: String,
    pub receivers: Vec<Node>,
    /// Routing topic, filled in by `Config::validate` from the `TP_` records
    pub topic: String,
    /// 1-based source line of the `SG_` record (0 if built in code)
    #[serde(default, skip_serializing)]
    pub line: usize,
}

/// Bit ordering of a signal, following the `@<order>` digit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// `@0`
    #[default]
    Little,
    /// `@1`
    Big,
}

impl Endianness {
    /// Numeric code as written in the DBC and in generated tables
    pub fn code(self) -> u8 {
        match self {
            Endianness::Little => 0,
            Endianness::Big => 1,
        }
    }
}

/// A network node name (transmitter or receiver)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node(pub String);

impl Node {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Node {
    fn from(name: &str) -> Self {
        Node(name.to_string())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binds a signal name to a routing topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTopic {
    pub signal: String,
    pub topic: String,
}

impl SignalTopic {
    pub fn new(signal: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            signal: signal.into(),
            topic: topic.into(),
        }
    }
}

impl Signal {
    /// Exclusive end of the bit window
    pub fn end_bit(&self) -> u32 {
        self.start_bit as u32 + self.length as u32
    }

    /// True if the raw bits carry a fixed-point number
    pub fn is_fixed_point(&self) -> bool {
        self.integer_figures != 0 || self.decimal_figures != 0
    }

    /// Resolved topic, if any
    pub fn topic(&self) -> Option<&str> {
        if self.topic.is_empty() {
            None
        } else {
            Some(&self.topic)
        }
    }
}

impl Message {
    /// Declared payload size in bits
    pub fn bit_capacity(&self) -> u32 {
        self.dlc as u32 * 8
    }

    /// Sum of all signal lengths in bits
    pub fn signals_total_length(&self) -> u32 {
        self.signals.iter().map(|s| s.length as u32).sum()
    }

    /// Find a signal of this message by name
    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }
}

impl Config {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the first message definition with the given CAN ID
    pub fn message_by_id(&self, id: u32) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Get a message definition by name
    pub fn message_by_name(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Find all messages containing a signal with this name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(&Message, &Signal)> {
        self.messages
            .iter()
            .flat_map(|m| m.signals.iter().map(move |s| (m, s)))
            .filter(|(_, s)| s.name == signal_name)
            .collect()
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.iter().map(|m| m.signals.len()).sum(),
            num_topics: self.topics.len(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Total number of topic records
    pub num_topics: usize,
}
