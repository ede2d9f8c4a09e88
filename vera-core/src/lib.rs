//! Vera Core Library
//!
//! Parses a restricted DBC dialect describing CAN messages, validates it, and
//! moves signal values in and out of raw CAN frames.
//!
//! # Architecture
//!
//! - [`signals::dbc`] turns DBC text into a [`Config`] (messages, signals and
//!   the `TP_` topic records that route signals to application channels)
//! - [`Config::validate`] checks frame widths, bit windows, fixed-point
//!   figures, overlaps and topics, then attaches topics to their signals
//! - [`codec`] holds the bit-exact window extraction and insertion
//! - [`Decoder`] ties it together: frame in, physical values out, and back
//!
//! The library does NOT generate code or talk to CAN hardware; the `vera`
//! command line tool builds on the validated [`Config`] for that.
//!
//! # Example Usage
//!
//! ```
//! use vera_core::{CanFrame, Decoder, DecoderConfig};
//!
//! let dbc = "BO_ 123 EngineSpeed: 3 Engine
//!  SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" Gateway
//! TP_ EngineSpeed vehicle/engine/speed";
//!
//! let decoder = Decoder::from_dbc_str(dbc)
//!     .unwrap()
//!     .with_options(DecoderConfig::new().with_abort_on_signal_error(true));
//!
//! let message = decoder
//!     .decode_frame(&CanFrame::new(123, vec![0x03, 0x20, 0x00]))
//!     .unwrap();
//! for signal in &message.signals {
//!     println!("{}", signal);
//! }
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod decoder;
pub mod signals;
pub mod types;

mod message_decoder;
mod message_encoder;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::Decoder;
pub use message_decoder::decode_signal;
pub use message_encoder::encode_signal;
pub use signals::{Config, DatabaseStats, Endianness, Message, Node, Signal, SignalTopic};
pub use types::{
    CanFrame, CodecError, DecodedMessage, DecodedSignal, ParseError, ParseErrorKind, Result,
    Timestamp, ValidationError, VeraError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty description is valid
        let decoder = Decoder::from_config(Config::new()).unwrap();
        let stats = decoder.database_stats();
        assert_eq!(stats.num_messages, 0);
        assert!(!VERSION.is_empty());
    }
}
