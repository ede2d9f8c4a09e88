//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN frames based on the validated message
//! definitions. Handles bit extraction, sign extension, fixed point and
//! physical value conversion.

use crate::codec;
use crate::config::DecoderConfig;
use crate::signals::database::{Message, Signal};
use crate::types::{CanFrame, CodecError, DecodedMessage, DecodedSignal};

/// Message decoder - extracts signals from CAN frames
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a CAN frame against its message definition
    ///
    /// A signal whose window does not fit the received payload is skipped
    /// and recorded in [`DecodedMessage::skipped`], unless the configuration
    /// asks to abort the whole message on the first failing signal.
    pub fn decode_message(
        frame: &CanFrame,
        message: &Message,
        config: &DecoderConfig,
    ) -> Result<DecodedMessage, CodecError> {
        let mut signals = Vec::with_capacity(message.signals.len());
        let mut skipped = Vec::new();

        for signal in &message.signals {
            match decode_signal(&frame.data, signal) {
                Ok(decoded) => signals.push(decoded),
                Err(e) if config.abort_on_signal_error => return Err(e),
                Err(e) => {
                    log::warn!(
                        "Skipping signal in message {} (ID 0x{:X}): {}",
                        message.name,
                        message.id,
                        e
                    );
                    skipped.push(e);
                }
            }
        }

        log::debug!(
            "Decoded {} signals from message {} (ID 0x{:X})",
            signals.len(),
            message.name,
            message.id
        );

        Ok(DecodedMessage {
            timestamp: frame.timestamp(),
            id: frame.id,
            name: message.name.clone(),
            transmitter: message.transmitter.to_string(),
            signals,
            skipped,
        })
    }
}

/// Decode a single signal from frame payload
pub fn decode_signal(payload: &[u8], signal: &Signal) -> Result<DecodedSignal, CodecError> {
    let bits = codec::extract_bits(payload, signal.start_bit as usize, signal.length as usize)
        .map_err(|e| CodecError::Signal {
            signal: signal.name.clone(),
            source: Box::new(e),
        })?;

    let (raw_value, value) = codec::to_physical(signal, bits);

    Ok(DecodedSignal {
        name: signal.name.clone(),
        value,
        raw_value,
        unit: (!signal.unit.is_empty()).then(|| signal.unit.clone()),
        topic: signal.topic().map(str::to_string),
    })
}
