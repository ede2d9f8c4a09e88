//! Message encoding
//!
//! The inverse of the decoder: builds a frame payload from physical signal
//! values.

use crate::codec;
use crate::signals::database::{Message, Signal};
use crate::types::{CanFrame, CodecError};

/// Message encoder - packs physical values into CAN frames
pub struct MessageEncoder;

impl MessageEncoder {
    /// Build a frame for `message` from `(signal name, physical value)` pairs
    ///
    /// The payload starts zeroed and is `dlc` bytes long. Signals that are not
    /// named keep their bits at zero.
    pub fn encode_message(
        message: &Message,
        values: &[(&str, f32)],
    ) -> Result<CanFrame, CodecError> {
        let mut data = vec![0u8; message.dlc as usize];

        for (name, value) in values {
            let signal = message
                .signal(name)
                .ok_or_else(|| CodecError::UnknownSignal {
                    message: message.name.clone(),
                    signal: name.to_string(),
                })?;
            encode_signal(&mut data, signal, *value)?;
        }

        log::debug!(
            "Encoded {} signals into message {} (ID 0x{:X})",
            values.len(),
            message.name,
            message.id
        );
        Ok(CanFrame::new(message.id, data))
    }
}

/// Encode one physical value into its window of `payload`
///
/// The window is cleared before the new bits are written, so a signal can be
/// encoded twice into the same buffer.
pub fn encode_signal(payload: &mut [u8], signal: &Signal, value: f32) -> Result<(), CodecError> {
    let bits = codec::to_raw(signal, value)?;
    let start = signal.start_bit as usize;
    let length = signal.length as usize;

    let in_signal = |e| CodecError::Signal {
        signal: signal.name.clone(),
        source: Box::new(e),
    };
    codec::extract_bits(payload, start, length).map_err(in_signal)?;
    for bit in start..start + length {
        payload[bit / 8] &= !(0x80 >> (bit % 8));
    }
    codec::insert_bits(payload, start, length, bits).map_err(in_signal)
}
