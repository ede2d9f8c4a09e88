//! Main decoder API
//!
//! This module provides the primary interface for the library. A [`Decoder`]
//! owns a validated [`Config`], indexes its messages by CAN ID and turns
//! frames into decoded messages (and physical values back into frames).

use crate::config::DecoderConfig;
use crate::message_decoder::MessageDecoder;
use crate::message_encoder::MessageEncoder;
use crate::signals::{dbc, Config, DatabaseStats, Message};
use crate::types::{CanFrame, CodecError, DecodedMessage, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Validated bus description
    config: Config,
    /// CAN ID -> index into `config.messages`
    index: HashMap<u32, usize>,
    options: DecoderConfig,
}

impl Decoder {
    /// Validate `config` and build a decoder over it
    ///
    /// When several messages share an ID the first definition is used.
    pub fn from_config(mut config: Config) -> Result<Self> {
        config.validate()?;

        let mut index = HashMap::with_capacity(config.messages.len());
        for (i, message) in config.messages.iter().enumerate() {
            if let Some(&first) = index.get(&message.id) {
                let first: &Message = &config.messages[first];
                log::warn!(
                    "Duplicate message ID 0x{:X}: '{}' is shadowed by '{}'",
                    message.id,
                    message.name,
                    first.name
                );
                continue;
            }
            index.insert(message.id, i);
        }

        log::info!("Decoder ready with {} messages", index.len());
        Ok(Self {
            config,
            index,
            options: DecoderConfig::default(),
        })
    }

    /// Parse and validate DBC content
    ///
    /// # Example
    /// ```
    /// use vera_core::{CanFrame, Decoder};
    ///
    /// let decoder = Decoder::from_dbc_str(
    ///     "BO_ 123 EngineSpeed: 3 Engine\n SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" Gateway",
    /// )
    /// .unwrap();
    /// let decoded = decoder
    ///     .decode_frame(&CanFrame::new(123, vec![0x03, 0x20, 0x00]))
    ///     .unwrap();
    /// assert_eq!(decoded.signals[0].value, 80.0);
    /// ```
    pub fn from_dbc_str(content: &str) -> Result<Self> {
        Self::from_config(dbc::parse(content)?)
    }

    /// Read, parse and validate DBC content from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_config(dbc::parse_reader(reader)?)
    }

    /// Load, parse and validate a DBC file
    ///
    /// # Example
    /// ```no_run
    /// use vera_core::Decoder;
    /// use std::path::Path;
    ///
    /// let decoder = Decoder::from_dbc_file(Path::new("config.dbc")).unwrap();
    /// ```
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        Self::from_config(dbc::parse_file(path)?)
    }

    /// Builder method: set decoding options
    pub fn with_options(mut self, options: DecoderConfig) -> Self {
        self.options = options;
        self
    }

    /// The validated bus description
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Message definition used for frames with this ID
    pub fn message(&self, id: u32) -> Option<&Message> {
        self.index.get(&id).map(|&i| &self.config.messages[i])
    }

    /// Decode one frame
    ///
    /// Unknown IDs and IDs excluded by the message filter are reported as
    /// [`CodecError::UnknownMessage`].
    pub fn decode_frame(&self, frame: &CanFrame) -> Result<DecodedMessage> {
        let message = self
            .message(frame.id)
            .filter(|_| self.options.should_process_message(frame.id))
            .ok_or(CodecError::UnknownMessage(frame.id))?;

        Ok(MessageDecoder::decode_message(frame, message, &self.options)?)
    }

    /// Decode a stream of frames, dropping the ones with no definition
    pub fn decode_frames<'a, I>(
        &'a self,
        frames: I,
    ) -> impl Iterator<Item = Result<DecodedMessage>> + 'a
    where
        I: IntoIterator<Item = CanFrame> + 'a,
    {
        frames.into_iter().filter_map(move |frame| match self.decode_frame(&frame) {
            Err(crate::VeraError::Codec(CodecError::UnknownMessage(id))) => {
                log::trace!("Unknown CAN ID: 0x{:X}, skipping frame", id);
                None
            }
            other => Some(other),
        })
    }

    /// Build a frame for message `id` from `(signal name, physical value)` pairs
    pub fn encode_frame(&self, id: u32, values: &[(&str, f32)]) -> Result<CanFrame> {
        let message = self.message(id).ok_or(CodecError::UnknownMessage(id))?;
        Ok(MessageEncoder::encode_message(message, values)?)
    }

    /// Get statistics about the loaded bus description
    pub fn database_stats(&self) -> DatabaseStats {
        self.config.stats()
    }
}
