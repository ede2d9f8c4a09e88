//! Decoder configuration types
//!
//! This module defines the small set of options that change how frames are
//! decoded. Everything about the bus itself comes from the DBC file.

use serde::{Deserialize, Serialize};

/// Configuration for the frame decoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Abort the whole message when one signal cannot be decoded
    /// (false = skip that signal and keep the others)
    #[serde(default)]
    pub abort_on_signal_error: bool,

    /// Optional: only decode these specific CAN message IDs
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: choose the decode-failure policy
    pub fn with_abort_on_signal_error(mut self, enabled: bool) -> Self {
        self.abort_on_signal_error = enabled;
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Check if a message ID should be processed
    pub fn should_process_message(&self, can_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&can_id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_config_builder() {
        let config = DecoderConfig::new()
            .with_abort_on_signal_error(true)
            .with_message_filter(vec![0x123, 0x456]);

        assert!(config.abort_on_signal_error);
        assert_eq!(config.message_filter, Some(vec![0x123, 0x456]));
    }

    #[test]
    fn test_filter_logic() {
        let config = DecoderConfig::new().with_message_filter(vec![0x123, 0x456]);

        assert!(config.should_process_message(0x123));
        assert!(config.should_process_message(0x456));
        assert!(!config.should_process_message(0x789));
    }

    #[test]
    fn test_no_filters() {
        let config = DecoderConfig::new();

        // Without filters, everything should pass
        assert!(!config.abort_on_signal_error);
        assert!(config.should_process_message(0x123));
        assert!(config.should_process_message(0xFFFFFFFF));
    }
}
