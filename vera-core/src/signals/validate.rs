//! Semantic validation of a parsed configuration
//!
//! Validation checks every bound the grammar cannot express (frame width,
//! window ranges, fixed-point figures, overlapping windows, topic uniqueness)
//! and then routes `TP_` topics into the matching signals. The first violation
//! aborts the whole call.

use crate::signals::database::{Config, Message, Signal, SignalTopic, FRAME_BITS, MAX_DLC};
use crate::types::ValidationError;
use rayon::prelude::*;
use std::collections::HashMap;

/// Largest valid start bit
pub const MAX_START_BIT: u8 = (FRAME_BITS - 1) as u8;

/// Largest valid window length in bits
pub const MAX_SIGNAL_LENGTH: u8 = FRAME_BITS as u8;

/// Occupancy map of the 64 payload bits of one message
///
/// Each slot holds the index of the signal that claimed the bit.
#[derive(Debug, Clone)]
pub struct BitLayout {
    slots: [Option<usize>; FRAME_BITS],
}

impl Default for BitLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl BitLayout {
    pub fn new() -> Self {
        Self {
            slots: [None; FRAME_BITS],
        }
    }

    /// Mark `length` bits starting at `start` as owned by signal `index`
    ///
    /// Returns the index of the signal already owning one of those bits, if
    /// any. Bits past the end of the frame are ignored.
    pub fn claim(&mut self, index: usize, start: u8, length: u8) -> Result<(), usize> {
        let start = start as usize;
        let end = (start + length as usize).min(FRAME_BITS);
        if start >= end {
            return Ok(());
        }

        if let Some(owner) = self.slots[start..end].iter().flatten().next() {
            return Err(*owner);
        }
        for slot in &mut self.slots[start..end] {
            *slot = Some(index);
        }
        Ok(())
    }

    /// Owner of a single bit
    #[cfg(test)]
    fn owner(&self, bit: usize) -> Option<usize> {
        self.slots.get(bit).copied().flatten()
    }

    /// Number of claimed bits
    #[cfg(test)]
    fn used_bits(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Signal {
    /// Check the bounds of a single signal definition
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_bit > MAX_START_BIT {
            return Err(ValidationError::StartBitOutOfRange {
                start_bit: self.start_bit,
            });
        }
        if self.length == 0 || self.length > MAX_SIGNAL_LENGTH {
            return Err(ValidationError::LengthOutOfRange {
                length: self.length,
            });
        }
        if self.factor == 0.0 {
            return Err(ValidationError::ZeroFactor);
        }
        let numbers = [
            ("factor", self.factor),
            ("offset", self.offset),
            ("min", self.min),
            ("max", self.max),
        ];
        if let Some(&(field, value)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NonFinite { field, value });
        }
        if self.is_fixed_point()
            && self.integer_figures as u16 + self.decimal_figures as u16 != self.length as u16
        {
            return Err(ValidationError::FiguresMismatch {
                integer: self.integer_figures,
                decimal: self.decimal_figures,
                length: self.length,
            });
        }
        Ok(())
    }
}

impl Message {
    /// Check the message and all of its signals
    ///
    /// Order of checks: DLC, each signal, total signal length, each window
    /// against the frame end, overlap.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.dlc > MAX_DLC {
            return Err(ValidationError::DlcOutOfRange { dlc: self.dlc });
        }

        for (index, signal) in self.signals.iter().enumerate() {
            signal.validate().map_err(|e| ValidationError::InSignal {
                index,
                name: signal.name.clone(),
                source: Box::new(e),
            })?;
        }

        let total = self.signals_total_length();
        let capacity = self.bit_capacity();
        if total > capacity {
            return Err(ValidationError::SignalLengthsExceedDlc { total, capacity });
        }

        let mut layout = BitLayout::new();
        for (index, signal) in self.signals.iter().enumerate() {
            if signal.end_bit() > capacity {
                return Err(ValidationError::SignalOutsideFrame {
                    signal: signal.name.clone(),
                    end: signal.end_bit(),
                    capacity,
                });
            }
            layout
                .claim(index, signal.start_bit, signal.length)
                .map_err(|owner| ValidationError::Overlap {
                    first: self.signals[owner].name.clone(),
                    second: signal.name.clone(),
                })?;
        }

        Ok(())
    }
}

impl SignalTopic {
    /// Both the signal name and the topic must be non-empty
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signal.is_empty() || self.topic.is_empty() {
            return Err(ValidationError::InvalidTopic {
                signal: self.signal.clone(),
                topic: self.topic.clone(),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Validate the whole configuration and apply topics to their signals
    ///
    /// Messages are validated in parallel; when several are invalid the error
    /// of the lowest message index is returned.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let topics = self.topic_map()?;

        let failure = self
            .messages
            .par_iter()
            .enumerate()
            .find_map_first(|(index, message)| {
                message
                    .validate()
                    .err()
                    .map(|e| ValidationError::InMessage {
                        index,
                        name: message.name.clone(),
                        source: Box::new(e),
                    })
            });
        if let Some(err) = failure {
            return Err(err);
        }

        let mut applied = 0;
        for signal in self.messages.iter_mut().flat_map(|m| m.signals.iter_mut()) {
            if let Some(topic) = topics.get(signal.name.as_str()) {
                signal.topic = topic.to_string();
                applied += 1;
            }
        }

        for topic in &self.topics {
            if self.find_signal(&topic.signal).is_empty() {
                log::warn!(
                    "Topic '{}' names signal '{}' which is not defined in any message",
                    topic.topic,
                    topic.signal
                );
            }
        }

        log::info!(
            "Validated {} messages, applied topics to {} signals",
            self.messages.len(),
            applied
        );
        Ok(())
    }

    /// Signal name to topic, checking every record along the way
    fn topic_map(&self) -> Result<HashMap<String, String>, ValidationError> {
        let mut map = HashMap::with_capacity(self.topics.len());

        for (index, topic) in self.topics.iter().enumerate() {
            let in_topic = |source: ValidationError| ValidationError::InTopic {
                index,
                source: Box::new(source),
            };

            topic.validate().map_err(in_topic)?;
            if map.contains_key(&topic.signal) {
                return Err(in_topic(ValidationError::DuplicateSignalTopic {
                    signal: topic.signal.clone(),
                    topic: topic.topic.clone(),
                }));
            }
            map.insert(topic.signal.clone(), topic.topic.clone());
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::Node;
    use crate::signals::dbc::parse;

    fn signal(name: &str, start_bit: u8, length: u8) -> Signal {
        Signal {
            name: name.to_string(),
            start_bit,
            length,
            factor: 1.0,
            max: 100.0,
            receivers: vec![Node::from("Gateway")],
            ..Signal::default()
        }
    }

    fn message(dlc: u8, signals: Vec<Signal>) -> Message {
        Message {
            id: 0x100,
            name: "Test".to_string(),
            dlc,
            transmitter: Node::from("Engine"),
            signals,
            line: 0,
        }
    }

    #[test]
    fn test_signal_start_bit_bounds() {
        assert!(signal("A", 63, 1).validate().is_ok());
        assert_eq!(
            signal("A", 64, 1).validate(),
            Err(ValidationError::StartBitOutOfRange { start_bit: 64 })
        );
        assert_eq!(
            signal("A", 65, 1).validate(),
            Err(ValidationError::StartBitOutOfRange { start_bit: 65 })
        );
    }

    #[test]
    fn test_signal_length_bounds() {
        assert!(signal("A", 0, 63).validate().is_ok());
        assert!(signal("A", 0, 64).validate().is_ok());
        assert_eq!(
            signal("A", 0, 65).validate(),
            Err(ValidationError::LengthOutOfRange { length: 65 })
        );
        assert_eq!(
            signal("A", 0, 0).validate(),
            Err(ValidationError::LengthOutOfRange { length: 0 })
        );
    }

    #[test]
    fn test_zero_factor_always_fails() {
        let mut s = signal("A", 0, 8);
        s.factor = 0.0;
        assert_eq!(s.validate(), Err(ValidationError::ZeroFactor));

        s.offset = 10.0;
        s.signed = true;
        s.min = -5.0;
        assert_eq!(s.validate(), Err(ValidationError::ZeroFactor));
    }

    #[test]
    fn test_non_finite_numbers_fail() {
        let mut s = signal("A", 0, 8);
        s.factor = f32::NAN;
        assert!(matches!(
            s.validate(),
            Err(ValidationError::NonFinite { field: "factor", .. })
        ));

        let mut s = signal("A", 0, 8);
        s.offset = f32::INFINITY;
        assert_eq!(
            s.validate(),
            Err(ValidationError::NonFinite {
                field: "offset",
                value: f32::INFINITY
            })
        );

        let mut s = signal("A", 0, 8);
        s.min = f32::NEG_INFINITY;
        assert!(matches!(
            s.validate(),
            Err(ValidationError::NonFinite { field: "min", .. })
        ));

        let mut s = signal("A", 0, 8);
        s.max = f32::NAN;
        assert!(matches!(
            s.validate(),
            Err(ValidationError::NonFinite { field: "max", .. })
        ));
    }

    #[test]
    fn test_figures_must_fill_window() {
        let mut s = signal("A", 0, 8);
        s.integer_figures = 4;
        s.decimal_figures = 4;
        assert!(s.validate().is_ok());

        s.length = 9;
        assert_eq!(
            s.validate(),
            Err(ValidationError::FiguresMismatch {
                integer: 4,
                decimal: 4,
                length: 9
            })
        );

        // figures are bit counts, so 4+4 cannot describe a 16 bit window
        s.length = 16;
        assert_eq!(
            s.validate(),
            Err(ValidationError::FiguresMismatch {
                integer: 4,
                decimal: 4,
                length: 16
            })
        );

        s.integer_figures = 8;
        s.decimal_figures = 8;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_message_dlc_bounds() {
        assert!(message(8, vec![]).validate().is_ok());
        assert!(message(0, vec![]).validate().is_ok());
        assert_eq!(
            message(9, vec![]).validate(),
            Err(ValidationError::DlcOutOfRange { dlc: 9 })
        );
    }

    #[test]
    fn test_message_reports_signal_index() {
        let mut bad = signal("Bad", 8, 8);
        bad.factor = 0.0;
        let err = message(8, vec![signal("Good", 0, 8), bad]).validate().unwrap_err();

        match &err {
            ValidationError::InSignal { index, name, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(name, "Bad");
            }
            other => panic!("expected InSignal, got {:?}", other),
        }
        assert_eq!(err.root(), &ValidationError::ZeroFactor);
    }

    #[test]
    fn test_signal_lengths_exceed_dlc() {
        let err = message(2, vec![signal("A", 0, 8), signal("B", 8, 9)])
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::SignalLengthsExceedDlc {
                total: 17,
                capacity: 16
            }
        );
    }

    #[test]
    fn test_signal_window_outside_frame() {
        let err = message(2, vec![signal("A", 12, 8)]).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::SignalOutsideFrame {
                signal: "A".to_string(),
                end: 20,
                capacity: 16
            }
        );
    }

    #[test]
    fn test_overlapping_windows_fail() {
        let err = message(8, vec![signal("A", 0, 16), signal("B", 8, 16)])
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Overlap {
                first: "A".to_string(),
                second: "B".to_string()
            }
        );
    }

    #[test]
    fn test_interior_overlap_is_detected() {
        // B sits strictly inside A and shares no boundary bit with it
        let err = message(8, vec![signal("A", 0, 32), signal("B", 8, 8)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::Overlap { .. }));
    }

    #[test]
    fn test_adjacent_windows_pass() {
        let msg = message(3, vec![signal("A", 0, 16), signal("B", 16, 8)]);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_bit_layout() {
        let mut layout = BitLayout::new();
        assert_eq!(layout.claim(0, 0, 16), Ok(()));
        assert_eq!(layout.claim(1, 16, 8), Ok(()));
        assert_eq!(layout.claim(2, 23, 2), Err(1));
        assert_eq!(layout.owner(15), Some(0));
        assert_eq!(layout.owner(16), Some(1));
        assert_eq!(layout.owner(24), None);
        assert_eq!(layout.owner(100), None);
        assert_eq!(layout.used_bits(), 24);
    }

    #[test]
    fn test_topic_validation() {
        assert!(SignalTopic::new("Speed", "a/b").validate().is_ok());
        assert!(matches!(
            SignalTopic::new("", "a/b").validate(),
            Err(ValidationError::InvalidTopic { .. })
        ));
        assert!(matches!(
            SignalTopic::new("Speed", "").validate(),
            Err(ValidationError::InvalidTopic { .. })
        ));
    }

    #[test]
    fn test_topic_propagation() {
        let mut config = parse(
            "TP_ Speed vehicle/engine/speed
BO_ 123 EngineSpeed: 8 Engine
 SG_ Speed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" Gateway
 SG_ Temp : 16|8@1- (1,-40) [-40|150] \"C\" Gateway",
        )
        .unwrap();

        config.validate().unwrap();
        let message = &config.messages[0];
        assert_eq!(message.signals[0].topic, "vehicle/engine/speed");
        assert_eq!(message.signals[0].topic(), Some("vehicle/engine/speed"));
        assert!(message.signals[1].topic.is_empty());
    }

    #[test]
    fn test_duplicate_topics_fail() {
        let mut config = parse("TP_ Speed a/b\nTP_ Speed c/d").unwrap();
        let err = config.validate().unwrap_err();

        match &err {
            ValidationError::InTopic { index, .. } => assert_eq!(*index, 1),
            other => panic!("expected InTopic, got {:?}", other),
        }
        assert_eq!(
            err.root(),
            &ValidationError::DuplicateSignalTopic {
                signal: "Speed".to_string(),
                topic: "c/d".to_string()
            }
        );
    }

    #[test]
    fn test_config_reports_lowest_failing_message() {
        let mut config = Config::new();
        for i in 0..32u32 {
            let mut msg = message(1, vec![signal("A", 0, 8)]);
            msg.id = i;
            msg.name = format!("Msg{}", i);
            if i == 5 || i == 20 {
                msg.dlc = 9;
            }
            config.messages.push(msg);
        }

        let err = config.validate().unwrap_err();
        match err {
            ValidationError::InMessage { index, name, source } => {
                assert_eq!(index, 5);
                assert_eq!(name, "Msg5");
                assert_eq!(*source, ValidationError::DlcOutOfRange { dlc: 9 });
            }
            other => panic!("expected InMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_for_unknown_signal_is_not_an_error() {
        let mut config = parse("TP_ Missing a/b\nBO_ 1 A: 1 N\n SG_ X : 0|8@1+ (1,0) [0|1] \"\" N")
            .unwrap();
        assert!(config.validate().is_ok());
        assert!(config.messages[0].signals[0].topic.is_empty());
    }
}
