//! DBC file parser
//!
//! Parses the restricted DBC dialect into a [`Config`]. Parsing happens in two
//! steps: the content is first split into record groups (a `BO_` header with
//! its `SG_` lines, or a single `TP_` line), then each group is parsed field by
//! field. Every other line (comments, attributes, node lists) is skipped.

use crate::signals::database::{Config, Message, Node, SignalTopic};
use crate::signals::fields::{
    char_string, message_dlc, message_id, message_name, parse_signal_line, split_fields,
};
use crate::types::{ParseError, ParseErrorKind, Result};
use nom::combinator::all_consuming;
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;

pub const MESSAGE_KEYWORD: &str = "BO_";
pub const SIGNAL_KEYWORD: &str = "SG_";
pub const TOPIC_KEYWORD: &str = "TP_";

/// A run of source lines that forms one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordGroup<'a> {
    /// A `BO_` header and the `SG_` lines directly below it
    Message {
        line: usize,
        header: &'a str,
        signals: Vec<(usize, &'a str)>,
    },
    /// A single `TP_` line
    Topic { line: usize, text: &'a str },
}

/// Replace Windows (and bare carriage return) line terminators with `\n`
pub fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if content.contains('\r') {
        Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(content)
    }
}

/// Record keyword of a line: its first whitespace-separated token
fn keyword(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

/// Group normalized content into records
///
/// Line numbers are 1-based. A signal line is any line whose first token is
/// `SG_`, whatever its indentation; the first line that is not one ends the
/// message group. Signal lines outside a message group are ignored.
pub fn classify_lines(content: &str) -> Vec<RecordGroup<'_>> {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut groups = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        match keyword(line) {
            Some(MESSAGE_KEYWORD) => {
                let header_line = i + 1;
                let mut signals = Vec::new();
                i += 1;
                while i < lines.len() && keyword(lines[i]) == Some(SIGNAL_KEYWORD) {
                    signals.push((i + 1, lines[i].trim()));
                    i += 1;
                }
                groups.push(RecordGroup::Message {
                    line: header_line,
                    header: line.trim(),
                    signals,
                });
                continue;
            }
            Some(TOPIC_KEYWORD) => groups.push(RecordGroup::Topic {
                line: i + 1,
                text: line.trim(),
            }),
            Some(other) => log::trace!("Skipping line {} ({})", i + 1, other),
            None => {}
        }
        i += 1;
    }

    groups
}

/// Parse DBC content into a configuration
///
/// The returned configuration is not validated; call [`Config::validate`]
/// before using it.
pub fn parse(content: &str) -> std::result::Result<Config, ParseError> {
    let content = normalize_line_endings(content);
    let mut config = Config::new();

    for group in classify_lines(&content) {
        match group {
            RecordGroup::Message {
                line,
                header,
                signals,
            } => {
                let mut message = parse_message_header(header, line)?;
                for (signal_line, text) in signals {
                    message.signals.push(parse_signal_line(text, signal_line)?);
                }
                log::debug!(
                    "Parsed message {} (ID 0x{:X}) with {} signals",
                    message.name,
                    message.id,
                    message.signals.len()
                );
                config.messages.push(message);
            }
            RecordGroup::Topic { line, text } => {
                config.topics.push(parse_topic_line(text, line)?);
            }
        }
    }

    Ok(config)
}

/// Read and parse DBC content from any reader
pub fn parse_reader<R: Read>(mut reader: R) -> Result<Config> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(parse(&decode_text(bytes))?)
}

/// Read and parse a DBC file
pub fn parse_file(path: &Path) -> Result<Config> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path)?;
    let config = parse(&decode_text(bytes))?;

    log::info!(
        "Parsed {} messages and {} topics from {:?}",
        config.messages.len(),
        config.topics.len(),
        path
    );
    Ok(config)
}

/// UTF-8 first, then fall back to Latin-1 (DBC editors often write Windows-1252)
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("DBC content is not UTF-8, decoding as Latin-1");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    }
}

/// Parse a `BO_` header line
///
/// The returned message has no signals; the caller appends them.
pub fn parse_message_header(text: &str, line: usize) -> std::result::Result<Message, ParseError> {
    let err = |kind| ParseError::new(line, kind);

    let parts = split_fields(text);
    if parts.first() != Some(&MESSAGE_KEYWORD) {
        return Err(err(ParseErrorKind::Keyword {
            expected: MESSAGE_KEYWORD,
            found: parts.first().unwrap_or(&"").to_string(),
        }));
    }
    if parts.len() != 5 {
        return Err(err(ParseErrorKind::MessageStructure { found: parts.len() }));
    }

    let id = parse_message_id(parts[1])
        .ok_or_else(|| err(ParseErrorKind::MessageId(parts[1].to_string())))?;

    let (_, name) = all_consuming(message_name)(parts[2])
        .map_err(|_| err(ParseErrorKind::MessageNameColon(parts[2].to_string())))?;
    if name.is_empty() {
        return Err(err(ParseErrorKind::MessageNameEmpty));
    }

    let (_, dlc) = all_consuming(message_dlc)(parts[3])
        .map_err(|_| err(ParseErrorKind::MessageDlc(parts[3].to_string())))?;

    Ok(Message {
        id,
        name: name.to_string(),
        dlc,
        transmitter: Node::from(parts[4]),
        signals: Vec::new(),
        line,
    })
}

/// Parse a message ID written in base 10 or as `0x`-prefixed hexadecimal
pub fn parse_message_id(token: &str) -> Option<u32> {
    all_consuming(message_id)(token).ok().map(|(_, id)| id)
}

/// Parse a `TP_ <SignalName> <Topic>` line
pub fn parse_topic_line(text: &str, line: usize) -> std::result::Result<SignalTopic, ParseError> {
    let parts = split_fields(text);
    if parts.first() != Some(&TOPIC_KEYWORD) {
        return Err(ParseError::new(
            line,
            ParseErrorKind::Keyword {
                expected: TOPIC_KEYWORD,
                found: parts.first().unwrap_or(&"").to_string(),
            },
        ));
    }
    if parts.len() != 3 {
        return Err(ParseError::new(
            line,
            ParseErrorKind::TopicStructure(text.to_string()),
        ));
    }

    let topic = all_consuming(char_string)(parts[2])
        .map(|(_, topic)| topic)
        .unwrap_or(parts[2]);
    Ok(SignalTopic::new(parts[1], topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::Endianness;

    const ENGINE_DBC: &str = "BO_ 123 EngineSpeed: 3 Engine
SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" DriverGateway
\tSG_ OilTemperature : 16|8@1- (1,-40) [-40|150] \"ºC\" DriverGateway,EngineGateway
BO_ 0x124 EngineStatus: 3 Engine
   SG_ EngineSpeed2 : 0|16@1+ (0.1,0) [0|8000] \"RPM\" DriverGateway";

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_line_endings("line1\r\nline2\r\nline3"), "line1\nline2\nline3");
        assert_eq!(normalize_line_endings("line1\nline2"), "line1\nline2");
        assert_eq!(normalize_line_endings(""), "");
        assert_eq!(normalize_line_endings("single line"), "single line");
        assert_eq!(
            normalize_line_endings("line1\r\nline2\nline3\r\nline4"),
            "line1\nline2\nline3\nline4"
        );
    }

    #[test]
    fn test_classify_lines_groups_signals() {
        let content = "VERSION \"\"\nBO_ 1 A: 8 N\n SG_ X : 0|8@1+ (1,0) [0|1] \"\" N\nCM_ \"comment\"\n SG_ Orphan : 0|8@1+ (1,0) [0|1] \"\" N\nTP_ X a/b\n";
        let groups = classify_lines(content);

        assert_eq!(groups.len(), 2);
        match &groups[0] {
            RecordGroup::Message {
                line,
                header,
                signals,
            } => {
                assert_eq!(*line, 2);
                assert_eq!(*header, "BO_ 1 A: 8 N");
                assert_eq!(signals.len(), 1);
                assert_eq!(signals[0].0, 3);
                assert!(signals[0].1.starts_with("SG_ X"));
            }
            other => panic!("expected message group, got {:?}", other),
        }
        assert_eq!(
            groups[1],
            RecordGroup::Topic {
                line: 6,
                text: "TP_ X a/b"
            }
        );
    }

    #[test]
    fn test_classify_lines_matches_whole_keywords() {
        let content = "BO_TX_BU_ 123 : A,B;\nSG_MUL_VAL_ 1 X Y 0-1;\nBO_ 1 A: 8 N";
        let groups = classify_lines(content);
        assert_eq!(groups.len(), 1);
        assert!(matches!(groups[0], RecordGroup::Message { line: 3, .. }));
    }

    #[test]
    fn test_parse_two_messages() {
        let config = parse(ENGINE_DBC).unwrap();
        assert_eq!(config.messages.len(), 2);
        assert!(config.topics.is_empty());

        let first = &config.messages[0];
        assert_eq!(first.id, 123);
        assert_eq!(first.name, "EngineSpeed");
        assert_eq!(first.dlc, 3);
        assert_eq!(first.transmitter, Node::from("Engine"));
        assert_eq!(first.line, 1);
        assert_eq!(first.signals.len(), 2);
        assert_eq!(first.signals[1].name, "OilTemperature");
        assert_eq!(first.signals[1].line, 3);
        assert!(first.signals[1].signed);
        assert_eq!(first.signals[1].unit, "ºC");
        assert_eq!(
            first.signals[1].receivers,
            vec![Node::from("DriverGateway"), Node::from("EngineGateway")]
        );

        let second = &config.messages[1];
        assert_eq!(second.id, 0x124);
        assert_eq!(second.signals.len(), 1);
        assert_eq!(second.signals[0].endianness, Endianness::Big);
    }

    #[test]
    fn test_parse_windows_line_endings() {
        let content = ENGINE_DBC.replace('\n', "\r\n");
        let config = parse(&content).unwrap();
        assert_eq!(config.messages.len(), 2);
        assert_eq!(config.messages[0].transmitter, Node::from("Engine"));
    }

    #[test]
    fn test_parse_with_topics() {
        let content = "BO_ 123 EngineSpeed: 8 Engine
\tSG_ Speed : 0|2@1+ (0.1,0) [0|100] \"km/h\" Gateway
TP_ Speed vehicle/engine/speed";
        let config = parse(content).unwrap();
        assert_eq!(config.messages.len(), 1);
        assert_eq!(config.topics, vec![SignalTopic::new("Speed", "vehicle/engine/speed")]);
    }

    #[test]
    fn test_parse_empty_input() {
        let config = parse("").unwrap();
        assert!(config.messages.is_empty());
        assert!(config.topics.is_empty());
    }

    #[test]
    fn test_parse_skips_unknown_records() {
        let content = "CM_ \"This is a comment\"
BO_ 123 EngineSpeed: 8 Engine
\tSG_ Speed : 0|2@1+ (0.1,0) [0|100] \"km/h\" Gateway
BA_ \"AttributeName\" \"AttributeValue\"
TP_ Speed vehicle/engine/speed";
        let config = parse(content).unwrap();
        assert_eq!(config.messages.len(), 1);
        assert_eq!(config.topics.len(), 1);
    }

    #[test]
    fn test_parse_reports_signal_line_number() {
        let content = "BO_ 1 A: 8 N\n SG_ X : 0|8@1+ (1,0) [0|1] \"\" N\n SG_ Y : 8|8@2+ (1,0) [0|1] \"\" N";
        let err = parse(content).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.kind, ParseErrorKind::BitOrder("2".to_string()));
    }

    #[test]
    fn test_parse_message_header() {
        let message = parse_message_header("BO_ 123 EngineSpeed: 3 Engine", 7).unwrap();
        assert_eq!(message.id, 123);
        assert_eq!(message.name, "EngineSpeed");
        assert_eq!(message.dlc, 3);
        assert_eq!(message.transmitter, Node::from("Engine"));
        assert_eq!(message.line, 7);
        assert!(message.signals.is_empty());
    }

    #[test]
    fn test_parse_message_header_errors() {
        let kind = |text: &str| parse_message_header(text, 1).unwrap_err().kind;

        assert_eq!(
            kind("BO_ 123 EngineSpeed: 3"),
            ParseErrorKind::MessageStructure { found: 4 }
        );
        assert_eq!(
            kind("BO_ abc EngineSpeed: 3 Engine"),
            ParseErrorKind::MessageId("abc".to_string())
        );
        assert_eq!(
            kind("BO_ 123 EngineSpeed 3 Engine"),
            ParseErrorKind::MessageNameColon("EngineSpeed".to_string())
        );
        assert_eq!(kind("BO_ 123 : 3 Engine"), ParseErrorKind::MessageNameEmpty);
        assert_eq!(
            kind("BO_ 123 EngineSpeed: x3 Engine"),
            ParseErrorKind::MessageDlc("x3".to_string())
        );
        assert_eq!(
            kind("BO_ 123 EngineSpeed: 300 Engine"),
            ParseErrorKind::MessageDlc("300".to_string())
        );
        assert!(kind("BO_ 123 EngineSpeed: 300 Engine")
            .to_string()
            .contains("between 0 and 255"));
        assert!(matches!(kind("SG_ 1 A: 8 N"), ParseErrorKind::Keyword { .. }));
    }

    #[test]
    fn test_parse_message_id() {
        assert_eq!(parse_message_id("123"), Some(123));
        assert_eq!(parse_message_id("0x7B"), Some(123));
        assert_eq!(parse_message_id("0X7b"), Some(123));
        assert_eq!(parse_message_id("abc"), None);
        assert_eq!(parse_message_id("0xGHI"), None);
        assert_eq!(parse_message_id("-1"), None);
        assert_eq!(parse_message_id("0x"), None);
        assert_eq!(parse_message_id("4294967296"), None);
    }

    #[test]
    fn test_parse_topic_line() {
        let topic = parse_topic_line("TP_ EngineSpeed vehicle/engine/speed", 1).unwrap();
        assert_eq!(topic.signal, "EngineSpeed");
        assert_eq!(topic.topic, "vehicle/engine/speed");

        let quoted = parse_topic_line("TP_ EngineSpeed \"vehicle/engine/speed\"", 1).unwrap();
        assert_eq!(quoted.topic, "vehicle/engine/speed");
    }

    #[test]
    fn test_parse_topic_line_wrong_structure() {
        let err = parse_topic_line("TP_ EngineSpeed", 4).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.to_string().contains("signal topic has wrong structure"));
        assert!(err.to_string().contains("TP_ <SignalName> <Topic>"));

        assert!(parse_topic_line("TP_ EngineSpeed vehicle/engine/speed extra", 1).is_err());
    }

    #[test]
    fn test_parse_file_latin1() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut bytes = b"BO_ 1 A: 1 N\n SG_ T : 0|8@1+ (1,0) [0|255] \"".to_vec();
        bytes.push(0xB0); // degree sign in Latin-1
        bytes.extend_from_slice(b"C\" N\n");

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&bytes).unwrap();
        temp_file.flush().unwrap();

        let config = parse_file(temp_file.path()).unwrap();
        assert_eq!(config.messages[0].signals[0].unit, "°C");
    }

    #[test]
    fn test_parse_reader() {
        let config = parse_reader(ENGINE_DBC.as_bytes()).unwrap();
        assert_eq!(config.stats().num_signals, 3);
    }
}
