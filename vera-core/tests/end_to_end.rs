//! Parse -> validate -> decode -> encode through the public API

use std::io::Write;
use tempfile::NamedTempFile;
use vera_core::signals::parse;
use vera_core::{CanFrame, Decoder, DecoderConfig, Endianness, Node, ValidationError, VeraError};

const ENGINE_DBC: &str = "VERSION \"1.0\"

BU_: Engine Gateway

BO_ 123 EngineSpeed: 3 Engine
 SG_ EngineSpeed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" Gateway

BO_ 0x124 Cooling: 4 Engine
 SG_ CoolantTemp : 0|8@1+ (1,-40) [-40|150] \"degC\" Gateway,Engine
 SG_ FanDuty : 8|8@1+(4,4) (1,0) [0|15.9375] \"%\" Gateway
 SG_ PumpOn : 16|1@1+ (1,0) [0|1] \"\" Gateway

CM_ SG_ 123 EngineSpeed \"crankshaft speed\";
TP_ EngineSpeed vehicle/engine/speed
TP_ CoolantTemp \"vehicle/engine/coolant\"
";

#[test]
fn test_example_parses_to_expected_model() {
    let content =
        "BO_ 123 EngineSpeed: 3 Engine\nSG_ EngineSpeed : 0|16@1+ (0.1,0) [0|8000] \"RPM\" Gateway";
    let mut config = parse(content).unwrap();
    config.validate().unwrap();

    assert_eq!(config.messages.len(), 1);
    let message = &config.messages[0];
    assert_eq!(message.id, 123);
    assert_eq!(message.name, "EngineSpeed");
    assert_eq!(message.dlc, 3);
    assert_eq!(message.transmitter, Node::from("Engine"));

    let signal = &message.signals[0];
    assert_eq!(signal.start_bit, 0);
    assert_eq!(signal.length, 16);
    assert_eq!(signal.endianness, Endianness::Big);
    assert!(!signal.signed);
    assert_eq!(signal.factor, 0.1);
    assert_eq!(signal.offset, 0.0);
    assert_eq!(signal.min, 0.0);
    assert_eq!(signal.max, 8000.0);
    assert_eq!(signal.unit, "RPM");
    assert_eq!(signal.receivers, vec![Node::from("Gateway")]);
}

#[test]
fn test_example_decodes() {
    let decoder = Decoder::from_dbc_str(ENGINE_DBC).unwrap();
    let decoded = decoder
        .decode_frame(&CanFrame::new(123, vec![0x03, 0x20, 0x00]))
        .unwrap();

    assert_eq!(decoded.name, "EngineSpeed");
    assert_eq!(decoded.transmitter, "Engine");
    let speed = decoded.signal("EngineSpeed").unwrap();
    assert_eq!(speed.raw_value, 800);
    assert_eq!(speed.value, 80.0);
    assert_eq!(speed.topic.as_deref(), Some("vehicle/engine/speed"));
}

#[test]
fn test_mixed_message_round_trip() {
    let decoder = Decoder::from_dbc_str(ENGINE_DBC).unwrap();
    let frame = decoder
        .encode_frame(
            0x124,
            &[("CoolantTemp", 90.0), ("FanDuty", 2.75), ("PumpOn", 1.0)],
        )
        .unwrap();

    // 130 = 0x82, 2.75 = 0010.1100, pump bit is the MSB of byte 2
    assert_eq!(frame.data, vec![0x82, 0x2C, 0x80, 0x00]);

    let decoded = decoder.decode_frame(&frame).unwrap();
    assert_eq!(decoded.signal("CoolantTemp").unwrap().value, 90.0);
    assert_eq!(
        decoded.signal("CoolantTemp").unwrap().topic.as_deref(),
        Some("vehicle/engine/coolant")
    );
    assert_eq!(decoded.signal("FanDuty").unwrap().value, 2.75);
    assert_eq!(decoded.signal("PumpOn").unwrap().value, 1.0);
}

#[test]
fn test_short_frame_policies() {
    let _ = env_logger::builder().is_test(true).try_init();

    let lenient = Decoder::from_dbc_str(ENGINE_DBC).unwrap();
    let decoded = lenient
        .decode_frame(&CanFrame::new(0x124, vec![0x82]))
        .unwrap();
    assert_eq!(decoded.signals.len(), 1);
    assert_eq!(decoded.skipped.len(), 2);

    let strict = Decoder::from_dbc_str(ENGINE_DBC)
        .unwrap()
        .with_options(DecoderConfig::new().with_abort_on_signal_error(true));
    assert!(matches!(
        strict.decode_frame(&CanFrame::new(0x124, vec![0x82])),
        Err(VeraError::Codec(_))
    ));
}

#[test]
fn test_overlap_rejected_at_load() {
    let err = Decoder::from_dbc_str(
        "BO_ 1 A: 8 N\n SG_ X : 0|16@1+ (1,0) [0|1] \"\" N\n SG_ Y : 8|16@1+ (1,0) [0|1] \"\" N",
    )
    .unwrap_err();

    match err {
        VeraError::Validation(e) => assert_eq!(
            e.root(),
            &ValidationError::Overlap {
                first: "X".to_string(),
                second: "Y".to_string()
            }
        ),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(ENGINE_DBC.replace('\n', "\r\n").as_bytes())
        .unwrap();
    temp_file.flush().unwrap();

    let decoder = Decoder::from_dbc_file(temp_file.path()).unwrap();
    let stats = decoder.database_stats();
    assert_eq!(stats.num_messages, 2);
    assert_eq!(stats.num_signals, 4);
    assert_eq!(stats.num_topics, 2);
}
