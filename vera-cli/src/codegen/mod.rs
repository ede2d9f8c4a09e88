//! C code emission
//!
//! Turns a validated [`Config`] into a C header and source pair for firmware:
//! one static signal table per message, plus `vera_decode_can_frame` and
//! `vera_encode_can_frame`. The generated bit handling, sign extension, fixed
//! point, scaling and clamping follow `vera_core::codec` step for step.
//!
//! SDK adapters live in [`sdk`].

pub mod sdk;

use anyhow::{bail, Context, Result};
use heck::{ToShoutySnakeCase, ToSnakeCase};
use std::collections::HashSet;
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use vera_core::{Config, Message, Signal};

pub use sdk::Sdk;

/// Default name of the generated header
pub const DEFAULT_HEADER_NAME: &str = "vera.h";

/// Name of the generated source file
pub const SOURCE_NAME: &str = "vera.c";

const HEADER_TYPES: &str = r#"#include <stdbool.h>
#include <stdint.h>

#define CAN_MAX_DATA_LEN 8

typedef struct {
    uint32_t id;
    uint8_t  dlc;
    uint8_t  data[CAN_MAX_DATA_LEN];

    bool is_extended_id;
    bool is_rtr;
    bool is_fd;
    bool bit_rate_switch;
    bool error_state_indicator;

    uint64_t timestamp;
} vera_can_rx_frame_t;

typedef struct {
    uint32_t id;
    uint8_t  dlc;
    uint8_t  data[CAN_MAX_DATA_LEN];

    bool is_extended_id;
    bool is_rtr;
    bool is_fd;
    bool bit_rate_switch;
    bool error_state_indicator;

    uint64_t timestamp;
} vera_can_tx_frame_t;

typedef struct {
    const char*        name;
    uint8_t            start_bit;
    uint8_t            length;
    uint8_t            endianness;
    bool               is_signed;
    uint8_t            integer_figures;
    uint8_t            decimal_figures;
    float              factor;
    float              offset;
    float              min;
    float              max;
    const char*        unit;
    const char* const* receivers;
    uint8_t            n_receivers;
    const char*        topic;
} vera_signal_t;

typedef struct {
    uint32_t             id;
    const char*          name;
    uint8_t              dlc;
    const char*          transmitter;
    const vera_signal_t* signals;
    uint8_t              n_signals;
} vera_message_t;

typedef enum {
    vera_err_ok,
    vera_err_out_of_bounds,
    vera_err_null_arg,
    vera_err_unknown_message,
    vera_err_unrepresentable
} vera_err_t;
"#;

const HEADER_RESULT_TYPES: &str = r#"typedef struct {
    const char* name;
    const char* unit;
    const char* topic;
    float       value;
    int64_t     raw_value;
    uint64_t    timestamp;
} vera_decoded_signal_t;

typedef struct {
    uint32_t              id;
    const char*           name;
    uint8_t               n_signals;
    uint8_t               n_skipped;
    vera_decoded_signal_t decoded_signals[VERA_MAX_SIGNALS];
} vera_decoding_result_t;
"#;

const HEADER_PROTOTYPES: &str = r#"const vera_message_t* vera_find_message(uint32_t id);

// Signals whose window does not fit the received payload are skipped and
// counted in result->n_skipped.
vera_err_t vera_decode_can_frame(
    const vera_can_rx_frame_t* frame,
    vera_decoding_result_t*    result
);

// values[i] is the physical value of the message's i-th signal.
vera_err_t vera_encode_can_frame(
    uint32_t             id,
    const float*         values,
    vera_can_tx_frame_t* frame
);
"#;

const SOURCE_BIT_FUNCTIONS: &str = r#"static uint64_t vera_mask(uint8_t length) {
    return length >= 64 ? UINT64_MAX : ((1ULL << length) - 1ULL);
}

// Bit 0 is the MSB of payload byte 0; the window is read MSB first.
static uint64_t vera_extract_bits(const uint8_t* payload, uint8_t start, uint8_t length) {
    uint64_t value = 0;

    for (uint8_t i = 0; i < length; i++) {
        uint8_t bit = start + i;
        value = (value << 1) | ((payload[bit / 8] >> (7 - bit % 8)) & 1U);
    }

    return value;
}

// The window must be zero beforehand.
static void vera_insert_bits(uint8_t* payload, uint64_t value, uint8_t start, uint8_t length) {
    for (uint8_t i = 0; i < length; i++) {
        uint8_t bit = start + i;
        if ((value >> (length - 1 - i)) & 1U) {
            payload[bit / 8] |= (uint8_t)(0x80U >> (bit % 8));
        }
    }
}

static int64_t vera_sign_extend(uint64_t value, uint8_t length) {
    if (length == 0 || length >= 64) return (int64_t)value;
    if (value & (1ULL << (length - 1))) return (int64_t)(value | ~vera_mask(length));
    return (int64_t)value;
}

static float vera_clamp(float value, float min, float max) {
    if (value < min) return min;
    if (value > max) return max;
    return value;
}

static bool vera_window_fits(const vera_signal_t* signal, uint8_t dlc) {
    if (dlc > CAN_MAX_DATA_LEN) dlc = CAN_MAX_DATA_LEN;
    return signal->length > 0 && signal->length <= 64 &&
           (unsigned)signal->start_bit + signal->length <= (unsigned)dlc * 8U;
}
"#;

const SOURCE_CODEC_FUNCTIONS: &str = r#"static vera_err_t vera_decode_signal(
    const vera_can_rx_frame_t* frame,
    const vera_signal_t*       signal,
    vera_decoded_signal_t*     out
) {
    if (!vera_window_fits(signal, frame->dlc)) return vera_err_out_of_bounds;

    uint64_t bits = vera_extract_bits(frame->data, signal->start_bit, signal->length);
    int64_t raw = signal->is_signed ? vera_sign_extend(bits, signal->length) : (int64_t)bits;
    float numeric = signal->is_signed ? (float)raw : (float)bits;

    if (signal->integer_figures || signal->decimal_figures) {
        numeric = ldexpf(numeric, -(int)signal->decimal_figures);
    }

    out->name      = signal->name;
    out->unit      = signal->unit;
    out->topic     = signal->topic;
    out->raw_value = raw;
    out->value     = vera_clamp(numeric * signal->factor + signal->offset, signal->min, signal->max);
    out->timestamp = frame->timestamp;

    return vera_err_ok;
}

static vera_err_t vera_encode_signal(
    uint8_t*             payload,
    uint8_t              dlc,
    const vera_signal_t* signal,
    float                value
) {
    if (!vera_window_fits(signal, dlc)) return vera_err_out_of_bounds;
    if (isnan(value) || isinf(value)) return vera_err_unrepresentable;

    double numeric = ((double)vera_clamp(value, signal->min, signal->max) - (double)signal->offset) /
                     (double)signal->factor;
    if (signal->integer_figures || signal->decimal_figures) {
        numeric = ldexp(numeric, signal->decimal_figures);
    }
    numeric = round(numeric);

    uint64_t bits;
    if (signal->is_signed) {
        double half = ldexp(1.0, signal->length - 1);
        if (numeric < -half || numeric >= half) return vera_err_unrepresentable;
        bits = (uint64_t)(int64_t)numeric & vera_mask(signal->length);
    } else {
        if (numeric < 0.0 || numeric >= ldexp(1.0, signal->length)) return vera_err_unrepresentable;
        bits = (uint64_t)numeric;
    }

    vera_insert_bits(payload, bits, signal->start_bit, signal->length);
    return vera_err_ok;
}

vera_err_t vera_decode_can_frame(
    const vera_can_rx_frame_t* frame,
    vera_decoding_result_t*    result
) {
    if (!frame || !result) return vera_err_null_arg;

    const vera_message_t* message = vera_find_message(frame->id);
    if (!message) return vera_err_unknown_message;

    result->id        = message->id;
    result->name      = message->name;
    result->n_signals = 0;
    result->n_skipped = 0;

    for (uint8_t i = 0; i < message->n_signals; i++) {
        vera_decoded_signal_t* out = &result->decoded_signals[result->n_signals];
        if (vera_decode_signal(frame, &message->signals[i], out) == vera_err_ok) {
            result->n_signals++;
        } else {
            result->n_skipped++;
        }
    }

    return vera_err_ok;
}

vera_err_t vera_encode_can_frame(
    uint32_t             id,
    const float*         values,
    vera_can_tx_frame_t* frame
) {
    if (!frame || !values) return vera_err_null_arg;

    const vera_message_t* message = vera_find_message(id);
    if (!message) return vera_err_unknown_message;

    memset(frame, 0, sizeof(*frame));
    frame->id             = message->id;
    frame->dlc            = message->dlc;
    frame->is_extended_id = message->id > 0x7FFU;

    for (uint8_t i = 0; i < message->n_signals; i++) {
        vera_err_t err = vera_encode_signal(frame->data, message->dlc, &message->signals[i], values[i]);
        if (err != vera_err_ok) return err;
    }

    return vera_err_ok;
}
"#;

/// C identifier for a DBC name: snake case, never starting with a digit
pub fn c_ident(name: &str) -> String {
    let ident = name.to_snake_case();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("x_{}", ident)
    } else {
        ident
    }
}

/// Upper case C macro fragment for a DBC name
pub fn c_macro(name: &str) -> String {
    c_ident(name).to_shouty_snake_case()
}

/// C float literal
pub fn c_float(value: f32) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value == f32::INFINITY {
        "INFINITY".to_string()
    } else if value == f32::NEG_INFINITY {
        "-INFINITY".to_string()
    } else {
        format!("{:?}f", value)
    }
}

/// C string literal
pub fn c_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn c_string_or_null(value: &str) -> String {
    if value.is_empty() {
        "NULL".to_string()
    } else {
        c_string(value)
    }
}

/// Include guard for a header file name, e.g. `vera.h` -> `VERA_H`
pub fn include_guard(header_name: &str) -> String {
    header_name.to_shouty_snake_case()
}

/// Emits the C sources for one configuration
pub struct CodeGenerator<'a> {
    config: &'a Config,
    header_name: String,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            header_name: DEFAULT_HEADER_NAME.to_string(),
        }
    }

    /// Builder method: name of the generated header file
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    /// Message and signal names must map to distinct C identifiers
    fn check_identifiers(&self) -> Result<()> {
        let mut messages = HashSet::new();
        for message in &self.config.messages {
            let ident = c_ident(&message.name);
            if !messages.insert(ident.clone()) {
                bail!(
                    "message '{}' maps to C identifier '{}' which is already used",
                    message.name,
                    ident
                );
            }

            let mut signals = HashSet::new();
            for signal in &message.signals {
                let ident = c_ident(&signal.name);
                if !signals.insert(ident.clone()) {
                    bail!(
                        "signal '{}' in message '{}' maps to C identifier '{}' which is already used",
                        signal.name,
                        message.name,
                        ident
                    );
                }
            }
        }
        Ok(())
    }

    fn max_signals(&self) -> usize {
        self.config
            .messages
            .iter()
            .map(|m| m.signals.len())
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Generate the header file
    pub fn header(&self) -> Result<String> {
        self.check_identifiers()?;

        let guard = include_guard(&self.header_name);
        let mut out = String::new();

        writeln!(out, "#ifndef {}", guard)?;
        writeln!(out, "#define {}", guard)?;
        writeln!(out)?;
        writeln!(out, "{}", HEADER_TYPES)?;
        writeln!(out, "#define VERA_N_MESSAGES {}U", self.config.messages.len())?;
        writeln!(out, "#define VERA_MAX_SIGNALS {}U", self.max_signals())?;
        writeln!(out)?;
        writeln!(out, "{}", HEADER_RESULT_TYPES)?;

        for message in &self.config.messages {
            write_message_defines(&mut out, message)?;
        }
        if !self.config.messages.is_empty() {
            writeln!(out, "extern const vera_message_t vera_messages[VERA_N_MESSAGES];")?;
            writeln!(out)?;
        }

        writeln!(out, "{}", HEADER_PROTOTYPES)?;
        writeln!(out, "#endif // {}", guard)?;
        Ok(out)
    }

    /// Generate the source file
    pub fn source(&self) -> Result<String> {
        self.check_identifiers()?;

        let mut out = String::new();
        writeln!(out, "#include \"{}\"", self.header_name)?;
        writeln!(out)?;
        writeln!(out, "#include <math.h>")?;
        writeln!(out, "#include <stddef.h>")?;
        writeln!(out, "#include <string.h>")?;
        writeln!(out)?;
        writeln!(out, "{}", SOURCE_BIT_FUNCTIONS)?;

        for message in &self.config.messages {
            write_signal_table(&mut out, message)?;
        }

        if self.config.messages.is_empty() {
            writeln!(out, "const vera_message_t* vera_find_message(uint32_t id) {{")?;
            writeln!(out, "    (void)id;")?;
            writeln!(out, "    return NULL;")?;
            writeln!(out, "}}")?;
        } else {
            writeln!(out, "const vera_message_t vera_messages[VERA_N_MESSAGES] = {{")?;
            for message in &self.config.messages {
                write_message_entry(&mut out, message)?;
            }
            writeln!(out, "}};")?;
            writeln!(out)?;
            writeln!(out, "const vera_message_t* vera_find_message(uint32_t id) {{")?;
            writeln!(out, "    for (size_t i = 0; i < VERA_N_MESSAGES; i++) {{")?;
            writeln!(out, "        if (vera_messages[i].id == id) return &vera_messages[i];")?;
            writeln!(out, "    }}")?;
            writeln!(out, "    return NULL;")?;
            writeln!(out, "}}")?;
        }
        writeln!(out)?;
        write!(out, "{}", SOURCE_CODEC_FUNCTIONS)?;
        Ok(out)
    }

    /// Write `vera.h`/`vera.c` (and the SDK adapter pair) into `build_dir`
    ///
    /// Returns the paths written.
    pub fn write_files(&self, build_dir: &Path, sdk: Option<Sdk>) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(build_dir)
            .with_context(|| format!("Failed to create build directory: {:?}", build_dir))?;

        let mut files = vec![
            (build_dir.join(&self.header_name), self.header()?),
            (build_dir.join(SOURCE_NAME), self.source()?),
        ];
        if let Some(sdk) = sdk {
            files.push((build_dir.join(sdk.header_file()), sdk.header(&self.header_name)?));
            files.push((build_dir.join(sdk.source_file()), sdk.source()?));
        }

        let mut written = Vec::with_capacity(files.len());
        for (path, content) in files {
            fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
            log::info!("Wrote {:?}", path);
            written.push(path);
        }
        Ok(written)
    }
}

fn write_message_defines(out: &mut String, message: &Message) -> Result<()> {
    let prefix = format!("VERA_{}", c_macro(&message.name));

    writeln!(out, "// {} (transmitter: {})", message.name, message.transmitter)?;
    writeln!(out, "#define {}_ID 0x{:X}U", prefix, message.id)?;
    writeln!(out, "#define {}_DLC {}U", prefix, message.dlc)?;
    writeln!(out, "#define {}_N_SIGNALS {}U", prefix, message.signals.len())?;
    if !message.signals.is_empty() {
        writeln!(out, "enum {{")?;
        for (index, signal) in message.signals.iter().enumerate() {
            writeln!(out, "    {}_{} = {},", prefix, c_macro(&signal.name), index)?;
        }
        writeln!(out, "}};")?;
    }
    writeln!(out)?;
    Ok(())
}

fn receivers_ident(message: &Message, signal: &Signal) -> String {
    format!("vera_{}_{}_receivers", c_ident(&message.name), c_ident(&signal.name))
}

fn write_signal_table(out: &mut String, message: &Message) -> Result<()> {
    if message.signals.is_empty() {
        return Ok(());
    }

    for signal in &message.signals {
        if signal.receivers.is_empty() {
            continue;
        }
        let receivers: Vec<String> = signal
            .receivers
            .iter()
            .map(|r| c_string(r.as_str()))
            .collect();
        writeln!(
            out,
            "static const char* const {}[] = {{ {} }};",
            receivers_ident(message, signal),
            receivers.join(", ")
        )?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "static const vera_signal_t vera_{}_signals[] = {{",
        c_ident(&message.name)
    )?;
    for signal in &message.signals {
        let (receivers, n_receivers) = if signal.receivers.is_empty() {
            ("NULL".to_string(), 0)
        } else {
            (receivers_ident(message, signal), signal.receivers.len())
        };

        writeln!(out, "    {{")?;
        writeln!(out, "        .name            = {},", c_string(&signal.name))?;
        writeln!(out, "        .start_bit       = {},", signal.start_bit)?;
        writeln!(out, "        .length          = {},", signal.length)?;
        writeln!(out, "        .endianness      = {},", signal.endianness.code())?;
        writeln!(out, "        .is_signed       = {},", signal.signed)?;
        writeln!(out, "        .integer_figures = {},", signal.integer_figures)?;
        writeln!(out, "        .decimal_figures = {},", signal.decimal_figures)?;
        writeln!(out, "        .factor          = {},", c_float(signal.factor))?;
        writeln!(out, "        .offset          = {},", c_float(signal.offset))?;
        writeln!(out, "        .min             = {},", c_float(signal.min))?;
        writeln!(out, "        .max             = {},", c_float(signal.max))?;
        writeln!(out, "        .unit            = {},", c_string(&signal.unit))?;
        writeln!(out, "        .receivers       = {},", receivers)?;
        writeln!(out, "        .n_receivers     = {},", n_receivers)?;
        writeln!(out, "        .topic           = {},", c_string_or_null(&signal.topic))?;
        writeln!(out, "    }},")?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;
    Ok(())
}

fn write_message_entry(out: &mut String, message: &Message) -> Result<()> {
    let signals = if message.signals.is_empty() {
        "NULL".to_string()
    } else {
        format!("vera_{}_signals", c_ident(&message.name))
    };

    writeln!(out, "    {{")?;
    writeln!(out, "        .id          = 0x{:X}U,", message.id)?;
    writeln!(out, "        .name        = {},", c_string(&message.name))?;
    writeln!(out, "        .dlc         = {},", message.dlc)?;
    writeln!(out, "        .transmitter = {},", c_string(message.transmitter.as_str()))?;
    writeln!(out, "        .signals     = {},", signals)?;
    writeln!(out, "        .n_signals   = {},", message.signals.len())?;
    writeln!(out, "    }},")?;
    Ok(())
}
