//! SDK adapter shims
//!
//! Each adapter maps a vendor receive frame into `vera_can_rx_frame_t` and
//! forwards it to `vera_decode_can_frame`.

use super::include_guard;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Target SDK for adapter generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sdk {
    /// SPC5 AutoDevKit low level CAN driver
    Autodevkit,
    /// STM32 HAL CAN driver
    Stm32hal,
    /// ESP-IDF TWAI driver
    Espidf,
}

impl Sdk {
    pub fn name(self) -> &'static str {
        match self {
            Sdk::Autodevkit => "autodevkit",
            Sdk::Stm32hal => "stm32hal",
            Sdk::Espidf => "espidf",
        }
    }

    pub fn header_file(self) -> String {
        format!("vera_{}.h", self.name())
    }

    pub fn source_file(self) -> String {
        format!("vera_{}.c", self.name())
    }

    /// Vendor header declaring the native frame type
    fn vendor_include(self) -> &'static str {
        match self {
            Sdk::Autodevkit => "can_lld.h",
            Sdk::Stm32hal => "stm32f2xx_hal_can.h",
            Sdk::Espidf => "driver/twai.h",
        }
    }

    /// Parameter list of the adapter function
    fn parameters(self) -> &'static str {
        match self {
            Sdk::Autodevkit => "const CANRxFrame* frame, vera_decoding_result_t* result",
            Sdk::Stm32hal => {
                "const CAN_RxHeaderTypeDef* header, const uint8_t* data, vera_decoding_result_t* result"
            }
            Sdk::Espidf => "const twai_frame_t* frame, vera_decoding_result_t* result",
        }
    }

    /// Null checks and the native -> canonical field mapping
    fn frame_mapping(self) -> &'static str {
        match self {
            Sdk::Autodevkit => {
                r#"    if (!frame || !result) return vera_err_null_arg;

    uint8_t dlc = frame->DLC > CAN_MAX_DATA_LEN ? CAN_MAX_DATA_LEN : frame->DLC;
    vera_can_rx_frame_t vera_frame = {
        .id             = frame->ID,
        .dlc            = dlc,
        .is_extended_id = frame->TYPE,
        .is_fd          = frame->OPERATION == 0x01U
    };
    memcpy(vera_frame.data, frame->data8, dlc);"#
            }
            Sdk::Stm32hal => {
                r#"    if (!header || !data || !result) return vera_err_null_arg;

    uint8_t dlc = header->DLC > CAN_MAX_DATA_LEN ? CAN_MAX_DATA_LEN : (uint8_t)header->DLC;
    vera_can_rx_frame_t vera_frame = {
        .id             = header->IDE == CAN_ID_EXT ? header->ExtId : header->StdId,
        .dlc            = dlc,
        .is_extended_id = header->IDE == CAN_ID_EXT,
        .is_rtr         = header->RTR == CAN_RTR_REMOTE,
        .timestamp      = header->Timestamp
    };
    memcpy(vera_frame.data, data, dlc);"#
            }
            Sdk::Espidf => {
                r#"    if (!frame || !result) return vera_err_null_arg;

    uint8_t dlc = frame->header.dlc > CAN_MAX_DATA_LEN ? CAN_MAX_DATA_LEN : frame->header.dlc;
    vera_can_rx_frame_t vera_frame = {
        .id                    = frame->header.id,
        .dlc                   = dlc,
        .is_extended_id        = frame->header.ide,
        .is_rtr                = frame->header.rtr,
        .is_fd                 = frame->header.fdf,
        .bit_rate_switch       = frame->header.brs,
        .error_state_indicator = frame->header.esi
    };
    memcpy(vera_frame.data, frame->buffer, dlc);"#
            }
        }
    }

    fn function_name(self) -> String {
        format!("vera_decode_{}_rx_frame", self.name())
    }

    /// Adapter header; `vera_header` is the name of the main generated header
    pub fn header(self, vera_header: &str) -> Result<String> {
        let guard = include_guard(&self.header_file());
        let mut out = String::new();

        writeln!(out, "#ifndef {}", guard)?;
        writeln!(out, "#define {}", guard)?;
        writeln!(out)?;
        writeln!(out, "#include \"{}\"", vera_header)?;
        writeln!(out, "#include \"{}\"", self.vendor_include())?;
        writeln!(out)?;
        writeln!(out, "vera_err_t {}({});", self.function_name(), self.parameters())?;
        writeln!(out)?;
        writeln!(out, "#endif // {}", guard)?;
        Ok(out)
    }

    /// Adapter source
    pub fn source(self) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "#include \"{}\"", self.header_file())?;
        writeln!(out)?;
        writeln!(out, "#include <string.h>")?;
        writeln!(out)?;
        writeln!(out, "vera_err_t {}({}) {{", self.function_name(), self.parameters())?;
        writeln!(out, "{}", self.frame_mapping())?;
        writeln!(out)?;
        writeln!(out, "    return vera_decode_can_frame(&vera_frame, result);")?;
        writeln!(out, "}}")?;
        Ok(out)
    }
}

impl fmt::Display for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
