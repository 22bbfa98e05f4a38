//! Legacy JSON wire format shared with the IO server on the BBB.
//!
//! Field names and type tags are fixed; the server and the archived
//! batch files both depend on them byte for byte. Hex values travel as
//! lowercase `0x`-prefixed strings and are parsed into bytes at this
//! boundary, which is also where out-of-one-byte values are rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io_spec::{DigitalLevel, I2cWrite, IoSpec};

pub const SPEC_TYPE_INPUT: &str = "input";
pub const SPEC_TYPE_OUTPUT: &str = "output";
pub const DIGITAL_3V3: &str = "digital_3v3";
pub const ANALOG_1V8: &str = "analog_1v8";
pub const I2C: &str = "i2c";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("'{0}' is not an 8 bit hex value")]
    BadHexByte(String),
    #[error("'{0}' is not a valid I2C bus number")]
    BadBus(String),
    #[error("'{0}' is not a valid digital output value")]
    BadLevel(String),
    #[error("spec type '{0}' is invalid")]
    BadSpecType(String),
    #[error("'{0}'-type input not supported")]
    BadInputType(String),
    #[error("'{0}'-type output not supported")]
    BadOutputType(String),
    #[error("specification is missing field '{0}'")]
    MissingField(&'static str),
}

/// One record of the batched request, exactly as it travels.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireSpec {
    pub spec_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i2cbus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One per-pin result record returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinReading {
    pub pin_number: String,
    pub input_value: String,
}

impl PinReading {
    pub fn digital_level(&self) -> Option<DigitalLevel> {
        DigitalLevel::from_wire(&self.input_value)
    }

    pub fn analog_value(&self) -> Option<f64> {
        self.input_value.parse().ok()
    }
}

/// Response body: per-pin readings on success, or a server-side
/// failure message.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireResponse {
    Failure {
        #[serde(rename = "Error")]
        error: String,
    },
    Readings(Vec<PinReading>),
}

/// Looks up the returned value for one pin.
pub fn input_value_for<'a>(readings: &'a [PinReading], pin: &str) -> Option<&'a str> {
    readings
        .iter()
        .find(|reading| reading.pin_number == pin)
        .map(|reading| reading.input_value.as_str())
}

/// Parses an 8 bit hex value of the form `0x2f` (prefix optional,
/// case-insensitive). Anything outside one byte is rejected.
pub fn parse_hex_byte(value: &str) -> Result<u8, WireError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u8::from_str_radix(digits, 16).map_err(|_| WireError::BadHexByte(value.to_string()))
}

/// Formats a byte the way the wire expects it: `0x2f`.
pub fn format_hex_byte(value: u8) -> String {
    format!("{value:#04x}")
}

impl From<&IoSpec> for WireSpec {
    fn from(spec: &IoSpec) -> Self {
        match spec {
            IoSpec::DigitalInput { pin } => WireSpec {
                spec_type: SPEC_TYPE_INPUT.to_string(),
                input_type: Some(DIGITAL_3V3.to_string()),
                pin_number: Some(pin.clone()),
                ..WireSpec::default()
            },
            IoSpec::AnalogInput { pin } => WireSpec {
                spec_type: SPEC_TYPE_INPUT.to_string(),
                input_type: Some(ANALOG_1V8.to_string()),
                pin_number: Some(pin.clone()),
                ..WireSpec::default()
            },
            IoSpec::DigitalOutput { pin, level } => WireSpec {
                spec_type: SPEC_TYPE_OUTPUT.to_string(),
                output_type: Some(DIGITAL_3V3.to_string()),
                pin_number: Some(pin.clone()),
                value: Some(level.as_wire().to_string()),
                ..WireSpec::default()
            },
            IoSpec::I2cOutput(write) => WireSpec {
                spec_type: SPEC_TYPE_OUTPUT.to_string(),
                output_type: Some(I2C.to_string()),
                i2cbus: Some(write.bus.to_string()),
                chip_address: Some(format_hex_byte(write.chip_address)),
                data_address: Some(format_hex_byte(write.data_address)),
                data: write.data.map(format_hex_byte),
                ..WireSpec::default()
            },
        }
    }
}

impl TryFrom<&WireSpec> for IoSpec {
    type Error = WireError;

    fn try_from(wire: &WireSpec) -> Result<Self, WireError> {
        fn field<'a>(
            value: &'a Option<String>,
            name: &'static str,
        ) -> Result<&'a str, WireError> {
            value.as_deref().ok_or(WireError::MissingField(name))
        }

        match wire.spec_type.as_str() {
            SPEC_TYPE_INPUT => {
                let pin = field(&wire.pin_number, "pin_number")?;
                match field(&wire.input_type, "input_type")? {
                    DIGITAL_3V3 => Ok(IoSpec::DigitalInput {
                        pin: pin.to_string(),
                    }),
                    ANALOG_1V8 => Ok(IoSpec::AnalogInput {
                        pin: pin.to_string(),
                    }),
                    other => Err(WireError::BadInputType(other.to_string())),
                }
            }
            SPEC_TYPE_OUTPUT => match field(&wire.output_type, "output_type")? {
                DIGITAL_3V3 => {
                    let pin = field(&wire.pin_number, "pin_number")?;
                    let raw = field(&wire.value, "value")?;
                    let level = DigitalLevel::from_wire(raw)
                        .ok_or_else(|| WireError::BadLevel(raw.to_string()))?;
                    Ok(IoSpec::DigitalOutput {
                        pin: pin.to_string(),
                        level,
                    })
                }
                I2C => {
                    let raw_bus = field(&wire.i2cbus, "i2cbus")?;
                    let bus = raw_bus
                        .parse()
                        .map_err(|_| WireError::BadBus(raw_bus.to_string()))?;
                    Ok(IoSpec::I2cOutput(I2cWrite {
                        bus,
                        chip_address: parse_hex_byte(field(&wire.chip_address, "chip_address")?)?,
                        data_address: parse_hex_byte(field(&wire.data_address, "data_address")?)?,
                        data: match wire.data.as_deref() {
                            // data can be empty in i2cset
                            None | Some("") => None,
                            Some(raw) => Some(parse_hex_byte(raw)?),
                        },
                    }))
                }
                other => Err(WireError::BadOutputType(other.to_string())),
            },
            other => Err(WireError::BadSpecType(other.to_string())),
        }
    }
}

/// Serializes a batch in execution order.
pub fn encode_batch(specs: &[IoSpec]) -> serde_json::Result<String> {
    let wire: Vec<WireSpec> = specs.iter().map(WireSpec::from).collect();
    serde_json::to_string(&wire)
}
