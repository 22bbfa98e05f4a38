//! Core IO specification types shared by the batch accumulator, the
//! suite validators, and the wire codec.
//!
//! One test run amalgamates its pin reads, pin drives, and raw I2C
//! register writes into an ordered list of [`IoSpec`] values. The order
//! is the execution order on the BBB, so it carries meaning: direction
//! switches on the card take effect for everything that follows them.

use std::fmt;

use thiserror::Error;

/// A digital drive level on a BBB pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalLevel {
    Low,
    High,
}

impl DigitalLevel {
    /// The level as it appears on the wire ("0" or "1").
    pub fn as_wire(self) -> &'static str {
        match self {
            DigitalLevel::Low => "0",
            DigitalLevel::High => "1",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "0" => Some(DigitalLevel::Low),
            "1" => Some(DigitalLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for DigitalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One raw register write on an I2C bus, as executed by `i2cset` on the
/// BBB.
///
/// `data` is optional because `i2cset` accepts commands without a data
/// byte; the card rules require it for IO expander register writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cWrite {
    pub bus: u8,
    pub chip_address: u8,
    pub data_address: u8,
    pub data: Option<u8>,
}

/// One queued input, output, or I2C request destined for a single
/// batched transmission to the BBB.
///
/// An I2C request counts as an output for the purposes of this
/// framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoSpec {
    DigitalInput { pin: String },
    AnalogInput { pin: String },
    DigitalOutput { pin: String, level: DigitalLevel },
    I2cOutput(I2cWrite),
}

impl IoSpec {
    /// The BBB pin this specification claims, if it addresses one.
    pub fn pin(&self) -> Option<&str> {
        match self {
            IoSpec::DigitalInput { pin }
            | IoSpec::AnalogInput { pin }
            | IoSpec::DigitalOutput { pin, .. } => Some(pin),
            IoSpec::I2cOutput(_) => None,
        }
    }

    pub fn as_i2c(&self) -> Option<&I2cWrite> {
        match self {
            IoSpec::I2cOutput(write) => Some(write),
            _ => None,
        }
    }
}

/// Batch-level rejection raised by a suite validator.
///
/// Carries the index of the offending specification within the batch so
/// a failing test names the exact step that would have misbehaved on
/// the hardware.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("io specification {index} rejected: {reason}")]
pub struct SuiteError {
    pub index: usize,
    pub reason: String,
}

impl SuiteError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Card-specific batch rules.
///
/// The executor takes the validator as a parameter, so a different
/// conditioning board can swap in its own rule set without touching the
/// accumulator or the transport.
pub trait SuiteValidator {
    /// Checks the full ordered batch. Must be pure: no I/O, no
    /// mutation, same verdict for the same batch every time.
    fn validate(&self, specs: &[IoSpec]) -> Result<(), SuiteError>;
}
