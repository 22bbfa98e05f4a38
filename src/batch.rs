//! Caller-owned accumulator for one test's ordered IO specifications.
//!
//! A test builds its batch through the `specify_*` methods, each of
//! which applies the structural rules immediately so a bad request
//! fails at the call site rather than at send time. Batch-wide
//! semantic rules (direction conflicts, register ordering) are the
//! suite validator's job and run once, just before transmission.

use thiserror::Error;

use crate::card::catalog;
use crate::io_spec::{DigitalLevel, I2cWrite, IoSpec};

/// I2C buses that exist on the BBB.
const BBB_I2C_BUSES: &[u8] = &[0, 1, 2];

/// Structural rejection raised while a specification is being added.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("cannot specify pin '{0}' as a digital pin")]
    NotDigital(String),
    #[error("cannot specify pin '{0}' as an analog pin")]
    NotAnalog(String),
    #[error("specification for pin '{0}' already defined")]
    DuplicatePin(String),
    #[error("I2C bus '{0}' does not exist")]
    UnknownBus(u8),
    #[error("I2C chip address {0:#04x} must be between 0x03 and 0x77 (inclusive)")]
    ChipAddressRange(u8),
}

/// The ordered batch of IO specifications for one test execution
/// window.
///
/// Single-writer: one test, one task. The batch itself never touches
/// the hardware; [`crate::bbb::BbbIo::execute`] consumes it.
#[derive(Debug, Default)]
pub struct IoBatch {
    specs: Vec<IoSpec>,
    results_pending: bool,
}

impl IoBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards every queued specification and clears the
    /// results-pending latch. Call between tests.
    pub fn reset(&mut self) {
        self.specs.clear();
        self.results_pending = false;
    }

    pub fn specs(&self) -> &[IoSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// True once the batch has been executed and before the next
    /// [`reset`](Self::reset).
    pub fn results_pending(&self) -> bool {
        self.results_pending
    }

    pub(crate) fn mark_sent(&mut self) {
        self.results_pending = true;
    }

    /// Queues a digital read of `pin`.
    pub fn specify_digital_input(&mut self, pin: &str) -> Result<(), SpecError> {
        if !catalog::is_digital_pin(pin) {
            return Err(SpecError::NotDigital(pin.to_string()));
        }
        self.check_pin_unclaimed(pin)?;
        self.specs.push(IoSpec::DigitalInput {
            pin: pin.to_string(),
        });
        Ok(())
    }

    /// Queues an analog read of `pin`.
    pub fn specify_analog_input(&mut self, pin: &str) -> Result<(), SpecError> {
        if !catalog::is_analog_pin(pin) {
            return Err(SpecError::NotAnalog(pin.to_string()));
        }
        self.check_pin_unclaimed(pin)?;
        self.specs.push(IoSpec::AnalogInput {
            pin: pin.to_string(),
        });
        Ok(())
    }

    /// Queues a digital drive of `pin` at `level`.
    pub fn specify_digital_output(
        &mut self,
        pin: &str,
        level: DigitalLevel,
    ) -> Result<(), SpecError> {
        if !catalog::is_digital_pin(pin) {
            return Err(SpecError::NotDigital(pin.to_string()));
        }
        self.check_pin_unclaimed(pin)?;
        self.specs.push(IoSpec::DigitalOutput {
            pin: pin.to_string(),
            level,
        });
        Ok(())
    }

    /// Queues a raw I2C register write.
    pub fn specify_i2c_output(&mut self, write: I2cWrite) -> Result<(), SpecError> {
        if !BBB_I2C_BUSES.contains(&write.bus) {
            return Err(SpecError::UnknownBus(write.bus));
        }
        if !(0x03..=0x77).contains(&write.chip_address) {
            return Err(SpecError::ChipAddressRange(write.chip_address));
        }
        self.specs.push(IoSpec::I2cOutput(write));
        Ok(())
    }

    /// Queues an already-built specification through the matching
    /// structural checks.
    pub fn specify(&mut self, spec: IoSpec) -> Result<(), SpecError> {
        match spec {
            IoSpec::DigitalInput { pin } => self.specify_digital_input(&pin),
            IoSpec::AnalogInput { pin } => self.specify_analog_input(&pin),
            IoSpec::DigitalOutput { pin, level } => self.specify_digital_output(&pin, level),
            IoSpec::I2cOutput(write) => self.specify_i2c_output(write),
        }
    }

    // Each physical pin may appear in at most one input or output
    // specification per batch.
    fn check_pin_unclaimed(&self, pin: &str) -> Result<(), SpecError> {
        if self.specs.iter().any(|spec| spec.pin() == Some(pin)) {
            return Err(SpecError::DuplicatePin(pin.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::catalog::{
        B_REF_IN_L3V3, B_REF_OUT_L3V3, B_USER1_BI_DIR_L3V3, TR_REF_IN_L1V8,
    };

    #[test]
    fn accepts_a_typical_mixed_batch() {
        let mut batch = IoBatch::new();
        batch
            .specify_digital_output(B_REF_IN_L3V3, DigitalLevel::High)
            .unwrap();
        batch.specify_digital_input(B_REF_OUT_L3V3).unwrap();
        batch.specify_analog_input(TR_REF_IN_L1V8).unwrap();
        batch
            .specify_i2c_output(I2cWrite {
                bus: 2,
                chip_address: 0x27,
                data_address: 0x01,
                data: Some(0x20),
            })
            .unwrap();
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn rejects_unknown_and_misclassified_pins() {
        let mut batch = IoBatch::new();
        assert_eq!(
            batch.specify_digital_input("P8_99"),
            Err(SpecError::NotDigital("P8_99".to_string()))
        );
        // analog line used as a digital pin
        assert_eq!(
            batch.specify_digital_input(TR_REF_IN_L1V8),
            Err(SpecError::NotDigital(TR_REF_IN_L1V8.to_string()))
        );
        // digital line used as an analog pin
        assert_eq!(
            batch.specify_analog_input(B_REF_OUT_L3V3),
            Err(SpecError::NotAnalog(B_REF_OUT_L3V3.to_string()))
        );
    }

    #[test]
    fn rejects_duplicate_pin_claims() {
        let mut batch = IoBatch::new();
        batch
            .specify_digital_output(B_USER1_BI_DIR_L3V3, DigitalLevel::Low)
            .unwrap();
        assert_eq!(
            batch.specify_digital_output(B_USER1_BI_DIR_L3V3, DigitalLevel::High),
            Err(SpecError::DuplicatePin(B_USER1_BI_DIR_L3V3.to_string()))
        );
        // an input claim on the same pin is also contention
        assert_eq!(
            batch.specify_digital_input(B_USER1_BI_DIR_L3V3),
            Err(SpecError::DuplicatePin(B_USER1_BI_DIR_L3V3.to_string()))
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn rejects_buses_the_bbb_does_not_have() {
        let mut batch = IoBatch::new();
        let write = I2cWrite {
            bus: 3,
            chip_address: 0x27,
            data_address: 0x01,
            data: Some(0x00),
        };
        assert_eq!(
            batch.specify_i2c_output(write),
            Err(SpecError::UnknownBus(3))
        );
    }

    #[test]
    fn rejects_out_of_range_chip_addresses() {
        let mut batch = IoBatch::new();
        let write = I2cWrite {
            bus: 2,
            chip_address: 0x02,
            data_address: 0x01,
            data: Some(0x00),
        };
        assert_eq!(
            batch.specify_i2c_output(write),
            Err(SpecError::ChipAddressRange(0x02))
        );
        let write = I2cWrite {
            bus: 2,
            chip_address: 0x78,
            data_address: 0x01,
            data: Some(0x00),
        };
        assert_eq!(
            batch.specify_i2c_output(write),
            Err(SpecError::ChipAddressRange(0x78))
        );
    }

    #[test]
    fn i2c_writes_do_not_claim_pins() {
        let mut batch = IoBatch::new();
        for _ in 0..3 {
            batch
                .specify_i2c_output(I2cWrite {
                    bus: 2,
                    chip_address: 0x27,
                    data_address: 0x01,
                    data: Some(0x00),
                })
                .unwrap();
        }
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn reset_clears_specs_and_latch() {
        let mut batch = IoBatch::new();
        batch.specify_digital_input(B_REF_OUT_L3V3).unwrap();
        batch.mark_sent();
        assert!(batch.results_pending());
        batch.reset();
        assert!(batch.is_empty());
        assert!(!batch.results_pending());
    }
}
