//! Batch-level rule engine for the BNC card.
//!
//! Given the full ordered batch for one test, proves before any
//! hardware is touched that no step can cause contention on the card,
//! read a line whose direction is undefined, or address the IO
//! expander incorrectly. Every specification is validated against the
//! entire batch: the expander state a step observes is reconstructed
//! by scanning the steps before it, never cached.
//!
//! Over-rejection is acceptable here; a false pass risks two drivers
//! fighting over one line.

use crate::card::catalog::{self, CardMode, PinClass};
use crate::io_spec::{I2cWrite, IoSpec, SuiteError, SuiteValidator};

/// Rule set for the BNC signal conditioning card.
pub struct BncValidator;

impl SuiteValidator for BncValidator {
    fn validate(&self, specs: &[IoSpec]) -> Result<(), SuiteError> {
        for index in 0..specs.len() {
            validate_spec(index, specs)?;
        }
        Ok(())
    }
}

fn validate_spec(index: usize, specs: &[IoSpec]) -> Result<(), SuiteError> {
    match &specs[index] {
        IoSpec::DigitalInput { pin } => validate_digital_input(index, pin, specs),
        IoSpec::AnalogInput { pin } => validate_analog_input(index, pin),
        IoSpec::DigitalOutput { pin, .. } => validate_digital_output(index, pin, specs),
        IoSpec::I2cOutput(write) => validate_i2c_output(index, write, specs),
    }
}

fn validate_digital_input(index: usize, pin: &str, specs: &[IoSpec]) -> Result<(), SuiteError> {
    let def = match catalog::lookup(pin) {
        Some(def) if matches!(def.class, PinClass::DigitalInput | PinClass::Bidirectional) => def,
        _ => {
            return Err(SuiteError::new(
                index,
                format!("{pin} is not a valid digital input pin for the BNC card tests"),
            ));
        }
    };

    // Lines routed through the user IO circuitry additionally need the
    // card side resolved to the right direction before the BBB reads.
    if let Some(rule) = &def.user_io {
        if let Some(required) = rule.as_input {
            let actual = user_io_mode(index, specs, rule.mode_bit);
            if actual != required {
                return Err(SuiteError::new(
                    index,
                    format!(
                        "{pin} is set as input but the corresponding user IO on the card \
                         is in {actual} mode, causing undefined behaviour"
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_analog_input(index: usize, pin: &str) -> Result<(), SuiteError> {
    if !catalog::is_analog_pin(pin) {
        return Err(SuiteError::new(
            index,
            format!("{pin} is not a valid analog input pin for the BNC card tests"),
        ));
    }
    Ok(())
}

fn validate_digital_output(index: usize, pin: &str, specs: &[IoSpec]) -> Result<(), SuiteError> {
    let def = match catalog::lookup(pin) {
        Some(def) if matches!(def.class, PinClass::DigitalOutput | PinClass::Bidirectional) => def,
        _ => {
            return Err(SuiteError::new(
                index,
                format!("{pin} is not a valid digital output pin for the BNC card tests"),
            ));
        }
    };

    if let Some(rule) = &def.user_io {
        if let Some(required) = rule.as_output {
            let actual = user_io_mode(index, specs, rule.mode_bit);
            if actual != required {
                return Err(SuiteError::new(
                    index,
                    format!(
                        "{pin} is set as output but the corresponding user IO on the card \
                         is in {actual} mode, possibly causing contention"
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_i2c_output(index: usize, write: &I2cWrite, specs: &[IoSpec]) -> Result<(), SuiteError> {
    if !catalog::ALLOWED_I2C_BUSES.contains(&write.bus) {
        return Err(SuiteError::new(
            index,
            format!("{} is not a valid I2C bus for the BNC card tests", write.bus),
        ));
    }
    if !catalog::ALLOWED_I2C_CHIP_ADDRESSES.contains(&write.chip_address) {
        return Err(SuiteError::new(
            index,
            format!(
                "{:#04x} is not a valid I2C chip address for the BNC card tests",
                write.chip_address
            ),
        ));
    }
    if !catalog::ALLOWED_I2C_DATA_ADDRESSES.contains(&write.data_address) {
        return Err(SuiteError::new(
            index,
            format!(
                "{:#04x} is not a valid I2C data address for the BNC card tests",
                write.data_address
            ),
        ));
    }

    if is_expander_write(write) {
        let data = write.data.ok_or_else(|| {
            SuiteError::new(index, "IO expander register write is missing its data byte")
        })?;
        if write.data_address == catalog::IO_EXPANDER_CONFIG_REGISTER {
            validate_expander_config(index, data, write, specs)?;
        } else if write.data_address == catalog::IO_EXPANDER_OUTPUT_REGISTER {
            validate_expander_output(index, write, specs)?;
        }
    }
    Ok(())
}

/// A configuration register write that switches any line to output must
/// be preceded, earlier in the batch, by an output register write on
/// the same device: the value has to be staged before the direction
/// flips, or the line glitches to an undefined level. Returning every
/// line to input (0xff) is exempt.
fn validate_expander_config(
    index: usize,
    data: u8,
    write: &I2cWrite,
    specs: &[IoSpec],
) -> Result<(), SuiteError> {
    if data == 0xff {
        return Ok(());
    }
    let staged = specs[..index]
        .iter()
        .filter_map(IoSpec::as_i2c)
        .any(|prev| {
            on_same_i2c_device(prev, write)
                && prev.data_address == catalog::IO_EXPANDER_OUTPUT_REGISTER
        });
    if staged {
        Ok(())
    } else {
        Err(SuiteError::new(
            index,
            "never set output values for the IO expander but tried to set a line as output",
        ))
    }
}

/// An output register write is dead unless some other specification in
/// the batch, earlier or later, configures at least one line of the
/// same device as an output.
fn validate_expander_output(
    index: usize,
    write: &I2cWrite,
    specs: &[IoSpec],
) -> Result<(), SuiteError> {
    let configured = specs
        .iter()
        .enumerate()
        .filter(|&(other_index, _)| other_index != index)
        .filter_map(|(_, spec)| spec.as_i2c())
        .any(|other| {
            on_same_i2c_device(other, write)
                && other.data_address == catalog::IO_EXPANDER_CONFIG_REGISTER
                && other.data.is_some_and(|data| data != 0xff)
        });
    if configured {
        Ok(())
    } else {
        Err(SuiteError::new(
            index,
            "never set config values for the IO expander but tried to set a line as output",
        ))
    }
}

/// Card-side direction of a user IO line right before the step at
/// `index` executes.
///
/// Output mode needs two things from the history: the expander line
/// configured as an output, and a 1 driven on it. Anything else leaves
/// the card in input mode.
fn user_io_mode(index: usize, specs: &[IoSpec], mode_bit: u8) -> CardMode {
    if expander_line_is_output(index, specs, mode_bit)
        && expander_output_bit(index, specs, mode_bit) == 1
    {
        CardMode::Output
    } else {
        CardMode::Input
    }
}

/// Direction of one expander line before `index`: the most recent
/// earlier configuration register write decides (bit clear means
/// output). With no history the line is an input, the power-on state.
fn expander_line_is_output(index: usize, specs: &[IoSpec], mask: u8) -> bool {
    for prev in specs[..index].iter().rev() {
        let Some(write) = prev.as_i2c() else { continue };
        if !is_expander_write(write) {
            continue;
        }
        if write.data_address != catalog::IO_EXPANDER_CONFIG_REGISTER {
            continue;
        }
        let Some(data) = write.data else { continue };
        return data & mask == 0;
    }
    false
}

/// Value staged on one expander line before `index`: the most recent
/// earlier output register write decides. The datasheet power-on
/// default is 1, so an unwritten register reads as all ones.
fn expander_output_bit(index: usize, specs: &[IoSpec], mask: u8) -> u8 {
    for prev in specs[..index].iter().rev() {
        let Some(write) = prev.as_i2c() else { continue };
        if !is_expander_write(write) {
            continue;
        }
        if write.data_address != catalog::IO_EXPANDER_OUTPUT_REGISTER {
            continue;
        }
        let Some(data) = write.data else { continue };
        return u8::from(data & mask != 0);
    }
    1
}

fn is_expander_write(write: &I2cWrite) -> bool {
    write.bus == catalog::IO_EXPANDER_BUS
        && write.chip_address == catalog::IO_EXPANDER_CHIP_ADDRESS
}

/// Same device means same bus and same chip address; the register
/// (data address) may differ.
fn on_same_i2c_device(a: &I2cWrite, b: &I2cWrite) -> bool {
    a.bus == b.bus && a.chip_address == b.chip_address
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::catalog::{
        B_REF_IN_L3V3, B_REF_OUT_L3V3, B_USER1_BI_DIR_L3V3, B_USER2_BI_DIR_L3V3,
        I2C_BNC7_USER2_NIN_OUT, I2C_BNC8_USER1_NIN_OUT, P_USER1_IN_TO_BBB, P_USER1_OUT_TO_LD,
        TR_USER1_L1V8,
    };
    use crate::card::expander;
    use crate::io_spec::DigitalLevel;

    fn digital_input(pin: &str) -> IoSpec {
        IoSpec::DigitalInput {
            pin: pin.to_string(),
        }
    }

    fn digital_output(pin: &str) -> IoSpec {
        IoSpec::DigitalOutput {
            pin: pin.to_string(),
            level: DigitalLevel::High,
        }
    }

    fn expander_write(data_address: u8, data: u8) -> IoSpec {
        IoSpec::I2cOutput(I2cWrite {
            bus: catalog::IO_EXPANDER_BUS,
            chip_address: catalog::IO_EXPANDER_CHIP_ADDRESS,
            data_address,
            data: Some(data),
        })
    }

    fn validate(specs: &[IoSpec]) -> Result<(), SuiteError> {
        BncValidator.validate(specs)
    }

    #[test]
    fn connector_read_after_card_switched_to_output_passes() {
        // Stage a 1 on the USER1 direction line, flip it to output,
        // then read the connector side from the BBB.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_input(B_USER1_BI_DIR_L3V3),
        ];
        validate(&specs).unwrap();
    }

    #[test]
    fn connector_read_with_no_i2c_history_fails() {
        // Power-on default leaves the card side in input mode, so both
        // ends of the line would float.
        let specs = [digital_input(B_USER1_BI_DIR_L3V3)];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(err.reason.contains("input mode"), "{}", err.reason);
    }

    #[test]
    fn all_inputs_config_write_needs_no_staged_output() {
        let specs = [expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, 0xff)];
        validate(&specs).unwrap();
    }

    #[test]
    fn config_write_before_staging_an_output_value_fails() {
        // Same two writes as the passing sequence, transposed: the
        // direction would flip while the output register still holds
        // its power-on value.
        let specs = [
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(err.reason.contains("never set output values"), "{}", err.reason);
    }

    #[test]
    fn output_write_without_any_config_write_is_dead() {
        let specs = [expander_write(
            catalog::IO_EXPANDER_OUTPUT_REGISTER,
            I2C_BNC8_USER1_NIN_OUT,
        )];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(err.reason.contains("never set config values"), "{}", err.reason);
    }

    #[test]
    fn output_write_accepts_a_later_config_write() {
        // The config/output co-occurrence check searches the whole
        // batch, not just the prefix.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
        ];
        validate(&specs).unwrap();
    }

    #[test]
    fn output_write_paired_only_with_all_inputs_config_is_still_dead() {
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, 0xff),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 0);
    }

    #[test]
    fn connector_drive_while_card_also_drives_fails() {
        // Card switched to output mode and the BBB then drives the
        // same connector: two drivers on one line.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_output(B_USER1_BI_DIR_L3V3),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(err.reason.contains("contention"), "{}", err.reason);
    }

    #[test]
    fn connector_drive_with_card_in_input_mode_passes() {
        let specs = [digital_output(B_USER1_BI_DIR_L3V3)];
        validate(&specs).unwrap();
    }

    #[test]
    fn header_read_needs_card_input_mode() {
        // Default mode is input, so the header read is fine on its own.
        validate(&[digital_input(P_USER1_IN_TO_BBB)]).unwrap();

        // Once the card flips to output mode the header input floats.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_input(P_USER1_IN_TO_BBB),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(err.reason.contains("output mode"), "{}", err.reason);
    }

    #[test]
    fn header_drive_needs_card_output_mode() {
        let err = validate(&[digital_output(P_USER1_OUT_TO_LD)]).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(err.reason.contains("input mode"), "{}", err.reason);

        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_output(P_USER1_OUT_TO_LD),
        ];
        validate(&specs).unwrap();
    }

    #[test]
    fn user_io_lines_are_tracked_independently() {
        // USER1 put into output mode; USER2 stays at the default, so a
        // connector read of USER2 still fails.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC8_USER1_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_input(B_USER2_BI_DIR_L3V3),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 2);
    }

    #[test]
    fn most_recent_config_write_wins() {
        // USER2 is switched to output mode, then everything is returned
        // to inputs; the read sees the later write.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, I2C_BNC7_USER2_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC7_USER2_NIN_OUT),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, 0xff),
            digital_input(B_USER2_BI_DIR_L3V3),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 3);
    }

    #[test]
    fn output_mode_needs_a_driven_one_not_just_direction() {
        // Direction line configured as output but driven 0: NIN_OUT low
        // selects input mode on the card.
        let specs = [
            expander_write(catalog::IO_EXPANDER_OUTPUT_REGISTER, 0x00),
            expander_write(catalog::IO_EXPANDER_CONFIG_REGISTER, !I2C_BNC8_USER1_NIN_OUT),
            digital_input(B_USER1_BI_DIR_L3V3),
        ];
        let err = validate(&specs).unwrap_err();
        assert_eq!(err.index, 2);
    }

    #[test]
    fn fixed_role_pins_skip_direction_checks() {
        let specs = [
            digital_output(B_REF_IN_L3V3),
            digital_input(B_REF_OUT_L3V3),
            IoSpec::AnalogInput {
                pin: TR_USER1_L1V8.to_string(),
            },
        ];
        validate(&specs).unwrap();
    }

    #[test]
    fn rejects_pins_outside_the_role_subsets() {
        // REF_IN is driven by the BBB; reading it back is not part of
        // the card tests.
        let err = validate(&[digital_input(B_REF_IN_L3V3)]).unwrap_err();
        assert!(err.reason.contains("digital input"), "{}", err.reason);

        let err = validate(&[digital_output(B_REF_OUT_L3V3)]).unwrap_err();
        assert!(err.reason.contains("digital output"), "{}", err.reason);

        let err = validate(&[IoSpec::AnalogInput {
            pin: B_REF_OUT_L3V3.to_string(),
        }])
        .unwrap_err();
        assert!(err.reason.contains("analog input"), "{}", err.reason);
    }

    #[test]
    fn rejects_foreign_i2c_targets() {
        let mut write = I2cWrite {
            bus: 1,
            chip_address: catalog::IO_EXPANDER_CHIP_ADDRESS,
            data_address: catalog::IO_EXPANDER_OUTPUT_REGISTER,
            data: Some(0x00),
        };
        let err = validate(&[IoSpec::I2cOutput(write.clone())]).unwrap_err();
        assert!(err.reason.contains("I2C bus"), "{}", err.reason);

        write.bus = catalog::IO_EXPANDER_BUS;
        write.chip_address = 0x26;
        let err = validate(&[IoSpec::I2cOutput(write.clone())]).unwrap_err();
        assert!(err.reason.contains("chip address"), "{}", err.reason);

        write.chip_address = catalog::IO_EXPANDER_CHIP_ADDRESS;
        write.data_address = 0x02;
        let err = validate(&[IoSpec::I2cOutput(write)]).unwrap_err();
        assert!(err.reason.contains("data address"), "{}", err.reason);
    }

    #[test]
    fn expander_register_write_without_data_fails() {
        let specs = [IoSpec::I2cOutput(I2cWrite {
            bus: catalog::IO_EXPANDER_BUS,
            chip_address: catalog::IO_EXPANDER_CHIP_ADDRESS,
            data_address: catalog::IO_EXPANDER_CONFIG_REGISTER,
            data: None,
        })];
        let err = validate(&specs).unwrap_err();
        assert!(err.reason.contains("data byte"), "{}", err.reason);
    }

    #[test]
    fn validation_is_idempotent() {
        let specs = [
            IoSpec::I2cOutput(expander::user_io_output_mode(I2C_BNC8_USER1_NIN_OUT).unwrap()),
            IoSpec::I2cOutput(expander::configure_outputs(I2C_BNC8_USER1_NIN_OUT)),
            digital_input(B_USER1_BI_DIR_L3V3),
        ];
        validate(&specs).unwrap();
        validate(&specs).unwrap();

        let bad = [digital_input(B_USER1_BI_DIR_L3V3)];
        assert_eq!(validate(&bad).unwrap_err(), validate(&bad).unwrap_err());
    }

    #[test]
    fn builder_sequences_satisfy_the_validator() {
        // The canonical direction-switch sequence built entirely from
        // the expander builders: stage the value, flip the direction,
        // use the line, return to all inputs.
        let specs = [
            IoSpec::I2cOutput(expander::user_io_output_mode(I2C_BNC8_USER1_NIN_OUT).unwrap()),
            IoSpec::I2cOutput(expander::configure_outputs(I2C_BNC8_USER1_NIN_OUT)),
            digital_input(B_USER1_BI_DIR_L3V3),
            IoSpec::I2cOutput(expander::all_inputs()),
        ];
        validate(&specs).unwrap();
    }
}
