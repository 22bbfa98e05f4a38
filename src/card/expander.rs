//! Builders for IO expander register writes.
//!
//! Every function here produces a complete, well-formed [`I2cWrite`]
//! aimed at the PCA9534-class expander on the card, so test code never
//! hand-crafts bus numbers, chip addresses, or register values. The
//! guard functions reject masks that do not belong to the requested
//! feature class before any write is built.
//!
//! The output register is always written as a whole byte; there is no
//! read-modify-write merging with previously driven bits (see
//! DESIGN.md).

use thiserror::Error;

use crate::card::catalog::{
    I2C_BNC1_50OHM_EN, I2C_BNC4_VETO_OUT_OC, I2C_BNC6_50OHM_EN, I2C_BNC7_50OHM_EN,
    I2C_BNC7_USER2_NIN_OUT, I2C_BNC8_50OHM_EN, I2C_BNC8_USER1_NIN_OUT, I2C_RLED,
    IO_EXPANDER_BUS, IO_EXPANDER_CHIP_ADDRESS, IO_EXPANDER_CONFIG_REGISTER,
    IO_EXPANDER_OUTPUT_REGISTER,
};
use crate::io_spec::I2cWrite;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpanderError {
    #[error("{0:#04x} does not control a user IO line")]
    NotUserIoBit(u8),
    #[error("{0:#04x} does not control the VETO_OUT drive mode")]
    NotOpenDrainBit(u8),
    #[error("{0:#04x} does not control a termination resistor")]
    NotTerminationBit(u8),
    #[error("{0:#04x} does not control an LED")]
    NotLedBit(u8),
}

fn register_write(data_address: u8, data: u8) -> I2cWrite {
    I2cWrite {
        bus: IO_EXPANDER_BUS,
        chip_address: IO_EXPANDER_CHIP_ADDRESS,
        data_address,
        data: Some(data),
    }
}

/// Checks that `mask` steers the direction of a user IO line.
pub fn assert_controls_user_io(mask: u8) -> Result<(), ExpanderError> {
    if mask == I2C_BNC8_USER1_NIN_OUT || mask == I2C_BNC7_USER2_NIN_OUT {
        Ok(())
    } else {
        Err(ExpanderError::NotUserIoBit(mask))
    }
}

/// Puts the user IO steered by `mask` into input mode on the card.
///
/// The whole output register is cleared; the NIN_OUT line reads low.
pub fn user_io_input_mode(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_user_io(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, 0x00))
}

/// Puts the user IO steered by `mask` into output mode on the card.
pub fn user_io_output_mode(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_user_io(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, mask))
}

/// Checks that `mask` selects driven versus open drain for VETO_OUT.
pub fn assert_controls_open_drain_mode(mask: u8) -> Result<(), ExpanderError> {
    if mask == I2C_BNC4_VETO_OUT_OC {
        Ok(())
    } else {
        Err(ExpanderError::NotOpenDrainBit(mask))
    }
}

/// Puts VETO_OUT into driven (push-pull) mode.
pub fn veto_driven_mode(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_open_drain_mode(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, mask))
}

/// Puts VETO_OUT into open drain mode.
pub fn veto_open_drain_mode(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_open_drain_mode(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, 0x00))
}

/// Checks that `mask` switches a 50 ohm termination resistor.
pub fn assert_controls_termination_resistor(mask: u8) -> Result<(), ExpanderError> {
    if mask == I2C_BNC1_50OHM_EN
        || mask == I2C_BNC6_50OHM_EN
        || mask == I2C_BNC8_50OHM_EN
        || mask == I2C_BNC7_50OHM_EN
    {
        Ok(())
    } else {
        Err(ExpanderError::NotTerminationBit(mask))
    }
}

/// Terminates the BNC connector behind `mask` with 50 ohm.
pub fn enable_termination_resistor(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_termination_resistor(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, mask))
}

/// Leaves the BNC connector behind `mask` at high input impedance.
pub fn disable_termination_resistor(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_termination_resistor(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, 0x00))
}

/// Checks that `mask` controls the red LED.
pub fn assert_controls_led(mask: u8) -> Result<(), ExpanderError> {
    if mask == I2C_RLED {
        Ok(())
    } else {
        Err(ExpanderError::NotLedBit(mask))
    }
}

/// Turns on the red LED.
///
/// The LED sinks into the expander line, so the output register is
/// driven low. The green LED must already be on (TDC_LED held low) for
/// the red one to light.
pub fn red_led_on(mask: u8) -> Result<I2cWrite, ExpanderError> {
    assert_controls_led(mask)?;
    Ok(register_write(IO_EXPANDER_OUTPUT_REGISTER, 0x00))
}

/// Configures each expander line as an input or an output.
///
/// `output_bits` names the lines to make outputs; the configuration
/// register stores the complement (bit clear means output on the
/// chip), so the byte is inverted here and nowhere else.
pub fn configure_outputs(output_bits: u8) -> I2cWrite {
    register_write(IO_EXPANDER_CONFIG_REGISTER, !output_bits)
}

/// Returns every expander line to input mode, the power-on state.
pub fn all_inputs() -> I2cWrite {
    configure_outputs(0x00)
}
