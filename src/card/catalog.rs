//! Static wiring tables for the BNC signal conditioning card.
//!
//! Naming convention, following the card schematic:
//!
//! - `B_<LINE>_L3V3`: BBB digital pin on the 3.3V side of a 3.3V/5V
//!   level shifter whose 5V side lands on the `<LINE>` BNC connector.
//! - `P_<LINE>_L3V3`: same, but the 5V side lands on the `<LINE>` pin
//!   header.
//! - `SW_<LINE>_L3V3`: BBB digital pin driving a relay that puts a
//!   300 ohm resistor in series with the BNC connector output. High
//!   means the resistor is in circuit.
//! - `TR_<LINE>_L1V8`: BBB analog pin (1.8V maximum) on a voltage
//!   divider used to sense the termination resistance of a connector.
//! - `I2C_<LINE>`: single-bit mask of the IO expander line controlling
//!   the named card feature. Always a power of two.

// REF_IN: BNC1, pin header 3
pub const B_REF_IN_L3V3: &str = "P9_12";
pub const P_REF_IN_L3V3: &str = "P9_24";
pub const SW_REF_IN_L3V3: &str = "P8_8";
pub const TR_REF_IN_L1V8: &str = "P9_40";
pub const I2C_BNC1_50OHM_EN: u8 = 0x01;

// REF_OUT: BNC2, pin header 5
pub const B_REF_OUT_L3V3: &str = "P9_13";
pub const P_REF_OUT_L3V3: &str = "P9_28";

// TDC_OUT: BNC3, pin header 7
pub const B_TDC_OUT_L3V3: &str = "P9_14";
pub const P_TDC_OUT_L3V3: &str = "P8_13";

// VETO_OUT: BNC4, pin header 9
pub const B_VETO_OUT_L3V3: &str = "P9_26";
pub const P_VETO_OUT_L3V3: &str = "P8_14";
pub const I2C_BNC4_VETO_OUT_OC: u8 = 0x80;

// SYNC_OUT: BNC5, pin header 11
pub const B_SYNC_OUT_L3V3: &str = "P9_27";
pub const P_SYNC_OUT_L3V3: &str = "P8_17";

// SYNC_IN: BNC6, pin header 13
pub const B_SYNC_IN_L3V3: &str = "P9_29";
pub const P_SYNC_IN_L3V3: &str = "P8_15";
pub const SW_SYNC_IN_L3V3: &str = "P8_9";
pub const TR_SYNC_IN_L1V8: &str = "P9_37";
pub const I2C_BNC6_50OHM_EN: u8 = 0x02;

// USER1_IO: BNC8, pin headers 12 (out) and 8 (in)
pub const B_USER1_BI_DIR_L3V3: &str = "P9_31";
pub const P_USER1_OUT_TO_LD: &str = "P9_11";
pub const P_USER1_IN_TO_BBB: &str = "P8_19";
pub const SW_USER1_L3V3: &str = "P8_10";
pub const TR_USER1_L1V8: &str = "P9_38";
pub const I2C_BNC8_USER1_NIN_OUT: u8 = 0x20;
pub const I2C_BNC8_50OHM_EN: u8 = 0x04;

// USER2_IO: BNC7, pin headers 10 (out) and 6 (in)
pub const B_USER2_BI_DIR_L3V3: &str = "P9_30";
pub const P_USER2_OUT_TO_LD: &str = "P8_18";
pub const P_USER2_IN_TO_BBB: &str = "P8_16";
pub const SW_USER2_L3V3: &str = "P8_12";
pub const TR_USER2_L1V8: &str = "P9_35";
pub const I2C_BNC7_USER2_NIN_OUT: u8 = 0x40;
pub const I2C_BNC7_50OHM_EN: u8 = 0x10;

// TDC_LED: pin header 16. Drive low to turn on the green LED; the red
// LED additionally needs the I2C_RLED expander line set as an output
// and driven low.
pub const P_TDC_LED_L3V3: &str = "P8_11";
pub const I2C_RLED: u8 = 0x08;

// Enable for level shifters 1 and 2, output low to turn on
pub const OE_EN1_L1L2: &str = "P8_26";
// Enable for level shifter 3, output low to turn on
pub const OE_EN2_L3: &str = "P9_16";
// Direction select for level shifter 3: high shifts 3.3V to 5V, low
// shifts 5V to 3.3V
pub const DIR_L3: &str = "P8_7";

/// Normalized analog readings at or below this count as a digital low.
pub const ANALOG_LOW_MAXIMUM: f64 = 0.01;
/// Normalized analog readings at or above this count as a digital high.
pub const ANALOG_HIGH_MINIMUM: f64 = 0.99;

/// The I2C bus the card's IO expander hangs off.
pub const IO_EXPANDER_BUS: u8 = 2;
/// Chip address of the IO expander.
pub const IO_EXPANDER_CHIP_ADDRESS: u8 = 0x27;
/// Register holding the value driven on output-configured expander
/// lines. Lines must be configured as outputs before the value takes
/// effect.
pub const IO_EXPANDER_OUTPUT_REGISTER: u8 = 0x01;
/// Register selecting input (bit set) or output (bit clear) per
/// expander line. Powers on as 0xff, all inputs.
pub const IO_EXPANDER_CONFIG_REGISTER: u8 = 0x03;

pub const ALLOWED_I2C_BUSES: &[u8] = &[IO_EXPANDER_BUS];
pub const ALLOWED_I2C_CHIP_ADDRESSES: &[u8] = &[IO_EXPANDER_CHIP_ADDRESS];
pub const ALLOWED_I2C_DATA_ADDRESSES: &[u8] =
    &[IO_EXPANDER_OUTPUT_REGISTER, IO_EXPANDER_CONFIG_REGISTER];

/// Direction class of a catalog line, seen from the BBB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinClass {
    /// The card drives the line; the BBB may only read it.
    DigitalInput,
    /// The BBB drives the line.
    DigitalOutput,
    /// User IO BNC connector line; direction is selected at runtime
    /// through the IO expander.
    Bidirectional,
    /// Termination sense line into the BBB ADC.
    AnalogInput,
}

/// Card-side direction of a user IO line, selected through the IO
/// expander mode-control bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardMode {
    Input,
    Output,
}

impl std::fmt::Display for CardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardMode::Input => f.write_str("input"),
            CardMode::Output => f.write_str("output"),
        }
    }
}

/// Direction constraints for a line routed through the user IO
/// circuitry.
///
/// `as_input`/`as_output` give the card mode the expander must resolve
/// to before the BBB may read or drive the line; `None` means the
/// catalog class already forbids that use.
#[derive(Debug, Clone, Copy)]
pub struct UserIoRule {
    /// Single-bit mask of the expander line steering this user IO.
    pub mode_bit: u8,
    pub as_input: Option<CardMode>,
    pub as_output: Option<CardMode>,
}

/// One line of the card wiring table.
#[derive(Debug, Clone, Copy)]
pub struct PinDef {
    pub pin: &'static str,
    pub class: PinClass,
    pub user_io: Option<UserIoRule>,
}

const fn fixed(pin: &'static str, class: PinClass) -> PinDef {
    PinDef {
        pin,
        class,
        user_io: None,
    }
}

/// Every BBB pin the card wiring reaches.
///
/// The user IO lines carry the interesting entries: the BNC connector
/// side of USER1/USER2 must be in the opposite card mode to the BBB's
/// use of it (the card drives what the BBB reads, and vice versa),
/// while the pin header sides sit behind the level shifter and need the
/// matching card mode.
pub static CATALOG: &[PinDef] = &[
    // REF_IN (BNC1): card input, injected by the BBB
    fixed(B_REF_IN_L3V3, PinClass::DigitalOutput),
    fixed(P_REF_IN_L3V3, PinClass::DigitalOutput),
    fixed(SW_REF_IN_L3V3, PinClass::DigitalOutput),
    fixed(TR_REF_IN_L1V8, PinClass::AnalogInput),
    // REF_OUT (BNC2): card output, read back by the BBB
    fixed(B_REF_OUT_L3V3, PinClass::DigitalInput),
    fixed(P_REF_OUT_L3V3, PinClass::DigitalInput),
    // TDC_OUT (BNC3)
    fixed(B_TDC_OUT_L3V3, PinClass::DigitalInput),
    fixed(P_TDC_OUT_L3V3, PinClass::DigitalInput),
    // VETO_OUT (BNC4)
    fixed(B_VETO_OUT_L3V3, PinClass::DigitalInput),
    fixed(P_VETO_OUT_L3V3, PinClass::DigitalInput),
    // SYNC_OUT (BNC5)
    fixed(B_SYNC_OUT_L3V3, PinClass::DigitalInput),
    fixed(P_SYNC_OUT_L3V3, PinClass::DigitalInput),
    // SYNC_IN (BNC6)
    fixed(B_SYNC_IN_L3V3, PinClass::DigitalOutput),
    fixed(P_SYNC_IN_L3V3, PinClass::DigitalOutput),
    fixed(SW_SYNC_IN_L3V3, PinClass::DigitalOutput),
    fixed(TR_SYNC_IN_L1V8, PinClass::AnalogInput),
    // USER1 (BNC8)
    PinDef {
        pin: B_USER1_BI_DIR_L3V3,
        class: PinClass::Bidirectional,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC8_USER1_NIN_OUT,
            as_input: Some(CardMode::Output),
            as_output: Some(CardMode::Input),
        }),
    },
    PinDef {
        pin: P_USER1_OUT_TO_LD,
        class: PinClass::DigitalOutput,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC8_USER1_NIN_OUT,
            as_input: None,
            as_output: Some(CardMode::Output),
        }),
    },
    PinDef {
        pin: P_USER1_IN_TO_BBB,
        class: PinClass::DigitalInput,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC8_USER1_NIN_OUT,
            as_input: Some(CardMode::Input),
            as_output: None,
        }),
    },
    fixed(SW_USER1_L3V3, PinClass::DigitalOutput),
    fixed(TR_USER1_L1V8, PinClass::AnalogInput),
    // USER2 (BNC7)
    PinDef {
        pin: B_USER2_BI_DIR_L3V3,
        class: PinClass::Bidirectional,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC7_USER2_NIN_OUT,
            as_input: Some(CardMode::Output),
            as_output: Some(CardMode::Input),
        }),
    },
    PinDef {
        pin: P_USER2_OUT_TO_LD,
        class: PinClass::DigitalOutput,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC7_USER2_NIN_OUT,
            as_input: None,
            as_output: Some(CardMode::Output),
        }),
    },
    PinDef {
        pin: P_USER2_IN_TO_BBB,
        class: PinClass::DigitalInput,
        user_io: Some(UserIoRule {
            mode_bit: I2C_BNC7_USER2_NIN_OUT,
            as_input: Some(CardMode::Input),
            as_output: None,
        }),
    },
    fixed(SW_USER2_L3V3, PinClass::DigitalOutput),
    fixed(TR_USER2_L1V8, PinClass::AnalogInput),
    // TDC LED
    fixed(P_TDC_LED_L3V3, PinClass::DigitalOutput),
    // Level shifter control
    fixed(OE_EN1_L1L2, PinClass::DigitalOutput),
    fixed(OE_EN2_L3, PinClass::DigitalOutput),
    fixed(DIR_L3, PinClass::DigitalOutput),
];

/// Finds the wiring entry for a BBB pin id.
pub fn lookup(pin: &str) -> Option<&'static PinDef> {
    CATALOG.iter().find(|def| def.pin == pin)
}

/// Whether the pin exists on the card wiring as a digital line.
pub fn is_digital_pin(pin: &str) -> bool {
    matches!(
        lookup(pin),
        Some(def) if def.class != PinClass::AnalogInput
    )
}

/// Whether the pin exists on the card wiring as an analog line.
pub fn is_analog_pin(pin: &str) -> bool {
    matches!(lookup(pin), Some(def) if def.class == PinClass::AnalogInput)
}

pub fn analog_reads_high(value: f64) -> bool {
    value >= ANALOG_HIGH_MINIMUM
}

pub fn analog_reads_low(value: f64) -> bool {
    value <= ANALOG_LOW_MAXIMUM
}
