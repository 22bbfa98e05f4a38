//! Host-side test tooling for the BNC signal conditioning card.
//!
//! Per-test pin reads, pin drives, and IO expander register writes are
//! amalgamated into one ordered batch ([`batch::IoBatch`]), proven safe
//! against the card wiring rules ([`card::BncValidator`]), and only
//! then dispatched to the IO server on the BeagleBone Black
//! ([`bbb::BbbIo`]). Nothing touches the hardware until the whole
//! batch validates.

pub mod batch;
pub mod bbb;
pub mod card;
pub mod config;
pub mod io_spec;
