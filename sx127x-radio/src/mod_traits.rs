use embedded_hal::delay::DelayNs;

use crate::mod_params::*;

/// Functions implemented for an embedded framework for an MCU/LoRa chip combination
/// to allow this crate to control the LoRa chip.
pub trait InterfaceVariant {
    /// Reset the LoRa chip
    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError>;
    /// Level of the DIO1 line, high is `true`. FIFO level and FIFO empty handling depend on it.
    fn dio1_pin_state(&mut self) -> Result<bool, RadioError>;
    /// Enable an antenna used for receive operations, disabling other antennas
    fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError>;
    /// Enable an antenna used for send operations, disabling other antennas
    fn enable_rf_switch_tx(&mut self) -> Result<(), RadioError>;
    /// Disable all antennas
    fn disable_rf_switch(&mut self) -> Result<(), RadioError>;
}

/// One-shot timer guarding transmit and receive operations.
///
/// When the timer elapses the platform reports it with [`IrqSource::Timer`].
pub trait RadioTimer {
    /// (Re)arm the timer
    fn start(&mut self, timeout_ms: u32);
    /// Disarm the timer
    fn stop(&mut self);
    /// The timer is armed and has not elapsed yet
    fn is_started(&self) -> bool;
}
