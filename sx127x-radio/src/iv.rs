use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::mod_params::RadioError;
use crate::mod_params::RadioError::*;
use crate::mod_traits::InterfaceVariant;

/// Base for the InterfaceVariant implementation for a generic Sx127x board
pub struct GenericSx127xInterfaceVariant<CTRL, IN> {
    reset: CTRL,
    dio1: IN,
    rf_switch_rx: Option<CTRL>,
    rf_switch_tx: Option<CTRL>,
}

impl<CTRL, IN> GenericSx127xInterfaceVariant<CTRL, IN>
where
    CTRL: OutputPin,
    IN: InputPin,
{
    /// Create an InterfaceVariant instance for a board with a reset line, the DIO1 line wired
    /// to an input and optional antenna switch controls
    pub fn new(
        reset: CTRL,
        dio1: IN,
        rf_switch_rx: Option<CTRL>,
        rf_switch_tx: Option<CTRL>,
    ) -> Result<Self, RadioError> {
        Ok(Self {
            reset,
            dio1,
            rf_switch_rx,
            rf_switch_tx,
        })
    }
}

impl<CTRL, IN> InterfaceVariant for GenericSx127xInterfaceVariant<CTRL, IN>
where
    CTRL: OutputPin,
    IN: InputPin,
{
    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        self.reset.set_low().map_err(|_| Reset)?;
        delay.delay_ms(1);
        self.reset.set_high().map_err(|_| Reset)?;
        // Chip is ready 5 ms after POR/manual reset
        delay.delay_ms(6);
        Ok(())
    }

    fn dio1_pin_state(&mut self) -> Result<bool, RadioError> {
        self.dio1.is_high().map_err(|_| DIO1)
    }

    fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        match &mut self.rf_switch_tx {
            Some(pin) => pin.set_low().map_err(|_| RfSwitchTx)?,
            None => (),
        };
        match &mut self.rf_switch_rx {
            Some(pin) => pin.set_high().map_err(|_| RfSwitchRx),
            None => Ok(()),
        }
    }
    fn enable_rf_switch_tx(&mut self) -> Result<(), RadioError> {
        match &mut self.rf_switch_rx {
            Some(pin) => pin.set_low().map_err(|_| RfSwitchRx)?,
            None => (),
        };
        match &mut self.rf_switch_tx {
            Some(pin) => pin.set_high().map_err(|_| RfSwitchTx),
            None => Ok(()),
        }
    }
    fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        match &mut self.rf_switch_rx {
            Some(pin) => pin.set_low().map_err(|_| RfSwitchRx)?,
            None => (),
        };
        match &mut self.rf_switch_tx {
            Some(pin) => pin.set_low().map_err(|_| RfSwitchTx),
            None => Ok(()),
        }
    }
}
