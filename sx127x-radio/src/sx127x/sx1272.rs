use embedded_hal::spi::SpiDevice;
use lora_modulation::Bandwidth;

use crate::interface::SpiInterface;
use crate::mod_params::{LoRaModParams, LoRaPktParams, RadioError};
use crate::sx127x::radio_kind_params::{
    coding_rate_value, spreading_factor_value, PaDac, RampTime, Register, Sx127xVariant,
};
use crate::sx127x::SX1272_RSSI_OFFSET;

/// Sx1272 implements the Sx127xVariant trait
pub struct Sx1272;

impl Sx127xVariant for Sx1272 {
    const VERSION: u8 = 0x22;

    fn bandwidth_value(bw: Bandwidth) -> Result<u8, RadioError> {
        match bw {
            Bandwidth::_125KHz => Ok(0x00),
            Bandwidth::_250KHz => Ok(0x01),
            Bandwidth::_500KHz => Ok(0x02),
            _ => Err(RadioError::UnavailableBandwidth),
        }
    }

    fn reg_txco() -> Register {
        Register::RegTcxoSX1272
    }

    fn reg_pa_dac() -> Register {
        Register::RegPaDacSX1272
    }

    fn frequency_supported(frequency_in_hz: u32) -> bool {
        (860_000_000..=1_020_000_000).contains(&frequency_in_hz)
    }

    fn rssi_offset(_frequency_in_hz: u32) -> i16 {
        SX1272_RSSI_OFFSET
    }

    fn set_tx_power<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        p_out: i32,
        tx_boost: bool,
    ) -> Result<(), RadioError> {
        // SX1272 has two output pins:
        // 1) RFO: (-1 to +14 dBm)
        // 2) PA_BOOST: (+2 to +17 dBm and +5 to 20 +dBm)

        // RegPaConfig - 0x09
        // [7] - PaSelect (0: RFO, 1: PA_BOOST)
        // [6:4] - Unused: 0
        // [3:0] - Output power in dB steps

        // RegPaDac - 0x5a (SX1272)
        // [7:3] - Reserved (0x10 as default)
        // [2:0] - PaDac: 0x04 default, 0x07 - enable +20 dBm on PA_BOOST
        if tx_boost {
            // Deal with two ranges, +17dBm enables extra boost
            if p_out > 17 {
                // PA_BOOST out: +5 .. +20 dBm
                let val = (p_out.clamp(5, 20) - 5) as u8 & 0x0f;
                intf.write_register(Register::RegPaConfig, (1 << 7) | val)?;
                intf.write_register(Self::reg_pa_dac(), PaDac::_20DbmOn.value())?;
            } else {
                // PA_BOOST out: +2 .. +17 dBm
                let val = (p_out.clamp(2, 17) - 2) as u8 & 0x0f;
                intf.write_register(Register::RegPaConfig, (1 << 7) | val)?;
                intf.write_register(Self::reg_pa_dac(), PaDac::_20DbmOff.value())?;
            }
        } else {
            // RFO out: -1 to +14 dBm
            let val = (p_out.clamp(-1, 14) + 1) as u8 & 0x0f;
            intf.write_register(Register::RegPaConfig, val)?;
            intf.write_register(Self::reg_pa_dac(), PaDac::_20DbmOff.value())?;
        }

        Ok(())
    }

    fn ramp_value(ramp_time: RampTime) -> u8 {
        // Sx1272 - default: 0x19
        // [4]: LowPnTxPllOff - use higher power, lower phase noise PLL
        //      only when the transmitter is used (default: 1)
        //      0 - Standard PLL used in Rx mode, Lower PN PLL in Tx
        //      1 - Standard PLL used in both Tx and Rx modes
        ramp_time.value() | (1 << 4)
    }

    fn set_modulation_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        mdltn_params: &LoRaModParams,
    ) -> Result<(), RadioError> {
        let bw_val = Self::bandwidth_value(mdltn_params.bw)?;
        let sf_val = spreading_factor_value(mdltn_params.sf)?;
        let cr_val = coding_rate_value(mdltn_params.cr);
        let ldro = mdltn_params.ldro as u8;

        intf.modify_register(Register::RegModemConfig1, |cfg1| {
            (cfg1 & 0b110) | (bw_val << 6) | (cr_val << 3) | ldro
        })?;
        intf.modify_register(Register::RegModemConfig2, |cfg2| (cfg2 & 0b1111) | (sf_val << 4))
    }

    fn set_packet_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        pkt_params: &LoRaPktParams,
    ) -> Result<(), RadioError> {
        let hdr = pkt_params.implicit_header as u8;
        let crc = pkt_params.crc_on as u8;

        intf.modify_register(Register::RegModemConfig1, |cfg1| {
            (cfg1 & 0b1111_1001) | (hdr << 2) | (crc << 1)
        })
    }
}
