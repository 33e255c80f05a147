use embedded_hal::spi::SpiDevice;
use lora_modulation::Bandwidth;

use crate::interface::SpiInterface;
use crate::mod_params::{LoRaModParams, LoRaPktParams, RadioError};
use crate::sx127x::fields::DetectOptimize;
use crate::sx127x::radio_kind_params::{
    coding_rate_value, spreading_factor_value, OcpTrim, PaConfig, PaDac, RampTime, Register, Sx127xVariant,
};
use crate::sx127x::{SX1276_RF_MID_BAND_THRESH, SX1276_RSSI_OFFSET_HF, SX1276_RSSI_OFFSET_LF};

/// Sx1276 implements the Sx127xVariant trait
pub struct Sx1276;

impl Sx1276 {
    // Set the over current protection (mA) on the radio
    fn set_ocp<SPI: SpiDevice<u8>, IV>(intf: &mut SpiInterface<SPI, IV>, ocp_trim: OcpTrim) -> Result<(), RadioError> {
        intf.write_register(Register::RegOcp, ocp_trim.value())
    }
}

impl Sx127xVariant for Sx1276 {
    const VERSION: u8 = 0x12;

    fn bandwidth_value(bw: Bandwidth) -> Result<u8, RadioError> {
        match bw {
            Bandwidth::_7KHz => Ok(0x00),
            Bandwidth::_10KHz => Ok(0x01),
            Bandwidth::_15KHz => Ok(0x02),
            Bandwidth::_20KHz => Ok(0x03),
            Bandwidth::_31KHz => Ok(0x04),
            Bandwidth::_41KHz => Ok(0x05),
            Bandwidth::_62KHz => Ok(0x06),
            Bandwidth::_125KHz => Ok(0x07),
            Bandwidth::_250KHz => Ok(0x08),
            Bandwidth::_500KHz => Ok(0x09),
        }
    }

    fn reg_txco() -> Register {
        Register::RegTcxoSX1276
    }

    fn reg_pa_dac() -> Register {
        Register::RegPaDacSX1276
    }

    fn frequency_supported(frequency_in_hz: u32) -> bool {
        (137_000_000..=1_020_000_000).contains(&frequency_in_hz)
    }

    fn rssi_offset(frequency_in_hz: u32) -> i16 {
        if frequency_in_hz > SX1276_RF_MID_BAND_THRESH {
            SX1276_RSSI_OFFSET_HF
        } else {
            SX1276_RSSI_OFFSET_LF
        }
    }

    fn set_tx_power<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        p_out: i32,
        tx_boost: bool,
    ) -> Result<(), RadioError> {
        let pa_reg = Self::reg_pa_dac();
        if tx_boost {
            // Output via PA_BOOST: [2, 20] dBm
            let txp = p_out.clamp(2, 20);

            if txp > 17 {
                // +20 dBm option, Pout = 20 - (15 - OutputPower)
                intf.write_register(pa_reg, PaDac::_20DbmOn.value())?;
                Self::set_ocp(intf, OcpTrim::_240Ma)?;
                intf.write_register(Register::RegPaConfig, PaConfig::PaBoost.value() | ((txp - 5) as u8))?;
            } else {
                // Pout = 17 - (15 - OutputPower)
                intf.write_register(pa_reg, PaDac::_20DbmOff.value())?;
                Self::set_ocp(intf, OcpTrim::_100Ma)?;
                intf.write_register(Register::RegPaConfig, PaConfig::PaBoost.value() | ((txp - 2) as u8))?;
            }
        } else {
            // Clamp output: [-4, 14] dBm
            let txp = p_out.clamp(-4, 14);

            // Pmax=10.8+0.6*MaxPower, where MaxPower is set below as 7 and therefore Pmax is 15
            // Pout=Pmax-(15-OutputPower)
            let output_power = txp.max(0) as u8;

            intf.write_register(pa_reg, PaDac::_20DbmOff.value())?;
            Self::set_ocp(intf, OcpTrim::_100Ma)?;
            intf.write_register(
                Register::RegPaConfig,
                PaConfig::MaxPower7NoPaBoost.value() | output_power,
            )?;
        }
        Ok(())
    }

    fn ramp_value(ramp_time: RampTime) -> u8 {
        // Sx1276 - default: 0x09
        // [4]: reserved (0x00)
        ramp_time.value()
    }

    fn set_modulation_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        mdltn_params: &LoRaModParams,
    ) -> Result<(), RadioError> {
        let bw_val = Self::bandwidth_value(mdltn_params.bw)?;
        let sf_val = spreading_factor_value(mdltn_params.sf)?;
        let cr_val = coding_rate_value(mdltn_params.cr);

        // [7:4] spreading factor, [3:0] TxContinuousMode, RxPayloadCrcOn, SymbTimeout(9:8)
        intf.modify_register(Register::RegModemConfig2, |cfg2| (cfg2 & 0x0f) | (sf_val << 4))?;
        // [7:4] bandwidth, [3:1] coding rate, [0] ImplicitHeaderModeOn
        intf.modify_register(Register::RegModemConfig1, |cfg1| {
            (cfg1 & 0x01) | (bw_val << 4) | (cr_val << 1)
        })?;

        let ldro_agc_auto_flags = if mdltn_params.ldro {
            0x08u8 // LDRO on and AGC Auto off
        } else {
            0x00u8 // LDRO and AGC Auto both off
        };
        intf.modify_register(Register::RegModemConfig3, |cfg3| (cfg3 & 0xf3) | ldro_agc_auto_flags)
    }

    fn set_packet_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        pkt_params: &LoRaPktParams,
    ) -> Result<(), RadioError> {
        intf.modify_register(Register::RegModemConfig1, |cfg1| {
            (cfg1 & 0xfe) | pkt_params.implicit_header as u8
        })?;
        intf.modify_register(Register::RegModemConfig2, |cfg2| {
            (cfg2 & 0xfb) | ((pkt_params.crc_on as u8) << 2)
        })
    }

    fn apply_errata_2_1<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        bandwidth: Bandwidth,
        frequency_in_hz: u32,
    ) -> Result<(), RadioError> {
        if bandwidth == Bandwidth::_500KHz {
            intf.write_register(Register::RegHighBwOptimize1, 0x02)?;
            let optimize2 = if frequency_in_hz > SX1276_RF_MID_BAND_THRESH { 0x64 } else { 0x7f };
            intf.write_register(Register::RegHighBwOptimize2, optimize2)
        } else {
            intf.write_register(Register::RegHighBwOptimize1, 0x03)
        }
    }

    fn apply_errata_2_3<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        bandwidth: Bandwidth,
    ) -> Result<u32, RadioError> {
        let (if_freq1, offset_in_hz) = match bandwidth {
            Bandwidth::_7KHz => (0x48, 7810),
            Bandwidth::_10KHz => (0x44, 10420),
            Bandwidth::_15KHz => (0x44, 15620),
            Bandwidth::_20KHz => (0x44, 20830),
            Bandwidth::_31KHz => (0x44, 31250),
            Bandwidth::_41KHz => (0x44, 41670),
            Bandwidth::_62KHz | Bandwidth::_125KHz | Bandwidth::_250KHz => (0x40, 0),
            Bandwidth::_500KHz => {
                intf.modify_register(Register::RegDetectionOptimize, |v| {
                    DetectOptimize::from_bits(v).with_automatic_if(true).bits()
                })?;
                return Ok(0);
            }
        };
        intf.modify_register(Register::RegDetectionOptimize, |v| {
            DetectOptimize::from_bits(v).with_automatic_if(false).bits()
        })?;
        intf.write_register(Register::RegIfFreq2, 0x00)?;
        intf.write_register(Register::RegIfFreq1, if_freq1)?;
        Ok(offset_in_hz)
    }
}
