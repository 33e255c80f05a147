use embedded_hal::spi::SpiDevice;

use crate::interface::{RegisterAddress, SpiInterface};
use crate::mod_params::*;

/// Chip specific behaviour of the SX127x family
pub trait Sx127xVariant {
    /// Silicon revision held in RegVersion
    const VERSION: u8;

    /// ModemConfig1 bandwidth field for `bw`
    fn bandwidth_value(bw: Bandwidth) -> Result<u8, RadioError>;
    /// Register enabling the TCXO input
    fn reg_txco() -> Register;
    /// Register controlling the +20 dBm option of the PA_BOOST pin
    fn reg_pa_dac() -> Register;
    /// RF frequency is inside the synthesizer range of the chip
    fn frequency_supported(frequency_in_hz: u32) -> bool;
    /// Offset added to the RSSI registers of the LoRa modem at `frequency_in_hz`
    fn rssi_offset(frequency_in_hz: u32) -> i16;
    /// RegPaRamp value for `ramp_time`, modulation shaping bits cleared
    fn ramp_value(ramp_time: RampTime) -> u8;

    /// Select the PA output and program the output power
    fn set_tx_power<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        p_out: i32,
        tx_boost: bool,
    ) -> Result<(), RadioError>;

    /// Program spreading factor, bandwidth, coding rate and LDRO
    fn set_modulation_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        mdltn_params: &LoRaModParams,
    ) -> Result<(), RadioError>;

    /// Program header mode and CRC
    fn set_packet_params<SPI: SpiDevice<u8>, IV>(
        intf: &mut SpiInterface<SPI, IV>,
        pkt_params: &LoRaPktParams,
    ) -> Result<(), RadioError>;

    /// Errata 2.1: sensitivity optimization with a 500 kHz bandwidth. Applied before every LoRa
    /// transmission and reception.
    fn apply_errata_2_1<SPI: SpiDevice<u8>, IV>(
        _intf: &mut SpiInterface<SPI, IV>,
        _bandwidth: Bandwidth,
        _frequency_in_hz: u32,
    ) -> Result<(), RadioError> {
        Ok(())
    }

    /// Errata 2.3: receiver spurious reception of a LoRa signal. Applied before every LoRa
    /// reception, returns the offset in Hz to add to the RF frequency for that reception.
    fn apply_errata_2_3<SPI: SpiDevice<u8>, IV>(
        _intf: &mut SpiInterface<SPI, IV>,
        _bandwidth: Bandwidth,
    ) -> Result<u32, RadioError> {
        Ok(0)
    }
}

// IRQ mapping for sx127x chips in LoRa mode:
// DIO0 - RxDone, TxDone, CadDone
// DIO1 - RxTimeout, FhssChangeChannel, CadDetected
// DIO2 - 3x FhssChangeChannel
// DIO3 - CadDone, ValidHeader, PayloadCrcError
// DIO4 - CadDetected, *PllLock, *PllLock
// DIO5 - *ModeReady, *ClkOut, *ClkOut
//
// In FSK/OOK packet mode:
// DIO0 - PayloadReady/PacketSent, CrcOk
// DIO1 - FifoLevel, FifoEmpty, FifoFull
// DIO2 - FifoFull, RxReady, SyncAddress (rx) / FifoFull (tx)
// DIO4 - Temp/LowBat, PllLock, TimeOut, PreambleDetect/RssiIrq

#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum IrqMask {
    None = 0x00,
    CADActivityDetected = 0x01,
    FhssChangedChannel = 0x02,
    CADDone = 0x04,
    TxDone = 0x08,
    HeaderValid = 0x10,
    CRCError = 0x20,
    RxDone = 0x40,
    RxTimeout = 0x80,
    All = 0xFF,
}

impl IrqMask {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_set_in(self, mask: u8) -> bool {
        self.value() & mask == self.value()
    }
}

/// RegIrqFlags1 of the FSK/OOK modem
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum IrqFlags1 {
    ModeReady = 0x80,
    RxReady = 0x40,
    TxReady = 0x20,
    PllLock = 0x10,
    Rssi = 0x08,
    Timeout = 0x04,
    PreambleDetect = 0x02,
    SyncAddressMatch = 0x01,
}

impl IrqFlags1 {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// RegIrqFlags2 of the FSK/OOK modem
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum IrqFlags2 {
    FifoFull = 0x80,
    FifoEmpty = 0x40,
    FifoLevel = 0x20,
    FifoOverrun = 0x10,
    PacketSent = 0x08,
    PayloadReady = 0x04,
    CrcOk = 0x02,
    LowBat = 0x01,
}

impl IrqFlags2 {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn is_set_in(self, flags: u8) -> bool {
        self.value() & flags == self.value()
    }
}

/// Registers shared by both modems and the LoRa register page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
#[allow(missing_docs)]
pub enum Register {
    RegFifo = 0x00,
    RegOpMode = 0x01,
    RegFrfMsb = 0x06,
    RegFrfMid = 0x07,
    RegFrfLsb = 0x08,
    RegPaConfig = 0x09,
    RegPaRamp = 0x0a,
    RegOcp = 0x0b,
    RegLna = 0x0c,
    RegFifoAddrPtr = 0x0d,
    RegFifoTxBaseAddr = 0x0e,
    RegFifoRxBaseAddr = 0x0f,
    RegFifoRxCurrentAddr = 0x10,
    RegIrqFlagsMask = 0x11,
    RegIrqFlags = 0x12,
    RegRxNbBytes = 0x13,
    RegModemStat = 0x18,
    RegPktSnrValue = 0x19,
    RegPktRssiValue = 0x1a,
    RegRssiValue = 0x1b,
    RegModemConfig1 = 0x1d,
    RegModemConfig2 = 0x1e,
    RegSymbTimeoutLsb = 0x1f,
    RegPreambleMsb = 0x20,
    RegPreambleLsb = 0x21,
    RegPayloadLength = 0x22,
    RegMaxPayloadLength = 0x23,
    RegModemConfig3 = 0x26,
    RegFreqErrorMsb = 0x28,
    RegFreqErrorMid = 0x29,
    RegFreqErrorLsb = 0x2a,
    RegRssiWideband = 0x2c,
    RegIfFreq1 = 0x2f,
    RegIfFreq2 = 0x30,
    RegDetectionOptimize = 0x31,
    RegInvertiq = 0x33,
    RegHighBwOptimize1 = 0x36,
    RegDetectionThreshold = 0x37,
    RegSyncWord = 0x39,
    RegHighBwOptimize2 = 0x3a,
    RegInvertiq2 = 0x3b,
    RegDioMapping1 = 0x40,
    RegDioMapping2 = 0x41,
    RegVersion = 0x42,
    RegTcxoSX1276 = 0x4b,
    RegPaDacSX1276 = 0x4d,
    RegTcxoSX1272 = 0x58,
    RegPaDacSX1272 = 0x5a,
}

impl RegisterAddress for Register {
    fn addr(self) -> u8 {
        self as u8
    }
}

/// FSK/OOK register page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(dead_code)]
#[allow(missing_docs)]
pub enum FskRegister {
    RegBitrateMsb = 0x02,
    RegBitrateLsb = 0x03,
    RegFdevMsb = 0x04,
    RegFdevLsb = 0x05,
    RegRxConfig = 0x0d,
    RegRssiConfig = 0x0e,
    RegRssiValue = 0x11,
    RegRxBw = 0x12,
    RegAfcBw = 0x13,
    RegAfcFei = 0x1a,
    RegAfcMsb = 0x1b,
    RegAfcLsb = 0x1c,
    RegPreambleDetect = 0x1f,
    RegOsc = 0x24,
    RegPreambleMsb = 0x25,
    RegPreambleLsb = 0x26,
    RegSyncConfig = 0x27,
    RegSyncValue1 = 0x28,
    RegPacketConfig1 = 0x30,
    RegPacketConfig2 = 0x31,
    RegPayloadLength = 0x32,
    RegNodeAdrs = 0x33,
    RegBroadcastAdrs = 0x34,
    RegFifoThresh = 0x35,
    RegImageCal = 0x3b,
    RegIrqFlags1 = 0x3e,
    RegIrqFlags2 = 0x3f,
}

impl RegisterAddress for FskRegister {
    fn addr(self) -> u8 {
        self as u8
    }
}

/// PA ramp up/down time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum RampTime {
    Ramp3_4Ms = 0x00,
    Ramp2Ms = 0x01,
    Ramp1Ms = 0x02,
    Ramp500Us = 0x03,
    Ramp250Us = 0x04,
    Ramp125Us = 0x05,
    Ramp100Us = 0x06,
    Ramp62Us = 0x07,
    Ramp50Us = 0x08,
    Ramp40Us = 0x09,
    Ramp31Us = 0x0a,
    Ramp25Us = 0x0b,
    Ramp20Us = 0x0c,
    Ramp15Us = 0x0d,
    Ramp12Us = 0x0e,
    Ramp10Us = 0x0f,
}

impl RampTime {
    /// PaRamp field value
    pub fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
pub enum LnaGain {
    G1 = 0x20, // maximum gain (default)
    G2 = 0x40,
    G3 = 0x60,
    G4 = 0x80,
    G5 = 0xa0,
    G6 = 0xc0, // minumum gain
}

impl LnaGain {
    pub fn value(self) -> u8 {
        self as u8
    }
    pub fn boosted_value(self) -> u8 {
        (self as u8) | 0x03u8
    }
}

/// PA DAC configuration
#[derive(Clone, Copy)]
pub enum PaDac {
    _20DbmOn = 0x87,
    _20DbmOff = 0x84,
}

impl PaDac {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// PA configuration - sx1276+
#[derive(Clone, Copy)]
pub enum PaConfig {
    PaBoost = 0x80,
    MaxPower7NoPaBoost = 0x70,
}

impl PaConfig {
    pub fn value(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy)]
#[allow(dead_code)]
#[allow(clippy::enum_variant_names)]
pub enum OcpTrim {
    _45Ma = 0x00,
    _50Ma = 0x01,
    _55Ma = 0x02,
    _60Ma = 0x03,
    _65Ma = 0x04,
    _70Ma = 0x05,
    _75Ma = 0x06,
    _80Ma = 0x07,
    _85Ma = 0x08,
    _90Ma = 0x09,
    _95Ma = 0x0a,
    _100Ma = 0x0b,
    _105Ma = 0x0c,
    _110Ma = 0x0d,
    _115Ma = 0x0e,
    _120Ma = 0x0f,
    _130Ma = 0x10,
    _140Ma = 0x11,
    _150Ma = 0x12,
    _160Ma = 0x13,
    _170Ma = 0x14,
    _180Ma = 0x15,
    _190Ma = 0x16,
    _200Ma = 0x17,
    _210Ma = 0x18,
    _220Ma = 0x19,
    _230Ma = 0x1a,
    _240Ma = 0x1b,
}

impl OcpTrim {
    pub fn value(self) -> u8 {
        (self as u8) | 0x20u8 // value plus OCP on flag
    }
}

pub fn spreading_factor_value(spreading_factor: SpreadingFactor) -> Result<u8, RadioError> {
    match spreading_factor {
        SpreadingFactor::_5 => Err(RadioError::UnavailableSpreadingFactor),
        SpreadingFactor::_6 => Ok(0x06),
        SpreadingFactor::_7 => Ok(0x07),
        SpreadingFactor::_8 => Ok(0x08),
        SpreadingFactor::_9 => Ok(0x09),
        SpreadingFactor::_10 => Ok(0x0A),
        SpreadingFactor::_11 => Ok(0x0B),
        SpreadingFactor::_12 => Ok(0x0C),
    }
}

pub fn coding_rate_value(coding_rate: CodingRate) -> u8 {
    match coding_rate {
        CodingRate::_4_5 => 0x01,
        CodingRate::_4_6 => 0x02,
        CodingRate::_4_7 => 0x03,
        CodingRate::_4_8 => 0x04,
    }
}

// Single side receiver bandwidth (Hz) and the matching RxBw/AfcBw mantissa and exponent
const FSK_BANDWIDTHS: [(u32, u8); 22] = [
    (2600, 0x17),
    (3100, 0x0F),
    (3900, 0x07),
    (5200, 0x16),
    (6300, 0x0E),
    (7800, 0x06),
    (10400, 0x15),
    (12500, 0x0D),
    (15600, 0x05),
    (20800, 0x14),
    (25000, 0x0C),
    (31300, 0x04),
    (41700, 0x13),
    (50000, 0x0B),
    (62500, 0x03),
    (83333, 0x12),
    (100000, 0x0A),
    (125000, 0x02),
    (166700, 0x11),
    (200000, 0x09),
    (250000, 0x01),
    (300000, 0x00),
];

/// RxBw/AfcBw value of the widest table bandwidth not above `bandwidth_in_hz`
pub fn fsk_bandwidth_value(bandwidth_in_hz: u32) -> Result<u8, RadioError> {
    FSK_BANDWIDTHS
        .windows(2)
        .find(|w| bandwidth_in_hz >= w[0].0 && bandwidth_in_hz < w[1].0)
        .map(|w| w[0].1)
        .ok_or(RadioError::UnavailableBandwidth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsk_bandwidth_lookup() {
        assert_eq!(fsk_bandwidth_value(2600), Ok(0x17));
        assert_eq!(fsk_bandwidth_value(50_000), Ok(0x0B));
        assert_eq!(fsk_bandwidth_value(83_333), Ok(0x12));
        assert_eq!(fsk_bandwidth_value(99_999), Ok(0x12));
        assert_eq!(fsk_bandwidth_value(250_000), Ok(0x01));
        assert_eq!(fsk_bandwidth_value(2599), Err(RadioError::UnavailableBandwidth));
        // The last entry only bounds the interval below it
        assert_eq!(fsk_bandwidth_value(300_000), Err(RadioError::UnavailableBandwidth));
    }
}
