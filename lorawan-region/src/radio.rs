//! Modem configurations produced by a region, to be applied to the radio driver.
pub use lora_modulation::BaseBandModulationParams;

/// GFSK modulation of the high speed FSK datarate.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfskModulation {
    pub bitrate_bps: u32,
    pub fdev_hz: u32,
    /// Single side band receiver bandwidth.
    pub bandwidth_hz: u32,
    pub afc_bandwidth_hz: u32,
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    LoRa(BaseBandModulationParams),
    Gfsk(GfskModulation),
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfConfig {
    pub frequency: u32,
    pub modulation: Modulation,
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxMode {
    Continuous,
    /// Single shot receive. The window closes when no preamble was detected after
    /// `symbol_timeout` symbols (LoRa) or bytes (GFSK).
    Single {
        symbol_timeout: u16,
    },
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxConfig {
    pub rf: RfConfig,
    pub mode: RxMode,
    /// Preamble length in symbols (LoRa) or bytes (GFSK).
    pub preamble_len: u16,
    /// Largest PHY payload accepted, MAC overhead included.
    pub max_payload_len: u8,
    pub crc_on: bool,
    pub iq_inverted: bool,
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxConfig {
    /// Conducted output power in dBm.
    pub pw: i8,
    pub rf: RfConfig,
    /// Preamble length in symbols (LoRa) or bytes (GFSK).
    pub preamble_len: u16,
    pub crc_on: bool,
    pub payload_len: u8,
    pub timeout_ms: u32,
}
