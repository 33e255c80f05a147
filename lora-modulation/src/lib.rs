#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//! Definitions of LoRa modulation characteristics and the on-air duration of LoRa and GFSK frames.
//!
//! ## Feature flags
#![doc = document_features::document_features!(feature_label = r#"<span class="stab portability"><code>{feature}</code></span>"#)]

mod time_on_air;
pub use time_on_air::{gfsk_time_on_air, lora_time_on_air, GfskPacket, LoRaPacket};

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Channel width.
pub enum Bandwidth {
    _7KHz,
    _10KHz,
    _15KHz,
    _20KHz,
    _31KHz,
    _41KHz,
    _62KHz,
    _125KHz,
    _250KHz,
    _500KHz,
}

impl Bandwidth {
    /// Bandwidth in Hz.
    pub const fn hz(self) -> u32 {
        match self {
            Bandwidth::_7KHz => 7810,
            Bandwidth::_10KHz => 10420,
            Bandwidth::_15KHz => 15630,
            Bandwidth::_20KHz => 20830,
            Bandwidth::_31KHz => 31250,
            Bandwidth::_41KHz => 41670,
            Bandwidth::_62KHz => 62500,
            Bandwidth::_125KHz => 125000,
            Bandwidth::_250KHz => 250000,
            Bandwidth::_500KHz => 500000,
        }
    }
}

impl From<Bandwidth> for u32 {
    fn from(value: Bandwidth) -> Self {
        value.hz()
    }
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
/// Controls the chirp rate. Lower values are slower bandwidth, but more robust.
pub enum SpreadingFactor {
    _5,
    _6,
    _7,
    _8,
    _9,
    _10,
    _11,
    _12,
}

impl SpreadingFactor {
    /// Numeric spreading factor (5..=12).
    pub const fn factor(self) -> u8 {
        match self {
            SpreadingFactor::_5 => 5,
            SpreadingFactor::_6 => 6,
            SpreadingFactor::_7 => 7,
            SpreadingFactor::_8 => 8,
            SpreadingFactor::_9 => 9,
            SpreadingFactor::_10 => 10,
            SpreadingFactor::_11 => 11,
            SpreadingFactor::_12 => 12,
        }
    }
}

impl From<SpreadingFactor> for u32 {
    fn from(sf: SpreadingFactor) -> Self {
        sf.factor() as u32
    }
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Controls the forward error correction. Higher values are more robust, but reduces the ratio
/// of actual data in transmissions.
pub enum CodingRate {
    _4_5,
    _4_6,
    _4_7,
    _4_8,
}

impl CodingRate {
    /// Denominator of the coding rate (5..=8).
    pub const fn denominator(self) -> u8 {
        match self {
            CodingRate::_4_5 => 5,
            CodingRate::_4_6 => 6,
            CodingRate::_4_7 => 7,
            CodingRate::_4_8 => 8,
        }
    }
}

/// Returns true when the symbol duration of the `sf`/`bw` pair makes low data rate optimization
/// mandatory: SF11 and SF12 at 125 kHz, SF12 at 250 kHz.
pub const fn ldro_required(sf: SpreadingFactor, bw: Bandwidth) -> bool {
    matches!(
        (bw, sf),
        (Bandwidth::_125KHz, SpreadingFactor::_11)
            | (Bandwidth::_125KHz, SpreadingFactor::_12)
            | (Bandwidth::_250KHz, SpreadingFactor::_12)
    )
}

#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Base band parameters of a LoRa transmission.
pub struct BaseBandModulationParams {
    pub sf: SpreadingFactor,
    pub bw: Bandwidth,
    pub cr: CodingRate,
    /// Low data rate optimization.
    pub ldro: bool,
}

impl BaseBandModulationParams {
    /// Create a set of parameters, enabling low data rate optimization where the symbol time
    /// requires it.
    pub const fn new(sf: SpreadingFactor, bw: Bandwidth, cr: CodingRate) -> Self {
        Self { sf, bw, cr, ldro: ldro_required(sf, bw) }
    }

    /// Request low data rate optimization. It can't be switched off for the combinations where
    /// it is mandatory.
    pub const fn with_ldro(mut self, ldro: bool) -> Self {
        self.ldro = ldro || ldro_required(self.sf, self.bw);
        self
    }

    /// Duration of a single symbol in microseconds.
    pub fn symbol_time_us(&self) -> u32 {
        ((1u64 << self.sf.factor()) * 1_000_000 / self.bw.hz() as u64) as u32
    }

    /// On-air duration of `packet` in milliseconds using these modulation parameters.
    pub fn time_on_air_ms(&self, packet: &LoRaPacket) -> u32 {
        lora_time_on_air(packet, self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ldro_is_forced_for_long_symbols() {
        assert!(BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_125KHz, CodingRate::_4_5).ldro);
        assert!(BaseBandModulationParams::new(SpreadingFactor::_11, Bandwidth::_125KHz, CodingRate::_4_5).ldro);
        assert!(BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_250KHz, CodingRate::_4_5).ldro);
        assert!(!BaseBandModulationParams::new(SpreadingFactor::_11, Bandwidth::_250KHz, CodingRate::_4_5).ldro);
        assert!(!BaseBandModulationParams::new(SpreadingFactor::_10, Bandwidth::_125KHz, CodingRate::_4_5).ldro);

        let forced = BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_125KHz, CodingRate::_4_5)
            .with_ldro(false);
        assert!(forced.ldro);
        let requested =
            BaseBandModulationParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5).with_ldro(true);
        assert!(requested.ldro);
    }

    #[test]
    fn symbol_time() {
        let params = BaseBandModulationParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5);
        assert_eq!(params.symbol_time_us(), 1024);
        let params = BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_125KHz, CodingRate::_4_5);
        assert_eq!(params.symbol_time_us(), 32768);
    }

    #[test]
    fn bandwidth_in_hz() {
        assert_eq!(u32::from(Bandwidth::_7KHz), 7810);
        assert_eq!(u32::from(Bandwidth::_500KHz), 500_000);
        assert_eq!(u32::from(SpreadingFactor::_9), 9);
        assert_eq!(CodingRate::_4_8.denominator(), 8);
    }
}
