use crate::{ldro_required, BaseBandModulationParams};

/// Framing of a LoRa frame as far as its on-air duration is concerned.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaPacket {
    /// Programmed preamble length in symbols.
    pub preamble_symbols: u16,
    pub implicit_header: bool,
    pub payload_len: u8,
    pub crc_on: bool,
}

/// Framing of a GFSK frame as far as its on-air duration is concerned.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfskPacket {
    pub preamble_bits: u16,
    pub sync_word_bits: u8,
    /// A length byte precedes the payload.
    pub variable_length: bool,
    /// An address byte precedes the payload.
    pub address_filtering: bool,
    pub payload_len: u8,
    /// CRC length in bytes, 0 when the CRC is off.
    pub crc_bytes: u8,
}

/// On-air duration of a GFSK frame in milliseconds, rounded up.
pub fn gfsk_time_on_air(packet: &GfskPacket, bitrate_bps: u32) -> u32 {
    if bitrate_bps == 0 {
        return 0;
    }
    let bits = packet.preamble_bits as u64
        + packet.sync_word_bits as u64
        + if packet.variable_length { 8 } else { 0 }
        + if packet.address_filtering { 8 } else { 0 }
        + ((packet.payload_len as u64 + packet.crc_bytes as u64) << 3);
    (bits * 1000).div_ceil(bitrate_bps as u64) as u32
}

/// On-air duration of a LoRa frame in milliseconds, rounded up.
///
/// Integer only. SF5 and SF6 use the short preamble rules of the chip: the preamble is at least
/// 12 symbols long and the header overhead is two symbols longer. Low data rate optimization is
/// counted whenever the symbol length requires it, whatever `params.ldro` says.
pub fn lora_time_on_air(packet: &LoRaPacket, params: &BaseBandModulationParams) -> u32 {
    let sf = params.sf.factor() as i64;
    let cr = params.cr.denominator() as i64;
    let short_sf = sf <= 6;
    let ldro = params.ldro || ldro_required(params.sf, params.bw);

    let mut preamble = packet.preamble_symbols as i64;
    if short_sf && preamble < 12 {
        preamble = 12;
    }

    let mut numerator = 8 * packet.payload_len as i64 + if packet.crc_on { 16 } else { 0 } - 4 * sf
        + if packet.implicit_header { 0 } else { 20 };
    let denominator = if short_sf {
        4 * sf
    } else {
        numerator += 8;
        4 * (sf - if ldro { 2 } else { 0 })
    };
    let numerator = numerator.max(0);

    let mut symbols = (numerator + denominator - 1) / denominator * cr + preamble + 12;
    if short_sf {
        symbols += 2;
    }

    // quarter symbols, plus the quarter symbol of the sync word
    let time_numerator = ((4 * symbols + 1) as u64) << (sf - 2);
    (time_numerator * 1000).div_ceil(params.bw.hz() as u64) as u32
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Bandwidth, CodingRate, SpreadingFactor};

    fn lorawan_uplink(len: u8) -> LoRaPacket {
        LoRaPacket { preamble_symbols: 8, implicit_header: false, payload_len: len, crc_on: true }
    }

    #[test]
    fn gfsk_empty_frame() {
        let packet = GfskPacket {
            preamble_bits: 40,
            sync_word_bits: 24,
            variable_length: true,
            address_filtering: false,
            payload_len: 0,
            crc_bytes: 2,
        };
        // 88 bits at 50 kbps
        assert_eq!(gfsk_time_on_air(&packet, 50_000), 2);
        assert_eq!(gfsk_time_on_air(&packet, 0), 0);
    }

    #[test]
    fn gfsk_full_frame() {
        let packet = GfskPacket {
            preamble_bits: 40,
            sync_word_bits: 24,
            variable_length: true,
            address_filtering: true,
            payload_len: 255,
            crc_bytes: 2,
        };
        // 40 + 24 + 8 + 8 + 257 * 8 = 2136 bits
        assert_eq!(gfsk_time_on_air(&packet, 50_000), 43);
    }

    #[test]
    fn lora_dr0_thirteen_bytes() {
        let params = BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_125KHz, CodingRate::_4_5);
        assert_eq!(lora_time_on_air(&lorawan_uplink(13), &params), 1156);
        assert_eq!(params.time_on_air_ms(&lorawan_uplink(13)), 1156);
    }

    #[test]
    fn lora_dr5_thirteen_bytes() {
        let params = BaseBandModulationParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5);
        // 8 + ceil(120 / 28) * 5 = 33 payload symbols, 20.25 preamble and header symbols
        assert_eq!(lora_time_on_air(&lorawan_uplink(13), &params), 47);
    }

    #[test]
    fn lora_long_symbols_always_count_ldro() {
        let forced = BaseBandModulationParams::new(SpreadingFactor::_12, Bandwidth::_125KHz, CodingRate::_4_5);
        let literal = BaseBandModulationParams {
            sf: SpreadingFactor::_12,
            bw: Bandwidth::_125KHz,
            cr: CodingRate::_4_5,
            ldro: false,
        };
        assert_eq!(lora_time_on_air(&lorawan_uplink(51), &forced), 2466);
        assert_eq!(lora_time_on_air(&lorawan_uplink(51), &literal), 2466);
    }

    #[test]
    fn lora_short_sf_extends_preamble() {
        let params = BaseBandModulationParams::new(SpreadingFactor::_6, Bandwidth::_125KHz, CodingRate::_4_5);
        let short = LoRaPacket { preamble_symbols: 6, implicit_header: true, payload_len: 10, crc_on: false };
        let twelve = LoRaPacket { preamble_symbols: 12, ..short };
        assert_eq!(lora_time_on_air(&short, &params), lora_time_on_air(&twelve, &params));
    }

    #[test]
    fn lora_duration_never_decreases_with_length() {
        for sf in [SpreadingFactor::_7, SpreadingFactor::_9, SpreadingFactor::_12] {
            for bw in [Bandwidth::_125KHz, Bandwidth::_250KHz, Bandwidth::_500KHz] {
                let params = BaseBandModulationParams::new(sf, bw, CodingRate::_4_5);
                let mut previous = 0;
                for len in 0..=255u8 {
                    let toa = lora_time_on_air(&lorawan_uplink(len), &params);
                    assert!(toa >= previous, "{sf:?} {bw:?} len {len}");
                    previous = toa;
                }
            }
        }
    }

    #[test]
    fn lora_empty_implicit_frame_is_preamble_only() {
        let params = BaseBandModulationParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5);
        let packet = LoRaPacket { preamble_symbols: 8, implicit_header: true, payload_len: 0, crc_on: false };
        // numerator clamps to 0 so only 8 + 12.25 symbols remain
        assert_eq!(lora_time_on_air(&packet, &params), 21);
    }
}
