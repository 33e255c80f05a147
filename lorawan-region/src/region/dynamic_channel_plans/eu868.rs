//! EU868 region support (863..870 MHz)
//!
//! Datarates DR0..DR7 are supported: LoRa SF12..SF7 at 125 kHz, SF7 at 250 kHz and FSK at
//! 50 kbps. The LR-FHSS datarates are not.
use super::*;

/// Max EIRP of the band, 16 dBm, in centi-dBm.
const MAX_EIRP: i16 = 1600;
/// centi-dBi
const ANTENNA_GAIN: i16 = 215;

pub type EU868 = DynamicChannelPlan<EU868Region>;

#[derive(Default, Clone)]
#[allow(clippy::upper_case_acronyms)]
pub struct EU868Region;

const DEFAULT_CHANNEL_DATARATES: DataRateRange = DataRateRange::new_range(DR::_0, DR::_5);

impl DynamicChannelRegion for EU868Region {
    const NUM_DEFAULT_CHANNELS: u8 = 3;
    const TX_MIN_DR: DR = DR::_0;
    const TX_MAX_DR: DR = DR::_7;
    const RX_MIN_DR: DR = DR::_0;
    const RX_MAX_DR: DR = DR::_7;
    const DEFAULT_DR: DR = DR::_0;
    const DEFAULT_CHANNEL_MIN_MAX_DR: DR = DR::_5;
    const MIN_TX_POWER: u8 = 7;
    const MAX_TX_POWER: u8 = 0;
    const DEFAULT_TX_POWER: u8 = 0;
    const MAX_RX1_DR_OFFSET: u8 = 5;
    const DEFAULT_RX2_FREQ: u32 = 869_525_000;
    const DEFAULT_RX2_DR: DR = DR::_0;
    const DEFAULT_MAX_EIRP: i16 = MAX_EIRP;
    const DEFAULT_ANTENNA_GAIN: i16 = ANTENNA_GAIN;
    const DUTY_CYCLE_ENABLED: bool = true;
    const BEACON_FREQ: u32 = 869_525_000;
    const BEACON_DR: DR = DR::_3;
    const BEACON_FORMAT: (u8, u8, u8) = (17, 2, 0);
    const PING_SLOT_FREQ: u32 = 869_525_000;
    const PING_SLOT_DR: DR = DR::_3;
    const BANDS: [Band; NUM_BANDS] = [
        // 865.0 - 868.0 MHz, 1%
        Band::new(100, 0),
        // 868.0 - 868.6 MHz, 1%
        Band::new(100, 0),
        // 868.7 - 869.2 MHz, 0.1%
        Band::new(1000, 0),
        // 869.4 - 869.65 MHz, 10%
        Band::new(10, 0),
        // 869.7 - 870.0 MHz, 1%
        Band::new(100, 0),
        // 863.0 - 865.0 MHz, 0.1%
        Band::new(1000, 0),
    ];

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES] {
        &DATARATES
    }

    fn init_channels(channels: &mut ChannelPlan) {
        channels[0] = Some(Channel::new(868_100_000, DEFAULT_CHANNEL_DATARATES));
        channels[1] = Some(Channel::new(868_300_000, DEFAULT_CHANNEL_DATARATES));
        channels[2] = Some(Channel::new(868_500_000, DEFAULT_CHANNEL_DATARATES));
    }

    fn band_of(frequency: u32) -> Option<u8> {
        match frequency {
            863_000_000..=864_999_999 => Some(5),
            865_000_000..=868_000_000 => Some(0),
            868_000_001..=868_600_000 => Some(1),
            868_700_000..=869_200_000 => Some(2),
            869_400_000..=869_650_000 => Some(3),
            869_700_000..=870_000_000 => Some(4),
            _ => None,
        }
    }
}

const fn lora(
    spreading_factor: SpreadingFactor,
    bandwidth: Bandwidth,
    max_app_payload: u8,
    max_app_payload_repeater: u8,
) -> Option<Datarate> {
    Some(Datarate {
        phy: Phy::LoRa { spreading_factor, bandwidth },
        max_app_payload,
        max_app_payload_repeater,
    })
}

pub(crate) const DATARATES: [Option<Datarate>; NUM_DATARATES] = [
    // DR0
    lora(SpreadingFactor::_12, Bandwidth::_125KHz, 51, 51),
    // DR1
    lora(SpreadingFactor::_11, Bandwidth::_125KHz, 51, 51),
    // DR2
    lora(SpreadingFactor::_10, Bandwidth::_125KHz, 51, 51),
    // DR3
    lora(SpreadingFactor::_9, Bandwidth::_125KHz, 115, 115),
    // DR4
    lora(SpreadingFactor::_8, Bandwidth::_125KHz, 242, 222),
    // DR5
    lora(SpreadingFactor::_7, Bandwidth::_125KHz, 242, 222),
    // DR6
    lora(SpreadingFactor::_7, Bandwidth::_250KHz, 242, 222),
    // DR7: FSK 50 kbps
    Some(Datarate {
        phy: Phy::Fsk { bitrate_kbps: 50 },
        max_app_payload: 242,
        max_app_payload_repeater: 222,
    }),
    // DR8..DR11: LR-FHSS
    None,
    None,
    None,
    None,
    // DR12..DR15: RFU
    None,
    None,
    None,
    None,
];
