use super::*;
use core::marker::PhantomData;
use heapless::Vec;
use lora_modulation::{gfsk_time_on_air, GfskPacket, LoRaPacket};

use super::common::{self, LinkAdrVerifyParams};
use super::constants::*;
use crate::maccommands::LinkAdrReqPayload;
use crate::radio::{BaseBandModulationParams, GfskModulation, Modulation, RfConfig, RxMode};
use crate::types::DataRateRange;

#[cfg(feature = "region-eu868")]
mod eu868;
#[cfg(feature = "region-eu868")]
pub use eu868::{EU868Region, EU868};

/// Channels a dynamic plan can hold.
pub const NUM_CHANNELS: usize = 16;
/// Sub-bands with their own duty cycle.
pub const NUM_BANDS: usize = 6;
/// Channels a CFList of type 0 defines.
const NUM_CF_LIST_CHANNELS: usize = 5;
const CF_LIST_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    frequency: u32,
    rx1_frequency: Option<u32>,
    datarates: DataRateRange,
    band: u8,
}

impl Channel {
    /// Uplink channel at `frequency` (Hz) supporting `datarates`. The band is assigned when the
    /// channel is added to a plan.
    pub const fn new(frequency: u32, datarates: DataRateRange) -> Self {
        Self { frequency, rx1_frequency: None, datarates, band: 0 }
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Downlink frequency of the RX1 window, the uplink frequency unless a DlChannelReq moved it.
    pub fn rx1_frequency(&self) -> u32 {
        self.rx1_frequency.unwrap_or(self.frequency)
    }

    pub fn datarates(&self) -> DataRateRange {
        self.datarates
    }

    pub fn band(&self) -> u8 {
        self.band
    }
}

/// A sub-band and its duty-cycle state. Times are ms on the caller's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Band {
    /// Duty cycle denominator: 100 is 1%.
    pub(crate) duty_cycle: u16,
    /// Highest power (lowest index) allowed in the band.
    pub(crate) tx_max_power: u8,
    pub(crate) last_tx_done: u64,
    pub(crate) last_join_tx_done: u64,
    pub(crate) time_off: u64,
}

impl Band {
    pub const fn new(duty_cycle: u16, tx_max_power: u8) -> Self {
        Self { duty_cycle, tx_max_power, last_tx_done: 0, last_join_tx_done: 0, time_off: 0 }
    }

    pub fn duty_cycle(&self) -> u16 {
        self.duty_cycle
    }

    pub fn tx_max_power(&self) -> u8 {
        self.tx_max_power
    }

    /// Time the band stays closed, counted from its last transmission.
    pub fn time_off(&self) -> u64 {
        self.time_off
    }
}

pub type ChannelPlan = [Option<Channel>; NUM_CHANNELS];

/// The part of a channel plan that must survive a reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionNvm {
    pub channels: ChannelPlan,
    pub channels_mask: ChannelMask<2>,
    pub channels_default_mask: ChannelMask<2>,
    pub bands: [Band; NUM_BANDS],
}

/// Constants and tables of a region with a dynamic channel plan.
pub trait DynamicChannelRegion {
    /// The default channels, also the only ones used to join.
    const NUM_DEFAULT_CHANNELS: u8;
    const TX_MIN_DR: DR;
    const TX_MAX_DR: DR;
    const RX_MIN_DR: DR;
    const RX_MAX_DR: DR;
    const DEFAULT_DR: DR;
    /// Lowest max datarate a default channel may be given.
    const DEFAULT_CHANNEL_MIN_MAX_DR: DR;
    /// Index of the lowest power.
    const MIN_TX_POWER: u8;
    /// Index of the highest power.
    const MAX_TX_POWER: u8;
    const DEFAULT_TX_POWER: u8;
    const MAX_RX1_DR_OFFSET: u8;
    const DEFAULT_RX2_FREQ: u32;
    const DEFAULT_RX2_DR: DR;
    /// centi-dBm
    const DEFAULT_MAX_EIRP: i16;
    /// centi-dBi
    const DEFAULT_ANTENNA_GAIN: i16;
    const DUTY_CYCLE_ENABLED: bool;
    const BEACON_FREQ: u32;
    const BEACON_DR: DR;
    /// Beacon size, then the lengths of its two RFU fields.
    const BEACON_FORMAT: (u8, u8, u8);
    const PING_SLOT_FREQ: u32;
    const PING_SLOT_DR: DR;
    const BANDS: [Band; NUM_BANDS];

    fn datarates() -> &'static [Option<Datarate>; NUM_DATARATES];

    fn init_channels(channels: &mut ChannelPlan);

    /// The band `frequency` belongs to, `None` if the region does not allow it.
    fn band_of(frequency: u32) -> Option<u8>;
}

#[derive(Clone)]
pub struct DynamicChannelPlan<R: DynamicChannelRegion> {
    channels: ChannelPlan,
    channel_mask: ChannelMask<2>,
    channel_default_mask: ChannelMask<2>,
    bands: [Band; NUM_BANDS],
    _dynamic_channel_region: PhantomData<R>,
}

impl<R: DynamicChannelRegion> Default for DynamicChannelPlan<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DynamicChannelRegion> DynamicChannelPlan<R> {
    pub fn new() -> Self {
        let mut plan = Self {
            channels: [None; NUM_CHANNELS],
            channel_mask: ChannelMask::empty(),
            channel_default_mask: ChannelMask::empty(),
            bands: R::BANDS,
            _dynamic_channel_region: Default::default(),
        };
        plan.init_defaults(InitType::Init);
        plan
    }

    pub fn channel(&self, id: u8) -> Option<&Channel> {
        self.channels.get(id as usize).and_then(Option::as_ref)
    }

    pub fn channels_mask(&self) -> ChannelMask<2> {
        self.channel_mask
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn nvm(&self) -> RegionNvm {
        RegionNvm {
            channels: self.channels,
            channels_mask: self.channel_mask,
            channels_default_mask: self.channel_default_mask,
            bands: self.bands,
        }
    }

    pub fn restore(&mut self, nvm: &RegionNvm) {
        self.channels = nvm.channels;
        self.channel_mask = nvm.channels_mask;
        self.channel_default_mask = nvm.channels_default_mask;
        self.bands = nvm.bands;
    }

    fn default_channels_mask() -> ChannelMask<2> {
        let mut mask = ChannelMask::empty();
        for i in 0..R::NUM_DEFAULT_CHANNELS as usize {
            mask.set_channel(i, true);
        }
        mask
    }

    fn datarate(dr: DR) -> Option<&'static Datarate> {
        R::datarates()[dr as usize].as_ref()
    }

    fn init_default_channels(&mut self) {
        R::init_channels(&mut self.channels);
        for channel in self.channels.iter_mut().take(R::NUM_DEFAULT_CHANNELS as usize).flatten() {
            channel.band = R::band_of(channel.frequency).unwrap_or_default();
        }
    }

    /// Collect the channels usable for an uplink at `datarate` and return how many more were
    /// only held back by their band's time-off.
    fn enabled_channels(
        &self,
        joined: bool,
        datarate: DR,
        enabled: &mut Vec<u8, NUM_CHANNELS>,
    ) -> usize {
        let mut delay_tx = 0;
        for (i, slot) in self.channels.iter().enumerate() {
            if !self.channel_mask.is_enabled(i) {
                continue;
            }
            let Some(channel) = slot else {
                continue;
            };
            if !joined && i >= R::NUM_DEFAULT_CHANNELS as usize {
                continue;
            }
            if !channel.datarates.contains(datarate as u8) {
                continue;
            }
            if self.bands.get(channel.band as usize).is_some_and(|band| band.time_off > 0) {
                delay_tx += 1;
                continue;
            }
            // one slot per channel, cannot overflow
            let _ = enabled.push(i as u8);
        }
        delay_tx
    }

    fn fsk_modulation(bitrate_kbps: u8) -> GfskModulation {
        GfskModulation {
            bitrate_bps: bitrate_kbps as u32 * 1000,
            fdev_hz: 25_000,
            bandwidth_hz: 50_000,
            afc_bandwidth_hz: 83_333,
        }
    }
}

impl<R: DynamicChannelRegion> RegionHandler for DynamicChannelPlan<R> {
    fn get_phy_param(&self, attribute: PhyAttribute) -> PhyParam {
        use PhyAttribute::*;
        match attribute {
            MinRxDr => PhyParam::Datarate(R::RX_MIN_DR),
            MaxRxDr => PhyParam::Datarate(R::RX_MAX_DR),
            MinTxDr => PhyParam::Datarate(R::TX_MIN_DR),
            MaxTxDr => PhyParam::Datarate(R::TX_MAX_DR),
            DefTxDr => PhyParam::Datarate(R::DEFAULT_DR),
            NextLowerTxDr(dr) => {
                let next = common::get_next_lower_tx_dr(
                    dr as u8,
                    R::TX_MIN_DR as u8,
                    R::TX_MAX_DR as u8,
                    &self.channel_mask,
                    &self.channels,
                );
                PhyParam::Datarate(DR::try_from(next).unwrap_or(R::TX_MIN_DR))
            }
            MinTxPower => PhyParam::Value(R::MIN_TX_POWER as u32),
            MaxTxPower => PhyParam::Value(R::MAX_TX_POWER as u32),
            DefTxPower => PhyParam::Value(R::DEFAULT_TX_POWER as u32),
            DefAdrAckLimit => PhyParam::Value(ADR_ACK_LIMIT),
            DefAdrAckDelay => PhyParam::Value(ADR_ACK_DELAY),
            MaxPayload(dr) => PhyParam::Value(
                Self::datarate(dr).map_or(0, |d| d.max_app_payload(false) as u32),
            ),
            MaxPayloadRepeater(dr) => PhyParam::Value(
                Self::datarate(dr).map_or(0, |d| d.max_app_payload(true) as u32),
            ),
            DutyCycle => PhyParam::Flag(R::DUTY_CYCLE_ENABLED),
            MaxRxWindow => PhyParam::Value(MAX_RX_WINDOW),
            ReceiveDelay1 => PhyParam::Value(RECEIVE_DELAY1),
            ReceiveDelay2 => PhyParam::Value(RECEIVE_DELAY2),
            JoinAcceptDelay1 => PhyParam::Value(JOIN_ACCEPT_DELAY1),
            JoinAcceptDelay2 => PhyParam::Value(JOIN_ACCEPT_DELAY2),
            MaxFcntGap => PhyParam::Value(MAX_FCNT_GAP),
            AckTimeout => PhyParam::Value(ACK_TIMEOUT),
            AckTimeoutRnd => PhyParam::Value(ACK_TIMEOUT_RND),
            DefDr1Offset => PhyParam::Value(0),
            DefRx2Frequency => PhyParam::Value(R::DEFAULT_RX2_FREQ),
            DefRx2Dr => PhyParam::Datarate(R::DEFAULT_RX2_DR),
            ChannelsMask => PhyParam::ChannelsMask(self.channel_mask),
            ChannelsDefaultMask => PhyParam::ChannelsMask(self.channel_default_mask),
            MaxNbChannels => PhyParam::Value(NUM_CHANNELS as u32),
            DefUplinkDwellTime | DefDownlinkDwellTime => PhyParam::Flag(false),
            DefMaxEirp => PhyParam::Signed(R::DEFAULT_MAX_EIRP as i32),
            DefAntennaGain => PhyParam::Signed(R::DEFAULT_ANTENNA_GAIN as i32),
            BeaconInterval => PhyParam::Value(BEACON_INTERVAL),
            BeaconReserved => PhyParam::Value(BEACON_RESERVED),
            BeaconGuard => PhyParam::Value(BEACON_GUARD),
            BeaconWindow => PhyParam::Value(BEACON_WINDOW),
            BeaconWindowSlots => PhyParam::Value(BEACON_WINDOW_SLOTS),
            PingSlotWindow => PhyParam::Value(PING_SLOT_WINDOW),
            BeaconSymbolToDefault => PhyParam::Value(BEACON_SYMBOL_TO_DEFAULT),
            BeaconSymbolToExpansionMax => PhyParam::Value(BEACON_SYMBOL_TO_EXPANSION_MAX),
            PingSlotSymbolToExpansionMax => PhyParam::Value(PING_SLOT_SYMBOL_TO_EXPANSION_MAX),
            BeaconSymbolToExpansionFactor => PhyParam::Value(BEACON_SYMBOL_TO_EXPANSION_FACTOR),
            PingSlotSymbolToExpansionFactor => {
                PhyParam::Value(PING_SLOT_SYMBOL_TO_EXPANSION_FACTOR)
            }
            MaxBeaconLessPeriod => PhyParam::Value(MAX_BEACON_LESS_PERIOD),
            BeaconChannelFreq => PhyParam::Value(R::BEACON_FREQ),
            BeaconFormat => {
                let (size, rfu1, rfu2) = R::BEACON_FORMAT;
                PhyParam::BeaconFormat { size, rfu1, rfu2 }
            }
            BeaconChannelDr => PhyParam::Datarate(R::BEACON_DR),
            PingSlotChannelFreq => PhyParam::Value(R::PING_SLOT_FREQ),
            PingSlotChannelDr => PhyParam::Datarate(R::PING_SLOT_DR),
            SfFromDr(dr) => PhyParam::SpreadingFactor(Self::datarate(dr).and_then(|d| match d.phy {
                Phy::LoRa { spreading_factor, .. } => Some(spreading_factor),
                Phy::Fsk { .. } => None,
            })),
            BwFromDr(dr) => PhyParam::Bandwidth(Self::datarate(dr).and_then(|d| match d.phy {
                Phy::LoRa { bandwidth, .. } => Some(bandwidth),
                Phy::Fsk { .. } => None,
            })),
        }
    }

    fn verify(&self, value: Verify) -> bool {
        match value {
            Verify::TxDr(dr) => common::value_in_range(dr, R::TX_MIN_DR as u8, R::TX_MAX_DR as u8),
            Verify::DefTxDr(dr) => {
                common::value_in_range(dr, R::TX_MIN_DR as u8, R::DEFAULT_CHANNEL_MIN_MAX_DR as u8)
            }
            Verify::RxDr(dr) => common::value_in_range(dr, R::RX_MIN_DR as u8, R::RX_MAX_DR as u8),
            Verify::TxPower(power) | Verify::DefTxPower(power) => {
                common::value_in_range(power, R::MAX_TX_POWER, R::MIN_TX_POWER)
            }
            // the regulation mandates it
            Verify::DutyCycle(_) => R::DUTY_CYCLE_ENABLED,
        }
    }

    fn init_defaults(&mut self, init: InitType) {
        match init {
            InitType::Init => {
                self.bands = R::BANDS;
                self.channels = [None; NUM_CHANNELS];
                self.init_default_channels();
                self.channel_default_mask = Self::default_channels_mask();
                self.channel_mask = self.channel_default_mask;
            }
            InitType::RestoreDefaultChannels => {
                for channel in self.channels.iter_mut().skip(R::NUM_DEFAULT_CHANNELS as usize) {
                    *channel = None;
                }
                self.init_default_channels();
                self.channel_mask = self.channel_default_mask;
            }
            InitType::ActivateDefaultChannels => {
                self.channel_mask.union_with(&self.channel_default_mask);
            }
        }
    }

    fn apply_cf_list(&mut self, payload: &[u8]) {
        // only type 0 (frequency list) applies to a dynamic plan
        if payload.len() != CF_LIST_LEN || payload[CF_LIST_LEN - 1] != 0 {
            debug!("CFList ignored");
            return;
        }
        let first = R::NUM_DEFAULT_CHANNELS as usize;
        for id in first..NUM_CHANNELS {
            let n = id - first;
            let frequency = if n < NUM_CF_LIST_CHANNELS {
                let f = &payload[n * 3..n * 3 + 3];
                u32::from_le_bytes([f[0], f[1], f[2], 0]) * 100
            } else {
                0
            };
            if frequency != 0 {
                let channel = Channel::new(frequency, DataRateRange::new_range(DR::_0, DR::_5));
                if let Err(e) = self.channel_add(id as u8, channel) {
                    warn!("CFList channel {} rejected: {:?}", id, e);
                }
            } else {
                self.channels_remove(id as u8);
            }
        }
    }

    fn chan_mask_set(&mut self, mask: ChannelMask<2>, mask_type: ChanMaskType) -> bool {
        match mask_type {
            ChanMaskType::ChannelsMask => self.channel_mask = mask,
            ChanMaskType::ChannelsDefaultMask => self.channel_default_mask = mask,
        }
        true
    }

    fn next_channel<RNG: RngCore>(
        &mut self,
        params: &mut NextChanParams,
        rng: &mut RNG,
    ) -> Result<u8, NextChannelError> {
        if common::count_channels(&self.channel_mask, 0, 2) == 0 {
            self.channel_mask.union_with(&Self::default_channels_mask());
        }

        let mut enabled = Vec::<u8, NUM_CHANNELS>::new();
        let mut delay_tx = 0;
        let next_tx_delay;
        let elapsed = params.now.saturating_sub(params.last_aggr_tx);
        if params.aggr_time_off <= elapsed {
            params.aggr_time_off = 0;
            next_tx_delay = common::update_band_time_off(
                params.joined,
                params.duty_cycle_enabled,
                &mut self.bands,
                params.now,
            );
            delay_tx = self.enabled_channels(params.joined, params.datarate, &mut enabled);
        } else {
            delay_tx += 1;
            next_tx_delay = params.aggr_time_off - elapsed;
        }

        if !enabled.is_empty() {
            let pick = rng.next_u32() as usize % enabled.len();
            trace!("channel {} of {} usable", enabled[pick], enabled.len());
            Ok(enabled[pick])
        } else if delay_tx > 0 {
            debug!("duty cycle restricted for {} ms", next_tx_delay);
            Err(NextChannelError::DutyCycleRestricted { wait_ms: next_tx_delay })
        } else {
            self.channel_mask.union_with(&Self::default_channels_mask());
            warn!("no channel supports {:?}, default channels re-enabled", params.datarate);
            Err(NextChannelError::NoChannelFound)
        }
    }

    fn channel_add(&mut self, id: u8, channel: Channel) -> Result<(), RegionError> {
        let index = id as usize;
        if index >= NUM_CHANNELS {
            return Err(RegionError::ChannelIdOutOfRange(id));
        }
        let min = channel.datarates.min_data_rate();
        let max = channel.datarates.max_data_rate();
        let (tx_min, tx_max) = (R::TX_MIN_DR as u8, R::TX_MAX_DR as u8);

        let mut dr_invalid = !common::value_in_range(min, tx_min, tx_max)
            || !common::value_in_range(max, tx_min, tx_max)
            || min > max;
        let mut freq_invalid = false;

        if id < R::NUM_DEFAULT_CHANNELS {
            if min > tx_min
                || !common::value_in_range(max, R::DEFAULT_CHANNEL_MIN_MAX_DR as u8, tx_max)
            {
                dr_invalid = true;
            }
            // default channels keep their frequency
            if self.channels[index].map(|c| c.frequency) != Some(channel.frequency) {
                freq_invalid = true;
            }
        }

        let band = if freq_invalid { None } else { R::band_of(channel.frequency) };
        match (dr_invalid, band) {
            (true, None) => Err(RegionError::FrequencyAndDatarateInvalid),
            (true, Some(_)) => Err(RegionError::DatarateInvalid),
            (false, None) => Err(RegionError::FrequencyInvalid),
            (false, Some(band)) => {
                self.channels[index] = Some(Channel { band, ..channel });
                self.channel_mask.set_channel(index, true);
                Ok(())
            }
        }
    }

    fn channels_remove(&mut self, id: u8) -> bool {
        if id < R::NUM_DEFAULT_CHANNELS || id as usize >= NUM_CHANNELS {
            return false;
        }
        self.channels[id as usize] = None;
        common::chan_disable(&mut self.channel_mask, id, NUM_CHANNELS as u8)
    }

    fn link_adr_req(&mut self, params: &LinkAdrReqParams<'_>) -> LinkAdrReqAnswer {
        let mut status = 0;
        let mut bytes_processed = 0;
        let mut channels_mask = ChannelMask::empty();
        let (mut datarate, mut tx_power, mut nb_rep) =
            (params.current_datarate, params.current_tx_power, params.current_nb_rep);

        // consecutive blocks form one request, the last block carries the settings
        while bytes_processed < params.payload.len() {
            let Some(req) = common::parse_link_adr_req(&params.payload[bytes_processed..]) else {
                break;
            };
            bytes_processed += LinkAdrReqPayload::len() + 1;
            status = 0x07;
            datarate = req.data_rate();
            tx_power = req.tx_power();
            nb_rep = req.redundancy().number_of_transmissions();
            channels_mask = req.channel_mask();

            let ctrl = req.redundancy().channel_mask_control();
            if ctrl == 0 && channels_mask.count_enabled() == 0 {
                status &= !common::STATUS_CHANNEL_MASK_ACK;
            } else if (1..=5).contains(&ctrl) || ctrl >= 7 {
                status &= !common::STATUS_CHANNEL_MASK_ACK;
            } else {
                for (i, channel) in self.channels.iter().enumerate() {
                    if ctrl == 6 {
                        if channel.is_some() {
                            channels_mask.set_channel(i, true);
                        }
                    } else if channels_mask.is_enabled(i) && channel.is_none() {
                        status &= !common::STATUS_CHANNEL_MASK_ACK;
                    }
                }
            }
        }

        if bytes_processed == 0 {
            warn!("LinkADRReq payload holds no request");
            return LinkAdrReqAnswer { status, datarate, tx_power, nb_rep, bytes_processed };
        }

        let verified = common::link_adr_req_verify_params(&LinkAdrVerifyParams {
            status,
            adr_enabled: params.adr_enabled,
            datarate,
            tx_power,
            nb_rep,
            current_datarate: params.current_datarate,
            current_tx_power: params.current_tx_power,
            current_nb_rep: params.current_nb_rep,
            channels_mask: &channels_mask,
            channels: &self.channels,
            min_dr: R::TX_MIN_DR as u8,
            max_dr: R::TX_MAX_DR as u8,
            min_tx_power: R::MIN_TX_POWER,
            max_tx_power: R::MAX_TX_POWER,
        });

        if verified.status == 0x07 {
            self.channel_mask = channels_mask;
        } else {
            debug!("LinkADRReq refused: {:#x}", verified.status);
        }
        LinkAdrReqAnswer { bytes_processed, ..verified }
    }

    fn rx_param_setup_req(&self, req: &RxParamSetupReqPayload<'_>) -> u8 {
        let mut status = 0x07;
        let dl_settings = req.dl_settings();
        if R::band_of(req.frequency().value()).is_none() {
            status &= 0xfe;
        }
        if !common::value_in_range(
            dl_settings.rx2_data_rate(),
            R::RX_MIN_DR as u8,
            R::RX_MAX_DR as u8,
        ) {
            status &= 0xfd;
        }
        if dl_settings.rx1_dr_offset() > R::MAX_RX1_DR_OFFSET {
            status &= 0xfb;
        }
        status
    }

    fn new_channel_req(&mut self, req: &NewChannelReqPayload<'_>) -> u8 {
        let mut status = 0x03;
        let id = req.channel_index();
        let frequency = req.frequency().value();

        if frequency == 0 {
            if !self.channels_remove(id) {
                status &= 0xfc;
            }
        } else {
            match self.channel_add(id, Channel::new(frequency, req.data_rate_range())) {
                Ok(()) => {}
                Err(RegionError::FrequencyInvalid) => status &= 0xfe,
                Err(RegionError::DatarateInvalid) => status &= 0xfd,
                Err(_) => status &= 0xfc,
            }
        }
        status
    }

    fn tx_param_setup_req(&mut self, _req: &TxParamSetupReqPayload<'_>) -> Option<u8> {
        None
    }

    fn dl_channel_req(&mut self, req: &DlChannelReqPayload<'_>) -> u8 {
        let index = req.channel_index() as usize;
        if index >= NUM_CHANNELS {
            return 0;
        }
        let frequency = req.frequency().value();
        let mut status = 0x03;
        if R::band_of(frequency).is_none() {
            status &= 0xfe;
        }
        if self.channels[index].is_none() {
            status &= 0xfd;
        }
        if status == 0x03 {
            if let Some(channel) = self.channels[index].as_mut() {
                channel.rx1_frequency = Some(frequency);
            }
        }
        status
    }

    fn compute_rx_window_parameters(
        &self,
        datarate: DR,
        min_rx_symbols: u8,
        rx_error_ms: u32,
        wakeup_ms: u32,
    ) -> RxWindowParams {
        let datarate = datarate.min(R::RX_MAX_DR);
        let t_symbol_us = match Self::datarate(datarate).map(Datarate::phy) {
            Some(Phy::LoRa { spreading_factor, bandwidth }) => {
                common::compute_symbol_time_lora(spreading_factor.factor(), bandwidth.hz())
            }
            Some(Phy::Fsk { bitrate_kbps }) => common::compute_symbol_time_fsk(bitrate_kbps),
            None => 0,
        };
        common::compute_rx_window_parameters(t_symbol_us, min_rx_symbols, rx_error_ms, wakeup_ms)
    }

    fn rx_config(&self, params: &RxConfigParams) -> Result<RxConfig, RegionError> {
        let datarate = Self::datarate(params.datarate)
            .filter(|_| params.datarate <= R::RX_MAX_DR)
            .ok_or(RegionError::DatarateUnsupported(params.datarate))?;
        let frequency = match params.rx_slot {
            RxSlot::Win1 => self
                .channel(params.channel)
                .ok_or(RegionError::ChannelAbsent(params.channel))?
                .rx1_frequency(),
            _ => params.frequency,
        };
        let mode = if params.rx_continuous {
            RxMode::Continuous
        } else {
            RxMode::Single { symbol_timeout: params.window_timeout }
        };
        let max_payload_len =
            datarate.max_app_payload(params.repeater_support).saturating_add(FRMPAYLOAD_OVERHEAD);

        let config = match datarate.phy {
            Phy::LoRa { spreading_factor, bandwidth } => RxConfig {
                rf: RfConfig {
                    frequency,
                    modulation: Modulation::LoRa(BaseBandModulationParams::new(
                        spreading_factor,
                        bandwidth,
                        DEFAULT_CODING_RATE,
                    )),
                },
                mode,
                preamble_len: LORA_PREAMBLE_SYMBOLS,
                max_payload_len,
                crc_on: false,
                iq_inverted: true,
            },
            Phy::Fsk { bitrate_kbps } => RxConfig {
                rf: RfConfig {
                    frequency,
                    modulation: Modulation::Gfsk(Self::fsk_modulation(bitrate_kbps)),
                },
                mode,
                preamble_len: GFSK_PREAMBLE_BYTES,
                max_payload_len,
                crc_on: true,
                iq_inverted: false,
            },
        };
        debug!("RX on {} Hz, {:?}", frequency, params.datarate);
        Ok(config)
    }

    fn tx_config(&self, params: &TxConfigParams) -> Result<TxConfigResult, RegionError> {
        let channel = self.channel(params.channel).ok_or(RegionError::ChannelAbsent(params.channel))?;
        let datarate = Self::datarate(params.datarate)
            .filter(|_| params.datarate <= R::TX_MAX_DR)
            .ok_or(RegionError::DatarateUnsupported(params.datarate))?;

        let band_max_power =
            self.bands.get(channel.band as usize).map_or(R::MAX_TX_POWER, |b| b.tx_max_power);
        let tx_power = common::limit_tx_power(params.tx_power, band_max_power);
        let pw = common::compute_tx_power(tx_power, params.max_eirp, params.antenna_gain);

        let (modulation, preamble_len, time_on_air_ms) = match datarate.phy {
            Phy::LoRa { spreading_factor, bandwidth } => {
                let modulation =
                    BaseBandModulationParams::new(spreading_factor, bandwidth, DEFAULT_CODING_RATE);
                let toa = modulation.time_on_air_ms(&LoRaPacket {
                    preamble_symbols: LORA_PREAMBLE_SYMBOLS,
                    implicit_header: false,
                    payload_len: params.pkt_len,
                    crc_on: true,
                });
                (Modulation::LoRa(modulation), LORA_PREAMBLE_SYMBOLS, toa)
            }
            Phy::Fsk { bitrate_kbps } => {
                let modulation = Self::fsk_modulation(bitrate_kbps);
                let toa = gfsk_time_on_air(
                    &GfskPacket {
                        preamble_bits: GFSK_PREAMBLE_BYTES * 8,
                        sync_word_bits: GFSK_SYNC_WORD_BITS,
                        variable_length: true,
                        address_filtering: false,
                        payload_len: params.pkt_len,
                        crc_bytes: 2,
                    },
                    modulation.bitrate_bps,
                );
                (Modulation::Gfsk(modulation), GFSK_PREAMBLE_BYTES, toa)
            }
        };

        Ok(TxConfigResult {
            config: TxConfig {
                pw,
                rf: RfConfig { frequency: channel.frequency, modulation },
                preamble_len,
                crc_on: true,
                payload_len: params.pkt_len,
                timeout_ms: TX_TIMEOUT_MS,
            },
            tx_power,
            time_on_air_ms,
        })
    }

    fn set_band_tx_done(&mut self, params: &SetBandTxDoneParams) {
        let Some(band) = self.channel(params.channel).map(|c| c.band as usize) else {
            warn!("TX done on unknown channel {}", params.channel);
            return;
        };
        if let Some(band) = self.bands.get_mut(band) {
            common::set_band_tx_done(params.joined, band, params.last_tx_done);
        }
    }

    fn calc_back_off(&mut self, params: &CalcBackOffParams) {
        let Some(band) = self.channel(params.channel).map(|c| c.band as usize) else {
            warn!("back-off for unknown channel {}", params.channel);
            return;
        };
        if let Some(band) = self.bands.get_mut(band) {
            common::calc_back_off(band, params);
        }
    }

    fn apply_dr_offset(&self, datarate: DR, dr_offset: u8) -> DR {
        let dr = (datarate as u8).saturating_sub(dr_offset).max(R::RX_MIN_DR as u8);
        DR::try_from(dr).unwrap_or(R::RX_MIN_DR)
    }
}
