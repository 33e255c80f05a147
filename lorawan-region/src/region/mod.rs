//! LoRaWAN regional channel plans (eg: EU868).
use lora_modulation::{Bandwidth, SpreadingFactor};
use rand_core::RngCore;

use crate::maccommands::{
    DlChannelReqPayload, NewChannelReqPayload, RxParamSetupReqPayload, TxParamSetupReqPayload,
};
use crate::radio::{RxConfig, TxConfig};
use crate::types::ChannelMask;

pub mod common;
pub(crate) mod constants;

#[cfg(not(any(feature = "region-eu868")))]
compile_error!("You must enable at least one region! eg: `region-eu868`");

mod dynamic_channel_plans;
pub use dynamic_channel_plans::{Band, Channel, DynamicChannelPlan, DynamicChannelRegion, RegionNvm};
#[cfg(feature = "region-eu868")]
pub use dynamic_channel_plans::{EU868Region, EU868};

seq_macro::seq!(
    N in 0..=15 {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(u8)]
        /// A restricted data rate type that exposes the number of variants to only what _may_ be
        /// potentially be possible. Note that not all data rates are valid in all regions.
        pub enum DR {
            #(
                _~N = N,
            )*
        }

        impl TryFrom<u8> for DR {
            type Error = RegionError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    #(
                        N => Ok(DR::_~N),
                    )*
                    _ => Err(RegionError::DatarateOutOfRange(value)),
                }
            }
        }
    }
);

/// Number of datarate slots a region can define.
pub const NUM_DATARATES: usize = 16;

/// Physical layer of a datarate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Phy {
    LoRa { spreading_factor: SpreadingFactor, bandwidth: Bandwidth },
    Fsk { bitrate_kbps: u8 },
}

/// This datarate type is used internally for defining modulation and payload limits per region
#[derive(Debug, Clone)]
pub struct Datarate {
    pub(crate) phy: Phy,
    /// Largest application payload (N)
    pub(crate) max_app_payload: u8,
    /// Largest application payload when a repeater may be on the path
    pub(crate) max_app_payload_repeater: u8,
}

impl Datarate {
    pub fn phy(&self) -> Phy {
        self.phy
    }

    pub fn max_app_payload(&self, repeater_compatible: bool) -> u8 {
        if repeater_compatible {
            self.max_app_payload_repeater
        } else {
            self.max_app_payload
        }
    }
}

/// Region parameters that can be queried with [`RegionHandler::get_phy_param`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PhyAttribute {
    MinRxDr,
    MaxRxDr,
    MinTxDr,
    MaxTxDr,
    DefTxDr,
    /// The next lower datarate supported by an enabled channel.
    NextLowerTxDr(DR),
    /// Index of the lowest power.
    MinTxPower,
    /// Index of the highest power.
    MaxTxPower,
    DefTxPower,
    DefAdrAckLimit,
    DefAdrAckDelay,
    MaxPayload(DR),
    MaxPayloadRepeater(DR),
    DutyCycle,
    MaxRxWindow,
    ReceiveDelay1,
    ReceiveDelay2,
    JoinAcceptDelay1,
    JoinAcceptDelay2,
    MaxFcntGap,
    AckTimeout,
    AckTimeoutRnd,
    DefDr1Offset,
    DefRx2Frequency,
    DefRx2Dr,
    ChannelsMask,
    ChannelsDefaultMask,
    MaxNbChannels,
    DefUplinkDwellTime,
    DefDownlinkDwellTime,
    /// Maximum EIRP in centi-dBm.
    DefMaxEirp,
    /// Antenna gain in centi-dBi.
    DefAntennaGain,
    BeaconInterval,
    BeaconReserved,
    BeaconGuard,
    BeaconWindow,
    BeaconWindowSlots,
    PingSlotWindow,
    BeaconSymbolToDefault,
    BeaconSymbolToExpansionMax,
    PingSlotSymbolToExpansionMax,
    BeaconSymbolToExpansionFactor,
    PingSlotSymbolToExpansionFactor,
    MaxBeaconLessPeriod,
    BeaconChannelFreq,
    BeaconFormat,
    BeaconChannelDr,
    PingSlotChannelFreq,
    PingSlotChannelDr,
    SfFromDr(DR),
    BwFromDr(DR),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum PhyParam {
    Value(u32),
    Signed(i32),
    Datarate(DR),
    Flag(bool),
    ChannelsMask(ChannelMask<2>),
    BeaconFormat { size: u8, rfu1: u8, rfu2: u8 },
    SpreadingFactor(Option<SpreadingFactor>),
    Bandwidth(Option<Bandwidth>),
}

impl PhyParam {
    /// Unsigned value, for the attributes answered with one.
    pub fn value(&self) -> Option<u32> {
        match self {
            PhyParam::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn datarate(&self) -> Option<DR> {
        match self {
            PhyParam::Datarate(dr) => Some(*dr),
            _ => None,
        }
    }
}

/// Values checked with [`RegionHandler::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Verify {
    TxDr(u8),
    DefTxDr(u8),
    RxDr(u8),
    TxPower(u8),
    DefTxPower(u8),
    DutyCycle(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum InitType {
    /// Factory state: default channels, masks and bands.
    Init,
    /// Drop every channel added by the network and restore the default mask.
    RestoreDefaultChannels,
    /// Enable the default channels in the current mask.
    ActivateDefaultChannels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum ChanMaskType {
    ChannelsMask,
    ChannelsDefaultMask,
}

/// Input of [`RegionHandler::next_channel`]. Times are milliseconds on the caller's monotonic
/// clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct NextChanParams {
    /// Aggregated time-off computed from the last transmission. Reset to 0 once it elapsed.
    pub aggr_time_off: u64,
    pub last_aggr_tx: u64,
    pub datarate: DR,
    pub joined: bool,
    pub duty_cycle_enabled: bool,
    pub now: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum NextChannelError {
    /// Every usable channel is blocked by the duty cycle. Retry after `wait_ms`.
    DutyCycleRestricted { wait_ms: u64 },
    /// No enabled channel supports the datarate. The default channels have been re-enabled.
    NoChannelFound,
}

/// State a LinkADRReq is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkAdrReqParams<'a> {
    /// One or more consecutive LinkADRReq commands, CIDs included.
    pub payload: &'a [u8],
    pub adr_enabled: bool,
    pub current_datarate: u8,
    pub current_tx_power: u8,
    pub current_nb_rep: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct LinkAdrReqAnswer {
    /// Bit 0: channel mask ACK, bit 1: datarate ACK, bit 2: power ACK.
    pub status: u8,
    pub datarate: u8,
    pub tx_power: u8,
    pub nb_rep: u8,
    /// Bytes of the payload consumed, CIDs included.
    pub bytes_processed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RxWindowParams {
    /// Window length in symbols.
    pub timeout_symbols: u32,
    /// Window opening relative to the nominal receive delay, in ms.
    pub offset_ms: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum RxSlot {
    Win1,
    Win2,
    ClassC,
    PingSlot,
    Beacon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct RxConfigParams {
    /// Uplink channel the window answers.
    pub channel: u8,
    pub datarate: DR,
    pub window_timeout: u16,
    pub rx_continuous: bool,
    pub rx_slot: RxSlot,
    /// Frequency of every window but RX1.
    pub frequency: u32,
    pub repeater_support: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TxConfigParams {
    pub channel: u8,
    pub datarate: DR,
    pub tx_power: u8,
    /// Maximum EIRP in centi-dBm.
    pub max_eirp: i16,
    /// Antenna gain in centi-dBi.
    pub antenna_gain: i16,
    pub pkt_len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TxConfigResult {
    pub config: TxConfig,
    /// Power index after the band limits.
    pub tx_power: u8,
    pub time_on_air_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct SetBandTxDoneParams {
    pub channel: u8,
    pub joined: bool,
    pub last_tx_done: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct CalcBackOffParams {
    pub channel: u8,
    pub joined: bool,
    pub duty_cycle_enabled: bool,
    pub last_tx_is_join_request: bool,
    pub elapsed_since_startup: u64,
    pub tx_time_on_air: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum RegionError {
    ChannelIdOutOfRange(u8),
    ChannelAbsent(u8),
    DatarateOutOfRange(u8),
    DatarateUnsupported(DR),
    FrequencyInvalid,
    DatarateInvalid,
    FrequencyAndDatarateInvalid,
}

/// Regional behavior the MAC layer relies on. All timing inputs are explicit milliseconds, the
/// region never reads a clock.
pub trait RegionHandler {
    fn get_phy_param(&self, attribute: PhyAttribute) -> PhyParam;

    fn verify(&self, value: Verify) -> bool;

    fn init_defaults(&mut self, init: InitType);

    /// Apply the CFList of a JoinAccept.
    fn apply_cf_list(&mut self, payload: &[u8]);

    fn chan_mask_set(&mut self, mask: ChannelMask<2>, mask_type: ChanMaskType) -> bool;

    /// Pick the channel for the next uplink.
    fn next_channel<RNG: RngCore>(
        &mut self,
        params: &mut NextChanParams,
        rng: &mut RNG,
    ) -> Result<u8, NextChannelError>;

    fn channel_add(&mut self, id: u8, channel: Channel) -> Result<(), RegionError>;

    fn channels_remove(&mut self, id: u8) -> bool;

    fn link_adr_req(&mut self, params: &LinkAdrReqParams<'_>) -> LinkAdrReqAnswer;

    /// Returns the RXParamSetupAns status.
    fn rx_param_setup_req(&self, req: &RxParamSetupReqPayload<'_>) -> u8;

    /// Returns the NewChannelAns status.
    fn new_channel_req(&mut self, req: &NewChannelReqPayload<'_>) -> u8;

    /// Returns the TXParamSetupAns status, `None` when the region does not support the command.
    fn tx_param_setup_req(&mut self, req: &TxParamSetupReqPayload<'_>) -> Option<u8>;

    /// Returns the DlChannelAns status.
    fn dl_channel_req(&mut self, req: &DlChannelReqPayload<'_>) -> u8;

    fn compute_rx_window_parameters(
        &self,
        datarate: DR,
        min_rx_symbols: u8,
        rx_error_ms: u32,
        wakeup_ms: u32,
    ) -> RxWindowParams;

    fn rx_config(&self, params: &RxConfigParams) -> Result<RxConfig, RegionError>;

    fn tx_config(&self, params: &TxConfigParams) -> Result<TxConfigResult, RegionError>;

    fn set_band_tx_done(&mut self, params: &SetBandTxDoneParams);

    fn calc_back_off(&mut self, params: &CalcBackOffParams);

    fn alternate_dr(&self, datarate: DR) -> DR {
        datarate
    }

    /// RX1 datarate for an uplink at `datarate`.
    fn apply_dr_offset(&self, datarate: DR, dr_offset: u8) -> DR;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Regions supported by this crate. Each region is individually feature-gated (eg: `region-eu868`).
pub enum Region {
    #[cfg(feature = "region-eu868")]
    EU868,
}

#[derive(Clone)]
enum State {
    #[cfg(feature = "region-eu868")]
    EU868(EU868),
}

impl State {
    fn new(region: Region) -> State {
        match region {
            #[cfg(feature = "region-eu868")]
            Region::EU868 => State::EU868(EU868::default()),
        }
    }

    fn region(&self) -> Region {
        match self {
            #[cfg(feature = "region-eu868")]
            Self::EU868(_) => Region::EU868,
        }
    }
}

#[derive(Clone)]
/// Regional state of a device, constructed from a [`Region`].
pub struct Configuration {
    state: State,
}

macro_rules! mut_region_dispatch {
  ($s:expr, $t:tt, $($arg:tt)*) => {
      match &mut $s.state {
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t($($arg)*),
    }
  };
}

macro_rules! region_dispatch {
  ($s:expr, $t:tt, $($arg:tt)*) => {
      match &$s.state {
        #[cfg(feature = "region-eu868")]
        State::EU868(state) => state.$t($($arg)*),
    }
  };
}

impl Configuration {
    pub fn new(region: Region) -> Configuration {
        Configuration { state: State::new(region) }
    }

    pub fn region(&self) -> Region {
        self.state.region()
    }

    /// Snapshot of the channel plan for persistence.
    pub fn nvm(&self) -> RegionNvm {
        region_dispatch!(self, nvm,)
    }

    pub fn restore(&mut self, nvm: &RegionNvm) {
        mut_region_dispatch!(self, restore, nvm)
    }
}

impl RegionHandler for Configuration {
    fn get_phy_param(&self, attribute: PhyAttribute) -> PhyParam {
        region_dispatch!(self, get_phy_param, attribute)
    }

    fn verify(&self, value: Verify) -> bool {
        region_dispatch!(self, verify, value)
    }

    fn init_defaults(&mut self, init: InitType) {
        mut_region_dispatch!(self, init_defaults, init)
    }

    fn apply_cf_list(&mut self, payload: &[u8]) {
        mut_region_dispatch!(self, apply_cf_list, payload)
    }

    fn chan_mask_set(&mut self, mask: ChannelMask<2>, mask_type: ChanMaskType) -> bool {
        mut_region_dispatch!(self, chan_mask_set, mask, mask_type)
    }

    fn next_channel<RNG: RngCore>(
        &mut self,
        params: &mut NextChanParams,
        rng: &mut RNG,
    ) -> Result<u8, NextChannelError> {
        mut_region_dispatch!(self, next_channel, params, rng)
    }

    fn channel_add(&mut self, id: u8, channel: Channel) -> Result<(), RegionError> {
        mut_region_dispatch!(self, channel_add, id, channel)
    }

    fn channels_remove(&mut self, id: u8) -> bool {
        mut_region_dispatch!(self, channels_remove, id)
    }

    fn link_adr_req(&mut self, params: &LinkAdrReqParams<'_>) -> LinkAdrReqAnswer {
        mut_region_dispatch!(self, link_adr_req, params)
    }

    fn rx_param_setup_req(&self, req: &RxParamSetupReqPayload<'_>) -> u8 {
        region_dispatch!(self, rx_param_setup_req, req)
    }

    fn new_channel_req(&mut self, req: &NewChannelReqPayload<'_>) -> u8 {
        mut_region_dispatch!(self, new_channel_req, req)
    }

    fn tx_param_setup_req(&mut self, req: &TxParamSetupReqPayload<'_>) -> Option<u8> {
        mut_region_dispatch!(self, tx_param_setup_req, req)
    }

    fn dl_channel_req(&mut self, req: &DlChannelReqPayload<'_>) -> u8 {
        mut_region_dispatch!(self, dl_channel_req, req)
    }

    fn compute_rx_window_parameters(
        &self,
        datarate: DR,
        min_rx_symbols: u8,
        rx_error_ms: u32,
        wakeup_ms: u32,
    ) -> RxWindowParams {
        region_dispatch!(
            self,
            compute_rx_window_parameters,
            datarate,
            min_rx_symbols,
            rx_error_ms,
            wakeup_ms
        )
    }

    fn rx_config(&self, params: &RxConfigParams) -> Result<RxConfig, RegionError> {
        region_dispatch!(self, rx_config, params)
    }

    fn tx_config(&self, params: &TxConfigParams) -> Result<TxConfigResult, RegionError> {
        region_dispatch!(self, tx_config, params)
    }

    fn set_band_tx_done(&mut self, params: &SetBandTxDoneParams) {
        mut_region_dispatch!(self, set_band_tx_done, params)
    }

    fn calc_back_off(&mut self, params: &CalcBackOffParams) {
        mut_region_dispatch!(self, calc_back_off, params)
    }

    fn alternate_dr(&self, datarate: DR) -> DR {
        region_dispatch!(self, alternate_dr, datarate)
    }

    fn apply_dr_offset(&self, datarate: DR, dr_offset: u8) -> DR {
        region_dispatch!(self, apply_dr_offset, datarate, dr_offset)
    }
}

macro_rules! from_region {
    ($r:tt) => {
        impl From<$r> for Configuration {
            fn from(region: $r) -> Configuration {
                Configuration { state: State::$r(region) }
            }
        }
    };
}

#[cfg(feature = "region-eu868")]
from_region!(EU868);

#[cfg(test)]
mod test {
    use super::*;
    use crate::Prng;

    #[test]
    fn configuration_dispatches_to_region() {
        let mut configuration = Configuration::new(Region::EU868);
        assert_eq!(configuration.region(), Region::EU868);
        assert_eq!(configuration.get_phy_param(PhyAttribute::DefRx2Dr).datarate(), Some(DR::_0));

        let payload = [0x03, 0x18, 0x4f, 0x84, 0x50];
        assert_eq!(configuration.new_channel_req(&NewChannelReqPayload::from(&payload)), 0x03);

        let mut params = NextChanParams {
            aggr_time_off: 0,
            last_aggr_tx: 0,
            datarate: DR::_5,
            joined: true,
            duty_cycle_enabled: true,
            now: 0,
        };
        let channel = configuration.next_channel(&mut params, &mut Prng::new(11)).unwrap();
        assert!(channel < 4);

        let nvm = configuration.nvm();
        let mut other = Configuration::from(EU868::default());
        other.restore(&nvm);
        assert_eq!(other.nvm(), nvm);
    }

    #[test]
    fn datarate_from_index() {
        assert_eq!(DR::try_from(7u8), Ok(DR::_7));
        assert_eq!(DR::try_from(16u8), Err(RegionError::DatarateOutOfRange(16)));
        assert!(DR::_3 < DR::_4);
    }
}
