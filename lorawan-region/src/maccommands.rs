//! Views over the downlink MAC commands whose handling depends on the regional channel plan.
//!
//! Each payload wraps the bytes following the command identifier (CID).
use crate::types::{ChannelMask, DLSettings, DataRateRange, Frequency, Redundancy};

#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum Error {
    BufferTooShort,
    InvalidIndex,
    InvalidDataRateRange,
}

macro_rules! mac_cmds {
    (
        $(
            $(#[$outer:meta])*
            struct $type:ident[cid=$cid:expr, size=$size:expr]
        )*
    ) => {
        $(
            $(#[$outer])*
            pub struct $type<'a>(pub(crate) &'a [u8]);

            impl<'a> $type<'a> {
                /// Creates a new instance of the MAC command if there is enough data.
                pub fn new(data: &'a [u8]) -> Result<$type<'a>, Error> {
                    if data.len() != $size {
                        Err(Error::BufferTooShort)
                    } else {
                        Ok($type(data))
                    }
                }

                /// Constructs a new instance of the MAC command from the provided data,
                /// without verifying the data length.
                ///
                /// Improper use of this method could lead to panic during runtime!
                pub fn new_from_raw(data: &'a [u8]) -> $type<'a> {
                    $type(data)
                }

                /// Get the CID.
                pub const fn cid() -> u8 {
                    $cid
                }

                /// Length of payload without the CID.
                #[allow(clippy::len_without_is_empty)]
                pub const fn len() -> usize {
                    $size
                }

                /// Reference to the payload.
                pub fn bytes(&self) -> &[u8] {
                    self.0
                }
            }

            impl<'a> From<&'a [u8; $size]> for $type<'a> {
                fn from(v: &'a [u8; $size]) -> Self {
                    $type(&v[..])
                }
            }
        )*
    }
}

mac_cmds! {
    /// LinkAdrReqPayload represents the LinkADRReq LoRaWAN MACCommand.
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    #[derive(Debug, PartialEq, Eq)]
    struct LinkAdrReqPayload[cid=0x03, size=4]

    /// RxParamSetupReqPayload represents the RXParamSetupReq LoRaWAN MACCommand.
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    #[derive(Debug, PartialEq, Eq)]
    struct RxParamSetupReqPayload[cid=0x05, size=4]

    /// NewChannelReqPayload represents the NewChannelReq LoRaWAN MACCommand.
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    #[derive(Debug, PartialEq, Eq)]
    struct NewChannelReqPayload[cid=0x07, size=5]

    /// TxParamSetupReqPayload represents the TXParamSetupReq LoRaWAN MACCommand.
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    #[derive(Debug, PartialEq, Eq)]
    struct TxParamSetupReqPayload[cid=0x09, size=1]

    /// DlChannelReqPayload represents the DlChannelReq LoRaWAN MACCommand.
    #[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
    #[derive(Debug, PartialEq, Eq)]
    struct DlChannelReqPayload[cid=0x0A, size=4]
}

impl LinkAdrReqPayload<'_> {
    /// Data Rate that the device should use for its next transmissions.
    pub fn data_rate(&self) -> u8 {
        self.0[0] >> 4
    }

    /// TX Power that the device should use for its next transmissions.
    pub fn tx_power(&self) -> u8 {
        self.0[0] & 0x0f
    }

    /// Usable channels for next transmissions.
    pub fn channel_mask(&self) -> ChannelMask<2> {
        ChannelMask::<2>::new_from_raw(&self.0[1..3])
    }

    /// Provides information how channel mask is to be interpreted and how many times each message
    /// should be repeated.
    pub fn redundancy(&self) -> Redundancy {
        Redundancy::new(self.0[3])
    }
}

impl RxParamSetupReqPayload<'_> {
    /// Downlink settings - namely rx1_dr_offset and rx2_data_rate.
    pub fn dl_settings(&self) -> DLSettings {
        DLSettings::new(self.0[0])
    }

    /// RX2 frequency.
    pub fn frequency(&self) -> Frequency<'_> {
        Frequency::new_from_raw(&self.0[1..])
    }
}

impl NewChannelReqPayload<'_> {
    /// The index of the channel being created or modified.
    pub fn channel_index(&self) -> u8 {
        self.0[0]
    }

    /// The frequency of the new or modified channel.
    pub fn frequency(&self) -> Frequency<'_> {
        Frequency::new_from_raw(&self.0[1..4])
    }

    /// The data rate range specifies allowed data rates for the new or modified channel.
    pub fn data_rate_range(&self) -> DataRateRange {
        DataRateRange::new_from_raw(self.0[4])
    }
}

impl TxParamSetupReqPayload<'_> {
    pub fn downlink_dwell_time(&self) -> bool {
        self.0[0] & (1 << 5) != 0
    }

    pub fn uplink_dwell_time(&self) -> bool {
        self.0[0] & (1 << 4) != 0
    }

    /// Maximum EIRP in dBm.
    pub fn max_eirp(&self) -> u8 {
        const MAX_EIRP: [u8; 16] = [8, 10, 12, 13, 14, 16, 18, 20, 21, 24, 26, 27, 29, 30, 33, 36];
        MAX_EIRP[(self.0[0] & 0x0f) as usize]
    }
}

impl DlChannelReqPayload<'_> {
    /// The index of the channel whose downlink frequency is modified.
    pub fn channel_index(&self) -> u8 {
        self.0[0]
    }

    /// The RX1 frequency of the channel.
    pub fn frequency(&self) -> Frequency<'_> {
        Frequency::new_from_raw(&self.0[1..4])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn link_adr_req_fields() {
        let data = hex::decode("5207006f").unwrap();
        let req = LinkAdrReqPayload::new(&data).unwrap();
        assert_eq!(req.data_rate(), 5);
        assert_eq!(req.tx_power(), 2);
        assert_eq!(u16::from(req.channel_mask()), 0x0007);
        assert_eq!(req.redundancy().channel_mask_control(), 6);
        assert_eq!(req.redundancy().number_of_transmissions(), 15);
        assert_eq!(LinkAdrReqPayload::cid(), 0x03);
        assert!(LinkAdrReqPayload::new(&data[..3]).is_err());
    }

    #[test]
    fn new_channel_req_fields() {
        // channel 3, 867.1 MHz, DR0..DR5
        let data = hex::decode("03184f8450").unwrap();
        let req = NewChannelReqPayload::new(&data).unwrap();
        assert_eq!(req.channel_index(), 3);
        assert_eq!(req.frequency().value(), 867_100_000);
        assert_eq!(req.data_rate_range().max_data_rate(), 5);
        assert_eq!(req.data_rate_range().min_data_rate(), 0);
    }

    #[test]
    fn rx_param_setup_and_dl_channel_fields() {
        // RX1 offset 2, RX2 DR3, 869.525 MHz
        let data = hex::decode("23d2ad84").unwrap();
        let req = RxParamSetupReqPayload::new(&data).unwrap();
        assert_eq!(req.dl_settings().rx1_dr_offset(), 2);
        assert_eq!(req.dl_settings().rx2_data_rate(), 3);
        assert_eq!(req.frequency().value(), 869_525_000);

        let req = DlChannelReqPayload::from(&[0x01, 0xd2, 0xad, 0x84]);
        assert_eq!(req.channel_index(), 1);
        assert_eq!(req.frequency().value(), 869_525_000);
    }

    #[test]
    fn tx_param_setup_fields() {
        let req = TxParamSetupReqPayload::from(&[0x35]);
        assert!(req.downlink_dwell_time());
        assert!(req.uplink_dwell_time());
        assert_eq!(req.max_eirp(), 16);
    }
}
