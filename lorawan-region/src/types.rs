//! LoRaWAN field primitives (channel mask, data rate range, frequency, etc) carried by the
//! downlink MAC commands a region has to process.
use crate::maccommands::Error;
use crate::region::DR;

/// ChannelMask represents the ChannelMask from LoRaWAN. Bit `n` of the mask enables channel `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask<const N: usize>([u8; N]);

impl<const N: usize> Default for ChannelMask<N> {
    fn default() -> Self {
        ChannelMask([0xFF; N])
    }
}

#[cfg(feature = "defmt-03")]
impl<const N: usize> defmt::Format for ChannelMask<N> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ChannelMask({:02x})", &self.0[..])
    }
}

#[cfg(feature = "serde")]
impl<const N: usize> serde::Serialize for ChannelMask<N> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for e in &self.0 {
            seq.serialize_element(e)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct ChannelMaskVisitor<const N: usize>;

#[cfg(feature = "serde")]
impl<'de, const N: usize> serde::de::Visitor<'de> for ChannelMaskVisitor<N> {
    type Value = ChannelMask<N>;

    fn expecting(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(formatter, "a sequence of {} ChannelMask bytes", N)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut arr = [0; N];
        let mut index = 0;
        while let Some(el) = seq.next_element()? {
            if index >= N {
                return Err(serde::de::Error::custom("ChannelMask has too many elements"));
            }
            arr[index] = el;
            index += 1;
        }
        if index < N {
            return Err(serde::de::Error::invalid_length(index, &self));
        }
        Ok(ChannelMask(arr))
    }
}

#[cfg(feature = "serde")]
impl<'de, const N: usize> serde::Deserialize<'de> for ChannelMask<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(ChannelMaskVisitor::<N>)
    }
}

impl<const N: usize> ChannelMask<N> {
    /// Number of channels the mask covers.
    pub const CHANNELS: usize = N * 8;

    /// Mask with every channel disabled.
    pub const fn empty() -> Self {
        ChannelMask([0; N])
    }

    /// Constructs a new ChannelMask from the provided data, without verifying if they are
    /// admissible.
    ///
    /// Improper use of this method could lead to panic during runtime!
    pub fn new_from_raw(data: &[u8]) -> Self {
        let mut payload = [0; N];
        payload.copy_from_slice(&data[..N]);
        ChannelMask(payload)
    }

    pub fn bank(&self, index: usize) -> u8 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Enable or disable a specific channel. Recall that LoRaWAN channel numbers start indexing
    /// at zero. Channels beyond the mask are ignored.
    pub fn set_channel(&mut self, channel: usize, set: bool) {
        let Some(bank) = self.0.get_mut(channel >> 3) else {
            return;
        };
        let flag = 0b1 << (channel & 0x07);
        if set {
            *bank |= flag;
        } else {
            *bank &= !flag;
        }
    }

    /// Whether channel `index` is enabled. Channels beyond the mask never are.
    pub fn is_enabled(&self, index: usize) -> bool {
        self.0.get(index >> 3).is_some_and(|bank| bank & (1 << (index & 0x07)) != 0)
    }

    /// Number of enabled channels.
    pub fn count_enabled(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Enable every channel enabled in `other` as well.
    pub fn union_with(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
    }

    /// Provides information for each of the first `M` channels if they are enabled.
    pub fn statuses<const M: usize>(&self) -> [bool; M] {
        let mut res = [false; M];
        for (i, c) in res.iter_mut().enumerate() {
            *c = self.is_enabled(i);
        }
        res
    }
}

impl From<u16> for ChannelMask<2> {
    fn from(v: u16) -> Self {
        ChannelMask(v.to_le_bytes())
    }
}

impl From<ChannelMask<2>> for u16 {
    fn from(v: ChannelMask<2>) -> Self {
        u16::from_le_bytes(v.0)
    }
}

impl<const N: usize> From<[u8; N]> for ChannelMask<N> {
    fn from(v: [u8; N]) -> Self {
        ChannelMask(v)
    }
}

impl<const N: usize> AsRef<[u8]> for ChannelMask<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// DataRateRange represents LoRaWAN DataRateRange: the lowest data rate in the low nibble, the
/// highest in the high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataRateRange(u8);

impl DataRateRange {
    /// Constructs a new DataRateRange from the provided byte, without checking for correctness.
    pub fn new_from_raw(byte: u8) -> DataRateRange {
        DataRateRange(byte)
    }

    /// Constructs a new DataRateRange from the provided byte.
    pub fn new(byte: u8) -> Result<DataRateRange, Error> {
        Self::can_build_from(byte)?;
        Ok(Self::new_from_raw(byte))
    }

    /// Range spanning `min..=max`.
    pub const fn new_range(min: DR, max: DR) -> DataRateRange {
        DataRateRange(((max as u8) << 4) | (min as u8 & 0x0f))
    }

    /// Check if the byte can be used to create DataRateRange.
    pub fn can_build_from(byte: u8) -> Result<(), Error> {
        if (byte >> 4) < (byte & 0x0f) {
            return Err(Error::InvalidDataRateRange);
        }
        Ok(())
    }

    /// The highest data rate allowed on this channel.
    pub fn max_data_rate(&self) -> u8 {
        self.0 >> 4
    }

    /// The lowest data rate allowed on this channel.
    pub fn min_data_rate(&self) -> u8 {
        self.0 & 0x0f
    }

    /// Whether `dr` lies within the range, bounds included.
    pub fn contains(&self, dr: u8) -> bool {
        (self.min_data_rate()..=self.max_data_rate()).contains(&dr)
    }

    /// The integer value of the DataRateRange.
    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for DataRateRange {
    fn from(v: u8) -> Self {
        DataRateRange(v)
    }
}

/// DLSettings represents LoRaWAN DLSettings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DLSettings(u8);

impl DLSettings {
    /// Constructs a new DLSettings from the provided data.
    pub fn new(byte: u8) -> DLSettings {
        DLSettings(byte)
    }

    /// The offset between the uplink data rate and the downlink data rate used to communicate with
    /// the end-device on the first reception slot (RX1).
    pub fn rx1_dr_offset(&self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// The data rate of a downlink using the second receive window.
    pub fn rx2_data_rate(&self) -> u8 {
        self.0 & 0x0f
    }

    /// The integer value of the DL Settings.
    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for DLSettings {
    fn from(v: u8) -> Self {
        DLSettings(v)
    }
}

/// Frequency represents a channel's central frequency: 24 bits little endian, in units of 100 Hz.
#[derive(Debug, PartialEq, Eq)]
pub struct Frequency<'a>(&'a [u8]);

impl<'a> Frequency<'a> {
    /// Constructs a new Frequency from the provided bytes, without verifying if they are
    /// admissible.
    ///
    /// Improper use of this method could lead to panic during runtime!
    pub fn new_from_raw(bytes: &'a [u8]) -> Self {
        Frequency(bytes)
    }

    /// Constructs a new Frequency from the provided bytes.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() != 3 {
            return None;
        }
        Some(Frequency(bytes))
    }

    /// Provides the decimal value in Hz of the frequency.
    pub fn value(&self) -> u32 {
        ((u32::from(self.0[2]) << 16) + (u32::from(self.0[1]) << 8) + u32::from(self.0[0])) * 100
    }
}

impl<'a> From<&'a [u8; 3]> for Frequency<'a> {
    fn from(v: &'a [u8; 3]) -> Self {
        Frequency(&v[..])
    }
}

impl AsRef<[u8]> for Frequency<'_> {
    fn as_ref(&self) -> &[u8] {
        self.0
    }
}

/// Redundancy represents the LinkADRReq Redundancy from LoRaWAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Redundancy(u8);

impl Redundancy {
    /// Constructs a new Redundancy from the provided data.
    pub fn new(data: u8) -> Self {
        Redundancy(data)
    }

    /// Controls the interpretation of the previously defined ChannelMask bit mask.
    pub fn channel_mask_control(&self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// How many times each message should be repeated.
    pub fn number_of_transmissions(&self) -> u8 {
        self.0 & 0x0f
    }

    /// The integer value of the Redundancy.
    pub fn raw_value(&self) -> u8 {
        self.0
    }
}

impl From<u8> for Redundancy {
    fn from(v: u8) -> Self {
        Redundancy(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_mask_bits() {
        let mut mask = ChannelMask::<2>::empty();
        mask.set_channel(0, true);
        mask.set_channel(9, true);
        assert_eq!(u16::from(mask), 0x0201);
        assert!(mask.is_enabled(9));
        assert!(!mask.is_enabled(8));
        assert!(!mask.is_enabled(16));
        assert_eq!(mask.count_enabled(), 2);

        mask.set_channel(16, true);
        assert_eq!(mask.count_enabled(), 2);
        mask.set_channel(0, false);
        assert_eq!(mask.statuses::<3>(), [false, false, false]);

        let mut other = ChannelMask::<2>::from(0x0007);
        other.union_with(&mask);
        assert_eq!(u16::from(other), 0x0207);
        assert_eq!(ChannelMask::<2>::default().count_enabled(), 16);
    }

    #[test]
    fn data_rate_range() {
        let range = DataRateRange::new_range(DR::_0, DR::_5);
        assert_eq!(range.raw_value(), 0x50);
        assert!(range.contains(0));
        assert!(range.contains(5));
        assert!(!range.contains(6));
        assert_eq!(DataRateRange::new(0x05), Err(Error::InvalidDataRateRange));
        assert_eq!(DataRateRange::new(0x73).map(|r| r.min_data_rate()), Ok(3));
    }

    #[test]
    fn frequency_in_hundred_hertz() {
        // 868.1 MHz
        let f = Frequency::from(&[0x28, 0x76, 0x84]);
        assert_eq!(f.value(), 868_100_000);
        assert!(Frequency::new(&[0, 0]).is_none());
    }

    #[test]
    fn packed_settings() {
        let dl = DLSettings::new(0x35);
        assert_eq!(dl.rx1_dr_offset(), 3);
        assert_eq!(dl.rx2_data_rate(), 5);
        let r = Redundancy::new(0x61);
        assert_eq!(r.channel_mask_control(), 6);
        assert_eq!(r.number_of_transmissions(), 1);
    }
}
