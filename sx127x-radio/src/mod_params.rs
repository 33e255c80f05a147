pub use lora_modulation::{BaseBandModulationParams, Bandwidth, CodingRate, SpreadingFactor};
use lora_modulation::{GfskPacket, LoRaPacket};

/// LoRa modulation parameters. Low data rate optimization is forced on where the symbol time
/// requires it.
pub type LoRaModParams = BaseBandModulationParams;

/// Errors types reported by the driver
#[allow(clippy::upper_case_acronyms)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RadioError {
    SPI,
    Reset,
    RfSwitchRx,
    RfSwitchTx,
    DIO1,
    /// RegVersion does not hold the silicon revision of the configured chip
    UnexpectedVersion(u8),
    /// Image calibration did not complete in time
    CalibrationTimeout,
    PayloadSizeUnexpected(usize),
    PayloadSizeMismatch(usize, usize),
    UnavailableSpreadingFactor,
    UnavailableBandwidth,
    InvalidBitrate,
    InvalidSF6ExplicitHeaderRequest,
    InvalidSyncWordLength(usize),
    FrequencyOutOfRange(u32),
    /// The operation does not apply to the selected packet type
    WrongPacketType,
    /// GFSK/OOK reception has no single shot mode
    SingleRxUnsupported,
}

/// Modem selected on the chip
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Gaussian frequency shift keying
    Gfsk,
    /// LoRa chirp spread spectrum
    LoRa,
    /// On-off keying
    Ook,
}

/// Chip operating mode, as held in the low bits of RegOpMode
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OperatingMode {
    Sleep = 0x00,
    Standby = 0x01,
    FsTx = 0x02,
    Tx = 0x03,
    FsRx = 0x04,
    /// Receiver mode when the FSK/OOK modem is selected
    RxContinuous = 0x05,
    RxSingle = 0x06,
    Cad = 0x07,
}

impl OperatingMode {
    /// Register value of the mode bits
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Operation in progress as tracked by the driver
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RadioState {
    Idle,
    RxRunning,
    TxRunning,
    Cad,
}

/// Interrupt sources delivered to [`crate::sx127x::Sx127x::handle_irq`]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum IrqSource {
    Dio0,
    Dio1,
    Dio2,
    Dio3,
    /// The timeout started through [`crate::mod_traits::RadioTimer`] elapsed
    Timer,
}

/// Status for a received packet
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PacketStatus {
    pub rssi: i16,
    pub snr: i16,
}

/// Completion of a radio operation
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    /// The frame was transmitted
    TxDone,
    /// The transmission did not finish in time and the chip was re-initialized
    TxTimeout,
    /// A frame of `len` bytes is available through `read_payload`
    RxDone {
        /// Payload length
        len: u8,
        /// Signal quality of the frame
        status: PacketStatus,
    },
    /// Nothing was received in the configured window
    RxTimeout,
    /// A frame was received with an invalid CRC
    RxError,
    /// Channel activity detection finished
    CadDone {
        /// A LoRa preamble was detected
        detected: bool,
    },
}

/// Accumulated interrupt status, drained by `get_and_clear_irq_status`
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqStatus(u16);

#[allow(missing_docs)]
impl IrqStatus {
    pub const TX_DONE: Self = Self(1 << 0);
    pub const RX_DONE: Self = Self(1 << 1);
    pub const PREAMBLE_DETECTED: Self = Self(1 << 2);
    pub const SYNC_WORD_VALID: Self = Self(1 << 3);
    pub const HEADER_VALID: Self = Self(1 << 4);
    pub const CRC_ERROR: Self = Self(1 << 5);
    pub const CAD_DONE: Self = Self(1 << 6);
    pub const CAD_DETECTED: Self = Self(1 << 7);
    pub const TIMEOUT: Self = Self(1 << 8);

    /// No flag set
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw flag bits
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when no flag is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when all flags of `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for IrqStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Gaussian filter applied to GFSK symbols
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GfskPulseShape {
    Off,
    Bt1_0,
    Bt0_5,
    Bt0_3,
}

/// Filter applied to OOK symbols
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum OokPulseShape {
    Off,
    /// Cut-off at the bit rate
    CutoffBitrate,
    /// Cut-off at twice the bit rate
    CutoffTwiceBitrate,
}

/// Modulation shaping; the variant must match the selected packet type
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PulseShape {
    Gfsk(GfskPulseShape),
    Ook(OokPulseShape),
}

impl PulseShape {
    /// ModulationShaping field, bits 6:5 of RegPaRamp
    pub fn value(self) -> u8 {
        let shaping = match self {
            PulseShape::Gfsk(GfskPulseShape::Off) | PulseShape::Ook(OokPulseShape::Off) => 0b00,
            PulseShape::Gfsk(GfskPulseShape::Bt1_0) | PulseShape::Ook(OokPulseShape::CutoffBitrate) => 0b01,
            PulseShape::Gfsk(GfskPulseShape::Bt0_5) | PulseShape::Ook(OokPulseShape::CutoffTwiceBitrate) => 0b10,
            PulseShape::Gfsk(GfskPulseShape::Bt0_3) => 0b11,
        };
        shaping << 5
    }

    pub(crate) fn packet_type(self) -> PacketType {
        match self {
            PulseShape::Gfsk(_) => PacketType::Gfsk,
            PulseShape::Ook(_) => PacketType::Ook,
        }
    }
}

/// Modulation parameters of the FSK/OOK modem
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfskModParams {
    /// Bit rate in bits per second
    pub bitrate_bps: u32,
    /// Frequency deviation in Hz, ignored for OOK
    pub fdev_hz: u32,
    /// Modulation shaping
    pub pulse_shape: PulseShape,
    /// Single side receiver bandwidth in Hz
    pub rx_bandwidth_hz: u32,
    /// Single side bandwidth used during automatic frequency correction, in Hz
    pub afc_bandwidth_hz: u32,
}

impl Default for GfskModParams {
    fn default() -> Self {
        Self {
            bitrate_bps: 50_000,
            fdev_hz: 25_000,
            pulse_shape: PulseShape::Gfsk(GfskPulseShape::Bt1_0),
            rx_bandwidth_hz: 50_000,
            afc_bandwidth_hz: 83_333,
        }
    }
}

/// Preamble detector of the FSK/OOK receiver
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GfskPreambleDetector {
    Off,
    Bits8,
    Bits16,
    Bits24,
}

impl GfskPreambleDetector {
    /// RegPreambleDetect value, including a tolerance of 10 chip errors
    pub fn value(self) -> u8 {
        const DETECTOR_ON: u8 = 0x80;
        const TOLERANCE: u8 = 0x0a;
        match self {
            GfskPreambleDetector::Off => TOLERANCE,
            GfskPreambleDetector::Bits8 => DETECTOR_ON | TOLERANCE,
            GfskPreambleDetector::Bits16 => DETECTOR_ON | (0b01 << 5) | TOLERANCE,
            GfskPreambleDetector::Bits24 => DETECTOR_ON | (0b10 << 5) | TOLERANCE,
        }
    }
}

/// Address based filtering of received GFSK frames
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GfskAddressFiltering {
    Off,
    Node,
    NodeAndBroadcast,
}

/// CRC appended to GFSK frames
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GfskCrcType {
    Off,
    /// CCITT polynomial, whitening compatible
    Ccitt,
    /// IBM polynomial
    Ibm,
}

/// DC-free encoding of GFSK frames
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GfskDcFree {
    Off,
    Manchester,
    Whitening,
}

/// Packet parameters of the FSK/OOK modem
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GfskPktParams {
    /// Preamble length in bits, a multiple of 8
    pub preamble_len_bits: u16,
    /// Receiver preamble detector
    pub preamble_detector: GfskPreambleDetector,
    /// Sync word length in bits, 0 to 64 in steps of 8
    pub sync_word_len_bits: u8,
    /// Address filtering
    pub address_filtering: GfskAddressFiltering,
    /// A length byte precedes the payload
    pub variable_length: bool,
    /// Payload length for fixed length frames, maximum accepted length otherwise
    pub payload_len: u8,
    /// CRC
    pub crc_type: GfskCrcType,
    /// DC-free encoding
    pub dc_free: GfskDcFree,
}

impl Default for GfskPktParams {
    fn default() -> Self {
        Self {
            preamble_len_bits: 40,
            preamble_detector: GfskPreambleDetector::Bits16,
            sync_word_len_bits: 24,
            address_filtering: GfskAddressFiltering::Off,
            variable_length: true,
            payload_len: 255,
            crc_type: GfskCrcType::Ccitt,
            dc_free: GfskDcFree::Whitening,
        }
    }
}

impl GfskPktParams {
    /// Framing of a `payload_len` byte frame sent with these parameters
    pub fn packet(&self, payload_len: u8) -> GfskPacket {
        GfskPacket {
            preamble_bits: self.preamble_len_bits,
            sync_word_bits: self.sync_word_len_bits,
            variable_length: self.variable_length,
            address_filtering: self.address_filtering != GfskAddressFiltering::Off,
            payload_len,
            crc_bytes: if self.crc_type == GfskCrcType::Off { 0 } else { 2 },
        }
    }
}

/// Packet parameters of the LoRa modem
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaPktParams {
    /// Number of LoRa symbols in the preamble
    pub preamble_len: u16,
    /// The header is not transmitted, the receiver must know the frame length
    pub implicit_header: bool,
    /// Payload length in implicit header mode, maximum accepted length otherwise
    pub payload_len: u8,
    /// CRC
    pub crc_on: bool,
    /// Invert the I and Q signals
    pub iq_inverted: bool,
}

impl Default for LoRaPktParams {
    fn default() -> Self {
        Self { preamble_len: 8, implicit_header: false, payload_len: 255, crc_on: true, iq_inverted: false }
    }
}

impl LoRaPktParams {
    /// Framing of a `payload_len` byte frame sent with these parameters
    pub fn packet(&self, payload_len: u8) -> LoRaPacket {
        LoRaPacket {
            preamble_symbols: self.preamble_len,
            implicit_header: self.implicit_header,
            payload_len,
            crc_on: self.crc_on,
        }
    }
}
