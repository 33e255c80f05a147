//! Typed views over the bit fields of the configuration registers.
//!
//! Each type wraps the raw register value; `with_*` methods replace one field and keep the
//! others, so a register can be updated with a read, a chain of field updates and a write.

use crate::mod_params::{GfskAddressFiltering, GfskDcFree, OperatingMode, PacketType};

macro_rules! register_field_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name(u8);

        impl $name {
            pub fn from_bits(bits: u8) -> Self {
                Self(bits)
            }

            pub fn bits(self) -> u8 {
                self.0
            }

            #[allow(dead_code)]
            fn with_field(self, mask: u8, value: u8) -> Self {
                Self((self.0 & !mask) | (value & mask))
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.0
            }
        }
    };
}

register_field_type!(
    /// RegOpMode
    OpMode
);

impl OpMode {
    const LONG_RANGE_MODE: u8 = 0x80;
    const MODULATION_TYPE: u8 = 0x60;
    const MODULATION_OOK: u8 = 0x20;
    const MODE: u8 = 0x07;

    pub fn long_range_mode(self) -> bool {
        self.0 & Self::LONG_RANGE_MODE != 0
    }

    pub fn with_long_range_mode(self, on: bool) -> Self {
        self.with_field(Self::LONG_RANGE_MODE, if on { Self::LONG_RANGE_MODE } else { 0 })
    }

    /// OOK selected on the FSK/OOK modem
    pub fn ook(self) -> bool {
        !self.long_range_mode() && self.0 & Self::MODULATION_TYPE == Self::MODULATION_OOK
    }

    pub fn with_ook(self, ook: bool) -> Self {
        self.with_field(Self::MODULATION_TYPE, if ook { Self::MODULATION_OOK } else { 0 })
    }

    pub fn mode(self) -> u8 {
        self.0 & Self::MODE
    }

    pub fn with_mode(self, mode: OperatingMode) -> Self {
        self.with_field(Self::MODE, mode.value())
    }

    pub fn packet_type(self) -> PacketType {
        if self.long_range_mode() {
            PacketType::LoRa
        } else if self.ook() {
            PacketType::Ook
        } else {
            PacketType::Gfsk
        }
    }
}

register_field_type!(
    /// RegDioMapping1, two bits per DIO line from DIO0 (bits 7:6) to DIO3 (bits 1:0)
    DioMapping1
);

impl DioMapping1 {
    pub fn with_dio0(self, mapping: u8) -> Self {
        self.with_field(0xc0, mapping << 6)
    }

    pub fn with_dio1(self, mapping: u8) -> Self {
        self.with_field(0x30, mapping << 4)
    }

    pub fn with_dio2(self, mapping: u8) -> Self {
        self.with_field(0x0c, mapping << 2)
    }

    pub fn with_dio3(self, mapping: u8) -> Self {
        self.with_field(0x03, mapping)
    }
}

register_field_type!(
    /// RegDioMapping2: DIO4 (bits 7:6), DIO5 (bits 5:4) and the preamble detect/RSSI selection
    DioMapping2
);

impl DioMapping2 {
    pub fn with_dio4(self, mapping: u8) -> Self {
        self.with_field(0xc0, mapping << 6)
    }

    pub fn with_dio5(self, mapping: u8) -> Self {
        self.with_field(0x30, mapping << 4)
    }

    /// Route PreambleDetect instead of Rssi to the DIO lines
    pub fn with_map_preamble_detect(self, on: bool) -> Self {
        self.with_field(0x01, on as u8)
    }
}

register_field_type!(
    /// RegPacketConfig1 of the FSK/OOK modem
    PacketConfig1
);

impl PacketConfig1 {
    pub fn variable_length(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn with_variable_length(self, on: bool) -> Self {
        self.with_field(0x80, if on { 0x80 } else { 0 })
    }

    pub fn with_dc_free(self, dc_free: GfskDcFree) -> Self {
        let value = match dc_free {
            GfskDcFree::Off => 0b00,
            GfskDcFree::Manchester => 0b01,
            GfskDcFree::Whitening => 0b10,
        };
        self.with_field(0x60, value << 5)
    }

    pub fn crc_on(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub fn with_crc_on(self, on: bool) -> Self {
        self.with_field(0x10, if on { 0x10 } else { 0 })
    }

    pub fn with_address_filtering(self, filtering: GfskAddressFiltering) -> Self {
        let value = match filtering {
            GfskAddressFiltering::Off => 0b00,
            GfskAddressFiltering::Node => 0b01,
            GfskAddressFiltering::NodeAndBroadcast => 0b10,
        };
        self.with_field(0x06, value << 1)
    }

    /// IBM CRC with alternate whitening, CCITT otherwise
    pub fn with_crc_ibm(self, ibm: bool) -> Self {
        self.with_field(0x01, ibm as u8)
    }
}

register_field_type!(
    /// RegSyncConfig of the FSK/OOK modem
    SyncConfig
);

impl SyncConfig {
    pub fn with_sync_on(self, on: bool) -> Self {
        self.with_field(0x10, if on { 0x10 } else { 0 })
    }

    /// Sync word size in bytes, 1 to 8
    pub fn with_sync_size(self, bytes: u8) -> Self {
        self.with_field(0x07, bytes.saturating_sub(1))
    }
}

register_field_type!(
    /// RegDetectOptimize of the LoRa modem
    DetectOptimize
);

impl DetectOptimize {
    pub fn automatic_if(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn with_automatic_if(self, on: bool) -> Self {
        self.with_field(0x80, if on { 0x80 } else { 0 })
    }

    pub fn with_detection_optimize(self, value: u8) -> Self {
        self.with_field(0x07, value)
    }
}

register_field_type!(
    /// RegImageCal of the FSK/OOK modem
    ImageCal
);

impl ImageCal {
    pub fn with_start(self) -> Self {
        self.with_field(0x40, 0x40)
    }

    pub fn running(self) -> bool {
        self.0 & 0x20 != 0
    }
}
