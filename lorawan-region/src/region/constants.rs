use lora_modulation::CodingRate;

pub(crate) const RECEIVE_DELAY1: u32 = 1000;
pub(crate) const RECEIVE_DELAY2: u32 = RECEIVE_DELAY1 + 1000; // must be RECEIVE_DELAY1 + 1 s
pub(crate) const JOIN_ACCEPT_DELAY1: u32 = 5000;
pub(crate) const JOIN_ACCEPT_DELAY2: u32 = 6000;
pub(crate) const MAX_RX_WINDOW: u32 = 3000;
pub(crate) const MAX_FCNT_GAP: u32 = 16384;
pub(crate) const ADR_ACK_LIMIT: u32 = 64;
pub(crate) const ADR_ACK_DELAY: u32 = 32;
pub(crate) const ACK_TIMEOUT: u32 = 2000;
pub(crate) const ACK_TIMEOUT_RND: u32 = 1000; // ACK_TIMEOUT +/- ACK_TIMEOUT_RND

pub(crate) const DEFAULT_CODING_RATE: CodingRate = CodingRate::_4_5;
pub(crate) const LORA_PREAMBLE_SYMBOLS: u16 = 8;
pub(crate) const GFSK_PREAMBLE_BYTES: u16 = 5;
pub(crate) const GFSK_SYNC_WORD_BITS: u8 = 24;
pub(crate) const TX_TIMEOUT_MS: u32 = 4000;
/// MHDR, FHDR without options, FPort and MIC
pub(crate) const FRMPAYLOAD_OVERHEAD: u8 = 13;

/// Duty cycle denominators applied to join requests, by time since startup
pub(crate) const BACKOFF_DC_1_HOUR: u16 = 100;
pub(crate) const BACKOFF_DC_10_HOURS: u16 = 1000;
pub(crate) const BACKOFF_DC_24_HOURS: u16 = 10000;
pub(crate) const BACKOFF_1_HOUR_MS: u64 = 3_600_000;
pub(crate) const BACKOFF_11_HOURS_MS: u64 = BACKOFF_1_HOUR_MS + 36_000_000;

pub(crate) const BEACON_INTERVAL: u32 = 128_000;
pub(crate) const BEACON_RESERVED: u32 = 2120;
pub(crate) const BEACON_GUARD: u32 = 3000;
pub(crate) const BEACON_WINDOW: u32 = 122_880;
pub(crate) const BEACON_WINDOW_SLOTS: u32 = 4096;
pub(crate) const PING_SLOT_WINDOW: u32 = 30;
pub(crate) const BEACON_SYMBOL_TO_DEFAULT: u32 = 8;
pub(crate) const BEACON_SYMBOL_TO_EXPANSION_MAX: u32 = 256;
pub(crate) const PING_SLOT_SYMBOL_TO_EXPANSION_MAX: u32 = 30;
pub(crate) const BEACON_SYMBOL_TO_EXPANSION_FACTOR: u32 = 2;
pub(crate) const PING_SLOT_SYMBOL_TO_EXPANSION_FACTOR: u32 = 2;
pub(crate) const MAX_BEACON_LESS_PERIOD: u32 = 7_200_000;
