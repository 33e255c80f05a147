mod fields;
mod radio_kind_params;
mod sx1272;
mod sx1276;
#[cfg(test)]
mod test;

pub use radio_kind_params::{RampTime, Sx127xVariant};
pub use sx1272::Sx1272;
pub use sx1276::Sx1276;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use fields::*;
use lora_modulation::{gfsk_time_on_air, lora_time_on_air};
use radio_kind_params::*;

use crate::interface::SpiInterface;
use crate::mod_params::*;
use crate::mod_traits::{InterfaceVariant, RadioTimer};

/// Timeout value for [`Sx127x::set_rx`] selecting continuous reception
pub const RX_CONTINUOUS: u32 = 0x00ff_ffff;

// TCXO flag
const TCXO_FOR_OSCILLATOR: u8 = 0x10u8;

// Limits for preamble detection window in single reception mode
const SX127X_MIN_LORA_SYMB_NUM_TIMEOUT: u16 = 4;
const SX127X_MAX_LORA_SYMB_NUM_TIMEOUT: u16 = 1023;

// Constant values need to compute the RSSI value
const SX1272_RSSI_OFFSET: i16 = -139;
const SX1276_RSSI_OFFSET_LF: i16 = -164;
const SX1276_RSSI_OFFSET_HF: i16 = -157;
const SX1276_RF_MID_BAND_THRESH: u32 = 525_000_000;

const XTAL_FREQ: u32 = 32_000_000;
const RADIO_WAKEUP_TIME_MS: u32 = 1;

const LORA_MAC_PUBLIC_SYNCWORD: u8 = 0x34;
const LORA_MAC_PRIVATE_SYNCWORD: u8 = 0x12;

// Frames up to the FIFO size are written in one go, longer ones are refilled in chunks
const FIFO_SIZE: usize = 64;
const FIFO_CHUNK_SIZE: usize = 32;
const BUFFER_SIZE: usize = 256;

// Image calibration runs at 868 MHz for the high band after the current frequency
const IMAGE_CAL_HF_FREQ: u32 = 868_000_000;
const IMAGE_CAL_POLL_LIMIT: u32 = 10_000;

// RegRxConfig
const RX_CONFIG_RESTART_RX_WITHOUT_PLL_LOCK: u8 = 0x40;
const RX_CONFIG_AFC_AUTO_ON: u8 = 0x10;
const RX_CONFIG_AGC_AUTO_ON: u8 = 0x08;
const RX_CONFIG_TRIGGER_PREAMBLE_DETECT: u8 = 0x06;

// RegPacketConfig2
const PACKET_CONFIG2_DATA_MODE_PACKET: u8 = 0x40;

// Power-on register values that differ from the chip defaults, applied in order
const RADIO_INIT_REGISTERS: [(PacketType, u8, u8); 17] = [
    (PacketType::Gfsk, Register::RegLna as u8, 0x23),
    (PacketType::Gfsk, FskRegister::RegRxConfig as u8, 0x1e),
    (PacketType::Gfsk, FskRegister::RegRssiConfig as u8, 0xd2),
    (PacketType::Gfsk, FskRegister::RegAfcFei as u8, 0x01),
    (PacketType::Gfsk, FskRegister::RegPreambleDetect as u8, 0xaa),
    (PacketType::Gfsk, FskRegister::RegOsc as u8, 0x07),
    (PacketType::Gfsk, FskRegister::RegSyncConfig as u8, 0x12),
    (PacketType::Gfsk, FskRegister::RegSyncValue1 as u8, 0xc1),
    (PacketType::Gfsk, FskRegister::RegSyncValue1 as u8 + 1, 0x94),
    (PacketType::Gfsk, FskRegister::RegSyncValue1 as u8 + 2, 0xc1),
    (PacketType::Gfsk, FskRegister::RegPacketConfig1 as u8, 0xd8),
    (PacketType::Gfsk, FskRegister::RegFifoThresh as u8, 0x8f),
    (PacketType::Gfsk, FskRegister::RegImageCal as u8, 0x02),
    (PacketType::Gfsk, Register::RegDioMapping1 as u8, 0x00),
    (PacketType::Gfsk, Register::RegDioMapping2 as u8, 0x30),
    (PacketType::LoRa, Register::RegDetectionOptimize as u8, 0x43),
    (PacketType::LoRa, Register::RegMaxPayloadLength as u8, 0x40),
];

// Frequency synthesizer step for frequency calculation (Hz)
// FXOSC (32 MHz) * 1000000 (Hz/MHz) / 524288 (2^19)
const SCALE: u32 = 8;
const STEP_SCALED: u32 = XTAL_FREQ >> (19 - SCALE);

fn freq_to_pll_step(freq_in_hz: u32) -> u32 {
    // Integer and fractional parts of the frequency in scaled PLL steps, fraction rounded
    let steps_int = freq_in_hz / STEP_SCALED;
    let steps_frac = freq_in_hz - (steps_int * STEP_SCALED);

    (steps_int << SCALE) + (((steps_frac << SCALE) + (STEP_SCALED >> 1)) / STEP_SCALED)
}

#[cfg(test)]
fn pll_step_to_freq(pll_step: u32) -> u32 {
    let steps_frac = pll_step & ((1 << SCALE) - 1);
    (pll_step >> SCALE) * STEP_SCALED + ((steps_frac * STEP_SCALED + (1 << (SCALE - 1))) >> SCALE)
}

// RSSI requires linearization when SNR >= 0
// Section 3.5.5 - Note 3
fn linearize_rssi(rssi: u8) -> i16 {
    // Integer approximation for RSSI * 16.0 / 15.0
    // General formula for integer division with rounding:
    // x / d == floor((x + floor(d / 2)) / d), when d > 0
    const DIVISOR: i16 = 15;
    (rssi as i16 * 16 + (DIVISOR / 2)) / DIVISOR
}

/// Configuration for SX127x-based boards
pub struct Config<C: Sx127xVariant> {
    /// LoRa chip used on specific board
    pub chip: C,
    /// Whether board is using crystal oscillator or external clock
    pub tcxo_used: bool,
    /// TCXO start-up time in milliseconds, part of the radio wake-up time
    pub tcxo_wakeup_ms: u32,
    /// Whether to use PA_BOOST for transmit instead of RFO (sx1272) or RFO_LF (sx1276).
    /// NB! Depends on board layout.
    pub tx_boost: bool,
    /// Whether to boost receive
    pub rx_boost: bool,
}

// Progress of a GFSK/OOK frame moving through the FIFO
#[derive(Clone, Copy, Default)]
struct GfskFifo {
    // frame length, 0 until known
    size: usize,
    // bytes moved between FIFO and buffer so far
    nb_bytes: usize,
    threshold: usize,
    chunk_size: usize,
    preamble_detected: bool,
    sync_word_detected: bool,
    rssi: i16,
}

struct RadioContext {
    packet_type: PacketType,
    mode: OperatingMode,
    state: RadioState,
    rf_freq_hz: u32,
    // errata 2.3 offset programmed on top of `rf_freq_hz`
    rf_freq_offset_hz: u32,
    lora_mod: LoRaModParams,
    lora_pkt: LoRaPktParams,
    gfsk_mod: GfskModParams,
    gfsk_pkt: GfskPktParams,
    lora_sync_word: u8,
    gfsk_sync_word: [u8; 8],
    gfsk_sync_word_len: usize,
    rx_continuous: bool,
    irq_status: IrqStatus,
    last_status: PacketStatus,
    rx_len: usize,
    fifo: GfskFifo,
    buffer: [u8; BUFFER_SIZE],
}

impl Default for RadioContext {
    fn default() -> Self {
        Self {
            packet_type: PacketType::Gfsk,
            mode: OperatingMode::Standby,
            state: RadioState::Idle,
            rf_freq_hz: 0,
            rf_freq_offset_hz: 0,
            lora_mod: LoRaModParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5),
            lora_pkt: LoRaPktParams::default(),
            gfsk_mod: GfskModParams::default(),
            gfsk_pkt: GfskPktParams::default(),
            lora_sync_word: LORA_MAC_PUBLIC_SYNCWORD,
            gfsk_sync_word: [0; 8],
            gfsk_sync_word_len: 0,
            rx_continuous: false,
            irq_status: IrqStatus::empty(),
            last_status: PacketStatus::default(),
            rx_len: 0,
            fifo: GfskFifo::default(),
            buffer: [0; BUFFER_SIZE],
        }
    }
}

/// Interrupt driven driver for an SX1272/SX1276 transceiver.
///
/// Operations configure the chip and return immediately; their completion is reported by
/// [`Sx127x::handle_irq`], which the platform calls for every DIO line edge and timer expiry.
/// Share a driver between thread mode and interrupt handlers through
/// [`crate::shared::SharedRadio`].
pub struct Sx127x<SPI, IV, TMR, DLY, C: Sx127xVariant> {
    intf: SpiInterface<SPI, IV>,
    timer: TMR,
    delay: DLY,
    config: Config<C>,
    ctx: RadioContext,
}

impl<SPI, IV, TMR, DLY, C> Sx127x<SPI, IV, TMR, DLY, C>
where
    SPI: SpiDevice<u8>,
    IV: InterfaceVariant,
    TMR: RadioTimer,
    DLY: DelayNs,
    C: Sx127xVariant,
{
    /// Create a driver for the chip behind `spi`. Call [`Sx127x::init`] before anything else.
    pub fn new(spi: SPI, iv: IV, timer: TMR, delay: DLY, config: Config<C>) -> Self {
        Self {
            intf: SpiInterface::new(spi, iv),
            timer,
            delay,
            config,
            ctx: RadioContext::default(),
        }
    }

    /// Reset and calibrate the chip, load the default register set and select the LoRa modem
    /// with the public network sync word. The radio is left in Sleep.
    pub fn init(&mut self) -> Result<(), RadioError> {
        self.reset()?;
        let version = self.intf.read_register(Register::RegVersion)?;
        if version != C::VERSION {
            error!("unexpected silicon revision {=u8:x}", version);
            return Err(RadioError::UnexpectedVersion(version));
        }
        self.configure_after_reset()?;
        self.set_pkt_type(PacketType::LoRa)?;
        self.ctx.state = RadioState::Idle;
        Ok(())
    }

    /// Pulse the reset line. The chip comes back in FSK Standby with its power-on registers.
    pub fn reset(&mut self) -> Result<(), RadioError> {
        self.intf.iv.reset(&mut self.delay)?;
        self.ctx.mode = OperatingMode::Standby;
        self.ctx.packet_type = PacketType::Gfsk;
        self.ctx.rf_freq_offset_hz = 0;
        self.ctx.state = RadioState::Idle;
        Ok(())
    }

    fn configure_after_reset(&mut self) -> Result<(), RadioError> {
        if self.config.tcxo_used {
            self.intf
                .modify_register(C::reg_txco(), |v| v | TCXO_FOR_OSCILLATOR)?;
        }
        self.rx_chain_calibration()?;
        self.set_op_mode(OperatingMode::Sleep)?;
        for (packet_type, addr, value) in RADIO_INIT_REGISTERS {
            self.set_pkt_type(packet_type)?;
            self.intf.write_register(addr, value)?;
        }
        self.restore_sync_words()
    }

    fn restore_sync_words(&mut self) -> Result<(), RadioError> {
        self.set_pkt_type(PacketType::LoRa)?;
        self.intf
            .write_register(Register::RegSyncWord, self.ctx.lora_sync_word)?;
        if self.ctx.gfsk_sync_word_len > 0 {
            self.set_pkt_type(PacketType::Gfsk)?;
            let len = self.ctx.gfsk_sync_word_len;
            self.intf
                .write_buffer(FskRegister::RegSyncValue1, &self.ctx.gfsk_sync_word[..len])?;
        }
        Ok(())
    }

    // Image rejection calibration of the receive chain, at the current frequency and at
    // 868 MHz. Calibration needs the FSK/OOK register page and the PA cut off.
    fn rx_chain_calibration(&mut self) -> Result<(), RadioError> {
        let pa_config = self.intf.read_register(Register::RegPaConfig)?;
        let mut frf = [0u8; 3];
        self.intf.read_buffer(Register::RegFrfMsb, &mut frf)?;

        self.intf.write_register(Register::RegPaConfig, 0x00)?;

        self.calibrate_image()?;
        self.write_frequency(IMAGE_CAL_HF_FREQ)?;
        self.calibrate_image()?;

        self.intf.write_register(Register::RegPaConfig, pa_config)?;
        self.intf.write_buffer(Register::RegFrfMsb, &frf)
    }

    fn calibrate_image(&mut self) -> Result<(), RadioError> {
        self.intf.modify_register(FskRegister::RegImageCal, |v| {
            ImageCal::from_bits(v).with_start().bits()
        })?;
        for _ in 0..IMAGE_CAL_POLL_LIMIT {
            let image_cal = ImageCal::from_bits(self.intf.read_register(FskRegister::RegImageCal)?);
            if !image_cal.running() {
                return Ok(());
            }
            self.delay.delay_us(10);
        }
        error!("image calibration timeout");
        Err(RadioError::CalibrationTimeout)
    }

    fn stop_timer(&mut self) {
        if self.timer.is_started() {
            self.timer.stop();
        }
    }

    // Mode change with the matching antenna switch setting. Sleep can't go straight to TX.
    fn set_op_mode(&mut self, mode: OperatingMode) -> Result<(), RadioError> {
        if self.ctx.mode == OperatingMode::Sleep && matches!(mode, OperatingMode::Tx | OperatingMode::FsTx) {
            self.write_op_mode(OperatingMode::Standby)?;
        }
        match mode {
            OperatingMode::Sleep | OperatingMode::Standby => self.intf.iv.disable_rf_switch()?,
            OperatingMode::Tx | OperatingMode::FsTx => self.intf.iv.enable_rf_switch_tx()?,
            OperatingMode::FsRx | OperatingMode::RxContinuous | OperatingMode::RxSingle | OperatingMode::Cad => {
                self.intf.iv.enable_rf_switch_rx()?
            }
        }
        self.write_op_mode(mode)
    }

    fn write_op_mode(&mut self, mode: OperatingMode) -> Result<(), RadioError> {
        self.intf.modify_register(Register::RegOpMode, |v| {
            OpMode::from_bits(v).with_mode(mode).bits()
        })?;
        self.ctx.mode = mode;
        Ok(())
    }

    /// Enter Sleep, stopping any pending operation and its timeout
    pub fn set_sleep(&mut self) -> Result<(), RadioError> {
        self.stop_timer();
        self.set_op_mode(OperatingMode::Sleep)?;
        self.ctx.state = RadioState::Idle;
        Ok(())
    }

    /// Enter Standby, stopping any pending operation and its timeout
    pub fn set_standby(&mut self) -> Result<(), RadioError> {
        self.stop_timer();
        self.set_op_mode(OperatingMode::Standby)?;
        self.ctx.state = RadioState::Idle;
        Ok(())
    }

    /// Enter frequency synthesis for transmission
    pub fn set_fs(&mut self) -> Result<(), RadioError> {
        self.stop_timer();
        self.set_op_mode(OperatingMode::FsTx)?;
        self.ctx.state = RadioState::Idle;
        Ok(())
    }

    /// Select the modem. Switching between LoRa and FSK/OOK goes through Sleep.
    pub fn set_pkt_type(&mut self, packet_type: PacketType) -> Result<(), RadioError> {
        let op_mode = OpMode::from_bits(self.intf.read_register(Register::RegOpMode)?);
        if op_mode.packet_type() != packet_type {
            debug!("packet type {} -> {}", op_mode.packet_type(), packet_type);
            // LongRangeMode is only writable in Sleep
            self.set_op_mode(OperatingMode::Sleep)?;
            let op_mode = op_mode
                .with_mode(OperatingMode::Sleep)
                .with_long_range_mode(packet_type == PacketType::LoRa)
                .with_ook(packet_type == PacketType::Ook);
            self.intf.write_register(Register::RegOpMode, op_mode.bits())?;

            let (dio_mapping_1, dio_mapping_2) = match packet_type {
                PacketType::LoRa => (0x00, 0x00),
                PacketType::Gfsk | PacketType::Ook => (0x00, 0x30),
            };
            self.intf.write_register(Register::RegDioMapping1, dio_mapping_1)?;
            self.intf.write_register(Register::RegDioMapping2, dio_mapping_2)?;
        }
        self.ctx.packet_type = packet_type;
        Ok(())
    }

    fn require_lora(&self) -> Result<(), RadioError> {
        match self.ctx.packet_type {
            PacketType::LoRa => Ok(()),
            _ => Err(RadioError::WrongPacketType),
        }
    }

    fn require_fsk(&self) -> Result<(), RadioError> {
        match self.ctx.packet_type {
            PacketType::Gfsk | PacketType::Ook => Ok(()),
            PacketType::LoRa => Err(RadioError::WrongPacketType),
        }
    }

    /// Set the RF carrier frequency
    pub fn set_rf_freq(&mut self, frequency_in_hz: u32) -> Result<(), RadioError> {
        if !C::frequency_supported(frequency_in_hz) {
            return Err(RadioError::FrequencyOutOfRange(frequency_in_hz));
        }
        self.write_frequency(frequency_in_hz)?;
        self.ctx.rf_freq_hz = frequency_in_hz;
        self.ctx.rf_freq_offset_hz = 0;
        Ok(())
    }

    fn write_frequency(&mut self, frequency_in_hz: u32) -> Result<(), RadioError> {
        debug!("channel = {}", frequency_in_hz);
        let frf = freq_to_pll_step(frequency_in_hz);
        self.intf
            .write_register(Register::RegFrfMsb, ((frf & 0x00FF0000) >> 16) as u8)?;
        self.intf
            .write_register(Register::RegFrfMid, ((frf & 0x0000FF00) >> 8) as u8)?;
        self.intf.write_register(Register::RegFrfLsb, (frf & 0x000000FF) as u8)
    }

    /// Program the LoRa modulation. LDRO is forced on where the symbol time requires it.
    pub fn set_lora_mod_params(&mut self, mdltn_params: &LoRaModParams) -> Result<(), RadioError> {
        self.require_lora()?;
        let mdltn_params = mdltn_params.with_ldro(mdltn_params.ldro);
        debug!(
            "sf = {}, bw = {}, cr = {}, ldro = {}",
            mdltn_params.sf, mdltn_params.bw, mdltn_params.cr, mdltn_params.ldro
        );
        // Configure LoRa optimization (0x31) and detection threshold registers (0x37)
        let (opt, thr) = match mdltn_params.sf {
            SpreadingFactor::_6 => (0x05, 0x0c),
            _ => (0x03, 0x0a),
        };
        spreading_factor_value(mdltn_params.sf)?;
        self.intf.modify_register(Register::RegDetectionOptimize, |v| {
            DetectOptimize::from_bits(v).with_detection_optimize(opt).bits()
        })?;
        self.intf.write_register(Register::RegDetectionThreshold, thr)?;

        C::set_modulation_params(&mut self.intf, &mdltn_params)?;
        self.ctx.lora_mod = mdltn_params;
        Ok(())
    }

    /// Program the LoRa framing
    pub fn set_lora_pkt_params(&mut self, pkt_params: &LoRaPktParams) -> Result<(), RadioError> {
        self.require_lora()?;
        if (self.ctx.lora_mod.sf == SpreadingFactor::_6) && !pkt_params.implicit_header {
            return Err(RadioError::InvalidSF6ExplicitHeaderRequest);
        }

        self.intf.write_register(
            Register::RegPreambleMsb,
            ((pkt_params.preamble_len >> 8) & 0x00ff) as u8,
        )?;
        self.intf
            .write_register(Register::RegPreambleLsb, (pkt_params.preamble_len & 0x00ff) as u8)?;

        C::set_packet_params(&mut self.intf, pkt_params)?;

        if pkt_params.implicit_header {
            // Set the expected packet receive size, which is only applicable for implicit header mode
            self.intf
                .write_register(Register::RegPayloadLength, pkt_params.payload_len)?;
        }
        if pkt_params.payload_len > 0 {
            self.intf
                .write_register(Register::RegMaxPayloadLength, pkt_params.payload_len)?;
        }

        // IQ inversion:
        // RegInvertiq - [0x33]
        // [6] - InvertIQRX
        // [5:1] - Reserved: 0x13
        // [0] - InvertIQTX
        // RegInvertiq2 - [0x3b]
        // Set to 0x19 when RX, otherwise set 0x1d
        let (iq1, iq2) = match pkt_params.iq_inverted {
            true => (1 << 6, 0x19),
            false => (1 << 0, 0x1d),
        };
        // Keep reserved value for InvertIq as well
        self.intf.write_register(Register::RegInvertiq, (0x13 << 1) | iq1)?;
        self.intf.write_register(Register::RegInvertiq2, iq2)?;

        self.ctx.lora_pkt = *pkt_params;
        Ok(())
    }

    /// Program the FSK/OOK modulation
    pub fn set_gfsk_mod_params(&mut self, mdltn_params: &GfskModParams) -> Result<(), RadioError> {
        self.require_fsk()?;
        if mdltn_params.pulse_shape.packet_type() != self.ctx.packet_type {
            return Err(RadioError::WrongPacketType);
        }
        if mdltn_params.bitrate_bps == 0 {
            return Err(RadioError::InvalidBitrate);
        }
        let bitrate = XTAL_FREQ / mdltn_params.bitrate_bps;
        if bitrate > u16::MAX as u32 {
            return Err(RadioError::InvalidBitrate);
        }
        let rx_bw = fsk_bandwidth_value(mdltn_params.rx_bandwidth_hz)?;
        let afc_bw = fsk_bandwidth_value(mdltn_params.afc_bandwidth_hz)?;
        // Deviations are too small for the scaled synthesizer step
        let fdev = ((mdltn_params.fdev_hz as u64) << 19) / XTAL_FREQ as u64;

        self.intf
            .write_register(FskRegister::RegBitrateMsb, (bitrate >> 8) as u8)?;
        self.intf
            .write_register(FskRegister::RegBitrateLsb, (bitrate & 0xff) as u8)?;
        self.intf
            .write_register(FskRegister::RegFdevMsb, ((fdev >> 8) & 0x3f) as u8)?;
        self.intf
            .write_register(FskRegister::RegFdevLsb, (fdev & 0xff) as u8)?;
        self.intf.write_register(FskRegister::RegRxBw, rx_bw)?;
        self.intf.write_register(FskRegister::RegAfcBw, afc_bw)?;

        let shaping = mdltn_params.pulse_shape.value();
        self.intf
            .modify_register(Register::RegPaRamp, |v| (v & !0x60) | shaping)?;

        self.ctx.gfsk_mod = *mdltn_params;
        Ok(())
    }

    /// Program the FSK/OOK framing
    pub fn set_gfsk_pkt_params(&mut self, pkt_params: &GfskPktParams) -> Result<(), RadioError> {
        self.require_fsk()?;
        let sync_word_len = (pkt_params.sync_word_len_bits as usize).div_ceil(8);
        if sync_word_len > 8 {
            return Err(RadioError::InvalidSyncWordLength(sync_word_len));
        }
        let preamble_len = pkt_params.preamble_len_bits.div_ceil(8);

        self.intf
            .write_register(FskRegister::RegPreambleMsb, (preamble_len >> 8) as u8)?;
        self.intf
            .write_register(FskRegister::RegPreambleLsb, (preamble_len & 0xff) as u8)?;
        self.intf
            .write_register(FskRegister::RegPreambleDetect, pkt_params.preamble_detector.value())?;
        self.intf.modify_register(FskRegister::RegSyncConfig, |v| {
            SyncConfig::from_bits(v)
                .with_sync_on(sync_word_len > 0)
                .with_sync_size(sync_word_len as u8)
                .bits()
        })?;
        self.intf.modify_register(FskRegister::RegPacketConfig1, |v| {
            PacketConfig1::from_bits(v)
                .with_variable_length(pkt_params.variable_length)
                .with_dc_free(pkt_params.dc_free)
                .with_crc_on(pkt_params.crc_type != GfskCrcType::Off)
                .with_address_filtering(pkt_params.address_filtering)
                .with_crc_ibm(pkt_params.crc_type == GfskCrcType::Ibm)
                .bits()
        })?;
        self.intf
            .modify_register(FskRegister::RegPacketConfig2, |v| v | PACKET_CONFIG2_DATA_MODE_PACKET)?;
        self.intf
            .write_register(FskRegister::RegPayloadLength, pkt_params.payload_len)?;

        self.ctx.gfsk_pkt = *pkt_params;
        Ok(())
    }

    /// Set the LoRa sync word
    pub fn set_lora_sync_word(&mut self, sync_word: u8) -> Result<(), RadioError> {
        self.require_lora()?;
        self.intf.write_register(Register::RegSyncWord, sync_word)?;
        self.ctx.lora_sync_word = sync_word;
        Ok(())
    }

    /// Select the LoRaWAN public or private network sync word
    pub fn set_lora_public_network(&mut self, enable_public_network: bool) -> Result<(), RadioError> {
        self.set_lora_sync_word(if enable_public_network {
            LORA_MAC_PUBLIC_SYNCWORD
        } else {
            LORA_MAC_PRIVATE_SYNCWORD
        })
    }

    /// Set the FSK/OOK sync word, 1 to 8 bytes
    pub fn set_gfsk_sync_word(&mut self, sync_word: &[u8]) -> Result<(), RadioError> {
        self.require_fsk()?;
        if sync_word.is_empty() || sync_word.len() > self.ctx.gfsk_sync_word.len() {
            return Err(RadioError::InvalidSyncWordLength(sync_word.len()));
        }
        self.intf.write_buffer(FskRegister::RegSyncValue1, sync_word)?;
        self.ctx.gfsk_sync_word[..sync_word.len()].copy_from_slice(sync_word);
        self.ctx.gfsk_sync_word_len = sync_word.len();
        Ok(())
    }

    /// Node address used by GFSK address filtering
    pub fn set_gfsk_node_address(&mut self, address: u8) -> Result<(), RadioError> {
        self.require_fsk()?;
        self.intf.write_register(FskRegister::RegNodeAdrs, address)
    }

    /// Broadcast address used by GFSK address filtering
    pub fn set_gfsk_broadcast_address(&mut self, address: u8) -> Result<(), RadioError> {
        self.require_fsk()?;
        self.intf.write_register(FskRegister::RegBroadcastAdrs, address)
    }

    /// Set the output power in dBm and the PA ramp time
    pub fn set_tx_params(&mut self, power_dbm: i8, ramp_time: RampTime) -> Result<(), RadioError> {
        debug!("tx power = {}", power_dbm);
        C::set_tx_power(&mut self.intf, power_dbm as i32, self.config.tx_boost)?;

        let ramp = C::ramp_value(ramp_time);
        self.intf
            .modify_register(Register::RegPaRamp, |v| (v & 0x60) | ramp)
    }

    /// Number of symbols a single LoRa reception waits for a preamble, 4 to 1023
    pub fn set_lora_symb_num_timeout(&mut self, symbol_num: u16) -> Result<(), RadioError> {
        self.require_lora()?;
        let val = symbol_num.clamp(SX127X_MIN_LORA_SYMB_NUM_TIMEOUT, SX127X_MAX_LORA_SYMB_NUM_TIMEOUT);

        let symbol_num_msb = ((val >> 8) & 0x03) as u8;
        let symbol_num_lsb = (val & 0xff) as u8;
        self.intf
            .modify_register(Register::RegModemConfig2, |cfg2| (cfg2 & 0xfc) | symbol_num_msb)?;
        self.intf.write_register(Register::RegSymbTimeoutLsb, symbol_num_lsb)
    }

    /// Load a frame for the next transmission.
    ///
    /// GFSK/OOK frames longer than the FIFO are kept in the driver buffer and streamed into the
    /// FIFO from the DIO1 handler.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        let len = payload.len();
        if len > u8::MAX as usize {
            return Err(RadioError::PayloadSizeUnexpected(len));
        }
        if self.ctx.mode == OperatingMode::Sleep {
            // FIFO is not accessible in Sleep
            self.write_op_mode(OperatingMode::Standby)?;
            self.delay.delay_ms(1);
        }

        match self.ctx.packet_type {
            PacketType::LoRa => {
                if !self.ctx.lora_pkt.implicit_header {
                    self.intf.write_register(Register::RegPayloadLength, len as u8)?;
                }
                self.intf.write_register(Register::RegFifoTxBaseAddr, 0x00)?;
                self.intf.write_register(Register::RegFifoAddrPtr, 0x00)?;
                self.intf.write_buffer(Register::RegFifo, payload)?;
            }
            PacketType::Gfsk | PacketType::Ook => {
                if self.ctx.gfsk_pkt.variable_length {
                    self.intf.write_buffer(Register::RegFifo, &[len as u8])?;
                } else {
                    self.intf.write_register(FskRegister::RegPayloadLength, len as u8)?;
                }
                self.ctx.buffer[..len].copy_from_slice(payload);

                let chunk = if len <= FIFO_SIZE { len } else { FIFO_CHUNK_SIZE };
                if chunk > 0 {
                    self.intf.write_buffer(Register::RegFifo, &self.ctx.buffer[..chunk])?;
                }
                self.ctx.fifo = GfskFifo {
                    size: len,
                    nb_bytes: chunk,
                    chunk_size: FIFO_CHUNK_SIZE,
                    ..Default::default()
                };
            }
        }
        Ok(())
    }

    /// Copy the last received frame into `buf`, returning its length
    pub fn read_payload(&self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let len = self.ctx.rx_len;
        if len > buf.len() {
            return Err(RadioError::PayloadSizeMismatch(len, buf.len()));
        }
        buf[..len].copy_from_slice(&self.ctx.buffer[..len]);
        Ok(len)
    }

    /// Start transmitting the loaded frame. A non-zero `timeout_ms` arms the timer; its expiry
    /// is treated as a failed transmission.
    pub fn set_tx(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        self.stop_timer();
        match self.ctx.packet_type {
            PacketType::LoRa => {
                if self.ctx.rf_freq_offset_hz != 0 {
                    self.write_frequency(self.ctx.rf_freq_hz)?;
                    self.ctx.rf_freq_offset_hz = 0;
                }
                C::apply_errata_2_1(&mut self.intf, self.ctx.lora_mod.bw, self.ctx.rf_freq_hz)?;

                self.intf.write_register(
                    Register::RegIrqFlagsMask,
                    IrqMask::All.value() ^ IrqMask::TxDone.value(),
                )?;
                self.intf.modify_register(Register::RegDioMapping1, |v| {
                    DioMapping1::from_bits(v).with_dio0(0b01).bits()
                })?;
                self.intf.write_register(Register::RegIrqFlags, IrqMask::All.value())?;
            }
            PacketType::Gfsk | PacketType::Ook => {
                // DIO0=PacketSent, DIO1=FifoEmpty
                self.intf.modify_register(Register::RegDioMapping1, |v| {
                    DioMapping1::from_bits(v).with_dio0(0b00).with_dio1(0b01).bits()
                })?;
                self.intf.modify_register(Register::RegDioMapping2, |v| {
                    DioMapping2::from_bits(v)
                        .with_dio4(0b00)
                        .with_map_preamble_detect(false)
                        .bits()
                })?;
                self.ctx.fifo.threshold = (self.intf.read_register(FskRegister::RegFifoThresh)? & 0x3f) as usize;
            }
        }

        self.ctx.state = RadioState::TxRunning;
        if timeout_ms > 0 {
            self.timer.start(timeout_ms);
        }
        self.set_op_mode(OperatingMode::Tx)
    }

    /// Start a reception.
    ///
    /// `timeout_ms` selects the mode: 0 is a LoRa single reception ended by the symbol timeout,
    /// [`RX_CONTINUOUS`] receives until told otherwise, anything else receives until the first
    /// frame or until the timer expires.
    pub fn set_rx(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        if timeout_ms == 0 && self.ctx.packet_type != PacketType::LoRa {
            return Err(RadioError::SingleRxUnsupported);
        }
        self.stop_timer();
        self.ctx.rx_continuous = timeout_ms == RX_CONTINUOUS;
        self.ctx.fifo = GfskFifo::default();
        self.ctx.rx_len = 0;

        let mode = match self.ctx.packet_type {
            PacketType::LoRa => {
                let bw = self.ctx.lora_mod.bw;
                C::apply_errata_2_1(&mut self.intf, bw, self.ctx.rf_freq_hz)?;
                let offset = C::apply_errata_2_3(&mut self.intf, bw)?;
                if offset != self.ctx.rf_freq_offset_hz {
                    self.write_frequency(self.ctx.rf_freq_hz + offset)?;
                    self.ctx.rf_freq_offset_hz = offset;
                }

                self.intf.write_register(
                    Register::RegIrqFlagsMask,
                    IrqMask::All.value()
                        ^ (IrqMask::RxDone.value()
                            | IrqMask::RxTimeout.value()
                            | IrqMask::CRCError.value()
                            | IrqMask::HeaderValid.value()),
                )?;
                // DIO0=RxDone, DIO1=RxTimeout, DIO3=ValidHeader
                self.intf.modify_register(Register::RegDioMapping1, |v| {
                    DioMapping1::from_bits(v)
                        .with_dio0(0b00)
                        .with_dio1(0b00)
                        .with_dio3(0b01)
                        .bits()
                })?;
                self.intf.write_register(Register::RegIrqFlags, IrqMask::All.value())?;

                self.write_lna_gain()?;
                self.intf.write_register(Register::RegFifoRxBaseAddr, 0x00)?;
                self.intf.write_register(Register::RegFifoAddrPtr, 0x00)?;

                if timeout_ms == 0 {
                    OperatingMode::RxSingle
                } else {
                    OperatingMode::RxContinuous
                }
            }
            PacketType::Gfsk | PacketType::Ook => {
                // DIO0=PayloadReady, DIO1=FifoLevel, DIO2=SyncAddress, DIO4=PreambleDetect
                self.intf.modify_register(Register::RegDioMapping1, |v| {
                    DioMapping1::from_bits(v)
                        .with_dio0(0b00)
                        .with_dio1(0b00)
                        .with_dio2(0b11)
                        .bits()
                })?;
                self.intf.modify_register(Register::RegDioMapping2, |v| {
                    DioMapping2::from_bits(v)
                        .with_dio4(0b11)
                        .with_map_preamble_detect(true)
                        .bits()
                })?;
                self.ctx.fifo.threshold = (self.intf.read_register(FskRegister::RegFifoThresh)? & 0x3f) as usize;
                self.intf.write_register(
                    FskRegister::RegRxConfig,
                    RX_CONFIG_AFC_AUTO_ON | RX_CONFIG_AGC_AUTO_ON | RX_CONFIG_TRIGGER_PREAMBLE_DETECT,
                )?;
                OperatingMode::RxContinuous
            }
        };

        self.ctx.state = RadioState::RxRunning;
        if timeout_ms != 0 && timeout_ms != RX_CONTINUOUS {
            self.timer.start(timeout_ms);
        }
        self.set_op_mode(mode)
    }

    fn write_lna_gain(&mut self) -> Result<(), RadioError> {
        let lna_gain = if self.config.rx_boost {
            LnaGain::G1.boosted_value()
        } else {
            LnaGain::G1.value()
        };
        self.intf.write_register(Register::RegLna, lna_gain)
    }

    /// Start a LoRa channel activity detection
    pub fn set_cad(&mut self) -> Result<(), RadioError> {
        self.require_lora()?;
        self.stop_timer();

        self.intf.write_register(
            Register::RegIrqFlagsMask,
            IrqMask::All.value() ^ (IrqMask::CADDone.value() | IrqMask::CADActivityDetected.value()),
        )?;
        // DIO3=CadDone, DIO4=CadDetected
        self.intf.modify_register(Register::RegDioMapping1, |v| {
            DioMapping1::from_bits(v).with_dio3(0b00).bits()
        })?;
        self.intf.modify_register(Register::RegDioMapping2, |v| {
            DioMapping2::from_bits(v).with_dio4(0b00).bits()
        })?;
        self.intf.write_register(Register::RegIrqFlags, IrqMask::All.value())?;
        self.write_lna_gain()?;

        self.ctx.state = RadioState::Cad;
        self.set_op_mode(OperatingMode::Cad)
    }

    /// Transmit an unmodulated carrier on the FSK/OOK modem. A non-zero `timeout_ms` arms
    /// the timer; on expiry the chip is re-initialized like after a failed transmission.
    pub fn set_tx_cw(&mut self, timeout_ms: u32) -> Result<(), RadioError> {
        self.require_fsk()?;
        self.stop_timer();

        self.intf.write_register(FskRegister::RegFdevMsb, 0x00)?;
        self.intf.write_register(FskRegister::RegFdevLsb, 0x00)?;
        // Continuous mode
        self.intf
            .modify_register(FskRegister::RegPacketConfig2, |v| v & !PACKET_CONFIG2_DATA_MODE_PACKET)?;
        // No interrupts
        self.intf.write_register(
            Register::RegDioMapping1,
            DioMapping1::from_bits(0).with_dio0(0b11).with_dio1(0b11).bits(),
        )?;
        self.intf.write_register(
            Register::RegDioMapping2,
            DioMapping2::from_bits(0).with_dio4(0b10).with_dio5(0b10).bits(),
        )?;

        self.ctx.state = RadioState::TxRunning;
        if timeout_ms > 0 {
            self.timer.start(timeout_ms);
        }
        self.set_op_mode(OperatingMode::Tx)
    }

    /// Instantaneous RSSI in dBm
    pub fn get_rssi_inst(&mut self) -> Result<i16, RadioError> {
        match self.ctx.packet_type {
            PacketType::LoRa => {
                let rssi_value = self.intf.read_register(Register::RegRssiValue)?;
                Ok(C::rssi_offset(self.ctx.rf_freq_hz) + rssi_value as i16)
            }
            PacketType::Gfsk | PacketType::Ook => {
                let rssi_value = self.intf.read_register(FskRegister::RegRssiValue)?;
                Ok(-((rssi_value >> 1) as i16))
            }
        }
    }

    /// RSSI and SNR of the last LoRa frame
    pub fn get_lora_pkt_status(&self) -> Result<PacketStatus, RadioError> {
        self.require_lora()?;
        Ok(self.ctx.last_status)
    }

    /// RSSI of the last GFSK/OOK frame, sampled at sync word detection
    pub fn get_gfsk_pkt_status(&self) -> Result<PacketStatus, RadioError> {
        self.require_fsk()?;
        Ok(self.ctx.last_status)
    }

    /// 32 bit random value built from the wideband RSSI noise.
    ///
    /// Leaves the chip in Sleep with the LoRa modem selected; modulation and packet parameters
    /// must be set again afterwards.
    pub fn get_random_number(&mut self) -> Result<u32, RadioError> {
        self.stop_timer();
        self.set_pkt_type(PacketType::LoRa)?;
        // Disable LoRa modem interrupts
        self.intf
            .write_register(Register::RegIrqFlagsMask, IrqMask::All.value())?;
        self.set_op_mode(OperatingMode::RxContinuous)?;

        let mut rnd = 0u32;
        for i in 0..32 {
            self.delay.delay_ms(1);
            // Unfiltered RSSI value reading. Only takes the LSB value
            let wideband = self.intf.read_register(Register::RegRssiWideband)?;
            rnd |= ((wideband & 0x01) as u32) << i;
        }

        self.set_sleep()?;
        Ok(rnd)
    }

    /// Return the interrupt flags raised since the previous call and clear them
    pub fn get_and_clear_irq_status(&mut self) -> IrqStatus {
        core::mem::take(&mut self.ctx.irq_status)
    }

    /// Time between leaving Sleep and being able to transmit or receive
    pub fn wakeup_time_ms(&self) -> u32 {
        self.config.tcxo_wakeup_ms + RADIO_WAKEUP_TIME_MS
    }

    /// On-air duration of a `payload_len` byte frame with the current parameters
    pub fn time_on_air_ms(&self, payload_len: u8) -> u32 {
        match self.ctx.packet_type {
            PacketType::LoRa => lora_time_on_air(&self.ctx.lora_pkt.packet(payload_len), &self.ctx.lora_mod),
            PacketType::Gfsk | PacketType::Ook => gfsk_time_on_air(
                &self.ctx.gfsk_pkt.packet(payload_len),
                self.ctx.gfsk_mod.bitrate_bps,
            ),
        }
    }

    /// Operation in progress
    pub fn state(&self) -> RadioState {
        self.ctx.state
    }

    /// Selected modem
    pub fn packet_type(&self) -> PacketType {
        self.ctx.packet_type
    }

    /// Last operating mode written to the chip
    pub fn operating_mode(&self) -> OperatingMode {
        self.ctx.mode
    }

    /// Nominal RF frequency in Hz
    pub fn rf_frequency(&self) -> u32 {
        self.ctx.rf_freq_hz
    }

    /// Process an interrupt.
    ///
    /// Returns the event completing the current operation, if any. Interrupts that don't
    /// match the current operation are logged and ignored.
    pub fn handle_irq(&mut self, source: IrqSource) -> Result<Option<RadioEvent>, RadioError> {
        trace!("irq {} in state {}", source, self.ctx.state);
        match source {
            IrqSource::Dio0 => self.on_dio0(),
            IrqSource::Dio1 => self.on_dio1(),
            IrqSource::Dio2 => self.on_dio2(),
            IrqSource::Dio3 => self.on_dio3(),
            IrqSource::Timer => self.on_timeout(),
        }
    }

    // Leave a non-continuous reception
    fn end_rx(&mut self) -> Result<(), RadioError> {
        self.stop_timer();
        self.ctx.state = RadioState::Idle;
        if self.ctx.mode == OperatingMode::RxSingle {
            // The chip is back in Standby on its own
            self.ctx.mode = OperatingMode::Standby;
            self.intf.iv.disable_rf_switch()
        } else {
            self.set_op_mode(OperatingMode::Standby)
        }
    }

    fn on_dio0(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        match self.ctx.state {
            RadioState::RxRunning => match self.ctx.packet_type {
                PacketType::LoRa => self.lora_rx_done(),
                PacketType::Gfsk | PacketType::Ook => self.gfsk_rx_done(),
            },
            RadioState::TxRunning => {
                self.stop_timer();
                match self.ctx.packet_type {
                    PacketType::LoRa => {
                        self.intf
                            .write_register(Register::RegIrqFlags, IrqMask::TxDone.value())?;
                        // The chip is back in Standby on its own
                        self.ctx.mode = OperatingMode::Standby;
                        self.intf.iv.disable_rf_switch()?;
                    }
                    PacketType::Gfsk | PacketType::Ook => self.set_op_mode(OperatingMode::Standby)?,
                }
                self.ctx.state = RadioState::Idle;
                self.ctx.irq_status.insert(IrqStatus::TX_DONE);
                Ok(Some(RadioEvent::TxDone))
            }
            _ => {
                warn!("DIO0 in state {}", self.ctx.state);
                Ok(None)
            }
        }
    }

    fn lora_rx_done(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        self.intf
            .write_register(Register::RegIrqFlags, IrqMask::RxDone.value())?;
        let irq_flags = self.intf.read_register(Register::RegIrqFlags)?;
        if IrqMask::CRCError.is_set_in(irq_flags) {
            self.intf
                .write_register(Register::RegIrqFlags, IrqMask::CRCError.value())?;
            if !self.ctx.rx_continuous {
                self.end_rx()?;
            }
            debug!("LoRa frame with CRC error");
            self.ctx.irq_status.insert(IrqStatus::CRC_ERROR);
            return Ok(Some(RadioEvent::RxError));
        }

        let snr = {
            let packet_snr = self.intf.read_register(Register::RegPktSnrValue)?;
            // Quarter dB steps, rounded
            ((packet_snr as i8 as i16) + 2) >> 2
        };
        let rssi = {
            let packet_rssi = self.intf.read_register(Register::RegPktRssiValue)?;
            let rssi_offset = C::rssi_offset(self.ctx.rf_freq_hz);
            if snr < 0 {
                rssi_offset + packet_rssi as i16 + (packet_rssi >> 4) as i16 + snr
            } else {
                rssi_offset + linearize_rssi(packet_rssi)
            }
        };

        let len = if self.ctx.lora_pkt.implicit_header {
            self.ctx.lora_pkt.payload_len
        } else {
            self.intf.read_register(Register::RegRxNbBytes)?
        } as usize;
        let fifo_addr = self.intf.read_register(Register::RegFifoRxCurrentAddr)?;
        self.intf.write_register(Register::RegFifoAddrPtr, fifo_addr)?;
        self.intf
            .read_buffer(Register::RegFifo, &mut self.ctx.buffer[..len])?;

        let status = PacketStatus { rssi, snr };
        self.ctx.rx_len = len;
        self.ctx.last_status = status;
        if !self.ctx.rx_continuous {
            self.end_rx()?;
        }
        self.ctx.irq_status.insert(IrqStatus::RX_DONE);
        Ok(Some(RadioEvent::RxDone { len: len as u8, status }))
    }

    fn read_gfsk_packet_size(&mut self) -> Result<(), RadioError> {
        let size = if self.ctx.gfsk_pkt.variable_length {
            let mut size = [0u8];
            self.intf.read_buffer(Register::RegFifo, &mut size)?;
            size[0]
        } else {
            self.intf.read_register(FskRegister::RegPayloadLength)?
        };
        self.ctx.fifo.size = size as usize;
        Ok(())
    }

    fn clear_gfsk_rx_flags(&mut self) -> Result<(), RadioError> {
        self.intf.write_register(
            FskRegister::RegIrqFlags1,
            IrqFlags1::Rssi.value() | IrqFlags1::PreambleDetect.value() | IrqFlags1::SyncAddressMatch.value(),
        )?;
        self.intf
            .write_register(FskRegister::RegIrqFlags2, IrqFlags2::FifoOverrun.value())
    }

    // Wait for the next frame in continuous mode, leave reception otherwise
    fn gfsk_rx_next(&mut self) -> Result<(), RadioError> {
        self.ctx.fifo = GfskFifo {
            threshold: self.ctx.fifo.threshold,
            ..Default::default()
        };
        if self.ctx.rx_continuous {
            self.intf.modify_register(FskRegister::RegRxConfig, |v| {
                v | RX_CONFIG_RESTART_RX_WITHOUT_PLL_LOCK
            })
        } else {
            self.end_rx()
        }
    }

    fn gfsk_rx_done(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        if self.ctx.gfsk_pkt.crc_type != GfskCrcType::Off {
            let irq_flags = self.intf.read_register(FskRegister::RegIrqFlags2)?;
            if !IrqFlags2::CrcOk.is_set_in(irq_flags) {
                self.clear_gfsk_rx_flags()?;
                self.gfsk_rx_next()?;
                debug!("GFSK frame with CRC error");
                self.ctx.irq_status.insert(IrqStatus::CRC_ERROR);
                return Ok(Some(RadioEvent::RxError));
            }
        }

        if self.ctx.fifo.size == 0 && self.ctx.fifo.nb_bytes == 0 {
            self.read_gfsk_packet_size()?;
        }
        let (start, end) = (self.ctx.fifo.nb_bytes, self.ctx.fifo.size);
        if end > start {
            self.intf
                .read_buffer(Register::RegFifo, &mut self.ctx.buffer[start..end])?;
        }

        let status = PacketStatus { rssi: self.ctx.fifo.rssi, snr: 0 };
        self.ctx.rx_len = end;
        self.ctx.last_status = status;
        self.gfsk_rx_next()?;
        self.ctx.irq_status.insert(IrqStatus::RX_DONE);
        Ok(Some(RadioEvent::RxDone { len: end as u8, status }))
    }

    fn on_dio1(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        match (self.ctx.state, self.ctx.packet_type) {
            (RadioState::RxRunning, PacketType::LoRa) => {
                self.intf
                    .write_register(Register::RegIrqFlags, IrqMask::RxTimeout.value())?;
                self.end_rx()?;
                self.ctx.irq_status.insert(IrqStatus::TIMEOUT);
                Ok(Some(RadioEvent::RxTimeout))
            }
            (RadioState::RxRunning, _) => {
                // FifoLevel: only act while the level is above the threshold
                if !self.intf.iv.dio1_pin_state()? {
                    return Ok(None);
                }
                if self.ctx.fifo.size == 0 && self.ctx.fifo.nb_bytes == 0 {
                    self.read_gfsk_packet_size()?;
                }
                let fifo = self.ctx.fifo;
                let remaining = fifo.size.saturating_sub(fifo.nb_bytes);
                let count = if remaining >= fifo.threshold {
                    fifo.threshold.saturating_sub(1)
                } else {
                    remaining
                };
                if count > 0 {
                    let end = fifo.nb_bytes + count;
                    self.intf
                        .read_buffer(Register::RegFifo, &mut self.ctx.buffer[fifo.nb_bytes..end])?;
                    self.ctx.fifo.nb_bytes = end;
                }
                Ok(None)
            }
            (RadioState::TxRunning, PacketType::Gfsk | PacketType::Ook) => {
                // FifoEmpty: only act once the FIFO drained
                if self.intf.iv.dio1_pin_state()? {
                    return Ok(None);
                }
                let fifo = self.ctx.fifo;
                let count = fifo.size.saturating_sub(fifo.nb_bytes).min(fifo.chunk_size);
                if count > 0 {
                    let end = fifo.nb_bytes + count;
                    self.intf
                        .write_buffer(Register::RegFifo, &self.ctx.buffer[fifo.nb_bytes..end])?;
                    self.ctx.fifo.nb_bytes = end;
                }
                Ok(None)
            }
            _ => {
                warn!("DIO1 in state {}", self.ctx.state);
                Ok(None)
            }
        }
    }

    fn on_dio2(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        match (self.ctx.state, self.ctx.packet_type) {
            (RadioState::RxRunning, PacketType::Gfsk | PacketType::Ook) => {
                // DIO4 is not wired, a sync address match implies the preamble
                self.ctx.fifo.preamble_detected = true;
                if !self.ctx.fifo.sync_word_detected {
                    self.ctx.fifo.sync_word_detected = true;
                    let rssi_value = self.intf.read_register(FskRegister::RegRssiValue)?;
                    self.ctx.fifo.rssi = -((rssi_value >> 1) as i16);
                    self.ctx
                        .irq_status
                        .insert(IrqStatus::PREAMBLE_DETECTED | IrqStatus::SYNC_WORD_VALID);
                }
                Ok(None)
            }
            _ => {
                warn!("DIO2 in state {}", self.ctx.state);
                Ok(None)
            }
        }
    }

    fn on_dio3(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        match (self.ctx.state, self.ctx.packet_type) {
            (RadioState::Cad, PacketType::LoRa) => {
                let irq_flags = self.intf.read_register(Register::RegIrqFlags)?;
                let detected = IrqMask::CADActivityDetected.is_set_in(irq_flags);
                self.intf.write_register(
                    Register::RegIrqFlags,
                    IrqMask::CADDone.value() | IrqMask::CADActivityDetected.value(),
                )?;
                // The chip is back in Standby on its own
                self.ctx.mode = OperatingMode::Standby;
                self.ctx.state = RadioState::Idle;
                self.intf.iv.disable_rf_switch()?;

                self.ctx.irq_status.insert(IrqStatus::CAD_DONE);
                if detected {
                    self.ctx.irq_status.insert(IrqStatus::CAD_DETECTED);
                }
                Ok(Some(RadioEvent::CadDone { detected }))
            }
            (RadioState::RxRunning, PacketType::LoRa) => {
                self.intf
                    .write_register(Register::RegIrqFlags, IrqMask::HeaderValid.value())?;
                self.ctx.irq_status.insert(IrqStatus::HEADER_VALID);
                Ok(None)
            }
            _ => {
                warn!("DIO3 in state {}", self.ctx.state);
                Ok(None)
            }
        }
    }

    fn on_timeout(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        match self.ctx.state {
            RadioState::RxRunning => {
                if self.ctx.packet_type != PacketType::LoRa {
                    self.clear_gfsk_rx_flags()?;
                    self.ctx.fifo = GfskFifo::default();
                }
                self.end_rx()?;
                self.ctx.irq_status.insert(IrqStatus::TIMEOUT);
                Ok(Some(RadioEvent::RxTimeout))
            }
            RadioState::TxRunning => self.recover_from_tx_timeout(),
            _ => Ok(None),
        }
    }

    // A transmission that never signalled TxDone leaves the chip in an unknown state,
    // re-initialize it from a hardware reset.
    fn recover_from_tx_timeout(&mut self) -> Result<Option<RadioEvent>, RadioError> {
        warn!("tx timeout, re-initializing the radio");
        let packet_type = self.ctx.packet_type;
        self.reset()?;
        self.configure_after_reset()?;
        self.set_pkt_type(packet_type)?;
        self.ctx.state = RadioState::Idle;
        self.ctx.irq_status.insert(IrqStatus::TIMEOUT);
        Ok(Some(RadioEvent::TxTimeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FXOSC[32 MHz] * 1000000 (Hz/MHz) / 524288 (2^19)
    const FREQUENCY_SYNTHESIZER_STEP: f64 = 61.03515625;

    #[test]
    fn pll_step_freq_u32_vs_f64() {
        // Whole and half megahertz values are an exact number of steps
        const D: u32 = 2;
        for freq in D * 137..=(D * 1020) {
            let f = freq * (1_000_000 / D);

            let pll = freq_to_pll_step(f);
            assert_eq!(pll, (f as f64 / FREQUENCY_SYNTHESIZER_STEP) as u32);
            assert_eq!(pll_step_to_freq(pll), f);
        }
    }

    #[test]
    fn pll_step_rounds_fractional_steps() {
        for (f, frf) in [(868_100_000, 0xd9_0666), (868_300_000, 0xd9_1333), (868_500_000, 0xd9_2000)] {
            assert_eq!(freq_to_pll_step(f), frf);
        }
        // 100 Hz resolution of CFList and NewChannelReq frequencies
        for f in (137_000_000..=1_020_000_000u32).step_by(100_100) {
            let pll = freq_to_pll_step(f);
            assert_eq!(pll, (f as f64 / FREQUENCY_SYNTHESIZER_STEP).round() as u32);
            assert!(pll_step_to_freq(pll).abs_diff(f) <= FREQUENCY_SYNTHESIZER_STEP as u32 / 2 + 1);
        }
    }

    #[test]
    fn test_rssi_linearization() {
        const DELTA: f32 = 0.5;
        for offset in [SX1272_RSSI_OFFSET, SX1276_RSSI_OFFSET_LF, SX1276_RSSI_OFFSET_HF] {
            for rssi in 0..=u8::MAX {
                let float_rssi = offset as f32 + rssi as f32 * 16.0 / 15.0;
                let approx_rssi = offset + linearize_rssi(rssi);
                let error = float_rssi - approx_rssi as f32;
                assert!(error.abs() < DELTA);
            }
        }
    }
}
