mod fixtures;

use fixtures::*;

use super::*;

fn lora_radio(freq: u32, bw: Bandwidth) -> TestRadio<Sx1276> {
    let mut radio = radio();
    radio.set_rf_freq(freq).unwrap();
    radio
        .set_lora_mod_params(&LoRaModParams::new(SpreadingFactor::_7, bw, CodingRate::_4_5))
        .unwrap();
    radio.set_lora_pkt_params(&LoRaPktParams::default()).unwrap();
    radio.intf.spi.writes.clear();
    radio
}

fn gfsk_radio() -> TestRadio<Sx1276> {
    let mut radio = radio();
    radio.set_pkt_type(PacketType::Gfsk).unwrap();
    radio.set_rf_freq(868_300_000).unwrap();
    radio.set_gfsk_mod_params(&GfskModParams::default()).unwrap();
    radio.set_gfsk_pkt_params(&GfskPktParams::default()).unwrap();
    radio.intf.spi.writes.clear();
    radio
}

#[test]
fn init_rejects_unknown_silicon() {
    let mut radio = uninit_radio(Sx1276, 0x22);
    assert_eq!(radio.init(), Err(RadioError::UnexpectedVersion(0x22)));
}

#[test]
fn init_selects_lora_with_public_sync_word() {
    let radio = radio();
    assert_eq!(radio.packet_type(), PacketType::LoRa);
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.operating_mode(), OperatingMode::Sleep);
    assert_eq!(radio.intf.spi.regs[0x01], 0x88);
    assert_eq!(radio.intf.spi.regs[0x39], 0x34);
    // FSK page defaults were loaded before switching modem
    assert_eq!(radio.intf.spi.regs[0x35], 0x8f);
    assert_eq!(radio.intf.iv.resets, 1);
}

#[test]
fn sx1272_rejects_low_band() {
    let mut radio = uninit_radio(Sx1272, 0x22);
    radio.init().unwrap();
    assert_eq!(
        radio.set_rf_freq(433_175_000),
        Err(RadioError::FrequencyOutOfRange(433_175_000))
    );
    radio.set_rf_freq(868_100_000).unwrap();
    assert_eq!(radio.rf_frequency(), 868_100_000);
}

#[test]
fn channel_frequency_keeps_fractional_steps() {
    let mut radio = radio();
    for (freq, frf) in [(868_100_000, 0xd9_0666), (868_300_000, 0xd9_1333), (868_500_000, 0xd9_2000)] {
        radio.set_rf_freq(freq).unwrap();
        assert_eq!(radio.intf.spi.frf(), frf);
    }
}

#[test]
fn sleep_to_tx_goes_through_standby() {
    let mut radio = radio();
    radio.set_tx(0).unwrap();

    let spi = &radio.intf.spi;
    assert_eq!(spi.written(0x01), [0x89, 0x8b]);
    assert_eq!(spi.written(0x11), [0xf7]);
    assert_eq!(radio.intf.iv.switch, RfSwitch::Tx);
    assert_eq!(radio.state(), RadioState::TxRunning);
    assert_eq!(radio.timer.starts, 0);
}

#[test]
fn tx_done_stops_timer_once() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.write_payload(&[1, 2, 3]).unwrap();
    assert_eq!(radio.intf.spi.fifo_tx, [1, 2, 3]);
    assert_eq!(radio.intf.spi.regs[0x22], 3);

    radio.set_tx(3000).unwrap();
    assert_eq!(radio.timer.last_timeout, Some(3000));
    radio.intf.spi.regs[0x12] = 0x08;

    assert_eq!(radio.handle_irq(IrqSource::Dio0), Ok(Some(RadioEvent::TxDone)));
    assert_eq!(radio.timer.stops, 1);
    assert_eq!(radio.intf.spi.regs[0x12], 0x00);
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.operating_mode(), OperatingMode::Standby);
    assert_eq!(radio.intf.iv.switch, RfSwitch::Off);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::TX_DONE);
    assert!(radio.get_and_clear_irq_status().is_empty());

    // A late timer event has nothing to act on
    assert_eq!(radio.handle_irq(IrqSource::Timer), Ok(None));
    assert_eq!(radio.timer.stops, 1);
}

#[test]
fn single_rx_rejected_for_gfsk() {
    let mut radio = gfsk_radio();
    assert_eq!(radio.set_rx(0), Err(RadioError::SingleRxUnsupported));
    assert!(radio.intf.spi.writes.is_empty());
    assert_eq!(radio.state(), RadioState::Idle);
}

#[test]
fn narrow_bandwidth_rx_shifts_frequency() {
    let mut radio = lora_radio(433_175_000, Bandwidth::_41KHz);
    radio.set_rx(RX_CONTINUOUS).unwrap();

    let spi = &radio.intf.spi;
    assert_eq!(spi.regs[0x2f], 0x44);
    assert_eq!(spi.regs[0x30], 0x00);
    assert_eq!(spi.regs[0x31] & 0x80, 0);
    assert_eq!(spi.regs[0x36], 0x03);
    assert_eq!(spi.frf(), freq_to_pll_step(433_175_000 + 41_670));
    assert_eq!(radio.rf_frequency(), 433_175_000);
    assert_eq!(radio.timer.starts, 0);

    radio.set_tx(0).unwrap();
    assert_eq!(radio.intf.spi.frf(), freq_to_pll_step(433_175_000));
}

#[test]
fn wide_bandwidth_uses_automatic_if() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_500KHz);
    radio.set_rx(1000).unwrap();

    let spi = &radio.intf.spi;
    assert_eq!(spi.regs[0x31] & 0x80, 0x80);
    assert_eq!(spi.regs[0x36], 0x02);
    assert_eq!(spi.regs[0x3a], 0x64);
    assert_eq!(spi.frf(), freq_to_pll_step(868_100_000));
    assert_eq!(radio.timer.last_timeout, Some(1000));
}

#[test]
fn lora_rx_done_reads_payload_and_status() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_rx(1000).unwrap();
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::RxContinuous.value());
    assert_eq!(radio.intf.iv.switch, RfSwitch::Rx);
    assert_eq!(radio.intf.spi.regs[0x11], 0x0f);

    let spi = &mut radio.intf.spi;
    spi.regs[0x12] = 0x40;
    spi.regs[0x13] = 4;
    spi.regs[0x10] = 0;
    spi.regs[0x19] = 40;
    spi.regs[0x1a] = 60;
    spi.fifo_rx.extend([1, 2, 3, 4]);

    let status = PacketStatus { rssi: -93, snr: 10 };
    assert_eq!(
        radio.handle_irq(IrqSource::Dio0),
        Ok(Some(RadioEvent::RxDone { len: 4, status }))
    );
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::Standby.value());
    assert_eq!(radio.timer.stops, 1);
    assert_eq!(radio.get_lora_pkt_status(), Ok(status));
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::RX_DONE);

    let mut buf = [0u8; 8];
    assert_eq!(radio.read_payload(&mut buf), Ok(4));
    assert_eq!(buf[..4], [1, 2, 3, 4]);
    let mut small = [0u8; 2];
    assert_eq!(radio.read_payload(&mut small), Err(RadioError::PayloadSizeMismatch(4, 2)));
}

#[test]
fn lora_rx_negative_snr_rssi() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_rx(RX_CONTINUOUS).unwrap();

    let spi = &mut radio.intf.spi;
    spi.regs[0x13] = 1;
    spi.regs[0x19] = 0xf0;
    spi.regs[0x1a] = 60;
    spi.fifo_rx.push_back(0xaa);

    let status = PacketStatus { rssi: -98, snr: -4 };
    assert_eq!(
        radio.handle_irq(IrqSource::Dio0),
        Ok(Some(RadioEvent::RxDone { len: 1, status }))
    );
    // Continuous reception carries on
    assert_eq!(radio.state(), RadioState::RxRunning);
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::RxContinuous.value());
}

#[test]
fn lora_crc_error() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_rx(1000).unwrap();
    radio.intf.spi.regs[0x12] = 0x60;

    assert_eq!(radio.handle_irq(IrqSource::Dio0), Ok(Some(RadioEvent::RxError)));
    assert_eq!(radio.intf.spi.regs[0x12], 0x00);
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::CRC_ERROR);
}

#[test]
fn lora_single_rx_symbol_timeout() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_lora_symb_num_timeout(2).unwrap();
    assert_eq!(radio.intf.spi.regs[0x1f], 4);

    radio.set_rx(0).unwrap();
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::RxSingle.value());
    assert_eq!(radio.timer.starts, 0);

    assert_eq!(radio.handle_irq(IrqSource::Dio1), Ok(Some(RadioEvent::RxTimeout)));
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.operating_mode(), OperatingMode::Standby);
    assert_eq!(radio.intf.iv.switch, RfSwitch::Off);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::TIMEOUT);
}

#[test]
fn lora_header_valid_is_reported() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_rx(RX_CONTINUOUS).unwrap();
    radio.intf.spi.regs[0x12] = 0x10;

    assert_eq!(radio.handle_irq(IrqSource::Dio3), Ok(None));
    assert_eq!(radio.intf.spi.regs[0x12], 0x00);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::HEADER_VALID);
}

#[test]
fn rx_timer_expiry() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_rx(500).unwrap();
    radio.timer.expire();

    assert_eq!(radio.handle_irq(IrqSource::Timer), Ok(Some(RadioEvent::RxTimeout)));
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::Standby.value());
}

#[test]
fn lora_parameters_validation() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio
        .set_lora_mod_params(&LoRaModParams::new(SpreadingFactor::_6, Bandwidth::_125KHz, CodingRate::_4_5))
        .unwrap();
    assert_eq!(radio.intf.spi.regs[0x37], 0x0c);
    assert_eq!(
        radio.set_lora_pkt_params(&LoRaPktParams::default()),
        Err(RadioError::InvalidSF6ExplicitHeaderRequest)
    );
    assert_eq!(
        radio.set_lora_mod_params(&LoRaModParams::new(SpreadingFactor::_5, Bandwidth::_125KHz, CodingRate::_4_5)),
        Err(RadioError::UnavailableSpreadingFactor)
    );
    assert_eq!(radio.get_gfsk_pkt_status(), Err(RadioError::WrongPacketType));
    assert_eq!(radio.set_rf_freq(100_000_000), Err(RadioError::FrequencyOutOfRange(100_000_000)));
}

#[test]
fn iq_inversion_registers() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    let pkt = LoRaPktParams { iq_inverted: true, ..Default::default() };
    radio.set_lora_pkt_params(&pkt).unwrap();
    assert_eq!(radio.intf.spi.regs[0x33], 0x66);
    assert_eq!(radio.intf.spi.regs[0x3b], 0x19);
}

#[test]
fn cad_reports_activity() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_cad().unwrap();
    assert_eq!(radio.state(), RadioState::Cad);
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::Cad.value());
    assert_eq!(radio.intf.spi.regs[0x11], 0xfa);

    radio.intf.spi.regs[0x12] = 0x05;
    assert_eq!(
        radio.handle_irq(IrqSource::Dio3),
        Ok(Some(RadioEvent::CadDone { detected: true }))
    );
    assert_eq!(radio.intf.spi.regs[0x12], 0x00);
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(
        radio.get_and_clear_irq_status(),
        IrqStatus::CAD_DONE | IrqStatus::CAD_DETECTED
    );
}

#[test]
fn cad_requires_lora() {
    let mut radio = gfsk_radio();
    assert_eq!(radio.set_cad(), Err(RadioError::WrongPacketType));
}

#[test]
fn tx_timeout_reinitializes_radio() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.set_lora_public_network(false).unwrap();
    radio.set_tx(500).unwrap();
    radio.intf.spi.writes.clear();
    radio.timer.expire();

    assert_eq!(radio.handle_irq(IrqSource::Timer), Ok(Some(RadioEvent::TxTimeout)));
    assert_eq!(radio.intf.iv.resets, 2);
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.packet_type(), PacketType::LoRa);
    assert_eq!(radio.intf.spi.written(0x39), [0x12]);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::TIMEOUT);
}

#[test]
fn tx_timeout_restores_gfsk_modem_and_sync_word() {
    let mut radio = gfsk_radio();
    radio.set_gfsk_sync_word(&[0xaa, 0xbb, 0xcc]).unwrap();
    radio.write_payload(&[1]).unwrap();
    radio.set_tx(500).unwrap();
    radio.intf.spi.regs[0x28] = 0;
    radio.timer.expire();

    assert_eq!(radio.handle_irq(IrqSource::Timer), Ok(Some(RadioEvent::TxTimeout)));
    assert_eq!(radio.packet_type(), PacketType::Gfsk);
    assert_eq!(radio.intf.spi.regs[0x01] & 0x80, 0);
    assert_eq!(radio.intf.spi.regs[0x28..0x2b], [0xaa, 0xbb, 0xcc]);
}

#[test]
fn gfsk_modulation_registers() {
    let mut radio = gfsk_radio();
    let spi = &radio.intf.spi;
    // 32 MHz / 50 kbps
    assert_eq!(spi.regs[0x02..0x04], [0x02, 0x80]);
    // 25 kHz / 61.035 Hz
    assert_eq!(spi.regs[0x04..0x06], [0x01, 0x99]);
    assert_eq!(spi.regs[0x12], 0x0b);
    assert_eq!(spi.regs[0x13], 0x12);
    assert_eq!(spi.regs[0x0a] & 0x60, 0x20);

    // Packet parameters
    assert_eq!(spi.regs[0x25..0x27], [0x00, 0x05]);
    assert_eq!(spi.regs[0x27] & 0x17, 0x12);
    assert_eq!(spi.regs[0x30], 0xd8);
    assert_eq!(spi.regs[0x32], 0xff);

    let slow = GfskModParams { bitrate_bps: 300, ..Default::default() };
    assert_eq!(radio.set_gfsk_mod_params(&slow), Err(RadioError::InvalidBitrate));
    let zero = GfskModParams { bitrate_bps: 0, ..Default::default() };
    assert_eq!(radio.set_gfsk_mod_params(&zero), Err(RadioError::InvalidBitrate));
}

#[test]
fn ook_requires_ook_shaping() {
    let mut radio = radio();
    radio.set_pkt_type(PacketType::Ook).unwrap();
    assert_eq!(radio.intf.spi.regs[0x01] & 0xe0, 0x20);
    assert_eq!(
        radio.set_gfsk_mod_params(&GfskModParams::default()),
        Err(RadioError::WrongPacketType)
    );
    let ook = GfskModParams {
        pulse_shape: PulseShape::Ook(OokPulseShape::CutoffBitrate),
        ..Default::default()
    };
    radio.set_gfsk_mod_params(&ook).unwrap();
}

#[test]
fn gfsk_sync_word_length() {
    let mut radio = gfsk_radio();
    radio.set_gfsk_sync_word(&[0x12, 0x34]).unwrap();
    assert_eq!(radio.intf.spi.regs[0x28..0x2a], [0x12, 0x34]);
    assert_eq!(radio.set_gfsk_sync_word(&[]), Err(RadioError::InvalidSyncWordLength(0)));
    assert_eq!(radio.set_gfsk_sync_word(&[0; 9]), Err(RadioError::InvalidSyncWordLength(9)));

    let pkt = GfskPktParams { sync_word_len_bits: 72, ..Default::default() };
    assert_eq!(radio.set_gfsk_pkt_params(&pkt), Err(RadioError::InvalidSyncWordLength(9)));
}

#[test]
fn gfsk_tx_refills_fifo_in_chunks() {
    let mut radio = gfsk_radio();
    let payload: Vec<u8> = (0..100).collect();
    radio.write_payload(&payload).unwrap();
    assert_eq!(radio.intf.spi.fifo_tx.len(), 1 + 32);

    radio.set_tx(0).unwrap();
    // FIFO still above the empty level
    radio.intf.iv.dio1 = true;
    assert_eq!(radio.handle_irq(IrqSource::Dio1), Ok(None));
    assert_eq!(radio.intf.spi.fifo_tx.len(), 1 + 32);

    radio.intf.iv.dio1 = false;
    for expected in [64, 96, 100, 100] {
        assert_eq!(radio.handle_irq(IrqSource::Dio1), Ok(None));
        assert_eq!(radio.intf.spi.fifo_tx.len(), 1 + expected);
    }

    assert_eq!(radio.handle_irq(IrqSource::Dio0), Ok(Some(RadioEvent::TxDone)));
    assert_eq!(radio.intf.spi.fifo_tx[0], 100);
    assert_eq!(radio.intf.spi.fifo_tx[1..], payload[..]);
    assert_eq!(radio.intf.spi.mode_bits(), OperatingMode::Standby.value());
}

#[test]
fn gfsk_short_frame_fits_fifo() {
    let mut radio = gfsk_radio();
    radio.write_payload(&[9; 64]).unwrap();
    assert_eq!(radio.intf.spi.fifo_tx.len(), 1 + 64);
    assert_eq!(
        radio.write_payload(&[0; 256]),
        Err(RadioError::PayloadSizeUnexpected(256))
    );
}

#[test]
fn gfsk_rx_drains_fifo_by_threshold() {
    let mut radio = gfsk_radio();
    radio.set_rx(2000).unwrap();
    assert_eq!(radio.intf.spi.regs[0x0d], 0x1e);

    let spi = &mut radio.intf.spi;
    spi.regs[0x11] = 180;
    spi.regs[0x3f] = 0x02;
    spi.fifo_rx.push_back(40);
    spi.fifo_rx.extend(0..40u8);

    assert_eq!(radio.handle_irq(IrqSource::Dio2), Ok(None));
    assert_eq!(
        radio.get_and_clear_irq_status(),
        IrqStatus::PREAMBLE_DETECTED | IrqStatus::SYNC_WORD_VALID
    );

    radio.intf.iv.dio1 = true;
    // Length byte, then threshold - 1 bytes per FIFO level event
    assert_eq!(radio.handle_irq(IrqSource::Dio1), Ok(None));
    assert_eq!(radio.intf.spi.fifo_rx.len(), 26);
    assert_eq!(radio.handle_irq(IrqSource::Dio1), Ok(None));
    assert_eq!(radio.intf.spi.fifo_rx.len(), 12);

    let status = PacketStatus { rssi: -90, snr: 0 };
    assert_eq!(
        radio.handle_irq(IrqSource::Dio0),
        Ok(Some(RadioEvent::RxDone { len: 40, status }))
    );
    assert!(radio.intf.spi.fifo_rx.is_empty());
    assert_eq!(radio.state(), RadioState::Idle);
    assert_eq!(radio.timer.stops, 1);
    assert_eq!(radio.get_gfsk_pkt_status(), Ok(status));

    let mut buf = [0u8; 64];
    assert_eq!(radio.read_payload(&mut buf), Ok(40));
    assert!(buf[..40].iter().copied().eq(0..40u8));
}

#[test]
fn gfsk_crc_error_restarts_continuous_rx() {
    let mut radio = gfsk_radio();
    radio.set_rx(RX_CONTINUOUS).unwrap();
    radio.intf.spi.regs[0x3f] = 0x14;

    assert_eq!(radio.handle_irq(IrqSource::Dio0), Ok(Some(RadioEvent::RxError)));
    assert_eq!(radio.intf.spi.written(0x3e), [0x0b]);
    assert_eq!(radio.intf.spi.regs[0x3f], 0x04);
    assert_eq!(radio.intf.spi.regs[0x0d], 0x5e);
    assert_eq!(radio.state(), RadioState::RxRunning);
    assert_eq!(radio.get_and_clear_irq_status(), IrqStatus::CRC_ERROR);
}

#[test]
fn tx_cw_configures_continuous_mode() {
    let mut radio = gfsk_radio();
    radio.set_tx_cw(1000).unwrap();
    let spi = &radio.intf.spi;
    assert_eq!(spi.regs[0x04..0x06], [0, 0]);
    assert_eq!(spi.regs[0x31] & 0x40, 0);
    assert_eq!(spi.regs[0x40], 0xf0);
    assert_eq!(spi.regs[0x41], 0xa0);
    assert_eq!(spi.mode_bits(), OperatingMode::Tx.value());
    assert_eq!(radio.timer.last_timeout, Some(1000));
}

#[test]
fn tx_power_through_rfo() {
    let mut radio = radio();
    radio.set_tx_params(14, RampTime::Ramp40Us).unwrap();
    let spi = &radio.intf.spi;
    assert_eq!(spi.regs[0x09], 0x7e);
    assert_eq!(spi.regs[0x0b], 0x2b);
    assert_eq!(spi.regs[0x4d], 0x84);
    assert_eq!(spi.regs[0x0a], 0x09);
}

#[test]
fn rssi_inst_per_modem() {
    let mut radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    radio.intf.spi.regs[0x1b] = 60;
    assert_eq!(radio.get_rssi_inst(), Ok(-97));

    let mut radio = gfsk_radio();
    radio.intf.spi.regs[0x11] = 180;
    assert_eq!(radio.get_rssi_inst(), Ok(-90));
}

#[test]
fn random_number_from_wideband_rssi() {
    let mut radio = gfsk_radio();
    radio.intf.spi.regs[0x2c] = 0x01;
    assert_eq!(radio.get_random_number(), Ok(u32::MAX));
    assert_eq!(radio.packet_type(), PacketType::LoRa);
    assert_eq!(radio.intf.spi.regs[0x11], 0xff);
    assert_eq!(radio.operating_mode(), OperatingMode::Sleep);

    radio.intf.spi.regs[0x2c] = 0xfe;
    assert_eq!(radio.get_random_number(), Ok(0));
}

#[test]
fn time_on_air_follows_packet_type() {
    let radio = lora_radio(868_100_000, Bandwidth::_125KHz);
    let params = LoRaModParams::new(SpreadingFactor::_7, Bandwidth::_125KHz, CodingRate::_4_5);
    assert_eq!(
        radio.time_on_air_ms(10),
        lora_time_on_air(&LoRaPktParams::default().packet(10), &params)
    );
    assert_eq!(radio.wakeup_time_ms(), 1);

    let radio = gfsk_radio();
    assert_eq!(
        radio.time_on_air_ms(10),
        gfsk_time_on_air(&GfskPktParams::default().packet(10), 50_000)
    );
}
