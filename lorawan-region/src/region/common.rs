//! Building blocks shared by the regional channel plans: range checks, duty-cycle bookkeeping,
//! LinkADRReq evaluation, receive window sizing and power computation.
use super::constants::*;
use super::{Band, CalcBackOffParams, Channel, LinkAdrReqAnswer, RxWindowParams};
use crate::maccommands::LinkAdrReqPayload;
use crate::types::ChannelMask;

/// Bit of each MAC command answer status.
pub const STATUS_CHANNEL_MASK_ACK: u8 = 0x01;
pub const STATUS_DATARATE_ACK: u8 = 0x02;
pub const STATUS_POWER_ACK: u8 = 0x04;

pub fn value_in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    value >= min && value <= max
}

/// Whether `datarate` is within `min_dr..=max_dr` and supported by at least one channel enabled
/// in `mask`.
pub fn chan_verify_dr(
    mask: &ChannelMask<2>,
    channels: &[Option<Channel>],
    datarate: u8,
    min_dr: u8,
    max_dr: u8,
) -> bool {
    if !value_in_range(datarate, min_dr, max_dr) {
        return false;
    }
    channels.iter().enumerate().any(|(i, channel)| {
        mask.is_enabled(i) && channel.is_some_and(|c| c.datarates().contains(datarate))
    })
}

/// Clear channel `id` from `mask`. Fails for ids at or beyond `max_channels`.
pub fn chan_disable(mask: &mut ChannelMask<2>, id: u8, max_channels: u8) -> bool {
    if id >= max_channels {
        return false;
    }
    mask.set_channel(id as usize, false);
    true
}

/// Number of enabled channels in banks `start..stop` of `mask`.
pub fn count_channels<const N: usize>(mask: &ChannelMask<N>, start: usize, stop: usize) -> u32 {
    (start..stop.min(N)).map(|i| mask.bank(i).count_ones()).sum()
}

/// Release the bands whose time-off elapsed at `now` and return the shortest remaining time-off
/// among the others, 0 when none is restricted.
pub fn update_band_time_off(joined: bool, duty_cycle: bool, bands: &mut [Band], now: u64) -> u64 {
    let mut next_tx_delay = u64::MAX;
    for band in bands.iter_mut() {
        let elapsed_tx = now.saturating_sub(band.last_tx_done);
        if !joined {
            let elapsed_join = now.saturating_sub(band.last_join_tx_done);
            let tx_done = elapsed_join.max(if duty_cycle { elapsed_tx } else { 0 });
            if band.time_off <= tx_done {
                band.time_off = 0;
            }
            if band.time_off != 0 {
                next_tx_delay = next_tx_delay.min(band.time_off - tx_done);
            }
        } else if duty_cycle {
            if band.time_off <= elapsed_tx {
                band.time_off = 0;
            }
            if band.time_off != 0 {
                next_tx_delay = next_tx_delay.min(band.time_off - elapsed_tx);
            }
        } else {
            next_tx_delay = 0;
            band.time_off = 0;
        }
    }
    if next_tx_delay == u64::MAX {
        0
    } else {
        next_tx_delay
    }
}

/// Record the end of a transmission in `band`.
pub fn set_band_tx_done(joined: bool, band: &mut Band, last_tx_done: u64) {
    if joined {
        band.last_tx_done = last_tx_done;
    } else {
        band.last_join_tx_done = last_tx_done;
    }
}

/// Compute the time-off `band` owes for the transmission described by `params`. Join requests
/// follow the stricter of the band duty cycle and the join back-off schedule.
pub fn calc_back_off(band: &mut Band, params: &CalcBackOffParams) {
    let mut duty_cycle = band.duty_cycle as u64;
    let time_on_air = params.tx_time_on_air;
    band.time_off = 0;

    if !params.joined {
        let join_duty_cycle = if params.elapsed_since_startup < BACKOFF_1_HOUR_MS {
            BACKOFF_DC_1_HOUR
        } else if params.elapsed_since_startup < BACKOFF_11_HOURS_MS {
            BACKOFF_DC_10_HOURS
        } else {
            BACKOFF_DC_24_HOURS
        };
        duty_cycle = duty_cycle.max(join_duty_cycle as u64);
        // duty cycle off and not a join: a rejoin, the join back-off starts with the first request
        if params.duty_cycle_enabled || params.last_tx_is_join_request {
            band.time_off = (time_on_air * duty_cycle).saturating_sub(time_on_air);
        }
    } else if params.duty_cycle_enabled {
        band.time_off = (time_on_air * duty_cycle).saturating_sub(time_on_air);
    }
}

/// Read the LinkADRReq at the start of `payload`. The payload starts with the CID.
pub fn parse_link_adr_req(payload: &[u8]) -> Option<LinkAdrReqPayload<'_>> {
    let (&cid, rest) = payload.split_first()?;
    if cid != LinkAdrReqPayload::cid() {
        return None;
    }
    rest.get(..LinkAdrReqPayload::len()).map(LinkAdrReqPayload::new_from_raw)
}

/// LinkADRReq values checked against the channel plan.
pub struct LinkAdrVerifyParams<'a> {
    /// Status of the channel mask evaluation.
    pub status: u8,
    pub adr_enabled: bool,
    pub datarate: u8,
    pub tx_power: u8,
    pub nb_rep: u8,
    pub current_datarate: u8,
    pub current_tx_power: u8,
    pub current_nb_rep: u8,
    /// The mask the request would install.
    pub channels_mask: &'a ChannelMask<2>,
    pub channels: &'a [Option<Channel>],
    pub min_dr: u8,
    pub max_dr: u8,
    /// Index of the lowest power.
    pub min_tx_power: u8,
    /// Index of the highest power.
    pub max_tx_power: u8,
}

/// Datarate 0xF and power 0xF keep the current values. Without ADR the datarate and power are
/// refused and kept.
pub fn link_adr_req_verify_params(params: &LinkAdrVerifyParams<'_>) -> LinkAdrReqAnswer {
    let mut status = params.status;
    let mut datarate = params.datarate;
    let mut tx_power = params.tx_power;
    let mut nb_rep = params.nb_rep;

    // without ADR the settings stay, the mask may still change
    if !params.adr_enabled {
        datarate = params.current_datarate;
        tx_power = params.current_tx_power;
        nb_rep = params.current_nb_rep;
    }

    if status != 0 {
        if datarate == 0x0f {
            datarate = params.current_datarate;
        } else if !chan_verify_dr(
            params.channels_mask,
            params.channels,
            datarate,
            params.min_dr,
            params.max_dr,
        ) {
            status &= !STATUS_DATARATE_ACK;
        }

        if tx_power == 0x0f {
            tx_power = params.current_tx_power;
        } else if !value_in_range(tx_power, params.max_tx_power, params.min_tx_power) {
            status &= !STATUS_POWER_ACK;
        }
    }

    if status == 0x07 && nb_rep == 0 {
        nb_rep = 1;
    }

    LinkAdrReqAnswer { status, datarate, tx_power, nb_rep, bytes_processed: 0 }
}

/// LoRa symbol duration in microseconds.
pub fn compute_symbol_time_lora(spreading_factor: u8, bandwidth_hz: u32) -> u32 {
    if bandwidth_hz == 0 {
        return 0;
    }
    ((1u64 << spreading_factor) * 1_000_000 / bandwidth_hz as u64) as u32
}

/// FSK "symbol" duration in microseconds, a symbol being one byte.
pub fn compute_symbol_time_fsk(bitrate_kbps: u8) -> u32 {
    if bitrate_kbps == 0 {
        return 0;
    }
    8000 / bitrate_kbps as u32
}

fn div_ceil(numerator: i64, denominator: i64) -> i64 {
    let q = numerator.div_euclid(denominator);
    if numerator.rem_euclid(denominator) != 0 {
        q + 1
    } else {
        q
    }
}

/// Size a receive window so that `min_rx_symbols` preamble symbols are caught despite a timing
/// error of `rx_error_ms` on both sides, and place it so that the radio, waking up
/// `wakeup_ms` early, is listening 4 symbols before the preamble ends.
pub fn compute_rx_window_parameters(
    t_symbol_us: u32,
    min_rx_symbols: u8,
    rx_error_ms: u32,
    wakeup_ms: u32,
) -> RxWindowParams {
    let min_rx_symbols = min_rx_symbols as i64;
    if t_symbol_us == 0 {
        return RxWindowParams { timeout_symbols: min_rx_symbols as u32, offset_ms: 0 };
    }
    let t_symbol = t_symbol_us as i64;
    let timeout = div_ceil((2 * min_rx_symbols - 8) * t_symbol + 2 * rx_error_ms as i64 * 1000, t_symbol)
        .max(min_rx_symbols);
    // doubled to keep the half window exact
    let offset = div_ceil(8 * t_symbol - timeout * t_symbol - 2000 * wakeup_ms as i64, 2000);
    RxWindowParams { timeout_symbols: timeout as u32, offset_ms: offset as i32 }
}

/// Conducted power in dBm for power index `tx_power` (2 dB steps below the max EIRP). EIRP and
/// antenna gain are in hundredths of a dB, the result is rounded down.
pub fn compute_tx_power(tx_power: u8, max_eirp: i16, antenna_gain: i16) -> i8 {
    let centi_dbm = max_eirp as i32 - 200 * tx_power as i32 - antenna_gain as i32;
    centi_dbm.div_euclid(100).clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Keep the power index at or below the band maximum (a higher index is a lower power).
pub fn limit_tx_power(tx_power: u8, max_band_tx_power: u8) -> u8 {
    tx_power.max(max_band_tx_power)
}

/// The closest datarate below `current` supported by an enabled channel, `min_dr` when there
/// is none.
pub fn get_next_lower_tx_dr(
    current: u8,
    min_dr: u8,
    max_dr: u8,
    mask: &ChannelMask<2>,
    channels: &[Option<Channel>],
) -> u8 {
    if current <= min_dr {
        return min_dr;
    }
    let mut dr = current;
    loop {
        dr -= 1;
        if dr == min_dr || chan_verify_dr(mask, channels, dr, min_dr, max_dr) {
            return dr;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::region::DR;
    use crate::types::DataRateRange;

    fn channels() -> [Option<Channel>; 16] {
        let mut channels = [None; 16];
        channels[0] = Some(Channel::new(868_100_000, DataRateRange::new_range(DR::_0, DR::_5)));
        channels[1] = Some(Channel::new(868_300_000, DataRateRange::new_range(DR::_0, DR::_5)));
        channels[4] = Some(Channel::new(868_800_000, DataRateRange::new_range(DR::_7, DR::_7)));
        channels
    }

    #[test]
    fn range_check_is_inclusive() {
        assert!(value_in_range(0, 0, 7));
        assert!(value_in_range(7, 0, 7));
        assert!(!value_in_range(8u8, 0, 7));
    }

    #[test]
    fn datarate_needs_an_enabled_channel() {
        let channels = channels();
        let mask = ChannelMask::from(0x0003);
        assert!(chan_verify_dr(&mask, &channels, 5, 0, 7));
        assert!(!chan_verify_dr(&mask, &channels, 7, 0, 7));
        assert!(chan_verify_dr(&ChannelMask::from(0x0010), &channels, 7, 0, 7));
        assert!(!chan_verify_dr(&mask, &channels, 8, 0, 7));
        // enabled but undefined channels don't count
        assert!(!chan_verify_dr(&ChannelMask::from(0x0008), &channels, 0, 0, 7));
    }

    #[test]
    fn disable_and_count() {
        let mut mask = ChannelMask::from(0x0107);
        assert_eq!(count_channels(&mask, 0, 2), 4);
        assert_eq!(count_channels(&mask, 1, 2), 1);
        assert!(chan_disable(&mut mask, 8, 16));
        assert!(!chan_disable(&mut mask, 16, 16));
        assert_eq!(u16::from(mask), 0x0007);
    }

    #[test]
    fn next_lower_datarate_skips_unsupported() {
        let channels = channels();
        let mask = ChannelMask::from(0x0013);
        assert_eq!(get_next_lower_tx_dr(7, 0, 7, &mask, &channels), 5);
        assert_eq!(get_next_lower_tx_dr(5, 0, 7, &mask, &channels), 4);
        assert_eq!(get_next_lower_tx_dr(0, 0, 7, &mask, &channels), 0);
        let only_fsk = ChannelMask::from(0x0010);
        assert_eq!(get_next_lower_tx_dr(7, 0, 7, &only_fsk, &channels), 0);
    }

    #[test]
    fn symbol_times() {
        assert_eq!(compute_symbol_time_lora(7, 125_000), 1024);
        assert_eq!(compute_symbol_time_lora(12, 125_000), 32768);
        assert_eq!(compute_symbol_time_lora(7, 250_000), 512);
        assert_eq!(compute_symbol_time_fsk(50), 160);
    }

    #[test]
    fn rx_window_sizing() {
        // SF7BW125, 6 symbols, 10 ms error, 1 ms wakeup
        let params = compute_rx_window_parameters(1024, 6, 10, 1);
        assert_eq!(params, RxWindowParams { timeout_symbols: 24, offset_ms: -9 });
        // SF12BW125: the error is small against the symbol time
        let params = compute_rx_window_parameters(32768, 6, 10, 1);
        assert_eq!(params, RxWindowParams { timeout_symbols: 6, offset_ms: 32 });
        // FSK 50 kbps
        let params = compute_rx_window_parameters(160, 6, 10, 1);
        assert_eq!(params, RxWindowParams { timeout_symbols: 129, offset_ms: -10 });
    }

    #[test]
    fn tx_power_steps() {
        assert_eq!(compute_tx_power(0, 1600, 215), 13);
        assert_eq!(compute_tx_power(1, 1600, 215), 11);
        assert_eq!(compute_tx_power(7, 1600, 215), -1);
        assert_eq!(compute_tx_power(0, 1600, 0), 16);
        assert_eq!(limit_tx_power(2, 0), 2);
        assert_eq!(limit_tx_power(0, 3), 3);
    }

    #[test]
    fn band_time_off_elapses() {
        let mut bands = [Band::new(100, 0), Band::new(1000, 0)];
        bands[0].last_tx_done = 1000;
        bands[0].time_off = 9900;
        bands[1].last_tx_done = 2000;
        bands[1].time_off = 2000;

        assert_eq!(update_band_time_off(true, true, &mut bands, 3000), 1000);
        assert_eq!(update_band_time_off(true, true, &mut bands, 4000), 6900);
        assert_eq!(bands[1].time_off, 0);
        assert_eq!(update_band_time_off(true, true, &mut bands, 10_900), 0);
        assert_eq!(bands[0].time_off, 0);

        bands[0].time_off = 500;
        assert_eq!(update_band_time_off(true, false, &mut bands, 10_900), 0);
        assert_eq!(bands[0].time_off, 0);
    }

    #[test]
    fn join_back_off_schedule() {
        let mut band = Band::new(100, 0);
        let mut params = CalcBackOffParams {
            channel: 0,
            joined: false,
            duty_cycle_enabled: true,
            last_tx_is_join_request: true,
            elapsed_since_startup: 0,
            tx_time_on_air: 100,
        };
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 9900);

        params.elapsed_since_startup = 2 * BACKOFF_1_HOUR_MS;
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 99_900);

        params.elapsed_since_startup = 12 * BACKOFF_1_HOUR_MS;
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 999_900);

        params.duty_cycle_enabled = false;
        params.last_tx_is_join_request = false;
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 0);

        params.joined = true;
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 0);
        params.duty_cycle_enabled = true;
        calc_back_off(&mut band, &params);
        assert_eq!(band.time_off, 9900);
    }

    #[test]
    fn link_adr_req_needs_its_cid() {
        assert!(parse_link_adr_req(&[0x03, 0x52, 0x07, 0x00, 0x01]).is_some());
        assert!(parse_link_adr_req(&[0x05, 0x52, 0x07, 0x00, 0x01]).is_none());
        assert!(parse_link_adr_req(&[0x03, 0x52, 0x07]).is_none());
        assert!(parse_link_adr_req(&[]).is_none());
    }

    #[test]
    fn link_adr_verification() {
        let channels = channels();
        let mask = ChannelMask::from(0x0003);
        let mut params = LinkAdrVerifyParams {
            status: 0x07,
            adr_enabled: true,
            datarate: 5,
            tx_power: 2,
            nb_rep: 0,
            current_datarate: 0,
            current_tx_power: 1,
            current_nb_rep: 1,
            channels_mask: &mask,
            channels: &channels,
            min_dr: 0,
            max_dr: 7,
            min_tx_power: 7,
            max_tx_power: 0,
        };
        let answer = link_adr_req_verify_params(&params);
        assert_eq!((answer.status, answer.datarate, answer.tx_power, answer.nb_rep), (0x07, 5, 2, 1));

        params.datarate = 0x0f;
        params.tx_power = 0x0f;
        let answer = link_adr_req_verify_params(&params);
        assert_eq!((answer.status, answer.datarate, answer.tx_power), (0x07, 0, 1));

        params.datarate = 7;
        params.tx_power = 8;
        let answer = link_adr_req_verify_params(&params);
        assert_eq!(answer.status, STATUS_CHANNEL_MASK_ACK);

        params.adr_enabled = false;
        params.datarate = 5;
        params.tx_power = 2;
        params.nb_rep = 3;
        let answer = link_adr_req_verify_params(&params);
        assert_eq!((answer.status, answer.datarate, answer.tx_power, answer.nb_rep), (0x07, 0, 1, 1));

        // the current settings are verified in place of the requested ones
        params.current_tx_power = 9;
        let answer = link_adr_req_verify_params(&params);
        assert_eq!(answer.status, STATUS_CHANNEL_MASK_ACK | STATUS_DATARATE_ACK);
    }
}
