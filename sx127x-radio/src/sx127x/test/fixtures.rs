use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};

use crate::mod_params::RadioError;
use crate::mod_traits::{InterfaceVariant, RadioTimer};
use crate::sx127x::{Config, Sx1276, Sx127x, Sx127xVariant};

#[derive(Debug)]
pub struct SpiFault;

impl embedded_hal::spi::Error for SpiFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Register file of an SX127x behind the SPI bus.
///
/// The first byte of a transaction selects the address, with bit 7 set for writes. Bursts
/// auto-increment the address except on the FIFO. The interrupt flag registers of the
/// selected modem clear the bits written as one.
pub struct TestSpi {
    pub regs: [u8; 128],
    pub fifo_tx: Vec<u8>,
    pub fifo_rx: VecDeque<u8>,
    pub writes: Vec<(u8, u8)>,
}

impl TestSpi {
    pub fn new() -> Self {
        let mut regs = [0u8; 128];
        regs[0x01] = 0x09;
        regs[0x42] = 0x12;
        Self { regs, fifo_tx: Vec::new(), fifo_rx: VecDeque::new(), writes: Vec::new() }
    }

    fn lora_mode(&self) -> bool {
        self.regs[0x01] & 0x80 != 0
    }

    fn write_reg(&mut self, addr: u8, value: u8) {
        self.writes.push((addr, value));
        let lora = self.lora_mode();
        match addr {
            0x00 => self.fifo_tx.push(value),
            0x12 if lora => self.regs[0x12] &= !value,
            0x3e | 0x3f if !lora => self.regs[addr as usize] &= !value,
            _ => self.regs[addr as usize] = value,
        }
    }

    fn read_reg(&mut self, addr: u8) -> u8 {
        match addr {
            0x00 => self.fifo_rx.pop_front().unwrap_or(0),
            _ => self.regs[addr as usize],
        }
    }

    /// Values written to `addr` since the log was last cleared
    pub fn written(&self, addr: u8) -> Vec<u8> {
        self.writes.iter().filter(|(a, _)| *a == addr).map(|(_, v)| *v).collect()
    }

    /// Carrier frequency register content
    pub fn frf(&self) -> u32 {
        (self.regs[0x06] as u32) << 16 | (self.regs[0x07] as u32) << 8 | self.regs[0x08] as u32
    }

    pub fn mode_bits(&self) -> u8 {
        self.regs[0x01] & 0x07
    }
}

fn next_addr(addr: u8) -> u8 {
    match addr {
        0x00 => 0x00,
        _ => (addr + 1) & 0x7f,
    }
}

impl ErrorType for TestSpi {
    type Error = SpiFault;
}

impl SpiDevice<u8> for TestSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SpiFault> {
        let mut cursor: Option<(u8, bool)> = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        match cursor {
                            None => cursor = Some((b & 0x7f, b & 0x80 != 0)),
                            Some((addr, true)) => {
                                self.write_reg(addr, b);
                                cursor = Some((next_addr(addr), true));
                            }
                            Some((_, false)) => return Err(SpiFault),
                        }
                    }
                }
                Operation::Read(buf) => {
                    let Some((mut addr, false)) = cursor else {
                        return Err(SpiFault);
                    };
                    for b in buf.iter_mut() {
                        *b = self.read_reg(addr);
                        addr = next_addr(addr);
                    }
                    cursor = Some((addr, false));
                }
                _ => return Err(SpiFault),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfSwitch {
    Off,
    Rx,
    Tx,
}

pub struct DummyVariant {
    pub dio1: bool,
    pub resets: usize,
    pub switch: RfSwitch,
}

impl InterfaceVariant for DummyVariant {
    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), RadioError> {
        delay.delay_ms(1);
        self.resets += 1;
        Ok(())
    }

    fn dio1_pin_state(&mut self) -> Result<bool, RadioError> {
        Ok(self.dio1)
    }

    fn enable_rf_switch_rx(&mut self) -> Result<(), RadioError> {
        self.switch = RfSwitch::Rx;
        Ok(())
    }

    fn enable_rf_switch_tx(&mut self) -> Result<(), RadioError> {
        self.switch = RfSwitch::Tx;
        Ok(())
    }

    fn disable_rf_switch(&mut self) -> Result<(), RadioError> {
        self.switch = RfSwitch::Off;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTimer {
    pub started: bool,
    pub last_timeout: Option<u32>,
    pub starts: usize,
    pub stops: usize,
}

impl FakeTimer {
    /// The timeout elapsed; the platform would now deliver `IrqSource::Timer`
    pub fn expire(&mut self) {
        self.started = false;
    }
}

impl RadioTimer for FakeTimer {
    fn start(&mut self, timeout_ms: u32) {
        self.started = true;
        self.last_timeout = Some(timeout_ms);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.started = false;
        self.stops += 1;
    }

    fn is_started(&self) -> bool {
        self.started
    }
}

pub struct Delayer;

impl DelayNs for Delayer {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub type TestRadio<C> = Sx127x<TestSpi, DummyVariant, FakeTimer, Delayer, C>;

pub fn uninit_radio<C: Sx127xVariant>(chip: C, version: u8) -> TestRadio<C> {
    let mut spi = TestSpi::new();
    spi.regs[0x42] = version;
    let iv = DummyVariant { dio1: false, resets: 0, switch: RfSwitch::Off };
    let config = Config { chip, tcxo_used: false, tcxo_wakeup_ms: 0, tx_boost: false, rx_boost: false };
    Sx127x::new(spi, iv, FakeTimer::default(), Delayer, config)
}

/// Initialized SX1276 with an empty write log
pub fn radio() -> TestRadio<Sx1276> {
    let mut radio = uninit_radio(Sx1276, 0x12);
    radio.init().unwrap();
    radio.intf.spi.writes.clear();
    radio
}
