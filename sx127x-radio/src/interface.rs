use embedded_hal::spi::{Operation, SpiDevice};

use crate::mod_params::RadioError::{self, SPI};

/// Register page addresses, either shared by both modems or specific to one of them
pub trait RegisterAddress: Copy {
    /// Address without the access flag
    fn addr(self) -> u8;

    /// Address with the write flag cleared
    fn read_addr(self) -> u8 {
        self.addr() & 0x7f
    }

    /// Address with the write flag set
    fn write_addr(self) -> u8 {
        self.addr() | 0x80
    }
}

impl RegisterAddress for u8 {
    fn addr(self) -> u8 {
        self
    }
}

pub struct SpiInterface<SPI, IV> {
    pub(crate) spi: SPI,
    pub(crate) iv: IV,
}

impl<SPI, IV> SpiInterface<SPI, IV>
where
    SPI: SpiDevice<u8>,
{
    pub fn new(spi: SPI, iv: IV) -> Self {
        Self { spi, iv }
    }

    // Write a buffer to the radio.
    pub fn write(&mut self, write_buffer: &[u8]) -> Result<(), RadioError> {
        self.spi.write(write_buffer).map_err(|_| SPI)?;
        trace!("write: {=[u8]:02x}", write_buffer);
        Ok(())
    }

    // Write an address followed by a burst of data in the same transaction.
    pub fn write_with_payload(&mut self, write_buffer: &[u8], payload: &[u8]) -> Result<(), RadioError> {
        let mut ops = [Operation::Write(write_buffer), Operation::Write(payload)];
        self.spi.transaction(&mut ops).map_err(|_| SPI)?;
        trace!("write_buf: {=[u8]:02x} -> {=[u8]:02x}", write_buffer, payload);
        Ok(())
    }

    // Request a read, filling the provided buffer.
    pub fn read(&mut self, write_buffer: &[u8], read_buffer: &mut [u8]) -> Result<(), RadioError> {
        let mut ops = [Operation::Write(write_buffer), Operation::Read(read_buffer)];
        self.spi.transaction(&mut ops).map_err(|_| SPI)?;
        trace!("read {=[u8]:02x}: {=[u8]:02x}", write_buffer, read_buffer);
        Ok(())
    }

    pub fn write_register(&mut self, register: impl RegisterAddress, value: u8) -> Result<(), RadioError> {
        self.write(&[register.write_addr(), value])
    }

    pub fn read_register(&mut self, register: impl RegisterAddress) -> Result<u8, RadioError> {
        let mut read_buffer = [0x00u8];
        self.read(&[register.read_addr()], &mut read_buffer)?;
        Ok(read_buffer[0])
    }

    // Read-modify-write of a single register
    pub fn modify_register(
        &mut self,
        register: impl RegisterAddress,
        f: impl FnOnce(u8) -> u8,
    ) -> Result<(), RadioError> {
        let value = self.read_register(register)?;
        self.write_register(register, f(value))
    }

    // Burst write, the address auto-increments except for the FIFO
    pub fn write_buffer(&mut self, register: impl RegisterAddress, buf: &[u8]) -> Result<(), RadioError> {
        self.write_with_payload(&[register.write_addr()], buf)
    }

    // Burst read, the address auto-increments except for the FIFO
    pub fn read_buffer(&mut self, register: impl RegisterAddress, buf: &mut [u8]) -> Result<(), RadioError> {
        self.read(&[register.read_addr()], buf)
    }
}
