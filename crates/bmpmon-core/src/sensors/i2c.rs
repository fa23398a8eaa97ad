//! Register access over Linux `i2c-dev`.

use std::io;
#[cfg(target_os = "linux")]
use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    os::fd::AsRawFd,
};

/// Byte-register access to a device.
///
/// Separated from [`I2cBus`] so drivers can be exercised against an
/// in-memory register map.
pub trait RegisterBus: Send {
    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()>;

    /// Read `buf.len()` consecutive registers starting at `start`.
    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> io::Result<()>;

    fn read_register(&mut self, register: u8) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_registers(register, &mut buf)?;
        Ok(buf[0])
    }
}

#[cfg(target_os = "linux")]
/// `I2C_SLAVE` request from `<linux/i2c-dev.h>`.
const I2C_SLAVE: libc::c_ulong = 0x0703;

#[cfg(target_os = "linux")]
/// A device on `/dev/i2c-<bus>` at a fixed 7-bit address.
pub struct I2cBus {
    file: File,
    bus: u8,
    address: u8,
}

#[cfg(target_os = "linux")]
impl I2cBus {
    pub fn open(bus: u8, address: u8) -> io::Result<Self> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: the descriptor is owned by `file` and stays open for the
        // duration of the call; I2C_SLAVE takes the address by value.
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                I2C_SLAVE as _,
                libc::c_ulong::from(address),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        log::debug!("opened {path} at address 0x{address:02x}");
        Ok(Self { file, bus, address })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

#[cfg(target_os = "linux")]
impl RegisterBus for I2cBus {
    fn write_register(&mut self, register: u8, value: u8) -> io::Result<()> {
        self.file.write_all(&[register, value])
    }

    fn read_registers(&mut self, start: u8, buf: &mut [u8]) -> io::Result<()> {
        self.file.write_all(&[start])?;
        self.file.read_exact(buf)
    }
}
