use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;

use nix::sys::uio::{pread, pwrite};

use super::{nix_io, PortDriver};

// Register layout of the I/O bank, pins first: PIN, DDR, PORT.
const PIN_OFFSET: u64 = 0;
const DDR_OFFSET: u64 = 1;
const PORT_OFFSET: u64 = 2;

pub const DEFAULT_PORT_BASE: u64 = 0x378;

// Raw register access through /dev/port. Opening it needs root (or
// CAP_SYS_RAWIO), which is why the simulator exists.
pub struct DevPort {
    file: File,
    base: u64,
}

impl DevPort {
    pub fn open(base: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/port")?;

        Ok(DevPort { file, base })
    }

    fn read_reg(&self, offset: u64) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        pread(
            self.file.as_raw_fd(),
            &mut buf,
            (self.base + offset) as i64,
        )
        .map_err(nix_io)?;

        Ok(buf[0])
    }

    fn write_reg(&self, offset: u64, value: u8) -> io::Result<()> {
        pwrite(self.file.as_raw_fd(), &[value], (self.base + offset) as i64).map_err(nix_io)?;

        Ok(())
    }
}

impl PortDriver for DevPort {
    fn set_direction(&mut self, mask: u8) -> io::Result<()> {
        self.write_reg(DDR_OFFSET, mask)
    }

    fn output_register(&mut self) -> io::Result<u8> {
        self.read_reg(PORT_OFFSET)
    }

    fn set_output_register(&mut self, value: u8) -> io::Result<()> {
        self.write_reg(PORT_OFFSET, value)
    }

    fn input_register(&mut self) -> io::Result<u8> {
        self.read_reg(PIN_OFFSET)
    }
}
