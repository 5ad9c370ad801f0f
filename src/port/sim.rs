use std::fs::{self, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nix::fcntl::{flock, FlockArg};
use nix::sys::uio::{pread, pwrite};

use crate::link::reverse_nibble;
use crate::Board;

use super::{nix_io, PortDriver};

// Storage shared by the two simulated boards: a single byte, board A's
// output nibble in bits 0-3 and board B's in bits 4-7.
pub trait CableMedium {
    fn read_byte(&mut self) -> io::Result<u8>;

    fn update<F: FnOnce(u8) -> u8>(&mut self, f: F) -> io::Result<()>;
}

#[derive(Clone, Default)]
pub struct MemCable(Arc<Mutex<u8>>);

impl CableMedium for MemCable {
    fn read_byte(&mut self) -> io::Result<u8> {
        Ok(*self.0.lock().unwrap())
    }

    fn update<F: FnOnce(u8) -> u8>(&mut self, f: F) -> io::Result<()> {
        let mut byte = self.0.lock().unwrap();
        *byte = f(*byte);

        Ok(())
    }
}

// Cable shared between two processes through a one-byte file. Every access
// runs under a flock so the read-modify-write of one side cannot lose the
// other side's nibble. The file is removed when either side exits, like a
// cable being unplugged.
pub struct FileCable {
    file: fs::File,
    path: PathBuf,
}

impl FileCable {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let cable = FileCable { file, path };

        // Whoever arrives first settles the cable with all lines low.
        cable.lock(FlockArg::LockExclusive)?;
        if cable.file.metadata()?.len() == 0 {
            pwrite(cable.file.as_raw_fd(), &[0], 0).map_err(nix_io)?;
        }
        cable.unlock()?;

        Ok(cable)
    }

    fn lock(&self, arg: FlockArg) -> io::Result<()> {
        flock(self.file.as_raw_fd(), arg).map_err(nix_io)
    }

    fn unlock(&self) -> io::Result<()> {
        flock(self.file.as_raw_fd(), FlockArg::Unlock).map_err(nix_io)
    }

    fn read_raw(&self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        pread(self.file.as_raw_fd(), &mut buf, 0).map_err(nix_io)?;

        Ok(buf[0])
    }
}

impl CableMedium for FileCable {
    fn read_byte(&mut self) -> io::Result<u8> {
        self.lock(FlockArg::LockShared)?;
        let result = self.read_raw();
        self.unlock()?;

        result
    }

    fn update<F: FnOnce(u8) -> u8>(&mut self, f: F) -> io::Result<()> {
        self.lock(FlockArg::LockExclusive)?;
        let result = self
            .read_raw()
            .and_then(|byte| pwrite(self.file.as_raw_fd(), &[f(byte)], 0).map_err(nix_io));
        self.unlock()?;

        result.map(|_| ())
    }
}

impl Drop for FileCable {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// One simulated end of the crossover cable. The input pins present the
// peer's nibble exactly as the crossed cable would, bit k on pin 7-k.
pub struct SimPort<M> {
    side: Board,
    medium: M,
    latch: u8,
}

impl<M: CableMedium> SimPort<M> {
    pub fn new(side: Board, medium: M) -> Self {
        SimPort {
            side,
            medium,
            latch: 0,
        }
    }
}

pub fn loopback() -> (SimPort<MemCable>, SimPort<MemCable>) {
    let cable = MemCable::default();

    (
        SimPort::new(Board::A, cable.clone()),
        SimPort::new(Board::B, cable),
    )
}

impl<M: CableMedium> PortDriver for SimPort<M> {
    fn set_direction(&mut self, _mask: u8) -> io::Result<()> {
        Ok(())
    }

    fn output_register(&mut self) -> io::Result<u8> {
        Ok(self.latch)
    }

    fn set_output_register(&mut self, value: u8) -> io::Result<()> {
        self.latch = value;

        let side = self.side;
        let nibble = value & 0x0F;

        self.medium.update(|cable| match side {
            Board::A => (cable & 0xF0) | nibble,
            Board::B => (cable & 0x0F) | (nibble << 4),
        })
    }

    fn input_register(&mut self) -> io::Result<u8> {
        let cable = self.medium.read_byte()?;

        let peer = match self.side {
            Board::A => cable >> 4,
            Board::B => cable & 0x0F,
        };

        Ok(reverse_nibble(peer) << 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_pins_carry_the_peer_nibble_crossed() {
        let (mut a, mut b) = loopback();

        // A drives its bit 0; the cable lands it on B's pin 7.
        a.set_output_register(0b0000_0001).unwrap();
        assert_eq!(b.input_register().unwrap(), 0b1000_0000);

        // B drives its bit 2; A sees it on pin 5.
        b.set_output_register(0b0000_0100).unwrap();
        assert_eq!(a.input_register().unwrap(), 0b0010_0000);

        // Neither write disturbed the other side's nibble.
        assert_eq!(b.input_register().unwrap(), 0b1000_0000);
    }

    #[test]
    fn high_latch_bits_stay_off_the_cable() {
        let (mut a, mut b) = loopback();

        a.set_output_register(0xA5).unwrap();
        assert_eq!(a.output_register().unwrap(), 0xA5);

        // Only the low nibble (0x5 -> reversed 0xA) reaches the peer.
        assert_eq!(b.input_register().unwrap(), 0b1010_0000);
    }

    #[test]
    fn file_cable_round_trips_between_two_handles() {
        let path = std::env::temp_dir().join(format!("cable_test_{}.bin", std::process::id()));
        let _ = fs::remove_file(&path);

        let mut a = SimPort::new(Board::A, FileCable::open(&path).unwrap());
        let mut b = SimPort::new(Board::B, FileCable::open(&path).unwrap());

        a.set_output_register(0x0F).unwrap();
        assert_eq!(b.input_register().unwrap(), 0xF0);

        b.set_output_register(0x08).unwrap();
        assert_eq!(a.input_register().unwrap(), 0b0001_0000);
    }
}
