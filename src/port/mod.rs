use std::io;
use std::thread;
use std::time::Duration;

mod devport;
mod sim;

pub use devport::*;
pub use sim::*;

// Register-level access to the platform's parallel I/O bank. The link
// drives the low four bits as outputs and samples the high four as inputs;
// which back-end sits behind the registers (the real port or a simulated
// cable) is invisible above this trait.
pub trait PortDriver {
    fn set_direction(&mut self, mask: u8) -> io::Result<()>;

    fn output_register(&mut self) -> io::Result<u8>;

    fn set_output_register(&mut self, value: u8) -> io::Result<()>;

    fn input_register(&mut self) -> io::Result<u8>;

    fn delay_us(&self, micros: u64) {
        thread::sleep(Duration::from_micros(micros));
    }

    fn delay_ms(&self, millis: u64) {
        thread::sleep(Duration::from_millis(millis));
    }
}

pub(crate) fn nix_io(err: nix::errno::Errno) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}
