use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use log::{debug, warn};

use crate::err::Error;
use crate::inject::ErrorInjector;
use crate::port::PortDriver;
use crate::stats::Stats;

use super::phy::{Phy, Timings};
use super::{crc8, ACK_BYTE, MAX_RETRIES, NAK_BYTE};

// Outcome of one ARQ receive round. A corrupted byte never escapes this
// layer; the caller only ever sees verified bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Byte(u8),
    Timeout,
    Rejected,
}

pub struct Link<P> {
    phy: Phy<P>,
    stats: Arc<Stats>,
    injector: ErrorInjector,
}

impl<P: PortDriver> Link<P> {
    pub fn new(port: P) -> Result<Self, Error> {
        Self::with_timings(port, Timings::default())
    }

    pub fn with_timings(port: P, timings: Timings) -> Result<Self, Error> {
        Ok(Link {
            phy: Phy::new(port, timings)?,
            stats: Arc::new(Stats::default()),
            injector: ErrorInjector::off(),
        })
    }

    pub fn set_injector(&mut self, injector: ErrorInjector) {
        self.injector = injector;
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn send_byte(&mut self, byte: u8) -> Result<(), Error> {
        let checksum = crc8(byte);

        for retry in 0..MAX_RETRIES {
            if retry > 0 {
                warn!("retry {retry}/{MAX_RETRIES} for byte 0x{byte:02x}");
                self.stats.retransmissions.fetch_add(1, Relaxed);
            }

            debug!("send 0x{byte:02x} + crc 0x{checksum:02x}");

            // A byte that cannot even be clocked out means the link is
            // dead, not that the payload was refused. No retry for that.
            self.phy.send_raw(byte)?;
            self.phy.send_raw(checksum)?;

            match self.phy.recv_raw() {
                Ok(ACK_BYTE) => {
                    self.stats.bytes_sent.fetch_add(1, Relaxed);
                    return Ok(());
                }
                Ok(NAK_BYTE) => {
                    warn!("NAK for byte 0x{byte:02x}, retransmitting");
                }
                Ok(other) => {
                    warn!("unexpected response 0x{other:02x} to byte 0x{byte:02x}");
                }
                Err(Error::ByteTimeout) => {
                    warn!("no response to byte 0x{byte:02x}");
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::RetryExhausted {
            byte,
            attempts: MAX_RETRIES,
        })
    }

    pub fn recv_byte(&mut self) -> Result<Received, Error> {
        let byte = match self.phy.recv_raw() {
            Ok(b) => b,
            Err(Error::ByteTimeout) => return Ok(Received::Timeout),
            Err(e) => return Err(e),
        };

        // Fault injection sits between the framer and the checksum so a
        // flipped bit exercises the NAK path end to end.
        let byte = self.injector.corrupt(byte);

        let received_crc = match self.phy.recv_raw() {
            Ok(c) => c,
            Err(Error::ByteTimeout) => return Ok(Received::Timeout),
            Err(e) => return Err(e),
        };

        let expected = crc8(byte);
        debug!("recv 0x{byte:02x}, crc 0x{received_crc:02x} (expected 0x{expected:02x})");

        if received_crc == expected {
            self.respond(ACK_BYTE)?;
            self.stats.bytes_received.fetch_add(1, Relaxed);

            Ok(Received::Byte(byte))
        } else {
            warn!("checksum mismatch on 0x{byte:02x}, sending NAK");
            self.respond(NAK_BYTE)?;
            self.stats.checksum_errors.fetch_add(1, Relaxed);

            Ok(Received::Rejected)
        }
    }

    // Best effort: a verdict the peer never clocks in is the peer's
    // problem (it will retransmit or give up). A port fault still aborts.
    fn respond(&mut self, code: u8) -> Result<(), Error> {
        match self.phy.send_raw(code) {
            Ok(()) | Err(Error::ByteTimeout) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
