use std::io;

use crate::err::Error;
use crate::port::PortDriver;

use super::{reverse_nibble, ACK_LINE, CLOCK, DATA0, DATA1};

/*
                  one 2-bit symbol, self-clocked

    sender                                              receiver
      |  toggle CLOCK, drive DATA0/DATA1                   |
      |----- nibble: [ 0 | CLOCK | DATA1 | DATA0 ] ------->|
      |                                 latch data on edge |
      |                                         toggle ACK |
      |<---- nibble: [ ACK | 0 | 0 | 0 ] ------------------|
      |  ack edge seen, symbol done                        |

   Both edges are toggles, never levels: any change on the line means one
   symbol advanced. A byte is exactly four symbols, so every line is back
   at zero when the peers swap roles, which is what lets the sender zero
   the ack line and the receiver zero data and clock without confusing the
   other side's edge detector.
*/

// Default poll cadence is the wire contract: 5000 samples at 100us gives a
// symbol budget of about half a second. Tests shrink these.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub settle_ms: u64,
    pub seed_delay_ms: u64,
    pub poll_iterations: u32,
    pub poll_interval_us: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            settle_ms: 200,
            seed_delay_ms: 100,
            poll_iterations: 5000,
            poll_interval_us: 100,
        }
    }
}

pub struct Phy<P> {
    port: P,
    timings: Timings,
    tx_clock: u8,
    tx_seen_ack: u8,
    rx_ack: u8,
    rx_seen_clock: u8,
}

impl<P: PortDriver> Phy<P> {
    pub fn new(mut port: P, timings: Timings) -> Result<Self, Error> {
        port.set_direction(0x0F)?;
        port.delay_ms(timings.settle_ms);

        let mut phy = Phy {
            port,
            timings,
            tx_clock: 0,
            tx_seen_ack: 0,
            rx_ack: 0,
            rx_seen_clock: 0,
        };

        // Seed both edge detectors from one sample so the first symbol is
        // edge-sensitive rather than level-sensitive. Rebuilding a Phy
        // over a live cable then behaves like the first construction.
        phy.write_nibble(0)?;
        phy.port.delay_ms(timings.seed_delay_ms);

        let initial = phy.read_nibble()?;
        phy.tx_seen_ack = initial & ACK_LINE;
        phy.rx_seen_clock = initial & CLOCK;

        Ok(phy)
    }

    // The high bits of the latch belong to whatever else hangs off the
    // bank and are carried over untouched.
    fn write_nibble(&mut self, nibble: u8) -> io::Result<()> {
        let current = self.port.output_register()?;

        self.port
            .set_output_register((current & 0xF0) | (nibble & 0x0F))
    }

    fn read_nibble(&mut self) -> io::Result<u8> {
        let pins = self.port.input_register()?;

        Ok(reverse_nibble(pins >> 4))
    }

    pub fn send_symbol(&mut self, bits: u8) -> Result<(), Error> {
        let bits = bits & 0x03;

        self.tx_clock ^= CLOCK;

        // The ack line stays zero: it belongs to the receiver.
        let mut nibble = self.tx_clock;
        if bits & 0x01 != 0 {
            nibble |= DATA0;
        }
        if bits & 0x02 != 0 {
            nibble |= DATA1;
        }

        self.write_nibble(nibble)?;

        for _ in 0..self.timings.poll_iterations {
            let input = self.read_nibble()?;
            let ack = input & ACK_LINE;

            if ack != self.tx_seen_ack {
                self.tx_seen_ack = ack;
                return Ok(());
            }

            self.port.delay_us(self.timings.poll_interval_us);
        }

        Err(Error::SymbolTimeout)
    }

    pub fn recv_symbol(&mut self) -> Result<u8, Error> {
        for _ in 0..self.timings.poll_iterations {
            let input = self.read_nibble()?;
            let clock = input & CLOCK;

            if clock != self.rx_seen_clock {
                // data is latched from the same sample as the edge
                self.rx_seen_clock = clock;

                let mut bits = 0;
                if input & DATA0 != 0 {
                    bits |= 0x01;
                }
                if input & DATA1 != 0 {
                    bits |= 0x02;
                }

                // Data and clock stay zero in the answer: they belong to
                // the sender.
                self.rx_ack ^= ACK_LINE;
                self.write_nibble(self.rx_ack)?;

                return Ok(bits);
            }

            self.port.delay_us(self.timings.poll_interval_us);
        }

        Err(Error::SymbolTimeout)
    }

    pub fn send_raw(&mut self, byte: u8) -> Result<(), Error> {
        // Low-order pair first.
        for shift in [0, 2, 4, 6] {
            self.send_symbol((byte >> shift) & 0x03).map_err(byte_fault)?;
        }

        Ok(())
    }

    pub fn recv_raw(&mut self) -> Result<u8, Error> {
        // A timeout on any symbol aborts the whole byte; nothing partial
        // is ever surfaced.
        let mut byte = 0;
        for shift in [0, 2, 4, 6] {
            byte |= self.recv_symbol().map_err(byte_fault)? << shift;
        }

        Ok(byte)
    }
}

fn byte_fault(err: Error) -> Error {
    match err {
        Error::SymbolTimeout => Error::ByteTimeout,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::port::{loopback, MemCable, SimPort};
    use crate::Board;

    use super::*;

    fn fast() -> Timings {
        Timings {
            settle_ms: 0,
            seed_delay_ms: 0,
            poll_iterations: 20_000,
            poll_interval_us: 10,
        }
    }

    fn phy_pair() -> (Phy<SimPort<MemCable>>, Phy<SimPort<MemCable>>) {
        let (a, b) = loopback();

        (Phy::new(a, fast()).unwrap(), Phy::new(b, fast()).unwrap())
    }

    #[test]
    fn bytes_arrive_in_order() {
        let (mut a, mut b) = phy_pair();

        let rx = thread::spawn(move || {
            let mut got = Vec::new();
            for _ in 0..4 {
                got.push(b.recv_raw().unwrap());
            }
            got
        });

        for byte in [0x6C, 0x00, 0xFF, 0xA9] {
            a.send_raw(byte).unwrap();
        }

        assert_eq!(rx.join().unwrap(), vec![0x6C, 0x00, 0xFF, 0xA9]);
    }

    #[test]
    fn send_times_out_without_a_peer() {
        let (a, _b) = loopback();
        let mut a = Phy::new(
            a,
            Timings {
                poll_iterations: 10,
                poll_interval_us: 1,
                ..fast()
            },
        )
        .unwrap();

        assert!(matches!(a.send_raw(0x41), Err(Error::ByteTimeout)));
    }

    #[test]
    fn reinitialization_over_a_live_cable_is_clean() {
        let cable = MemCable::default();
        let mut a = Phy::new(SimPort::new(Board::A, cable.clone()), fast()).unwrap();
        let mut b = Phy::new(SimPort::new(Board::B, cable.clone()), fast()).unwrap();

        let rx = thread::spawn(move || {
            let byte = b.recv_raw().unwrap();
            (byte, b)
        });
        a.send_raw(b'1').unwrap();
        let (byte, mut b) = rx.join().unwrap();
        assert_eq!(byte, b'1');

        // Tear one end down and bring it back over the same cable.
        drop(a);
        let mut a = Phy::new(SimPort::new(Board::A, cable), fast()).unwrap();

        let rx = thread::spawn(move || b.recv_raw().unwrap());
        a.send_raw(b'2').unwrap();
        assert_eq!(rx.join().unwrap(), b'2');
    }
}
