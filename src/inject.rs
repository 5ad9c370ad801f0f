use std::collections::VecDeque;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Receive-side fault injection, applied after the byte framer and before
// checksum verification. Only the simulator wires this up; on hardware the
// injector stays off.
pub struct ErrorInjector {
    mode: Mode,
}

enum Mode {
    Off,
    Rate { percent: u8, rng: StdRng },
    Script(VecDeque<u8>),
}

impl ErrorInjector {
    pub fn off() -> Self {
        ErrorInjector { mode: Mode::Off }
    }

    // Flip one random bit of a byte with the given percent probability.
    pub fn rate(percent: u8) -> Self {
        ErrorInjector {
            mode: Mode::Rate {
                percent: percent.min(100),
                rng: StdRng::from_entropy(),
            },
        }
    }

    // Fixed xor-mask schedule, one entry per received byte, zero leaving
    // the byte intact. Runs clean once exhausted.
    pub fn script(masks: impl IntoIterator<Item = u8>) -> Self {
        ErrorInjector {
            mode: Mode::Script(masks.into_iter().collect()),
        }
    }

    pub fn corrupt(&mut self, byte: u8) -> u8 {
        match &mut self.mode {
            Mode::Off => byte,
            Mode::Rate { percent, rng } => {
                if *percent > 0 && rng.gen_range(0..100u8) < *percent {
                    let bit = rng.gen_range(0..8u8);
                    let corrupted = byte ^ (1 << bit);
                    debug!("injected flip of bit {bit}: 0x{byte:02x} -> 0x{corrupted:02x}");
                    corrupted
                } else {
                    byte
                }
            }
            Mode::Script(masks) => {
                let mask = masks.pop_front().unwrap_or(0);
                if mask != 0 {
                    debug!("injected mask 0x{mask:02x} on 0x{byte:02x}");
                }
                byte ^ mask
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_is_identity() {
        let mut injector = ErrorInjector::off();
        for byte in 0..=0xFFu8 {
            assert_eq!(injector.corrupt(byte), byte);
        }
    }

    #[test]
    fn zero_rate_is_identity() {
        let mut injector = ErrorInjector::rate(0);
        for byte in 0..=0xFFu8 {
            assert_eq!(injector.corrupt(byte), byte);
        }
    }

    #[test]
    fn full_rate_flips_exactly_one_bit() {
        let mut injector = ErrorInjector::rate(100);
        for byte in 0..=0xFFu8 {
            let corrupted = injector.corrupt(byte);
            assert_eq!((corrupted ^ byte).count_ones(), 1);
        }
    }

    #[test]
    fn script_applies_masks_then_runs_clean() {
        let mut injector = ErrorInjector::script([0x04, 0x00, 0x80]);

        assert_eq!(injector.corrupt(0xFF), 0xFB);
        assert_eq!(injector.corrupt(0x10), 0x10);
        assert_eq!(injector.corrupt(0x00), 0x80);
        assert_eq!(injector.corrupt(0x55), 0x55);
    }
}
