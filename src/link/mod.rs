use crc::{Algorithm, Crc, Table};

mod arq;
mod phy;
mod session;

pub use arq::*;
pub use phy::*;
pub use session::*;

// Control bytes. These code points are reserved and never appear as
// payload.
pub const EOT_BYTE: u8 = 0x04; // end of one message
pub const ACK_BYTE: u8 = 0x06; // byte verified, send the next one
pub const NAK_BYTE: u8 = 0x15; // checksum failed, retransmit
pub const NO_DATA_BYTE: u8 = 0x10; // full-duplex filler for an empty FIFO

// Line assignment inside an output nibble. The transmitter owns DATA0,
// DATA1 and CLOCK; the receiver owns ACK_LINE.
pub const DATA0: u8 = 0x01;
pub const DATA1: u8 = 0x02;
pub const CLOCK: u8 = 0x04;
pub const ACK_LINE: u8 = 0x08;

// Bound on attempts to deliver one byte, the first transmission included.
pub const MAX_RETRIES: u32 = 5;

// CRC-8 exactly as both peers compute it on the wire: poly 0x07, register
// seeded with 0xFF, no reflection, no output xor, over the one data byte.
const CRC_8_WIRE: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x07,
    init: 0xFF,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xFB,
    residue: 0x00,
};

const CRC8: Crc<u8, Table<1>> = Crc::<u8, Table<1>>::new(&CRC_8_WIRE);

pub fn crc8(byte: u8) -> u8 {
    CRC8.checksum(&[byte])
}

// The crossed cable maps bit k of one nibble to bit 3-k of the other; the
// permutation is its own inverse.
pub fn reverse_nibble(nibble: u8) -> u8 {
    ((nibble & 0x01) << 3) | ((nibble & 0x02) << 1) | ((nibble & 0x04) >> 1) | ((nibble & 0x08) >> 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_fixed_vectors() {
        assert_eq!(crc8(0x00), 0xF3);
        assert_eq!(crc8(0x01), 0xF4);
        assert_eq!(crc8(0xFF), 0x00);
    }

    #[test]
    fn crc_detects_every_single_bit_flip() {
        for byte in 0..=0xFFu8 {
            for bit in 0..8 {
                let flipped = byte ^ (1 << bit);
                assert_ne!(crc8(byte), crc8(flipped), "collision on 0x{byte:02x} bit {bit}");
            }
        }
    }

    #[test]
    fn control_bytes_are_distinct() {
        let codes = [EOT_BYTE, ACK_BYTE, NAK_BYTE, NO_DATA_BYTE];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn nibble_reversal_is_an_involution() {
        for nibble in 0..16u8 {
            assert_eq!(reverse_nibble(reverse_nibble(nibble)), nibble);
        }

        assert_eq!(reverse_nibble(0b0001), 0b1000);
        assert_eq!(reverse_nibble(0b0110), 0b0110);
    }
}
