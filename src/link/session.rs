use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::err::Error;
use crate::port::PortDriver;
use crate::Board;

use super::arq::{Link, Received};
use super::{EOT_BYTE, NO_DATA_BYTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Send,
    Receive,
    Fullduplex,
}

// Sink for completed messages: echo to stdout, append to a per-board text
// file, one message per line, flushed per EOT.
pub struct MessageLog {
    file: Option<File>,
}

impl MessageLog {
    pub fn for_board(board: Board) -> Self {
        Self::at(format!("received_{board}.txt"))
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();

        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                info!("appending received messages to {}", path.display());
                MessageLog { file: Some(file) }
            }
            Err(e) => {
                warn!("cannot open {}: {e}; messages go to stdout only", path.display());
                MessageLog { file: None }
            }
        }
    }

    fn deliver(&mut self, message: &str) {
        println!(">>> {message}");

        if let Some(file) = &mut self.file {
            if let Err(e) = writeln!(file, "{message}").and_then(|_| file.flush()) {
                warn!("message log write failed: {e}");
                self.file = None;
            }
        }
    }
}

// The trailing newline is wire framing, not payload, so it is not part of
// the record.
fn take_message(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }

    let message = String::from_utf8_lossy(buf).into_owned();
    buf.clear();

    message
}

pub fn run_sender<P: PortDriver>(link: &mut Link<P>, input: impl BufRead) -> Result<(), Error> {
    let outcome = send_all(link, input);

    if let Err(e) = &outcome {
        warn!("transmission aborted: {e}");
    }
    link.stats().print();

    outcome
}

fn send_all<P: PortDriver>(link: &mut Link<P>, input: impl BufRead) -> Result<(), Error> {
    for line in input.lines() {
        let line = line?;
        info!("sending message: \"{line}\"");

        for &byte in line.as_bytes() {
            link.send_byte(byte)?;
        }
        link.send_byte(b'\n')?;
        link.send_byte(EOT_BYTE)?;

        info!("message delivered");
    }

    Ok(())
}

pub fn run_receiver<P: PortDriver>(link: &mut Link<P>, log: &mut MessageLog) -> Result<(), Error> {
    info!("waiting for messages");

    let mut message: Vec<u8> = Vec::new();

    loop {
        match link.recv_byte()? {
            Received::Timeout | Received::Rejected => continue,
            Received::Byte(EOT_BYTE) => {
                let text = take_message(&mut message);
                info!("EOT, message complete");
                log.deliver(&text);
            }
            Received::Byte(byte) => {
                message.push(byte);
                debug!("collected 0x{byte:02x} ({} bytes so far)", message.len());
            }
        }
    }
}

/*
Application-level full duplex over the half-duplex wire.

Genuinely simultaneous transfer is impossible: the handshake pairs one
driving side with one acknowledging side, and four output bits cannot do
both at once. So the two nodes take strict turns, one byte per round,
board A sending on odd rounds and board B on even ones. An empty FIFO
sends NO_DATA so the peer can tell idle from dead.

A node stops once three things hold: its FIFO is drained, the peer has
said NO_DATA, and it has said NO_DATA itself at least once. The last
condition keeps the shutdown symmetric: whichever side drains last still
owes its peer one NO_DATA round, so neither side is left polling a dead
wire.
*/
pub fn run_ping_pong<P: PortDriver>(
    link: &mut Link<P>,
    board: Board,
    input: impl BufRead,
    log: &mut MessageLog,
) -> Result<(), Error> {
    let outcome = ping_pong(link, board, input, log);

    if let Err(e) = &outcome {
        warn!("session aborted: {e}");
    }
    link.stats().print();

    outcome
}

fn ping_pong<P: PortDriver>(
    link: &mut Link<P>,
    board: Board,
    input: impl BufRead,
    log: &mut MessageLog,
) -> Result<(), Error> {
    let mut fifo = read_fifo(input)?;
    info!("{} bytes queued for sending", fifo.len());

    let mut message: Vec<u8> = Vec::new();
    let mut round: u64 = 0;
    let mut other_has_data = true;
    let mut idle_announced = false;

    while !(fifo.is_empty() && !other_has_data && idle_announced) {
        round += 1;

        let sending = match board {
            Board::A => round % 2 == 1,
            Board::B => round % 2 == 0,
        };

        if sending {
            let byte = match fifo.pop_front() {
                Some(byte) => byte,
                None => {
                    idle_announced = true;
                    NO_DATA_BYTE
                }
            };

            debug!("round {round}: sending 0x{byte:02x}");
            link.send_byte(byte)?;
        } else {
            match link.recv_byte()? {
                Received::Rejected => {
                    // The peer retransmits the same byte right away; this
                    // round is not over yet.
                    round -= 1;
                }
                Received::Timeout => {
                    warn!("round {round}: peer stopped answering");
                    return Err(Error::ByteTimeout);
                }
                Received::Byte(NO_DATA_BYTE) => {
                    debug!("round {round}: peer is idle");
                    other_has_data = false;
                }
                Received::Byte(EOT_BYTE) => {
                    let text = take_message(&mut message);
                    info!("round {round}: EOT, message complete");
                    log.deliver(&text);
                }
                Received::Byte(byte) => {
                    debug!("round {round}: received 0x{byte:02x}");
                    message.push(byte);
                }
            }
        }
    }

    info!("both sides drained, session over");

    Ok(())
}

// Everything the node will ever send, flattened up front: the bytes of
// each line, then the newline, then EOT.
fn read_fifo(input: impl BufRead) -> Result<VecDeque<u8>, Error> {
    let mut fifo = VecDeque::new();

    for line in input.lines() {
        let line = line?;
        fifo.extend(line.as_bytes());
        fifo.push_back(b'\n');
        fifo.push_back(EOT_BYTE);
    }

    Ok(fifo)
}
