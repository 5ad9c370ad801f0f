use std::fmt;

mod err;
pub use err::*;

mod inject;
mod link;
mod port;
mod stats;

pub use inject::ErrorInjector;
pub use link::*;
pub use port::*;
pub use stats::Stats;

// Node identity. Decides which nibble of the simulated cable this node
// drives, the name of its message log, and who sends on odd rounds in
// full duplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Board {
    #[value(name = "A", alias = "a")]
    A,
    #[value(name = "B", alias = "b")]
    B,
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Board::A => write!(f, "A"),
            Board::B => write!(f, "B"),
        }
    }
}
