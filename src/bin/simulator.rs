use std::io;
use std::process;

use clap::Parser;
use log::{error, info};

use nibblelink::{
    run_ping_pong, run_receiver, run_sender, Board, ErrorInjector, FileCable, Link, MessageLog,
    Mode, SimPort,
};

const CABLE_PATH: &str = "cable.bin";

#[derive(Debug, Parser)]
#[command(
    name = "simulator",
    about = "Off-hardware build of the link: two processes in the same directory share a one-byte cable file"
)]
struct Cli {
    board: Board,

    mode: Mode,

    // Percentage of received bytes that get one bit flipped.
    #[arg(default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    error_rate: u8,
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        process::exit(1);
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), nibblelink::Error> {
    let cable = FileCable::open(CABLE_PATH)?;
    let mut link = Link::new(SimPort::new(cli.board, cable))?;

    if cli.error_rate > 0 {
        info!("error injection at {}%", cli.error_rate);
        link.set_injector(ErrorInjector::rate(cli.error_rate));
    }

    let stdin = io::stdin();

    match cli.mode {
        Mode::Send => run_sender(&mut link, stdin.lock()),
        Mode::Receive => run_receiver(&mut link, &mut MessageLog::for_board(cli.board)),
        Mode::Fullduplex => run_ping_pong(
            &mut link,
            cli.board,
            stdin.lock(),
            &mut MessageLog::for_board(cli.board),
        ),
    }
}
