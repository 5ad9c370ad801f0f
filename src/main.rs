use std::io;
use std::process;

use clap::Parser;
use log::error;

use nibblelink::{
    run_ping_pong, run_receiver, run_sender, Board, DevPort, Link, MessageLog, Mode,
    DEFAULT_PORT_BASE,
};

#[derive(Debug, Parser)]
#[command(name = "nibblelink", about = "Reliable byte transfer over the 4-bit crossover cable")]
struct Cli {
    board: Board,

    mode: Mode,

    // 1 enables byte-level wire tracing.
    #[arg(default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    verbose: u8,
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        process::exit(1);
    });

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if cli.verbose == 1 { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    if let Err(e) = run(cli) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), nibblelink::Error> {
    let port = DevPort::open(DEFAULT_PORT_BASE)?;
    let mut link = Link::new(port)?;

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
