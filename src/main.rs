use std::process::ExitCode;

use clap::Parser;
use log::error;

use strata::cli::{self, Cli};

fn main() -> ExitCode {
    if let Err(err) = strata::logger::init_from_env() {
        eprintln!("could not install logger: {}", err);
    }
    let cli = Cli::parse();
    match cli::run(&cli, &mut std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
