use clap::Parser;
use quorum::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    env_logger::init();
    run(Cli::parse())
}
