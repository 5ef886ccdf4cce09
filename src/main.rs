use clap::Parser;
use daytrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
