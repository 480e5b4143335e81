use clap::Parser;
use mqlsim::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
