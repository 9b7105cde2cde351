#![forbid(unsafe_code)]

//! vci: class-file integrity checker CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        if !e.already_reported() {
            eprintln!("vci: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
