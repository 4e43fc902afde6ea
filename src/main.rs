//! Binary entrypoint for the Minzai terminal chat client.

use std::process::ExitCode;

use minzai_chat::cli;

/// Start the interactive chat loop against the configured backend.
fn main() -> ExitCode {
    cli::run()
}
