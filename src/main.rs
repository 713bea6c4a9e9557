//! Dockmaster - container host readiness auditor
//!
//! Runs a fixed battery of read-only checks against a Docker host and
//! reports aggregate health. Exit code is zero iff no check failed.

mod audit;
mod cli;
mod daemon_config;
mod error;
mod host;

use cli::{Cli, Commands};
use error::Result;
use host::LiveHost;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse_args();

    // Bare invocation audits the host
    match cli.command.unwrap_or(Commands::Audit { json: false }) {
        Commands::Audit { json } => {
            let probe = LiveHost::new();
            let report = audit::run(&probe);

            if json {
                println!("{}", report.to_json()?);
            } else {
                let stdout = std::io::stdout();
                report.render(&mut stdout.lock())?;
            }

            Ok(report.exit_code())
        }
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
            Ok(0)
        }
    }
}
