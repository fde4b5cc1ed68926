//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each
//! handler lives in its own submodule.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::TraceabilityError;

pub async fn dispatch(cli: Cli) -> Result<(), TraceabilityError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  traceability v{version} \u{2014} traceability id propagation middleware\n\n  \
         No command provided. To get started:\n\n    \
         traceability run                   Start the server (auto-detects ./traceability.yaml)\n    \
         traceability run -c config.yaml    Start with a specific config file\n    \
         traceability --help                See all commands and options\n"
    );
}
