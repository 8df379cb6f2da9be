// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `run`: Start the bridge
//! - `validate`: Validate configuration file
//! - `version`: Show version information

mod run;
mod validate;
mod version;

pub use run::run;
pub use validate::validate;
pub use version::version;

use bridge_config::{LogFormat, LogLevel};

use crate::cli::{Cli, Commands};
use crate::error::BinResult;
use crate::logging::init_logging;

/// Executes the appropriate command based on CLI arguments.
///
/// `run` initializes logging itself once the config is loaded. The other
/// commands log at `warn` unless asked otherwise so their output stays clean.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => {
            init_logging(
                &cli.effective_log_level(LogLevel::Warn),
                cli.effective_log_format(LogFormat::Text),
            )?;
            validate::validate(&cli, args)
        }
        Commands::Version => version::version(&cli),
    }
}
