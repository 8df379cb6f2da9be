// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the bridge.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let runtime = RuntimeBuilder::new()
        .config_path(&cli.config)
        .disable_command_polling(args.no_command_polling)
        .build()?;

    let logging = &runtime.config().logging;
    init_logging(
        &cli.effective_log_level(logging.level),
        cli.effective_log_format(logging.format),
    )?;
    info!(config = %cli.config.display(), "Configuration loaded");

    runtime.run().await
}
