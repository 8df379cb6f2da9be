// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("opcua-bridge - OPC UA to REST inventory bridge");
    println!();
    println!("Version Information:");
    println!("  bridge-bin:    {}", crate::VERSION);
    println!("  bridge-core:   {}", bridge_core::VERSION);
    println!("  bridge-opcua:  {}", bridge_opcua::VERSION);
    println!("  bridge-config: {}", bridge_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Rust Edition: 2024");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  Real transport: {}",
        if bridge_opcua::real_transport_enabled() { "enabled" } else { "disabled" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
