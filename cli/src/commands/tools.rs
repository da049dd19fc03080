//! Tools listing command

use anyhow::Result;
use colored::Colorize;
use toolloop_core::ToolRegistry;
use tracing::info;

/// Show available tools
pub async fn tools_command() -> Result<()> {
    info!("Listing available tools");

    println!("{}\n", "Available Tools".bold());

    let registry = ToolRegistry::with_builtins();
    for name in registry.list_tools() {
        if let Some((tool_name, description)) = registry.get_tool_info(name) {
            println!("{}", tool_name.green());
            // Show first line of description only for brevity
            let first_line = description.lines().next().unwrap_or(description);
            println!("   {}\n", first_line);
        }
    }

    Ok(())
}
