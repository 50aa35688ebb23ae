use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::store::StoreOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the MCP server
    Start(CommandArguments),
    /// Show the resolved configuration and what the data file holds
    Status(CommandArguments),
    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct CommandArguments {
    /// Snapshot file (defaults to ~/.target-achiever/target-achiever-storage.json)
    #[arg(long, env = "TARGET_ACHIEVER_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Report edits to missing ids as errors instead of ignoring them
    #[arg(long, env = "TARGET_ACHIEVER_STRICT", default_value_t = false)]
    pub strict: bool,

    /// Keep target progress equal to the mean of its actions
    #[arg(long, env = "TARGET_ACHIEVER_TARGET_ROLLUP", default_value_t = false)]
    pub target_rollup: bool,

    /// Enable stdio transport
    #[arg(long, env = "MCP_ENABLE_STDIO", default_value_t = true, action = ArgAction::Set)]
    pub enable_stdio: bool,

    /// Enable streamable HTTP transport
    #[arg(long, env = "MCP_ENABLE_HTTP", default_value_t = false, action = ArgAction::Set)]
    pub enable_http: bool,

    /// Streamable HTTP bind address
    #[arg(long, env = "MCP_HTTP_ADDR", default_value = "127.0.0.1:3001")]
    pub http_addr: String,
}

impl CommandArguments {
    pub fn default_settings() -> Self {
        Self {
            data_file: None,
            strict: false,
            target_rollup: false,
            enable_stdio: true,
            enable_http: false,
            http_addr: "127.0.0.1:3001".to_string(),
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            strict: self.strict,
            target_rollup: self.target_rollup,
        }
    }

    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable_stdio && !self.enable_http {
            return Err("Enable at least one transport (stdio or http)".to_string());
        }
        if self.enable_http {
            self.http_addr
                .parse::<SocketAddr>()
                .map_err(|e| format!("Invalid MCP_HTTP_ADDR '{}': {e}", self.http_addr))?;
        }
        if let Some(path) = &self.data_file {
            if path.as_os_str().is_empty() {
                return Err("TARGET_ACHIEVER_DATA_FILE cannot be empty".to_string());
            }
            if path.is_dir() {
                return Err(format!(
                    "TARGET_ACHIEVER_DATA_FILE '{}' is a directory",
                    path.display()
                ));
            }
        }
        Ok(())
    }
}
