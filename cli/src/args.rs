//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for toolwire
#[derive(Parser, Debug)]
#[command(name = "toolwire")]
#[command(author, version, about = "Delegate LLM tool execution over one duplex channel")]
#[command(long_about = r#"
toolwire moves tool calls between an orchestrator and an executor over a
single duplex channel (WebSocket or a child process's stdio).

Configuration files are loaded from (in priority order):
1. TOOLWIRE_* environment variables (e.g. TOOLWIRE_SERVER__LISTEN)
2. --config <path>       Explicit config file
3. ./toolwire.toml       Project-level config
4. ~/.config/toolwire/config.toml   Global config

Example:
  toolwire serve --listen 0.0.0.0:8787 --allow-origin https://app.example.com
  toolwire call read_file --args '{"path":"README.md"}' --executor ./my-executor
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept WebSocket clients and run the bootstrap handshake with each
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// Additional browser origin to accept (can be specified multiple times)
        #[arg(long = "allow-origin", value_name = "ORIGIN")]
        allow_origin: Vec<String>,

        /// Accept every browser origin
        #[arg(long)]
        allow_any_origin: bool,
    },

    /// Run one tool call against a local executor and print the result
    Call {
        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, value_name = "JSON", default_value = "{}")]
        args: String,

        /// Correlation id (generated when omitted)
        #[arg(long, value_name = "ID")]
        id: Option<String>,

        /// Executor program (overrides executor.command)
        #[arg(long, value_name = "PROGRAM")]
        executor: Option<String>,

        /// Argument passed to the executor (can be specified multiple times)
        #[arg(long = "executor-arg", value_name = "ARG", allow_hyphen_values = true)]
        executor_args: Vec<String>,

        /// Working directory sent with the request (overrides executor.working_dir)
        #[arg(long, value_name = "DIR")]
        working_dir: Option<String>,
    },
}
