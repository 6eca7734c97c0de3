use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for the publishcore application.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Also clean up intermediate render files (true/false).
    #[arg(long, global = true)]
    pub include_intermediate_files: Option<bool>,
    /// Log filter, e.g. `debug` or `collect_cleanup=debug`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the publish plugins over a request file and print the cleanup report.
    Publish {
        /// JSON file with the scene snapshot and instances.
        request: PathBuf,
    },
    /// Operations on plugins.
    Plugin {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginCommand {
    /// List registered plugins in run order.
    List,
}
