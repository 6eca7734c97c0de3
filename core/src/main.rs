use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::debug;

use publishcore::{
    cli::{Cli, Command, PluginCommand},
    load_request, Config, PublishHost,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    tracing_subscriber::fmt()
        .with_env_filter(cfg.env_filter()?)
        .with_writer(std::io::stderr)
        .init();
    debug!(?cfg, "configuration loaded");

    let host = PublishHost::with_default_plugins(&cfg);
    match cli.command {
        Some(Command::Publish { request }) => {
            let request = load_request(&request)?;
            let report = host.run(&request.host, &request.instances, &request.scene);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Command::Plugin {
            command: PluginCommand::List,
        }) => {
            for meta in host.list() {
                println!(
                    "{:<32} {:<36} {:<6} {}",
                    meta.id,
                    meta.label,
                    meta.order,
                    meta.families.join(",")
                );
            }
        }
        None => Cli::command().print_help()?,
    }
    Ok(())
}
