mod authn;
mod authz;
mod config;
mod context;
mod error;
mod files;
mod handlers;
mod humanize;
mod logs;
mod proxy;
mod response;
mod restful;
mod store;
mod templates;

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use crate::authn::Credential;
use crate::config::GateConfig;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct GateArgs {
    /// Path to the TOML configuration file. Defaults apply when it is missing.
    #[arg(long, short, default_value = "gate.toml")]
    pub config: PathBuf,

    /// Print gate configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(subcommand)]
    pub command: Option<GateCommand>,
}

#[derive(Subcommand, Debug)]
enum GateCommand {
    /// Generate a new access token and print it with the digest to store as
    /// `liqk:tokenHash`.
    GenToken,
}

fn gen_token() {
    let credential = Credential::generate();
    println!("token:     {}", credential.secret());
    println!("tokenHash: {}", credential.digest());
}

async fn run(args: GateArgs) -> Result<()> {
    if let Some(GateCommand::GenToken) = args.command {
        gen_token();
        return Ok(());
    }

    let (cfg, source) = GateConfig::load(&args.config)?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init("gate")?;
    source.report();

    let ctx = cfg.build_ctx()?;
    let restful_server = cfg.build_restful_server(ctx);
    restful_server.run().await.context("run restful server")?;

    info!("Gate exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = GateArgs::parse();
    match run(args).await {
        Ok(()) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
