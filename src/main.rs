mod auth;
mod cli;
mod config;
mod error;
mod forge;
mod gitremote;
mod output;
mod watch;

use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    info!("Starting gf {}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = cli.execute().await {
        if let Some(code) = error::exit_code(&err) {
            std::process::exit(code);
        }
        eprintln!("{} {err:#}", output::bright_red("error:"));
        std::process::exit(1);
    }
}

/// `RUST_LOG` as usual; a non-empty `GF_DEBUG` turns on debug output for gf itself.
fn init_logging() {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if std::env::var_os("GF_DEBUG").is_some_and(|v| !v.is_empty()) {
        builder.filter_module(module_path!(), log::LevelFilter::Debug);
    }
    builder.init();
}
