//!
//! tonearm server binary
//! ---------------------
//! Command-line entry point for starting the tonearm HTTP server. Supports
//! configuration via CLI flags and environment variables; everything else
//! lives in the TOML config file.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

use tonearm::config::Config;

fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.parse::<u16>().ok(),
        Err(_) => None,
    }
}

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return args[i + 1].parse::<u16>().ok();
            }
        i += 1;
    }
    None
}

fn parse_string_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 < args.len() {
                return Some(args[i + 1].clone());
            }
            break;
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    println!(
        r"  __
 / /_____  ____  ___  ____ __________ ___
/ __/ __ \/ __ \/ _ \/ __ `/ ___/ __ `__ \
\ /_/ /_/ / / / /  __/ /_/ / /  / / / / / /
 \__/\____/_/ /_/\___/\__,_/_/  /_/ /_/ /_/  "
    );

    // Initialize tracing subscriber with env filter if provided
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("tonearm Server\n\nUSAGE:\n  tonearm_server [--config PATH] [--port N]\n\nOPTIONS:\n  --config PATH   Config file (env: TONEARM_CONFIG, default tonearm.toml)\n  --port N        HTTP port override (env: TONEARM_PORT, default from config)\n");
        return Ok(());
    }

    // Defaults, then environment, then CLI arguments
    let env_config = env::var("TONEARM_CONFIG").ok();
    let env_port = parse_port_env("TONEARM_PORT");
    let arg_config = parse_string_arg(&args, "--config");
    let arg_port = parse_port_arg(&args, "--port");

    let config_path = PathBuf::from(
        arg_config
            .or(env_config)
            .unwrap_or_else(|| "tonearm.toml".to_string()),
    );

    let config = Config::load(&config_path)?;
    let port = arg_port.or(env_port).unwrap_or(config.port);

    println!(
        "tonearm starting using port: http={}, config={}",
        port,
        config_path.display()
    );
    tracing::info!("Using port: http={}, config={}", port, config_path.display());

    tonearm::server::run_with_port(config, port).await
}
