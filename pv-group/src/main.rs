use clap::Parser;
use pv_codegen::GenerateOptions;
use pv_group::demo::demo_group;
use pv_group::ServerConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prints client bindings for the example group, then serves it until
/// `exit` is written or the process is interrupted.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Prefix of every PV name
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = ServerConfig::from_env();
    if let Some(prefix) = args.prefix {
        config = config.with_prefix(prefix);
    }

    let shutdown = CancellationToken::new();
    let group = demo_group(&config.prefix, shutdown.clone())?;

    println!("// Auto-generated bindings from here on:");
    println!("// -----------------------------------");
    for line in group.bindings(&GenerateOptions::default())?.lines() {
        println!("{line}");
    }
    println!("// -------end autogenerated bindings---");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!(prefix = %config.prefix, "Starting up");

    let database = group.into_database();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    database.serve(&config, shutdown).await;
    Ok(())
}
