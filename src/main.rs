use anyhow::Context;
use clap::{Parser, Subcommand};
use device_mcp::config::load_settings;
use device_mcp::core::FleetManager;
use device_mcp::tool_span;
use device_mcp::utils::tracing::init_tracing;
use device_mcp::utils::ShutdownCoordinator;
use tracing::{info, Instrument};

#[derive(Parser)]
#[command(name = "device-mcp")]
#[command(about = "Inspect and call MCP tool providers")]
#[command(version)]
struct Cli {
    /// Log level
    #[arg(short, long, global = true, default_value = "info", env = "DEVICE_MCP_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the merged tool catalog as JSON
    Tools {
        /// Provider settings file
        #[arg(short, long, default_value = "data/.mcp_server_settings.json")]
        config: String,
    },
    /// Call one tool through the fleet and print its result
    Call {
        /// Provider settings file
        #[arg(short, long, default_value = "data/.mcp_server_settings.json")]
        config: String,
        /// Function name as listed by `tools`
        function: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let shutdown = ShutdownCoordinator::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_shutdown_signal().await });
    }

    match cli.command {
        Command::Tools { config } => {
            let fleet = start_fleet(&config).await?;
            let tools = fleet.get_all_tools();
            fleet.shutdown().await;

            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Command::Call {
            config,
            function,
            args,
        } => {
            let fleet = start_fleet(&config).await?;

            let span = match fleet.owner(&function) {
                Some(owner) => tool_span!("call", owner.provider.as_str(), owner.tool.as_str()),
                None => tool_span!("call", "unknown", function.as_str()),
            };
            let outcome = shutdown
                .run_until_shutdown(fleet.execute_tool(&function, args).instrument(span))
                .await;
            fleet.shutdown().await;

            match outcome {
                Some(result) => {
                    let text = result.with_context(|| format!("calling {}", function))?;
                    println!("{}", text);
                }
                None => info!("Call abandoned"),
            }
        }
    }

    Ok(())
}

async fn start_fleet(config: &str) -> anyhow::Result<FleetManager> {
    let settings = load_settings(config)
        .await
        .with_context(|| format!("loading {}", config))?;

    let fleet = FleetManager::from_settings(settings);
    fleet.initialize_all().await;
    Ok(fleet)
}
