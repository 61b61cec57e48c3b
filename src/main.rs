use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clickguard::server::ClickGuardServer;
use clickguard::ClickGuardService;
use clickguard_core::{evaluate_visit, ClickGuardConfig, Mode, Severity, VisitEvent};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clickguard")]
#[command(about = "Click-fraud detection rule engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ClickGuard server
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "clickguard.yaml")]
        config: String,

        /// Port to listen on (overrides the configuration file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "clickguard.yaml")]
        config: String,
    },
    /// Evaluate a single visit event against a policy
    Evaluate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "clickguard.yaml")]
        config: String,

        /// Path to a JSON visit event, or '-' for stdin
        #[arg(short, long)]
        event: String,

        /// Mode to evaluate against (defaults to the configured active mode)
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// List the built-in detection signals
    Signals,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Initialize Tracing
    tracing_subscriber::fmt::init();

    let args = Cli::parse();

    match args.command {
        Commands::Validate { config } => {
            let config_data = ClickGuardConfig::from_file(&config)?;
            let policies = config_data.build_policy_set()?;

            println!("✅ Configuration valid: {}", config);
            println!("   Active mode: {}", policies.active.as_str());
            for mode in [Mode::Aggressive, Mode::Smart] {
                let policy = policies.policy(mode);
                println!(
                    "   {}: {} active signals, {}/{} rules enabled",
                    mode.as_str(),
                    policy.active_signals.len(),
                    policy.rules.normalize().count(),
                    policy.rules.len()
                );
            }
            println!("   Agents: {}", config_data.agents.len());
        }
        Commands::Evaluate {
            config,
            event,
            mode,
        } => {
            let config_data = ClickGuardConfig::from_file(&config)?;
            let policies = config_data.build_policy_set()?;

            let raw = if event == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&event)?
            };
            let visit: VisitEvent = serde_json::from_str(&raw)?;

            let mode = match mode {
                Some(name) => name.parse::<Mode>()?,
                None => policies.active,
            };
            let verdict = evaluate_visit(&visit, policies.policy(mode))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "mode": mode,
                    "verdict": verdict,
                }))?
            );
        }
        Commands::Signals => {
            for signal in clickguard_core::signal::catalog() {
                let severity = match signal.severity {
                    Severity::Hard => "hard",
                    Severity::Soft => "soft",
                };
                println!("{:<24} {:<5} {}", signal.key.as_str(), severity, signal.description);
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "clickguard",
                &mut std::io::stdout(),
            );
        }
        Commands::Run { config, port } => {
            println!("🔥 Initializing ClickGuard Daemon...");

            // 1. Load Config
            let config_data = ClickGuardConfig::from_file(&config)?;

            // 2. Build Service
            let service = Arc::new(ClickGuardService::from_config(&config_data)?);

            // 3. Start Server with rate limiting and API key auth
            let rate_limit = config_data.service.rate_limit_per_second;
            let api_keys = config_data.service.api_keys.clone();
            let host = config_data.service.host.clone();
            let port = port.unwrap_or(config_data.service.port);

            let server = ClickGuardServer::new(service, config, rate_limit, api_keys);
            server.run(&host, port).await?;
        }
    }

    Ok(())
}
