use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use vigil::{initialize_root, RootConfig, RootError};
use vigil_core::Session;
use vigil_policy::Decision;

/// Vigil: API authorization decisions
///
/// Deny statements first, allow statements second, deny by default.
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Policy file the configuration should point at
        #[arg(long)]
        policies_path: Option<PathBuf>,
    },

    /// Decide a request read from a JSON file
    Check {
        /// JSON request: {"type": "<RequestType>", "fields": {...}}
        #[arg(long)]
        request: PathBuf,

        /// Account issuing the request
        #[arg(long)]
        account: String,

        /// Sub-account user issuing the request; omit for an account session
        #[arg(long)]
        user: Option<String>,
    },

    /// Validate the configured policy file
    Validate,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("vigil=debug,vigil_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, RootError> {
    match cli.command {
        Commands::Init { policies_path } => cmd_init(cli.config.as_ref(), policies_path),
        Commands::Check {
            request,
            account,
            user,
        } => cmd_check(cli.config.as_ref(), &request, account, user),
        Commands::Validate => cmd_validate(cli.config.as_ref()),
    }
}

fn cmd_init(
    config_path: Option<&PathBuf>,
    policies_path: Option<PathBuf>,
) -> Result<ExitCode, RootError> {
    let mut config = load_config(config_path)?;
    if let Some(pp) = policies_path {
        config.policies_path = pp;
    }

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("Vigil configuration written.");
    println!("  Config:   {}", save_path.display());
    println!("  Policies: {}", config.policies_path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(
    config_path: Option<&PathBuf>,
    request_path: &Path,
    account: String,
    user: Option<String>,
) -> Result<ExitCode, RootError> {
    let config = load_config(config_path)?;
    let state = initialize_root(config)?;

    let json = std::fs::read_to_string(request_path)?;
    let request = state.catalog.request_from_json(&json)?;
    let session = match user {
        Some(user) => Session::user(account, user),
        None => Session::account(account),
    };

    info!(session = %session, "checking request");
    let decision = state.evaluate(&request, &session)?;
    println!("{}", decision);

    Ok(match decision {
        Decision::Allow => ExitCode::SUCCESS,
        Decision::Deny(_) => ExitCode::from(1),
    })
}

fn cmd_validate(config_path: Option<&PathBuf>) -> Result<ExitCode, RootError> {
    let config = load_config(config_path)?;
    let state = initialize_root(config)?;

    println!(
        "Policies valid ({} accounts, {} warnings).",
        state.policies.account_count(),
        state.warnings.len()
    );
    for warning in &state.warnings {
        println!("  policy[{}]: {}", warning.policy_uuid, warning.message);
    }
    Ok(ExitCode::SUCCESS)
}
