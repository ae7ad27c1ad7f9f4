//! cabdash CLI - drive the dashboard session client from a terminal
//!
//! Resolves sessions, logs in and out, and shows how the admission gate
//! treats a list of dashboard paths for the resulting identity.

use anyhow::{bail, Context, Result};
use cabdash_core::{init_logging, CabdashConfig, LoggingConfig};
use cabdash_session::{
    AdmissionDecision, AdmissionGate, Credentials, HttpSessionBackend, Identity,
    RegistrationRequest, Role, SessionActions,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "cabdash")]
#[command(about = "Session and route admission client for the cab-booking dashboard")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ~/.cabdash/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override the API base URL
    #[arg(long)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the route table and onboarding pages
    Routes,

    /// Resolve the current session and print the identity
    Whoami,

    /// Optionally log in, then print the admission decision for each path
    Visit {
        /// Paths to check, e.g. /customer/dashboard
        #[arg(required = true)]
        paths: Vec<String>,

        /// Login email
        #[arg(short, long, requires = "password")]
        email: Option<String>,

        /// Login password
        #[arg(short, long, requires = "email")]
        password: Option<String>,

        /// Log out after the visit
        #[arg(long)]
        logout: bool,
    },

    /// Create a customer or driver account
    Register {
        /// CUSTOMER or DRIVER
        #[arg(short, long)]
        role: Role,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        /// Extra signup field (key=value, value parsed as JSON when possible)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Manage configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(CabdashConfig::default_path);
    let mut config = CabdashConfig::load_or_default(config_path.as_ref())
        .context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        config.logging.clone()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting cabdash CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config { init, show } => handle_config(init, show, config_path, &config),
        Commands::Routes => {
            print_routes(&build_gate(&config)?);
            Ok(())
        }
        Commands::Whoami => handle_whoami(&config).await,
        Commands::Visit {
            paths,
            email,
            password,
            logout,
        } => {
            let gate = build_gate(&config)?;
            let credentials = email
                .zip(password)
                .map(|(email, password)| Credentials::new(email, password));
            handle_visit(&config, &gate, credentials, &paths, logout).await
        }
        Commands::Register {
            role,
            name,
            email,
            password,
            fields,
        } => {
            let mut request = RegistrationRequest::new(role, name, email, password);
            for field in &fields {
                let (key, value) = parse_field(field)?;
                request = request.with_field(key, value);
            }
            handle_register(&config, &request).await
        }
    }
}

fn build_gate(config: &CabdashConfig) -> Result<AdmissionGate> {
    AdmissionGate::from_config(&config.routing).context("Invalid routing configuration")
}

fn connect(config: &CabdashConfig) -> Result<SessionActions> {
    config.validate().context("Invalid configuration")?;
    let backend = HttpSessionBackend::new(&config.api).context("Failed to create API client")?;
    Ok(SessionActions::with_backend(
        Arc::new(backend),
        config.api.probe_timeout_ms,
    ))
}

fn print_routes(gate: &AdmissionGate) {
    println!("Routes:");
    for policy in gate.routes().iter() {
        println!("  {:<32} {}", policy.pattern, policy.access);
    }

    println!();
    println!("Redirects:");
    println!("  unauthenticated -> {}", gate.login_path());
    println!("  wrong role      -> {}", gate.home_path());
    for role in [Role::Customer, Role::Driver] {
        if let Some(paths) = gate.onboarding(role) {
            println!(
                "  {:<15} create profile at {}, dashboard at {}",
                role, paths.create_profile, paths.dashboard
            );
        }
    }
}

fn print_identity(identity: &Identity) {
    println!("{}", identity.summary());
    if let Some(profile) = identity.profile() {
        match serde_json::to_string_pretty(&profile.0) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{:?}", profile),
        }
    }
}

async fn handle_whoami(config: &CabdashConfig) -> Result<()> {
    let actions = connect(config)?;
    actions.resolve().await;
    print_identity(&actions.store().snapshot());
    Ok(())
}

async fn handle_visit(
    config: &CabdashConfig,
    gate: &AdmissionGate,
    credentials: Option<Credentials>,
    paths: &[String],
    logout: bool,
) -> Result<()> {
    let actions = connect(config)?;
    actions.resolve().await;

    if let Some(credentials) = credentials {
        let role = actions.login(&credentials).await?;
        println!("Logged in as {}", role);
    }

    let identity = actions.store().snapshot();
    print_identity(&identity);
    println!();

    for path in paths {
        match gate.admit(&identity, path) {
            Some(decision) => println!("{:<32} {}", path, decision),
            None => println!("{:<32} NOT FOUND", path),
        }
    }

    if logout {
        let outcome = actions.logout().await;
        if outcome.server_confirmed {
            println!("Logged out");
        } else {
            println!("Logged out locally; the server did not confirm");
        }
        let after = gate.admit(&actions.store().snapshot(), &paths[0]);
        if let Some(AdmissionDecision::Redirect(target)) = after {
            println!("{} now redirects to {}", paths[0], target);
        }
    }

    Ok(())
}

async fn handle_register(config: &CabdashConfig, request: &RegistrationRequest) -> Result<()> {
    let actions = connect(config)?;
    let record = actions.register(request).await?;
    println!("Registered {} as {}", request.email, request.role);
    if !record.is_null() {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}

fn handle_config(
    init: bool,
    show: bool,
    config_path: Option<PathBuf>,
    config: &CabdashConfig,
) -> Result<()> {
    if !init && !show {
        bail!("Nothing to do; pass --init or --show");
    }

    if init {
        let Some(path) = config_path else {
            bail!("No home directory found; pass --config <PATH>");
        };
        CabdashConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {}", path.display());
    }

    if show {
        let rendered =
            toml::to_string_pretty(config).context("Failed to render configuration")?;
        println!("{}", rendered);
    }

    Ok(())
}

fn parse_field(field: &str) -> Result<(&str, Value)> {
    let Some((key, raw)) = field.split_once('=') else {
        bail!("Invalid field '{}'. Use key=value", field);
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key, value))
}
