//! `cirrus` -- submit tenant changes and wait for their outcome.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cirrus_client::api::{ApiClient, Receipt};
use cirrus_client::config::ClientConfig;
use cirrus_client::error::ClientError;
use cirrus_client::poll::{start_polling, PollConfig, TaskOutcome};
use cirrus_core::action::TenantAction;
use cirrus_core::messages;
use cirrus_core::types::DbId;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Cloud tenant console client.
#[derive(Parser, Debug)]
#[command(name = "cirrus", about = "Submit cloud tenant changes and wait for them to finish")]
struct Cli {
    /// API server root.
    #[arg(long, env = "CIRRUS_API_URL", default_value = "http://localhost:3000", global = true)]
    api_url: String,

    /// JWT access token.
    #[arg(long, env = "CIRRUS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Milliseconds between status queries.
    #[arg(long, env = "CIRRUS_POLL_INTERVAL_MS", default_value_t = 1000, global = true)]
    poll_interval_ms: u64,

    /// Give up after this many status queries.
    #[arg(long, env = "CIRRUS_MAX_POLLS", global = true)]
    max_polls: Option<u32>,

    /// Return right after submission instead of waiting for the outcome.
    #[arg(long, global = true)]
    no_wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a tenant.
    Create {
        /// Tenant name.
        name: String,
        /// Provider id, or `<provider>:<parent tenant>` to nest under a parent.
        #[arg(long)]
        ems_id: String,
    },

    /// Change a tenant's name or provider.
    Update {
        id: DbId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ems_id: Option<String>,
    },

    /// Delete one or more tenants.
    Delete {
        #[arg(required = true)]
        ids: Vec<DbId>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cirrus_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(token) = cli.token.clone() else {
        eprintln!("error: a token is required (--token or CIRRUS_TOKEN)");
        return ExitCode::from(2);
    };

    let config = ClientConfig {
        api_url: cli.api_url.clone(),
        token,
        poll_interval: Duration::from_millis(cli.poll_interval_ms),
        max_polls: cli.max_polls,
    };

    match run(cli, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_enqueue_failure() {
                eprintln!("the request was valid; retrying is safe");
            }
            ExitCode::FAILURE
        }
    }
}

/// Submit, then poll to the single outcome. `Ok(false)` means the task failed.
async fn run(cli: Cli, config: ClientConfig) -> Result<bool, ClientError> {
    let client = ApiClient::new(&config);

    let (action, label, receipt) = match &cli.command {
        Command::Create { name, ems_id } => (
            TenantAction::Create,
            name.clone(),
            client.create_tenant(name, ems_id).await?,
        ),
        Command::Update { id, name, ems_id } => (
            TenantAction::Update,
            name.clone().unwrap_or_else(|| format!("#{id}")),
            client
                .update_tenant(*id, name.as_deref(), ems_id.as_deref())
                .await?,
        ),
        Command::Delete { ids } => (
            TenantAction::Delete,
            "Cloud Tenants".to_string(),
            client.delete_tenants(ids).await?,
        ),
    };

    print_receipt(&receipt);
    let Some(handle) = receipt.task_handle else {
        // Cancelled forms succeed; a delete where every target was blocked does not.
        return Ok(receipt.warnings.is_empty());
    };
    if cli.no_wait {
        println!("{handle}");
        return Ok(true);
    }

    let mut poll = PollConfig::new(config.poll_interval);
    if let Some(max) = config.max_polls {
        poll = poll.with_max_attempts(max);
    }

    let (tx, rx) = tokio::sync::oneshot::channel::<TaskOutcome>();
    let session = start_polling(Arc::new(client), handle, poll, move |outcome| {
        let _ = tx.send(outcome);
    });

    tokio::select! {
        outcome = rx => match outcome {
            Ok(outcome) => {
                println!("{}", messages::finished(action, &label, outcome.ok, &outcome.message));
                Ok(outcome.ok)
            }
            Err(_) => Err(ClientError::InvalidResponse(
                "poll loop ended without an outcome".into(),
            )),
        },
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            eprintln!("stopped waiting for task {}", session.handle());
            Ok(false)
        }
    }
}

fn print_receipt(receipt: &Receipt) {
    for warning in &receipt.warnings {
        eprintln!("warning: {}", warning.message);
    }
    if let Some(message) = &receipt.message {
        println!("{message}");
    }
}
