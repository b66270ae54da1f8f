use clap::{Parser, Subcommand};
use std::time::Duration;

use live_config::config::ClientConfig;
use live_config::lifecycle::signals::wait_for_signal;
use live_config::observability::logging;
use live_config::transport::{HttpStoreClient, StoreTransport};
use live_config::{connect, ConnectionState, ReconcilerHandle, Scalar};

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Read, edit and watch a live configuration store", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8000")]
    url: String,

    /// Quiet period before an edit is sent.
    #[arg(short, long, default_value_t = 500)]
    debounce_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full configuration
    Get,
    /// Change one setting
    Set {
        category: String,
        setting: String,
        value: String,
    },
    /// Print every configuration change and connection transition
    Watch,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("warn");

    let client = ClientConfig {
        store_url: cli.url,
        debounce_ms: cli.debounce_ms,
        ..ClientConfig::default()
    };
    let handle = connect(&client)?;
    handle.initialize().await?;

    let result = match cli.command {
        Commands::Get => print_config(&handle),
        Commands::Set {
            category,
            setting,
            value,
        } => set(&handle, &client, &category, &setting, value).await,
        Commands::Watch => watch(&handle).await,
    };

    handle.shutdown();
    result
}

fn print_config(handle: &ReconcilerHandle) -> Result<(), Box<dyn std::error::Error>> {
    match handle.current() {
        Some(config) => println!("{}", serde_json::to_string_pretty(&config)?),
        None => println!("(loading)"),
    }
    Ok(())
}

async fn set(
    handle: &ReconcilerHandle,
    client: &ClientConfig,
    category: &str,
    setting: &str,
    value: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut connection = handle.connection();
    tokio::time::timeout(
        CONNECT_TIMEOUT,
        connection.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .map_err(|_| "timed out connecting to the store")??;

    let requested = handle.apply_local_edit(category, setting, value).await?;
    // Returns once the write has been answered, accepted or not.
    handle.flush().await?;

    // The local view keeps showing the edit after a failed write, so ask the
    // Store itself.
    let store = HttpStoreClient::new(&client.store_url, client.request_timeout())?;
    let current = store.fetch().await?;
    let line = confirm(category, setting, &requested, current.get(category, setting))?;
    println!("{line}");
    Ok(())
}

/// Compare what the Store holds with what was requested.
fn confirm(
    category: &str,
    setting: &str,
    requested: &Scalar,
    stored: Option<&Scalar>,
) -> Result<String, String> {
    match stored {
        Some(stored) if stored == requested => Ok(format!("{category}.{setting} = {stored}")),
        Some(stored) => Err(format!(
            "store kept {category}.{setting} = {stored} (requested {requested})"
        )),
        None => Err(format!("{category}.{setting} no longer exists")),
    }
}

async fn watch(handle: &ReconcilerHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut view = handle.view();
    let mut connection = handle.connection();
    print_config(handle)?;
    println!("[{}]", describe(*connection.borrow_and_update()));

    let stop = wait_for_signal();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => return Ok(()),
            changed = view.changed() => {
                changed?;
                let current = view.borrow_and_update().clone();
                if let Some(config) = current {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
            }
            changed = connection.changed() => {
                changed?;
                println!("[{}]", describe(*connection.borrow_and_update()));
            }
        }
    }
}

fn describe(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
    }
}
