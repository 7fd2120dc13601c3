use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ledgervault::config::{VaultConfig, VaultPaths};
use ledgervault::session::VaultSession;
use ledgervault::store::{RecordStore, WriteQueue};
use ledgervault::transfer;

#[derive(Parser)]
#[command(
    name = "ledgervault",
    version,
    about = "Encrypted local data vault for personal finance data",
    long_about = "ledgervault stores personal finance records (accounts, \
                  transactions, categories) encrypted at rest under a key \
                  derived from your password. The password is never stored; \
                  without it the data is unrecoverable by design."
)]
struct Cli {
    /// Password (prompted interactively when not set)
    #[arg(long, env = "LEDGERVAULT_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new vault
    Init {
        /// Persist a session token so the next invocation needs no password
        #[arg(long)]
        stay_signed_in: bool,
    },

    /// Show vault status
    Status,

    /// Store one record (JSON read from the argument or stdin with '-')
    Put {
        /// Store name (e.g. accounts, transactions, categories)
        store: String,
        /// Record id
        id: String,
        /// Record JSON
        json: String,
    },

    /// Fetch and print one record
    Get { store: String, id: String },

    /// Print every record in a store
    List { store: String },

    /// Delete one record
    Delete { store: String, id: String },

    /// Export the whole vault as an encrypted backup file
    Export {
        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import an encrypted backup file into the vault
    Import {
        /// Input path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Delete the session token (next invocation requires the password)
    SignOut,

    /// Destroy the vault: all records, metadata, and the session token
    Wipe {
        /// Confirm destruction
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = VaultPaths::new()?;
    let config = VaultConfig::load_or_create(&paths)?;
    let session = Arc::new(VaultSession::open(paths.clone(), config.clone())?);
    let records = Arc::new(RecordStore::new(paths.stores_dir()));

    match cli.command {
        Commands::Init { stay_signed_in } => {
            if session.is_initialized()? {
                bail!("Vault is already initialized at {}", paths.base_dir().display());
            }
            let password = obtain_password(cli.password, true)?;
            session.initialize(&password, stay_signed_in)?;
            println!("Vault initialized at {}", paths.base_dir().display());
        }

        Commands::Status => {
            if !session.is_initialized()? {
                println!("Vault: not initialized ({})", paths.base_dir().display());
                return Ok(());
            }
            println!("Vault: initialized ({})", paths.base_dir().display());

            let restored = session.restore_from_token()?;
            println!(
                "Session: {}",
                if restored { "restorable from token" } else { "locked (password required)" }
            );

            let stores = records.store_names()?;
            if stores.is_empty() {
                println!("Stores: none");
            } else {
                println!("Stores: {}", stores.join(", "));
            }
        }

        Commands::Put { store, id, json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("Record is not valid JSON")?;
            unlock(&session, cli.password)?;
            let queue = WriteQueue::new(
                Arc::clone(&records),
                Arc::clone(&session),
                config.write_debounce(),
            )?;
            queue.enqueue(&store, &id, &value)?;
            queue.flush_now()?;
            println!("Stored {}/{}", store, id);
        }

        Commands::Get { store, id } => {
            unlock(&session, cli.password)?;
            match records.get::<serde_json::Value>(&store, &id, &session.dek()?)? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => bail!("No record {}/{}", store, id),
            }
        }

        Commands::List { store } => {
            unlock(&session, cli.password)?;
            let all: Vec<serde_json::Value> = records.get_all(&store, &session.dek()?)?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }

        Commands::Delete { store, id } => {
            if records.delete(&store, &id)? {
                println!("Deleted {}/{}", store, id);
            } else {
                println!("No record {}/{}", store, id);
            }
        }

        Commands::Export { output } => {
            unlock(&session, cli.password)?;
            let dek = session.dek()?;

            // Snapshot every store into {store_name: [records...]}
            let mut data = serde_json::Map::new();
            for store in records.store_names()? {
                let rows: Vec<serde_json::Value> = records.get_all(&store, &dek)?;
                data.insert(store, serde_json::Value::Array(rows));
            }

            let envelope = transfer::export_with_threshold(
                &serde_json::Value::Object(data),
                &dek,
                config.compression_threshold_bytes,
                Some(&mut print_progress),
            )?;
            let text = serde_json::to_string_pretty(&envelope)?;
            std::fs::write(&output, text)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("\nExported to {}", output.display());
        }

        Commands::Import { input } => {
            unlock(&session, cli.password)?;
            let dek = session.dek()?;

            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let imported = transfer::import(&text, &dek, Some(&mut print_progress))?;
            println!();

            let report = transfer::validate(&imported);
            if !report.valid {
                for error in &report.errors {
                    tracing::warn!(%error, "imported data failed structural pre-check");
                }
            }

            let obj = match imported.as_object() {
                Some(obj) => obj,
                None => bail!("Import produced no data"),
            };
            for (store, rows) in obj {
                if store == "importMetadata" {
                    continue;
                }
                let rows = match rows.as_array() {
                    Some(rows) => rows,
                    None => continue,
                };
                let batch: Vec<(String, serde_json::Value)> = rows
                    .iter()
                    .enumerate()
                    .map(|(index, row)| {
                        // Numeric ids keep their own text form; only
                        // id-less records fall back to the array index.
                        let id = match row.get("id") {
                            Some(serde_json::Value::String(s)) => s.clone(),
                            Some(serde_json::Value::Number(n)) => n.to_string(),
                            _ => index.to_string(),
                        };
                        (id, row.clone())
                    })
                    .collect();
                records.bulk_put(store, &batch, &dek)?;
                println!("Imported {} records into '{}'", batch.len(), store);
            }
        }

        Commands::SignOut => {
            session.sign_out()?;
            println!("Signed out");
        }

        Commands::Wipe { yes } => {
            if !yes {
                bail!("Refusing to wipe without --yes");
            }
            records.wipe()?;
            session.wipe()?;
            println!("Vault wiped");
        }
    }

    Ok(())
}

/// Unlock the session: token first, then password
fn unlock(session: &VaultSession, password: Option<String>) -> Result<()> {
    if !session.is_initialized()? {
        bail!("Vault is not initialized; run 'ledgervault init' first");
    }
    if session.restore_from_token()? {
        return Ok(());
    }
    let password = obtain_password(password, false)?;
    session.unlock(&password, false)?;
    Ok(())
}

fn obtain_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    if confirm {
        let again = rpassword::prompt_password("Confirm password: ")?;
        if password != again {
            bail!("Passwords do not match");
        }
    }
    Ok(password)
}

fn print_progress(percent: u8) {
    eprint!("\r{:>3}%", percent);
}
