//! LedgerKV demo - one writer and several readers sharing a store

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ledgerkv_core::{ConditionEvent, KvStore, PersistMode, StoreConfig, StoreResult};

type Store = KvStore<String, String>;

#[derive(Parser)]
#[command(name = "ledgerkv-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot file
    #[arg(long, default_value = "store.dat")]
    snapshot: PathBuf,

    /// Operation log file
    #[arg(long, default_value = "log.dat")]
    log: PathBuf,

    /// Key whose value suppresses log records
    #[arg(long, default_value = "trigger")]
    condition_key: String,

    /// Value of the condition key that suppresses log records
    #[arg(long, default_value = "activate")]
    condition_value: String,

    /// Number of keys each thread writes or reads
    #[arg(long, default_value_t = 8)]
    keys: usize,

    /// Append framed records instead of rewriting whole files
    #[arg(long)]
    incremental: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    let mode = if cli.incremental { PersistMode::Incremental } else { PersistMode::WholeFile };

    let config = StoreConfig::new(&cli.snapshot, &cli.log)
        .with_condition(cli.condition_key.clone(), cli.condition_value.clone())
        .persist_mode(mode);

    let store = Store::open(config)
        .context("failed to open store")?
        .with_observer(|event: &ConditionEvent<String, String>| {
            tracing::info!(
                key = %event.condition.key,
                operation = %event.suppressed.operation,
                suppressed_key = %event.suppressed.key,
                "condition met"
            );
        });
    let store = Arc::new(store);

    let writer = spawn("WRITE_THREAD_1", &store, cli.keys, {
        let (key, value) = (cli.condition_key.clone(), cli.condition_value.clone());
        move |store, i| {
            store.put(format!("key{}", i), format!("value{}", i))?;
            if i == 5 {
                store.put(key.clone(), value.clone())?;
            }
            tracing::info!("Put key{}: value{}", i, i);
            Ok(())
        }
    })?;
    let reader = spawn("READ_THREAD_1", &store, cli.keys, read_one)?;
    join(writer)?;
    join(reader)?;

    let readers = [
        spawn("READ_THREAD_2", &store, cli.keys, read_one)?,
        spawn("READ_THREAD_3", &store, cli.keys, read_one)?,
    ];
    for reader in readers {
        join(reader)?;
    }

    println!(
        "********* Reading back events recorded in {} **************",
        store.config().log_path.display()
    );
    store.reload_log().context("failed to reload log")?;
    for record in store.log_records() {
        println!(
            "{{operation: {}, key: {}, value: {}}}",
            record.operation,
            record.key,
            record.value.as_deref().unwrap_or("<absent>")
        );
    }
    Ok(())
}

fn read_one(store: &Store, i: usize) -> StoreResult<()> {
    let value = store.get(&format!("key{}", i))?;
    tracing::info!("Get key{}: {:?}", i, value);
    Ok(())
}

/// Run `step(store, i)` for `i` in `0..keys` on a named thread.
fn spawn<F>(
    name: &str,
    store: &Arc<Store>,
    keys: usize,
    step: F,
) -> Result<thread::JoinHandle<StoreResult<()>>>
where
    F: Fn(&Store, usize) -> StoreResult<()> + Send + 'static,
{
    let store = Arc::clone(store);
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || (0..keys).try_for_each(|i| step(&store, i)))
        .with_context(|| format!("failed to spawn {}", name))
}

fn join(handle: thread::JoinHandle<StoreResult<()>>) -> Result<()> {
    let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
    handle
        .join()
        .map_err(|_| anyhow!("{} panicked", name))?
        .with_context(|| format!("{} failed", name))
}
