//! chainsink CLI: resolve block ranges and manage sink cursors.
//!
//! # Commands
//! ```text
//! chainsink info
//! chainsink range  <START[:END]> --initial-block <N> [--json]
//! chainsink setup  --dsn <url> [--schema public]
//! chainsink cursor show  --dsn <url> --module-hash <hex>
//! chainsink cursor reset --dsn <url> --module-hash <hex>
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chainsink_core::checkpoint::CursorStore;
use chainsink_core::flush::{DEFAULT_FLUSH_MODULO, LIVE_FLUSH_MODULO};
use chainsink_core::sink::STOP_GRACE_PERIOD;
use chainsink_core::store::TableStore;
use chainsink_core::{resolve_block_range, OutputModule, SinkerConfig};
use chainsink_storage::PostgresLoader;

#[derive(Parser)]
#[command(
    name = "chainsink",
    about = "Checkpoint-and-flush sink for block-scoped database changes",
    long_about = "
chainsink CLI: inspect sink settings and manage the cursors a sink resumes from.

ENVIRONMENT VARIABLES:
  CHAINSINK_DSN    PostgreSQL connection string (for setup / cursor)
  RUST_LOG         Log filter, e.g. \"info,chainsink_core=debug\"
",
    version
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON structured logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show default sink settings
    Info,

    /// Resolve a block range expression against a module's initial block
    Range {
        /// Range in `start[:end]` form; empty start uses the initial block
        #[arg(default_value = "")]
        expr: String,
        /// Initial block of the output module
        #[arg(long, default_value_t = 0)]
        initial_block: u64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the cursors table in the target schema
    Setup {
        #[arg(long, env = "CHAINSINK_DSN")]
        dsn: String,
        #[arg(long, default_value = "public")]
        schema: String,
    },

    /// Inspect or reset a stored cursor
    Cursor {
        #[command(subcommand)]
        action: CursorAction,
    },
}

#[derive(Subcommand)]
enum CursorAction {
    /// Print the cursor stored for an output module
    Show {
        #[arg(long, env = "CHAINSINK_DSN")]
        dsn: String,
        #[arg(long, default_value = "public")]
        schema: String,
        /// Output module hash (hex)
        #[arg(long)]
        module_hash: String,
    },
    /// Delete the cursor so the next run bootstraps from the range start
    Reset {
        #[arg(long, env = "CHAINSINK_DSN")]
        dsn: String,
        #[arg(long, default_value = "public")]
        schema: String,
        /// Output module hash (hex)
        #[arg(long)]
        module_hash: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Range { expr, initial_block, json } => cmd_range(&expr, initial_block, json),
        Commands::Setup { dsn, schema } => cmd_setup(&dsn, &schema).await,
        Commands::Cursor { action } => match action {
            CursorAction::Show { dsn, schema, module_hash } => cmd_cursor_show(&dsn, &schema, &module_hash).await,
            CursorAction::Reset { dsn, schema, module_hash } => {
                cmd_cursor_reset(&dsn, &schema, &module_hash).await
            }
        },
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn cursor_key(module_hash: &str) -> Result<String> {
    let hash = module_hash.trim_start_matches("0x");
    let bytes = hex::decode(hash).with_context(|| format!("invalid module hash '{module_hash}'"))?;
    Ok(OutputModule::new("", 0, bytes).cursor_key())
}

fn cmd_info() -> Result<()> {
    let defaults = SinkerConfig::default();
    println!("chainsink v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Defaults:");
    println!("  Live block time delta:   {}s", defaults.live_block_time_delta_secs);
    println!("  Flush interval:          every {} blocks", defaults.flush_interval);
    println!("  Fallback flush interval: every {DEFAULT_FLUSH_MODULO} blocks");
    println!("  Live flush interval:     every {LIVE_FLUSH_MODULO} block");
    println!("  Stop grace period:       {}s", STOP_GRACE_PERIOD.as_secs());
    println!();
    println!("Storage backends: memory, postgres");
    Ok(())
}

fn cmd_range(expr: &str, initial_block: u64, json: bool) -> Result<()> {
    let module = OutputModule::new("", initial_block, Vec::new());
    let range = resolve_block_range(expr, &module)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&range)?);
    } else {
        println!("{range}");
    }
    Ok(())
}

async fn cmd_setup(dsn: &str, schema: &str) -> Result<()> {
    let loader = PostgresLoader::connect(dsn, schema).await?;
    loader.setup().await?;
    println!("Cursors table ready on {}", loader.identifier());
    Ok(())
}

async fn cmd_cursor_show(dsn: &str, schema: &str, module_hash: &str) -> Result<()> {
    let key = cursor_key(module_hash)?;
    let loader = PostgresLoader::connect(dsn, schema).await?;

    match loader.load_cursor(&key).await? {
        Some(cursor) => println!("{key}: {cursor}"),
        None => println!("{key}: no cursor stored"),
    }
    Ok(())
}

async fn cmd_cursor_reset(dsn: &str, schema: &str, module_hash: &str) -> Result<()> {
    let key = cursor_key(module_hash)?;
    let loader = PostgresLoader::connect(dsn, schema).await?;
    loader.delete_cursor(&key).await?;
    tracing::info!(%key, "Cursor deleted");
    println!("{key}: cursor reset");
    Ok(())
}
