use card_entry::application::coordinator::EditCoordinator;
use card_entry::application::resolver::ResolverConfig;
use card_entry::domain::brand::CardBrand;
use card_entry::domain::ports::SharedAccountRangeService;
use card_entry::domain::static_ranges::StaticRangeTable;
use card_entry::infrastructure::cached::CachingAccountRangeService;
use card_entry::infrastructure::in_memory::InMemoryAccountRangeService;
use card_entry::interfaces::csv::edit_reader::EditScriptReader;
use card_entry::interfaces::csv::replay::ReplaySession;
use card_entry::interfaces::csv::state_writer::StateWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Edit script CSV file (`action,start,removed,text`)
    input: PathBuf,

    /// JSON range table served by the simulated remote lookup. Defaults to the bundled table.
    #[arg(long)]
    ranges: Option<PathBuf>,

    /// Simulated remote lookup latency in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Brand that always needs a remote lookup (repeatable). Defaults to unknown and unionpay.
    #[arg(long = "remote-brand")]
    remote_brands: Vec<CardBrand>,

    /// Cache remote lookups per BIN
    #[arg(long)]
    cache: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let table = StaticRangeTable::bundled();
    let remote_table = match &cli.ranges {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            StaticRangeTable::from_json(file).into_diagnostic()?
        }
        None => (*table).clone(),
    };

    let backend = InMemoryAccountRangeService::from_table(&remote_table)
        .with_latency(Duration::from_millis(cli.latency_ms));
    let service: SharedAccountRangeService = if cli.cache {
        Arc::new(CachingAccountRangeService::new(Arc::new(backend)))
    } else {
        Arc::new(backend)
    };

    let config = if cli.remote_brands.is_empty() {
        ResolverConfig::default()
    } else {
        ResolverConfig::with_remote_brands(cli.remote_brands)
    };

    let mut field = EditCoordinator::new(service, table, config, Handle::current());
    field.attach();

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = EditScriptReader::new(file);

    let stdout = io::stdout();
    let mut writer = StateWriter::new(stdout.lock());

    let mut session = ReplaySession::new(&mut field);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                let record = session.step(&command).await;
                writer.write(&record).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading edit command: {}", e);
            }
        }
    }
    writer.flush().into_diagnostic()?;
    drop(session);

    field.detach();
    Ok(())
}
