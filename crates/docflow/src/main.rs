use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::{bounded, never, select, tick};
use log::{error, info};

use docflow::notify::LogNotifier;
use docflow::storage::{self, FileLayout};
use docflow::{
    init_logging, load_config, Database, DocflowError, Manager, MemoryIndex, Pipeline,
    PipelineConfig, Registry, Store, SystemTools,
};

#[derive(Parser, Debug)]
#[command(name = "docflow", version, about = "Ingest, enrich and index documents")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "DOCFLOW_CONFIG", default_value = "docflow.json")]
    config: PathBuf,

    /// Log worker status every SECS seconds; 0 disables
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    print_status: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("docflow: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> docflow::Result<()> {
    let config = load_config(&cli.config)?;
    init_logging(&config.logging)?;

    let input = Path::new(&config.input_directory);
    FileLayout::new(&config.data_directory).ensure_directories()?;
    storage::ensure_directory(input)?;

    let db = Arc::new(Database::open(&config.database_path())?);
    for name in &config.users {
        let user = db.ensure_user(name)?;
        storage::ensure_directory(&input.join(&user.name))?;
    }

    let tools = Arc::new(SystemTools::probe(&config));
    let registry = Arc::new(Registry::build(tools.availability()));
    info!(
        "Supported mimetypes: {}",
        registry.mimetypes().collect::<Vec<_>>().join(", ")
    );

    let pipeline = Arc::new(Pipeline::new(
        PipelineConfig::from_config(&config),
        db.clone(),
        db,
        tools,
        Arc::new(MemoryIndex::new()),
        registry,
    ));
    let manager = Manager::new(&config, pipeline).with_notifier(Arc::new(LogNotifier));
    manager.start()?;

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .map_err(|e| DocflowError::Signal(e.to_string()))?;

    let status = if cli.print_status > 0 {
        tick(Duration::from_secs(cli.print_status))
    } else {
        never()
    };

    loop {
        let stopping = select! {
            recv(stop_rx) -> _ => true,
            recv(status) -> _ => {
                log_status(&manager);
                false
            }
        };
        if stopping {
            break;
        }
    }

    info!("Shutting down...");
    manager.stop()?;
    Ok(())
}

fn log_status(manager: &Manager) {
    for status in manager.processing_status() {
        info!(
            "worker {}: {} queued {}/{}{}",
            status.id,
            if status.busy { "busy" } else { "idle" },
            status.queued,
            status.capacity,
            match (&status.current, status.elapsed_ms) {
                (Some(item), Some(ms)) => format!(", {} for {} ms", item, ms),
                _ => String::new(),
            }
        );
    }
}
