//! Holocache - keep an offline copy of the Star Wars API and browse it.
//!
//! Usage:
//!   holocache [sync]        sync the dataset unless a previous sync completed
//!   holocache status        show what the cache holds
//!   holocache people        list every cached person
//!   holocache person <uid> [--json]
//!                           show one person with their relations
//!   holocache clear         wipe the cache

use std::io;
use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use holocache_core::utils::truncate_string;
use holocache_core::{Config, Holocache, ProgressEvent};

/// Log file written inside the cache directory
const LOG_FILE: &str = "holocache.log";

/// Width of the name column in `people`
const NAME_WIDTH: usize = 24;

const USAGE: &str = "usage: holocache [sync | status | people | person <uid> [--json] | clear]";

enum Command {
    Sync,
    Status,
    People,
    Person { uid: String, json: bool },
    Clear,
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let command = match args.first().map(String::as_str) {
            None | Some("sync") => Command::Sync,
            Some("status") => Command::Status,
            Some("people") => Command::People,
            Some("person") => match args.get(1) {
                Some(uid) => Command::Person {
                    uid: uid.clone(),
                    json: args.iter().skip(2).any(|a| a == "--json"),
                },
                None => bail!("missing person uid\n{}", USAGE),
            },
            Some("clear") => Command::Clear,
            Some("-h") | Some("--help") | Some("help") => Command::Help,
            Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        };
        Ok(command)
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Stderr gets what `RUST_LOG` allows (default `warn`); the log file in the
/// cache directory gets the same events without ANSI colors. The returned
/// guard must live until exit so buffered lines are flushed.
fn init_tracing(cache_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(cache_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::never(cache_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(e) => {
            eprintln!("Warning: could not create {}: {}", cache_dir.display(), e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    if let Command::Help = command {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let _guard = init_tracing(&config.cache_dir()?);
    info!("holocache starting");

    let app = Holocache::open(&config)?;

    match command {
        Command::Sync => sync(&app).await?,
        Command::Status => status(&app)?,
        Command::People => people(&app)?,
        Command::Person { uid, json } => person(&app, &uid, json)?,
        Command::Clear => {
            app.clear_all().await?;
            println!("Cache cleared");
        }
        Command::Help => {}
    }

    Ok(())
}

async fn sync(app: &Holocache) -> Result<()> {
    app.subscribe(|event| {
        print_progress(event);
        Ok(())
    });

    match app.ensure_ready().await {
        Ok(report) if report.from_cache => {
            println!("Dataset already cached");
        }
        Ok(report) => {
            println!(
                "Synced {} records in {}s ({} batch retries)",
                report.total_records(),
                report.elapsed.as_secs(),
                report.failed_batches
            );
        }
        Err(e) => bail!("sync failed: {}", e),
    }
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    match event.progress() {
        Some(pct) => eprintln!("[{:>3}%] {}", pct, event.message()),
        None => eprintln!("       {}", event.message()),
    }
}

fn status(app: &Holocache) -> Result<()> {
    let status = app.status()?;
    if status.complete {
        println!("Sync complete ({})", status.age_display());
    } else {
        println!("Sync not complete");
    }
    for (entity, count) in &status.counts {
        println!("  {:<10} {:>5}", entity.as_str(), count);
    }
    println!("  {:<10} {:>5}", "total", status.total_records());
    Ok(())
}

fn people(app: &Holocache) -> Result<()> {
    let people = app.all_people()?;
    if people.is_empty() {
        println!("No people cached yet. Run `holocache sync` first.");
        return Ok(());
    }
    for person in people {
        println!(
            "{:>4}  {:<width$}  {:<8}  {}",
            person.uid,
            truncate_string(&person.name, NAME_WIDTH),
            person.birth_year.as_deref().unwrap_or("-"),
            person.gender.as_deref().unwrap_or("-"),
            width = NAME_WIDTH
        );
    }
    Ok(())
}

fn person(app: &Holocache, uid: &str, json: bool) -> Result<()> {
    let Some(detail) = app.person_with_relations(uid)? else {
        bail!("no person with uid {}", uid);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let rel = &detail.relations;
    println!("{} ({})", detail.person.name, detail.person.uid);
    for (label, value) in detail.person.attributes() {
        println!("  {:<12} {}", label, value);
    }
    if let Some(planet) = &rel.homeworld {
        println!("  {:<12} {}", "Homeworld", planet.name);
    }
    print_names("Species", rel.species.iter().map(|s| s.name.as_str()));
    print_names("Starships", rel.starships.iter().map(|s| s.name.as_str()));
    print_names("Vehicles", rel.vehicles.iter().map(|v| v.name.as_str()));
    print_names("Films", rel.films.iter().map(|f| f.name.as_str()));
    Ok(())
}

fn print_names<'a>(label: &str, names: impl Iterator<Item = &'a str>) {
    let names: Vec<&str> = names.collect();
    if !names.is_empty() {
        println!("  {:<12} {}", label, names.join(", "));
    }
}
