use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use std::path::PathBuf;
use std::sync::Arc;

use ephemera::capture::{self, decode_data_url, discover_images};
use ephemera::config::Config;
use ephemera::gallery;
use ephemera::logging;
use ephemera::{Clock, Photo, PhotoLibrary, SystemClock};

enum Command {
    Capture(Vec<PathBuf>),
    List { day: Option<NaiveDate>, json: bool },
    Show(String),
    Export { id: String, output: PathBuf },
    Remove(String),
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut day = None;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("ephemera {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    fail("--config requires a path argument");
                }
            }
            "--day" | "-d" => {
                if i + 1 < args.len() {
                    match NaiveDate::parse_from_str(&args[i + 1], "%Y-%m-%d") {
                        Ok(date) => day = Some(date),
                        Err(_) => fail(&format!("invalid date '{}', expected YYYY-MM-DD", args[i + 1])),
                    }
                    i += 1;
                } else {
                    fail("--day requires a date argument");
                }
            }
            "--json" => json = true,
            arg if arg.starts_with('-') => fail(&format!("Unknown argument: {}", arg)),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("capture") => {
            let paths: Vec<PathBuf> = positional.map(PathBuf::from).collect();
            if paths.is_empty() {
                fail("capture requires at least one file or directory");
            }
            Command::Capture(paths)
        }
        Some("list") | None => Command::List { day, json },
        Some("show") => Command::Show(expect_id(positional.next())),
        Some("export") => {
            let id = expect_id(positional.next());
            match positional.next() {
                Some(output) => Command::Export {
                    id,
                    output: PathBuf::from(output),
                },
                None => fail("export requires an output path"),
            }
        }
        Some("remove") | Some("rm") => Command::Remove(expect_id(positional.next())),
        Some(other) => fail(&format!("Unknown command: {}", other)),
    };

    Args {
        config_path,
        command,
    }
}

fn expect_id(id: Option<String>) -> String {
    match id {
        Some(id) => id,
        None => fail("a photo id is required"),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"ephemera - photos that clean up after themselves

USAGE:
    ephemera [OPTIONS] [COMMAND]

COMMANDS:
    capture PATH...         Store images (files or directories)
    list [--day DATE]       Show the gallery, or one day (YYYY-MM-DD)
    show ID                 Show details for a photo
    export ID PATH          Write a photo's image to PATH
    remove ID               Delete a photo

OPTIONS:
    --json                  Print list output as JSON
    --config, -c PATH       Path to config file
    --version, -V           Show version
    --help, -h              Show this help message

ENVIRONMENT:
    EPHEMERA_CONFIG         Path to config file (overrides default location)
    EPHEMERA_LOG            Log level (trace, debug, info, warn, error)

Photos are deleted automatically once their retention window (2 days by
default) has passed; expired photos are purged whenever ephemera starts.

Config file location: $XDG_CONFIG_HOME/ephemera/config.toml"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let log_backend = logging::init(Some(Config::config_dir().join("logs"))).ok();

    // Load configuration
    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let library_config = config.library_config()?;
    if let Some(backend) = &log_backend {
        logging::log_session(backend, &library_config);
    }

    // Open the library; this also purges expired photos
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let library = PhotoLibrary::new(library_config, clock.clone());
    library
        .open()
        .await
        .context("Photo storage is unavailable")?;
    if let Some(sweep) = library.last_sweep().filter(|s| s.expired > 0) {
        println!("Purged {} expired photo(s)", sweep.deleted);
        for failure in &sweep.failures {
            eprintln!("Could not purge {}: {}", failure.id, failure.error);
        }
    }

    match args.command {
        Command::Capture(paths) => {
            let mut files = Vec::new();
            for path in paths {
                if path.is_dir() {
                    files.extend(discover_images(&path, &config.capture.image_extensions));
                } else {
                    files.push(path);
                }
            }

            let mut failed = 0;
            for file in files {
                let payload = match capture::encode_image_file(&file, &config.capture) {
                    Ok(payload) => payload,
                    Err(e) => {
                        eprintln!("{}: {:#}", file.display(), e);
                        failed += 1;
                        continue;
                    }
                };
                match library.capture(payload).await {
                    Ok(photo) => println!("{}  {}", photo.id, file.display()),
                    Err(e) => {
                        eprintln!("{}: {}", file.display(), e);
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{} image(s) could not be captured", failed);
            }
        }

        Command::List { day: Some(day), json } => {
            let photos = library.list_by_day(day).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&photos)?);
            } else {
                for photo in &photos {
                    print_row(photo, clock.now());
                }
            }
        }

        Command::List { day: None, json } => {
            if json {
                let photos = library.list_all().await?;
                println!("{}", serde_json::to_string_pretty(&photos)?);
            } else {
                let groups = library.gallery().await?;
                if groups.is_empty() {
                    println!("No photos yet. Capture one with `ephemera capture PATH`.");
                }
                for group in groups {
                    println!("{}", group.label());
                    for photo in &group.photos {
                        print_row(photo, clock.now());
                    }
                    println!();
                }
            }
        }

        Command::Show(id) => {
            let Some(photo) = library.get(&id).await? else {
                bail!("No photo with id {}", id);
            };
            let image = decode_data_url(&photo.image_data).ok();
            println!("id:        {}", photo.id);
            println!("captured:  {}", photo.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
            println!("expires:   {}", photo.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
            println!("remaining: {}", remaining(&photo, clock.now()));
            if let Some(image) = image {
                println!("format:    {}", image.mime_type);
                println!("size:      {} bytes", image.bytes.len());
            }
        }

        Command::Export { id, output } => {
            let Some(photo) = library.get(&id).await? else {
                bail!("No photo with id {}", id);
            };
            let image = decode_data_url(&photo.image_data)?;
            let output = if output.is_dir() {
                output.join(format!("{}.{}", photo.id, image.extension()))
            } else {
                output
            };
            std::fs::write(&output, &image.bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("{}", output.display());
        }

        Command::Remove(id) => {
            library.remove(&id).await?;
            println!("Removed {}", id);
        }
    }

    Ok(())
}

fn print_row(photo: &Photo, now: chrono::DateTime<chrono::Utc>) {
    println!(
        "  {}  {}  {}",
        gallery::time_caption(photo, &Local),
        photo.id,
        remaining(photo, now)
    );
}

fn remaining(photo: &Photo, now: chrono::DateTime<chrono::Utc>) -> String {
    match photo.time_remaining(now) {
        None => "expired".to_string(),
        Some(left) if left >= Duration::days(1) => {
            format!("{}d {}h left", left.num_days(), left.num_hours() % 24)
        }
        Some(left) if left >= Duration::hours(1) => {
            format!("{}h {}m left", left.num_hours(), left.num_minutes() % 60)
        }
        Some(left) => format!("{}m left", left.num_minutes().max(1)),
    }
}
