use spritesheet_exporter::cli::Args;
use spritesheet_exporter::config::{self, ExportSettings, PathConfig};
use spritesheet_exporter::core::{ExportOutcome, ExportProgress, Exporter};
use spritesheet_exporter::entities::ExportJob;
use spritesheet_exporter::host::SceneDocument;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::mpsc;

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging: at least debug
        let log_level = log_level.max(log::LevelFilter::Debug);
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Preset file, then command line on top.
fn load_settings(args: &Args, path_config: &PathConfig) -> Result<ExportSettings> {
    let mut settings = match &args.preset {
        Some(path) => ExportSettings::load(path)?,
        None => ExportSettings::load_or_default(&config::config_file(config::SETTINGS_FILE, path_config))?,
    };
    args.apply(&mut settings);

    if args.save_preset {
        config::ensure_dirs(path_config)?;
        let path = config::config_file(config::SETTINGS_FILE, path_config);
        settings.save(&path)?;
        info!("Saved preset to {}", path.display());
    }
    Ok(settings)
}

fn open_document(args: &Args) -> Result<SceneDocument> {
    match (&args.scene, &args.sequence) {
        (Some(scene), _) => SceneDocument::from_manifest_file(scene)
            .with_context(|| format!("Failed to open scene {}", scene.display())),
        (None, Some(pattern)) => SceneDocument::from_sequence(pattern)
            .with_context(|| format!("Failed to open sequence {}", pattern)),
        (None, None) => bail!("Nothing to export: pass a SCENE manifest or --sequence GLOB"),
    }
}

fn run_export(doc: &mut SceneDocument, job: &ExportJob) -> Result<ExportOutcome> {
    let (tx, rx) = mpsc::channel::<ExportProgress>();
    let listener = std::thread::spawn(move || {
        for p in rx {
            if p.total > 0 {
                debug!("{}: {}/{}", p.stage, p.current, p.total);
            } else {
                debug!("{}", p.stage);
            }
        }
    });

    let exporter = Exporter::new().with_progress(tx);
    let result = exporter.export(doc, job);
    // Closes the channel
    drop(exporter);
    if listener.join().is_err() {
        warn!("Progress listener panicked");
    }

    result.with_context(|| format!("Export of '{}' failed", job.export_name))
}

fn run() -> Result<()> {
    let args = Args::parse();
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let settings = load_settings(&args, &path_config)?;
    let job = settings.to_job();
    debug!("Job: {:?}", job);

    let mut doc = open_document(&args)?;
    let outcome = run_export(&mut doc, &job)?;

    if outcome.dropped > 0 {
        warn!("{} frame(s) did not fit the grid and were dropped", outcome.dropped);
    }
    if let Some(atlas) = &outcome.atlas_path {
        info!("Texture atlas: {}", atlas.display());
    }
    println!("{}", outcome.sheet_path.display());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
