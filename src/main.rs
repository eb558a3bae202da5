use chainscan::{
    cli::{Cli, FallbackMode},
    config::Config,
    display::DisplayManager,
    events::{self, EngineEvent},
    fallback::NoopFallback,
    modules::ModuleRegistry,
    reporting::{ExportDocument, ReportGenerator},
    utils::{network, progress, time},
    Engine, Result,
};
use clap::Parser;
use env_logger::Env;
use log::warn;
use std::net::IpAddr;
use std::process;
use std::time::SystemTime;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    if !cli.quiet {
        display.print_banner(
            "CHAINSCAN - Reconnaissance Propagation Engine",
            Some("Authorized Testing Only"),
        );
        display.print_warning("Ensure you have proper permission before scanning any networks.");
        println!();
    }

    let mut config = if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                config
            }
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    cli.apply_overrides(&mut config);

    let start_time = SystemTime::now();

    match run(&cli, config, &display).await {
        Ok(()) => {
            display.print_success(&format!(
                "Propagation completed in {}",
                time::format_duration(time::elapsed_since(start_time))
            ));
        }
        Err(e) => {
            display.print_error(&format!("Propagation failed: {}", e));
            process::exit(1);
        }
    }
}

async fn run(cli: &Cli, config: Config, display: &DisplayManager) -> Result<()> {
    let reporting = config.reporting.clone();

    // Protocol modules are supplied by embedding applications; the binary runs on the fallback.
    let mut engine = Engine::new(config, ModuleRegistry::new())?;
    if cli.fallback == FallbackMode::Noop {
        engine.set_fallback(Box::new(NoopFallback));
    }

    let spinner = (!display.is_quiet()).then(|| progress::create_spinner("Propagating..."));
    let sink = engine.subscribe().map(|receiver| {
        let printer = DisplayManager::with_quiet(cli.quiet);
        let spinner = spinner.clone();
        events::spawn_callback_sink(receiver, move |event| match (&spinner, event) {
            (Some(spinner), EngineEvent::ProgressUpdate { snapshot }) => spinner.set_message(format!(
                "{} nodes, {} pending, {} scans",
                snapshot.total_nodes, snapshot.pending, snapshot.statistics.total_scans
            )),
            (Some(spinner), event) => spinner.suspend(|| printer.print_event(event)),
            (None, event) => printer.print_event(event),
        })
    });

    let stop = engine.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            stop.stop();
        }
    });

    let mut accepted = 0;
    for target in &cli.targets {
        if let Ok(ip) = target.trim().parse::<IpAddr>() {
            if !network::is_valid_scan_target(&ip) {
                display.print_warning(&format!("Skipping {}: not a scannable address", ip));
                continue;
            }
        }
        match engine.add_target(target) {
            Ok(_) => accepted += 1,
            Err(e) => display.print_warning(&format!("Skipping target: {}", e)),
        }
    }
    if accepted == 0 {
        return Err(chainscan::ScanError::InvalidTarget("no usable targets supplied".to_string()));
    }

    let snapshot = engine.run().await;

    let generator = ReportGenerator::new(reporting);
    let files = generator.generate_report(&engine).await?;
    let summary = ExportDocument::capture(&engine).summary();

    // Closing the engine closes the event channel and lets the sink drain.
    drop(engine);
    if let Some(sink) = sink {
        let _ = sink.await;
    }
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    display.print_summary(&snapshot, &summary);
    for file in files {
        display.print_info(&format!("Report: {}", file.display()));
    }
    Ok(())
}
