use std::path::PathBuf;

use ramp_engine::command::execute_json_batch;
use ramp_engine::harness::TestHarness;
use ramp_engine::persistence::HttpStore;
use ramp_engine::{EngineConfig, ViewState};

struct Args {
    server: String,
    script: Option<PathBuf>,
    config: Option<PathBuf>,
    view: Option<PathBuf>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        server: "http://localhost:3001".to_string(),
        script: None,
        config: None,
        view: None,
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" if i + 1 < args.len() => {
                parsed.server = args[i + 1].clone();
                i += 1;
            }
            "--script" if i + 1 < args.len() => {
                parsed.script = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--config" if i + 1 < args.len() => {
                parsed.config = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--view" if i + 1 < args.len() => {
                parsed.view = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            other => tracing::warn!("Ignoring argument {other}"),
        }
        i += 1;
    }
    parsed
}

fn load_config(path: Option<&PathBuf>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::load_from(path).unwrap_or_else(|e| {
            tracing::error!("Failed to load config from {}: {e}", path.display());
            EngineConfig::default()
        }),
        None => EngineConfig::load(),
    }
}

/// Saved view, if one exists; the engine's own default otherwise
fn load_view(path: Option<&PathBuf>) -> Option<ViewState> {
    let path = path.cloned().or_else(ViewState::default_path)?;
    if !path.exists() {
        return None;
    }
    ViewState::load(&path)
        .inspect_err(|e| tracing::warn!("Ignoring view at {}: {e}", path.display()))
        .ok()
}

fn save_view(path: Option<&PathBuf>, view: &ViewState) {
    let Some(path) = path.cloned().or_else(ViewState::default_path) else {
        return;
    };
    if let Err(e) = view.save(&path) {
        tracing::warn!("Failed to save view to {}: {e}", path.display());
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ramp_engine=info".into()),
        )
        .init();

    let args = parse_args();
    let config = load_config(args.config.as_ref());

    // Commands come from --script, or stdin when no script is given
    let script = match &args.script {
        Some(path) => std::fs::read_to_string(path),
        None => std::io::read_to_string(std::io::stdin()),
    };
    let script = match script {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to read commands: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Connecting to {}", args.server);
    let mut harness = TestHarness::with_store(HttpStore::new(&args.server), config);
    if let Some(view) = load_view(args.view.as_ref()) {
        harness.engine_mut().apply_view(&view);
    }
    if let Err(e) = harness.refresh() {
        tracing::error!("Initial fetch failed: {e}");
        std::process::exit(1);
    }

    let code = match execute_json_batch(&mut harness, &script) {
        Ok(responses) => {
            let failed = responses.iter().filter(|r| !r.success).count();
            match serde_json::to_string_pretty(&responses) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!("Failed to encode responses: {e}"),
            }
            if failed > 0 {
                tracing::warn!("{failed} command(s) failed");
            }
            i32::from(failed > 0)
        }
        Err(e) => {
            tracing::error!("{e}");
            2
        }
    };

    save_view(args.view.as_ref(), &harness.engine().view());
    let report = harness.teardown();
    tracing::info!(written = report.written, failed = report.failed, "Done");
    std::process::exit(code);
}
