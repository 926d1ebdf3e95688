use std::process::ExitCode;

use adaptive_tutor::config::Config;
use adaptive_tutor::logging;
use adaptive_tutor::services::simulation::{load_script, run_script, Script};
use adaptive_tutor::services::TutorService;
use adaptive_tutor::store::{InMemoryStudentStore, JsonFileStudentStore, StudentStateRepository};

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = logging::init_tracing(&config.logging);

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: adaptive-tutor <script.json>");
        return ExitCode::from(2);
    };

    let script = match load_script(&path) {
        Ok(script) => script,
        Err(err) => {
            tracing::error!(error = %err, "failed to load script");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%path, students = script.students.len(), "running script");

    match config.store_dir.clone() {
        Some(dir) => match JsonFileStudentStore::open(&dir) {
            Ok(store) => {
                tracing::info!(dir = %dir.display(), "using file store");
                run(config, store, &script)
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to open store");
                ExitCode::FAILURE
            }
        },
        None => run(config, InMemoryStudentStore::new(), &script),
    }
}

fn run<R: StudentStateRepository>(config: Config, store: R, script: &Script) -> ExitCode {
    let service = match TutorService::new(store, config.adaptive, config.ranker) {
        Ok(service) => service,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let report = match run_script(script, &service) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "script failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to render report");
            ExitCode::FAILURE
        }
    }
}
