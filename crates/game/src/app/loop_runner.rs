use std::process::ExitCode;

use bubble_engine::run_app;
use tracing::error;

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        initial,
        session,
    } = app;
    let setup = move |engine: &mut bubble_engine::Engine| {
        engine.services_mut().resources.insert(session);
    };
    if let Err(err) = run_app(config, initial, setup) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
