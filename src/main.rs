use std::{process, sync::Arc};

use psdtext::{
    application::{
        error::AppError,
        local::{LocalRunError, LocalRunOptions, run_local},
        service::PsdTextService,
    },
    config,
    infra::{
        documents::DocumentDirectory,
        editor::{EditorBridge, ScriptEditor},
        error::InfraError,
        http::{self, AppState},
        storage::{ObjectStore, OssBucket},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (command, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Process(args) => run_process(settings, args).await,
    }
}

fn build_editor(settings: &config::Settings) -> Arc<dyn EditorBridge> {
    Arc::new(ScriptEditor::new(
        settings.editor.command.clone(),
        settings.editor.args.clone(),
    ))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let storage_settings = settings.storage.as_ref().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "object storage is not configured; set OSS_ENDPOINT, OSS_BUCKET_NAME, \
             OSS_ACCESS_KEY_ID and OSS_ACCESS_KEY_SECRET",
        ))
    })?;
    let bucket = OssBucket::from_settings(storage_settings)
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let storage: Arc<dyn ObjectStore> = Arc::new(bucket);

    let service = PsdTextService::new(
        DocumentDirectory::new(settings.documents.directory.clone()),
        build_editor(&settings),
        storage,
        storage_settings.key_prefix.clone(),
    );
    let state = AppState {
        service: Arc::new(service),
    };

    let body_limit = usize::try_from(settings.server.max_request_bytes.get())
        .map_err(|_| AppError::unexpected("request limit exceeds usize"))?;
    let router = http::build_router(state, body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "psdtext::serve",
        addr = %settings.server.addr,
        documents = %settings.documents.directory.display(),
        editor = %settings.editor.command.display(),
        bucket = %storage_settings.bucket,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "psdtext::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "psdtext::serve",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}

async fn run_process(
    settings: config::Settings,
    args: config::ProcessArgs,
) -> Result<(), AppError> {
    let options = LocalRunOptions {
        document: args.document,
        updates: args.updates,
        output: args.output,
        keep_output: args.keep_output,
    };
    let run = run_local(build_editor(&settings), &options)
        .await
        .map_err(|err| match err {
            LocalRunError::InvalidUpdates { .. } => AppError::validation(err.to_string()),
            other => AppError::unexpected(other.to_string()),
        })?;

    let rendered = serde_json::to_string_pretty(&run.report)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{rendered}");

    run.ensure_updated()
        .map_err(|err| AppError::validation(err.to_string()))
}
