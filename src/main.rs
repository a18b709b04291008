use std::{io::Write, path::Path, process, sync::Arc};

use bytes::Bytes;
use htmlprint::{
    application::{
        convert::ConversionService,
        error::AppError,
        sanitize::sanitizer_for,
    },
    config,
    domain::document::RawInput,
    infra::{
        browser::ChromiumRenderer,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
    }
}

fn build_conversion_service(settings: &config::Settings) -> ConversionService {
    let renderer = ChromiumRenderer::new(settings.browser.clone(), settings.render.clone());
    ConversionService::new(sanitizer_for(settings.sanitizer.mode), Arc::new(renderer))
        .with_session_limit(settings.render.max_concurrent_sessions)
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let Some(addr) = settings.server.local_listener() else {
        warn!(
            target = "htmlprint::serve",
            "production mode: local listener disabled; mount `build_router` from the hosting runtime"
        );
        return Err(AppError::from(InfraError::configuration(
            "local listener is disabled in production mode",
        )));
    };

    let state = HttpState::new(&settings, build_conversion_service(&settings));
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "htmlprint::serve",
        addr = %addr,
        upload_limit_bytes = settings.uploads.max_request_bytes.get(),
        sanitizer = ?settings.sanitizer.mode,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "htmlprint::serve", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "htmlprint::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "htmlprint::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target = "htmlprint::serve", "shutdown signal received");
}

async fn run_convert(settings: config::Settings, args: config::ConvertArgs) -> Result<(), AppError> {
    let output = args.output_path();
    if output == args.input {
        return Err(AppError::validation(format!(
            "output path `{}` would overwrite the input",
            output.display()
        )));
    }
    let bytes = tokio::fs::read(&args.input)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let file_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned);

    let request_id = Uuid::new_v4().to_string();
    info!(
        target = "htmlprint::convert_cli",
        request_id = %request_id,
        input = %args.input.display(),
        output = %output.display(),
        "converting local file"
    );

    let rendered = build_conversion_service(&settings)
        .convert(
            &request_id,
            RawInput::Upload {
                file_name,
                bytes: Bytes::from(bytes),
            },
        )
        .await?;

    write_atomically(&output, rendered.pdf.as_bytes())?;
    info!(
        target = "htmlprint::convert_cli",
        request_id = %request_id,
        pdf_bytes = rendered.pdf.len(),
        content_height_px = rendered.content_height.px(),
        "pdf written"
    );
    Ok(())
}

/// Write via a sibling temp file so a failed run never leaves a partial PDF.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|err| AppError::from(InfraError::from(err)))?;

    let mut file =
        tempfile::NamedTempFile::new_in(dir).map_err(|err| AppError::from(InfraError::from(err)))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    file.persist(path)
        .map_err(|err| AppError::from(InfraError::from(err.error)))?;
    Ok(())
}
