use crate::constants::HEADER_CORRELATION_ID;
use crate::ingress::header_lossy;
use crate::redaction_layer::{redact, RedactingWriter};
use crate::Args;
use axum::{
    body::Body,
    http::{HeaderValue, Request, Response},
    middleware::Next,
};
use std::panic;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-gateway-request-id";
pub const DEFAULT_LOG_FILTER: &str = "neura_gateway=info,tower_http=warn";
pub const LOG_FILE_NAME: &str = "neura-gateway.log";

/// Installs the global subscriber: env filter, stderr output (plain or JSON),
/// an optional redacted daily log file and the span-trace error layer.
///
/// The returned guard must be held for the life of the process or buffered
/// file output is lost.
pub fn init_tracing(args: &Args) -> Option<WorkerGuard> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => DEFAULT_LOG_FILTER.into(),
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Cannot create log directory {}: {}", dir.display(), e);
                (None, None)
            } else {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
                let (writer, guard) =
                    tracing_appender::non_blocking(RedactingWriter::new(appender));
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
        }
        None => (None, None),
    };

    let json_layer = args.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let plain_layer = (!args.log_json).then(|| {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    guard
}

/// Text carried by a panic payload, if it is a string.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Routes panics through tracing (redacted, with the thread name) before the
/// default hook prints them.
pub fn setup_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        error!(
            target: "panic",
            thread = thread.name().unwrap_or("<unnamed>"),
            location = %location,
            backtrace = %std::backtrace::Backtrace::capture(),
            "Gateway panicked: {}",
            redact(panic_message(info.payload()))
        );

        default_hook(info);
    }));
}

/// Opens a `request` span carrying a fresh request id and the caller's
/// correlation id, and logs the outcome once the handler returns. The request
/// id is also returned to the caller.
pub async fn request_span_middleware(mut req: Request<Body>, next: Next) -> Response<Body> {
    let request_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(val) = &header_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, val.clone());
    }

    let correlation_id = crate::str_utils::prefix_chars(
        &header_lossy(req.headers(), HEADER_CORRELATION_ID),
        64,
    )
    .to_string();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        correlation_id = %correlation_id,
    );

    let started = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| {
        if response.status().is_server_error() {
            warn!(%method, %path, status, latency_ms, "Request completed");
        } else {
            info!(%method, %path, status, latency_ms, "Request completed");
        }
    });

    if let Some(val) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}
