use prometheus::{Encoder, TextEncoder, Registry, HistogramVec, HistogramOpts, CounterVec, Opts};
use once_cell::sync::Lazy;
use std::net::TcpListener;
use tokio::task::JoinHandle;
use std::convert::Infallible;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, Method, StatusCode};
use hyper::service::service_fn;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("sourcesense".to_string()), None).expect("valid registry prefix")
});

static STAGE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new("stage_duration_ms", "Stage duration in milliseconds")
        .buckets(vec![10.0, 50.0, 250.0, 1_000.0, 5_000.0, 30_000.0, 120_000.0, 600_000.0]);
    let hist = HistogramVec::new(opts, &["stage"]).expect("valid histogram");
    REGISTRY.register(Box::new(hist.clone())).ok();
    hist
});

static WORKFLOW_RUNS: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("workflow_runs_total", "Finished workflow runs by outcome");
    let c = CounterVec::new(opts, &["outcome"]).expect("valid counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static WORKFLOW_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("workflow_failures_total", "Failed workflow runs by failing stage and error kind");
    let c = CounterVec::new(opts, &["stage", "kind"]).expect("valid counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RECORDS_FETCHED: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("records_fetched_total", "Records fetched from the source API");
    let c = CounterVec::new(opts, &["typename"]).expect("valid counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static NORMALIZATION_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("normalization_failures_total", "Records skipped because they could not be normalized");
    let c = CounterVec::new(opts, &["typename"]).expect("valid counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Observe a stage duration in milliseconds.
pub fn observe_stage_duration(stage: &str, duration_ms: f64) {
    STAGE_DURATION_MS.with_label_values(&[stage]).observe(duration_ms);
}

/// Count a finished run (`completed`, `no_records`, `no_entities` or `failed`).
pub fn inc_run(outcome: &str) {
    WORKFLOW_RUNS.with_label_values(&[outcome]).inc();
}

pub fn inc_failure(stage: &str, kind: &str) {
    WORKFLOW_FAILURES.with_label_values(&[stage, kind]).inc();
}

pub fn add_records_fetched(typename: &str, count: usize) {
    RECORDS_FETCHED.with_label_values(&[typename]).inc_by(count as f64);
}

pub fn add_normalization_failures(typename: &str, count: usize) {
    NORMALIZATION_FAILURES.with_label_values(&[typename]).inc_by(count as f64);
}

/// Gather metrics as text in Prometheus exposition format.
///
/// # Example
///
/// ```no_run
/// use sourcesense_core::metrics;
/// metrics::inc_run("completed");
/// let body = metrics::gather_text();
/// println!("metrics:\n{}", body);
/// ```
pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

async fn serve(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut response = Response::new(Body::from(gather_text()));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            response
        }
        _ => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    };
    Ok(response)
}

/// Start an HTTP exporter task that serves `/metrics` until `shutdown` resolves.
///
/// Must be called from within a Tokio runtime; the server runs as a task on it.
///
/// ```no_run
/// # async fn demo() {
/// use std::net::TcpListener;
/// use sourcesense_core::metrics;
///
/// let listener = TcpListener::bind("127.0.0.1:0").unwrap();
/// let shutdown = async { let _ = tokio::signal::ctrl_c().await; };
/// let _handle = metrics::start_exporter_with_shutdown(listener, shutdown);
/// # }
/// ```
pub fn start_exporter_with_shutdown<F>(listener: TcpListener, shutdown: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = listener.set_nonblocking(true) {
            tracing::error!(error = ?e, "failed to set listener to non-blocking");
            return;
        }
        let tcp_listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = ?e, "failed to convert listener to tokio listener");
                return;
            }
        };

        let mut shutdown_fut = Box::pin(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown_fut => {
                    tracing::info!("metrics exporter shutdown requested");
                    break;
                }
                accept = tcp_listener.accept() => {
                    match accept {
                        Ok((stream, _peer)) => {
                            tokio::spawn(async move {
                                if let Err(err) = hyper::server::conn::Http::new()
                                    .serve_connection(stream, service_fn(serve))
                                    .await
                                {
                                    tracing::error!(error = ?err, "connection serve error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = ?e, "failed to accept connection on metrics listener");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("metrics exporter stopped");
    })
}

/// Start the exporter and return a oneshot sender that stops it.
pub fn start_exporter(listener: TcpListener) -> (JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = start_exporter_with_shutdown(listener, async move { let _ = rx.await; });
    (handle, tx)
}
