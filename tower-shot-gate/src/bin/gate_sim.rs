use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use shot_gate::Activation;
use shot_gate::AdmissionService;
use shot_gate::EnvSource;
use shot_gate::MapSource;
use shot_gate::PropertySources;
use shot_gate::YamlSource;
use tokio::sync::Barrier;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tower::BoxError;
use tower::Layer;
use tower::ServiceExt;
use tower::service_fn;
use tower_shot_gate::GateError;
use tower_shot_gate::PartialActivationLayer;
use tracing_subscriber::EnvFilter;

/// Drive concurrent calls through a partial activation gate and report how
/// many were admitted.
#[derive(Debug, Parser)]
#[command(name = "gate-sim")]
struct Args {
    /// Threshold to apply, e.g. `10` or `25%`.
    #[arg(short, long, default_value = "25%")]
    threshold: String,

    /// Configuration property holding the threshold.
    #[arg(short, long, default_value = "features.simulated")]
    name: String,

    /// YAML file searched before the command line threshold.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Total number of calls.
    #[arg(long, default_value_t = 10_000)]
    calls: usize,

    /// Number of distinct keys the calls are spread over.
    #[arg(long, default_value_t = 1)]
    keys: usize,
}

async fn mock_work(_req: usize) -> Result<&'static str, BoxError> {
    sleep(Duration::from_micros(50)).await;
    Ok("done")
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let keys = args.keys.max(1);

    let mut sources = PropertySources::new().with_source(EnvSource::with_prefix("SHOT_GATE_"));
    if let Some(path) = &args.config {
        sources = sources.with_source(YamlSource::from_path(path)?);
    }
    let sources =
        sources.with_source(MapSource::new("command-line").with(&args.name, &args.threshold));

    let gate: Arc<AdmissionService<usize>> = Arc::new(AdmissionService::new(Arc::new(sources)));
    let layer = PartialActivationLayer::new(gate, Activation::new(&args.name), move |req: &usize| {
        req % keys
    });
    let svc = layer.layer(service_fn(mock_work));

    let barrier = Arc::new(Barrier::new(args.calls));
    let mut tasks = JoinSet::new();
    let start = Instant::now();

    for req in 0..args.calls {
        let svc = svc.clone();
        let bar = barrier.clone();
        tasks.spawn(async move {
            bar.wait().await;
            svc.oneshot(req).await
        });
    }

    let mut admitted = 0;
    let mut refused = 0;
    let mut failed = 0;
    while let Some(task) = tasks.join_next().await {
        match task? {
            Ok(_) => admitted += 1,
            Err(e) if e.is::<GateError>() => refused += 1,
            Err(e) => {
                tracing::warn!(error = %e, "call failed");
                failed += 1;
            }
        }
    }

    println!("--- {} = {} ---", args.name, args.threshold);
    println!("Total Duration:  {:.2?}", start.elapsed());
    println!("Keys:            {}", keys);
    println!("Admitted/Total:  {}/{}", admitted, args.calls);
    println!("Refused:         {}", refused);
    if failed > 0 {
        println!("Failed:          {}", failed);
    }

    Ok(())
}
