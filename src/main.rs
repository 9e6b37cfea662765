use anyhow::Result;
use chrono::Utc;
use influxprep::{config::Config, process};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) one clock reading for the whole run ──────────────────────
    let run_start = Utc::now();
    info!(%run_start, "startup");

    // ─── 3) configure & transform ────────────────────────────────────
    let outcome = Config::from_env().and_then(|cfg| {
        info!(
            input = %cfg.input_path.display(),
            output = %cfg.output_dir.display(),
            chunk_size = cfg.chunk_size,
            policy = cfg.row_policy.as_str(),
            "configured"
        );
        process::transform_file(&cfg, run_start)
    });

    if let Err(e) = outcome {
        error!("Error occurred: {:#}", e);
        return Err(e);
    }
    Ok(())
}
