use anyhow::{anyhow, bail, Result};
use std::env;
use usage_service::{config::AppConfig, observability, store::PgStore, UtilityService};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: rebuild_usage <meter_name>...");
    }

    let cfg = AppConfig::load()?;
    let service = UtilityService::new(PgStore::connect(&cfg.database).await?);

    for name in &args[1..] {
        let meter = service
            .meter_by_name(name)
            .await?
            .ok_or_else(|| anyhow!("unknown meter '{name}'"))?;

        match service.rebuild_usage(meter.id).await? {
            Some(run) => tracing::info!(
                meter = %meter.name,
                from = %run.from,
                to = %run.to,
                deleted = run.deleted,
                written = run.written,
                "usage rebuilt"
            ),
            None => tracing::info!(meter = %meter.name, "meter has no readings, nothing to rebuild"),
        }
    }

    Ok(())
}
