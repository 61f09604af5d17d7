use anyhow::{anyhow, bail, Context, Result};
use std::env;
use usage_service::{config::AppConfig, observability, store::PgStore, UtilityService};

/// Print the average daily usage per month of one meter and year as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: monthly_usage <meter_name> <year>");
    }
    let name = &args[1];
    let year: i32 = args[2]
        .parse()
        .with_context(|| format!("invalid year '{}'", args[2]))?;

    let cfg = AppConfig::load()?;
    let service = UtilityService::new(PgStore::connect(&cfg.database).await?);

    let meter = service
        .meter_by_name(name)
        .await?
        .ok_or_else(|| anyhow!("unknown meter '{name}'"))?;
    let profile = service.monthly_profile(meter.id, year).await?;

    println!("{}", serde_json::to_string(&profile)?);

    Ok(())
}
