use anyhow::{bail, Result};
use std::{env, sync::Arc};
use usage_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::ReadingImportSink,
    sources::{ReadingCsvFileSource, ReadingRecord},
    store::PgStore,
    transform,
    UtilityService,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: import_readings <csv_file_path>");
    }
    let file_path = &args[1];

    // Load configuration (UTILITY_CONFIG may point to an import-specific file).
    let cfg = AppConfig::load()?;

    let store = PgStore::connect(&cfg.database).await?;
    let service = Arc::new(UtilityService::new(store));

    let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
        source: ReadingCsvFileSource::new(file_path),
        transforms: vec![Arc::new(transform::ReadingValidation::default())],
        sink: ReadingImportSink::new(service, cfg.import.clone()),
    };

    pipeline.run().await?;

    Ok(())
}
