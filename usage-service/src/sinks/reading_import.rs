use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use meter_client::domain::NewReading;

use crate::config::ImportConfig;
use crate::engine::UsageError;
use crate::pipeline::{Envelope, PipelineError, Sink};
use crate::service::UtilityService;
use crate::sources::ReadingRecord;
use crate::store::{Store, StoreError};

/// Writes imported readings through the service, one transaction per reading,
/// so every reading recalculates the usage around it.
///
/// Records that fail parsing or validation, name an unknown meter or collide
/// with an existing reading are logged and skipped. A fatal source error or
/// any other store failure stops the import with an error.
pub struct ReadingImportSink<S> {
    service: Arc<UtilityService<S>>,
    config: ImportConfig,
}

impl<S: Store> ReadingImportSink<S> {
    pub fn new(service: Arc<UtilityService<S>>, config: ImportConfig) -> Self {
        Self { service, config }
    }

    async fn meter_id(
        &self,
        name: &str,
        known: &mut HashMap<String, i64>,
    ) -> Result<Option<i64>, UsageError> {
        if let Some(id) = known.get(name) {
            return Ok(Some(*id));
        }

        let meter = match self.service.meter_by_name(name).await? {
            Some(meter) => meter,
            None if self.config.create_missing_meters => {
                self.service.add_meter(name, &self.config.default_unit).await?
            }
            None => return Ok(None),
        };

        known.insert(meter.name.clone(), meter.id);
        Ok(Some(meter.id))
    }

    async fn write(
        &self,
        env: Envelope<ReadingRecord>,
        known: &mut HashMap<String, i64>,
    ) -> Result<bool, PipelineError> {
        let record = env.payload;
        let meter_id = match self.meter_id(&record.meter, known).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::warn!(position = env.position, meter = %record.meter, "unknown meter, reading skipped");
                return Ok(false);
            }
            Err(e) => return Err(PipelineError::Sink(e.to_string())),
        };

        let reading = NewReading {
            meter_id,
            date: record.date,
            reading: record.reading,
            remark: record.remark,
        };

        match self.service.add_reading(reading).await {
            Ok(_) => Ok(true),
            Err(UsageError::Store(e @ StoreError::DuplicateReading { .. })) => {
                tracing::warn!(position = env.position, error = %e, "reading skipped");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(position = env.position, error = %e, "reading import failed, giving up");
                Err(PipelineError::Sink(e.to_string()))
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Store + 'static> Sink<ReadingRecord> for ReadingImportSink<S> {
    async fn run<I>(&self, mut input: I) -> Result<(), PipelineError>
    where
        I: futures::Stream<Item = Result<Envelope<ReadingRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut known = HashMap::new();
        let mut imported: u64 = 0;
        let mut rejected: u64 = 0;

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, imported, rejected, "reading import aborted");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rejected record in reading import");
                    rejected += 1;
                    continue;
                }
            };

            if self.write(env, &mut known).await? {
                imported += 1;
            } else {
                metrics::counter!("reading_import_rejected_total").increment(1);
                rejected += 1;
            }
        }

        tracing::info!(imported, rejected, "reading import finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, RecordStream, Source};
    use crate::sources::ReadingCsvFileSource;
    use crate::store::MemoryStore;
    use crate::transform::ReadingValidation;
    use std::io::Write;
    use rust_decimal::Decimal;
    use time::{macros::date, Date};

    fn envelope(position: u64, meter: &str, date: Date, value: i64) -> Envelope<ReadingRecord> {
        Envelope {
            payload: ReadingRecord {
                meter: meter.to_string(),
                date,
                reading: Decimal::from(value),
                remark: String::new(),
            },
            position,
        }
    }

    struct VecSource(Vec<Envelope<ReadingRecord>>);

    #[async_trait::async_trait]
    impl Source<ReadingRecord> for VecSource {
        async fn stream(&self) -> RecordStream<ReadingRecord> {
            Box::pin(futures::stream::iter(self.0.clone().into_iter().map(Ok)))
        }
    }

    #[tokio::test]
    async fn creates_missing_meters_when_configured() {
        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let sink = ReadingImportSink::new(
            service.clone(),
            ImportConfig {
                create_missing_meters: true,
                default_unit: "m3".to_string(),
            },
        );

        let input = futures::stream::iter(vec![
            Ok(envelope(1, "water", date!(2018 - 01 - 01), 0)),
            Ok(envelope(2, "water", date!(2018 - 02 - 01), 31)),
        ]);
        sink.run(input).await.unwrap();

        let meter = service.meter_by_name("water").await.unwrap().unwrap();
        assert_eq!(meter.unit, "m3");
        let usages = service.usages(meter.id).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].usage, Decimal::from(31));
    }

    #[tokio::test]
    async fn skips_unknown_meters_and_duplicates() {
        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let meter = service.add_meter("power", "kWh").await.unwrap();
        let sink = ReadingImportSink::new(service.clone(), ImportConfig::default());

        let input = futures::stream::iter(vec![
            Ok(envelope(1, "power", date!(2018 - 01 - 01), 0)),
            Ok(envelope(2, "gas", date!(2018 - 01 - 01), 5)),
            Ok(envelope(3, "power", date!(2018 - 01 - 01), 7)),
            Err(PipelineError::Record("record 4: bad line".to_string())),
            Ok(envelope(5, "power", date!(2018 - 02 - 01), 10)),
        ]);
        sink.run(input).await.unwrap();

        assert!(service.meter_by_name("gas").await.unwrap().is_none());
        let usages = service.usages(meter.id).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].usage, Decimal::from(10));
    }

    #[tokio::test]
    async fn pipeline_validates_before_writing() {
        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let meter = service.add_meter("power", "kWh").await.unwrap();

        let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
            source: VecSource(vec![
                envelope(1, "power", date!(2018 - 01 - 01), 0),
                envelope(2, "power", date!(1990 - 01 - 01), 0),
                envelope(3, "power", date!(2018 - 03 - 01), 59),
            ]),
            transforms: vec![Arc::new(ReadingValidation)],
            sink: ReadingImportSink::new(service.clone(), ImportConfig::default()),
        };
        pipeline.run().await.unwrap();

        let usages = service.usages(meter.id).await.unwrap();
        let months: Vec<(i32, i32, Decimal)> =
            usages.into_iter().map(|u| (u.year, u.month, u.usage)).collect();
        assert_eq!(
            months,
            vec![(2018, 1, Decimal::from(31)), (2018, 2, Decimal::from(28))]
        );
    }

    #[tokio::test]
    async fn unreadable_source_fails_the_import() {
        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let meter = service.add_meter("power", "kWh").await.unwrap();
        let sink = ReadingImportSink::new(service.clone(), ImportConfig::default());

        let input = futures::stream::iter(vec![
            Ok(envelope(1, "power", date!(2018 - 01 - 01), 0)),
            Err(PipelineError::Source("failed to read CSV headers".to_string())),
        ]);
        let res = sink.run(input).await;

        assert!(matches!(res, Err(PipelineError::Source(_))));
        // Rows before the failure stay imported, each in its own transaction.
        let again = service
            .add_reading(NewReading {
                meter_id: meter.id,
                date: date!(2018 - 01 - 01),
                reading: Decimal::ONE,
                remark: String::new(),
            })
            .await;
        assert!(matches!(
            again,
            Err(UsageError::Store(StoreError::DuplicateReading { .. }))
        ));
    }

    #[tokio::test]
    async fn csv_import_continues_past_malformed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "meter,date,reading\n\
             power,2018-01-01,0\n\
             power,01-02-2018,5\n\
             power,2018-02-01,10\n\
             power,2018-03-01,20\n"
        )
        .unwrap();
        file.flush().unwrap();

        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let meter = service.add_meter("power", "kWh").await.unwrap();
        let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
            source: ReadingCsvFileSource::new(file.path()),
            transforms: vec![Arc::new(ReadingValidation)],
            sink: ReadingImportSink::new(service.clone(), ImportConfig::default()),
        };
        pipeline.run().await.unwrap();

        let months: Vec<(i32, i32, Decimal)> = service
            .usages(meter.id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| (u.year, u.month, u.usage))
            .collect();
        assert_eq!(
            months,
            vec![(2018, 1, Decimal::from(10)), (2018, 2, Decimal::from(10))]
        );
    }

    #[tokio::test]
    async fn csv_import_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(UtilityService::new(MemoryStore::new()));
        let pipeline: Pipeline<_, ReadingRecord, _> = Pipeline {
            source: ReadingCsvFileSource::new(dir.path().join("readings.csv")),
            transforms: vec![Arc::new(ReadingValidation)],
            sink: ReadingImportSink::new(service, ImportConfig::default()),
        };

        assert!(matches!(
            pipeline.run().await,
            Err(PipelineError::Source(_))
        ));
    }
}
