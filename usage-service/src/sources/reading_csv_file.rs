use std::{fs::File, path::PathBuf, str::FromStr};

use csv::StringRecord;
use rust_decimal::Decimal;
use time::{macros::format_description, Date};

use crate::pipeline::{Envelope, PipelineError, RecordStream, Source};
use crate::sources::ReadingRecord;

/// CSV source of meter readings.
///
/// Expected header columns (by name):
/// - meter (meter name)
/// - date (YYYY-MM-DD)
/// - reading (decimal)
/// - remark (optional)
pub struct ReadingCsvFileSource {
    path: PathBuf,
}

impl ReadingCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
    position: u64,
) -> Result<ReadingRecord, PipelineError> {
    let get = |name: &str| -> Result<&str, PipelineError> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
            .ok_or_else(|| PipelineError::Record(format!("record {position}: missing column '{name}'")))
    };

    let meter = get("meter")?.trim().to_string();

    let date_str = get("date")?;
    let date = Date::parse(date_str.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| PipelineError::Record(format!("record {position}: invalid date '{date_str}': {e}")))?;

    let reading_str = get("reading")?;
    let reading = Decimal::from_str(reading_str.trim())
        .map_err(|e| PipelineError::Record(format!("record {position}: invalid reading '{reading_str}': {e}")))?;

    let remark = get("remark").map(|s| s.trim().to_string()).unwrap_or_default();

    Ok(ReadingRecord {
        meter,
        date,
        reading,
        remark,
    })
}

#[async_trait::async_trait]
impl Source<ReadingRecord> for ReadingCsvFileSource {
    /// An unreadable file or header ends the stream with a `Source` error.
    /// A malformed row yields a `Record` error and reading continues with
    /// the next row.
    async fn stream(&self) -> RecordStream<ReadingRecord> {
        // Blocking CSV reader inside a single async task; reading files are small.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open CSV file {}: {e}",
                        path.display()
                    )));
                    return;
                }
            };
            let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);
            let headers = match rdr.headers() {
                Ok(headers) => headers.clone(),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            let mut position: u64 = 0;
            for result in rdr.records() {
                position += 1;
                let parsed = result
                    .map_err(|e| PipelineError::Record(format!("record {position}: {e}")))
                    .and_then(|record| record_to_reading(&record, &headers, position));

                match parsed {
                    Ok(reading) => {
                        yield Ok(Envelope {
                            payload: reading,
                            position,
                        });
                    }
                    Err(e) => {
                        metrics::counter!("reading_csv_parse_errors_total").increment(1);
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}
