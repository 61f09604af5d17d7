use meter_client::domain::{Meter, Reading};
use time::macros::date;

use crate::pipeline::{Envelope, PipelineError, Transform};
use crate::sources::ReadingRecord;

/// Pure validation of an imported reading.
///
/// Rules:
/// - the meter name is non-empty and fits the meter name column.
/// - the reading fits the reading column (8 integer digits, 2 decimal places).
/// - the remark fits the remark column.
/// - the date lies within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_reading(env: Envelope<ReadingRecord>) -> Result<Envelope<ReadingRecord>, PipelineError> {
    let r = &env.payload;

    if r.meter.trim().is_empty() {
        return Err(PipelineError::Transform(format!(
            "record {}: meter name is empty",
            env.position
        )));
    }
    if r.meter.chars().count() > Meter::MAX_NAME_LEN {
        return Err(PipelineError::Transform(format!(
            "record {}: meter name '{}' is longer than {} characters",
            env.position,
            r.meter,
            Meter::MAX_NAME_LEN
        )));
    }
    if !Reading::fits_column(r.reading) {
        return Err(PipelineError::Transform(format!(
            "record {}: reading {} needs more than {} integer digits or {} decimal places",
            env.position,
            r.reading,
            Reading::INTEGER_DIGITS,
            Reading::SCALE
        )));
    }
    if r.remark.chars().count() > Reading::MAX_REMARK_LEN {
        return Err(PipelineError::Transform(format!(
            "record {}: remark is longer than {} characters",
            env.position,
            Reading::MAX_REMARK_LEN
        )));
    }

    let min_date = date!(2000 - 01 - 01);
    let max_date = date!(2100 - 01 - 01);

    if r.date < min_date || r.date > max_date {
        return Err(PipelineError::Transform(format!(
            "record {}: date {} out of allowed range",
            env.position, r.date
        )));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<ReadingRecord, ReadingRecord> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<ReadingRecord>,
    ) -> Result<Envelope<ReadingRecord>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("reading_import_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
