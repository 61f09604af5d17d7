//! Record import as source → transforms → sink.
//!
//! A failing record travels down the stream as an `Err` item so the sink can
//! decide whether to skip it or abort; transforms pass such items through
//! untouched. `Source` errors mean the source itself is unusable and end the
//! stream; `Record` and `Transform` errors concern a single record.

use std::{pin::Pin, sync::Arc};

use futures::{Stream, StreamExt};

/// A record plus where it came from.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    /// 1-based position of the record in its source, for error reports.
    pub position: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("rejected record: {0}")]
    Record(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
}

impl PipelineError {
    /// Whether the error stops the whole run rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Source(_) | PipelineError::Sink(_))
    }
}

pub type RecordStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> RecordStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    /// Applied in order; each sees the output of the previous one.
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>,
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<(), PipelineError> {
        let stream = self
            .transforms
            .into_iter()
            .fold(self.source.stream().await, chain);

        self.sink.run(stream).await
    }
}

fn chain<T>(stream: RecordStream<T>, transform: Arc<dyn Transform<T, T> + Send + Sync>) -> RecordStream<T>
where
    T: Send + 'static,
{
    Box::pin(stream.then(move |item| {
        let transform = transform.clone();
        async move {
            match item {
                Ok(env) => transform.apply(env).await,
                Err(e) => Err(e),
            }
        }
    }))
}
