//! Report data sources.
//!
//! A report body is either materialized ([`ReportData::Document`]) or a
//! single-pass producer of rows ([`ReportData::Rows`]). Producers are never
//! restarted or buffered as a whole; renderers that can stream (CSV, JSON,
//! XLSX) consume them one row at a time.
//!
//! The async entry points take [`AsyncReportData`]. A [`RowStream`] is
//! bridged to the blocking writer through a one-slot channel, so the event
//! loop pulls rows while a worker thread writes them.

use std::fmt;

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::RenderError;

/// Single-pass, blocking row producer.
pub type RowIter = Box<dyn Iterator<Item = Value> + Send>;

/// Single-pass, awaitable row producer.
pub type RowStream = BoxStream<'static, Value>;

/// Rows in flight between the async producer and the blocking writer.
const ROW_BUFFER: usize = 1;

// ---------------------------------------------------------------------------
// ReportData
// ---------------------------------------------------------------------------

/// Input of a synchronous render.
pub enum ReportData {
    /// Already materialized document — usually an array of rows.
    Document(Value),
    /// Lazily produced rows.
    Rows(RowIter),
}

impl ReportData {
    /// Wrap any iterator of rows as a single-pass producer.
    pub fn rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        ReportData::Rows(Box::new(rows.into_iter()))
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self, ReportData::Document(_))
    }

    /// Iterate rows. A materialized document must be an array.
    pub fn into_rows(self) -> Result<RowIter, RenderError> {
        match self {
            ReportData::Rows(rows) => Ok(rows),
            ReportData::Document(Value::Array(rows)) => Ok(Box::new(rows.into_iter())),
            ReportData::Document(other) => Err(RenderError::MalformedData(format!(
                "expected an array of rows, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Materialize into a single JSON value. Rows are collected into an array.
    pub fn into_value(self) -> Value {
        match self {
            ReportData::Document(value) => value,
            ReportData::Rows(rows) => Value::Array(rows.collect()),
        }
    }
}

impl fmt::Debug for ReportData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportData::Document(value) => f.debug_tuple("Document").field(value).finish(),
            ReportData::Rows(_) => f.write_str("Rows(..)"),
        }
    }
}

impl From<Value> for ReportData {
    fn from(value: Value) -> Self {
        ReportData::Document(value)
    }
}

impl From<Vec<Value>> for ReportData {
    fn from(rows: Vec<Value>) -> Self {
        ReportData::Document(Value::Array(rows))
    }
}

// ---------------------------------------------------------------------------
// AsyncReportData
// ---------------------------------------------------------------------------

/// Input of an asynchronous render.
pub enum AsyncReportData {
    /// A blocking source; handed to the worker as is.
    Sync(ReportData),
    /// An awaitable source; forwarded row by row to the worker.
    Stream(RowStream),
}

impl AsyncReportData {
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        AsyncReportData::Stream(stream.boxed())
    }
}

impl fmt::Debug for AsyncReportData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncReportData::Sync(data) => f.debug_tuple("Sync").field(data).finish(),
            AsyncReportData::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<ReportData> for AsyncReportData {
    fn from(data: ReportData) -> Self {
        AsyncReportData::Sync(data)
    }
}

impl From<Value> for AsyncReportData {
    fn from(value: Value) -> Self {
        AsyncReportData::Sync(ReportData::Document(value))
    }
}

impl From<Vec<Value>> for AsyncReportData {
    fn from(rows: Vec<Value>) -> Self {
        AsyncReportData::Sync(rows.into())
    }
}

// ---------------------------------------------------------------------------
// Offloading
// ---------------------------------------------------------------------------

/// Run blocking work on the runtime's blocking pool.
pub(crate) async fn offload<T, F>(work: F) -> Result<T, RenderError>
where
    F: FnOnce() -> Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Run a blocking consumer of report data on the blocking pool.
///
/// A stream source is pumped from the calling task into the worker; the
/// worker sees an ordinary [`ReportData::Rows`]. If the worker stops early
/// (error), pumping stops and the worker's result is returned.
pub(crate) async fn offload_rows<T, F>(data: AsyncReportData, consume: F) -> Result<T, RenderError>
where
    F: FnOnce(ReportData) -> Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    match data {
        AsyncReportData::Sync(data) => offload(move || consume(data)).await,
        AsyncReportData::Stream(mut stream) => {
            let (tx, rx) = mpsc::channel(ROW_BUFFER);
            let worker =
                tokio::task::spawn_blocking(move || consume(ReportData::Rows(Box::new(ChannelRows(rx)))));
            while let Some(row) = stream.next().await {
                if tx.send(row).await.is_err() {
                    break;
                }
            }
            drop(tx);
            worker.await?
        }
    }
}

/// Blocking view over the receiving end of the row channel.
struct ChannelRows(mpsc::Receiver<Value>);

impl Iterator for ChannelRows {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.0.blocking_recv()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
