use crate::config::SimulationConfig;
use crate::engine::RunOutcome;
use crate::error::Result;
use arrow::array::{Float64Array, StringArray, UInt64Array, UInt8Array};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use lazy_static::lazy_static;
use std::io::Write;
use std::sync::Arc;

lazy_static! {
    static ref CSV_SCHEMA_REPORT: Schema = Schema::new(vec![
        Field::new("strategy", DataType::Utf8, false),
        Field::new("threads", DataType::UInt64, false),
        Field::new("accounts", DataType::UInt64, false),
        Field::new("transactions_per_thread", DataType::UInt64, false),
        Field::new("query_percentage", DataType::UInt8, false),
        Field::new("elapsed_secs", DataType::Float64, false),
        Field::new("transfers", DataType::UInt64, false),
        Field::new("queries", DataType::UInt64, false),
        Field::new("failed_transfers", DataType::UInt64, false),
        Field::new("total_balance", DataType::Utf8, false),
    ]);
}

/// One row of the timing table.
pub struct RunReport {
    pub strategy: String,
    pub threads: u64,
    pub accounts: u64,
    pub transactions_per_thread: u64,
    pub query_percentage: u8,
    pub elapsed_secs: f64,
    pub transfers: u64,
    pub queries: u64,
    pub failed_transfers: u64,
    pub total_balance: String,
}

impl RunReport {
    pub fn new(config: &SimulationConfig, outcome: &RunOutcome) -> Self {
        RunReport {
            strategy: outcome.strategy.to_string(),
            threads: config.thread_count as u64,
            accounts: config.account_count as u64,
            transactions_per_thread: config.transactions_per_thread,
            query_percentage: config.query_percentage,
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            transfers: outcome.transfers(),
            queries: outcome.queries(),
            failed_transfers: outcome.failed_transfers(),
            total_balance: outcome.total_after().to_string(),
        }
    }
}

pub fn write_reports<W: Write>(reports: &[RunReport], writer: W) -> Result<()> {
    let batch = RecordBatch::try_new(
        Arc::new(CSV_SCHEMA_REPORT.clone()),
        vec![
            Arc::new(StringArray::from_iter_values(
                reports.iter().map(|r| r.strategy.as_str()),
            )),
            Arc::new(UInt64Array::from_iter_values(reports.iter().map(|r| r.threads))),
            Arc::new(UInt64Array::from_iter_values(reports.iter().map(|r| r.accounts))),
            Arc::new(UInt64Array::from_iter_values(
                reports.iter().map(|r| r.transactions_per_thread),
            )),
            Arc::new(UInt8Array::from_iter_values(
                reports.iter().map(|r| r.query_percentage),
            )),
            Arc::new(Float64Array::from_iter_values(
                reports.iter().map(|r| r.elapsed_secs),
            )),
            Arc::new(UInt64Array::from_iter_values(reports.iter().map(|r| r.transfers))),
            Arc::new(UInt64Array::from_iter_values(reports.iter().map(|r| r.queries))),
            Arc::new(UInt64Array::from_iter_values(
                reports.iter().map(|r| r.failed_transfers),
            )),
            Arc::new(StringArray::from_iter_values(
                reports.iter().map(|r| r.total_balance.as_str()),
            )),
        ],
    )?;

    let mut writer = WriterBuilder::new().with_header(true).build(writer);
    writer.write(&batch)?;
    Ok(())
}
