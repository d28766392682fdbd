//! Durable trade ledger
//!
//! Append-only CSV file with one row per executed trade. Appends rewrite
//! the full table to a temp file in the same directory and rename it over
//! the target, so a crash mid-write never corrupts rows already on disk.
//! The call rate is one append per tick at most, so the rewrite cost is
//! irrelevant here.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{Side, TradeRecord};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk row schema: `timestamp,side,amount,price,total,usd_balance,btc_balance`
#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    timestamp: String,
    side: Side,
    amount: f64,
    price: f64,
    total: f64,
    usd_balance: f64,
    btc_balance: f64,
}

impl From<&TradeRecord> for LedgerRow {
    fn from(record: &TradeRecord) -> Self {
        LedgerRow {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            side: record.side,
            amount: record.amount,
            price: record.price,
            total: record.total,
            usd_balance: record.quote_balance_after,
            btc_balance: record.base_balance_after,
        }
    }
}

impl LedgerRow {
    fn into_record(self) -> Result<TradeRecord> {
        let naive = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .with_context(|| format!("Failed to parse ledger timestamp: {}", self.timestamp))?;
        Ok(TradeRecord {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            side: self.side,
            amount: self.amount,
            price: self.price,
            total: self.total,
            quote_balance_after: self.usd_balance,
            base_balance_after: self.btc_balance,
        })
    }
}

/// CSV-backed append-only trade log
pub struct TradeLedger {
    path: PathBuf,
}

impl TradeLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        TradeLedger {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one executed trade, creating the file with its header row on
    /// first use
    pub fn append(&self, record: &TradeRecord) -> Result<()> {
        let mut rows: Vec<LedgerRow> = if self.path.exists() {
            self.read_rows()?
        } else {
            Vec::new()
        };
        rows.push(LedgerRow::from(record));

        // Write the whole table next to the target, then rename into place
        let tmp_path = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            for row in &rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        info!(
            "Recorded {} of {:.6} at {:.2} in {}",
            record.side,
            record.amount,
            record.price,
            self.path.display()
        );
        Ok(())
    }

    /// Read back every trade recorded so far, oldest first
    pub fn read_all(&self) -> Result<Vec<TradeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        self.read_rows()?
            .into_iter()
            .map(LedgerRow::into_record)
            .collect()
    }

    fn read_rows(&self) -> Result<Vec<LedgerRow>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;

        let mut rows = Vec::new();
        for (idx, result) in reader.deserialize().enumerate() {
            let row: LedgerRow =
                result.with_context(|| format!("Failed to read ledger row {}", idx + 1))?;
            rows.push(row);
        }
        Ok(rows)
    }
}
