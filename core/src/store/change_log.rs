use super::QuoteStore;
use crate::{
    error::{EngineError, EngineResult},
    tracker::{ChangeRecord, ChangeSink},
};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeLogEntry {
    pub batch_id:   String,
    pub record:     ChangeRecord,
    pub emitted_at: String,
}

impl QuoteStore {
    /// Write one batch atomically. Returns the batch id.
    pub fn append_change_batch(&self, records: &[ChangeRecord]) -> EngineResult<String> {
        let batch_id = Uuid::new_v4().to_string();
        let emitted_at = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO change_log (
                    batch_id, product_key, field_type, field_display_name,
                    original_value, new_value, delta, quantity, frequency, emitted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for r in records {
                stmt.execute(params![
                    batch_id,
                    r.product_key,
                    r.field_type,
                    r.field_display_name,
                    r.original_value,
                    r.new_value,
                    r.delta,
                    r.quantity,
                    r.frequency,
                    emitted_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(batch_id)
    }

    pub fn change_log_for(&self, product_key: &str) -> EngineResult<Vec<ChangeLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT batch_id, product_key, field_type, field_display_name,
                    original_value, new_value, delta, quantity, frequency, emitted_at
             FROM change_log WHERE product_key = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![product_key], |row| {
                Ok(ChangeLogEntry {
                    batch_id: row.get(0)?,
                    record: ChangeRecord {
                        product_key:        row.get(1)?,
                        field_type:         row.get(2)?,
                        field_display_name: row.get(3)?,
                        original_value:     row.get(4)?,
                        new_value:          row.get(5)?,
                        delta:              row.get(6)?,
                        quantity:           row.get(7)?,
                        frequency:          row.get(8)?,
                    },
                    emitted_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn change_log_len(&self) -> EngineResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM change_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

fn emit_batch(store: &QuoteStore, records: &[ChangeRecord]) -> EngineResult<()> {
    store
        .append_change_batch(records)
        .map(|_| ())
        .map_err(|e| EngineError::SinkRejected {
            count:  records.len(),
            reason: e.to_string(),
        })
}

impl ChangeSink for QuoteStore {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()> {
        emit_batch(self, records)
    }
}

/// Several sessions can share one store.
impl ChangeSink for &QuoteStore {
    fn emit(&mut self, records: &[ChangeRecord]) -> EngineResult<()> {
        emit_batch(self, records)
    }
}
