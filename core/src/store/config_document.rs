use super::QuoteStore;
use crate::{error::EngineResult, resolver::ConfigSource};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub service_id: String,
    pub version:    u32,
    pub payload:    Value,
    pub updated_at: String,
}

impl QuoteStore {
    /// Publish a config document. Re-publishing an existing version
    /// replaces its payload.
    pub fn put_config_document(
        &self,
        service_id: &str,
        version: u32,
        payload: &Value,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO config_document (service_id, version, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (service_id, version)
             DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            params![
                service_id,
                version as i64,
                serde_json::to_string(payload)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Highest published version for `service_id`.
    pub fn latest_config_document(&self, service_id: &str) -> EngineResult<Option<ConfigDocument>> {
        let row = self
            .conn
            .query_row(
                "SELECT service_id, version, payload, updated_at
                 FROM config_document WHERE service_id = ?1
                 ORDER BY version DESC LIMIT 1",
                params![service_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((service_id, version, payload, updated_at)) => Ok(Some(ConfigDocument {
                service_id,
                version: version as u32,
                payload: serde_json::from_str(&payload)?,
                updated_at,
            })),
            None => Ok(None),
        }
    }

    pub fn config_services(&self) -> EngineResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT service_id FROM config_document ORDER BY service_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

impl ConfigSource for QuoteStore {
    /// The stored payload is handed over as-is; the `version` column fills
    /// in when the document itself does not carry one.
    fn fetch_active_config(&self, service_id: &str) -> EngineResult<Option<Value>> {
        let Some(doc) = self.latest_config_document(service_id)? else {
            return Ok(None);
        };
        let mut payload = doc.payload;
        let enveloped = payload.get("config").map_or(false, Value::is_object);
        let target = if enveloped { &mut payload["config"] } else { &mut payload };
        if let Some(obj) = target.as_object_mut() {
            obj.entry("version").or_insert_with(|| Value::from(doc.version));
        }
        Ok(Some(payload))
    }
}
