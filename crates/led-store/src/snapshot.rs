//! Whole-store export and import.
//!
//! Import decodes and validates every record of every present collection before anything
//! is written; a single malformed or invalid record fails the whole import and leaves the
//! store untouched.
//! Replacement then happens in one `set_many` under the writer lock.

use crate::records::RecordStore;
use chrono::Utc;
use led_types::{
    BusinessUnit, Collection, IamItem, ImportReport, Incident, KvStore, LedError, Record,
    Snapshot, StoreError, User, UserRegistration,
};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Default)]
struct DecodedSnapshot {
    incidents: Option<Vec<Incident>>,
    iam_items: Option<Vec<IamItem>>,
    users: Option<Vec<User>>,
    user_registrations: Option<Vec<UserRegistration>>,
    business_units: Option<Vec<BusinessUnit>>,
}

impl DecodedSnapshot {
    fn from_object(obj: &Map<String, Value>) -> Result<Self, LedError> {
        Ok(Self {
            incidents: decode_collection(obj)?,
            iam_items: decode_collection(obj)?,
            users: decode_collection(obj)?,
            user_registrations: decode_collection(obj)?,
            business_units: decode_collection(obj)?,
        })
    }

    fn is_empty(&self) -> bool {
        self.incidents.is_none()
            && self.iam_items.is_none()
            && self.users.is_none()
            && self.user_registrations.is_none()
            && self.business_units.is_none()
    }

    fn report(&self) -> ImportReport {
        ImportReport {
            incidents: self.incidents.as_ref().map(Vec::len),
            iam_items: self.iam_items.as_ref().map(Vec::len),
            users: self.users.as_ref().map(Vec::len),
            user_registrations: self.user_registrations.as_ref().map(Vec::len),
            business_units: self.business_units.as_ref().map(Vec::len),
        }
    }
}

fn decode_collection<T: Record>(obj: &Map<String, Value>) -> Result<Option<Vec<T>>, LedError> {
    let key = T::COLLECTION.snapshot_key();
    let value = match obj.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let entries = value
        .as_array()
        .ok_or_else(|| LedError::Serialization(format!("{}: expected an array", key)))?;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let record = T::deserialize(entry)
            .map_err(|e| LedError::Serialization(format!("{}[{}]: {}", key, i, e)))?;
        record
            .validate()
            .map_err(|e| LedError::Serialization(format!("{}[{}]: {}", key, i, e)))?;
        if !seen.insert(record.id().to_string()) {
            return Err(LedError::Serialization(format!(
                "{}[{}]: duplicate id {}",
                key,
                i,
                record.id()
            )));
        }
        out.push(record);
    }
    Ok(Some(out))
}

fn push_encoded<S: KvStore, T: Record>(
    entries: &mut Vec<(&'static str, String)>,
    items: &Option<Vec<T>>,
) -> Result<(), StoreError> {
    if let Some(items) = items {
        entries.push((
            T::COLLECTION.storage_key(),
            RecordStore::<S>::encode(items)?,
        ));
    }
    Ok(())
}

impl<S: KvStore> RecordStore<S> {
    /// Every collection plus the export time.
    ///
    /// Reads under the writer lock so the collections come from one consistent state.
    pub async fn export_snapshot(&self) -> Result<Snapshot, StoreError> {
        let _guard = self.lock_writes().await;
        Ok(Snapshot {
            incidents: self.get_all().await?,
            iam_items: self.get_all().await?,
            users: self.get_all().await?,
            user_registrations: self.get_all().await?,
            business_units: self.get_all().await?,
            export_date: Utc::now(),
        })
    }

    /// Replace each collection present in `json`; absent or null keys are left untouched.
    ///
    /// Fails with `Serialization` (and writes nothing) if the document is not a JSON
    /// object, has none of the collection keys, or holds a record that does not decode
    /// or breaks a field rule (incident dates and amounts, IAM progress above 100).
    /// Imported incidents get `actualLoss` recomputed.
    pub async fn import_snapshot(&self, json: &str) -> Result<ImportReport, LedError> {
        let doc: Value = serde_json::from_str(json)
            .map_err(|e| LedError::Serialization(format!("document is not valid JSON: {}", e)))?;
        let obj = doc
            .as_object()
            .ok_or_else(|| LedError::Serialization("document must be a JSON object".to_string()))?;

        let mut decoded = DecodedSnapshot::from_object(obj)?;
        if decoded.is_empty() {
            let known: Vec<&str> = Collection::ALL.iter().map(|c| c.snapshot_key()).collect();
            return Err(LedError::Serialization(format!(
                "document has none of the keys {}",
                known.join(", ")
            )));
        }
        if let Some(incidents) = decoded.incidents.as_mut() {
            for incident in incidents.iter_mut() {
                incident.recompute_actual_loss();
            }
        }

        let mut entries: Vec<(&'static str, String)> = Vec::new();
        push_encoded::<S, _>(&mut entries, &decoded.incidents)?;
        push_encoded::<S, _>(&mut entries, &decoded.iam_items)?;
        push_encoded::<S, _>(&mut entries, &decoded.users)?;
        push_encoded::<S, _>(&mut entries, &decoded.user_registrations)?;
        push_encoded::<S, _>(&mut entries, &decoded.business_units)?;

        let _guard = self.lock_writes().await;
        self.backend().set_many(&entries).await?;
        Ok(decoded.report())
    }
}
