//! JSON export/import of the whole diagram graph.
//!
//! ```text
//! {
//!   "layers": { "<id>": <layer>, ... },
//!   "layerIds": ["<id>", ...],
//!   "exportedAt": "<ISO-8601 timestamp>",
//!   "name": "<document name>"
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::layer::{Layer, LayerId};
use crate::store::{DiagramSnapshot, Mutation, StoreError};

/// Import/export errors.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid JSON format: missing layers or layerIds")]
    MissingCollections,
    #[error("Layer id {0} is listed in layerIds but has no entry in layers")]
    MissingLayer(LayerId),
    #[error("Layer {0} has no entry in layerIds")]
    UnlistedLayer(LayerId),
    #[error("Layer id {0} appears more than once in layerIds")]
    DuplicateId(LayerId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for import/export.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// The export file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub layers: BTreeMap<LayerId, Layer>,
    pub layer_ids: Vec<LayerId>,
    /// Unreadable timestamps are dropped rather than failing the import.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub exported_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc)))
}

impl ExportEnvelope {
    /// Envelope for a snapshot, stamped with `exported_at`.
    pub fn from_snapshot(snapshot: DiagramSnapshot, name: impl Into<String>, exported_at: DateTime<Utc>) -> Self {
        Self {
            layers: snapshot.layers,
            layer_ids: snapshot.layer_ids,
            exported_at: Some(exported_at),
            name: name.into(),
        }
    }

    /// Parse and validate an envelope.
    ///
    /// Envelopes without `layers` or `layerIds` are rejected before any layer
    /// is decoded. Every listed id must have a layer and every layer must be
    /// listed exactly once.
    pub fn parse(json: &str) -> ExchangeResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let has = |key: &str| value.get(key).is_some_and(|v| !v.is_null());
        if !has("layers") || !has("layerIds") {
            return Err(ExchangeError::MissingCollections);
        }
        let envelope: Self = serde_json::from_value(value)?;
        validate_graph(&envelope.layers, &envelope.layer_ids)?;
        Ok(envelope)
    }

    pub fn to_json_pretty(&self) -> ExchangeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The graph part of the envelope.
    pub fn snapshot(&self) -> DiagramSnapshot {
        DiagramSnapshot {
            layers: self.layers.clone(),
            layer_ids: self.layer_ids.clone(),
        }
    }

    /// One batch that empties the document and repopulates it in list order.
    pub fn replace_batch(&self) -> Vec<Mutation> {
        let mut batch = Vec::with_capacity(self.layer_ids.len() + 1);
        batch.push(Mutation::Clear);
        batch.extend(self.append_batch());
        batch
    }

    /// Inserts for every layer, in list order, without clearing.
    pub fn append_batch(&self) -> Vec<Mutation> {
        self.layer_ids
            .iter()
            .filter_map(|id| {
                self.layers.get(id).map(|layer| Mutation::InsertLayer {
                    id: id.clone(),
                    layer: layer.clone(),
                })
            })
            .collect()
    }
}

/// Check that `layer_ids` and `layers` describe the same set of ids, with no
/// id listed twice.
pub fn validate_graph(layers: &BTreeMap<LayerId, Layer>, layer_ids: &[LayerId]) -> ExchangeResult<()> {
    let mut seen = HashSet::with_capacity(layer_ids.len());
    for id in layer_ids {
        if !seen.insert(id.as_str()) {
            return Err(ExchangeError::DuplicateId(id.clone()));
        }
        if !layers.contains_key(id) {
            return Err(ExchangeError::MissingLayer(id.clone()));
        }
    }
    if let Some(id) = layers.keys().find(|id| !seen.contains(id.as_str())) {
        return Err(ExchangeError::UnlistedLayer(id.clone()));
    }
    Ok(())
}

/// Suggested download name: runs of whitespace become `_`.
pub fn export_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 20);
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out.push_str("_canvas_export.json");
    out
}
