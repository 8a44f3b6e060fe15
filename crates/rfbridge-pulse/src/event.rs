use crate::field::FieldValue;
use rfbridge_core::PulseTrain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One successful protocol match against a received pulse train.
///
/// A single train can produce several events when more than one registered
/// protocol matches it. `values` is ordered by field name so serialized
/// events are stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    /// Id of the matched protocol definition.
    pub protocol: String,
    /// Decoded field values keyed by field name.
    pub values: BTreeMap<String, FieldValue>,
    /// The pulse train the match was decoded from.
    pub raw: PulseTrain,
    /// Match quality in `(0.0, 1.0]`. 1.0 means every pulse sat exactly on
    /// its nominal duration; lower values mean larger worst-case deviation.
    pub confidence: f64,
}

impl ProtocolEvent {
    /// Look up a decoded field by name.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }
}
