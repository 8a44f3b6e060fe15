use crate::codec;
use crate::definition::ProtocolDefinition;
use crate::error::{Error, Result};
use crate::event::ProtocolEvent;
use crate::field::FieldValue;
use rfbridge_core::PulseTrain;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Thread-safe collection of protocol definitions.
///
/// Decoding walks definitions in registration order and reports every
/// match, so overlapping protocols (a cheap remote reusing another
/// vendor's timings) each produce their own event. The registry starts
/// empty.
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    definitions: RwLock<Vec<Arc<ProtocolDefinition>>>,
}

impl ProtocolRegistry {
    #[must_use]
    pub fn new() -> Self {
        ProtocolRegistry::default()
    }

    /// Register a definition.
    ///
    /// The definition is validated again here so catalogs loaded through
    /// deserialization get the same checks as builder output.
    ///
    /// # Errors
    /// Returns `Error::DuplicateProtocol` when the id is already taken and
    /// `Error::InvalidDefinition` when validation fails.
    pub fn register(&self, definition: ProtocolDefinition) -> Result<()> {
        definition.validate()?;
        let mut definitions = self.write_guard();
        if definitions.iter().any(|d| d.id() == definition.id()) {
            return Err(Error::DuplicateProtocol {
                id: definition.id().to_string(),
            });
        }
        definitions.push(Arc::new(definition));
        Ok(())
    }

    /// Register every definition in order, stopping at the first failure.
    ///
    /// # Errors
    /// Propagates the first `register` failure; earlier definitions stay
    /// registered.
    pub fn register_all(&self, definitions: impl IntoIterator<Item = ProtocolDefinition>) -> Result<()> {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<ProtocolDefinition>> {
        self.read_guard().iter().find(|d| d.id() == id).cloned()
    }

    /// Registered ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.read_guard().iter().map(|d| d.id().to_string()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Try every registered definition against a received train.
    ///
    /// Returns one event per matching protocol, in registration order. An
    /// empty result means the train is noise or an unknown protocol; that
    /// is not an error.
    #[must_use]
    pub fn decode_all(&self, train: &PulseTrain) -> Vec<ProtocolEvent> {
        let definitions: Vec<Arc<ProtocolDefinition>> = self.read_guard().clone();
        definitions
            .iter()
            .filter_map(|definition| codec::decode(definition, train))
            .collect()
    }

    /// Encode field values into a pulse train using the named protocol.
    ///
    /// # Errors
    /// Returns `Error::UnknownProtocol` when the id is not registered, or
    /// the `codec::encode` error for missing/invalid field values.
    pub fn encode(&self, id: &str, values: &BTreeMap<String, FieldValue>) -> Result<PulseTrain> {
        let definition = self.get(id).ok_or_else(|| Error::UnknownProtocol {
            id: id.to_string(),
        })?;
        codec::encode(&definition, values)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ProtocolDefinition>>> {
        self.definitions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<ProtocolDefinition>>> {
        self.definitions.write().unwrap_or_else(|e| e.into_inner())
    }
}
