//! In-memory live property store.
//!
//! A clone-able handle: the router writes through one clone while the binary (or a
//! test) reads snapshots through another.

use std::{collections::BTreeMap, sync::Arc};

use log::{debug, info};
use parking_lot::RwLock;

use crate::error::SinkError;
use crate::sinks::{PropertyId, PropertySink};

/// Static identification metadata, set once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_revision: String,
}

impl AccessoryInfo {
    pub fn for_host(name: &str, hostname: &str) -> Self {
        Self {
            name: name.to_string(),
            manufacturer: "Plantower".to_string(),
            model: "PMS7003".to_string(),
            serial_number: format!("{}-0", hostname),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Current state of one exposed property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyState {
    /// Never written since startup.
    Pending,
    Value(f64),
    Unavailable(String),
}

#[derive(Debug)]
struct StoreInner {
    info: AccessoryInfo,
    properties: BTreeMap<PropertyId, PropertyState>,
}

#[derive(Debug, Clone)]
pub struct PropertyStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl PropertyStore {
    pub fn new(info: AccessoryInfo, exposed: &[PropertyId]) -> Self {
        info!(
            "[Properties] {} {} serial={} firmware={} exposing {} properties",
            info.manufacturer,
            info.model,
            info.serial_number,
            info.firmware_revision,
            exposed.len()
        );
        let properties = exposed
            .iter()
            .map(|id| (*id, PropertyState::Pending))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(StoreInner { info, properties })),
        }
    }

    pub fn info(&self) -> AccessoryInfo {
        self.inner.read().info.clone()
    }

    /// Exposed properties in stable order.
    pub fn exposed(&self) -> Vec<PropertyId> {
        self.inner.read().properties.keys().copied().collect()
    }

    pub fn get(&self, id: PropertyId) -> Option<PropertyState> {
        self.inner.read().properties.get(&id).cloned()
    }

    pub fn value(&self, id: PropertyId) -> Option<f64> {
        match self.get(id) {
            Some(PropertyState::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Vec<(PropertyId, PropertyState)> {
        self.inner
            .read()
            .properties
            .iter()
            .map(|(id, state)| (*id, state.clone()))
            .collect()
    }

    fn write(&self, id: PropertyId, state: PropertyState) -> Result<(), SinkError> {
        let mut inner = self.inner.write();
        match inner.properties.get_mut(&id) {
            Some(slot) => {
                debug!("[Properties] {} <- {:?}", id, state);
                *slot = state;
                Ok(())
            }
            None => Err(SinkError::Delivery {
                sink: "properties",
                message: format!("{} is not exposed", id),
            }),
        }
    }
}

impl PropertySink for PropertyStore {
    fn set_value(&mut self, id: PropertyId, value: f64) -> Result<(), SinkError> {
        self.write(id, PropertyState::Value(value))
    }

    fn set_unavailable(&mut self, id: PropertyId, reason: &str) -> Result<(), SinkError> {
        self.write(id, PropertyState::Unavailable(reason.to_string()))
    }
}
