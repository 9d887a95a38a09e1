//! Instrument reference data.
//!
//! [`Instrument`] is immutable static data loaded at startup and marked good
//! for trade; equality and hashing are by name only. [`InstrumentDirectory`]
//! is the lookup-by-name service the engine resolves order books against: an
//! explicitly owned registry handed to consumers by reference, populated once
//! from a reference-data source.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::BufRead;
use std::sync::{Arc, RwLock};

use log::{info, warn};
use rust_decimal::Decimal;

use crate::error::EngineError;

/// Immutable instrument reference: unique name plus the last reference price.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Instrument {
    name: String,
    reference_price: Decimal,
}

impl Instrument {
    pub fn new(name: impl Into<String>, reference_price: Decimal) -> Self {
        Self {
            name: name.into(),
            reference_price,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last closing price from reference data; not consulted by matching.
    pub fn reference_price(&self) -> Decimal {
        self.reference_price
    }
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Instrument {}

impl Hash for Instrument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Registry of tradable instruments, keyed by name.
///
/// Populated at startup (directly via [`InstrumentDirectory::insert`] or from
/// a reference-data stream via [`InstrumentDirectory::load_reference_data`]);
/// lookups against an empty directory fail with
/// [`EngineError::DirectoryNotInitialized`].
#[derive(Debug, Default)]
pub struct InstrumentDirectory {
    instruments: RwLock<HashMap<String, Arc<Instrument>>>,
}

impl InstrumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instrument. The first registration for a name wins;
    /// re-registering returns the existing shared reference.
    pub fn insert(&self, instrument: Instrument) -> Arc<Instrument> {
        let mut instruments = self.instruments.write().expect("instruments lock");
        Arc::clone(
            instruments
                .entry(instrument.name().to_owned())
                .or_insert_with(|| Arc::new(instrument)),
        )
    }

    /// Resolves an instrument by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<Instrument>, EngineError> {
        let instruments = self.instruments.read().expect("instruments lock");
        if instruments.is_empty() {
            return Err(EngineError::DirectoryNotInitialized);
        }
        instruments
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownInstrument(name.to_owned()))
    }

    /// All registered instruments, for pre-warming one book per instrument.
    pub fn all(&self) -> Vec<Arc<Instrument>> {
        let instruments = self.instruments.read().expect("instruments lock");
        instruments.values().cloned().collect()
    }

    /// Loads `name<separator>reference_price` lines from a reference-data
    /// stream. Malformed lines are logged and skipped, matching the tolerant
    /// startup behavior expected of reference feeds. Returns the number of
    /// instruments loaded.
    pub fn load_reference_data(
        &self,
        reader: impl BufRead,
        separator: char,
    ) -> std::io::Result<usize> {
        let mut loaded = 0usize;
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(2, separator);
            let name = fields.next().unwrap_or_default().trim();
            let price = fields.next().unwrap_or_default().trim();
            match price.parse::<Decimal>() {
                Ok(reference_price) if !name.is_empty() => {
                    info!("instrument loaded name={} reference_price={}", name, reference_price);
                    self.insert(Instrument::new(name, reference_price));
                    loaded += 1;
                }
                _ => warn!("empty or unexpected reference line format {:?}", line),
            }
        }
        Ok(loaded)
    }
}
