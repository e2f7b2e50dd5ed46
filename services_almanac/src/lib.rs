//! # Almanac Service
//!
//! The node's address book: what it knows about other nodes and places.
//!
//! ## Philosophy
//!
//! - **Learned, not configured**: Records are created and refreshed from the
//!   headers of inbound messages
//! - **Newest wins**: An upsert only replaces a record that is not newer
//! - **Self-persisting**: Every change is written to the key-value store under
//!   [`STORAGE_KEY`] and reloaded with [`Almanac::load`]
//!
//! Records are looked up by id or by any of their nicknames.

mod record;

pub use record::{EntityKind, NodeRecord, RecordError, Transponder};

use codec::{deserialize_map, serialize_map, Value, ValueMap};
use core_types::NodeEnvironment;
use services_storage::KeyValueStore;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, warn};

/// Key the almanac persists itself under
pub const STORAGE_KEY: &str = "almanac";

/// Lookup and upsert of node records
pub trait AddressBook {
    /// Finds a record by id or nickname
    fn get_record(&self, identifier: &str) -> Option<NodeRecord>;

    /// All records of one kind, in insertion order
    fn get_records_by_kind(&self, kind: EntityKind) -> Vec<NodeRecord>;

    /// Inserts `record`, or replaces the record with the same id unless that
    /// one is newer; returns whether anything was stored
    fn add_or_update_record(&self, record: NodeRecord) -> bool;

    /// Returns a stamp newer than any record seen so far
    fn next_sequence(&self) -> u64;

    /// Creates or refreshes the record of a message sender
    ///
    /// Known records get the new position, speed and safe radius, gain the
    /// sighting's channels and its name as a nickname. New records are grids,
    /// marked [`Transponder::Local`] when the sender is this node.
    fn record_sighting(&self, sighting: Sighting) -> NodeRecord {
        let mut record = match self.get_record(&sighting.id) {
            Some(mut existing) => {
                existing.position = sighting.environment.position;
                existing.speed = sighting.environment.speed;
                existing.safe_radius = sighting.environment.safe_radius;
                existing.channels.extend(sighting.channels);
                existing
            }
            None => {
                let mut record = NodeRecord::grid(sighting.id, sighting.environment);
                record.channels = sighting.channels;
                if sighting.is_local {
                    record.transponder = Transponder::Local;
                }
                record
            }
        };
        record.add_nickname(&sighting.name);
        record.updated_at = self.next_sequence();

        self.add_or_update_record(record.clone());
        record
    }
}

/// What an inbound message reveals about its sender
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub id: String,
    pub name: String,
    pub environment: NodeEnvironment,
    pub channels: BTreeSet<String>,
    pub is_local: bool,
}

#[derive(Default)]
struct AlmanacState {
    records: Vec<NodeRecord>,
    sequence: u64,
}

/// The address book
///
/// Cloning yields another handle onto the same records.
#[derive(Clone)]
pub struct Almanac {
    state: Rc<RefCell<AlmanacState>>,
    store: Option<Rc<dyn KeyValueStore>>,
}

impl Almanac {
    /// Creates an almanac that is not persisted
    pub fn new() -> Self {
        Self {
            state: Rc::default(),
            store: None,
        }
    }

    /// Creates an almanac persisted through `store`
    pub fn with_store(store: Rc<dyn KeyValueStore>) -> Self {
        Self {
            state: Rc::default(),
            store: Some(store),
        }
    }

    /// Snapshot of every record, in insertion order
    pub fn records(&self) -> Vec<NodeRecord> {
        self.state.borrow().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().records.is_empty()
    }

    /// Forgets every record and persists the empty book
    pub fn clear(&self) {
        self.state.borrow_mut().records.clear();
        self.save();
    }

    /// Reloads records from the store, merging by recency
    ///
    /// Returns the number of records read. Unreadable records are skipped.
    pub fn load(&self) -> usize {
        let Some(text) = self.store.as_ref().and_then(|store| store.get(STORAGE_KEY)) else {
            return 0;
        };
        if text.trim().is_empty() {
            return 0;
        }

        let map = match deserialize_map(&text) {
            Ok(map) => map,
            Err(err) => {
                warn!(%err, "stored almanac is unreadable");
                return 0;
            }
        };

        let mut loaded = 0;
        for (id, value) in map {
            let Some(fields) = value.as_map() else {
                warn!(record = %id, "stored almanac record is not a map");
                continue;
            };
            match NodeRecord::from_fields(fields) {
                Ok(record) => {
                    let mut state = self.state.borrow_mut();
                    state.sequence = state.sequence.max(record.updated_at);
                    drop(state);
                    self.add_or_update_record(record);
                    loaded += 1;
                }
                Err(err) => warn!(record = %id, %err, "skipping stored almanac record"),
            }
        }
        debug!(loaded, "almanac loaded");
        loaded
    }

    /// Encodes every record as a map keyed by record id
    pub fn encode(&self) -> String {
        let map: ValueMap = self
            .state
            .borrow()
            .records
            .iter()
            .map(|record| (record.id.clone(), Value::Map(record.to_fields())))
            .collect();
        serialize_map(&map)
    }

    fn save(&self) {
        if let Some(store) = &self.store {
            store.set(STORAGE_KEY, &self.encode());
        }
    }
}

impl Default for Almanac {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressBook for Almanac {
    fn get_record(&self, identifier: &str) -> Option<NodeRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .find(|record| record.matches(identifier))
            .cloned()
    }

    fn get_records_by_kind(&self, kind: EntityKind) -> Vec<NodeRecord> {
        self.state
            .borrow()
            .records
            .iter()
            .filter(|record| record.kind == kind)
            .cloned()
            .collect()
    }

    fn next_sequence(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.sequence += 1;
        state.sequence
    }

    fn add_or_update_record(&self, record: NodeRecord) -> bool {
        let stored = {
            let mut state = self.state.borrow_mut();
            match state.records.iter().position(|r| r.id == record.id) {
                None => {
                    state.records.push(record);
                    true
                }
                Some(index) if record.updated_at >= state.records[index].updated_at => {
                    state.records[index] = record;
                    true
                }
                Some(_) => false,
            }
        };
        if stored {
            self.save();
        }
        stored
    }
}
