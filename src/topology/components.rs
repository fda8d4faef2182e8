//! Component lookup table.
//!
//! Loops carry integer component ids; everything else known about a
//! component (its name, whether it sheds a wake, which group it belongs to)
//! lives in one [`ComponentTable`] that callers pass by reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshAgglomError;
use crate::topology::face_loop::SurfaceKind;

/// Everything known about one component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub name: String,
    pub kind: SurfaceKind,
    /// Sheds a wake.
    pub lifting: bool,
    /// Components in one group chain their trailing edges together.
    pub group: Option<u32>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ComponentRecord {
    pub fn new(name: impl Into<String>, kind: SurfaceKind, lifting: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            lifting,
            group: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// Component id → record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentTable {
    records: BTreeMap<u32, ComponentRecord>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning the previous one.
    pub fn insert(&mut self, id: u32, record: ComponentRecord) -> Option<ComponentRecord> {
        self.records.insert(id, record)
    }

    pub fn get(&self, id: u32) -> Option<&ComponentRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut ComponentRecord> {
        self.records.get_mut(&id)
    }

    /// Like [`get`](Self::get) but unknown ids are an error.
    pub fn require(&self, id: u32) -> Result<&ComponentRecord, MeshAgglomError> {
        self.records
            .get(&id)
            .ok_or(MeshAgglomError::UnknownComponent(id))
    }

    pub fn require_mut(&mut self, id: u32) -> Result<&mut ComponentRecord, MeshAgglomError> {
        self.records
            .get_mut(&id)
            .ok_or(MeshAgglomError::UnknownComponent(id))
    }

    /// Whether loops of component `id` and surface kind `kind` shed a wake.
    ///
    /// Components missing from the table fall back to their surface kind:
    /// wings lift, bodies and wakes do not.
    pub fn is_lifting(&self, id: u32, kind: SurfaceKind) -> bool {
        if kind == SurfaceKind::Wake {
            return false;
        }
        match self.records.get(&id) {
            Some(record) => record.lifting,
            None => kind == SurfaceKind::Wing,
        }
    }

    /// Key under which trailing-edge chains are walked: the component's group
    /// if it has one, otherwise the component itself.
    pub fn chain_key(&self, id: u32) -> u32 {
        self.records
            .get(&id)
            .and_then(|r| r.group)
            .unwrap_or(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ComponentRecord)> + '_ {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
