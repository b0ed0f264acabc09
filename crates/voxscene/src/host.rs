//! # Host Boundary
//!
//! Naming and object bookkeeping for the application that turns a
//! [`SceneModel`] into visible objects.
//!
//! The host keeps a global, name-keyed registry of objects. Here that
//! registry is an injected [`ObjectStore`] with get-or-create semantics and
//! `.001`-style collision suffixes, so the core never touches host state.

use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::model::{InstanceSlot, SceneModel};

/// Placeholder object instanced when a slot has no real object.
pub const EMPTY_OBJECT: &str = "Empty";

/// Point object of a chunk: `"<file> - PT_<chunk>"`.
#[must_use]
pub fn point_object_name(file_name: &str, chunk: &str) -> String {
    format!("{file_name} - PT_{chunk}")
}

/// Top-level collection: `"<file> USD Collection"`.
#[must_use]
pub fn collection_name(file_name: &str) -> String {
    format!("{file_name} USD Collection")
}

/// Point object collection: `"<file> USD Points"`.
#[must_use]
pub fn points_collection_name(file_name: &str) -> String {
    format!("{file_name} USD Points")
}

/// Block library collection: `"<file> USD BlockLib"`.
#[must_use]
pub fn block_lib_collection_name(file_name: &str) -> String {
    format!("{file_name} USD BlockLib")
}

/// Merged object of a composite block: `"<Block_c_v>_merge"`.
#[must_use]
pub fn merge_name(segment: &str) -> String {
    format!("{segment}_merge")
}

/// Splits `name.001` into `("name", Some(1))`.
fn split_suffix(name: &str) -> (&str, Option<u32>) {
    if let Some((stem, digits)) = name.rsplit_once('.') {
        if digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = digits.parse() {
                return (stem, Some(n));
            }
        }
    }
    (name, None)
}

/// Hands out names that are unique within one registry.
///
/// A taken name gets the lowest free `.NNN` suffix, counting from `.001`.
#[derive(Clone, Debug, Default)]
pub struct UniqueNameAllocator {
    taken: HashSet<String>,
}

impl UniqueNameAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `name` is taken.
    #[must_use]
    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Reserves and returns a unique name based on `base`.
    pub fn allocate(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let (stem, _) = split_suffix(base);
        let mut n = 1u32;
        loop {
            let candidate = format!("{stem}.{n:03}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Frees a name for reuse.
    pub fn release(&mut self, name: &str) {
        self.taken.remove(name);
    }
}

/// Kinds of host objects the pipeline asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// A mesh-backed object.
    Mesh,
    /// A point cloud object.
    Points,
    /// A collection of objects.
    Collection,
    /// An empty placeholder.
    Empty,
}

/// An object known to the host registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Registry name (possibly suffixed).
    pub name: String,
    /// What it is.
    pub kind: ObjectKind,
}

/// Name-keyed host object registry.
pub trait ObjectStore {
    /// Looks up an object by exact name.
    fn get(&self, name: &str) -> Option<ObjectRecord>;

    /// Creates a new object; a taken name gets a `.NNN` suffix.
    fn create(&self, name: &str, kind: ObjectKind) -> ObjectRecord;

    /// Returns the object named `name`, creating it if absent.
    fn get_or_create(&self, name: &str, kind: ObjectKind) -> ObjectRecord {
        self.get(name).unwrap_or_else(|| self.create(name, kind))
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    objects: BTreeMap<String, ObjectKind>,
    names: UniqueNameAllocator,
}

/// In-memory [`ObjectStore`] owned by the caller.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().objects.is_empty()
    }

    /// All object names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().objects.keys().cloned().collect()
    }

    /// Removes an object, freeing its name.
    pub fn remove(&self, name: &str) -> Option<ObjectRecord> {
        let mut inner = self.inner.lock();
        let kind = inner.objects.remove(name)?;
        inner.names.release(name);
        Some(ObjectRecord {
            name: name.to_string(),
            kind,
        })
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get(&self, name: &str) -> Option<ObjectRecord> {
        self.inner.lock().objects.get(name).map(|&kind| ObjectRecord {
            name: name.to_string(),
            kind,
        })
    }

    fn create(&self, name: &str, kind: ObjectKind) -> ObjectRecord {
        let mut inner = self.inner.lock();
        let name = inner.names.allocate(name);
        inner.objects.insert(name.clone(), kind);
        ObjectRecord { name, kind }
    }

    // Single lock so concurrent callers cannot both create.
    fn get_or_create(&self, name: &str, kind: ObjectKind) -> ObjectRecord {
        let mut inner = self.inner.lock();
        if let Some(&existing) = inner.objects.get(name) {
            return ObjectRecord {
                name: name.to_string(),
                kind: existing,
            };
        }
        let name = inner.names.allocate(name);
        inner.objects.insert(name.clone(), kind);
        ObjectRecord { name, kind }
    }
}

/// Objects resolved for one chunk's instancing list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotResolution {
    /// Object instanced per slot, in slot order.
    pub objects: Vec<ObjectRecord>,
    /// Names that could not be found and fell back to the placeholder.
    pub broken: Vec<String>,
}

/// Resolves instancing slots against the host registry.
///
/// Each slot tries its object name, then the first suffixed duplicate
/// (`name.001`), and otherwise instances [`EMPTY_OBJECT`] and reports the
/// name as broken.
pub fn resolve_slots<S: ObjectStore + ?Sized>(slots: &[InstanceSlot], store: &S) -> SlotResolution {
    let mut resolution = SlotResolution::default();
    for slot in slots {
        let wanted = slot.object.clone().unwrap_or_else(|| slot.segment.clone());
        let found = slot
            .object
            .as_deref()
            .and_then(|name| store.get(name).or_else(|| store.get(&format!("{name}.001"))));
        let record = match found {
            Some(record) => record,
            None => {
                warn!(block = %slot.block, object = %wanted, "no object to instance");
                resolution.broken.push(wanted);
                store.get_or_create(EMPTY_OBJECT, ObjectKind::Empty)
            }
        };
        resolution.objects.push(record);
    }
    resolution
}

/// Host objects for a whole model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostPlan {
    /// Top-level collection.
    pub collection: ObjectRecord,
    /// Collection holding the point objects.
    pub points_collection: ObjectRecord,
    /// Collection holding the imported block library.
    pub block_lib_collection: ObjectRecord,
    /// Point object per chunk.
    pub point_objects: BTreeMap<String, ObjectRecord>,
    /// Instancing objects per chunk.
    pub slots: BTreeMap<String, SlotResolution>,
}

impl HostPlan {
    /// Every broken slot name over all chunks, deduplicated and sorted.
    #[must_use]
    pub fn broken(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .values()
            .flat_map(|s| s.broken.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Creates (or reuses) the collections and point objects for `model` and
/// resolves every chunk's instancing slots.
pub fn plan<S: ObjectStore + ?Sized>(model: &SceneModel, store: &S) -> HostPlan {
    let file = model.world().file_name.as_str();
    let collection = store.get_or_create(&collection_name(file), ObjectKind::Collection);
    let points_collection =
        store.get_or_create(&points_collection_name(file), ObjectKind::Collection);
    let block_lib_collection =
        store.get_or_create(&block_lib_collection_name(file), ObjectKind::Collection);

    let mut point_objects = BTreeMap::new();
    let mut slots = BTreeMap::new();
    for name in model.chunks().keys() {
        let object = store.get_or_create(&point_object_name(file, name), ObjectKind::Points);
        point_objects.insert(name.clone(), object);
        let chunk_slots = model.instancing_slots(name).unwrap_or_default();
        slots.insert(name.clone(), resolve_slots(&chunk_slots, store));
    }

    let plan = HostPlan {
        collection,
        points_collection,
        block_lib_collection,
        point_objects,
        slots,
    };
    debug!(
        chunks = plan.point_objects.len(),
        broken = plan.broken().len(),
        "planned host objects"
    );
    plan
}
