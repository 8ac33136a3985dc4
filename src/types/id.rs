// ABOUTME: Identifiers for runs, execution handles and containers.
// ABOUTME: A phantom kind parameter keeps the three id spaces apart at compile time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub enum RunKind {}
pub enum HandleKind {}
pub enum ContainerKind {}

/// An opaque id of kind `K`. Cloning shares the underlying string.
pub struct Id<K> {
    value: Arc<str>,
    _kind: PhantomData<fn() -> K>,
}

pub type RunId = Id<RunKind>;
pub type HandleId = Id<HandleKind>;
pub type ContainerId = Id<ContainerKind>;

impl<K> Id<K> {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self {
            value: Arc::from(value.as_ref()),
            _kind: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

impl RunId {
    /// `<utc timestamp>-<pid>-<sequence>`; unique within a process even for
    /// runs started in the same millisecond.
    pub fn generate() -> Self {
        let seq = RUN_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed);
        Self::new(format!(
            "{}-{}-{}",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            std::process::id(),
            seq
        ))
    }
}

impl ContainerId {
    /// The 12-character prefix runtimes print in listings.
    pub fn short(&self) -> &str {
        self.value.get(..12).unwrap_or(&self.value)
    }
}

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            _kind: PhantomData,
        }
    }
}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K> Borrow<str> for Id<K> {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl<K> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:?})", &*self.value)
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<K> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, K> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
