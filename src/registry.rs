//! Concurrent object registries rebuilt from status patches.
//!
//! Each registry maps an object key to its last known state. Patches merge
//! into existing entries field by field; an entry is never replaced
//! wholesale. The merge runs while holding the map's entry for that key, so
//! two patches for the same object cannot lose each other's update.

use std::fmt;
use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::PatchError;
use crate::models::{IqStream, Panadapter};
use crate::patch::{Attributes, ObjectPatch};

/// A device object that can be reconstructed from patches.
pub trait Patchable: Clone {
    type Key: Eq + Hash + Clone + fmt::Debug;

    /// Convert the positional identifier of a patch into a registry key.
    fn key_from_id(object_id: &str) -> Result<Self::Key, PatchError>;

    /// Default state for an object seen for the first time.
    fn with_key(key: &Self::Key) -> Self;

    /// Merge recognized attributes. Returns true if any field changed.
    fn merge(&mut self, attributes: &Attributes) -> bool;
}

/// Keyed store of live object state.
pub struct Registry<T: Patchable> {
    entries: DashMap<T::Key, T>,
}

impl<T: Patchable> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T: Patchable> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<T: Patchable> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a parsed patch. Returns whether the registry changed.
    ///
    /// # Errors
    ///
    /// Returns `PatchError::InvalidIdentifier` if the object identifier is
    /// not a valid key for this registry. The registry is left untouched.
    pub fn apply_patch(&self, patch: &ObjectPatch) -> Result<bool, PatchError> {
        let key = T::key_from_id(&patch.object_id)?;
        Ok(self.apply(key, &patch.attributes))
    }

    /// Merge attributes into the entry for `key`.
    ///
    /// An unseen key gets a default entry, but only if at least one
    /// recognized attribute is present; otherwise nothing is stored.
    pub fn apply(&self, key: T::Key, attributes: &Attributes) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => occupied.get_mut().merge(attributes),
            Entry::Vacant(vacant) => {
                let mut state = T::with_key(vacant.key());
                let dirty = state.merge(attributes);
                if dirty {
                    vacant.insert(state);
                }
                dirty
            }
        }
    }

    /// Current state of one object.
    pub fn get(&self, key: &T::Key) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Patchable for Panadapter {
    type Key = String;

    fn key_from_id(object_id: &str) -> Result<String, PatchError> {
        Ok(object_id.to_string())
    }

    fn with_key(key: &String) -> Self {
        Panadapter::new(key)
    }

    fn merge(&mut self, attributes: &Attributes) -> bool {
        let mut dirty = false;

        if let Some(value) = attributes.get("center") {
            match parse_scaled(value, 6) {
                Some(center) => {
                    self.center = center;
                    dirty = true;
                }
                None => tracing::debug!("Ignoring invalid center {:?} for pan {}", value, self.id),
            }
        }

        dirty
    }
}

impl Patchable for IqStream {
    type Key = u32;

    fn key_from_id(object_id: &str) -> Result<u32, PatchError> {
        parse_stream_id(object_id)
            .ok_or_else(|| PatchError::InvalidIdentifier(object_id.to_string()))
    }

    fn with_key(key: &u32) -> Self {
        IqStream::new(*key)
    }

    fn merge(&mut self, attributes: &Attributes) -> bool {
        let mut dirty = false;

        if let Some(pan) = attributes.get("pan") {
            self.pan = pan.clone();
            dirty = true;
        }

        if let Some(value) = attributes.get("rate") {
            match value.parse() {
                Ok(rate) => {
                    self.rate = rate;
                    dirty = true;
                }
                Err(_) => tracing::debug!("Ignoring invalid rate {:?} for stream {}", value, self.id),
            }
        }

        dirty
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal stream id.
fn parse_stream_id(text: &str) -> Option<u32> {
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Parse a decimal string into an integer scaled by `10^digits`.
///
/// Works on the decimal digits directly so values like `3.792057` scale
/// exactly; extra fractional digits are truncated toward zero. Exponent
/// forms such as `1.4e1` go through `f64`.
pub(crate) fn parse_scaled(text: &str, digits: usize) -> Option<i64> {
    let text = text.trim();
    if text.contains(['e', 'E']) {
        return parse_scaled_float(text, digits);
    }

    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut scaled: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction = fraction.as_bytes();
    for position in 0..digits {
        let digit = fraction.get(position).map_or(0, |b| i64::from(b - b'0'));
        scaled = scaled.checked_mul(10)?.checked_add(digit)?;
    }

    Some(if negative { -scaled } else { scaled })
}

fn parse_scaled_float(text: &str, digits: usize) -> Option<i64> {
    let value: f64 = text.parse().ok().filter(|v: &f64| v.is_finite())?;
    let scaled = (value * 10f64.powi(i32::try_from(digits).ok()?)).trunc();
    // i64::MAX is not exactly representable; stay strictly below it.
    (scaled.abs() < i64::MAX as f64).then_some(scaled as i64)
}
