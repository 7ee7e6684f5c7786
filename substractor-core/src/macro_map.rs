//! macro_map.rs - Insertion-ordered macro name to value maps.
//!
//! Extraction results keep macros in the order they were first seen in the
//! pattern. Inserting a name that already exists replaces its value in place.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered mapping from macro name to an extracted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macros<V> {
    entries: Vec<(String, V)>,
}

/// Result of a single-occurrence extraction.
pub type MacroMap = Macros<String>;

/// Result of an all-occurrences extraction.
pub type MacroListMap = Macros<Vec<String>>;

impl<V> Default for Macros<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> Macros<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts or overwrites `name`, keeping its first position.
    pub fn insert(&mut self, name: impl Into<String>, value: V) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<V: Default> Macros<V> {
    /// Returns the value for `name`, inserting a default one first if absent.
    pub fn entry_or_default(&mut self, name: &str) -> &mut V {
        let index = match self.entries.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.entries.push((name.to_string(), V::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }
}

impl<V> IntoIterator for Macros<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V, K: Into<String>> FromIterator<(K, V)> for Macros<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Macros::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl<'a, V: PartialEq<U>, U> PartialEq<[(&'a str, U)]> for Macros<V> {
    /// Equal when the entries match the pairs name for name, in order.
    fn eq(&self, other: &[(&'a str, U)]) -> bool {
        self.entries.len() == other.len()
            && self
                .entries
                .iter()
                .zip(other)
                .all(|((name, value), (other_name, other_value))| {
                    name == other_name && value == other_value
                })
    }
}

impl<'a, V: PartialEq<U>, U> PartialEq<Vec<(&'a str, U)>> for Macros<V> {
    fn eq(&self, other: &Vec<(&'a str, U)>) -> bool {
        *self == other[..]
    }
}

impl<'a, V: PartialEq<U>, U, const N: usize> PartialEq<[(&'a str, U); N]> for Macros<V> {
    fn eq(&self, other: &[(&'a str, U); N]) -> bool {
        *self == other[..]
    }
}

impl<V: Serialize> Serialize for Macros<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
