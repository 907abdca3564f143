//! Freeform string properties attached to a sink or input.
//!
//! Adapted from the wire-protocol property list: this crate has no
//! well-known `Prop` key enum and no wire size limits, so a plain string
//! map is enough (see `SPEC_FULL.md` §3).

use std::collections::BTreeMap;
use std::fmt;

/// Freeform string key/value metadata.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Props(BTreeMap<String, String>);

impl Props {
    /// An empty property set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a property, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets a property's value, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Removes a property, returning its previous value if any.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Iterates over all key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let mut props = Props::new();
        assert_eq!(props.get("device.description"), None);

        props.set("device.description", "Test Sink");
        assert_eq!(props.get("device.description"), Some("Test Sink"));

        assert_eq!(
            props.remove("device.description"),
            Some("Test Sink".to_string())
        );
        assert_eq!(props.get("device.description"), None);
    }

    #[test]
    fn overwrite() {
        let mut props = Props::new();
        props.set("k", "a");
        props.set("k", "b");
        assert_eq!(props.get("k"), Some("b"));
    }
}
