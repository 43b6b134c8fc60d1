//! Enum descriptors.

use std::collections::BTreeMap;

/// An enum type: a name → integer value mapping.
///
/// On the wire enum fields are plain `int32` varints; unknown numbers are
/// preserved by the decoder, so the mapping is advisory for readers.
#[derive(Debug, Clone, Default)]
pub struct Enum {
    /// Declared values by name. Aliases (two names sharing a number) are
    /// permitted when `allow_alias` is set.
    pub values: BTreeMap<String, i32>,
    /// Whether the schema declared `option allow_alias = true`.
    pub allow_alias: bool,
}

impl Enum {
    /// The number for a declared value name.
    pub fn value(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
    }

    /// The first declared name carrying `number`, if any.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, &n)| n == number)
            .map(|(name, _)| name.as_str())
    }

    /// True when two distinct names share a number.
    pub fn has_aliases(&self) -> bool {
        let mut seen = std::collections::BTreeSet::new();
        self.values.values().any(|n| !seen.insert(*n))
    }
}
