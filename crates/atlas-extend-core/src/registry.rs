use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

/// Outcome of [`SlotRegistry::reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Binding {
    /// The name now maps to this slot (new, or unchanged).
    Bound(u32),
    /// The name already mapped elsewhere; `current` replaced `previous`.
    Conflicted { previous: u32, current: u32 },
}

impl Binding {
    /// Slot the name maps to after the call.
    pub fn index(&self) -> u32 {
        match *self {
            Binding::Bound(i) => i,
            Binding::Conflicted { current, .. } => current,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Binding::Conflicted { .. })
    }
}

/// Symbolic texture names to stable slot indices, for one target.
///
/// Rebinding a name to a different slot is allowed and reported as
/// [`Binding::Conflicted`]; the last binding wins.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
    slots: BTreeMap<String, u32>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: &str, index: u32) -> Binding {
        match self.slots.insert(name.to_string(), index) {
            Some(previous) if previous != index => {
                warn!(name, previous, current = index, "overwriting texture key");
                Binding::Conflicted {
                    previous,
                    current: index,
                }
            }
            _ => Binding::Bound(index),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.slots.get(name).copied()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.slots.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Resolve a comma-separated list of names and numbers to numbers.
    ///
    /// Strings made only of digits and commas are returned unchanged. Names
    /// that are not bound are left in place and reported.
    pub fn resolve_list(&self, value: &str) -> Resolved {
        if value.chars().all(|c| c.is_ascii_digit() || c == ',') {
            return Resolved {
                value: value.to_string(),
                unresolved: Vec::new(),
            };
        }
        let mut unresolved = Vec::new();
        let parts: Vec<String> = value
            .split(',')
            .map(|part| {
                let part = part.trim();
                if part.is_empty() || part.chars().all(|c| c.is_ascii_digit()) {
                    return part.to_string();
                }
                match self.lookup(part) {
                    Some(i) => i.to_string(),
                    None => {
                        unresolved.push(part.to_string());
                        part.to_string()
                    }
                }
            })
            .collect();
        Resolved {
            value: parts.join(","),
            unresolved,
        }
    }
}

/// Result of [`SlotRegistry::resolve_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub unresolved: Vec<String>,
}

impl Resolved {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_mixes_names_and_numbers() {
        let mut reg = SlotRegistry::new();
        reg.reserve("stone", 3);
        reg.reserve("moss", 41);
        let r = reg.resolve_list("stone, 7,moss");
        assert_eq!(r.value, "3,7,41");
        assert!(r.is_complete());

        let r = reg.resolve_list("1,2,3");
        assert_eq!(r.value, "1,2,3");

        let r = reg.resolve_list("stone,ghost");
        assert_eq!(r.value, "3,ghost");
        assert_eq!(r.unresolved, vec!["ghost".to_string()]);
    }
}
