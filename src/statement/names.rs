use std::collections::HashMap;

/// Column aliases the engines refuse, and the safe names used instead.
///
/// Matching is exact and case-sensitive for the built-in entries (`comment`,
/// `date`) and for those added with [`RestrictedNames::register`]. A single
/// leading `?` (SPARQL variable marker) is ignored for both.
#[derive(Debug, Clone, Default)]
pub struct RestrictedNames {
    custom: HashMap<String, String>,
}

const DEFAULT_RESTRICTED: &[(&str, &str)] = &[("comment", "comme"), ("date", "dat")];

impl RestrictedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, replacement: impl Into<String>) {
        let name = name.into();
        let key = name.strip_prefix('?').unwrap_or(&name).to_string();
        self.custom.insert(key, replacement.into());
    }

    /// Returns the safe replacement for `alias`, if it is restricted.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        let bare = alias.strip_prefix('?').unwrap_or(alias);
        if let Some(replacement) = self.custom.get(bare) {
            return Some(replacement.as_str());
        }
        DEFAULT_RESTRICTED
            .iter()
            .find(|(name, _)| *name == bare)
            .map(|(_, replacement)| *replacement)
    }

    /// Rewrites a projection alias, dropping the SPARQL `?` marker.
    pub fn rewrite(&self, alias: &str) -> String {
        match self.lookup(alias) {
            Some(replacement) => replacement.to_string(),
            None => alias.strip_prefix('?').unwrap_or(alias).to_string(),
        }
    }
}
