//! One-level alias groups over variable names.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::types::{Result, SlotError};

static NO_ALIASES: BTreeSet<String> = BTreeSet::new();

/// Maps every root variable to the names aliasing it, plus the reverse index
/// from alias to root. Chains collapse: an alias of an alias is recorded
/// under the original root.
#[derive(Clone, Debug, Default)]
pub struct AliasGraph {
    groups: FxHashMap<String, BTreeSet<String>>,
    roots: FxHashMap<String, String>,
}

impl AliasGraph {
    /// Registers `name` as a root with no aliases yet.
    pub fn add_root(&mut self, name: &str) {
        self.groups.entry(name.to_owned()).or_default();
    }

    /// Records `alias` under the root of `existing` and returns that root.
    pub fn add_alias(&mut self, alias: &str, existing: &str) -> Result<String> {
        let root = self.root_of(existing)?.to_owned();
        if alias != root {
            if let Some(group) = self.groups.get_mut(&root) {
                group.insert(alias.to_owned());
            }
            self.roots.insert(alias.to_owned(), root.clone());
        }
        Ok(root)
    }

    /// Resolves `name` to its root. Roots resolve to themselves.
    pub fn root_of<'a>(&'a self, name: &'a str) -> Result<&'a str> {
        if self.groups.contains_key(name) {
            return Ok(name);
        }
        self.roots
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| SlotError::AliasWithoutRoot {
                alias: name.to_owned(),
            })
    }

    /// True iff `name` is not a root.
    pub fn is_alias(&self, name: &str) -> bool {
        !self.groups.contains_key(name)
    }

    /// Aliases registered for `root`, empty if none.
    pub fn aliases_of(&self, root: &str) -> &BTreeSet<String> {
        self.groups.get(root).unwrap_or(&NO_ALIASES)
    }

    /// Root followed by all of its aliases.
    pub fn group_of(&self, name: &str) -> Result<Vec<String>> {
        let root = self.root_of(name)?;
        let mut members = Vec::with_capacity(1 + self.aliases_of(root).len());
        members.push(root.to_owned());
        members.extend(self.aliases_of(root).iter().cloned());
        Ok(members)
    }

    pub(crate) fn empty() -> &'static BTreeSet<String> {
        &NO_ALIASES
    }
}
