//! Validation verdicts

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{ConfigKind, RefKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// A failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// Location of the offending field, e.g. `spec/http[0]/route[1]/destination/host`
    pub path: String,
}

impl Check {
    pub fn error(code: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            severity: Severity::Error,
            path: path.into(),
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, path)
        }
    }
}

fn serialize_object_type<S: Serializer>(kind: &ConfigKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.object_type())
}

/// Verdict for one config object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEntry {
    pub name: String,
    pub namespace: String,
    #[serde(serialize_with = "serialize_object_type")]
    pub object_type: ConfigKind,
    pub valid: bool,
    pub checks: Vec<Check>,
    pub references: Vec<RefKey>,
}

impl ValidationEntry {
    pub fn new(object_type: ConfigKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            object_type,
            valid: true,
            checks: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn self_ref(&self) -> RefKey {
        RefKey::config(self.object_type, self.namespace.clone(), self.name.clone())
    }

    /// Record a failure; `implicated` are the other objects involved
    pub fn fail(&mut self, check: Check, implicated: impl IntoIterator<Item = RefKey>) {
        self.valid = false;
        self.checks.push(check);
        let mut added = false;
        for reference in implicated {
            added = true;
            self.add_reference(reference);
        }
        if !added {
            let me = self.self_ref();
            self.add_reference(me);
        }
    }

    /// Append a reference unless it is already listed
    pub fn add_reference(&mut self, reference: RefKey) {
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
    }

    /// Highest severity among the failed checks
    pub fn severity(&self) -> Option<Severity> {
        self.checks.iter().map(|c| c.severity).min()
    }
}

type EntryKey = (ConfigKind, String, String);

fn entry_key(entry: &ValidationEntry) -> EntryKey {
    (entry.object_type, entry.namespace.clone(), entry.name.clone())
}

/// Ordered validation entries with lookup by `(objectType, namespace, name)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    entries: Vec<ValidationEntry>,
    index: HashMap<EntryKey, usize>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the same key
    pub fn insert(&mut self, entry: ValidationEntry) {
        let key = entry_key(&entry);
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn lookup(&self, kind: ConfigKind, namespace: &str, name: &str) -> Option<&ValidationEntry> {
        self.index
            .get(&(kind, namespace.to_string(), name.to_string()))
            .map(|&pos| &self.entries[pos])
    }

    /// First entry for `(kind, name)`; unambiguous within one namespace
    pub fn get(&self, kind: ConfigKind, name: &str) -> Option<&ValidationEntry> {
        self.entries
            .iter()
            .find(|e| e.object_type == kind && e.name == name)
    }

    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn invalid(&self) -> impl Iterator<Item = &ValidationEntry> {
        self.entries.iter().filter(|e| !e.valid)
    }

    /// Keep only entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&ValidationEntry) -> bool) {
        self.entries.retain(|e| keep(e));
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (entry_key(e), pos))
            .collect();
    }

    /// Partition into one report per namespace, keeping entry order
    pub fn split_by_namespace(self) -> BTreeMap<String, ValidationReport> {
        let mut reports: BTreeMap<String, ValidationReport> = BTreeMap::new();
        for entry in self.entries {
            reports.entry(entry.namespace.clone()).or_default().insert(entry);
        }
        reports
    }

    /// Move the entries of `other` into this report
    pub fn merge(&mut self, other: ValidationReport) {
        for entry in other.entries {
            self.insert(entry);
        }
    }
}

impl IntoIterator for ValidationReport {
    type Item = ValidationEntry;
    type IntoIter = std::vec::IntoIter<ValidationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<ValidationEntry> for ValidationReport {
    fn from_iter<I: IntoIterator<Item = ValidationEntry>>(iter: I) -> Self {
        let mut report = ValidationReport::new();
        for entry in iter {
            report.insert(entry);
        }
        report
    }
}

impl Serialize for ValidationReport {
    /// `{objectType: {name: entry}}`
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut grouped: BTreeMap<&str, BTreeMap<&str, &ValidationEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped
                .entry(entry.object_type.object_type())
                .or_default()
                .insert(entry.name.as_str(), entry);
        }
        let mut map = serializer.serialize_map(Some(grouped.len()))?;
        for (object_type, entries) in &grouped {
            map.serialize_entry(object_type, entries)?;
        }
        map.end()
    }
}
