//! Output of one collection pass

use std::collections::{BTreeMap, BTreeSet};

use crate::kube::Scope;
use crate::models::{ConfigKind, ConfigList, ConfigRef, Diagnostic, MeshRegistry, ObjectKey};

/// Everything a request collected, keyed by namespace
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedState {
    pub scope: Scope,
    pub lists: BTreeMap<String, ConfigList>,
    pub registry: MeshRegistry,
    fetched: BTreeSet<(String, ConfigKind)>,
}

impl CollectedState {
    /// Empty state covering `namespaces`
    pub fn new<I, S>(scope: Scope, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lists = namespaces
            .into_iter()
            .map(|ns| {
                let ns = ns.into();
                (ns.clone(), ConfigList::new(ns))
            })
            .collect();
        Self {
            scope,
            lists,
            registry: MeshRegistry::default(),
            fetched: BTreeSet::new(),
        }
    }

    pub fn list(&self, namespace: &str) -> Option<&ConfigList> {
        self.lists.get(namespace)
    }

    pub fn list_mut(&mut self, namespace: &str) -> Option<&mut ConfigList> {
        self.lists.get_mut(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    pub fn in_scope(&self, namespace: &str) -> bool {
        self.lists.contains_key(namespace)
    }

    pub fn mark_fetched(&mut self, namespace: &str, kind: ConfigKind) {
        self.fetched.insert((namespace.to_string(), kind));
    }

    /// Whether `kind` was listed successfully in `namespace`
    pub fn kind_fetched(&self, namespace: &str, kind: ConfigKind) -> bool {
        self.fetched.contains(&(namespace.to_string(), kind))
    }

    /// Record a diagnostic in one namespace, or in every namespace when `None`
    pub fn record(&mut self, namespace: Option<&str>, diagnostic: Diagnostic) {
        match namespace {
            Some(ns) => {
                if let Some(list) = self.lists.get_mut(ns) {
                    list.diagnostics.push(diagnostic);
                }
            }
            None => {
                for list in self.lists.values_mut() {
                    list.diagnostics.push(diagnostic.clone());
                }
            }
        }
    }

    /// All objects, namespaces in name order, kinds in kind order
    pub fn objects(&self) -> Vec<ConfigRef<'_>> {
        self.lists.values().flat_map(|list| list.objects()).collect()
    }

    /// All objects of one kind across the collected namespaces
    pub fn objects_of(&self, kind: ConfigKind) -> Vec<ConfigRef<'_>> {
        self.lists
            .values()
            .flat_map(|list| list.objects_of(kind))
            .collect()
    }

    pub fn find(&self, key: &ObjectKey) -> Option<ConfigRef<'_>> {
        self.lists
            .get(&key.namespace)
            .and_then(|list| list.find(key.kind, &key.name))
    }

    pub fn into_lists(self) -> BTreeMap<String, ConfigList> {
        self.lists
    }
}
