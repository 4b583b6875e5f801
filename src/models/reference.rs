//! Identities of reference targets
//!
//! A reference points either at another config object or at a mesh registry
//! entity (service, workload, namespace) or an external host.

use serde::{Serialize, Serializer};
use std::fmt;

use super::{ConfigKind, ObjectKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RefKind {
    Config(ConfigKind),
    Service,
    Workload,
    Namespace,
    /// External hostname not backed by any known service entry
    Host,
}

impl RefKind {
    pub fn object_type(&self) -> &'static str {
        match self {
            RefKind::Config(kind) => kind.object_type(),
            RefKind::Service => "service",
            RefKind::Workload => "workload",
            RefKind::Namespace => "namespace",
            RefKind::Host => "host",
        }
    }

    pub fn config_kind(&self) -> Option<ConfigKind> {
        match self {
            RefKind::Config(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl Serialize for RefKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.object_type())
    }
}

/// Reference descriptor: object type, name and namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefKey {
    #[serde(rename = "objectType")]
    pub kind: RefKind,
    pub name: String,
    pub namespace: String,
}

impl RefKey {
    pub fn new(kind: RefKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn config(kind: ConfigKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(RefKind::Config(kind), namespace, name)
    }

    pub fn service(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(RefKind::Service, namespace, name)
    }

    pub fn workload(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(RefKind::Workload, namespace, name)
    }

    pub fn host(name: impl Into<String>) -> Self {
        Self::new(RefKind::Host, "", name)
    }

    /// Namespaces are cluster-scoped; the name doubles as the namespace
    pub fn namespace(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(RefKind::Namespace, name.clone(), name)
    }

    pub fn object_key(&self) -> Option<ObjectKey> {
        self.kind
            .config_kind()
            .map(|kind| ObjectKey::new(kind, self.namespace.clone(), self.name.clone()))
    }
}

impl From<&ObjectKey> for RefKey {
    fn from(key: &ObjectKey) -> Self {
        RefKey::config(key.kind, key.namespace.clone(), key.name.clone())
    }
}

impl From<ObjectKey> for RefKey {
    fn from(key: ObjectKey) -> Self {
        RefKey::config(key.kind, key.namespace, key.name)
    }
}

impl fmt::Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.object_type(), self.namespace, self.name)
    }
}
