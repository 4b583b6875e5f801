//! Per-kind access verbs

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    List,
    Create,
    Update,
    Patch,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::List,
        Verb::Create,
        Verb::Update,
        Verb::Patch,
        Verb::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown verb: {}", s))
    }
}

/// Resource name to allowed verbs for one namespace
pub type KindPermissions = BTreeMap<String, BTreeSet<Verb>>;

/// Namespace to per-kind permissions
pub type PermissionMap = BTreeMap<String, KindPermissions>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_parse_and_serialize() {
        assert_eq!("PATCH".parse::<Verb>(), Ok(Verb::Patch));
        assert!("watch".parse::<Verb>().is_err());

        let verbs: BTreeSet<Verb> = [Verb::Delete, Verb::Get].into_iter().collect();
        assert_eq!(serde_json::to_string(&verbs).unwrap(), r#"["get","delete"]"#);
    }
}
