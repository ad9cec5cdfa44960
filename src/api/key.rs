//! Namespaced object identity.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace used when an object carries none.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of a namespaced cluster object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object, unique within its namespace.
    pub name: String,
}

impl ObjectKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Builds the key of an object from its metadata.
    ///
    /// Returns `None` when the metadata has no name.
    #[must_use]
    pub fn from_meta(meta: &ObjectMeta) -> Option<Self> {
        let name = meta.name.as_deref().filter(|n| !n.is_empty())?;
        let namespace = meta.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    /// Parses `namespace/name`, or a bare `name` in the default namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((ns, name)) => (ns, name),
            None => (DEFAULT_NAMESPACE, s),
        };

        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(format!("invalid object key '{s}', expected <namespace>/<name>"));
        }

        Ok(Self::new(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_namespaced_key() {
        let key: ObjectKey = "prod/web".parse().expect("valid key");
        assert_eq!(key, ObjectKey::new("prod", "web"));
        assert_eq!(key.to_string(), "prod/web");
    }

    #[test]
    fn test_parse_bare_name_uses_default_namespace() {
        let key: ObjectKey = "db".parse().expect("valid key");
        assert_eq!(key.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!("/web".parse::<ObjectKey>().is_err());
        assert!("prod/".parse::<ObjectKey>().is_err());
        assert!("a/b/c".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn test_from_meta_requires_name() {
        let meta = ObjectMeta::default();
        assert!(ObjectKey::from_meta(&meta).is_none());

        let meta = ObjectMeta {
            name: Some(String::from("web")),
            ..ObjectMeta::default()
        };
        assert_eq!(ObjectKey::from_meta(&meta), Some(ObjectKey::new("default", "web")));
    }
}
