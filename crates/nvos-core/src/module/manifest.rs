use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Descriptive metadata attached to a loadable unit.
///
/// Used for identification and diagnostics only; module load order is decided
/// by the caller, never by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleManifest {
    name: Cow<'static, str>,
    version: Cow<'static, str>,
    author: Cow<'static, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<Cow<'static, str>>,
}

impl ModuleManifest {
    /// Creates a manifest from static strings, usable in `static` items.
    pub const fn new(
        name: &'static str,
        version: &'static str,
        author: &'static str,
        description: Option<&'static str>,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            version: Cow::Borrowed(version),
            author: Cow::Borrowed(author),
            description: match description {
                Some(d) => Some(Cow::Borrowed(d)),
                None => None,
            },
        }
    }

    /// Creates a manifest from owned strings.
    pub fn from_parts(
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            version: Cow::Owned(version.into()),
            author: Cow::Owned(author.into()),
            description: description.map(Cow::Owned),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl fmt::Display for ModuleManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static STATIC_MANIFEST: ModuleManifest =
        ModuleManifest::new("Greeter", "1.2.0", "NVOS Contributors", None);

    #[test]
    fn test_static_and_owned_manifests_compare_equal() {
        let owned = ModuleManifest::from_parts("Greeter", "1.2.0", "NVOS Contributors", None);
        assert_eq!(STATIC_MANIFEST, owned);
        assert_eq!(STATIC_MANIFEST.to_string(), "Greeter 1.2.0");
        assert_eq!(STATIC_MANIFEST.description(), None);
    }

    #[test]
    fn test_manifest_deserializes_without_description() {
        let manifest: ModuleManifest = serde_json::from_value(serde_json::json!({
            "name": "Audio",
            "version": "0.3.1",
            "author": "Sound Team",
        }))
        .unwrap();
        assert_eq!(manifest.name(), "Audio");
        assert_eq!(manifest.author(), "Sound Team");
        assert!(manifest.description().is_none());
    }
}
