//! Domain object identity.
//!
//! Every object the engine deals with (conditions, telemetry points, mean
//! objects) is addressed by a namespace + key pair. The key-string form
//! `namespace:key` is what configurations use to reference other objects.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespaced identifier of a domain object.
///
/// # Examples
///
/// ```
/// use telemetry_conditions::Identifier;
///
/// let id = Identifier::new("example.taxonomy", "pwr-1");
/// assert_eq!(id.to_key_string(), "example.taxonomy:pwr-1");
/// assert_eq!(Identifier::parse_key_string("example.taxonomy:pwr-1"), id);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    /// Namespace; empty for un-namespaced objects.
    #[serde(default)]
    pub namespace: String,
    /// Key, unique within the namespace.
    pub key: String,
}

impl Identifier {
    /// Creates an identifier from a namespace and a key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Creates an identifier with an empty namespace.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self::new(String::new(), key)
    }

    /// Returns the key-string form.
    ///
    /// Colons inside the namespace are escaped as `\:` so the first
    /// unescaped colon always separates namespace from key.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        if self.namespace.is_empty() {
            return self.key.clone();
        }
        format!("{}:{}", self.namespace.replace(':', "\\:"), self.key)
    }

    /// Parses a key-string produced by [`Identifier::to_key_string`].
    #[must_use]
    pub fn parse_key_string(key_string: &str) -> Self {
        let mut namespace = String::new();
        let mut chars = key_string.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            match ch {
                '\\' if matches!(chars.peek(), Some((_, ':'))) => {
                    namespace.push(':');
                    chars.next();
                }
                ':' => {
                    return Self::new(namespace, &key_string[idx + 1..]);
                }
                other => namespace.push(other),
            }
        }

        Self::from_key(namespace)
    }

    /// Returns true if the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key_string())
    }
}

impl FromStr for Identifier {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_key_string(s))
    }
}
