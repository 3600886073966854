use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::buf::NetBuf;
use crate::error::{BufError, Result};

/// A namespaced name of the form `namespace:path`.
///
/// Namespaces may contain `[a-z0-9_.-]`; paths may additionally contain
/// `/`. Both parts must be non-empty. Channels are identified on the wire
/// by their identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    namespace: String,
    path: String,
}

fn valid_namespace_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

fn valid_path_char(c: char) -> bool {
    valid_namespace_char(c) || c == '/'
}

impl Identifier {
    /// Build an identifier from its parts, validating both.
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let path = path.into();
        if namespace.is_empty() || !namespace.chars().all(valid_namespace_char) {
            return Err(BufError::InvalidIdentifier(format!(
                "non [a-z0-9_.-] character in namespace of {namespace}:{path}"
            )));
        }
        if path.is_empty() || !path.chars().all(valid_path_char) {
            return Err(BufError::InvalidIdentifier(format!(
                "non [a-z0-9/._-] character in path of {namespace}:{path}"
            )));
        }
        Ok(Self { namespace, path })
    }

    /// Parse `namespace:path`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Err(BufError::InvalidIdentifier(format!(
                "missing namespace separator in {s}"
            ))),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = BufError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl NetBuf {
    pub fn write_identifier(&mut self, id: &Identifier) -> Result<()> {
        self.write_string(&id.to_string())
    }

    /// Read and validate an identifier.
    pub fn read_identifier(&mut self) -> Result<Identifier> {
        let raw = self.read_string()?;
        Identifier::parse(&raw)
    }

    /// Read an identifier, yielding `None` if the string is not a valid
    /// identifier. Truncated or malformed strings still fail.
    pub fn read_identifier_opt(&mut self) -> Result<Option<Identifier>> {
        let raw = self.read_string()?;
        Ok(Identifier::parse(&raw).ok())
    }
}
