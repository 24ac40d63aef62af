//! Entity identifiers
//!
//! Ids are strings everywhere. Stored collections contain both numeric ids
//! (users) and prefixed string ids (everything else); both deserialize into
//! `Id`, so comparisons are exact string comparisons.

use chrono::Utc;
use rand::Rng;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value for ids assigned by max+1
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or integer id")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        if v.trim().is_empty() {
            return Err(E::custom("empty id"));
        }
        Ok(Id(v.trim().to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
        Ok(Id(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
        if v < 0 {
            return Err(E::custom(format!("negative id {}", v)));
        }
        Ok(Id(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Id, E> {
        if v.fract() != 0.0 || v < 0.0 {
            return Err(E::custom(format!("non-integer id {}", v)));
        }
        Ok(Id((v as u64).to_string()))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}

/// `<PREFIX><millis><3 random digits>`, retried until `taken` says it's free
pub fn generate_prefixed(prefix: &str, taken: impl Fn(&str) -> bool) -> Id {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!(
            "{}{}{:03}",
            prefix,
            Utc::now().timestamp_millis(),
            rng.gen_range(0..1000)
        );
        if !taken(&candidate) {
            return Id(candidate);
        }
    }
}

/// Max numeric id + 1; non-numeric ids are ignored
pub fn next_numeric<'a>(ids: impl IntoIterator<Item = &'a Id>) -> Id {
    let max = ids.into_iter().filter_map(Id::as_number).max().unwrap_or(0);
    Id::from(max + 1)
}
