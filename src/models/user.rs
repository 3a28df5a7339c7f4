use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use super::credit::{self, Credit};

/// Username -> record. Ordered so the store file diffs cleanly between writes.
pub type UserCollection = BTreeMap<String, User>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    /// bcrypt hash. Records written before hashing was introduced hold plaintext here
    /// until their next successful login. Empty when the record has none, which
    /// never matches.
    #[serde(default)]
    pub password: String,
    // Backfilled to 0 for records created before credit existed, or stored as null.
    #[serde(default, deserialize_with = "credit::null_as_zero")]
    pub credit: Credit,
    // Unknown attributes survive a rewrite untouched.
    #[serde(flatten, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(password_hash: String) -> Self {
        Self {
            password: password_hash,
            credit: Credit::default(),
            extra: Map::new(),
        }
    }
}
