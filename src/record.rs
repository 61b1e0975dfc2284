use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::ERROR_SENTINEL;
use crate::locators::FieldName;

/// One extracted value: the element's text, or a marker that it could not
/// be read. Only the file formats see the sentinel string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Value(String),
    Failed,
}

impl Field {
    pub fn as_output(&self) -> &str {
        match self {
            Field::Value(s) => s,
            Field::Failed => ERROR_SENTINEL,
        }
    }

    pub fn from_output(s: String) -> Self {
        if s.trim() == ERROR_SENTINEL {
            Field::Failed
        } else {
            Field::Value(s)
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Field::Value(s) => Some(s),
            Field::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Field::Failed)
    }

    /// Concatenate two sub-segments; failed if either side failed.
    pub fn join(&self, other: &Field) -> Field {
        match (self, other) {
            (Field::Value(a), Field::Value(b)) => Field::Value(format!("{a}{b}")),
            _ => Field::Failed,
        }
    }

    pub fn map(self, f: impl FnOnce(&str) -> String) -> Field {
        match self {
            Field::Value(s) => Field::Value(f(&s)),
            Field::Failed => Field::Failed,
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_output())
    }
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Field::from_output)
    }
}

/// Raw field set of one character page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub scanned: NaiveDateTime,
    pub url: String,
    #[serde(rename = "type")]
    pub char_type: Field,
    pub rarity: Field,
    pub s1: Field,
    pub s2: Field,
    pub s3: Field,
    pub s4: Field,
    pub ascent: Field,
}

impl Record {
    /// Assemble a record from the per-locator values of one page visit.
    /// Missing entries count as failed.
    pub fn from_fields(
        url: &str,
        scanned: NaiveDateTime,
        fields: &HashMap<FieldName, Field>,
    ) -> Self {
        let get = |name: FieldName| fields.get(&name).cloned().unwrap_or(Field::Failed);
        let skill = |a: FieldName, b: FieldName| get(a).join(&get(b));

        Record {
            scanned,
            url: url.to_string(),
            char_type: get(FieldName::CharType),
            rarity: get(FieldName::CharRarity),
            s1: skill(FieldName::S1a, FieldName::S1b),
            s2: skill(FieldName::S2a, FieldName::S2b),
            s3: skill(FieldName::S3a, FieldName::S3b),
            s4: skill(FieldName::S4a, FieldName::S4b),
            ascent: get(FieldName::Ascent),
        }
    }

    /// Skill blobs with their slot labels, in slot order.
    pub fn skills(&self) -> [(&'static str, &Field); 4] {
        [("s1", &self.s1), ("s2", &self.s2), ("s3", &self.s3), ("s4", &self.s4)]
    }
}

/// Character name → record; the unit written to a raw backup.
pub type Snapshot = BTreeMap<String, Record>;

/// One row of the flat table read back from a raw backup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub name: String,
    pub record: Record,
}
