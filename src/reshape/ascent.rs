use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::tidy;
use crate::record::{Field, RawRow};
use crate::store::TableRow;

pub const MAX_STAGES: usize = 12;

static STAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"突破[0-9]{1,2}").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct AscentRow {
    pub name: String,
    pub stages: [Option<Field>; MAX_STAGES],
}

impl TableRow for AscentRow {
    fn headers() -> Vec<String> {
        std::iter::once("char".to_string())
            .chain((1..=MAX_STAGES).map(|n| format!("ascent {n}")))
            .collect()
    }

    fn cells(&self) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(self.stages.iter().map(super::out))
            .collect()
    }
}

pub fn extract(rows: &[RawRow]) -> Vec<AscentRow> {
    rows.iter()
        .map(|row| split_stages(&row.name, &row.record.ascent))
        .collect()
}

/// Split an ascension blob on its "突破N" markers. Text before the first
/// marker is dropped; stages past the twelfth are ignored.
pub fn split_stages(name: &str, blob: &Field) -> AscentRow {
    let mut stages: [Option<Field>; MAX_STAGES] = Default::default();
    match blob {
        Field::Failed => stages[0] = Some(Field::Failed),
        Field::Value(text) => {
            let segments: Vec<&str> = STAGE_RE.split(text).skip(1).collect();
            if segments.len() > MAX_STAGES {
                debug!("{}: {} ascension stages, keeping {}", name, segments.len(), MAX_STAGES);
            }
            for (slot, segment) in stages.iter_mut().zip(segments) {
                *slot = Some(Field::Value(tidy::text(segment)));
            }
        }
    }
    AscentRow {
        name: tidy::char_key(name),
        stages,
    }
}
