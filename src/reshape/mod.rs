pub mod ascent;
pub mod skills;
pub mod tidy;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::error::StoreResult;
use crate::record::{Field, RawRow};
use crate::store::{self, Stamp, TableRow};
use ascent::AscentRow;
use skills::SkillRow;

/// Character dimension table: the raw record without skill and ascension
/// blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct CharRow {
    pub name: String,
    pub scanned: String,
    pub url: String,
    pub char_type: Field,
    pub rarity: Field,
}

impl TableRow for CharRow {
    fn headers() -> Vec<String> {
        ["char", "scanned", "url", "type", "rarity"].map(String::from).to_vec()
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.scanned.clone(),
            self.url.clone(),
            self.char_type.as_output().to_string(),
            self.rarity.as_output().to_string(),
        ]
    }
}

pub struct Tables {
    pub chars: Vec<CharRow>,
    pub skills: Vec<SkillRow>,
    pub ascent: Vec<AscentRow>,
}

/// Reshape the flat per-character table into the three normalized tables.
pub fn reshape(rows: &[RawRow]) -> Tables {
    let chars = rows
        .iter()
        .map(|row| CharRow {
            name: tidy::char_key(&row.name),
            scanned: row.record.scanned.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            url: tidy::text(&row.record.url),
            char_type: tidy::field(row.record.char_type.clone()),
            rarity: tidy::field(row.record.rarity.clone()),
        })
        .collect();

    Tables {
        chars,
        skills: skills::extract(rows),
        ascent: ascent::extract(rows),
    }
}

/// Write all three tables under one stamp. Each table is written on its
/// own; a failure is reported after the others finished.
pub fn write_tables(dir: &Path, tables: &Tables, stamp: Stamp) -> Result<Vec<PathBuf>> {
    let (chars, (ascent, skills)) = rayon::join(
        || store::write_table(dir, "table_char", stamp, &tables.chars),
        || {
            rayon::join(
                || store::write_table(dir, "table_ascent", stamp, &tables.ascent),
                || store::write_table(dir, "table_skills", stamp, &tables.skills),
            )
        },
    );

    let outcomes: [(&str, StoreResult<PathBuf>); 3] = [
        ("table_char", chars),
        ("table_ascent", ascent),
        ("table_skills", skills),
    ];

    let mut written = Vec::with_capacity(outcomes.len());
    let mut failed = Vec::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(path) => {
                info!("Saved {}", path.display());
                written.push(path);
            }
            Err(e) => {
                error!("Writing {} failed: {}", name, e);
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        bail!("failed to write {}", failed.join(", "));
    }
    Ok(written)
}

fn out(cell: &Option<Field>) -> String {
    cell.as_ref().map(|f| f.as_output().to_string()).unwrap_or_default()
}
