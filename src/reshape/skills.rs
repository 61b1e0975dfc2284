use std::sync::LazyLock;

use regex::Regex;

use super::tidy;
use crate::record::{Field, RawRow};
use crate::store::TableRow;

static UPGRADE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"技能強化效果|技能强化效果").unwrap());
static COOLDOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*冷[卻却][：:]\s*([0-9]+)\s*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct SkillRow {
    pub name: String,
    pub sname: Option<Field>,
    pub target: Option<Field>,
    pub desc: Option<Field>,
    pub upgrade: Option<Field>,
    pub slot: &'static str,
    pub cooldown: Option<u32>,
}

impl TableRow for SkillRow {
    fn headers() -> Vec<String> {
        ["char", "sname", "target", "desc", "upgrade", "type", "cooldown"]
            .map(String::from)
            .to_vec()
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            super::out(&self.sname),
            super::out(&self.target),
            super::out(&self.desc),
            super::out(&self.upgrade),
            self.slot.to_string(),
            self.cooldown.map(|c| c.to_string()).unwrap_or_default(),
        ]
    }
}

/// Four rows per character, one per skill slot, grouped by slot.
pub fn extract(rows: &[RawRow]) -> Vec<SkillRow> {
    (0..4)
        .flat_map(|slot| {
            rows.iter().map(move |row| {
                let (label, blob) = row.record.skills()[slot];
                split_skill(&row.name, label, blob)
            })
        })
        .collect()
}

/// Split one skill blob into name / target / description / upgrade effect.
pub fn split_skill(name: &str, slot: &'static str, blob: &Field) -> SkillRow {
    let key = tidy::char_key(name);
    let text = match blob {
        Field::Value(text) => text,
        Field::Failed => {
            return SkillRow {
                name: key,
                sname: Some(Field::Failed),
                target: None,
                desc: None,
                upgrade: None,
                slot,
                cooldown: None,
            };
        }
    };

    let mut parts = UPGRADE_RE.split(text);
    let pre = parts.next().unwrap_or_default();
    let mut upgrade = parts.next().map(str::to_string);

    let mut lines = pre.split('\n');
    let mut sname = lines.next().map(str::to_string);
    let target = lines.next().map(str::to_string);
    let desc = lines.next().map(str::to_string);

    let cooldown = take_cooldown(&mut sname).or_else(|| take_cooldown(&mut upgrade));

    let cell = |s: Option<String>| tidy::cell(s.map(Field::Value));
    SkillRow {
        name: key,
        sname: cell(sname),
        target: cell(target),
        desc: cell(desc),
        upgrade: cell(upgrade),
        slot,
        cooldown,
    }
}

/// Pull a trailing "冷卻：N" off `text`, returning N.
fn take_cooldown(text: &mut Option<String>) -> Option<u32> {
    let s = text.as_mut()?;
    let caps = COOLDOWN_RE.captures(s)?;
    let value = caps[1].parse().ok()?;
    let start = caps.get(0)?.start();
    s.truncate(start);
    Some(value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn value(s: &str) -> Option<Field> {
        Some(Field::Value(s.to_string()))
    }

    #[test]
    fn splits_blob() {
        let blob = Field::Value("Fireball\nEnemy\nDeals damage技能強化效果+10% damage 冷卻：5".into());
        let row = split_skill("Rudy", "s1", &blob);
        assert_eq!(
            row,
            SkillRow {
                name: "Rudy".into(),
                sname: value("Fireball"),
                target: value("Enemy"),
                desc: value("Deals damage"),
                upgrade: value("+10% damage"),
                slot: "s1",
                cooldown: Some(5),
            }
        );
    }

    #[test]
    fn cooldown_on_name_line() {
        let blob = Field::Value("守護之盾 冷却：12\n自身\n獲得護盾技能强化效果護盾+10%".into());
        let row = split_skill("魯迪", "s2", &blob);
        assert_eq!(row.sname, value("守護之盾"));
        assert_eq!(row.cooldown, Some(12));
        assert_eq!(row.upgrade, value("護盾+10%"));
    }

    #[test]
    fn short_blob_leaves_gaps() {
        let row = split_skill("魯迪", "s3", &Field::Value("被動技能".into()));
        assert_eq!(row.sname, value("被動技能"));
        assert_eq!(row.target, None);
        assert_eq!(row.desc, None);
        assert_eq!(row.upgrade, None);
        assert_eq!(row.cooldown, None);
    }

    #[test]
    fn failed_blob_marks_name() {
        let row = split_skill("魯迪", "s4", &Field::Failed);
        assert_eq!(row.sname, Some(Field::Failed));
        assert_eq!(row.cells()[1], "!!! error !!!");
        assert_eq!(row.cells()[2], "");
    }
}
