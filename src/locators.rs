//! Page positions the scraper reads from. Layout changes on the wiki only
//! ever need to touch this file.

/// Anchor container on the listing page; character links are the `<a>`
/// elements below it.
pub const LISTING_CONTAINER: &str =
    "/html/body/div/div[1]/div/main/div/div/main/div[1]/div[2]/div[2]/div[2]/div[2]/div[1]/div[2]";

macro_rules! article {
    ($tail:literal) => {
        concat!(
            "/html/body/div[1]/div[1]/div/main/div/div/div/div[2]/div/div/div/div/div/div/article/div[2]/div/div",
            $tail
        )
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    CharName,
    CharType,
    CharRarity,
    S1a,
    S1b,
    S2a,
    S2b,
    S3a,
    S3b,
    S4a,
    S4b,
    Ascent,
}

impl FieldName {
    pub fn key(self) -> &'static str {
        match self {
            FieldName::CharName => "char_name",
            FieldName::CharType => "char_type",
            FieldName::CharRarity => "char_rarity",
            FieldName::S1a => "s1a",
            FieldName::S1b => "s1b",
            FieldName::S2a => "s2a",
            FieldName::S2b => "s2b",
            FieldName::S3a => "s3a",
            FieldName::S3b => "s3b",
            FieldName::S4a => "s4a",
            FieldName::S4b => "s4b",
            FieldName::Ascent => "ascent",
        }
    }
}

/// Every field read from a character page, with its XPath.
pub const FIELDS: [(FieldName, &str); 12] = [
    (FieldName::CharName, article!("[1]/div/div/div/div/div[2]/div[1]/div[2]/div[1]/div/div")),
    (FieldName::CharType, article!("[1]/div/div/div/div/div[2]/div[1]/div[2]/div[2]/div/div[1]/div/div[2]/div/div")),
    (FieldName::CharRarity, article!("[1]/div/div/div/div/div[2]/div[1]/div[2]/div[2]/div/div[2]/div/div[2]/div/div")),
    (FieldName::S1a, article!("[1]/div/div/div[2]/div/div[2]/div/div[1]")),
    (FieldName::S1b, article!("[2]/div/div/div[2]/div/div[1]/div/div[1]")),
    (FieldName::S2a, article!("[1]/div/div/div[2]/div/div[2]/div/div[2]")),
    (FieldName::S2b, article!("[2]/div/div/div[2]/div/div[1]/div/div[2]")),
    (FieldName::S3a, article!("[1]/div/div/div[2]/div/div[2]/div/div[3]")),
    (FieldName::S3b, article!("[2]/div/div/div[2]/div/div[1]/div/div[3]")),
    (FieldName::S4a, article!("[1]/div/div/div[2]/div/div[2]/div/div[4]")),
    (FieldName::S4b, article!("[2]/div/div/div[2]/div/div[1]/div/div[4]")),
    (FieldName::Ascent, article!("[3]/div/div/div/div/div[2]")),
];

#[cfg(test)]
pub fn xpath(field: FieldName) -> &'static str {
    FIELDS[field as usize].1
}
