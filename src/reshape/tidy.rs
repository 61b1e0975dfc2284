use std::sync::LazyLock;

use regex::Regex;

use crate::convert::to_traditional;
use crate::record::Field;

/// Full-width parentheses anywhere, plus the leading run of space, dash,
/// newline and `】`.
static CLEANUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"（|）|^[ \-\n】]*").unwrap());

pub fn text(s: &str) -> String {
    CLEANUP_RE.replace_all(&to_traditional(s), "").into_owned()
}

pub fn field(f: Field) -> Field {
    f.map(text)
}

pub fn cell(f: Option<Field>) -> Option<Field> {
    f.map(field)
}

/// Character key: first whitespace-separated token.
pub fn char_key(name: &str) -> String {
    name.split_whitespace().next().unwrap_or_default().to_string()
}
