use std::collections::HashMap;

use anyhow::Result;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::browser::{Browser, ScopedSession};
use crate::convert::to_traditional;
use crate::locators::{FieldName, FIELDS};
use crate::record::{Field, Record, Snapshot};

/// Visit one character page and return its record keyed by character name.
///
/// Each field is read on its own: a missing element marks that field as
/// failed and the rest of the page is still read. Only a session that cannot
/// be opened or navigated is an error.
pub async fn extract_page<B: Browser + ?Sized>(browser: &B, url: &str) -> Result<Snapshot> {
    let session = ScopedSession::open(browser, url).await?;
    let fields = read_fields(&session, url).await;
    if let Err(e) = session.close().await {
        warn!("Closing session for {} failed: {:#}", url, e);
    }

    let name = character_name(fields.get(&FieldName::CharName));
    let record = Record::from_fields(url, Local::now().naive_local(), &fields);

    info!("{} completed.", name);
    Ok(Snapshot::from([(name, record)]))
}

async fn read_fields(session: &ScopedSession, url: &str) -> HashMap<FieldName, Field> {
    let mut fields = HashMap::with_capacity(FIELDS.len());
    for (name, xpath) in FIELDS {
        let field = match session.text(xpath).await {
            Ok(text) => Field::Value(to_traditional(&text)),
            Err(e) => {
                debug!("{} unreadable on {}: {:#}", name.key(), url, e);
                Field::Failed
            }
        };
        fields.insert(name, field);
    }
    fields
}

/// First space-separated token of the name field; empty if it failed.
fn character_name(field: Option<&Field>) -> String {
    field
        .and_then(Field::value)
        .and_then(|s| s.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeBrowser, FakePage};
    use crate::locators::xpath;

    const URL: &str = "https://wiki.example/c/rudy";

    fn full_page() -> FakePage {
        FakePage::default()
            .text(xpath(FieldName::CharName), "鲁迪 Rudy")
            .text(xpath(FieldName::CharType), "攻击型")
            .text(xpath(FieldName::CharRarity), "传说")
            .text(xpath(FieldName::S1a), "守护之盾\n自身\n")
            .text(xpath(FieldName::S1b), "技能强化效果 护盾+10%")
            .text(xpath(FieldName::S2a), "a2")
            .text(xpath(FieldName::S2b), "b2")
            .text(xpath(FieldName::S3a), "a3")
            .text(xpath(FieldName::S3b), "b3")
            .text(xpath(FieldName::S4a), "a4")
            .text(xpath(FieldName::S4b), "b4")
            .text(xpath(FieldName::Ascent), "突破1 攻击+5%突破2 防御+5%")
    }

    #[tokio::test]
    async fn keyed_by_first_token() {
        let browser = FakeBrowser::default().page(URL, full_page());
        let snapshot = extract_page(&browser, URL).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        let record = &snapshot["魯迪"];
        assert_eq!(record.url, URL);
        assert_eq!(record.char_type, Field::Value("攻擊型".into()));
        assert_eq!(record.s1, Field::Value("守護之盾\n自身\n技能強化效果 護盾+10%".into()));
        assert_eq!(record.s2, Field::Value("a2b2".into()));
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn failure_stays_in_its_field() {
        let mut page = full_page();
        page.texts.remove(xpath(FieldName::CharRarity));
        page.texts.remove(xpath(FieldName::S3b));
        let browser = FakeBrowser::default().page(URL, page);

        let snapshot = extract_page(&browser, URL).await.unwrap();
        let record = &snapshot["魯迪"];
        assert!(record.rarity.is_failed());
        assert!(record.s3.is_failed());
        assert!(!record.s4.is_failed());
        assert!(!record.ascent.is_failed());
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn failed_name_keys_empty() {
        let mut page = full_page();
        page.texts.remove(xpath(FieldName::CharName));
        let browser = FakeBrowser::default().page(URL, page);

        let snapshot = extract_page(&browser, URL).await.unwrap();
        assert!(snapshot.contains_key(""));
        assert_eq!(browser.closed(), 1);
    }

    #[tokio::test]
    async fn unreachable_page_is_an_error() {
        let browser = FakeBrowser::default();
        assert!(extract_page(&browser, URL).await.is_err());
        assert_eq!(browser.closed(), 0);
    }
}
