//! Rate documents and the daily/dynamic upstream XML schemas they map to.

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::charset;
use crate::error::FeedError;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Daily,
    Dynamic,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "NumCode", skip_serializing_if = "Option::is_none")]
    pub num_code: Option<String>,
    #[serde(rename = "CharCode", skip_serializing_if = "Option::is_none")]
    pub char_code: Option<String>,
    #[serde(rename = "Nominal")]
    pub nominal: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "VunitRate", skip_serializing_if = "Option::is_none")]
    pub vunit_rate: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RateDocument {
    #[serde(skip)]
    pub kind: FeedKind,
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "DateRange1", skip_serializing_if = "Option::is_none")]
    pub date_range1: Option<String>,
    #[serde(rename = "DateRange2", skip_serializing_if = "Option::is_none")]
    pub date_range2: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ValCurs")]
    pub entries: Vec<RateEntry>,
}

impl RateDocument {
    /// Document with no entries and blank required attributes, served when the upstream fails.
    pub fn empty(kind: FeedKind) -> Self {
        let blank = || Some(String::new());
        match kind {
            FeedKind::Daily => RateDocument {
                kind,
                id: None,
                date: blank(),
                date_range1: None,
                date_range2: None,
                name: String::new(),
                entries: Vec::new(),
            },
            FeedKind::Dynamic => RateDocument {
                kind,
                id: None,
                date: None,
                date_range1: blank(),
                date_range2: blank(),
                name: String::new(),
                entries: Vec::new(),
            },
        }
    }

    /// Parses a feed, transcoding it from the charset named in its XML declaration.
    pub fn decode(kind: FeedKind, bytes: &[u8]) -> Result<Self, FeedError> {
        let result: Result<Self, FeedError> = decode_text(bytes).and_then(|text| match kind {
            FeedKind::Daily => Ok(quick_xml::de::from_str::<DailyCurs>(&text)?.into()),
            FeedKind::Dynamic => Ok(quick_xml::de::from_str::<DynamicCurs>(&text)?.into()),
        });

        match result {
            Ok(doc) => {
                doc.log_summary();
                Ok(doc)
            }
            Err(err) => {
                warn!("Failed to decode {:?} feed: {}", kind, err);
                Err(err)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, quick_xml::SeError> {
        let body = match self.kind {
            FeedKind::Daily => quick_xml::se::to_string(&DailyCurs::from(self))?,
            FeedKind::Dynamic => quick_xml::se::to_string(&DynamicCurs::from(self))?,
        };
        Ok(format!("{}{}", XML_DECLARATION, body).into_bytes())
    }

    fn log_summary(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        match self.kind {
            FeedKind::Daily => debug!("Date: {}", self.date.as_deref().unwrap_or_default()),
            FeedKind::Dynamic => debug!(
                "Dates: {} - {}",
                self.date_range1.as_deref().unwrap_or_default(),
                self.date_range2.as_deref().unwrap_or_default()
            ),
        }
        for entry in &self.entries {
            let code = entry.char_code.as_deref().unwrap_or(&entry.id);
            match &entry.date {
                Some(date) => debug!("{} {}: {}", date, code, entry.value),
                None => debug!("{}: {}", code, entry.value),
            }
        }
    }
}

fn decode_text(bytes: &[u8]) -> Result<std::borrow::Cow<'_, str>, FeedError> {
    let charset = declared_charset(bytes)?;
    charset::decode(charset.as_deref(), bytes)
}

/// Reads the `encoding` attribute of the XML declaration, if the document starts with one.
/// Leading whitespace is skipped.
fn declared_charset(bytes: &[u8]) -> Result<Option<String>, FeedError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);

    loop {
        match reader.read_event()? {
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            Event::Decl(decl) => {
                return match decl.encoding() {
                    Some(encoding) => {
                        let encoding = encoding.map_err(quick_xml::Error::from)?;
                        Ok(Some(String::from_utf8_lossy(&encoding).into_owned()))
                    }
                    None => Ok(None),
                };
            }
            _ => return Ok(None),
        }
    }
}

// Wire shapes of the two upstream schemas. Attributes carry the `@` prefix quick-xml expects.
// Only root attributes are required; a sparse entry decodes with blank fields.

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename = "ValCurs")]
struct DailyCurs {
    #[serde(rename = "@Date")]
    date: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Valute", default)]
    valute: Vec<Valute>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Valute {
    #[serde(rename = "@ID", default)]
    id: String,
    #[serde(rename = "NumCode", skip_serializing_if = "Option::is_none")]
    num_code: Option<String>,
    #[serde(rename = "CharCode", skip_serializing_if = "Option::is_none")]
    char_code: Option<String>,
    #[serde(rename = "Nominal", default)]
    nominal: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "VunitRate", skip_serializing_if = "Option::is_none")]
    vunit_rate: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename = "ValCurs")]
struct DynamicCurs {
    #[serde(rename = "@ID", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "@DateRange1")]
    date_range1: String,
    #[serde(rename = "@DateRange2")]
    date_range2: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "Record", default)]
    record: Vec<Record>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Record {
    #[serde(rename = "@Date", default)]
    date: String,
    #[serde(rename = "@Id", default)]
    id: String,
    #[serde(rename = "Nominal", default)]
    nominal: String,
    #[serde(rename = "Value", default)]
    value: String,
    #[serde(rename = "VunitRate", skip_serializing_if = "Option::is_none")]
    vunit_rate: Option<String>,
}

impl From<DailyCurs> for RateDocument {
    fn from(curs: DailyCurs) -> Self {
        RateDocument {
            kind: FeedKind::Daily,
            id: None,
            date: Some(curs.date),
            date_range1: None,
            date_range2: None,
            name: curs.name,
            entries: curs
                .valute
                .into_iter()
                .map(|v| RateEntry {
                    id: v.id,
                    date: None,
                    num_code: v.num_code,
                    char_code: v.char_code,
                    nominal: v.nominal,
                    name: v.name,
                    value: v.value,
                    vunit_rate: v.vunit_rate,
                })
                .collect(),
        }
    }
}

impl From<&RateDocument> for DailyCurs {
    fn from(doc: &RateDocument) -> Self {
        DailyCurs {
            date: doc.date.clone().unwrap_or_default(),
            name: doc.name.clone(),
            valute: doc
                .entries
                .iter()
                .map(|e| Valute {
                    id: e.id.clone(),
                    num_code: e.num_code.clone(),
                    char_code: e.char_code.clone(),
                    nominal: e.nominal.clone(),
                    name: e.name.clone(),
                    value: e.value.clone(),
                    vunit_rate: e.vunit_rate.clone(),
                })
                .collect(),
        }
    }
}

impl From<DynamicCurs> for RateDocument {
    fn from(curs: DynamicCurs) -> Self {
        RateDocument {
            kind: FeedKind::Dynamic,
            id: curs.id,
            date: None,
            date_range1: Some(curs.date_range1),
            date_range2: Some(curs.date_range2),
            name: curs.name,
            entries: curs
                .record
                .into_iter()
                .map(|r| RateEntry {
                    id: r.id,
                    date: Some(r.date),
                    num_code: None,
                    char_code: None,
                    nominal: r.nominal,
                    name: None,
                    value: r.value,
                    vunit_rate: r.vunit_rate,
                })
                .collect(),
        }
    }
}

impl From<&RateDocument> for DynamicCurs {
    fn from(doc: &RateDocument) -> Self {
        DynamicCurs {
            id: doc.id.clone(),
            date_range1: doc.date_range1.clone().unwrap_or_default(),
            date_range2: doc.date_range2.clone().unwrap_or_default(),
            name: doc.name.clone(),
            record: doc
                .entries
                .iter()
                .map(|e| Record {
                    date: e.date.clone().unwrap_or_default(),
                    id: e.id.clone(),
                    nominal: e.nominal.clone(),
                    value: e.value.clone(),
                    vunit_rate: e.vunit_rate.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY_UTF8: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ValCurs Date="02.03.2024" name="Foreign Currency Market">
    <Valute ID="R01010">
        <NumCode>036</NumCode>
        <CharCode>AUD</CharCode>
        <Nominal>1</Nominal>
        <Name>Австралийский доллар</Name>
        <Value>59,4445</Value>
        <VunitRate>59,4445</VunitRate>
    </Valute>
    <Valute ID="R01235">
        <NumCode>840</NumCode>
        <CharCode>USD</CharCode>
        <Nominal>1</Nominal>
        <Name>Доллар США</Name>
        <Value>91,3336</Value>
    </Valute>
</ValCurs>"#;

    const DYNAMIC: &str = r#"<?xml version="1.0" encoding="windows-1251"?>
<ValCurs ID="R01235" DateRange1="01.03.2024" DateRange2="05.03.2024" name="Foreign Currency Market Dynamic">
    <Record Date="01.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,2887</Value></Record>
    <Record Date="02.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,3336</Value></Record>
    <Record Date="05.03.2024" Id="R01235"><Nominal>1</Nominal><Value>91,7069</Value></Record>
</ValCurs>"#;

    fn windows_1251(text: &str) -> Vec<u8> {
        let (bytes, _, had_errors) = encoding_rs::WINDOWS_1251.encode(text);
        assert!(!had_errors);
        bytes.into_owned()
    }

    #[test]
    fn decodes_windows_1251_daily_feed() {
        let bytes = windows_1251(&DAILY_UTF8.replace("UTF-8", "windows-1251"));

        let doc = RateDocument::decode(FeedKind::Daily, &bytes).unwrap();

        assert_eq!(doc.date.as_deref(), Some("02.03.2024"));
        assert_eq!(doc.name, "Foreign Currency Market");
        assert_eq!(doc.entries.len(), 2);
        let usd = &doc.entries[1];
        assert_eq!(usd.id, "R01235");
        assert_eq!(usd.char_code.as_deref(), Some("USD"));
        assert_eq!(usd.name.as_deref(), Some("Доллар США"));
        assert_eq!(usd.value, "91,3336");
        assert_eq!(usd.vunit_rate, None);
    }

    #[test]
    fn preserves_document_order() {
        let doc = RateDocument::decode(FeedKind::Daily, DAILY_UTF8.as_bytes()).unwrap();
        let codes: Vec<_> = doc.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(codes, ["R01010", "R01235"]);
    }

    #[test]
    fn decodes_dynamic_feed() {
        let doc = RateDocument::decode(FeedKind::Dynamic, &windows_1251(DYNAMIC)).unwrap();

        assert_eq!(doc.kind, FeedKind::Dynamic);
        assert_eq!(doc.id.as_deref(), Some("R01235"));
        assert_eq!(doc.date_range1.as_deref(), Some("01.03.2024"));
        assert_eq!(doc.date_range2.as_deref(), Some("05.03.2024"));
        assert_eq!(doc.entries.len(), 3);
        assert_eq!(doc.entries[2].date.as_deref(), Some("05.03.2024"));
        assert_eq!(doc.entries[2].value, "91,7069");
    }

    #[test]
    fn rejects_unsupported_charset() {
        let xml = r#"<?xml version="1.0" encoding="koi8-r"?><ValCurs Date="02.03.2024" name="x"/>"#;

        let err = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap_err();

        assert!(matches!(err, FeedError::UnsupportedCharset(ref c) if c == "koi8-r"));
    }

    #[test]
    fn missing_declaration_is_read_as_utf8() {
        let xml = r#"<ValCurs Date="02.03.2024" name="Рынок"></ValCurs>"#;

        let doc = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap();

        assert_eq!(doc.name, "Рынок");
    }

    #[test]
    fn empty_feed_is_valid() {
        let xml = r#"<?xml version="1.0" encoding="windows-1251"?><ValCurs ID="R99999" DateRange1="01.03.2024" DateRange2="05.03.2024" name="Foreign Currency Market Dynamic"></ValCurs>"#;

        let doc = RateDocument::decode(FeedKind::Dynamic, xml.as_bytes()).unwrap();

        assert!(doc.entries.is_empty());
        let json: serde_json::Value = serde_json::from_slice(&doc.to_json().unwrap()).unwrap();
        assert_eq!(json["ValCurs"], serde_json::json!([]));
    }

    #[test]
    fn malformed_xml_is_a_decode_error() {
        let err = RateDocument::decode(FeedKind::Daily, b"<ValCurs Date=\"1\" name=\"x\"><Valute>")
            .unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));

        let err = RateDocument::decode(FeedKind::Daily, b"Service unavailable").unwrap_err();
        assert!(matches!(err, FeedError::Decode(_)));
    }

    #[test]
    fn missing_root_attribute_is_a_decode_error() {
        let xml = r#"<ValCurs name="Foreign Currency Market"></ValCurs>"#;

        let err = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap_err();

        assert!(matches!(err, FeedError::Decode(_)));
    }

    #[test]
    fn values_are_not_validated() {
        let xml = r#"<ValCurs Date="x" name="y"><Valute ID="R1"><Nominal>one</Nominal><Value>n/a</Value></Valute></ValCurs>"#;

        let doc = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap();

        assert_eq!(doc.entries[0].nominal, "one");
        assert_eq!(doc.entries[0].value, "n/a");
        assert_eq!(doc.entries[0].char_code, None);
    }

    #[test]
    fn charset_is_found_after_leading_whitespace() {
        let xml = "\n  <?xml version=\"1.0\" encoding=\"koi8-r\"?><ValCurs Date=\"02.03.2024\" name=\"x\"/>";
        let err = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedCharset(ref c) if c == "koi8-r"));

        let bytes = windows_1251(&format!(
            "\r\n{}",
            DAILY_UTF8.replace("UTF-8", "windows-1251")
        ));
        let doc = RateDocument::decode(FeedKind::Daily, &bytes).unwrap();
        assert_eq!(doc.entries[1].name.as_deref(), Some("Доллар США"));
    }

    #[test]
    fn sparse_entries_decode_with_blank_fields() {
        let xml = r#"<ValCurs Date="02.03.2024" name="x">
            <Valute ID="R01235"><CharCode>USD</CharCode><Value>91,3336</Value></Valute>
            <Valute><Nominal>10</Nominal></Valute>
        </ValCurs>"#;

        let doc = RateDocument::decode(FeedKind::Daily, xml.as_bytes()).unwrap();

        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].nominal, "");
        assert_eq!(doc.entries[0].value, "91,3336");
        assert_eq!(doc.entries[1].id, "");
        assert_eq!(doc.entries[1].nominal, "10");
        assert_eq!(doc.entries[1].value, "");

        let xml = r#"<ValCurs DateRange1="01.03.2024" DateRange2="02.03.2024" name="x"><Record Id="R01235"><Value>91,2887</Value></Record></ValCurs>"#;
        let doc = RateDocument::decode(FeedKind::Dynamic, xml.as_bytes()).unwrap();
        assert_eq!(doc.entries[0].date.as_deref(), Some(""));
        assert_eq!(doc.entries[0].nominal, "");
    }

    #[test]
    fn json_uses_stable_keys() {
        let doc = RateDocument::decode(FeedKind::Daily, DAILY_UTF8.as_bytes()).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&doc.to_json().unwrap()).unwrap();

        assert_eq!(json["Date"], "02.03.2024");
        assert_eq!(json["Name"], "Foreign Currency Market");
        assert!(json.get("DateRange1").is_none());
        assert_eq!(json["ValCurs"][0]["CharCode"], "AUD");
        assert_eq!(json["ValCurs"][0]["VunitRate"], "59,4445");
        assert_eq!(json["ValCurs"][1]["Name"], "Доллар США");
        assert!(json["ValCurs"][1].get("VunitRate").is_none());
    }

    #[test]
    fn empty_documents_serialize() {
        let json: serde_json::Value =
            serde_json::from_slice(&RateDocument::empty(FeedKind::Daily).to_json().unwrap())
                .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Date": "", "Name": "", "ValCurs": []})
        );

        for kind in [FeedKind::Daily, FeedKind::Dynamic] {
            let empty = RateDocument::empty(kind);
            let xml = empty.to_xml().unwrap();
            assert_eq!(RateDocument::decode(kind, &xml).unwrap(), empty);
        }
    }

    #[test]
    fn daily_xml_round_trips() {
        let bytes = windows_1251(&DAILY_UTF8.replace("UTF-8", "windows-1251"));
        let doc = RateDocument::decode(FeedKind::Daily, &bytes).unwrap();

        let xml = doc.to_xml().unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();

        assert!(text.starts_with(XML_DECLARATION));
        assert!(text.contains("<Name>Доллар США</Name>"));
        assert_eq!(RateDocument::decode(FeedKind::Daily, &xml).unwrap(), doc);
    }

    #[test]
    fn dynamic_xml_round_trips() {
        let doc = RateDocument::decode(FeedKind::Dynamic, &windows_1251(DYNAMIC)).unwrap();

        let xml = doc.to_xml().unwrap();
        let text = String::from_utf8(xml.clone()).unwrap();

        assert!(text.contains(r#"<Record Date="01.03.2024" Id="R01235">"#));
        assert_eq!(RateDocument::decode(FeedKind::Dynamic, &xml).unwrap(), doc);
    }
}
