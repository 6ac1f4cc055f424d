use std::borrow::Cow;

use encoding_rs::{UTF_8, WINDOWS_1251};

use crate::error::FeedError;

/// Turns raw feed bytes into UTF-8 text.
pub type Transcoder = fn(&[u8]) -> Result<Cow<'_, str>, FeedError>;

const CHARSETS: &[(&str, Transcoder)] = &[
    ("utf-8", utf8),
    ("utf8", utf8),
    ("windows-1251", windows_1251),
];

/// Looks up the transcoder for a charset name as declared in an XML prolog.
pub fn transcoder(charset: &str) -> Result<Transcoder, FeedError> {
    CHARSETS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(charset))
        .map(|(_, transcode)| *transcode)
        .ok_or_else(|| FeedError::UnsupportedCharset(charset.to_string()))
}

/// Decodes `bytes` using `charset`, or as UTF-8 when nothing was declared.
pub fn decode<'a>(charset: Option<&str>, bytes: &'a [u8]) -> Result<Cow<'a, str>, FeedError> {
    match charset {
        Some(charset) => transcoder(charset)?(bytes),
        None => utf8(bytes),
    }
}

fn utf8(bytes: &[u8]) -> Result<Cow<'_, str>, FeedError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| {
            FeedError::Decode(quick_xml::DeError::Custom(
                "feed is not valid UTF-8".to_string(),
            ))
        })
}

fn windows_1251(bytes: &[u8]) -> Result<Cow<'_, str>, FeedError> {
    let (text, _) = WINDOWS_1251.decode_without_bom_handling(bytes);
    Ok(text)
}
