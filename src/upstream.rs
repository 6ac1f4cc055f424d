use chrono::NaiveDate;
use log::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.cbr.ru/scripts";
/// US dollar in the upstream's currency catalogue.
pub const DEFAULT_CURRENCY: &str = "R01010";

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Raw query string pairs in request order. A repeated key keeps its first value.
pub type QueryPairs = [(String, String)];

#[derive(Debug, Default)]
pub struct DailyQuery {
    pub lang: Option<String>,
    pub date_req: Option<String>,
}

impl DailyQuery {
    pub fn from_pairs(pairs: &QueryPairs) -> Self {
        DailyQuery {
            lang: first(pairs, "lang"),
            date_req: first(pairs, "date_req"),
        }
    }
}

#[derive(Debug, Default)]
pub struct DynamicQuery {
    pub date_req1: Option<String>,
    pub date_req2: Option<String>,
    pub val_nm_rq: Option<String>,
}

impl DynamicQuery {
    pub fn from_pairs(pairs: &QueryPairs) -> Self {
        DynamicQuery {
            date_req1: first(pairs, "date_req1"),
            date_req2: first(pairs, "date_req2"),
            val_nm_rq: first(pairs, "VAL_NM_RQ"),
        }
    }
}

fn first(pairs: &QueryPairs, key: &str) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

/// Builds the upstream feed URLs under a base such as `https://www.cbr.ru/scripts`.
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    base: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl UpstreamUrls {
    pub fn new(base: &str) -> Self {
        UpstreamUrls {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn daily(&self, query: &DailyQuery) -> String {
        let path = match query.lang.as_deref() {
            Some("eng") => "XML_daily_eng.asp",
            _ => "XML_daily.asp",
        };

        match non_empty(&query.date_req) {
            Some(date) => format!("{}/{}?date_req={}", self.base, path, date),
            None => format!("{}/{}", self.base, path),
        }
    }

    /// Range defaults to yesterday..today relative to `today`, currency to [`DEFAULT_CURRENCY`].
    pub fn dynamic(&self, query: &DynamicQuery, today: NaiveDate) -> String {
        let yesterday = today.pred_opt().unwrap_or(today);

        let date_req1 = non_empty(&query.date_req1)
            .map(str::to_string)
            .unwrap_or_else(|| yesterday.format(DATE_FORMAT).to_string());
        let date_req2 = non_empty(&query.date_req2)
            .map(str::to_string)
            .unwrap_or_else(|| today.format(DATE_FORMAT).to_string());
        let currency = non_empty(&query.val_nm_rq).unwrap_or(DEFAULT_CURRENCY);

        debug!("date_req1: {}", date_req1);
        debug!("date_req2: {}", date_req2);
        debug!("VAL_NM_RQ: {}", currency);

        format!(
            "{}/XML_dynamic.asp?date_req1={}&date_req2={}&VAL_NM_RQ={}",
            self.base, date_req1, date_req2, currency
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
