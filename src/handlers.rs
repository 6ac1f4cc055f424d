use actix_web::{HttpResponse, http::StatusCode, web};
use chrono::Local;
use log::{error, info};
use serde::Deserialize;

use crate::config::{Config, FailurePolicy};
use crate::error::FeedError;
use crate::fetch::FeedClient;
use crate::upstream::{DailyQuery, DynamicQuery, UpstreamUrls};
use crate::val_curs::{FeedKind, RateDocument};

const BANNER: &str = "CBRF to json/xml in UTF-8\n";

/// Per-server state shared by all workers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: FeedClient,
    pub urls: UpstreamUrls,
    pub failure_policy: FailurePolicy,
}

impl AppState {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        Ok(AppState {
            client: FeedClient::new()?,
            urls: UpstreamUrls::new(&config.upstream_url),
            failure_policy: config.failure_policy,
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    fn content_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Xml => "application/xml",
        }
    }

    fn render(self, doc: &RateDocument) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(match self {
            Format::Json => doc.to_json()?,
            Format::Xml => doc.to_xml()?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/index", web::get().to(index))
        .route("/cbrf/{format}", web::get().to(daily))
        .route("/cbrf/dynamic/{format}", web::get().to(dynamic))
        .default_service(web::to(index));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body(BANNER)
}

async fn daily(
    state: web::Data<AppState>,
    format: web::Path<Format>,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, FeedError> {
    let url = state.urls.daily(&DailyQuery::from_pairs(&query));
    respond(&state, FeedKind::Daily, &url, *format).await
}

async fn dynamic(
    state: web::Data<AppState>,
    format: web::Path<Format>,
    query: web::Query<Vec<(String, String)>>,
) -> Result<HttpResponse, FeedError> {
    let query = DynamicQuery::from_pairs(&query);
    let url = state.urls.dynamic(&query, Local::now().date_naive());
    respond(&state, FeedKind::Dynamic, &url, *format).await
}

async fn respond(
    state: &AppState,
    kind: FeedKind,
    url: &str,
    format: Format,
) -> Result<HttpResponse, FeedError> {
    info!("URL {}", url);

    let doc = match load(&state.client, kind, url).await {
        Ok(doc) => doc,
        Err(err) if state.failure_policy == FailurePolicy::Strict => return Err(err),
        Err(err) => {
            info!("Serving empty {:?} document after: {}", kind, err);
            RateDocument::empty(kind)
        }
    };

    match format.render(&doc) {
        Ok(body) => Ok(HttpResponse::build(StatusCode::CREATED)
            .content_type(format.content_type())
            .body(body)),
        Err(err) => {
            error!("Failed to serialize {:?} document as {:?}: {}", kind, format, err);
            Ok(HttpResponse::InternalServerError().finish())
        }
    }
}

async fn load(client: &FeedClient, kind: FeedKind, url: &str) -> Result<RateDocument, FeedError> {
    let body = client.fetch(url).await?;
    RateDocument::decode(kind, &body)
}
