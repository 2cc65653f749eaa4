// src/extract/http.rs
//! Selector-driven extractor for plain HTML listing sites.
//!
//! Each site is described by a handful of CSS selectors (see
//! `HttpExtractorConfig`). Links and image sources are resolved against the
//! page they were found on (or `base_url` when set), so relative,
//! root-relative and protocol-relative references all come out absolute.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use url::Url;

use super::{Extractor, FetchError};
use crate::model::{Category, ItemAttributes, Source};

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("number regex"));

fn default_retries() -> u8 {
    3
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Which comma-separated part of a location line to keep.
/// "Warszawa, Mokotów" is `First` → "Warszawa", `Last` → "Mokotów".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPart {
    #[default]
    First,
    Last,
}

/// Label/value attribute table on an item page (`<span class="name">` next to
/// `<span class="value">` and similar). Labels are matched after trimming.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailsConfig {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub rooms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpExtractorConfig {
    pub name: String,
    /// Resolve links against this URL instead of the page they were found on.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Selects the item anchors (`href`) on an index page.
    pub item_link: String,
    /// Fixed category for every item of this extractor.
    #[serde(default)]
    pub category: Option<Category>,
    /// When `category` is unset: URL fragment marking a room offer.
    #[serde(default)]
    pub room_marker: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub location_part: LocationPart,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub rooms: Option<String>,
    /// Selects `<img>` elements; `src` (or `data-src`) is read.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub details: Option<DetailsConfig>,
    #[serde(default = "default_retries")]
    pub retries: u8,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

struct Selectors {
    item_link: Selector,
    price: Option<Selector>,
    location: Option<Selector>,
    size: Option<Selector>,
    rooms: Option<Selector>,
    image: Option<Selector>,
    detail_name: Option<Selector>,
    detail_value: Option<Selector>,
}

pub struct HttpExtractor {
    cfg: HttpExtractorConfig,
    base: Option<Url>,
    selectors: Selectors,
    client: Client,
}

fn parse_selector(field: &str, css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("bad `{field}` selector `{css}`: {e}"))
}

fn compile(field: &str, css: &Option<String>) -> anyhow::Result<Option<Selector>> {
    css.as_deref().map(|s| parse_selector(field, s)).transpose()
}

impl HttpExtractor {
    pub fn new(cfg: HttpExtractorConfig) -> anyhow::Result<Self> {
        if cfg.category.is_none() && cfg.room_marker.is_none() {
            anyhow::bail!(
                "extractor `{}` needs either `category` or `room_marker`",
                cfg.name
            );
        }
        let base = cfg
            .base_url
            .as_deref()
            .map(|b| Url::parse(b).map_err(|e| anyhow::anyhow!("bad `base_url` {b}: {e}")))
            .transpose()?;
        let selectors = Selectors {
            item_link: parse_selector("item_link", &cfg.item_link)?,
            price: compile("price", &cfg.price)?,
            location: compile("location", &cfg.location)?,
            size: compile("size", &cfg.size)?,
            rooms: compile("rooms", &cfg.rooms)?,
            image: compile("image", &cfg.image)?,
            detail_name: compile(
                "details.name",
                &cfg.details.as_ref().map(|d| d.name.clone()),
            )?,
            detail_value: compile(
                "details.value",
                &cfg.details.as_ref().map(|d| d.value.clone()),
            )?,
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            cfg,
            base,
            selectors,
            client,
        })
    }

    /// GET `url` with bounded retries; gives up with `FetchFailed`.
    async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.cfg.retries.max(1);
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self.client.get(url).send().await;
            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(rsp) => match rsp.text().await {
                        Ok(body) => return Ok(body),
                        Err(e) => format!("reading body: {e}"),
                    },
                    Err(e) => format!("HTTP error: {e}"),
                },
                Err(e) => format!("request failed: {e}"),
            };
            if attempt >= attempts {
                return Err(FetchError::FetchFailed(format!("{url}: {err}")));
            }
            tracing::debug!(target: "extract", %url, attempt, error = %err, "page fetch retry");
            tokio::time::sleep(Duration::from_secs(self.cfg.retry_delay_secs)).await;
        }
    }

    /// Base every reference on `page_url` is resolved against.
    fn base_for(&self, page_url: &str) -> Option<Url> {
        self.base.clone().or_else(|| Url::parse(page_url).ok())
    }

    /// Item URLs on an index page, absolute and deduplicated.
    pub fn parse_index(&self, page_url: &str, html: &str) -> BTreeSet<String> {
        let Some(base) = self.base_for(page_url) else {
            tracing::warn!(target: "extract", url = page_url, "index URL is not absolute");
            return BTreeSet::new();
        };
        let doc = Html::parse_document(html);
        doc.select(&self.selectors.item_link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve(&base, href))
            .collect()
    }

    pub fn parse_item(&self, url: &str, html: &str) -> ItemAttributes {
        let category = match (self.cfg.category, &self.cfg.room_marker) {
            (Some(c), _) => c,
            (None, Some(marker)) if url.contains(marker.as_str()) => Category::Room,
            (None, _) => Category::Flat,
        };

        let doc = Html::parse_document(html);
        let details = self.details(&doc);
        let labels = self.cfg.details.as_ref();
        let labelled = |label: Option<&String>| details.get(label?.as_str()).cloned();

        let image_urls = match (&self.selectors.image, self.base_for(url)) {
            (Some(sel), Some(base)) => doc
                .select(sel)
                .filter_map(|img| {
                    let el = img.value();
                    el.attr("src").or_else(|| el.attr("data-src"))
                })
                .filter_map(|src| resolve(&base, src))
                .collect(),
            _ => Vec::new(),
        };

        let location = first_text(&doc, &self.selectors.location)
            .or_else(|| labelled(labels.and_then(|d| d.location.as_ref())))
            .and_then(|l| pick_part(&l, self.cfg.location_part));
        let size = first_text(&doc, &self.selectors.size)
            .or_else(|| labelled(labels.and_then(|d| d.size.as_ref())));
        let rooms = first_text(&doc, &self.selectors.rooms)
            .or_else(|| labelled(labels.and_then(|d| d.rooms.as_ref())));

        ItemAttributes {
            category,
            price: first_text(&doc, &self.selectors.price).and_then(|s| digits_only(&s)),
            location,
            size_sqm: size.and_then(|s| first_number(&s)),
            room_count: rooms.and_then(|s| first_number(&s)).map(|n| n as u32),
            image_urls,
        }
    }

    /// Label → value pairs of the item's attribute table.
    fn details(&self, doc: &Html) -> HashMap<String, String> {
        let (Some(name), Some(value)) = (&self.selectors.detail_name, &self.selectors.detail_value)
        else {
            return HashMap::new();
        };
        doc.select(name)
            .map(text_of)
            .zip(doc.select(value).map(text_of))
            .collect()
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn list_index(&self, source: &Source) -> Result<BTreeSet<String>, FetchError> {
        let html = self.get_page(&source.index_url).await?;
        Ok(self.parse_index(&source.index_url, &html))
    }

    async fn extract_item(&self, url: &str) -> Result<ItemAttributes, FetchError> {
        let html = self.get_page(url).await?;
        Ok(self.parse_item(url, &html))
    }

    fn name(&self) -> &str {
        &self.cfg.name
    }
}

/// Absolute http(s) URL for `href`, or `None` for anchors, scripts and mail links.
fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

fn text_of(el: ElementRef<'_>) -> String {
    let raw = el.text().collect::<Vec<_>>().join(" ");
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, sel: &Option<Selector>) -> Option<String> {
    let text = text_of(doc.select(sel.as_ref()?).next()?);
    (!text.is_empty()).then_some(text)
}

fn pick_part(location: &str, part: LocationPart) -> Option<String> {
    let mut parts = location.split(',').map(str::trim).filter(|p| !p.is_empty());
    let picked = match part {
        LocationPart::First => parts.next(),
        LocationPart::Last => parts.last(),
    };
    picked.map(str::to_string)
}

/// "2 500 zł" -> 2500
fn digits_only(s: &str) -> Option<f64> {
    let d: String = s.chars().filter(char::is_ascii_digit).collect();
    d.parse().ok()
}

/// "48,5 m²" -> 48.5, "ok. 3 pokoje" -> 3
fn first_number(s: &str) -> Option<f64> {
    NUMBER.find(s)?.as_str().replace(',', ".").parse().ok()
}
