use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Actor input types ---

/// Input for the Facebook Ad Library scraper actor.
#[derive(Debug, Clone, Serialize)]
pub struct AdLibraryInput {
    pub query: String,
    #[serde(rename = "maxItems")]
    pub max_items: u32,
    pub country: String,
    pub category: String,
    #[serde(rename = "proxyConfiguration")]
    pub proxy_configuration: ProxyConfiguration,
}

impl AdLibraryInput {
    /// Default input: all ad categories, residential proxies.
    /// Datacenter proxies get blocked by the Ad Library almost immediately.
    pub fn new(query: impl Into<String>, max_items: u32, country: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_items,
            country: country.into(),
            category: "all".to_string(),
            proxy_configuration: ProxyConfiguration {
                use_apify_proxy: true,
                apify_proxy_groups: vec!["RESIDENTIAL".to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfiguration {
    #[serde(rename = "useApifyProxy")]
    pub use_apify_proxy: bool,
    #[serde(rename = "apifyProxyGroups")]
    pub apify_proxy_groups: Vec<String>,
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

// --- Ad Library dataset types ---

/// A single ad from the Ad Library dataset.
///
/// The actor output is loosely shaped: numeric fields arrive as strings or
/// numbers, creative text arrives as a string or a nested object, platform
/// lists arrive as a string or an array. Every field is optional and the
/// loose shapes are absorbed by untagged enums below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdLibraryAd {
    pub ad_archive_id: Option<String>,
    #[serde(deserialize_with = "de_opt_string_loose")]
    pub page_id: Option<String>,
    pub page_name: Option<String>,

    pub landing_page_url: Option<String>,
    pub link_url: Option<String>,

    pub ad_creative_body: Option<TextValue>,
    pub ad_creative_link_title: Option<TextValue>,
    pub call_to_action_type: Option<String>,

    /// ISO timestamp of first delivery, e.g. "2024-11-02T00:00:00Z".
    pub ad_delivery_start_time: Option<String>,
    /// Unix-seconds fallback some actor builds emit instead.
    pub start_date: Option<i64>,

    pub impressions: Option<BoundRange>,
    pub impressions_with_index: Option<ImpressionsWithIndex>,
    pub spend: Option<BoundRange>,

    pub publisher_platforms: Option<OneOrMany>,
    pub publisher_platform: Option<OneOrMany>,

    pub region_distribution: Option<Vec<RegionEntry>>,
    pub targeted_or_reached_countries: Option<Vec<RegionEntry>>,

    pub snapshot: Option<AdSnapshot>,
}

impl AdLibraryAd {
    /// Best landing page URL: direct fields first, then the snapshot link,
    /// then the first card that carries one.
    pub fn landing_url(&self) -> Option<&str> {
        if let Some(url) = non_empty(self.landing_page_url.as_deref()) {
            return Some(url);
        }
        if let Some(url) = non_empty(self.link_url.as_deref()) {
            return Some(url);
        }
        let snapshot = self.snapshot.as_ref()?;
        if let Some(url) = non_empty(snapshot.link_url.as_deref()) {
            return Some(url);
        }
        snapshot
            .cards
            .iter()
            .flatten()
            .find_map(|card| non_empty(card.link_url.as_deref()))
    }

    /// Creative body text, falling back to the snapshot body.
    pub fn creative_body(&self) -> Option<&str> {
        self.ad_creative_body
            .as_ref()
            .and_then(TextValue::as_text)
            .or_else(|| self.snapshot.as_ref()?.body.as_ref()?.as_text())
    }

    /// Creative title text, falling back to the snapshot link description.
    pub fn creative_title(&self) -> Option<&str> {
        self.ad_creative_link_title
            .as_ref()
            .and_then(TextValue::as_text)
            .or_else(|| self.snapshot.as_ref()?.link_description.as_ref()?.as_text())
    }

    /// Call-to-action type, falling back to the snapshot.
    pub fn cta_type(&self) -> Option<&str> {
        non_empty(self.call_to_action_type.as_deref())
            .or_else(|| non_empty(self.snapshot.as_ref()?.cta_type.as_deref()))
    }

    /// Publisher platforms, whichever field variant the actor emitted.
    pub fn platforms(&self) -> Vec<String> {
        self.publisher_platforms
            .as_ref()
            .or(self.publisher_platform.as_ref())
            .map(OneOrMany::to_vec)
            .unwrap_or_default()
    }

    /// Targeted or reached country names, whichever field variant is present.
    pub fn countries(&self) -> Vec<String> {
        let entries = self
            .region_distribution
            .as_deref()
            .filter(|r| !r.is_empty())
            .or(self.targeted_or_reached_countries.as_deref())
            .unwrap_or_default();
        entries.iter().filter_map(RegionEntry::name).map(str::to_string).collect()
    }

    /// Facebook page name, falling back to the snapshot.
    pub fn advertiser_name(&self) -> Option<&str> {
        non_empty(self.page_name.as_deref())
            .or_else(|| non_empty(self.snapshot.as_ref()?.page_name.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A lower/upper bound pair as the Ad Library reports impressions and spend.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BoundRange {
    #[serde(deserialize_with = "de_opt_i64_loose")]
    pub lower_bound: Option<i64>,
    #[serde(deserialize_with = "de_opt_i64_loose")]
    pub upper_bound: Option<i64>,
}

/// Alternative impressions field carrying a "10000-50000" style text range.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImpressionsWithIndex {
    pub impressions_text: Option<String>,
}

/// Ad creative snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdSnapshot {
    pub body: Option<TextValue>,
    pub link_url: Option<String>,
    pub link_description: Option<TextValue>,
    pub cards: Option<Vec<SnapshotCard>>,
    pub page_name: Option<String>,
    pub cta_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotCard {
    pub link_url: Option<String>,
}

/// Creative text that arrives either as a plain string or a nested object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Text(String),
    Nested {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        body: Option<String>,
    },
}

impl TextValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TextValue::Text(s) => Some(s.as_str()),
            TextValue::Nested { text, content, body } => text
                .as_deref()
                .or(content.as_deref())
                .or(body.as_deref()),
        }
    }
}

/// A field that arrives either as one string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// A region/country entry: a bare name or an object with name/country keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RegionEntry {
    Name(String),
    Detail {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        country: Option<String>,
    },
}

impl RegionEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            RegionEntry::Name(s) => Some(s.as_str()),
            RegionEntry::Detail { name, country } => name.as_deref().or(country.as_deref()),
        }
    }
}

// --- Loose deserializers ---

fn de_opt_string_loose<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Str(s) => s,
        Loose::Int(n) => n.to_string(),
        Loose::Float(f) => f.to_string(),
    }))
}

fn de_opt_i64_loose<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Str(String),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.and_then(|v| match v {
        Loose::Int(n) => Some(n),
        Loose::Float(f) => Some(f as i64),
        Loose::Str(s) => s.trim().replace(',', "").parse::<i64>().ok(),
    }))
}
