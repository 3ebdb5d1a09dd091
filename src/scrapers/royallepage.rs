//! Agency source. Exposes fewer detail attributes than the direct-sale
//! site; the absent ones stay `None`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{ListingDetails, Source, SummaryListing};
use crate::scrapers::traits::{SourceAdapter, SummaryPage};
use crate::scrapers::{parse_price, strip_units, text_of, FetchError};

fn search_url(page: u32) -> String {
    format!(
        "https://www.royallepage.ca/fr/searchgeo/homes/qc/rosemontla-petite-patrie/{page}/\
         ?search_str=Rosemont%E2%80%93La+Petite-Patrie%2C+Montr%C3%A9al%2C+QC%2C+CAN\
         &property_type=&house_type=&listing_type=&transactionType=SALE\
         &min_price=0&max_price=5000000%2B&beds=0&baths=0&display_type=gallery-view"
    )
}

pub struct RoyalLepageAdapter {
    client: Client,
}

impl RoyalLepageAdapter {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        Ok(response.text().await?)
    }

    /// MLS number embedded in a listing url, e.g. `...-mls12345678`.
    pub fn mls_from_url(url: &str) -> Option<String> {
        let idx = url.find("mls")?;
        let digits: String = url[idx + 3..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            None
        } else {
            Some(digits)
        }
    }

    fn parse_summary(html: &str) -> Result<SummaryPage, FetchError> {
        let document = Html::parse_document(html);
        let card = Selector::parse("div.card.card--listing-card.js-listing.js-property-details").unwrap();
        let link = Selector::parse("a").unwrap();
        let price = Selector::parse("span.title--h3.price > span").unwrap();
        let image = Selector::parse("img").unwrap();
        let total = Selector::parse("span#search-results-result-count").unwrap();

        // The count renders with non-breaking thousands separators; keep
        // digits only.
        let total_count: usize = document
            .select(&total)
            .next()
            .map(|el| {
                text_of(el)
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| FetchError::Parse("missing result count".into()))?;

        let mut listings = Vec::new();
        for item in document.select(&card) {
            let url = match item
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                Some(href) => href.to_string(),
                None => continue,
            };
            if let Some(mls) = Self::mls_from_url(&url) {
                debug!(%mls, %url, "listing card parsed");
            }
            listings.push(SummaryListing {
                url,
                price: item.select(&price).next().and_then(|el| parse_price(&text_of(el))),
                // The card's photo alt text is the street address.
                address: item
                    .select(&image)
                    .next()
                    .and_then(|img| img.value().attr("alt"))
                    .map(str::to_string),
            });
        }

        Ok(SummaryPage {
            listings,
            total_count,
        })
    }

    fn parse_detail(html: &str) -> Result<ListingDetails, FetchError> {
        let document = Html::parse_document(html);
        let wrapper = Selector::parse("div.property-wrapper.feed-3.rlp").unwrap();
        let spec_box = Selector::parse("div.expandable-box__hidden.js-expandable-box-target").unwrap();
        let li = Selector::parse("li").unwrap();

        let content = document
            .select(&wrapper)
            .next()
            .ok_or_else(|| FetchError::Parse("missing property wrapper".into()))?;
        let specs_el = content
            .select(&spec_box)
            .next()
            .ok_or_else(|| FetchError::Parse("missing characteristics box".into()))?;

        // Characteristics render as "Label : Value" list items.
        let mut specs: Vec<(String, String)> = Vec::new();
        for item in specs_el.select(&li) {
            let text = text_of(item);
            if let Some((key, value)) = text.split_once(':') {
                specs.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        let spec = |key: &str| -> Option<String> {
            specs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        };

        Ok(ListingDetails {
            bedrooms: spec("Chambres").and_then(|v| v.parse().ok()),
            bathrooms: spec("Salle(s) de bains").and_then(|v| v.parse().ok()),
            powder_rooms: spec("Salle(s) d'eau").and_then(|v| v.parse().ok()),
            // Agency pages do not expose these.
            stories: None,
            property_style: None,
            floors: None,
            land_area: None,
            construction_year: spec("Bâti en").and_then(|v| v.parse().ok()),
            municipal_valuation: spec("Évaluation totale").and_then(|v| parse_price(&v)),
            parking_spaces: spec("Nbre d'espaces de stationnement").and_then(|v| v.parse().ok()),
            living_area: spec("Superficie habitable (approx)").and_then(|v| strip_units(&v)),
        })
    }
}

#[async_trait]
impl SourceAdapter for RoyalLepageAdapter {
    fn source(&self) -> Source {
        Source::RoyalLepage
    }

    async fn fetch_summary_page(&self, page: u32) -> Result<SummaryPage, FetchError> {
        let html = self.get_text(&search_url(page)).await?;
        Self::parse_summary(&html)
    }

    async fn fetch_detail(&self, url: &str) -> Result<ListingDetails, FetchError> {
        let html = self.get_text(url).await?;
        Self::parse_detail(&html)
    }
}
