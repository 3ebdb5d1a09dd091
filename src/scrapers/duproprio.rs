//! Direct-sale source. Summary pages are paginated search results; detail
//! pages carry the full characteristic set.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::models::{ListingDetails, Source, SummaryListing};
use crate::scrapers::traits::{SourceAdapter, SummaryPage};
use crate::scrapers::{parse_price, strip_units, text_of, FetchError};

const SEARCH_URL: &str =
    "https://duproprio.com/fr/rechercher/liste?search=true&cities%5B0%5D=1889&pageNumber=";

pub struct DuProprioAdapter {
    client: Client,
}

impl DuProprioAdapter {
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

    fn parse_summary(html: &str) -> Result<SummaryPage, FetchError> {
        let document = Html::parse_document(html);
        let container = Selector::parse("div.search-results-listings-list__container").unwrap();
        let link = Selector::parse("a.search-results-listings-list__item-bottom-container").unwrap();
        let price = Selector::parse("div.search-results-listings-list__item-description__price").unwrap();
        let address = Selector::parse("div.search-results-listings-list__item-description__address").unwrap();
        let total = Selector::parse("span.search-results-listings-header__properties-found__number").unwrap();

        let total_count: usize = document
            .select(&total)
            .next()
            .map(|el| text_of(el))
            .and_then(|t| t.replace(char::is_whitespace, "").parse().ok())
            .ok_or_else(|| FetchError::Parse("missing properties-found count".into()))?;

        let mut listings = Vec::new();
        for item in document.select(&container) {
            let url = match item
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                Some(href) => href.to_string(),
                // A card without a link is an ad slot, not a listing.
                None => continue,
            };
            listings.push(SummaryListing {
                url,
                price: item.select(&price).next().and_then(|el| parse_price(&text_of(el))),
                address: item.select(&address).next().map(|el| text_of(el)),
            });
        }

        Ok(SummaryPage {
            listings,
            total_count,
        })
    }

    fn parse_detail(html: &str) -> Result<ListingDetails, FetchError> {
        let document = Html::parse_document(html);
        let article = Selector::parse("article.listing-tab-content__content").unwrap();
        let label = Selector::parse("div.listing-main-characteristics__label").unwrap();
        let living_area_sel = Selector::parse(
            "div.listing-main-characteristics__item--living-space-area span.listing-main-characteristics__number--dimensions",
        )
        .unwrap();
        let land_area_sel = Selector::parse(
            "div.listing-main-characteristics__item--lot-dimensions span.listing-main-characteristics__number--dimensions",
        )
        .unwrap();
        let dotted_row = Selector::parse("div.listing-box__dotted-row").unwrap();

        let content = document
            .select(&article)
            .next()
            .ok_or_else(|| FetchError::Parse("missing listing article".into()))?;

        // Main characteristics render as "<count> <label>", label in singular
        // or plural form depending on the count.
        let mut main_specs: Vec<(String, i64)> = Vec::new();
        for el in content.select(&label) {
            let text = text_of(el);
            if let Some((count, name)) = text.split_once(' ') {
                if let Ok(count) = count.parse::<i64>() {
                    main_specs.push((name.trim().to_string(), count));
                }
            }
        }
        let labelled = |names: &[&str]| -> Option<i64> {
            main_specs
                .iter()
                .find(|(name, _)| names.contains(&name.as_str()))
                .map(|(_, count)| *count)
        };

        // "Label\nValue" rows in the characteristics boxes.
        let mut other_specs: Vec<(String, String)> = Vec::new();
        for el in content.select(&dotted_row) {
            let raw: String = el.text().collect::<Vec<_>>().join("\n");
            let parts: Vec<&str> = raw
                .split('\n')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect();
            if parts.len() >= 2 {
                other_specs.push((parts[0].to_string(), parts[1].to_string()));
            }
        }
        let other = |key: &str| -> Option<String> {
            other_specs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        // Valuations and parking counts may be reported split; sum the parts.
        let summed = |keys: &[&str]| -> Option<i64> {
            let parts: Vec<i64> = keys
                .iter()
                .filter_map(|k| other(k))
                .filter_map(|v| parse_price(&v))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.into_iter().sum())
            }
        };

        Ok(ListingDetails {
            bedrooms: labelled(&["chambre", "chambres"]),
            bathrooms: labelled(&["salle de bain", "salles de bain"]),
            powder_rooms: labelled(&["salle d’eau", "salles d’eau"]),
            stories: labelled(&["étage", "étages"]),
            construction_year: other("Année de construction").and_then(|v| v.parse().ok()),
            property_style: other("Style"),
            floors: other("Situé à quel étage?"),
            municipal_valuation: summed(&[
                "Évaluation municipale",
                "Évaluation municipale du terrain",
                "Évaluation municipale du bâtiment",
            ]),
            parking_spaces: summed(&[
                "Nombre de stationnements",
                "Nombre de stationnements intérieur",
                "Nombre de stationnements extérieur",
            ]),
            living_area: content
                .select(&living_area_sel)
                .next()
                .and_then(|el| strip_units(&text_of(el))),
            land_area: content
                .select(&land_area_sel)
                .next()
                .and_then(|el| strip_units(&text_of(el))),
        })
    }
}

#[async_trait]
impl SourceAdapter for DuProprioAdapter {
    fn source(&self) -> Source {
        Source::DuProprio
    }

    async fn fetch_summary_page(&self, page: u32) -> Result<SummaryPage, FetchError> {
        let html = self.get_text(&format!("{SEARCH_URL}{page}")).await?;
        Self::parse_summary(&html)
    }

    async fn fetch_detail(&self, url: &str) -> Result<ListingDetails, FetchError> {
        let html = self.get_text(url).await?;
        Self::parse_detail(&html)
    }
}
