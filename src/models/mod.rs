use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of a listing, derived from its url.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    /// Direct-sale site (owners listing without an agency).
    DuProprio,
    /// Agency site.
    RoyalLepage,
}

impl Source {
    /// Url-pattern rule distinguishing direct-sale from agency listings.
    pub fn of_url(url: &str) -> Source {
        if url.contains("duproprio") {
            Source::DuProprio
        } else {
            Source::RoyalLepage
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Source::DuProprio => "DuProprio",
            Source::RoyalLepage => "RoyalLepage",
        }
    }
}

/// One row of a scraped summary page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryListing {
    pub url: String,
    pub price: Option<i64>,
    pub address: Option<String>,
}

/// Detail-page attributes. Every field is best-effort: a site not exposing
/// a value (or exposing it in an unparseable form) yields `None`, never an
/// error for the listing as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDetails {
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub powder_rooms: Option<i64>,
    pub stories: Option<i64>,
    pub construction_year: Option<i64>,
    pub property_style: Option<String>,
    pub floors: Option<String>,
    pub municipal_valuation: Option<i64>,
    pub parking_spaces: Option<i64>,
    /// Numeric-as-text, unit-stripped.
    pub living_area: Option<String>,
    pub land_area: Option<String>,
}

/// Geocoded location for a listing address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geocode {
    pub latitude: f64,
    pub longitude: f64,
    pub postal_code: Option<String>,
    /// Forward sortation area: first three characters of the postal code.
    pub fsa: Option<String>,
}

/// Full listing record as persisted in the operational store.
///
/// `url` uniquely identifies a listing across its whole lifecycle; no two
/// records with the same url may coexist in the operational store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingRecord {
    pub url: String,
    pub price: Option<i64>,
    pub address: Option<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub powder_rooms: Option<i64>,
    pub stories: Option<i64>,
    pub construction_year: Option<i64>,
    pub property_style: Option<String>,
    pub floors: Option<String>,
    pub municipal_valuation: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub living_area: Option<String>,
    pub land_area: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postal_code: Option<String>,
    pub fsa: Option<String>,
}

impl ListingRecord {
    /// Assemble a record from its summary row, detail attributes and an
    /// optional geocode result.
    pub fn assemble(
        summary: &SummaryListing,
        details: ListingDetails,
        geocode: Option<Geocode>,
    ) -> ListingRecord {
        let (latitude, longitude, postal_code, fsa) = match geocode {
            Some(g) => (Some(g.latitude), Some(g.longitude), g.postal_code, g.fsa),
            None => (None, None, None, None),
        };
        ListingRecord {
            url: summary.url.clone(),
            price: summary.price,
            address: summary.address.clone(),
            bedrooms: details.bedrooms,
            bathrooms: details.bathrooms,
            powder_rooms: details.powder_rooms,
            stories: details.stories,
            construction_year: details.construction_year,
            property_style: details.property_style,
            floors: details.floors,
            municipal_valuation: details.municipal_valuation,
            parking_spaces: details.parking_spaces,
            living_area: details.living_area,
            land_area: details.land_area,
            latitude,
            longitude,
            postal_code,
            fsa,
        }
    }

    /// Same record with a different price, for warehouse rows recording a
    /// price change.
    pub fn with_price(mut self, price: Option<i64>) -> ListingRecord {
        self.price = price;
        self
    }
}

/// How a listing changed between the stored snapshot and the current scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffAction {
    New,
    PriceChange,
    Sold,
}

impl DiffAction {
    /// Value stored in the warehouse `state` column.
    pub fn as_state(&self) -> &'static str {
        match self {
            DiffAction::New => "new",
            DiffAction::PriceChange => "price_change",
            DiffAction::Sold => "sold",
        }
    }
}

/// One listing whose state changed between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    pub url: String,
    /// New price; absent for sold listings.
    pub price: Option<i64>,
    pub action: DiffAction,
}

/// Append-only warehouse entry: a full record tagged with the transition
/// that produced it.
#[derive(Debug, Clone)]
pub struct WarehouseEntry {
    pub record: ListingRecord,
    pub state: DiffAction,
    pub update_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_follows_url_pattern() {
        assert_eq!(
            Source::of_url("https://duproprio.com/fr/montreal/condo-123"),
            Source::DuProprio
        );
        assert_eq!(
            Source::of_url("https://www.royallepage.ca/fr/property/mls12345"),
            Source::RoyalLepage
        );
    }

    #[test]
    fn assemble_without_geocode_leaves_location_null() {
        let summary = SummaryListing {
            url: "https://duproprio.com/x".into(),
            price: Some(500_000),
            address: Some("123 rue Example".into()),
        };
        let record = ListingRecord::assemble(&summary, ListingDetails::default(), None);
        assert_eq!(record.price, Some(500_000));
        assert!(record.latitude.is_none());
        assert!(record.fsa.is_none());
    }

    #[test]
    fn assemble_with_geocode_copies_all_fields() {
        let summary = SummaryListing {
            url: "https://duproprio.com/x".into(),
            price: None,
            address: None,
        };
        let geocode = Geocode {
            latitude: 45.55,
            longitude: -73.58,
            postal_code: Some("H2G 1A1".into()),
            fsa: Some("H2G".into()),
        };
        let record = ListingRecord::assemble(&summary, ListingDetails::default(), Some(geocode));
        assert_eq!(record.latitude, Some(45.55));
        assert_eq!(record.fsa.as_deref(), Some("H2G"));
    }
}
