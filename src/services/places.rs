// Google Places and Static Maps proxy

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{instrument, warn};

use crate::app_config::GoogleConfig;

pub const STATIC_MAP_SCALE: u32 = 2;
pub const STATIC_MAP_CACHE_CONTROL: &str = "public, max-age=86400";
pub const PLACEHOLDER_CACHE_CONTROL: &str = "public, max-age=600";

const AUTOCOMPLETE_FIELD_MASK: &str = "suggestions.placePrediction.placeId,\
suggestions.placePrediction.structuredFormat.mainText.text,\
suggestions.placePrediction.structuredFormat.secondaryText.text";

const DETAILS_FIELD_MASK: &str =
    "id,displayName,formattedAddress,googleMapsUri,googleMapsLinks,rating,userRatingCount";

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("Places request failed: {0}")]
    Upstream(String),

    #[error("Places API error: {status} {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub main_text: String,
    pub secondary_text: String,
}

/// Projection of a place returned to the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDetails {
    pub id: String,
    pub display_name: Option<String>,
    pub formatted_address: Option<String>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<i64>,
    pub google_maps_uri: Option<String>,
    pub write_a_review_uri: Option<String>,
    pub reviews_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawText {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructuredFormat {
    main_text: Option<RawText>,
    secondary_text: Option<RawText>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrediction {
    place_id: String,
    structured_format: Option<RawStructuredFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    place_prediction: Option<RawPrediction>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAutocomplete {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMapsLinks {
    write_a_review_uri: Option<String>,
    reviews_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    id: String,
    display_name: Option<RawText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    user_rating_count: Option<i64>,
    google_maps_uri: Option<String>,
    google_maps_links: Option<RawMapsLinks>,
}

fn text_of(raw: Option<RawText>) -> Option<String> {
    raw.and_then(|t| t.text)
}

impl From<RawAutocomplete> for Vec<PlaceSuggestion> {
    fn from(raw: RawAutocomplete) -> Self {
        raw.suggestions
            .into_iter()
            .filter_map(|s| s.place_prediction)
            .map(|p| {
                let (main, secondary) = match p.structured_format {
                    Some(f) => (text_of(f.main_text), text_of(f.secondary_text)),
                    None => (None, None),
                };
                PlaceSuggestion {
                    place_id: p.place_id,
                    main_text: main.unwrap_or_default(),
                    secondary_text: secondary.unwrap_or_default(),
                }
            })
            .collect()
    }
}

impl From<RawPlace> for PlaceDetails {
    fn from(raw: RawPlace) -> Self {
        let links = raw.google_maps_links.unwrap_or_default();
        PlaceDetails {
            id: raw.id,
            display_name: text_of(raw.display_name),
            formatted_address: raw.formatted_address,
            rating: raw.rating,
            user_rating_count: raw.user_rating_count,
            google_maps_uri: raw.google_maps_uri,
            write_a_review_uri: links.write_a_review_uri,
            reviews_uri: links.reviews_uri,
        }
    }
}

/// Static map request after clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticMapParams {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u32,
    pub width: u32,
    pub height: u32,
}

impl StaticMapParams {
    /// Clamp zoom to 1..=20 (15) and size to 100..=1024 (600x240).
    /// Non-finite coordinates are rejected.
    pub fn new(
        lat: f64,
        lng: f64,
        zoom: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    ) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        let clamp = |v: Option<f64>, default: f64, min: f64, max: f64| {
            let v = v.filter(|v| v.is_finite()).unwrap_or(default);
            v.clamp(min, max) as u32
        };
        Some(Self {
            lat,
            lng,
            zoom: clamp(zoom, 15.0, 1.0, 20.0),
            width: clamp(width, 600.0, 100.0, 1024.0),
            height: clamp(height, 240.0, 100.0, 1024.0),
        })
    }

    pub fn query(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("center", format!("{},{}", self.lat, self.lng)),
            ("zoom", self.zoom.to_string()),
            ("size", format!("{}x{}", self.width, self.height)),
            ("scale", STATIC_MAP_SCALE.to_string()),
            ("maptype", "roadmap".to_string()),
            ("markers", format!("color:red|{},{}", self.lat, self.lng)),
            ("key", api_key.to_string()),
        ]
    }

    /// Gradient placeholder with a centre pin, served when the upstream fails
    pub fn placeholder_svg(&self) -> String {
        let (w, h) = (self.width, self.height);
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{sw}" height="{sh}" viewBox="0 0 {w} {h}">"#,
                r#"<defs><linearGradient id="g" x1="0" y1="0" x2="1" y2="1">"#,
                r##"<stop offset="0%" stop-color="#eef2ff"/><stop offset="100%" stop-color="#e0f2fe"/>"##,
                r#"</linearGradient></defs><rect width="100%" height="100%" fill="url(#g)"/>"#,
                r##"<circle cx="{cx}" cy="{cy}" r="6" fill="#ef4444" stroke="#111827" stroke-width="1"/></svg>"##
            ),
            sw = w * STATIC_MAP_SCALE,
            sh = h * STATIC_MAP_SCALE,
            w = w,
            h = h,
            cx = w / 2,
            cy = h / 2,
        )
    }
}

#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn autocomplete(
        &self,
        input: &str,
        session_token: Option<&str>,
        region_codes: Vec<String>,
    ) -> Result<Vec<PlaceSuggestion>, PlacesError>;

    async fn details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError>;

    /// PNG bytes for the map
    async fn static_map(&self, params: &StaticMapParams) -> Result<Vec<u8>, PlacesError>;

    /// Region codes used when the caller sends none
    fn default_region_codes(&self) -> Vec<String>;
}

pub fn split_region_codes(codes: &str) -> Vec<String> {
    codes
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct GoogleProvider {
    client: Client,
    config: GoogleConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlacesError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!("Places API returned {}: {}", status, body);
        Err(PlacesError::Api { status, body })
    }
}

#[async_trait]
impl PlacesProvider for GoogleProvider {
    #[instrument(skip(self, session_token))]
    async fn autocomplete(
        &self,
        input: &str,
        session_token: Option<&str>,
        region_codes: Vec<String>,
    ) -> Result<Vec<PlaceSuggestion>, PlacesError> {
        let response = self
            .client
            .post(format!("{}/places:autocomplete", self.config.places_base_url))
            .header("X-Goog-Api-Key", &self.config.maps_api_key)
            .header("X-Goog-FieldMask", AUTOCOMPLETE_FIELD_MASK)
            .json(&json!({
                "input": input,
                "sessionToken": session_token,
                "includedRegionCodes": region_codes,
            }))
            .send()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;

        let raw: RawAutocomplete = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;
        Ok(raw.into())
    }

    #[instrument(skip(self))]
    async fn details(&self, place_id: &str) -> Result<PlaceDetails, PlacesError> {
        let encoded: String = url::form_urlencoded::byte_serialize(place_id.as_bytes()).collect();
        let response = self
            .client
            .get(format!("{}/places/{}", self.config.places_base_url, encoded))
            .query(&[("fields", DETAILS_FIELD_MASK)])
            .header("X-Goog-Api-Key", &self.config.maps_api_key)
            .header("X-Goog-FieldMask", DETAILS_FIELD_MASK)
            .send()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;

        let raw: RawPlace = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;
        Ok(raw.into())
    }

    #[instrument(skip(self))]
    async fn static_map(&self, params: &StaticMapParams) -> Result<Vec<u8>, PlacesError> {
        let response = self
            .client
            .get(&self.config.static_maps_url)
            .query(&params.query(&self.config.maps_api_key))
            .send()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;

        let bytes = Self::check(response)
            .await?
            .bytes()
            .await
            .map_err(|e| PlacesError::Upstream(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn default_region_codes(&self) -> Vec<String> {
        split_region_codes(&self.config.default_region_codes)
    }
}
