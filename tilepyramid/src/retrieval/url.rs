//! Resource URL construction.

use reqwest::Url;

use super::RetrieveError;
use crate::level::{Level, Tile};

/// Builds the remote URL of a tile.
pub trait UrlBuilder: Send + Sync {
    fn url_for(&self, tile: &Tile, level: &Level) -> Result<Url, RetrieveError>;
}

/// MIME type conventionally served for a tile file suffix.
pub fn mime_for_suffix(suffix: &str) -> String {
    match suffix.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "dds" => "image/dds".to_string(),
        "tif" | "tiff" => "image/tiff".to_string(),
        "bil" => "application/bil16".to_string(),
        other => format!("image/{other}"),
    }
}

/// Map-service style builder:
/// `service?request=GetMap&layers=…&format=…&width=…&height=…&bbox=…`.
///
/// The bounding box is `lonMin,latMin,lonMax,latMax`. A `version` parameter
/// is appended when configured.
#[derive(Debug, Clone, Default)]
pub struct BoundingBoxUrlBuilder {
    format: Option<String>,
    version: Option<String>,
    styles: Option<String>,
}

impl BoundingBoxUrlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the MIME type otherwise derived from the level's suffix.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_styles(mut self, styles: impl Into<String>) -> Self {
        self.styles = Some(styles.into());
        self
    }
}

impl UrlBuilder for BoundingBoxUrlBuilder {
    fn url_for(&self, tile: &Tile, level: &Level) -> Result<Url, RetrieveError> {
        let service = level
            .service()
            .ok_or_else(|| RetrieveError::NoService(level.dataset().to_string()))?;
        let mut url = Url::parse(service)
            .map_err(|e| RetrieveError::InvalidUrl(format!("{service}: {e}")))?;

        let sector = tile.sector();
        let format = self
            .format
            .clone()
            .unwrap_or_else(|| mime_for_suffix(level.format_suffix()));
        let bbox = format!(
            "{},{},{},{}",
            sector.min_lon, sector.min_lat, sector.max_lon, sector.max_lat
        );

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("request", "GetMap")
                .append_pair("layers", level.dataset())
                .append_pair("format", &format)
                .append_pair("width", &tile.width().to_string())
                .append_pair("height", &tile.height().to_string())
                .append_pair("bbox", &bbox);
            if let Some(styles) = &self.styles {
                query.append_pair("styles", styles);
            }
            if let Some(version) = &self.version {
                query.append_pair("version", version);
            }
        }
        Ok(url)
    }
}
