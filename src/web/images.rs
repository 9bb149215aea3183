use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use httpdate::{fmt_http_date, parse_http_date};

use crate::constants::IMAGE_CACHE_CONTROL;
use crate::db::ImageRecord;
use crate::error::AppError;

/// Cache headers for a stored image. Records never change, so the id is a strong validator.
#[derive(Clone, Debug)]
pub(crate) struct ImageCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: Option<SystemTime>,
}

impl ImageCacheHeaders {
    /// Builds cache headers from a record.
    pub(crate) fn for_record(record: &ImageRecord) -> Self {
        // http dates only carry whole seconds
        let modified_at = u64::try_from(record.timestamp.timestamp())
            .ok()
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));
        let etag = HeaderValue::from_str(&format!("\"{}\"", record.id)).ok();
        let last_modified =
            modified_at.and_then(|modified| HeaderValue::from_str(&fmt_http_date(modified)).ok());
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    /// Returns the ETag header value, if available.
    pub(crate) fn etag(&self) -> Option<&HeaderValue> {
        self.etag.as_ref()
    }

    /// Returns the Last-Modified header value, if available.
    pub(crate) fn last_modified(&self) -> Option<&HeaderValue> {
        self.last_modified.as_ref()
    }
}

/// Applies image cache headers to a response builder.
pub(crate) fn apply_cache_headers(mut builder: Builder, cache: &ImageCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str());
    if let Some(etag) = cache.etag() {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = cache.last_modified() {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// Returns true when the request matches a not-modified response.
pub(crate) fn is_not_modified(headers: &HeaderMap, cache: &ImageCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag().and_then(|value| value.to_str().ok())
                && value
                    .split(',')
                    .map(|candidate| candidate.trim().trim_start_matches("W/"))
                    .any(|candidate| candidate == etag)
            {
                return true;
            }
        }
        return false;
    }

    if let (Some(if_modified_since), Some(modified_at)) =
        (headers.get(IF_MODIFIED_SINCE), cache.modified_at)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && modified_at <= since
    {
        return true;
    }

    false
}

/// Builds a 304 response that preserves cache headers.
pub(crate) fn not_modified_response(cache: &ImageCacheHeaders) -> Result<Response, AppError> {
    let builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    let builder = apply_cache_headers(builder, cache);
    builder.body(Body::empty()).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ImageLocation;
    use chrono::{TimeZone, Utc};

    fn record() -> ImageRecord {
        ImageRecord {
            id: "0190c2a4-0000-7000-8000-000000000001".to_string(),
            prompt: "x".to_string(),
            image_location: ImageLocation::Inline {
                mime_type: "image/png".to_string(),
                data: String::new(),
            },
            timestamp: Utc
                .with_ymd_and_hms(2024, 7, 1, 12, 0, 0)
                .single()
                .expect("valid date"),
        }
    }

    #[test]
    fn etag_matches_record_id() {
        let cache = ImageCacheHeaders::for_record(&record());
        let mut headers = HeaderMap::new();
        headers.insert(
            IF_NONE_MATCH,
            HeaderValue::from_static("\"other\", \"0190c2a4-0000-7000-8000-000000000001\""),
        );
        assert!(is_not_modified(&headers, &cache));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        assert!(!is_not_modified(&headers, &cache));
    }

    #[test]
    fn if_modified_since_uses_whole_seconds() {
        let cache = ImageCacheHeaders::for_record(&record());
        assert_eq!(
            cache.last_modified().and_then(|value| value.to_str().ok()),
            Some("Mon, 01 Jul 2024 12:00:00 GMT")
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_static("Mon, 01 Jul 2024 12:00:00 GMT"),
        );
        assert!(is_not_modified(&headers, &cache));
        headers.insert(
            IF_MODIFIED_SINCE,
            HeaderValue::from_static("Sun, 30 Jun 2024 12:00:00 GMT"),
        );
        assert!(!is_not_modified(&headers, &cache));
    }
}
