//! JSON/image API handlers.

use std::sync::LazyLock;
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION};
use regex::Regex;
use serde::Deserialize;

use super::images::{
    ImageCacheHeaders, apply_cache_headers, is_not_modified, not_modified_response,
};
use super::prelude::*;
use crate::base_image::{extension_for_mime, load_base_image};
use crate::constants::{DOWNLOAD_SLUG_MAX_LEN, X_IMAGE_ID};
use crate::prompt::{compose_prompt, validate_prompt};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateRequest {
    #[serde(default)]
    prompt: Option<String>,
}

static NON_SLUG: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+"));

/// handles POST /api/generate
pub(crate) async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| AppError::BadRequest(format!("Invalid request body: {err}")))?
    };
    let prompt = validate_prompt(request.prompt.as_deref())?;
    let base = load_base_image(&state.base_image).await?;
    let composed = compose_prompt(&state.preserved_feature, prompt);

    let started = Instant::now();
    let permit = state
        .generation_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|err| AppError::InternalServerError(err.to_string()))?;
    debug!("Generation permit acquired after {:?}", started.elapsed());

    // once the upstream call is issued it runs to completion, even if the client goes away
    let prompt = prompt.to_string();
    let (image, record) = tokio::spawn(async move {
        let image = state.generator.generate(&composed, &base).await;
        drop(permit);
        let image = image?;
        let record = state.persistence.save(&prompt, &image).await?;
        Ok::<_, AppError>((image, record))
    })
    .await
    .map_err(|err| AppError::InternalServerError(format!("generation task failed: {err}")))??;
    info!(
        "Generated record {} in {:?}",
        record.id,
        started.elapsed()
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, image.mime_type.as_str())
        .header(CACHE_CONTROL, "no-store")
        .header(X_IMAGE_ID, record.id.as_str())
        .body(Body::from(image.bytes))
        .map_err(AppError::from)
}

/// handles GET /api/gallery
pub(crate) async fn gallery_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    let records = state.persistence.repository().list_descending().await?;
    Ok(Json(records))
}

pub(crate) async fn find_record(state: &AppState, id: &str) -> Result<ImageRecord, AppError> {
    state
        .persistence
        .repository()
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("record {id}")))
}

/// Storage URL to send the client to, when records should be redirected rather than proxied.
fn redirect_target(state: &AppState, record: &ImageRecord) -> Option<String> {
    match (&record.image_location, state.serve_mode) {
        (ImageLocation::Remote { url, .. }, ServeMode::Redirect) => Some(url.clone()),
        _ => None,
    }
}

/// handles GET /api/image/{id}
pub(crate) async fn image_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let record = find_record(&state, &id).await?;
    if let Some(url) = redirect_target(&state, &record) {
        return Ok(Redirect::temporary(&url).into_response());
    }

    let cache = ImageCacheHeaders::for_record(&record);
    if is_not_modified(&headers, &cache) {
        return not_modified_response(&cache);
    }

    let image = state.persistence.read_image(&record).await?;
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, image.mime_type.as_str());
    apply_cache_headers(builder, &cache)
        .body(Body::from(image.bytes))
        .map_err(AppError::from)
}

/// handles GET /api/download/{id}
pub(crate) async fn download_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let record = find_record(&state, &id).await?;
    if let Some(url) = redirect_target(&state, &record) {
        return Ok(Redirect::temporary(&url).into_response());
    }

    let image = state.persistence.read_image(&record).await?;
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        download_filename(&record)
    ))
    .map_err(|err| AppError::InternalServerError(err.to_string()))?;
    let cache = ImageCacheHeaders::for_record(&record);
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, image.mime_type.as_str())
        .header(CONTENT_DISPOSITION, disposition);
    apply_cache_headers(builder, &cache)
        .body(Body::from(image.bytes))
        .map_err(AppError::from)
}

/// `a-cat-on-a-skateboard-9a3c41f2.png`: prompt slug, the random tail of the id, extension.
pub(crate) fn download_filename(record: &ImageRecord) -> String {
    let lowered = record.prompt.to_lowercase();
    let slug = match NON_SLUG.as_ref() {
        Ok(regex) => regex.replace_all(&lowered, "-").into_owned(),
        Err(_) => lowered
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect(),
    };
    let slug: String = slug
        .trim_matches('-')
        .chars()
        .take(DOWNLOAD_SLUG_MAX_LEN)
        .collect();
    let slug = match slug.trim_end_matches('-') {
        "" => "image",
        trimmed => trimmed,
    };
    let id_suffix = record
        .id
        .char_indices()
        .rev()
        .nth(7)
        .map_or(record.id.as_str(), |(index, _)| &record.id[index..]);
    format!(
        "{}-{}.{}",
        slug,
        id_suffix,
        extension_for_mime(record.image_location.mime_type())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(prompt: &str) -> ImageRecord {
        ImageRecord {
            id: "0190c2a4-0000-7000-8000-00009a3c41f2".to_string(),
            prompt: prompt.to_string(),
            image_location: ImageLocation::Inline {
                mime_type: "image/jpeg".to_string(),
                data: String::new(),
            },
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn filenames_are_slugged() {
        assert_eq!(
            download_filename(&record("A cat, on a Skateboard!")),
            "a-cat-on-a-skateboard-9a3c41f2.jpg"
        );
        assert_eq!(
            download_filename(&record("\"; rm -rf / ü")),
            "rm-rf-9a3c41f2.jpg"
        );
        assert_eq!(download_filename(&record("!!!")), "image-9a3c41f2.jpg");
        let long = download_filename(&record(&"word ".repeat(40)));
        assert!(long.len() <= DOWNLOAD_SLUG_MAX_LEN + "-9a3c41f2.jpg".len());
        assert!(!long.contains("--"));
    }

    #[test]
    fn filenames_differ_for_ids_from_the_same_minute() {
        let mut first = record("same prompt");
        let mut second = record("same prompt");
        first.id = "019a1b2c-3d4e-7000-8000-5f6e7d8c9b0a".to_string();
        second.id = "019a1b2c-3d4f-7123-9000-0a1b2c3d4e5f".to_string();
        assert_eq!(download_filename(&first), "same-prompt-7d8c9b0a.jpg");
        assert_eq!(download_filename(&second), "same-prompt-2c3d4e5f.jpg");
    }
}
