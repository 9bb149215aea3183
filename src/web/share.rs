//! Share pages: one self-contained HTML document per record, carrying
//! Open Graph and Twitter card tags so link previews show the image.
//!
//! Every user-supplied value goes through askama's HTML escaping.

use super::prelude::*;

const DESCRIPTION_MAX_CHARS: usize = 160;

#[derive(Template, WebTemplate)]
#[template(path = "share.html")]
pub(crate) struct ShareTemplate {
    pub(crate) site_title: &'static str,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) prompt: String,
    pub(crate) mime_type: String,
    pub(crate) share_url: String,
    pub(crate) image_url: String,
    pub(crate) og_image_url: String,
    pub(crate) download_url: String,
    pub(crate) create_url: String,
    pub(crate) created_label: String,
}

impl ShareTemplate {
    pub(crate) fn for_record(state: &AppState, record: &ImageRecord) -> Self {
        let base_url = state.base_url.as_str();
        let image_url = match (&record.image_location, state.serve_mode) {
            (ImageLocation::Remote { url, .. }, ServeMode::Redirect) => url.clone(),
            _ => format!("{base_url}/api/image/{}", record.id),
        };
        let separator = if image_url.contains('?') { '&' } else { '?' };
        let og_image_url = format!("{image_url}{separator}v={}", record.timestamp.timestamp());

        Self {
            site_title: SITE_TITLE,
            title: format!("{} | {}", truncate(&record.prompt, 70), SITE_TITLE),
            description: format!(
                "\"{}\", made with {}",
                truncate(&record.prompt, DESCRIPTION_MAX_CHARS),
                SITE_TITLE
            ),
            prompt: record.prompt.clone(),
            mime_type: record.image_location.mime_type().to_string(),
            share_url: format!("{base_url}/api/share/{}", record.id),
            image_url,
            og_image_url,
            download_url: format!("{base_url}/api/download/{}", record.id),
            create_url: format!("{base_url}/"),
            created_label: record.timestamp.format("%B %-d, %Y").to_string(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

/// handles GET /api/share/{id}
pub(crate) async fn share_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ShareTemplate, AppError> {
    let record = super::api::find_record(&state, &id).await?;
    Ok(ShareTemplate::for_record(&state, &record))
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
