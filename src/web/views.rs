use super::prelude::*;

#[derive(Clone, Debug)]
pub(crate) struct GalleryItem {
    pub(crate) prompt: String,
    pub(crate) image_url: String,
    pub(crate) share_url: String,
    pub(crate) created_label: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub(crate) struct HomeTemplate {
    pub(crate) site_title: &'static str,
    pub(crate) items: Vec<GalleryItem>,
}

/// handles the / GET
pub(crate) async fn root_handler(State(state): State<AppState>) -> Result<HomeTemplate, AppError> {
    let records = state.persistence.repository().list_descending().await?;
    let items = records
        .into_iter()
        .map(|record| GalleryItem {
            image_url: format!("/api/image/{}", record.id),
            share_url: format!("/api/share/{}", record.id),
            created_label: record.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
            prompt: record.prompt,
        })
        .collect();
    Ok(HomeTemplate {
        site_title: SITE_TITLE,
        items,
    })
}
