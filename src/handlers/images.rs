//! Support images: promotional banners shown in the customer app, each with a link and a display window.
use reqwest::multipart::Form;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ClientError;
use crate::handlers::faqs::list_payload;
use crate::handlers::stats::parse_timestamp;
use crate::handlers::uploads::{LocalFile, with_simulated_progress};
use crate::http::ApiClient;
use crate::models::{ImageRequest, SupportImage};

pub const ACTION_INTERNAL: i64 = 0;
pub const ACTION_EXTERNAL: i64 = 1;

/// # API
/// - **GET `/images`**
pub async fn handle_list_images(client: &ApiClient) -> Result<Vec<SupportImage>, ClientError> {
    list_payload(client.get::<Value>("/images").await?.into_data()?)
}

/// Category names, as the server sends them.
///
/// # API
/// - **GET `/images/categories`**
pub async fn handle_image_categories(client: &ApiClient) -> Result<Vec<Value>, ClientError> {
    list_payload(client.get::<Value>("/images/categories").await?.into_data()?)
}

/// Images whose display window covers now, as decided by the server.
///
/// # API
/// - **GET `/images/imagesActive`**
pub async fn handle_active_images(client: &ApiClient) -> Result<Vec<SupportImage>, ClientError> {
    list_payload(client.get::<Value>("/images/imagesActive").await?.into_data()?)
}

/// Checks the form before anything is sent.
///
/// - category is required.
/// - action 1 (external) needs `external_url`, action 0 (internal) needs `internal_url`.
/// - when both ends of the display window are set, `display_from <= display_until`.
pub fn validate_image(form: &ImageRequest) -> Result<(), ClientError> {
    if form.category.trim().is_empty() {
        return Err(ClientError::Validation("Category is required".to_string()));
    }

    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    match form.action {
        ACTION_EXTERNAL if blank(&form.external_url) => {
            return Err(ClientError::Validation("External links need an external URL".to_string()));
        }
        ACTION_INTERNAL if blank(&form.internal_url) => {
            return Err(ClientError::Validation("Internal links need an internal URL".to_string()));
        }
        ACTION_EXTERNAL | ACTION_INTERNAL => {}
        other => {
            return Err(ClientError::Validation(format!(
                "Action must be 0 (internal link) or 1 (external link), got {}",
                other
            )));
        }
    }

    if let (Some(from), Some(until)) = (non_blank(&form.display_from), non_blank(&form.display_until)) {
        let parsed = (parse_timestamp(from), parse_timestamp(until));
        let (Some(from), Some(until)) = parsed else {
            return Err(ClientError::Validation("Display dates must look like 2025-06-14".to_string()));
        };
        if from > until {
            return Err(ClientError::Validation("Display from must not be after display until".to_string()));
        }
    }

    Ok(())
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Uploads a new image with its metadata.
///
/// # API
/// - **POST `/images`** multipart: `category`, `action`, the urls and display window when set, and `file`.
pub async fn handle_create_image(
    form: &ImageRequest,
    file: LocalFile,
    client: &ApiClient,
) -> Result<SupportImage, ClientError> {
    validate_image(form)?;

    let mut multipart = Form::new()
        .text("category", form.category.trim().to_string())
        .text("action", form.action.to_string());
    let optional = [
        ("external_url", &form.external_url),
        ("internal_url", &form.internal_url),
        ("display_from", &form.display_from),
        ("display_until", &form.display_until),
    ];
    for (field, value) in optional {
        if let Some(value) = non_blank(value) {
            multipart = multipart.text(field, value.to_string());
        }
    }
    let label = file.name.clone();
    multipart = multipart.part("file", file.into_part()?);

    let created: SupportImage = with_simulated_progress(&label, client.post_multipart::<SupportImage>("/images", multipart))
        .await?
        .into_data()?;

    info!(id = %created.id, category = %created.category, "image uploaded");
    Ok(created)
}

/// Updates an image's metadata; the file itself is not replaced.
///
/// # API
/// - **PUT `/images/:id`**
pub async fn handle_update_image(id: &str, form: &ImageRequest, client: &ApiClient) -> Result<Value, ClientError> {
    validate_image(form)?;

    let envelope = client
        .put_json::<Value, _>(&format!("/images/{}", id), form)
        .await?
        .ensure_success()?;

    info!(id, "image updated");
    Ok(json!({ "id": id, "image": envelope.data }))
}

/// Deletes an image. Callers must have confirmed first.
///
/// # API
/// - **DELETE `/images/:id`**
pub async fn handle_delete_image(id: &str, client: &ApiClient) -> Result<Value, ClientError> {
    client.delete::<Value>(&format!("/images/{}", id)).await?.ensure_success()?;
    info!(id, "image deleted");
    Ok(json!({ "deleted": id }))
}
