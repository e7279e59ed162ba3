//! App configuration handlers: the key/value editor, avatars and branding assets.
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::error::ClientError;
use crate::handlers::uploads::{AssetSpec, LocalFile, UploadKind, UploadSelection, asset_spec, with_simulated_progress};
use crate::http::ApiClient;
use crate::models::{AddConfigValueRequest, ConfigEntry, UpdateConfigRequest};
use reqwest::multipart::Form;

const IMAGE_CONFIGS: [&str; 3] = ["app_logo", "app_logo_white", "icon_logo"];
const IMAGE_EXTENSIONS: [&str; 5] = [".jpeg", ".jpg", ".gif", ".png", ".svg"];

/// Fetches the whole config map.
///
/// # API
/// - **GET `/config/all`**, following `pagination.next_page_url`.
///
/// # Logic
/// - Each page's `data` is either a map of name -> value or a list of such maps; all are merged, later pages win.
pub async fn fetch_config_map(client: &ApiClient) -> Result<Map<String, Value>, ClientError> {
    let pages: Vec<Value> = client.collect_pages("/config/all").await?;
    let mut merged = Map::new();
    for page in pages {
        merge_page(&mut merged, page);
    }
    Ok(merged)
}

fn merge_page(merged: &mut Map<String, Value>, page: Value) {
    match page {
        Value::Object(map) => merged.extend(map),
        Value::Array(items) => {
            for item in items {
                merge_page(merged, item);
            }
        }
        other => warn!(?other, "ignoring config page that is not a map"),
    }
}

/// Turns the nested config map into editable rows.
///
/// - `support_number`: list of `{id, value}` joined into one row.
/// - `avatar_paths`: `{group: {index: {id, path, url}}}`, one row per avatar named `Avatar <index>`.
/// - objects with a non-empty `url`: the url.
/// - strings: as-is. Anything else is not editable here and is skipped.
pub fn flatten_configs(map: &Map<String, Value>) -> Vec<ConfigEntry> {
    let mut entries = Vec::new();

    for (key, value) in map {
        match (key.as_str(), value) {
            ("support_number", Value::Array(numbers)) => {
                let joined = numbers
                    .iter()
                    .filter_map(|n| n.get("value"))
                    .map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                entries.push(ConfigEntry::plain(key, joined));
            }
            ("avatar_paths", Value::Object(groups)) => {
                let Some(Value::Object(avatars)) = groups.values().next() else {
                    continue;
                };
                for (index, avatar) in avatars {
                    let (Some(url), Some(id)) = (avatar.get("url").and_then(|u| u.as_str()), avatar.get("id")) else {
                        continue;
                    };
                    entries.push(ConfigEntry {
                        name: format!("Avatar {}", index),
                        value: url.to_string(),
                        avatar_id: index.parse().ok(),
                        unique_avatar_id: Some(scalar_text(id)),
                    });
                }
            }
            (_, Value::Object(obj)) => {
                if let Some(url) = obj.get("url").and_then(|u| u.as_str()).filter(|u| !u.is_empty()) {
                    entries.push(ConfigEntry::plain(key, url));
                }
            }
            (_, Value::String(s)) => entries.push(ConfigEntry::plain(key, s.clone())),
            _ => {}
        }
    }

    entries
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a row should be shown as an image.
pub fn is_image_config(name: &str, value: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    IMAGE_CONFIGS.contains(&name)
        || name.starts_with("Avatar")
        || IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct Logos {
    pub app_logo: Option<String>,
    pub app_logo_white: Option<String>,
    pub icon_logo: Option<String>,
}

/// Logo URLs for the console header. `icon_logo` is stored either as a bare string or as `{url}`.
pub fn branding_logos(map: &Map<String, Value>) -> Logos {
    let url_of = |key: &str| -> Option<String> {
        let url = match map.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("url").and_then(|u| u.as_str()).map(|u| u.to_string()),
            _ => None,
        };
        url.filter(|u| !u.is_empty())
    };
    Logos {
        app_logo: url_of("app_logo"),
        app_logo_white: url_of("app_logo_white"),
        icon_logo: url_of("icon_logo"),
    }
}

/// Config rows plus the one row being edited, if any.
#[derive(Debug, Clone, Default)]
pub struct ConfigEditor {
    entries: Vec<ConfigEntry>,
    editing: Option<ConfigEntry>,
}

impl ConfigEditor {
    pub fn new(entries: Vec<ConfigEntry>) -> Self {
        ConfigEditor { entries, editing: None }
    }

    pub async fn load(client: &ApiClient) -> Result<Self, ClientError> {
        let map = fetch_config_map(client).await?;
        Ok(ConfigEditor::new(flatten_configs(&map)))
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn begin_edit(&mut self, name: &str) -> Result<&ConfigEntry, ClientError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("No config named '{}'", name)))?;
        Ok(&*self.editing.insert(entry))
    }

    /// Saves the row being edited and replaces it locally. The row stays in edit mode if the save fails.
    ///
    /// # API
    /// - avatars: **POST `/config/avatar-update/:id`** multipart with an optional `file`.
    /// - everything else: **PUT `/config/update/:name`** with `{ "config_value": ... }`.
    pub async fn save(
        &mut self,
        client: &ApiClient,
        value: &str,
        file: Option<LocalFile>,
    ) -> Result<ConfigEntry, ClientError> {
        let editing = self
            .editing
            .clone()
            .ok_or_else(|| ClientError::Validation("No config is being edited".to_string()))?;

        let new_value = match &editing.unique_avatar_id {
            Some(unique_id) => {
                let mut form = Form::new();
                if let Some(file) = file {
                    form = form.part("file", file.into_part()?);
                }
                let path = format!("/config/avatar-update/{}", unique_id);
                let envelope = with_simulated_progress(&editing.name, client.post_multipart::<Value>(&path, form))
                    .await?
                    .ensure_success()?;
                envelope
                    .data
                    .as_ref()
                    .and_then(|d| d.get("url"))
                    .and_then(|u| u.as_str())
                    .filter(|u| !u.is_empty())
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| value.to_string())
            }
            None => {
                let body = UpdateConfigRequest { config_value: value.to_string() };
                client
                    .put_json::<Value, _>(&format!("/config/update/{}", editing.name), &body)
                    .await?
                    .ensure_success()?;
                value.to_string()
            }
        };

        let mut saved = editing.clone();
        saved.value = new_value;
        for entry in self.entries.iter_mut() {
            let same = match (&entry.unique_avatar_id, &editing.unique_avatar_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => entry.name == editing.name,
                _ => false,
            };
            if same {
                *entry = saved.clone();
            }
        }
        self.editing = None;

        info!(name = %saved.name, "configuration saved");
        Ok(saved)
    }

    /// Deletes a row on the server, then locally.
    ///
    /// # API
    /// - avatars: **DELETE `/config/avatar-delete/:id`**.
    /// - everything else: **DELETE `/config/delete/:name`**.
    pub async fn delete(&mut self, client: &ApiClient, name: &str) -> Result<ConfigEntry, ClientError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| ClientError::Validation(format!("No config named '{}'", name)))?;

        let path = match &entry.unique_avatar_id {
            Some(unique_id) => format!("/config/avatar-delete/{}", unique_id),
            None => format!("/config/delete/{}", entry.name),
        };
        client.delete::<Value>(&path).await?.ensure_success()?;

        self.entries.retain(|e| e != &entry);
        if self.editing.as_ref() == Some(&entry) {
            self.editing = None;
        }

        info!(name = %entry.name, "configuration deleted");
        Ok(entry)
    }

    /// Adds a config row.
    ///
    /// # API
    /// - with a file: **POST `/upload`** multipart `{config_name, file}`, then the whole list is fetched again
    ///   because the server decides where the asset lands.
    /// - with a value: **POST `/upload-configValue`** `{config_name, config_value}`, appended locally.
    pub async fn add(
        &mut self,
        client: &ApiClient,
        name: &str,
        value: Option<String>,
        file: Option<LocalFile>,
    ) -> Result<(), ClientError> {
        let name = name.trim();
        let value = value.filter(|v| !v.trim().is_empty());

        if name.is_empty() || (value.is_none() && file.is_none()) {
            return Err(ClientError::Validation(
                "Please provide a config name and either a value or a file.".to_string(),
            ));
        }

        if let Some(file) = file {
            let form = Form::new().text("config_name", name.to_string()).part("file", file.into_part()?);
            with_simulated_progress(name, client.post_multipart::<Value>("/upload", form))
                .await?
                .ensure_success()?;

            let reloaded = ConfigEditor::load(client).await?;
            self.entries = reloaded.entries;
            info!(name, "configuration file uploaded");
            return Ok(());
        }

        if let Some(value) = value {
            let body = AddConfigValueRequest { config_name: name.to_string(), config_value: value.clone() };
            client
                .post_json::<Value, _>("/upload-configValue", &body)
                .await?
                .ensure_success()?;
            self.entries.push(ConfigEntry::plain(name, value));
            info!(name, "configuration added");
        }

        Ok(())
    }
}

/// Uploads files for one of the image config keys.
///
/// # API
/// - single keys: **POST `/config/upload`** multipart `{config_name, file}`.
/// - collections: **POST `/config/upload-multiple`** multipart `{config_name, files[]}`.
///
/// # Logic
/// - Collections are cut down to the file cap, then the kept files are checked against the key's rules.
pub async fn handle_upload_config_asset(
    key: &str,
    files: Vec<LocalFile>,
    client: &ApiClient,
) -> Result<Value, ClientError> {
    let spec: AssetSpec = asset_spec(key)
        .ok_or_else(|| ClientError::Validation(format!("'{}' does not take file uploads", key)))?;

    let mut selection = UploadSelection::for_asset(&spec);
    selection.add(files);
    let files = selection.into_files();
    if files.is_empty() {
        return Err(ClientError::Validation("Select at least one file".to_string()));
    }
    for file in &files {
        spec.rules.check(file, spec.kind)?;
    }

    let uploaded: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    let mut form = Form::new().text("config_name", key.to_string());
    let path = match spec.kind {
        UploadKind::Single => {
            for file in files {
                form = form.part("file", file.into_part()?);
            }
            "/config/upload"
        }
        UploadKind::Collection => {
            for file in files {
                form = form.part("files[]", file.into_part()?);
            }
            "/config/upload-multiple"
        }
    };

    let envelope = with_simulated_progress(key, client.post_multipart::<Value>(path, form))
        .await?
        .ensure_success()?;

    info!(key, count = uploaded.len(), "config asset uploaded");
    Ok(json!({
        "config_name": key,
        "files": uploaded,
        "result": envelope.data,
    }))
}
