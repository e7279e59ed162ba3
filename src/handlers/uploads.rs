//! Local file selection and multipart helpers shared by the asset editors.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::Part;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ClientError;

const IMAGE_MIMES: [&str; 4] = ["image/png", "image/jpg", "image/jpeg", "image/svg+xml"];
const DEFAULT_COLLECTION_MAX: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Single,
    Collection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRules {
    pub mimes: Vec<String>,
    /// Kilobytes for single uploads, file count for collections.
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSpec {
    pub key: String,
    pub rules: UploadRules,
    pub kind: UploadKind,
}

/// Upload rules for the config keys that hold images.
pub fn asset_spec(key: &str) -> Option<AssetSpec> {
    let (kind, max) = match key {
        "app_logo" | "app_logo_white" | "icon_logo" => (UploadKind::Single, 200),
        "avatar_paths" => (UploadKind::Collection, DEFAULT_COLLECTION_MAX as u64),
        _ => return None,
    };
    Some(AssetSpec {
        key: key.to_string(),
        rules: UploadRules {
            mimes: IMAGE_MIMES.iter().map(|m| m.to_string()).collect(),
            max: Some(max),
        },
        kind,
    })
}

pub fn asset_keys() -> [&'static str; 4] {
    ["app_logo", "app_logo_white", "icon_logo", "avatar_paths"]
}

/// A file read from disk, ready to go into a multipart form.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub async fn read(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string())
            .ok_or_else(|| ClientError::Validation(format!("'{}' is not a file name", path.display())))?;
        Ok(LocalFile::new(name, bytes))
    }

    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_guess::from_path(&name).first_or_octet_stream().essence_str().to_string();
        LocalFile { mime, name, bytes }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_part(self) -> Result<Part, ClientError> {
        Ok(Part::bytes(self.bytes).file_name(self.name).mime_str(&self.mime)?)
    }
}

impl UploadRules {
    /// Refuses files whose type is not allowed, or single uploads above the size cap.
    pub fn check(&self, file: &LocalFile, kind: UploadKind) -> Result<(), ClientError> {
        let allowed = self.mimes.iter().any(|m| {
            m == &file.mime || (file.mime == "image/jpeg" && m == "image/jpg")
        });
        if !allowed {
            return Err(ClientError::Validation(format!(
                "{} is {}, expected one of: {}",
                file.name,
                file.mime,
                self.mimes.join(", ")
            )));
        }

        if kind == UploadKind::Single
            && let Some(max_kb) = self.max
            && file.size() > max_kb * 1024
        {
            return Err(ClientError::Validation(format!(
                "{} is {}, the limit is {}",
                file.name,
                format_file_size(file.size()),
                format_file_size(max_kb * 1024)
            )));
        }

        Ok(())
    }
}

/// What the upload card currently holds.
#[derive(Debug, Clone)]
pub struct UploadSelection {
    kind: UploadKind,
    max_files: usize,
    files: Vec<LocalFile>,
}

impl UploadSelection {
    pub fn new(kind: UploadKind, max_files: Option<usize>) -> Self {
        UploadSelection { kind, max_files: max_files.unwrap_or(DEFAULT_COLLECTION_MAX), files: Vec::new() }
    }

    pub fn for_asset(spec: &AssetSpec) -> Self {
        let max = match spec.kind {
            UploadKind::Collection => spec.rules.max.map(|m| m as usize),
            UploadKind::Single => Some(1),
        };
        UploadSelection::new(spec.kind, max)
    }

    /// Single: the first picked file replaces the current one.
    /// Collection: appended, then cut down to the cap.
    pub fn add(&mut self, picked: Vec<LocalFile>) {
        match self.kind {
            UploadKind::Single => {
                if let Some(first) = picked.into_iter().next() {
                    self.files = vec![first];
                }
            }
            UploadKind::Collection => {
                self.files.extend(picked);
                self.files.truncate(self.max_files);
            }
        }
    }

    pub fn into_files(self) -> Vec<LocalFile> {
        self.files
    }
}

/// `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const SIZES: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZES.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZES[unit])
}

/// `app_logo_white` -> `App Logo White`
pub fn format_title(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut at_word_start = true;
    for c in key.chars() {
        let c = if c == '_' { ' ' } else { c };
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}

/// Cosmetic percentage for long uploads. It has nothing to do with bytes on the wire:
/// it climbs to 90 while the request is outstanding.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProgress {
    percent: u8,
}

impl Iterator for SimulatedProgress {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.percent >= 90 {
            return None;
        }
        self.percent += 10;
        Some(self.percent)
    }
}

/// Awaits `request`, logging simulated progress while it runs.
pub async fn with_simulated_progress<F, T>(label: &str, request: F) -> T
where
    F: Future<Output = T>,
{
    let mut progress = SimulatedProgress::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    tokio::pin!(request);

    loop {
        tokio::select! {
            out = &mut request => {
                info!(label, percent = 100, "upload finished");
                return out;
            }
            _ = ticker.tick() => {
                if let Some(percent) = progress.next() {
                    debug!(label, percent, "uploading");
                }
            }
        }
    }
}
