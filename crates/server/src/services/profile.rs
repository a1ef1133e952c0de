//! Profile editing: input normalization and avatar storage.
//!
//! Normalization happens once, on write. Reads return stored values as-is.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;

use tagcard_core::Shortid;

use super::tags::TagError;
use crate::db::profiles::ProfileRepository;
use crate::models::{Profile, ProfileUpdate, Tag};

/// Accepted avatar extensions; anything else is stored as `jpg`.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const INSTAGRAM_PREFIX: &str = "https://instagram.com/";
const FACEBOOK_PREFIX: &str = "https://facebook.com/";
const LINKEDIN_ORIGIN: &str = "https://www.linkedin.com";

/// Raw edit form values, before trimming and normalization.
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub full_name: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub phone: String,
    pub public_email: String,
    pub instagram: String,
    pub linkedin: String,
    pub facebook: String,
    pub whatsapp: String,
    pub iban: String,
    pub theme_color: String,
}

/// An uploaded avatar.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Turn raw form input into the values to store.
#[must_use]
pub fn normalize(form: &ProfileForm) -> ProfileUpdate {
    ProfileUpdate {
        full_name: clean(&form.full_name),
        title: clean(&form.title),
        description: clean(&form.description),
        link: clean(&form.link).map(|v| {
            if v.starts_with("http") {
                v
            } else {
                format!("https://{v}")
            }
        }),
        phone: clean(&form.phone),
        public_email: clean(&form.public_email),
        instagram: social_url(&form.instagram, INSTAGRAM_PREFIX),
        linkedin: linkedin_url(&form.linkedin),
        facebook: social_url(&form.facebook, FACEBOOK_PREFIX),
        whatsapp: without_spaces(&form.whatsapp),
        iban: without_spaces(&form.iban),
        theme_color: theme_color(&form.theme_color),
        image_url: None,
    }
}

/// Trimmed value, `None` when nothing is left.
fn clean(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn social_url(raw: &str, prefix: &str) -> Option<String> {
    let value = clean(raw)?;
    if value.starts_with("http") {
        return Some(value);
    }
    Some(format!("{prefix}{}", value.trim_start_matches('@')))
}

fn linkedin_url(raw: &str) -> Option<String> {
    let value = clean(raw)?;
    if value.starts_with("http") {
        return Some(value);
    }
    let handle = value.trim_start_matches('@');
    if handle.starts_with("/in/") {
        Some(format!("{LINKEDIN_ORIGIN}{handle}"))
    } else {
        Some(format!("{LINKEDIN_ORIGIN}/in/{handle}"))
    }
}

fn without_spaces(raw: &str) -> Option<String> {
    let value: String = raw.trim().chars().filter(|c| *c != ' ').collect();
    (!value.is_empty()).then_some(value)
}

/// `#rgb` or `#rrggbb` only; `None` keeps the stored color.
fn theme_color(raw: &str) -> Option<String> {
    let value = raw.trim();
    let digits = value.strip_prefix('#')?;
    let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| value.to_owned())
}

/// Lowercased extension of `file_name` if accepted, otherwise `jpg`.
#[must_use]
pub fn image_extension(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    IMAGE_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .unwrap_or("jpg")
}

/// Write the avatar as `{upload_dir}/{shortid}.{ext}` and return its public URL.
///
/// Images stored earlier under another extension are removed so each tag
/// has at most one.
///
/// # Errors
///
/// Returns the underlying I/O error if the directory or file cannot be written.
pub async fn store_image(
    upload_dir: &Path,
    shortid: &Shortid,
    upload: &ImageUpload,
) -> std::io::Result<String> {
    let ext = image_extension(&upload.file_name);
    tokio::fs::create_dir_all(upload_dir).await?;

    let file_name = format!("{shortid}.{ext}");
    tokio::fs::write(upload_dir.join(&file_name), &upload.bytes).await?;

    for other in IMAGE_EXTENSIONS.iter().filter(|e| **e != ext) {
        match tokio::fs::remove_file(upload_dir.join(format!("{shortid}.{other}"))).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    Ok(format!("/uploads/{file_name}"))
}

/// Profile service.
pub struct ProfileService<'a> {
    profiles: ProfileRepository<'a>,
    upload_dir: &'a Path,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, upload_dir: &'a Path) -> Self {
        Self {
            profiles: ProfileRepository::new(pool),
            upload_dir,
        }
    }

    /// The profile to prefill the edit form with, created empty if missing.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Repository` if the lookup fails.
    pub async fn for_edit(&self, tag: &Tag) -> Result<Profile, TagError> {
        Ok(self.profiles.get_or_create(tag.id, Utc::now()).await?)
    }

    /// Apply an owner's edit to the tag's profile, creating it if needed.
    ///
    /// The caller has already checked ownership.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Io` if the image cannot be stored and
    /// `TagError::Repository` if the write fails.
    pub async fn edit(
        &self,
        tag: &Tag,
        form: &ProfileForm,
        image: Option<&ImageUpload>,
    ) -> Result<Profile, TagError> {
        let mut update = normalize(form);

        if let Some(upload) = image.filter(|u| !u.file_name.is_empty() && !u.bytes.is_empty()) {
            update.image_url = Some(store_image(self.upload_dir, &tag.shortid, upload).await?);
        }

        let profile = self.profiles.upsert(tag.id, &update, Utc::now()).await?;
        tracing::info!(shortid = %tag.shortid, "Profile updated");
        Ok(profile)
    }
}
