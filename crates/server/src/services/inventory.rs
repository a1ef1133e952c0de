//! Tag inventory: shortid generation and CSV import.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sqlx::SqlitePool;

use tagcard_core::Shortid;

use crate::db::RepositoryError;
use crate::db::tags::TagRepository;

pub const DEFAULT_GENERATE: u32 = 10;
pub const MAX_GENERATE: u32 = 1000;

/// Attachment name for generated shortids.
pub const GENERATED_CSV_NAME: &str = "generated_tags.csv";

/// Clamp a requested batch size to `[1, MAX_GENERATE]`; absent means `DEFAULT_GENERATE`.
#[must_use]
pub fn clamp_count(requested: Option<i64>) -> u32 {
    requested.map_or(DEFAULT_GENERATE, |n| {
        u32::try_from(n.clamp(1, i64::from(MAX_GENERATE))).unwrap_or(DEFAULT_GENERATE)
    })
}

/// Draw a random shortid candidate.
///
/// URL-safe base64 of random bytes with `-` and `_` removed, cut to
/// `Shortid::GENERATED_LENGTH`.
#[must_use]
pub fn generate_candidate() -> Shortid {
    let mut rng = rand::rng();
    loop {
        let mut bytes = [0u8; 9];
        rng.fill_bytes(&mut bytes);
        let candidate: String = URL_SAFE_NO_PAD
            .encode(bytes)
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .take(Shortid::GENERATED_LENGTH)
            .collect();
        if candidate.len() == Shortid::GENERATED_LENGTH
            && let Ok(shortid) = Shortid::parse(&candidate)
        {
            return shortid;
        }
    }
}

/// Render shortids as the download CSV.
#[must_use]
pub fn render_csv(shortids: &[Shortid]) -> String {
    let mut out = format!("{CSV_HEADER}\n");
    for shortid in shortids {
        out.push_str(shortid.as_str());
        out.push('\n');
    }
    out
}

/// One line of an inventory file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLine {
    pub shortid: String,
    pub site_code: Option<String>,
    pub server_code: Option<String>,
}

const CSV_HEADER: &str = "shortid";

/// Split inventory text into lines. Blank lines and the `shortid` header
/// written by [`render_csv`] are dropped.
///
/// The first comma-separated field is the shortid; the optional second and
/// third fields are the site and server codes.
#[must_use]
pub fn parse_import(text: &str) -> Vec<ImportLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut fields = line.split(',').map(str::trim);
            let shortid = fields
                .next()
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(CSV_HEADER))?
                .to_owned();
            let mut optional = || {
                fields
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            };
            let site_code = optional();
            let server_code = optional();
            Some(ImportLine {
                shortid,
                site_code,
                server_code,
            })
        })
        .collect()
}

/// Outcome of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub skipped: usize,
}

/// Inventory service.
pub struct InventoryService<'a> {
    tags: TagRepository<'a>,
}

impl<'a> InventoryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            tags: TagRepository::new(pool),
        }
    }

    /// Provision `count` fresh unowned tags.
    ///
    /// Collisions with existing shortids are retried with a new candidate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` for anything other than a shortid collision.
    pub async fn generate(&self, count: u32) -> Result<Vec<Shortid>, RepositoryError> {
        let mut created = Vec::with_capacity(count as usize);
        while created.len() < count as usize {
            let candidate = generate_candidate();
            match self.tags.insert(&candidate, None, None).await {
                Ok(tag) => created.push(tag.shortid),
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(shortid = %candidate, "Shortid collision, redrawing");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(count = created.len(), "Generated tags");
        Ok(created)
    }

    /// Import inventory text. Existing or malformed shortids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a write fails for a reason other than a
    /// duplicate shortid.
    pub async fn import(&self, text: &str) -> Result<ImportReport, RepositoryError> {
        let mut report = ImportReport::default();
        for line in parse_import(text) {
            let Ok(shortid) = Shortid::parse(&line.shortid) else {
                tracing::debug!(shortid = %line.shortid, "Skipping malformed shortid");
                report.skipped += 1;
                continue;
            };
            match self
                .tags
                .insert(&shortid, line.site_code.as_deref(), line.server_code.as_deref())
                .await
            {
                Ok(_) => report.created += 1,
                Err(RepositoryError::Conflict(_)) => report.skipped += 1,
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            created = report.created,
            skipped = report.skipped,
            "Inventory imported"
        );
        Ok(report)
    }
}
