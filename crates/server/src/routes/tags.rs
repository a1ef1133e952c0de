//! Tag route handlers: scan landing, claiming, public card and editing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::instrument;

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::auth::login_url;
use crate::middleware::{ClientInfo, OptionalAuth, RequireAuth};
use crate::models::Profile;
use crate::services::profile::{ImageUpload, ProfileForm, ProfileService};
use crate::services::tags::{ClaimOutcome, PublicView, TagError, TagService};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Shown for any tag page whose shortid is unknown.
#[derive(Template, WebTemplate)]
#[template(path = "tags/not_found.html")]
pub struct TagNotFoundTemplate {
    pub shortid: String,
    pub purchase_url: String,
    pub support_email: String,
}

/// Landing page for a scanned tag.
#[derive(Template, WebTemplate)]
#[template(path = "tags/claim_info.html")]
pub struct ClaimInfoTemplate {
    pub shortid: String,
    pub logged_in: bool,
    pub already_claimed: bool,
    pub is_owner: bool,
    pub edit_url: Option<String>,
    pub login_url: Option<String>,
    pub register_url: Option<String>,
    pub claim_url: String,
    pub support_email: String,
}

/// Claim confirmation form.
#[derive(Template, WebTemplate)]
#[template(path = "tags/claim.html")]
pub struct ClaimTemplate {
    pub shortid: String,
    pub error: Option<String>,
}

/// The public card.
#[derive(Template, WebTemplate)]
#[template(path = "tags/profile.html")]
pub struct ProfileTemplate {
    pub shortid: String,
    pub profile: Option<Profile>,
    pub theme_color: String,
}

/// Owner's edit form.
#[derive(Template, WebTemplate)]
#[template(path = "tags/edit.html")]
pub struct EditTemplate {
    pub shortid: String,
    pub profile: Profile,
    pub theme_color: String,
}

/// Render the tag 404 page for `shortid`.
#[must_use]
pub fn tag_not_found(state: &AppState, shortid: &str) -> Response {
    let config = state.config();
    (
        StatusCode::NOT_FOUND,
        TagNotFoundTemplate {
            shortid: shortid.to_string(),
            purchase_url: config.purchase_url.clone(),
            support_email: config.support_email.clone(),
        },
    )
        .into_response()
}

/// Map a tag error, using the tag 404 page for unknown shortids.
fn tag_error(state: &AppState, shortid: &str, err: TagError) -> Response {
    match err {
        TagError::NotFound => tag_not_found(state, shortid),
        other => AppError::from(other).into_response(),
    }
}

// =============================================================================
// Scan landing
// =============================================================================

/// Landing page reached by scanning an unclaimed tag.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn claim_info(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(shortid): Path<String>,
) -> Response {
    let tag = match TagService::new(state.pool()).find(&shortid).await {
        Ok(tag) => tag,
        Err(e) => return tag_error(&state, &shortid, e),
    };

    let support_email = state.config().support_email.clone();
    let claim_path = format!("/claim/{}", tag.shortid);

    if tag.is_claimed() {
        let is_owner = user.as_ref().is_some_and(|u| tag.is_owned_by(u.id));
        return ClaimInfoTemplate {
            shortid: tag.shortid.to_string(),
            logged_in: user.is_some(),
            already_claimed: true,
            is_owner,
            edit_url: is_owner.then(|| format!("/edit/{}", tag.shortid)),
            login_url: None,
            register_url: None,
            claim_url: claim_path,
            support_email,
        }
        .into_response();
    }

    ClaimInfoTemplate {
        shortid: tag.shortid.to_string(),
        logged_in: user.is_some(),
        already_claimed: false,
        is_owner: false,
        edit_url: None,
        login_url: Some(login_url(&claim_path)),
        register_url: Some(format!(
            "/register?pending_shortid={}&next={}",
            tag.shortid,
            urlencoding::encode(&claim_path)
        )),
        claim_url: claim_path,
        support_email,
    }
    .into_response()
}

// =============================================================================
// Claim
// =============================================================================

/// Display the claim confirmation form.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn claim_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
) -> Response {
    let tag = match TagService::new(state.pool()).find(&shortid).await {
        Ok(tag) => tag,
        Err(e) => return tag_error(&state, &shortid, e),
    };

    if tag.is_owned_by(user.id) {
        return Redirect::to(&format!("/edit/{}", tag.shortid)).into_response();
    }
    if tag.is_claimed() {
        return AppError::Forbidden("This tag belongs to another account".into()).into_response();
    }

    ClaimTemplate {
        shortid: tag.shortid.to_string(),
        error: None,
    }
    .into_response()
}

/// Claim the tag for the signed-in user.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn claim(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
) -> Response {
    match TagService::new(state.pool()).claim(&shortid, user.id).await {
        Ok(outcome) => {
            if outcome == ClaimOutcome::Claimed {
                add_breadcrumb("tag", "Claimed tag", Some(&[("shortid", shortid.as_str())]));
            }
            Redirect::to(&format!("/edit/{shortid}")).into_response()
        }
        Err(TagError::ClaimedByOther) => (
            StatusCode::CONFLICT,
            ClaimTemplate {
                shortid,
                error: Some("This tag has already been claimed by another account.".into()),
            },
        )
            .into_response(),
        Err(e) => tag_error(&state, &shortid, e),
    }
}

// =============================================================================
// Public card
// =============================================================================

/// The public card for a claimed tag. Each view is logged as a click.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn public_tag(
    State(state): State<AppState>,
    ClientInfo(visitor): ClientInfo,
    Path(shortid): Path<String>,
) -> Response {
    match TagService::new(state.pool())
        .public_view(&shortid, &visitor)
        .await
    {
        Ok(PublicView::Unclaimed) => Redirect::to(&format!("/claim-info/{shortid}")).into_response(),
        Ok(PublicView::Card(tag, profile)) => {
            let theme_color = profile
                .as_ref()
                .map_or(crate::models::profile::DEFAULT_THEME_COLOR, Profile::theme_color_or_default)
                .to_string();
            ProfileTemplate {
                shortid: tag.shortid.to_string(),
                profile,
                theme_color,
            }
            .into_response()
        }
        Err(e) => tag_error(&state, &shortid, e),
    }
}

// =============================================================================
// Edit
// =============================================================================

/// Display the edit form.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn edit_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
) -> Response {
    let tag = match TagService::new(state.pool())
        .find_owned(&shortid, user.id)
        .await
    {
        Ok(tag) => tag,
        Err(e) => return tag_error(&state, &shortid, e),
    };

    match ProfileService::new(state.pool(), &state.config().upload_dir)
        .for_edit(&tag)
        .await
    {
        Ok(profile) => EditTemplate {
            shortid: tag.shortid.to_string(),
            theme_color: profile.theme_color_or_default().to_string(),
            profile,
        }
        .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Handle the multipart edit form.
#[instrument(skip_all, fields(shortid = %shortid))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(shortid): Path<String>,
    multipart: Multipart,
) -> Response {
    let tag = match TagService::new(state.pool())
        .find_owned(&shortid, user.id)
        .await
    {
        Ok(tag) => tag,
        Err(e) => return tag_error(&state, &shortid, e),
    };

    let (form, image) = match read_edit_form(multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };

    match ProfileService::new(state.pool(), &state.config().upload_dir)
        .edit(&tag, &form, image.as_ref())
        .await
    {
        Ok(_) => Redirect::to(&format!("/t/{}", tag.shortid)).into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Collect the edit form's text fields and optional `image` file.
async fn read_edit_form(
    mut multipart: Multipart,
) -> Result<(ProfileForm, Option<ImageUpload>), AppError> {
    let mut form = ProfileForm::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            image = Some(ImageUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let slot = match name.as_str() {
            "full_name" => &mut form.full_name,
            "title" => &mut form.title,
            "description" => &mut form.description,
            "link" => &mut form.link,
            "phone" => &mut form.phone,
            "public_email" => &mut form.public_email,
            "instagram" => &mut form.instagram,
            "linkedin" => &mut form.linkedin,
            "facebook" => &mut form.facebook,
            "whatsapp" => &mut form.whatsapp,
            "iban" => &mut form.iban,
            "theme_color" => &mut form.theme_color,
            _ => continue,
        };
        *slot = value;
    }

    Ok((form, image))
}
