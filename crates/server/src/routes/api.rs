//! JSON endpoints for the page scripts.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::db::tags::TagRepository;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::{CurrentUser, OwnedTagSummary};
use crate::state::AppState;

/// Sidebar menu served by `/api/options`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OptionsMenu {
    pub role: &'static str,
    pub sections: Vec<MenuSection>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MenuSection {
    pub title: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MenuItem {
    pub name: &'static str,
    pub url: String,
    /// Bootstrap Icons name, without the `bi-` prefix.
    pub icon: &'static str,
}

fn item(name: &'static str, url: impl Into<String>, icon: &'static str) -> MenuItem {
    MenuItem {
        name,
        url: url.into(),
        icon,
    }
}

/// Build the menu for a visitor. `tags` are the user's own tags.
#[must_use]
pub fn build_menu(
    user: Option<&CurrentUser>,
    tags: &[OwnedTagSummary],
    purchase_url: &str,
) -> OptionsMenu {
    let Some(user) = user else {
        return OptionsMenu {
            role: "guest",
            sections: vec![MenuSection {
                title: "Welcome".to_string(),
                items: vec![
                    item("Sign in", "/login", "box-arrow-in-right"),
                    item("Buy a tag", purchase_url, "bag"),
                ],
            }],
        };
    };

    let mut sections = vec![MenuSection {
        title: "Quick actions".to_string(),
        items: vec![item("Dashboard", "/dashboard", "speedometer2")],
    }];

    sections.extend(tags.iter().map(|tag| {
        let s = &tag.shortid;
        MenuSection {
            title: format!("Tag {s}"),
            items: vec![
                item("View profile", format!("/t/{s}"), "person-badge"),
                item("Edit profile", format!("/edit/{s}"), "pencil-square"),
                item("Statistics", format!("/stats/{s}"), "graph-up"),
                item("QR code", format!("/qr/{s}"), "qr-code"),
            ],
        }
    }));

    if user.is_admin {
        sections.push(MenuSection {
            title: "Admin".to_string(),
            items: vec![
                item("Unassigned tags", "/admin/unassigned", "card-list"),
                item("CSV inventory", "/admin/unassigned#csv", "upload"),
                item("QR ZIP export", "/admin/unassigned#qr", "folder-symlink"),
            ],
        });
    }

    OptionsMenu {
        role: if user.is_admin { "admin" } else { "user" },
        sections,
    }
}

/// Role-dependent sidebar menu.
pub async fn options(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<OptionsMenu>> {
    let tags = match &user {
        Some(user) => {
            TagRepository::new(state.pool())
                .list_owned_with_counts(user.id)
                .await?
        }
        None => Vec::new(),
    };

    Ok(Json(build_menu(
        user.as_ref(),
        &tags,
        &state.config().purchase_url,
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tagcard_core::{Email, Shortid, UserId};

    use super::*;

    fn user(is_admin: bool) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            email: Email::parse("owner@example.com").unwrap(),
            name: None,
            is_admin,
        }
    }

    fn summary(shortid: &str) -> OwnedTagSummary {
        OwnedTagSummary {
            shortid: Shortid::parse(shortid).unwrap(),
            clicks: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_guest_menu() {
        let menu = build_menu(None, &[], "https://shop.example/buy");
        assert_eq!(menu.role, "guest");
        assert_eq!(menu.sections.len(), 1);
        assert_eq!(menu.sections[0].items[1].url, "https://shop.example/buy");
    }

    #[test]
    fn test_user_menu_lists_tags() {
        let menu = build_menu(Some(&user(false)), &[summary("abc123")], "x");
        assert_eq!(menu.role, "user");
        assert_eq!(menu.sections.len(), 2);
        assert_eq!(menu.sections[1].title, "Tag abc123");
        let urls: Vec<&str> = menu.sections[1].items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, ["/t/abc123", "/edit/abc123", "/stats/abc123", "/qr/abc123"]);
    }

    #[test]
    fn test_admin_menu() {
        let menu = build_menu(Some(&user(true)), &[], "x");
        assert_eq!(menu.role, "admin");
        assert_eq!(
            menu.sections.last().map(|s| s.title.as_str()),
            Some("Admin")
        );
    }

    #[test]
    fn test_menu_json_shape() {
        let json = serde_json::to_value(build_menu(None, &[], "/buy")).unwrap();
        assert_eq!(json["role"], "guest");
        assert_eq!(json["sections"][0]["items"][0]["icon"], "box-arrow-in-right");
    }
}
