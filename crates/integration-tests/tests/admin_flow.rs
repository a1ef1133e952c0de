//! Admin tools: generation, inventory import, bulk QR export, sidebar menu.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;
use std::io::Cursor;

use tagcard_integration_tests::{TestContext, location};

const ADMIN: &str = "admin@example.com";

#[tokio::test]
async fn test_admin_pages_require_admin() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let user = ctx.owner("user@example.com", "user01").await;

    let anonymous = TestContext::client()
        .get(ctx.url("/admin/unassigned"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 303);
    assert_eq!(location(&anonymous), "/login?next=%2Fadmin%2Funassigned");

    let forbidden = user.get(ctx.url("/admin/unassigned")).send().await.unwrap();
    assert_eq!(forbidden.status(), 403);

    let admin = ctx.owner(ADMIN, "admin1").await;
    let allowed = admin.get(ctx.url("/admin/unassigned")).send().await.unwrap();
    assert_eq!(allowed.status(), 200);
}

#[tokio::test]
async fn test_generate_returns_distinct_shortids() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let admin = ctx.owner(ADMIN, "admin1").await;

    let response = admin
        .post(ctx.url("/admin/generate"))
        .form(&[("n", "5")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-disposition"],
        r#"attachment; filename="generated_tags.csv""#
    );
    let csv = response.text().await.unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("shortid"));
    let ids: HashSet<&str> = lines.collect();
    assert_eq!(ids.len(), 5);
    assert!(ids.iter().all(|id| id.len() == 8));

    let page = admin
        .get(ctx.url("/admin/unassigned"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(ids.iter().all(|id| page.contains(id)));
}

#[tokio::test]
async fn test_inventory_import_reports_counts() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let admin = ctx.owner(ADMIN, "admin1").await;

    let response = admin
        .post(ctx.url("/admin/inventory_import"))
        .form(&[("csv_text", "shortid\nnew001,site-a,srv-b\nadmin1\nnew002\n\n")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/admin/unassigned?import_ok=2&skip=1");

    let page = admin
        .get(ctx.url(location(&response)))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("Imported 2 tag(s)"));
    assert!(page.contains("site-a"));
}

#[tokio::test]
async fn test_qr_zip_contains_existing_tags_only() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let admin = ctx.owner(ADMIN, "admin1").await;
    ctx.seed_tag("zip001").await;
    ctx.seed_tag("zip002").await;

    let response = admin
        .post(ctx.url("/admin/qrzip"))
        .form(&[("ids", "zip001, zip002\nmissing"), ("size", "3"), ("border", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/zip");
    let bytes = response.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, ["qr_zip001.png", "qr_zip002.png"]);
}

#[tokio::test]
async fn test_qr_zip_without_known_ids_is_rejected() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let admin = ctx.owner(ADMIN, "admin1").await;

    let cases = [
        ("", "No shortids given"),
        ("  \n ", "No shortids given"),
        ("missing other", "None of the shortids exist"),
        ("bad!id ??? #", "None of the shortids exist"),
    ];
    for (ids, message) in cases {
        let response = admin
            .post(ctx.url("/admin/qrzip"))
            .form(&[("ids", ids)])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "ids={ids:?}");
        let body = response.text().await.unwrap();
        assert!(body.contains(message), "ids={ids:?}: {body}");
    }
}

#[tokio::test]
async fn test_options_menu_by_role() {
    let ctx = TestContext::with_admins(&[ADMIN]).await;
    let user = ctx.owner("user@example.com", "user01").await;
    let admin = ctx.owner(ADMIN, "admin1").await;

    let fetch = |client: reqwest::Client| {
        let url = ctx.url("/api/options");
        async move {
            client
                .get(url)
                .send()
                .await
                .unwrap()
                .json::<serde_json::Value>()
                .await
                .unwrap()
        }
    };

    let guest = fetch(TestContext::client()).await;
    assert_eq!(guest["role"], "guest");

    let menu = fetch(user).await;
    assert_eq!(menu["role"], "user");
    assert_eq!(menu["sections"][1]["title"], "Tag user01");
    assert_eq!(menu["sections"][1]["items"][0]["url"], "/t/user01");

    let menu = fetch(admin).await;
    assert_eq!(menu["role"], "admin");
    let last = menu["sections"].as_array().unwrap().last().unwrap();
    assert_eq!(last["title"], "Admin");
}
