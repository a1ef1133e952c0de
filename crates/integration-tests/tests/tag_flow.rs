//! Claiming, editing, public cards, QR codes and statistics.

#![allow(clippy::unwrap_used)]

use reqwest::multipart::{Form, Part};

use tagcard_integration_tests::{TestContext, location};

fn edit_form(fields: &[(&'static str, &'static str)]) -> Form {
    fields
        .iter()
        .fold(Form::new(), |form, (name, value)| form.text(*name, *value))
}

#[tokio::test]
async fn test_unknown_tag_pages_are_404() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    for path in ["/t/nope99", "/claim-info/nope99", "/qr/nope99"] {
        let response = client.get(ctx.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 404, "{path}");
    }
}

#[tokio::test]
async fn test_unclaimed_tag_redirects_to_claim_info() {
    let ctx = TestContext::new().await;
    ctx.seed_tag("abc123").await;
    let client = TestContext::client();

    let response = client.get(ctx.url("/t/abc123")).send().await.unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/claim-info/abc123");

    let info = client.get(ctx.url("/claim-info/abc123")).send().await.unwrap();
    assert_eq!(info.status(), 200);
    let body = info.text().await.unwrap();
    assert!(body.contains("pending_shortid=abc123"));
}

#[tokio::test]
async fn test_claim_requires_login() {
    let ctx = TestContext::new().await;
    ctx.seed_tag("abc123").await;

    let response = TestContext::client()
        .post(ctx.url("/claim/abc123"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/login?next=%2Fclaim%2Fabc123");
}

#[tokio::test]
async fn test_tag_is_claimed_once() {
    let ctx = TestContext::new().await;
    let alice = ctx.owner("alice@example.com", "alice1").await;
    let bob = ctx.owner("bob@example.com", "bob111").await;
    ctx.seed_tag("shared").await;

    let first = alice.post(ctx.url("/claim/shared")).send().await.unwrap();
    assert_eq!(first.status(), 303);
    assert_eq!(location(&first), "/edit/shared");

    let again = alice.post(ctx.url("/claim/shared")).send().await.unwrap();
    assert_eq!(location(&again), "/edit/shared");

    let stolen = bob.post(ctx.url("/claim/shared")).send().await.unwrap();
    assert_eq!(stolen.status(), 409);

    let edit = bob.get(ctx.url("/edit/shared")).send().await.unwrap();
    assert_eq!(edit.status(), 403);
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let ctx = TestContext::new().await;
    let mut clients = Vec::new();
    for i in 0..4 {
        clients.push(
            ctx.owner(&format!("user{i}@example.com"), &format!("own00{i}"))
                .await,
        );
    }
    ctx.seed_tag("race01").await;

    let url = ctx.url("/claim/race01");
    let attempts = clients.iter().map(|client| {
        let request = client.post(&url);
        async move { request.send().await.unwrap().status() }
    });
    let statuses: Vec<u16> = spawn_all(attempts).await;

    assert_eq!(statuses.iter().filter(|s| **s == 303).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 3);
}

async fn spawn_all<F>(attempts: impl Iterator<Item = F>) -> Vec<u16>
where
    F: std::future::Future<Output = reqwest::StatusCode> + Send + 'static,
{
    let handles: Vec<_> = attempts.map(tokio::spawn).collect();
    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap().as_u16());
    }
    statuses
}

#[tokio::test]
async fn test_edit_normalizes_and_public_view_shows_it() {
    let ctx = TestContext::new().await;
    let client = ctx.owner("jane@example.com", "jane01").await;

    let response = client
        .post(ctx.url("/edit/jane01"))
        .multipart(edit_form(&[
            ("full_name", "Jane Doe"),
            ("title", "Barista"),
            ("description", "Coffee lover from Lisbon"),
            ("link", "jane.example"),
            ("instagram", "@jane"),
            ("linkedin", "jane-doe"),
            ("whatsapp", "+90 555 123 45 67"),
            ("theme_color", "#123456"),
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(location(&response), "/t/jane01");

    let anonymous = TestContext::client();
    let card = anonymous.get(ctx.url("/t/jane01")).send().await.unwrap();
    assert_eq!(card.status(), 200);
    let body = card.text().await.unwrap();
    assert!(body.contains("Jane Doe"));
    assert!(body.contains("Coffee lover from Lisbon"));
    assert!(body.contains("https://instagram.com/jane"));
    assert!(body.contains("https://www.linkedin.com/in/jane-doe"));
    assert!(body.contains("https://jane.example"));
    assert!(body.contains("+905551234567"));
    assert!(body.contains("#123456"));
}

/// Stored values exactly as they are rendered; none contain characters the
/// HTML escaper rewrites.
const RAW_PROFILE: [(&str, &str); 13] = [
    ("full_name", "Raw Name"),
    ("title", "Raw Title"),
    ("description", "raw description text"),
    ("link", "jane.example"),
    ("image_url", "/uploads/raw-avatar.webp"),
    ("phone", "0 555 000 00 00"),
    ("public_email", "Raw.Mail@Example.com"),
    ("instagram", "@raw"),
    ("linkedin", "raw-linkedin"),
    ("facebook", "fb.example/raw"),
    ("whatsapp", "0555 raw"),
    ("iban", "TR00 0000"),
    ("theme_color", "#a1b2c3"),
];

#[tokio::test]
async fn test_public_view_renders_stored_fields_verbatim() {
    let ctx = TestContext::new().await;
    ctx.owner("jane@example.com", "jane01").await;

    let assignments = RAW_PROFILE
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE profile SET {assignments} WHERE tag_id = (SELECT id FROM tag WHERE shortid = ?)"
    );
    let query = RAW_PROFILE
        .iter()
        .fold(sqlx::query(&sql), |query, (_, value)| query.bind(*value));
    let updated = query.bind("jane01").execute(&ctx.pool).await.unwrap();
    assert_eq!(updated.rows_affected(), 1);

    let card = TestContext::client()
        .get(ctx.url("/t/jane01"))
        .send()
        .await
        .unwrap();
    assert_eq!(card.status(), 200);
    let body = card.text().await.unwrap();

    for (column, value) in RAW_PROFILE {
        assert!(body.contains(value), "{column} not rendered as stored: {value}");
    }
    // Reads never normalize.
    assert!(!body.contains("https://instagram.com/raw"));
    assert!(!body.contains("https://jane.example"));
    assert!(!body.contains("TR000000"));
}

#[tokio::test]
async fn test_invalid_theme_color_keeps_previous() {
    let ctx = TestContext::new().await;
    let client = ctx.owner("jane@example.com", "jane01").await;

    for color in ["#123456", "#zzz"] {
        let response = client
            .post(ctx.url("/edit/jane01"))
            .multipart(edit_form(&[("full_name", "Jane"), ("theme_color", color)]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 303);
    }

    let page = client.get(ctx.url("/edit/jane01")).send().await.unwrap();
    let body = page.text().await.unwrap();
    assert!(body.contains(r##"value="#123456""##));
    assert!(!body.contains("#zzz"));
}

#[tokio::test]
async fn test_image_upload_is_served() {
    let ctx = TestContext::new().await;
    let client = ctx.owner("jane@example.com", "jane01").await;
    let bytes = b"\x89PNG\r\n\x1a\nnot really a png".to_vec();

    let form = edit_form(&[("full_name", "Jane")]).part(
        "image",
        Part::bytes(bytes.clone()).file_name("Avatar.PNG"),
    );
    let response = client
        .post(ctx.url("/edit/jane01"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);

    assert!(ctx.upload_dir.join("jane01.png").exists());
    let served = client.get(ctx.url("/uploads/jane01.png")).send().await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().to_vec(), bytes);

    let card = client.get(ctx.url("/t/jane01")).send().await.unwrap();
    assert!(card.text().await.unwrap().contains("/uploads/jane01.png"));
}

#[tokio::test]
async fn test_qr_png() {
    let ctx = TestContext::new().await;
    ctx.seed_tag("abc123").await;

    let response = TestContext::client()
        .get(ctx.url("/qr/abc123?size=4&border=2"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(
        response.headers()["content-disposition"],
        r#"inline; filename="qr_abc123.png""#
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.get(..4), Some(&b"\x89PNG"[..]));
}

#[tokio::test]
async fn test_stats_count_visits_on_one_day() {
    let ctx = TestContext::new().await;
    let client = ctx.owner("jane@example.com", "jane01").await;
    let visitor = TestContext::client();

    for _ in 0..3 {
        let card = visitor.get(ctx.url("/t/jane01")).send().await.unwrap();
        assert_eq!(card.status(), 200);
    }

    let series: serde_json::Value = client
        .get(ctx.url("/api/stats/jane01"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let values: Vec<i64> = series["values"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert_eq!(series["labels"].as_array().unwrap().len(), 7);
    assert_eq!(values.len(), 7);
    // The visits may straddle midnight UTC relative to the stats request,
    // so only the single non-zero day is pinned, not its position.
    let non_zero: Vec<i64> = values.iter().copied().filter(|v| *v != 0).collect();
    assert_eq!(non_zero, vec![3]);

    let page = client.get(ctx.url("/stats/jane01?days=30")).send().await.unwrap();
    assert_eq!(page.status(), 200);
}

#[tokio::test]
async fn test_stats_are_owner_only() {
    let ctx = TestContext::new().await;
    ctx.owner("jane@example.com", "jane01").await;
    let other = ctx.owner("bob@example.com", "bob111").await;

    let api = other.get(ctx.url("/api/stats/jane01")).send().await.unwrap();
    assert_eq!(api.status(), 403);

    let anonymous = TestContext::client()
        .get(ctx.url("/api/stats/jane01"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);
}
