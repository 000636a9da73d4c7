//! Live audits against a local fixture site.

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use bagsite::audit::{crawl_canonicals, propose_redirects, RedirectRule};
use bagsite::config::Config;
use bagsite::consent::{run_ads_txt, run_consent};

fn page(origin: &str, canonical: &str, og: Option<&str>, links: &[&str]) -> String {
    let og = og
        .map(|u| format!("<meta property=\"og:url\" content=\"{}{}\">", origin, u))
        .unwrap_or_default();
    let anchors: String = links
        .iter()
        .map(|l| format!("<a href=\"{}\">link</a>\n", l))
        .collect();
    format!(
        "<html><head><link rel=\"canonical\" href=\"{}{}\">{}</head><body>{}</body></html>",
        origin, canonical, og, anchors
    )
}

/// Serves `/`, `/good/`, `/bad/` and the unlinked `/orphan/`, a sitemap
/// listing them, working redirects for `/good` and `/orphan` (both forms),
/// and none for `/bad`.
async fn spawn_site() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());

    let home = page(
        &origin,
        "/",
        Some("/"),
        &["/good/", "bad/?utm=x#top", "/missing/", "https://elsewhere.test/", "mailto:a@b.test"],
    );
    let good = page(&origin, "/good/", Some("/good"), &["/", "/deep/"]);
    let bad = page(&origin, "/other/", None, &["/"]);
    let deep = page(&origin, "/deep/", Some("/deep/"), &[]);
    let orphan = page(&origin, "/orphan/", Some("/orphan/"), &[]);
    let sitemap = format!(
        "<?xml version=\"1.0\"?><urlset><url><loc>{o}/bad/</loc></url><url><loc>{o}/</loc></url><url><loc>{o}/good/</loc></url><url><loc>{o}/orphan/</loc></url></urlset>",
        o = origin
    );

    let app = Router::new()
        .route("/", get(move || async move { Html(home) }))
        .route("/good/", get(move || async move { Html(good) }))
        .route("/bad/", get(move || async move { Html(bad) }))
        .route("/deep/", get(move || async move { Html(deep) }))
        .route("/orphan/", get(move || async move { Html(orphan) }))
        .route("/sitemap.xml", get(move || async move { sitemap }))
        .route(
            "/good",
            get(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/good/")]).into_response() }),
        )
        .route("/good.html", get(|| async { Redirect::permanent("/good/") }))
        .route("/orphan", get(|| async { Redirect::permanent("/orphan/") }))
        .route("/orphan.html", get(|| async { Redirect::permanent("/orphan/") }))
        .route("/bad", get(|| async { Html("<html></html>") }));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    origin
}

fn config_for(origin: &str) -> Config {
    let mut cfg = Config::minimal();
    cfg.site.origin = origin.to_string();
    cfg.crawl.delay_ms = 0;
    cfg.crawl.timeout_secs = 5;
    cfg
}

#[tokio::test]
async fn test_crawl_reports_bad_and_unreachable_pages() {
    let origin = spawn_site().await;
    let report = crawl_canonicals(&config_for(&origin)).await.unwrap();

    let audited: Vec<String> = report.pages.iter().map(|p| p.url.clone()).collect();
    assert_eq!(
        audited,
        vec![
            format!("{}/", origin),
            format!("{}/good/", origin),
            format!("{}/bad/", origin),
            format!("{}/missing/", origin),
            format!("{}/deep/", origin),
        ]
    );

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 2);
    assert_eq!(
        failed[0].issues,
        vec![
            "Missing og:url".to_string(),
            format!("Canonical mismatch -> {}/other/", origin),
        ]
    );
    assert!(failed[1].issues[0].starts_with("Fetch failed"));
    assert!(!failed[1].fetched);

    let coverage = report.coverage().unwrap();
    assert_eq!(coverage.missing_from_sitemap, vec![format!("{}/deep/", origin)]);
    assert_eq!(coverage.unreached, vec![format!("{}/orphan/", origin)]);
}

#[tokio::test]
async fn test_crawl_respects_depth_and_page_limits() {
    let origin = spawn_site().await;

    let mut cfg = config_for(&origin);
    cfg.crawl.max_depth = 1;
    let report = crawl_canonicals(&cfg).await.unwrap();
    assert!(!report.pages.iter().any(|p| p.url.ends_with("/deep/")));

    let mut cfg = config_for(&origin);
    cfg.crawl.max_pages = 2;
    let report = crawl_canonicals(&cfg).await.unwrap();
    assert_eq!(report.pages.len(), 2);
    assert_eq!(report.visited, 2);
}

#[tokio::test]
async fn test_redirect_audit_proposes_missing_rules() {
    let origin = spawn_site().await;
    let rules = propose_redirects(&config_for(&origin)).await.unwrap();
    assert_eq!(
        rules,
        vec![
            RedirectRule {
                from: "/bad".into(),
                to: "/bad/".into()
            },
            RedirectRule {
                from: "/bad.html".into(),
                to: "/bad/".into()
            },
        ]
    );

    let mut cfg = config_for(&origin);
    cfg.crawl.max_redirect_suggestions = 1;
    assert_eq!(propose_redirects(&cfg).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_redirect_audit_falls_back_to_home_without_sitemap() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let app = Router::new().route("/", get(|| async { Html("<html></html>") }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let rules = propose_redirects(&config_for(&origin)).await.unwrap();
    assert!(rules.is_empty());
}

/// Serves `home` at `/` and, when given, `ads` at `/ads.txt`. No sitemap.
async fn spawn_home(home: &'static str, ads: Option<&'static str>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let mut app = Router::new().route("/", get(move || async move { Html(home) }));
    if let Some(body) = ads {
        app = app.route("/ads.txt", get(move || async move { body }));
    }
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    origin
}

fn ads_config(origin: &str) -> Config {
    let mut cfg = config_for(origin);
    cfg.tags.adsense_client = Some("ca-pub-1234567890123456".to_string());
    cfg
}

#[tokio::test]
async fn test_ads_txt_audit_requires_publisher_record() {
    let origin = spawn_home(
        "<html></html>",
        Some("# sellers\ngoogle.com, pub-1234567890123456, DIRECT, f08c47fec0942fa0\n"),
    )
    .await;
    assert!(run_ads_txt(&ads_config(&origin)).await.unwrap());

    let origin = spawn_home(
        "<html></html>",
        Some("google.com, pub-9999999999999999, DIRECT, f08c47fec0942fa0\n"),
    )
    .await;
    assert!(!run_ads_txt(&ads_config(&origin)).await.unwrap());

    let origin = spawn_home("<html></html>", None).await;
    assert!(!run_ads_txt(&ads_config(&origin)).await.unwrap());

    let mut cfg = ads_config(&origin);
    cfg.tags.adsense_client = None;
    assert!(run_ads_txt(&cfg).await.is_err());
}

const CONSENT_FIRST: &str = r#"<html><head>
<script src="https://cmp.gatekeeperconsent.com/min.js"></script>
<script src="https://fundingchoicesmessages.google.com/i/pub-1234567890123456?ers=1"></script>
<script>
window.dataLayer = window.dataLayer || [];
function gtag(){dataLayer.push(arguments);}
gtag('consent', 'default', {ad_storage: 'denied', ad_user_data: 'denied', ad_personalization: 'denied', analytics_storage: 'denied'});
</script>
<script>(function(w,d,s,l,i){j.src='https://www.googletagmanager.com/gtm.js?id='+i;})(window,document,'script','dataLayer','GTM-TCG7SMDD');</script>
</head><body></body></html>"#;

const LOADER_FIRST: &str = r#"<html><head>
<script async src="https://www.googletagmanager.com/gtag/js?id=G-ABC123"></script>
<script>
gtag('consent', 'default', {ad_storage: 'denied', analytics_storage: 'denied'});
</script>
</head><body></body></html>"#;

#[tokio::test]
async fn test_consent_audit_checks_default_and_cmp_order() {
    let origin = spawn_home(CONSENT_FIRST, None).await;
    assert!(run_consent(&config_for(&origin), None).await.unwrap());

    let origin = spawn_home(LOADER_FIRST, None).await;
    assert!(!run_consent(&config_for(&origin), None).await.unwrap());

    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("index.html");
    std::fs::write(&file, CONSENT_FIRST).unwrap();
    assert!(run_consent(&config_for("https://shop.test"), Some(&file)).await.unwrap());
}

#[tokio::test]
async fn test_crawl_flags_off_site_canonical_with_query() {
    let origin = spawn_home(
        r#"<html><head><link rel="canonical" href="https://elsewhere.test/?ref=1"><meta property="og:url" content="https://elsewhere.test/?ref=1"></head></html>"#,
        None,
    )
    .await;
    let report = crawl_canonicals(&config_for(&origin)).await.unwrap();

    assert_eq!(report.pages.len(), 1);
    let issues = &report.pages[0].issues;
    assert!(issues.contains(&"Canonical must be http".to_string()), "{:?}", issues);
    assert!(issues.contains(&format!("Canonical origin must be {}", origin)), "{:?}", issues);
    assert!(issues.contains(&"Canonical must not include query".to_string()), "{:?}", issues);
    assert!(issues.contains(&"Canonical mismatch -> https://elsewhere.test/?ref=1".to_string()));
    assert!(report.sitemap.is_none());
    assert!(report.coverage().is_none());
}
