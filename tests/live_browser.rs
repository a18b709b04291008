//! End-to-end coverage against a real headless Chromium.
//!
//! - Needs a Chromium/Chrome binary on `PATH` (or `HTMLPRINT_TEST_BROWSER`).
//! - Binds an ephemeral local listener and talks to it over HTTP.
//! - Marked `#[ignore]`; run with `cargo test -- --ignored`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use htmlprint::{
    application::{convert::ConversionService, sanitize::PatternSanitizer},
    config::{BrowserSettings, IdleEvent, RenderSettings},
    infra::{
        browser::ChromiumRenderer,
        http::{HttpState, build_router},
    },
};
use reqwest::{Client, StatusCode, multipart};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn browser_settings() -> BrowserSettings {
    BrowserSettings {
        executable: std::env::var_os("HTMLPRINT_TEST_BROWSER").map(PathBuf::from),
        extra_args: Vec::new(),
        launch_timeout: Duration::from_secs(20),
        page_load_timeout: Duration::from_secs(30),
        idle_event: IdleEvent::NetworkIdle,
    }
}

fn render_settings() -> RenderSettings {
    RenderSettings {
        wrapper_id: "awesomewrap".to_string(),
        page_width_mm: 210.0,
        max_concurrent_sessions: None,
    }
}

async fn spawn_server() -> TestResult<SocketAddr> {
    let renderer = ChromiumRenderer::new(browser_settings(), render_settings());
    let conversions = ConversionService::new(Arc::new(PatternSanitizer), Arc::new(renderer));
    let router = build_router(HttpState {
        conversions,
        upload_limit_bytes: 5 * 1024 * 1024,
        production: false,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });
    Ok(addr)
}

#[tokio::test]
#[ignore]
async fn live_text_upload_returns_pdf() -> TestResult<()> {
    let addr = spawn_server().await?;
    let client = Client::builder().build()?;

    let form = multipart::Form::new().text("htmlInput", "<h1>Hello</h1>");
    let response = client
        .post(format!("http://{addr}/upload"))
        .multipart(form)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str()?,
        "application/pdf"
    );
    let body = response.bytes().await?;
    assert!(body.starts_with(b"%PDF"));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_wrapper_is_removed_before_printing() -> TestResult<()> {
    let addr = spawn_server().await?;
    let client = Client::builder().build()?;

    let short = "<p>content</p>";
    let wrapped = format!(
        "<div id=\"awesomewrap\" style=\"height:4000px\">toolbar</div>{short}"
    );

    let mut sizes = Vec::new();
    for html in [short.to_string(), wrapped] {
        let form = multipart::Form::new()
            .part("htmlFile", multipart::Part::bytes(html.into_bytes()).file_name("page.html"));
        let response = client
            .post(format!("http://{addr}/upload"))
            .multipart(form)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        sizes.push(response.bytes().await?);
    }

    // Both pages are sized to the same content once the wrapper is gone.
    let short_pdf = String::from_utf8_lossy(&sizes[0]).into_owned();
    let wrapped_pdf = String::from_utf8_lossy(&sizes[1]).into_owned();
    let media_box = |pdf: &str| {
        pdf.find("/MediaBox")
            .map(|start| pdf[start..].chars().take_while(|c| *c != ']').collect::<String>())
    };
    assert_eq!(media_box(&short_pdf), media_box(&wrapped_pdf));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn live_concurrent_uploads_succeed() -> TestResult<()> {
    let addr = spawn_server().await?;
    let client = Client::builder().build()?;

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let form = multipart::Form::new().text("htmlInput", format!("<p>doc {i}</p>"));
                let response = client
                    .post(format!("http://{addr}/upload"))
                    .multipart(form)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, body))
            })
        })
        .collect();

    for task in tasks {
        let (status, body) = task.await??;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"%PDF"));
    }
    Ok(())
}
