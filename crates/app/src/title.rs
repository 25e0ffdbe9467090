use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use thiserror::Error;

pub const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Error)]
pub enum TitleError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: StatusCode },
}

/// Thread identity read from the commented page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub uri: String,
    pub title: String,
}

/// Fetches `host + uri` and reads the thread title from the page.
pub async fn fetch_title(client: &Client, host: &str, uri: &str) -> Result<PageInfo, TitleError> {
    let url = format!("{}{}", host.trim_end_matches('/'), uri);
    let response = client.get(&url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(TitleError::Status { url, status });
    }
    let body = response.text().await?;
    Ok(parse_page(&body, uri))
}

/// Prefers the `#isso-thread` container's `data-isso-id` / `data-title`,
/// then `<title>`, then [`DEFAULT_TITLE`].
pub fn parse_page(html: &str, default_uri: &str) -> PageInfo {
    let document = Html::parse_document(html);
    let thread_selector =
        Selector::parse("div#isso-thread, section#isso-thread").expect("selector");
    let title_selector = Selector::parse("title").expect("selector");

    let mut uri = default_uri.to_string();
    if let Some(container) = document.select(&thread_selector).next() {
        if let Some(id) = container.value().attr("data-isso-id") {
            uri = id.to_string();
        }
        if let Some(title) = container.value().attr("data-title") {
            return PageInfo {
                uri,
                title: title.to_string(),
            };
        }
    }

    let title = document
        .select(&title_selector)
        .next()
        .map(|node| node.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    PageInfo { uri, title }
}
