//! API Client

use prime_core::{CartItem, DownloadLink};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    files: Vec<DownloadLink>,
}

fn endpoint(path: &str) -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());
    format!("{origin}{path}")
}

async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    let data: serde_json::Value = response.json().await.unwrap_or_default();
    data["error"].as_str().unwrap_or(fallback).to_string()
}

/// Create a hosted checkout session for the cart, returning the redirect URL
pub async fn create_checkout(items: &[CartItem], user_id: Option<&str>) -> Result<String, String> {
    let client = reqwest::Client::new();

    let body = serde_json::json!({
        "items": items,
        "userId": user_id,
    });

    let response = client
        .post(endpoint("/api/checkout"))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        let data: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        data["url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| "Checkout did not return a URL".to_string())
    } else {
        Err(error_message(response, "Failed to create checkout").await)
    }
}

/// Signed download links for a model
pub async fn download_links(model_id: &str) -> Result<Vec<DownloadLink>, String> {
    let response = reqwest::Client::new()
        .get(endpoint(&format!("/api/models/{model_id}/download")))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        let data: DownloadResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(data.files)
    } else {
        Err(error_message(response, "Download failed").await)
    }
}
