//! Cloudflare Turnstile token verification.

use reqwest::Client;
use serde::Deserialize;
use tracing::{error, warn};

#[derive(Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
}

/// Ask the siteverify endpoint whether `token` is valid.
///
/// Any failure along the way (no secret, network, unparsable reply) counts
/// as an invalid token.
pub async fn verify_turnstile(
    client: &Client,
    verify_url: &str,
    secret: Option<&str>,
    token: &str,
) -> bool {
    let Some(secret) = secret else {
        warn!("Captcha check requested but TURNSTILE_SECRET_KEY is not configured");
        return false;
    };

    let response = match client
        .post(verify_url)
        .form(&[("secret", secret), ("response", token)])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Captcha validation request failed");
            return false;
        }
    };

    match response.json::<SiteverifyResponse>().await {
        Ok(body) => body.success,
        Err(e) => {
            error!(error = %e, "Captcha validation response was not valid JSON");
            false
        }
    }
}
