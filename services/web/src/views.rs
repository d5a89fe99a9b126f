//! Server-rendered HTML pages

use axum::{http::StatusCode, response::Html};

use crate::{air_quality::AirQuality, models::Identity};

/// Shown on the predict page when the balance cannot cover a prediction
pub const NOT_ENOUGH_TOKENS: &str = "Not enough tokens";

/// Escape text for use in HTML content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    ))
}

fn account_header(identity: &Identity, balance: i64) -> String {
    let avatar = identity
        .picture
        .as_deref()
        .map(|url| format!("<img src=\"{}\" alt=\"\" width=\"32\" height=\"32\"> ", escape(url)))
        .unwrap_or_default();

    format!(
        "<p>{}Signed in as <strong>{}</strong> &middot; <a href=\"/logout\">Logout</a></p>\n\
         <p>Tokens: <span id=\"balance\">{}</span></p>",
        avatar,
        escape(identity.display_name()),
        balance
    )
}

/// Home page: login link or upload form, plus the air-quality index
pub fn home(identity: Option<&Identity>, balance: Option<i64>, aqi: AirQuality) -> Html<String> {
    let account = match identity {
        Some(identity) => format!(
            "{}\n\
             <form action=\"/predict\" method=\"post\" enctype=\"multipart/form-data\">\n\
             <input type=\"file\" name=\"file\" accept=\"image/*\" required>\n\
             <button type=\"submit\">Classify</button>\n\
             </form>",
            account_header(identity, balance.unwrap_or_default())
        ),
        None => "<p><a href=\"/login\">Login with Google</a></p>".to_string(),
    };

    let body = format!(
        "<h1>Waste Classifier</h1>\n{}\n<p>Air quality index: <span id=\"aqi\">{}</span></p>",
        account, aqi
    );

    layout("Waste Classifier", &body)
}

/// Result of a prediction request, either a label or [`NOT_ENOUGH_TOKENS`]
pub fn predict(identity: &Identity, result: &str, balance: i64) -> Html<String> {
    let body = format!(
        "<h1>Prediction</h1>\n{}\n<p>Result: <strong id=\"result\">{}</strong></p>\n\
         <p><a href=\"/\">Classify another image</a></p>",
        account_header(identity, balance),
        escape(result)
    );

    layout("Prediction", &body)
}

pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let body = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back to home</a></p>",
        status,
        escape(message)
    );

    layout(status.canonical_reason().unwrap_or("Error"), &body)
}
