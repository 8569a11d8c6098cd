use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Only the web app origin may call the API from a browser. An origin that
/// cannot be used as a header value falls back to allowing any origin.
pub fn webapp_cors(webapp_url: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match origin_of(webapp_url).and_then(|o| HeaderValue::from_str(&o).ok()) {
        Some(origin) => base.allow_origin(origin),
        None => {
            tracing::warn!(webapp_url, "WEBAPP_URL has no usable origin; allowing any origin");
            base.allow_origin(Any)
        }
    }
}

fn origin_of(webapp_url: &str) -> Option<String> {
    let url = url::Url::parse(webapp_url).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_default_port() {
        assert_eq!(
            origin_of("https://exams.example.com:443/dashboard").as_deref(),
            Some("https://exams.example.com")
        );
        assert_eq!(
            origin_of("http://localhost:3000/").as_deref(),
            Some("http://localhost:3000")
        );
        assert_eq!(origin_of("not a url"), None);
    }
}
