//! Default URL filter and MIME type resolver

use std::sync::Arc;

use mime::Mime;

use crate::types::{MimeTypeResolver, UrlFilter};

pub const FALLBACK_MIME_TYPE: &str = "text/html";

/// Drop everything from the first `?` or `#` on
pub fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(pos) => &url[..pos],
        None => url,
    }
}

/// MIME type for a bare file extension, if known
pub fn mime_type_from_extension(extension: &str) -> Option<Mime> {
    let mime = match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT,
        "json" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN,
        "xml" => mime::TEXT_XML,
        "csv" => mime::TEXT_CSV,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "ico" => "image/x-icon".parse().ok()?,
        "wasm" => "application/wasm".parse().ok()?,
        _ => return None,
    };
    Some(mime)
}

/// MIME type guessed from the extension of the last path segment
pub fn mime_type_for_url(url: &str) -> Option<Mime> {
    let path = strip_query_and_fragment(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = segment.rsplit_once('.')?;
    mime_type_from_extension(extension)
}

pub fn default_url_filter() -> UrlFilter {
    Arc::new(|url: &str| strip_query_and_fragment(url).to_string())
}

/// Extension lookup falling back to `fallback`
pub fn mime_type_resolver_with_fallback(fallback: impl Into<String>) -> MimeTypeResolver {
    let fallback = fallback.into();
    Arc::new(move |url: &str| {
        mime_type_for_url(url)
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| fallback.clone())
    })
}

pub fn default_mime_type_resolver() -> MimeTypeResolver {
    mime_type_resolver_with_fallback(FALLBACK_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query_and_fragment() {
        let base = "http://test.com/ResourceManagerTest/Test";
        for url in [
            base.to_string(),
            format!("{base}?foo=bar"),
            format!("{base}#frag"),
            format!("{base}?foo=bar#frag"),
            format!("{base}#frag?foo=bar"),
        ] {
            assert_eq!(strip_query_and_fragment(&url), base);
        }
    }

    #[test]
    fn test_mime_type_for_url() {
        let resolve = default_mime_type_resolver();
        assert_eq!(resolve("http://test/page.html"), "text/html");
        assert_eq!(resolve("http://test/style.CSS?v=2"), "text/css");
        assert_eq!(resolve("http://test/app.js#main"), "application/javascript");
        assert_eq!(resolve("http://test/logo.png"), "image/png");
        assert_eq!(resolve("http://test/module.wasm"), "application/wasm");
    }

    #[test]
    fn test_mime_type_falls_back() {
        let resolve = default_mime_type_resolver();
        // The dot belongs to the host, not the path
        assert_eq!(resolve("http://test.com/page"), "text/html");
        assert_eq!(resolve("http://test/archive.unknown"), "text/html");

        let plain = mime_type_resolver_with_fallback("text/plain");
        assert_eq!(plain("http://test/README"), "text/plain");
    }

    #[test]
    fn test_default_url_filter() {
        let filter = default_url_filter();
        assert_eq!(filter("http://test/a?b=c"), "http://test/a");
        assert_eq!(filter("http://test/a"), "http://test/a");
    }
}
