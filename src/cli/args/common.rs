//! Common CLI types shared across commands

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty format - human-optimized rich formatting
    Pretty,
    /// Table format - one row per entry (global default)
    #[default]
    Table,
    /// JSON format - structured for scripts
    Json,
}

/// Content type requested by `fetch`, which drives strategy and fallback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AcceptKind {
    Html,
    Json,
    Image,
    #[default]
    Any,
}

impl AcceptKind {
    /// Value for the `Accept` header
    pub fn header_value(&self) -> &'static str {
        match self {
            AcceptKind::Html => "text/html,application/xhtml+xml",
            AcceptKind::Json => "application/json",
            AcceptKind::Image => "image/avif,image/webp,image/*",
            AcceptKind::Any => "*/*",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpRequest;
    use crate::offline::strategy::{Accepts, Strategy, accepts, classify};

    #[test]
    fn test_accept_kind_drives_classification() {
        let page = HttpRequest::get("http://site.test/articles/")
            .with_header("Accept", AcceptKind::Html.header_value());
        assert_eq!(classify(&page), Strategy::StaleWhileRevalidate);

        let image = HttpRequest::get("http://site.test/avatar")
            .with_header("Accept", AcceptKind::Image.header_value());
        assert_eq!(accepts(&image), Accepts::Image);

        let any = HttpRequest::get("http://site.test/feed")
            .with_header("Accept", AcceptKind::Any.header_value());
        assert_eq!(accepts(&any), Accepts::Other);
    }
}
