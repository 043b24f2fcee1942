//! Query resolution: plain text passes through, URLs are fetched and
//! reduced to visible page text.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::error::{ArError, Result};

static HIDDEN_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>|<header\b.*?</header>|<footer\b.*?</footer>|<noscript\b.*?</noscript>|<!--.*?-->",
    )
    .expect("valid regex")
});

static TAGS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A query ready for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub text: String,
    /// Set when the text was fetched from this URL.
    pub source_url: Option<String>,
}

pub struct QueryResolver {
    client: Option<reqwest::blocking::Client>,
    timeout_secs: u64,
}

impl std::fmt::Debug for QueryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResolver")
            .field("fetch_urls", &self.client.is_some())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl QueryResolver {
    pub fn from_config(config: &QueryConfig) -> Result<Self> {
        let timeout_secs = config.fetch_timeout_secs.max(1);
        let client = if config.fetch_urls {
            Some(
                reqwest::blocking::Client::builder()
                    .timeout(Duration::from_secs(timeout_secs))
                    .user_agent(concat!("arec/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|err| ArError::Config(format!("query http client: {err}")))?,
            )
        } else {
            None
        };
        Ok(Self {
            client,
            timeout_secs,
        })
    }

    /// Resolver that never fetches; URL-looking queries are used verbatim.
    #[must_use]
    pub const fn offline() -> Self {
        Self {
            client: None,
            timeout_secs: 0,
        }
    }

    pub fn resolve(&self, raw: &str) -> Result<ResolvedQuery> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ArError::InvalidQuery("query is empty".to_string()));
        }

        let Some(client) = self.client.as_ref().filter(|_| is_url(trimmed)) else {
            return Ok(ResolvedQuery {
                text: trimmed.to_string(),
                source_url: None,
            });
        };

        let url = if trimmed.starts_with("www.") {
            format!("https://{trimmed}")
        } else {
            trimmed.to_string()
        };
        let text = self.fetch(client, &url)?;
        info!(url = %url, chars = text.len(), "resolved query from url");
        Ok(ResolvedQuery {
            text,
            source_url: Some(url),
        })
    }

    fn fetch(&self, client: &reqwest::blocking::Client, url: &str) -> Result<String> {
        let fail = |reason: String| ArError::QueryFetch {
            url: url.to_string(),
            reason,
        };

        let response = client.get(url).send().map_err(|err| {
            if err.is_timeout() {
                fail(format!("timed out after {}s", self.timeout_secs))
            } else {
                fail(err.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let html = response.text().map_err(|err| fail(err.to_string()))?;

        let text = html_to_text(&html);
        debug!(html_bytes = html.len(), text_chars = text.len(), "stripped page");
        if text.is_empty() {
            return Err(fail("page has no visible text".to_string()));
        }
        Ok(text)
    }
}

#[must_use]
pub fn is_url(text: &str) -> bool {
    let lowered = text.to_ascii_lowercase();
    (lowered.starts_with("http://") || lowered.starts_with("https://") || lowered.starts_with("www."))
        && !text.contains(char::is_whitespace)
}

/// Visible text of an HTML document.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let without_hidden = HIDDEN_BLOCKS.replace_all(html, " ");
    let without_tags = TAGS.replace_all(&without_hidden, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn online() -> QueryResolver {
        QueryResolver::from_config(&QueryConfig {
            fetch_urls: true,
            fetch_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn plain_text_is_trimmed() {
        let resolved = online().resolve("  Java developer  ").unwrap();
        assert_eq!(resolved.text, "Java developer");
        assert!(resolved.source_url.is_none());
    }

    #[test]
    fn empty_query_is_invalid() {
        assert!(matches!(
            online().resolve(" \n\t "),
            Err(ArError::InvalidQuery(_))
        ));
    }

    #[test]
    fn url_detection() {
        assert!(is_url("https://jobs.example.com/123"));
        assert!(is_url("www.example.com/job"));
        assert!(!is_url("https://example.com is where the job is"));
        assert!(!is_url("Java developer"));
    }

    #[test]
    fn html_is_reduced_to_visible_text() {
        let html = r#"<html><head><style>p{color:red}</style><script>var x = "<b>";</script></head>
            <body><nav>Home | Jobs</nav><h1>Java Developer</h1>
            <p>Must collaborate &amp; communicate.</p><footer>(c) ACME</footer></body></html>"#;
        assert_eq!(html_to_text(html), "Java Developer Must collaborate & communicate.");
    }

    #[test]
    fn url_query_is_fetched() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/jobs/42");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body><h1>SQL Analyst</h1><p>40 minutes max</p></body></html>");
        });

        let url = server.url("/jobs/42");
        let resolved = online().resolve(&url).unwrap();
        mock.assert();
        assert_eq!(resolved.text, "SQL Analyst 40 minutes max");
        assert_eq!(resolved.source_url.as_deref(), Some(url.as_str()));
    }

    #[test]
    fn failed_fetch_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(404);
        });
        let err = online().resolve(&server.url("/missing")).unwrap_err();
        assert!(matches!(err, ArError::QueryFetch { ref reason, .. } if reason.contains("404")));
    }

    #[test]
    fn offline_resolver_uses_url_verbatim() {
        let resolved = QueryResolver::offline().resolve("https://example.com/job").unwrap();
        assert_eq!(resolved.text, "https://example.com/job");
    }
}
