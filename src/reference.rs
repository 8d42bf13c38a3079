//! Encyclopedia links for artists.
//!
//! The lookup is a capability: the query layer only sees `ReferenceLookup`.
//! `WikipediaLookup` talks to the MediaWiki action API, `NoReference` is the
//! offline stand-in. Whatever the collaborator reports, `resolve_reference_link`
//! turns it into "a link" or "no link" and never fails.

use serde_json::Value;
use std::io::Read;
use std::time::Duration;

use crate::error::ReferenceError;

pub const WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/wiki/";
const WIKIPEDIA_ACTION_API_URL: &str = "https://en.wikipedia.org/w/api.php";
const WIKIMEDIA_USER_AGENT: &str = "spotify-explorer/0.1.0 (catalogue explorer; artist reference links)";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(7);

/// What the encyclopedia knows about a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResolution {
    /// Exactly one page, with its canonical URL
    Found(String),
    /// The name lands on a disambiguation page
    Ambiguous,
    /// No page at all
    Missing,
}

/// Resolves an artist name to an encyclopedia page.
pub trait ReferenceLookup {
    fn resolve(&self, artist: &str) -> Result<PageResolution, ReferenceError>;
}

/// Deterministic link used when the name is ambiguous: spaces become `_`.
pub fn fallback_url(artist: &str) -> String {
    format!("{}{}", WIKIPEDIA_BASE_URL, artist.replace(' ', "_"))
}

/// Best-effort link for an artist. Lookup failures degrade to `None`.
pub fn resolve_reference_link(lookup: &dyn ReferenceLookup, artist: &str) -> Option<String> {
    match lookup.resolve(artist) {
        Ok(PageResolution::Found(url)) => Some(url),
        Ok(PageResolution::Ambiguous) => Some(fallback_url(artist)),
        Ok(PageResolution::Missing) => None,
        Err(e) => {
            eprintln!("[REFERENCE] Lookup for '{}' failed: {}", artist, e);
            None
        }
    }
}

/// Lookup that never finds anything (offline mode).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReference;

impl ReferenceLookup for NoReference {
    fn resolve(&self, _artist: &str) -> Result<PageResolution, ReferenceError> {
        Ok(PageResolution::Missing)
    }
}

/// Lookup against en.wikipedia.org with bounded timeouts.
pub struct WikipediaLookup {
    http_client: ureq::Agent,
}

impl WikipediaLookup {
    pub fn new() -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self { http_client }
    }

    fn http_get_json(&self, url: &str) -> Result<Value, ReferenceError> {
        let response = self
            .http_client
            .get(url)
            .set("User-Agent", WIKIMEDIA_USER_AGENT)
            .set("Accept", "application/json")
            .call()
            .map_err(|error| ReferenceError::Http(error.to_string()))?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|error| ReferenceError::Http(format!("Failed to read response: {error}")))?;
        serde_json::from_str(&body).map_err(|error| ReferenceError::InvalidResponse(error.to_string()))
    }
}

impl Default for WikipediaLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceLookup for WikipediaLookup {
    fn resolve(&self, artist: &str) -> Result<PageResolution, ReferenceError> {
        let url = format!(
            "{}?action=query&format=json&redirects=1&prop=info%7Cpageprops&inprop=url&ppprop=disambiguation&titles={}",
            WIKIPEDIA_ACTION_API_URL,
            urlencoding::encode(artist)
        );
        let parsed = self.http_get_json(&url)?;
        parse_page_resolution(&parsed)
    }
}

/// Interpret a MediaWiki `action=query` response for a single title.
pub fn parse_page_resolution(response: &Value) -> Result<PageResolution, ReferenceError> {
    let pages = response
        .get("query")
        .and_then(|query| query.get("pages"))
        .and_then(Value::as_object)
        .ok_or_else(|| ReferenceError::InvalidResponse("missing query.pages".to_string()))?;

    let Some(page) = pages.values().next() else {
        return Ok(PageResolution::Missing);
    };

    if page.get("missing").is_some() || page.get("invalid").is_some() {
        return Ok(PageResolution::Missing);
    }

    let disambiguation = page
        .get("pageprops")
        .and_then(|props| props.get("disambiguation"))
        .is_some();
    if disambiguation {
        return Ok(PageResolution::Ambiguous);
    }

    page.get("fullurl")
        .and_then(Value::as_str)
        .map(|url| PageResolution::Found(url.to_string()))
        .ok_or_else(|| ReferenceError::InvalidResponse("page without fullurl".to_string()))
}
