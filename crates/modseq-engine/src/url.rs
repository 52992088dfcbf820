//! URL canonicalization and specifier resolution
//!
//! The loader only needs two things from URLs: a canonical string to key the
//! registry with, and a way to resolve a specifier against the directory of
//! the unit that declared it. Hosts with their own resolver (a browser's
//! native one, say) plug it in through [`UrlResolver`].

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    /// The input could not be parsed, alone or against its base
    #[error("Invalid URL {input}: {source}")]
    Parse {
        /// The offending input
        input: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },
}

/// Canonicalizes and resolves unit URLs
///
/// Implementations must make `canonicalize` idempotent and must handle
/// `./`, `../` and `/`-absolute specifiers in `resolve`.
pub trait UrlResolver {
    /// Canonical absolute form of `url`
    fn canonicalize(&self, url: &str) -> Result<String, UrlError>;

    /// Resolve `specifier` against the directory-like `base`
    fn resolve(&self, base: &str, specifier: &str) -> Result<String, UrlError>;
}

/// [`UrlResolver`] following the WHATWG URL standard
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUrlResolver;

impl UrlResolver for StandardUrlResolver {
    fn canonicalize(&self, url: &str) -> Result<String, UrlError> {
        Url::parse(url).map(String::from).map_err(|source| UrlError::Parse {
            input: url.to_string(),
            source,
        })
    }

    fn resolve(&self, base: &str, specifier: &str) -> Result<String, UrlError> {
        if is_fully_qualified(specifier) {
            return self.canonicalize(specifier);
        }

        let base_url = Url::parse(base).map_err(|source| UrlError::Parse {
            input: base.to_string(),
            source,
        })?;
        base_url
            .join(specifier)
            .map(String::from)
            .map_err(|source| UrlError::Parse {
                input: specifier.to_string(),
                source,
            })
    }
}

/// Whether a specifier already names a scheme
pub fn is_fully_qualified(specifier: &str) -> bool {
    specifier.contains("://")
}

/// Directory-like prefix of a canonical URL
///
/// Query and fragment are dropped, then everything after the last `/`.
///
/// - `http://example.com/` => `http://example.com/`
/// - `http://example.com/foo.js` => `http://example.com/`
/// - `http://example.com/foo/?qu/ery#fr/ag` => `http://example.com/foo/`
pub fn url_base(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    match path.rfind('/') {
        Some(pos) => &path[..=pos],
        None => path,
    }
}
