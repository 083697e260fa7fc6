//! Deep link generation and parsing.
//!
//! Links have the shape `scheme://path?query`. Path segments and query
//! pairs are form-urlencoded, so any path and parameter map survives a
//! [`generate_deep_link`] / [`parse_deep_link`] round trip.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use url::form_urlencoded;

/// Errors produced while building or reading a deep link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    /// The link has no `scheme://` prefix.
    #[error("missing scheme separator in '{0}'")]
    MissingScheme(String),

    /// The scheme is empty or contains characters a URI scheme cannot.
    #[error("invalid scheme '{0}'")]
    InvalidScheme(String),
}

/// A parsed deep link.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeepLink {
    /// URI scheme, e.g. `myapp`.
    pub scheme: String,
    /// Path after `scheme://`, decoded.
    pub path: String,
    /// Query parameters, decoded. Repeated names keep the last value.
    pub params: BTreeMap<String, String>,
}

impl DeepLink {
    /// Returns the parameter with the given name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn validate_scheme(scheme: &str) -> Result<(), DeepLinkError> {
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(DeepLinkError::InvalidScheme(scheme.to_string()))
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| form_urlencoded::byte_serialize(segment.as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_segment(segment: &str) -> String {
    // Encoded segments never contain a raw '&' or '=', so the segment
    // parses as a single bare name.
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

/// Builds `scheme://path?params`.
///
/// The query is omitted when `params` is empty.
pub fn generate_deep_link<K, V>(
    scheme: &str,
    path: &str,
    params: impl IntoIterator<Item = (K, V)>,
) -> Result<String, DeepLinkError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    validate_scheme(scheme)?;

    let mut link = format!("{scheme}://{}", encode_path(path));
    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut has_params = false;
    for (name, value) in params {
        query.append_pair(name.as_ref(), value.as_ref());
        has_params = true;
    }
    if has_params {
        link.push('?');
        link.push_str(&query.finish());
    }
    Ok(link)
}

/// Parses a link produced by [`generate_deep_link`] or by the platform.
///
/// A `#fragment` is ignored.
pub fn parse_deep_link(link: &str) -> Result<DeepLink, DeepLinkError> {
    let (scheme, rest) = link
        .split_once("://")
        .ok_or_else(|| DeepLinkError::MissingScheme(link.to_string()))?;
    validate_scheme(scheme)?;

    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    let path = path
        .split('/')
        .map(decode_segment)
        .collect::<Vec<_>>()
        .join("/");
    let params = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    Ok(DeepLink {
        scheme: scheme.to_string(),
        path,
        params,
    })
}
