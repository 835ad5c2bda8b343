//! Header normalization.
//!
//! Callers may pass headers as a map, an ordered pair list, or a `HeaderMap`.
//! Everything is flattened to one ordered `name → value` mapping with
//! lowercase names before it goes on the wire; repeated names are joined with
//! `", "` the same way a fetch `Headers` object reports them.

use std::collections::{BTreeMap, HashMap};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{FetchError, FetchResult};

/// Ordered header mapping used on the wire.
pub type HeaderList = BTreeMap<String, String>;

/// Header input accepted by the dispatcher.
#[derive(Debug, Clone)]
pub enum HeadersInit {
    Map(HashMap<String, String>),
    Pairs(Vec<(String, String)>),
    HeaderMap(HeaderMap),
}

impl Default for HeadersInit {
    fn default() -> Self {
        HeadersInit::Pairs(Vec::new())
    }
}

impl HeadersInit {
    /// Flatten into a validated [`HeaderList`].
    ///
    /// Fails before any network activity if a name or value is not a legal
    /// HTTP header token.
    pub fn normalize(&self) -> FetchResult<HeaderList> {
        let mut list = HeaderList::new();
        match self {
            HeadersInit::Map(map) => {
                for (name, value) in map {
                    append(&mut list, name, value)?;
                }
            }
            HeadersInit::Pairs(pairs) => {
                for (name, value) in pairs {
                    append(&mut list, name, value)?;
                }
            }
            HeadersInit::HeaderMap(map) => {
                for (name, value) in map {
                    let value = value.to_str().map_err(|_| {
                        FetchError::InvalidHeaders(format!("value of '{}' is not visible ASCII", name))
                    })?;
                    append(&mut list, name.as_str(), value)?;
                }
            }
        }
        Ok(list)
    }

    /// Append one header, keeping insertion simple for builder-style callers.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self {
            HeadersInit::Map(map) => {
                map.insert(name, value);
            }
            HeadersInit::Pairs(pairs) => pairs.push((name, value)),
            HeadersInit::HeaderMap(map) => {
                // Invalid input is kept out of the map and surfaces on normalize.
                match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                    (Ok(name), Ok(value)) => {
                        map.append(name, value);
                    }
                    _ => {
                        let mut pairs: Vec<(String, String)> = header_map_pairs(map);
                        pairs.push((name, value));
                        *self = HeadersInit::Pairs(pairs);
                    }
                }
            }
        }
    }
}

fn header_map_pairs(map: &HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect()
}

fn append(list: &mut HeaderList, name: &str, value: &str) -> FetchResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| FetchError::InvalidHeaders(format!("invalid header name '{}'", name)))?;
    HeaderValue::from_str(value)
        .map_err(|_| FetchError::InvalidHeaders(format!("invalid value for header '{}'", name)))?;

    list.entry(name.as_str().to_string())
        .and_modify(|existing| {
            existing.push_str(", ");
            existing.push_str(value);
        })
        .or_insert_with(|| value.to_string());
    Ok(())
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(map: HashMap<String, String>) -> Self {
        HeadersInit::Map(map)
    }
}

impl From<HeaderMap> for HeadersInit {
    fn from(map: HeaderMap) -> Self {
        HeadersInit::HeaderMap(map)
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for HeadersInit {
    fn from(pairs: Vec<(K, V)>) -> Self {
        HeadersInit::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Snapshot a response's headers for the `headers` event.
pub fn snapshot(map: &HeaderMap) -> HeaderList {
    let mut list = HeaderList::new();
    for (name, value) in map {
        let Ok(value) = value.to_str() else {
            tracing::debug!(header = %name, "Skipping non-ASCII response header");
            continue;
        };
        list.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    list
}

/// Rebuild a `HeaderMap` from a wire mapping, dropping entries that do not parse.
pub fn to_header_map(list: &HeaderList) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(list.len());
    for (name, value) in list {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping malformed header"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_lowercased_and_joined() {
        let init = HeadersInit::from(vec![
            ("Accept", "text/plain"),
            ("X-Trace", "a"),
            ("x-trace", "b"),
        ]);
        let list = init.normalize().unwrap();
        assert_eq!(list.get("accept").map(String::as_str), Some("text/plain"));
        assert_eq!(list.get("x-trace").map(String::as_str), Some("a, b"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_header_map_input() {
        let mut map = HeaderMap::new();
        map.append("x-a", HeaderValue::from_static("1"));
        map.append("x-a", HeaderValue::from_static("2"));
        let list = HeadersInit::from(map).normalize().unwrap();
        assert_eq!(list.get("x-a").map(String::as_str), Some("1, 2"));
    }

    #[test]
    fn test_empty_default() {
        assert!(HeadersInit::default().normalize().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let init = HeadersInit::from(vec![("bad header", "x")]);
        assert!(matches!(init.normalize(), Err(FetchError::InvalidHeaders(_))));

        let init = HeadersInit::from(vec![("x-ok", "line\nbreak")]);
        assert!(matches!(init.normalize(), Err(FetchError::InvalidHeaders(_))));
    }

    #[test]
    fn test_push_invalid_into_header_map_surfaces_on_normalize() {
        let mut init = HeadersInit::HeaderMap(HeaderMap::new());
        init.push("x-fine", "1");
        init.push("not valid", "2");
        assert!(init.normalize().is_err());
    }

    #[test]
    fn test_round_trip_through_header_map() {
        let mut list = HeaderList::new();
        list.insert("content-type".into(), "application/json".into());
        list.insert("bad name".into(), "x".into());
        let map = to_header_map(&list);
        assert_eq!(map.len(), 1);
        assert_eq!(snapshot(&map).get("content-type").unwrap(), "application/json");
    }
}
