//! Client IP to country resolution backed by an offline MaxMind database.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, MaxMindDBError, Reader};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct LookupError(pub String);

pub trait CountryLookup: Send + Sync {
    /// ISO 3166 alpha-2 code for `ip`, or `None` when the database has no
    /// entry covering it.
    fn country_code(&self, ip: IpAddr) -> std::result::Result<Option<String>, LookupError>;
}

pub struct MaxMindCountryLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindCountryLookup {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)
            .map_err(|err| PipelineError::GeoDatabase(format!("{}: {err}", path.display())))?;
        debug!(path = %path.display(), database_type = %reader.metadata.database_type, "opened geo database");
        Ok(Self { reader })
    }
}

impl CountryLookup for MaxMindCountryLookup {
    fn country_code(&self, ip: IpAddr) -> std::result::Result<Option<String>, LookupError> {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(record) => Ok(record
                .country
                .and_then(|country| country.iso_code)
                .map(str::to_string)),
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(err) => Err(LookupError(err.to_string())),
        }
    }
}

/// Memoizing front for a [`CountryLookup`]. Results, including misses, are
/// cached by the raw IP string for the lifetime of the resolver.
pub struct GeoResolver {
    lookup: Box<dyn CountryLookup>,
    cache: HashMap<String, String>,
}

impl GeoResolver {
    pub fn new(lookup: Box<dyn CountryLookup>) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
        }
    }

    /// Never fails: unparseable addresses and lookup errors resolve to an
    /// empty string.
    pub fn resolve(&mut self, ip: &str) -> String {
        if let Some(code) = self.cache.get(ip) {
            return code.clone();
        }

        let code = self.lookup_uncached(ip);
        self.cache.insert(ip.to_string(), code.clone());
        code
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn lookup_uncached(&self, ip: &str) -> String {
        let addr = match ip.trim().parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                warn!(ip, error = %err, "client address is not an IP");
                return String::new();
            }
        };

        match self.lookup.country_code(addr) {
            Ok(Some(code)) => code,
            Ok(None) => {
                debug!(ip, "no country for address");
                String::new()
            }
            Err(err) => {
                warn!(ip, error = %err, "country lookup failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
    }

    impl CountryLookup for CountingLookup {
        fn country_code(&self, ip: IpAddr) -> std::result::Result<Option<String>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match ip.to_string().as_str() {
                "81.2.69.160" => Ok(Some("GB".into())),
                "10.0.0.9" => Err(LookupError("corrupt node".into())),
                _ => Ok(None),
            }
        }
    }

    fn resolver() -> (GeoResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: Arc::clone(&calls),
        };
        (GeoResolver::new(Box::new(lookup)), calls)
    }

    #[test]
    fn repeated_ip_hits_lookup_once() {
        let (mut geo, calls) = resolver();
        assert_eq!(geo.resolve("81.2.69.160"), "GB");
        assert_eq!(geo.resolve("81.2.69.160"), "GB");
        assert_eq!(geo.resolve("81.2.69.160"), "GB");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(geo.cached_len(), 1);
    }

    #[test]
    fn misses_and_errors_are_empty_and_cached() {
        let (mut geo, calls) = resolver();
        assert_eq!(geo.resolve("192.168.131.39"), "");
        assert_eq!(geo.resolve("10.0.0.9"), "");
        assert_eq!(geo.resolve("10.0.0.9"), "");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(geo.cached_len(), 2);
    }

    #[test]
    fn malformed_ip_never_reaches_lookup() {
        let (mut geo, calls) = resolver();
        assert_eq!(geo.resolve("not-an-ip"), "");
        assert_eq!(geo.resolve(""), "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_database_fails_to_open() {
        let err = MaxMindCountryLookup::open("/nonexistent/GeoLite2-Country.mmdb")
            .err()
            .expect("open must fail");
        assert!(matches!(err, PipelineError::GeoDatabase(_)));
    }
}
