//! GeoIP lookup, an optional enrichment applied to `WebLog.country`.

use std::net::Ipv4Addr;

/// Resolves a client IP to a country code. Implementations are expected to be
/// cheap and non-blocking (an in-memory database lookup, not a network call)
/// since this runs on the request path.
pub trait GeoLookup: Send + Sync {
    /// Returns an ISO 3166-1 alpha-2 country code, or `None` if unresolved.
    fn lookup(&self, ip: Ipv4Addr) -> Option<String>;
}

/// Default implementation when no GeoIP database is configured.
pub struct NoopGeoLookup;

impl GeoLookup for NoopGeoLookup {
    fn lookup(&self, _ip: Ipv4Addr) -> Option<String> {
        None
    }
}
