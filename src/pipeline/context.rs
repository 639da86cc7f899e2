use std::{net::IpAddr, sync::Arc};

use http::{HeaderMap, Method};

use crate::model::HostSafe;

/// Everything a guard needs to evaluate one request. Built once per request
/// by the reverse-proxy stage and shared (by reference) across every guard
/// in the pipeline.
pub struct RequestContext<'a> {
    pub host: Arc<HostSafe>,
    pub client_ip: IpAddr,
    pub method: &'a Method,
    pub uri_path: &'a str,
    pub query: &'a str,
    pub headers: &'a HeaderMap,
    /// First `RECORD_MAX_BODY_LENGTH` bytes of the request body, decoded as
    /// lossy UTF-8. `None` when the request has no body or the host's guards
    /// don't need body inspection.
    pub body_peek: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    /// Full request target as guards see it: path plus query string.
    pub fn full_uri(&self) -> String {
        if self.query.is_empty() {
            self.uri_path.to_string()
        } else {
            format!("{}?{}", self.uri_path, self.query)
        }
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
