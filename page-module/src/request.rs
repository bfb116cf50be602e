// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The request data page rules get to see.

use http::header::{AsHeaderName, IntoHeaderName};
use http::{HeaderMap, HeaderValue};
use preview_module_utils::pingora::SessionWrapper;

/// A snapshot of the request properties relevant to page rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    scheme: String,
    hostname: String,
    path: String,
    original_url: String,
    headers: HeaderMap,
}

impl PageRequest {
    /// Creates a request from its scheme (`http` or `https`), host name without port and URL
    /// (path plus optional query string).
    pub fn new(scheme: impl Into<String>, hostname: impl Into<String>, url: &str) -> Self {
        let path = url.split_once('?').map_or(url, |(path, _)| path);
        Self {
            scheme: scheme.into(),
            hostname: hostname.into(),
            path: path.to_owned(),
            original_url: url.to_owned(),
            headers: HeaderMap::new(),
        }
    }

    /// Adds a request header, replacing any previous values of the same header.
    pub fn with_header(mut self, name: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Captures the current request of a Pingora session.
    ///
    /// The scheme is `https` if the downstream connection uses TLS. The host name is taken from
    /// the `Host` header (or the request URI) with the port removed.
    pub fn from_session(session: &impl SessionWrapper) -> Self {
        let scheme = if session.is_tls() { "https" } else { "http" };
        let hostname = session
            .host()
            .map(|host| strip_port(&host).to_owned())
            .unwrap_or_default();
        let uri = session.uri();
        let url = uri
            .path_and_query()
            .map_or_else(|| uri.path(), |path_and_query| path_and_query.as_str());

        let mut request = Self::new(scheme, hostname, url);
        request.headers = session.req_header().headers.clone();
        request
    }

    /// Request scheme, `http` or `https`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name the request was addressed to, without port
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request path including the query string
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Looks up a request header, case-insensitively. Values that aren’t valid strings are
    /// treated as missing.
    pub fn header(&self, name: impl AsHeaderName) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        host.find(']').map_or(host, |end| &host[..=end])
    } else {
        host.split_once(':').map_or(host, |(hostname, _)| hostname)
    }
}
