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

//! Upstream API access.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use preview_module_utils::pingora::{Error, ErrorType};
use std::fmt::Debug;

use crate::UPSTREAM_FETCH_ERROR;

/// Retrieves upstream API responses
#[async_trait]
pub trait Fetcher: Debug + Send + Sync {
    /// Performs a GET request. `None` means that no data is available, the caller should carry on
    /// without it.
    async fn fetch(&self, url: &str) -> Result<Option<Bytes>, Box<Error>>;
}

/// A [`Fetcher`] performing HTTP requests
///
/// Response status codes aren’t interpreted. Any completed request produces the response body,
/// only transport failures result in an error.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the HTTP client’s default settings.
    pub fn new() -> Result<Self, Box<Error>> {
        let client = reqwest::Client::builder().build().map_err(|err| {
            Error::because(
                ErrorType::InternalError,
                "failed creating HTTP client",
                err,
            )
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<Bytes>, Box<Error>> {
        let response = self.client.get(url).send().await.map_err(|err| {
            Error::because(UPSTREAM_FETCH_ERROR, format!("failed fetching {url}"), err)
        })?;
        debug!("upstream {url} responded with status {}", response.status());

        let body = response.bytes().await.map_err(|err| {
            Error::because(
                UPSTREAM_FETCH_ERROR,
                format!("failed reading response body of {url}"),
                err,
            )
        })?;
        Ok(Some(body))
    }
}
