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

//! Handler for the `request_filter` phase.

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method, StatusCode};
use log::{debug, warn};
use preview_module_utils::pingora::{Error, ResponseHeader, SessionWrapper};
use preview_module_utils::{RequestFilter, RequestFilterResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::PageConf;
use crate::fetch::HttpFetcher;
use crate::link_preview::default_rules;
use crate::reader::{DiskReader, FileReader, MemoryReader};
use crate::request::PageRequest;
use crate::rules::{apply_rules, Rule, RuleList};

const NO_CACHE_HEADERS: [(&str, &str); 3] = [
    ("Cache-Control", "private, no-cache, no-store, must-revalidate"),
    ("Expires", "-1"),
    ("Pragma", "no-cache"),
];

/// Produces the page to send for a request.
///
/// Sets headers disabling caching, reads the page and runs the rules on it. If reading or any rule
/// fails, the page is read once more and returned unchanged, without any headers added by the
/// rules. Only an error during that second read is returned.
pub async fn render_page(
    request: &PageRequest,
    response: &mut ResponseHeader,
    reader: &dyn FileReader,
    path: &Path,
    rules: &[Rule],
) -> Result<String, Box<Error>> {
    for (name, value) in NO_CACHE_HEADERS {
        response.insert_header(name, value)?;
    }

    let mut transformed = response.clone();
    let result = async {
        let contents = reader.read(path).await?;
        let content = String::from_utf8_lossy(&contents).into_owned();
        apply_rules(request, &mut transformed, rules, content).await
    }
    .await;

    match result {
        Ok(content) => {
            *response = transformed;
            Ok(content)
        }
        Err(err) => {
            warn!(
                "failed processing page {path:?} for {}, serving it unchanged: {err}",
                request.original_url()
            );
            let contents = reader.read(path).await?;
            Ok(String::from_utf8_lossy(&contents).into_owned())
        }
    }
}

/// Handler for Pingora’s `request_filter` phase
#[derive(Debug)]
pub struct PageHandler {
    page_file: Option<PathBuf>,
    reader: Box<dyn FileReader>,
    rules: RuleList,
}

impl PageHandler {
    /// Creates a handler serving `page_file` from `reader`, transformed by `rules`.
    pub fn new(
        page_file: Option<PathBuf>,
        reader: Box<dyn FileReader>,
        rules: impl Into<RuleList>,
    ) -> Self {
        Self {
            page_file,
            reader,
            rules: rules.into(),
        }
    }

    /// The page served by this handler
    pub fn page_file(&self) -> Option<&Path> {
        self.page_file.as_deref()
    }

    /// The rules applied to the page
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl TryFrom<PageConf> for PageHandler {
    type Error = Box<Error>;

    fn try_from(conf: PageConf) -> Result<Self, Self::Error> {
        debug!("Page handler configuration received: {conf:#?}");

        let rules = default_rules(Box::new(HttpFetcher::new()?), conf.account_base_url())?;

        let reader: Box<dyn FileReader> = match &conf.page_file {
            Some(page_file) if conf.in_memory => Box::new(MemoryReader::preload(&[page_file])?),
            _ => Box::new(DiskReader),
        };

        Ok(Self::new(conf.page_file, reader, rules))
    }
}

#[async_trait]
impl RequestFilter for PageHandler {
    type Conf = PageConf;
    type CTX = ();

    fn new_ctx() -> Self::CTX {}

    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        _ctx: &mut Self::CTX,
    ) -> Result<RequestFilterResult, Box<Error>> {
        let Some(page_file) = &self.page_file else {
            return Ok(RequestFilterResult::Unhandled);
        };

        let head = match session.req_header().method {
            Method::GET => false,
            Method::HEAD => true,
            _ => {
                debug!(
                    "not serving page for method {}",
                    session.req_header().method
                );
                return Ok(RequestFilterResult::Unhandled);
            }
        };

        let request = PageRequest::from_session(session);
        debug!("serving page {page_file:?} for {}", request.original_url());

        let mut response = ResponseHeader::build(StatusCode::OK, Some(6))?;
        let body = render_page(
            &request,
            &mut response,
            self.reader.as_ref(),
            page_file,
            &self.rules,
        )
        .await?;

        response.insert_header(header::CONTENT_TYPE, "text/html; charset=utf-8")?;
        response.insert_header(header::CONTENT_LENGTH, body.len())?;
        session
            .write_response_header(Box::new(response), head)
            .await?;
        if !head {
            session
                .write_response_body(Some(Bytes::from(body)), true)
                .await?;
        }

        Ok(RequestFilterResult::ResponseSent)
    }
}
