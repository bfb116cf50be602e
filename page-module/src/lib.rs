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

//! # Page Module
//!
//! This crate serves the HTML shell of a single-page application for any request path. Before
//! the page is sent, an ordered list of path rules can rewrite it. The default rules insert Open
//! Graph and Twitter Card tags into the document head, so that links shared on social networks
//! get a meaningful preview:
//!
//! * `/public/template/<key>` pages are described with the data of the tour template `<key>`,
//!   retrieved from `<account_base_url>/Pub/template/<key>`.
//! * All other pages get generic preview tags.
//!
//! Any failure while applying the rules results in the unchanged page being served. The page is
//! always sent with headers disabling caching.
//!
//! ## Configuration
//!
//! ```yaml
//! page_file: build/_index.html
//! account_base_url: https://api.example.com/api
//! in_memory: false
//! ```
//!
//! `account_base_url` can also be relative to the site, e.g. `/api`. It is then resolved against
//! the request’s base URL, taking `X-Forwarded-For` and `X-Forwarded-Port` headers into account.
//! The corresponding command line options are `--page-file`, `--account-base-url` (or the
//! `ACCOUNT_BASE_URL` environment variable) and `--in-memory`.
//!
//! ## Code example
//!
//! ```rust,no_run
//! use page_module::{PageConf, PageHandler};
//! use preview_module_utils::FromYaml;
//! use startup_module::{DefaultApp, StartupConf};
//!
//! let conf = PageConf::from_yaml("page_file: build/_index.html").unwrap();
//! let app = DefaultApp::<PageHandler>::from_conf(conf).unwrap();
//! let server = StartupConf::default().into_server(app, None);
//!
//! // Do something with the server here, e.g. call server.run_forever()
//! ```

mod configuration;
mod fetch;
mod handler;
pub mod html;
pub mod link_preview;
mod reader;
mod request;
mod rules;
pub mod url;

pub use configuration::{PageConf, PageOpt, DEFAULT_ACCOUNT_BASE_URL};
pub use fetch::{Fetcher, HttpFetcher};
pub use handler::{render_page, PageHandler};
pub use reader::{DiskReader, FileReader, MemoryReader};
pub use request::PageRequest;
pub use rules::{apply_rules, Rule, RuleList, Transform};

use preview_module_utils::pingora::ErrorType;

/// Error type of failures to parse a URL
pub const URL_PARSE_ERROR: ErrorType = ErrorType::Custom("URLParseError");

/// Error type of failures to retrieve or decode upstream API data
pub const UPSTREAM_FETCH_ERROR: ErrorType = ErrorType::Custom("UpstreamFetchError");
