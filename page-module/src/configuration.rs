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

//! Structures required to deserialize Page Module configuration from YAML configuration files.

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

/// Upstream API base used when none is configured
pub const DEFAULT_ACCOUNT_BASE_URL: &str = "http://localhost:8080/api";

/// Command line options of the page module
#[derive(Debug, Default, Args)]
pub struct PageOpt {
    /// HTML document to serve for all requests, e.g. build/_index.html
    #[clap(long)]
    pub page_file: Option<PathBuf>,
    /// Base URL of the upstream API, either absolute or relative to the site
    #[clap(long, env = "ACCOUNT_BASE_URL")]
    pub account_base_url: Option<String>,
    /// Load the page file into memory on start-up rather than reading it for each request
    #[clap(long)]
    pub in_memory: bool,
}

/// Configuration file settings of the page module
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageConf {
    /// HTML document to serve for all requests. If not set, requests are left unhandled.
    pub page_file: Option<PathBuf>,

    /// Base URL of the upstream API. Values without a scheme like `/api` are resolved relative to
    /// the request’s base URL.
    pub account_base_url: String,

    /// If `true`, the page file is loaded once on start-up and served from memory.
    pub in_memory: bool,
}

impl Default for PageConf {
    fn default() -> Self {
        Self {
            page_file: None,
            account_base_url: DEFAULT_ACCOUNT_BASE_URL.to_owned(),
            in_memory: false,
        }
    }
}

impl PageConf {
    /// Merges the command line options into the current configuration. Any command line options
    /// present overwrite existing settings.
    pub fn merge_with_opt(&mut self, opt: PageOpt) {
        if opt.page_file.is_some() {
            self.page_file = opt.page_file;
        }

        if let Some(account_base_url) = opt.account_base_url {
            self.account_base_url = account_base_url;
        }

        if opt.in_memory {
            self.in_memory = true;
        }
    }

    /// The upstream API base to use, falling back to [`DEFAULT_ACCOUNT_BASE_URL`] if the
    /// configured value is empty.
    pub fn account_base_url(&self) -> &str {
        if self.account_base_url.is_empty() {
            DEFAULT_ACCOUNT_BASE_URL
        } else {
            &self.account_base_url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use preview_module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn defaults() {
        let conf = PageConf::from_yaml("{}").unwrap();
        assert_eq!(conf, PageConf::default());
        assert_eq!(conf.account_base_url(), "http://localhost:8080/api");

        let conf = PageConf::from_yaml("account_base_url: ''").unwrap();
        assert_eq!(conf.account_base_url(), "http://localhost:8080/api");
    }

    #[test]
    fn merging() {
        let mut conf = PageConf::from_yaml(
            r#"
                page_file: build/_index.html
                account_base_url: /api
            "#,
        )
        .unwrap();
        assert_eq!(conf.page_file, Some(PathBuf::from("build/_index.html")));
        assert_eq!(conf.account_base_url(), "/api");
        assert!(!conf.in_memory);

        conf.merge_with_opt(PageOpt::default());
        assert_eq!(conf.page_file, Some(PathBuf::from("build/_index.html")));
        assert_eq!(conf.account_base_url(), "/api");

        conf.merge_with_opt(PageOpt {
            page_file: Some("dist/index.html".into()),
            account_base_url: Some("https://api.example.com/".to_owned()),
            in_memory: true,
        });
        assert_eq!(conf.page_file, Some(PathBuf::from("dist/index.html")));
        assert_eq!(conf.account_base_url(), "https://api.example.com/");
        assert!(conf.in_memory);
    }
}
