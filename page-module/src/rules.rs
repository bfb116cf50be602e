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

//! Ordered path rules transforming the page content.

use async_trait::async_trait;
use log::trace;
use preview_module_utils::pingora::{Error, ErrorType, ResponseHeader};
use regex::{Captures, Regex};
use std::fmt::Debug;
use std::sync::Arc;

use crate::request::PageRequest;

/// A content transformation applied when a rule’s path pattern matches
#[async_trait]
pub trait Transform: Debug + Send + Sync {
    /// Produces the new page content. `captures` holds the match of the rule’s path pattern
    /// against the request path. Response headers can be added via `response`.
    async fn transform(
        &self,
        request: &PageRequest,
        response: &mut ResponseHeader,
        content: String,
        captures: &Captures<'_>,
    ) -> Result<String, Box<Error>>;
}

/// A path pattern along with the transformation to run on match
#[derive(Debug)]
pub struct Rule {
    path_regex: Regex,
    transform: Box<dyn Transform>,
    process_next_rule: bool,
}

impl Rule {
    /// Creates a rule from a regular expression to be matched against the request path. Once a
    /// rule matches, no further rules are processed unless [`Rule::process_next_rule`] is set.
    pub fn new(pattern: &str, transform: impl Transform + 'static) -> Result<Self, Box<Error>> {
        let path_regex = Regex::new(pattern).map_err(|err| {
            Error::because(
                ErrorType::InternalError,
                format!("invalid path pattern {pattern}"),
                err,
            )
        })?;
        Ok(Self {
            path_regex,
            transform: Box::new(transform),
            process_next_rule: false,
        })
    }

    /// Determines whether rules following this one should still run after it matched.
    pub fn process_next_rule(mut self, process_next_rule: bool) -> Self {
        self.process_next_rule = process_next_rule;
        self
    }

    /// The regular expression matched against the request path
    pub fn path_regex(&self) -> &Regex {
        &self.path_regex
    }
}

/// The rules configured at start-up, shared by all requests
pub type RuleList = Arc<Vec<Rule>>;

/// Runs the rules matching the request path in order, each one seeing the content produced by
/// the previous one. Processing stops at the first matching rule without `process_next_rule`
/// flag. An error returned by a transformation aborts processing.
pub async fn apply_rules(
    request: &PageRequest,
    response: &mut ResponseHeader,
    rules: &[Rule],
    content: String,
) -> Result<String, Box<Error>> {
    let mut content = content;
    for (index, rule) in rules.iter().enumerate() {
        let Some(captures) = rule.path_regex.captures(request.path()) else {
            continue;
        };

        trace!(
            "rule {index} ({}) matched path {}",
            rule.path_regex,
            request.path()
        );
        content = rule
            .transform
            .transform(request, response, content, &captures)
            .await?;

        if !rule.process_next_rule {
            break;
        }
    }
    Ok(content)
}
