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

//! Rules adding Open Graph and Twitter Card tags to the page.
//!
//! [`DefaultPreview`] adds generic branding tags. [`TemplatePreview`] retrieves the data of a
//! tour template from the upstream API and describes that template instead.

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use preview_module_utils::pingora::{Error, ErrorType, ResponseHeader};
use regex::{Captures, Regex};
use serde_json::Value;

use crate::fetch::Fetcher;
use crate::html::{add_doc_prefix, append_to_head, meta, AttrValue, Attributes};
use crate::request::PageRequest;
use crate::rules::{Rule, Transform};
use crate::url::{full_api_url, full_url};
use crate::UPSTREAM_FETCH_ERROR;

/// Maximal length of the `og:description` value in characters
pub const DESCRIPTION_MAX_LENGTH: usize = 300;

/// Width requested for preview images
pub const IMAGE_PREVIEW_WIDTH: u32 = 300;

/// Site name used in preview tags
pub const BRAND_NAME: &str = "uGroop";

/// Description used for pages without specific data
pub const DEFAULT_DESCRIPTION: &str =
    "Start organising your tour today. Let us guide you on where you are headed.";

/// Image used for pages without specific data
pub const DEFAULT_IMAGE_URL: &str =
    "https://s3-us-west-2.amazonaws.com/com.ugroop.public/ugroop_cover.jpg";

/// Path pattern of template pages, the first capture group is the template key
pub const TEMPLATE_PATH_PATTERN: &str = "^/public/template/([^/]+)";

/// Path pattern of the catch-all default rule
pub const DEFAULT_PATH_PATTERN: &str = "/";

const OG_PREFIX: &str = "og";
const OG_NAMESPACE: &str = "http://ogp.me/ns#";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Collapses whitespace sequences into a single space and limits the text to
/// [`DESCRIPTION_MAX_LENGTH`] characters.
pub fn normalize_description(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let truncated: String = collapsed.chars().take(DESCRIPTION_MAX_LENGTH).collect();
    truncated.trim().to_owned()
}

fn property(name: &str, content: impl Into<AttrValue>) -> String {
    meta(&Attributes::new().with("property", name).with("content", content))
}

fn twitter_card() -> String {
    meta(
        &Attributes::new()
            .with("name", "twitter:card")
            .with("content", "summary_large_image"),
    )
}

fn insert_tags(content: &str, tags: &[String]) -> String {
    append_to_head(&add_doc_prefix(content, OG_PREFIX, OG_NAMESPACE), tags)
}

/// Adds generic preview tags pointing to the requested page
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPreview;

#[async_trait]
impl Transform for DefaultPreview {
    async fn transform(
        &self,
        request: &PageRequest,
        _response: &mut ResponseHeader,
        content: String,
        _captures: &Captures<'_>,
    ) -> Result<String, Box<Error>> {
        let link = full_url(request, request.original_url())?;

        let tags = [
            twitter_card(),
            property("og:url", link),
            property("og:type", "website"),
            property("og:title", BRAND_NAME),
            property("og:site_name", BRAND_NAME),
            property("og:image:alt", format!("{BRAND_NAME} photo")),
            property("og:description", DEFAULT_DESCRIPTION),
            property("og:image", DEFAULT_IMAGE_URL),
        ];
        Ok(insert_tags(&content, &tags))
    }
}

/// The parts of an upstream template relevant for previews
///
/// Values of unexpected types are ignored, so are payloads that aren't JSON objects. Only a
/// `null` payload is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamTemplate {
    /// Template title, from the `content` field
    pub title: Option<AttrValue>,
    /// Non-empty `customData.shortDescription` field
    pub short_description: Option<String>,
    /// Non-empty `content` field of the first entry in `photos`
    pub photo: Option<String>,
}

impl UpstreamTemplate {
    /// Decodes the JSON response of the upstream API.
    pub fn from_json(body: &[u8]) -> Result<Self, Box<Error>> {
        let value: Value = serde_json::from_slice(body).map_err(|err| {
            Error::because(
                UPSTREAM_FETCH_ERROR,
                "failed decoding upstream template",
                err,
            )
        })?;
        let template = match value {
            Value::Object(template) => template,
            Value::Null => {
                return Err(Error::explain(
                    UPSTREAM_FETCH_ERROR,
                    "upstream template is null",
                ))
            }
            _ => return Ok(Self::default()),
        };

        let title = match template.get("content") {
            Some(Value::String(title)) => Some(AttrValue::Str(title.clone())),
            Some(Value::Number(number)) => number.as_i64().map(AttrValue::Int),
            _ => None,
        };

        let short_description = template
            .get("customData")
            .and_then(|data| data.get("shortDescription"))
            .and_then(Value::as_str)
            .filter(|description| !description.is_empty())
            .map(str::to_owned);

        let photo = template
            .get("photos")
            .and_then(Value::as_array)
            .and_then(|photos| photos.first())
            .and_then(|photo| photo.get("content"))
            .and_then(Value::as_str)
            .filter(|photo| !photo.is_empty())
            .map(str::to_owned);

        Ok(Self {
            title,
            short_description,
            photo,
        })
    }
}

/// Describes a tour template, with data retrieved from `<account base URL>/Pub/template/<key>`
///
/// The template key is the first capture group of the path pattern. If the upstream API returns
/// no data, the content is left unchanged.
#[derive(Debug)]
pub struct TemplatePreview {
    fetcher: Box<dyn Fetcher>,
    account_base_url: String,
}

impl TemplatePreview {
    /// Creates the rule. `account_base_url` can be absolute or relative to the site.
    pub fn new(fetcher: Box<dyn Fetcher>, account_base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            account_base_url: account_base_url.into(),
        }
    }
}

#[async_trait]
impl Transform for TemplatePreview {
    async fn transform(
        &self,
        request: &PageRequest,
        _response: &mut ResponseHeader,
        content: String,
        captures: &Captures<'_>,
    ) -> Result<String, Box<Error>> {
        let key = captures.get(1).ok_or_else(|| {
            Error::explain(
                ErrorType::InternalError,
                "template path pattern has no capture group",
            )
        })?;

        let link = full_url(request, request.original_url())?;
        let endpoint = format!("/Pub/template/{}", key.as_str());
        let url = full_api_url(request, &self.account_base_url, &endpoint)?;

        let Some(body) = self.fetcher.fetch(&url).await? else {
            debug!("no template data from {url}, leaving page unchanged");
            return Ok(content);
        };
        let template = UpstreamTemplate::from_json(&body)?;

        let mut tags = vec![
            twitter_card(),
            property("og:url", link),
            property("og:type", "website"),
            property("og:site_name", BRAND_NAME),
        ];

        let mut title = Attributes::new().with("property", "og:title");
        if let Some(value) = template.title {
            title.insert("content", value);
        }
        tags.push(meta(&title));

        if let Some(description) = template.short_description {
            tags.push(property(
                "og:description",
                normalize_description(&description),
            ));
        }

        if let Some(photo) = template.photo {
            let photo = full_api_url(request, &self.account_base_url, &photo)?;
            tags.push(property(
                "og:image",
                format!("{photo}?width={IMAGE_PREVIEW_WIDTH}"),
            ));
            tags.push(property("og:image:alt", "Tour photo"));
        }

        Ok(insert_tags(&content, &tags))
    }
}

/// Produces the standard rule list: template pages get a template preview, all other pages the
/// default preview.
pub fn default_rules(
    fetcher: Box<dyn Fetcher>,
    account_base_url: &str,
) -> Result<Vec<Rule>, Box<Error>> {
    Ok(vec![
        Rule::new(
            TEMPLATE_PATH_PATTERN,
            TemplatePreview::new(fetcher, account_base_url),
        )?,
        Rule::new(DEFAULT_PATH_PATTERN, DefaultPreview)?,
    ])
}
