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

//! # Module helpers
//!
//! This crate contains the pieces shared by the link preview server and its modules: the
//! [`RequestFilter`] trait implemented by request handlers, YAML configuration loading via
//! [`FromYaml`], and re-exports of the Pingora types handlers work with.

pub mod pingora;

use async_trait::async_trait;
use log::trace;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::pingora::{Error, ErrorType, SessionWrapper};

/// Request filter result indicating how the current request should be processed further
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestFilterResult {
    /// Response has been sent, no further processing should happen. Other Pingora phases should
    /// not be triggered.
    ResponseSent,

    /// Request filter could not handle this request, next request filter should run if it exists.
    #[default]
    Unhandled,
}

/// Trait to be implemented by request filters.
#[async_trait]
pub trait RequestFilter: Sized {
    /// Configuration type of this handler.
    type Conf;

    /// Per-request state of this handler, see [`pingora::ProxyHttp::CTX`]
    type CTX;

    /// Creates a new state object, see [`pingora::ProxyHttp::new_ctx`]
    fn new_ctx() -> Self::CTX;

    /// Handler to run during Pingora’s `request_filter` state, see
    /// [`pingora::ProxyHttp::request_filter`]. This uses a different return type to account
    /// for the existence of multiple request filters.
    async fn request_filter(
        &self,
        session: &mut impl SessionWrapper,
        ctx: &mut Self::CTX,
    ) -> Result<RequestFilterResult, Box<Error>>;
}

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML string.
    fn from_yaml(yaml_conf: impl AsRef<str>) -> Result<Self, Box<Error>>
    where
        Self: Sized;

    /// Loads configuration from a list of YAML files. Top-level settings of later files override
    /// the ones from earlier files. An empty list produces the configuration of an empty YAML
    /// document.
    fn load_from_files(paths: &[impl AsRef<Path>]) -> Result<Self, Box<Error>>
    where
        Self: Sized;
}

fn read_yaml_value(path: &Path) -> Result<Value, Box<Error>> {
    let file = File::open(path).map_err(|err| {
        Error::because(
            ErrorType::FileOpenError,
            format!("failed opening configuration file {path:?}"),
            err,
        )
    })?;
    let reader = BufReader::new(file);

    serde_yaml::from_reader(reader).map_err(|err| {
        Error::because(
            ErrorType::FileReadError,
            format!("failed reading configuration file {path:?}"),
            err,
        )
    })
}

fn deserialize_value<D>(value: Value) -> Result<D, Box<Error>>
where
    D: DeserializeOwned + Debug,
{
    let conf = serde_yaml::from_value(value).map_err(|err| {
        Error::because(
            ErrorType::ReadError,
            "failed deserializing configuration",
            err,
        )
    })?;
    trace!("Loaded configuration: {conf:#?}");
    Ok(conf)
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug,
{
    fn from_yaml(yaml_conf: impl AsRef<str>) -> Result<Self, Box<Error>> {
        let value = serde_yaml::from_str(yaml_conf.as_ref()).map_err(|err| {
            Error::because(ErrorType::ReadError, "failed parsing configuration", err)
        })?;
        deserialize_value(value)
    }

    fn load_from_files(paths: &[impl AsRef<Path>]) -> Result<Self, Box<Error>> {
        let mut merged = Mapping::new();
        for path in paths {
            match read_yaml_value(path.as_ref())? {
                Value::Mapping(mapping) => {
                    for (key, value) in mapping {
                        merged.insert(key, value);
                    }
                }
                Value::Null => {}
                _ => {
                    return Err(Error::explain(
                        ErrorType::ReadError,
                        format!(
                            "configuration file {:?} does not contain a map",
                            path.as_ref()
                        ),
                    ))
                }
            }
        }
        deserialize_value(Value::Mapping(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use std::io::Write;
    use std::path::PathBuf;
    use test_log::test;

    #[derive(Debug, Default, PartialEq, Eq, Deserialize)]
    #[serde(default)]
    struct Conf {
        first: Option<String>,
        second: Vec<u16>,
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("preview-module-utils-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn from_yaml() {
        let conf = Conf::from_yaml("first: hi\nsecond: [1, 2]").unwrap();
        assert_eq!(
            conf,
            Conf {
                first: Some("hi".to_owned()),
                second: vec![1, 2],
            }
        );

        assert_eq!(Conf::from_yaml("{}").unwrap(), Conf::default());
        assert!(Conf::from_yaml("second: abc").is_err());
    }

    #[test]
    fn load_from_files() {
        let first = write_temp("first.yaml", "first: one\nsecond: [1]\n");
        let second = write_temp("second.yaml", "second: [2, 3]\n");

        let conf = Conf::load_from_files(&[&first, &second]).unwrap();
        assert_eq!(
            conf,
            Conf {
                first: Some("one".to_owned()),
                second: vec![2, 3],
            }
        );

        let empty: [&Path; 0] = [];
        let conf = Conf::load_from_files(&empty).unwrap();
        assert_eq!(conf, Conf::default());

        let missing = std::env::temp_dir().join("preview-module-utils-does-not-exist.yaml");
        let err = Conf::load_from_files(&[missing]).unwrap_err();
        assert_eq!(err.etype, ErrorType::FileOpenError);

        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(second);
    }
}
