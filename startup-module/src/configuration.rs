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

use clap::Args;
use log::debug;
use preview_module_utils::pingora::{
    http_proxy_service, ProxyHttp, Server, ServerConf, ServerOpt,
};
use serde::Deserialize;

/// Addresses used when neither configuration nor command line name any
pub const DEFAULT_LISTEN: &[&str] = &["127.0.0.1:8080", "[::1]:8080"];

/// Run a web server
#[derive(Debug, Default, Args)]
pub struct StartupOpt {
    /// Address and port to listen on, e.g. "127.0.0.1:8080". This command line flag can be
    /// specified multiple times.
    #[clap(short, long)]
    pub listen: Option<Vec<String>>,
    /// Use this flag to make the server run in the background.
    #[clap(short, long)]
    pub daemon: bool,
    /// Test the configuration and exit. This is useful to validate the configuration before
    /// restarting the process.
    #[clap(short, long)]
    pub test: bool,
    /// The path to the configuration file. This command line flag can be specified multiple times.
    #[clap(short, long)]
    pub conf: Option<Vec<String>>,
}

/// Configuration settings of the startup module
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartupConf {
    /// List of address/port combinations to listen on, e.g. "127.0.0.1:8080".
    pub listen: Vec<String>,
    /// Pingora’s default server configuration options
    #[serde(flatten)]
    pub server: ServerConf,
}

impl StartupConf {
    /// Determines the addresses to listen on. Command line options take precedence over the
    /// configuration file, [`DEFAULT_LISTEN`] is used if neither has any addresses.
    pub fn listen_addrs(&self, opt: &StartupOpt) -> Vec<String> {
        let listen = opt.listen.as_ref().unwrap_or(&self.listen);
        if listen.is_empty() {
            DEFAULT_LISTEN.iter().map(|addr| (*addr).to_owned()).collect()
        } else {
            listen.clone()
        }
    }

    /// Sets up a server with the given configuration and command line options
    pub fn into_server<SV>(self, app: SV, opt: Option<StartupOpt>) -> Server
    where
        SV: ProxyHttp + Send + Sync + 'static,
        <SV as ProxyHttp>::CTX: Send + Sync,
    {
        let opt = opt.unwrap_or_default();
        let listen = self.listen_addrs(&opt);

        let mut server = Server::new_with_opt_and_conf(
            ServerOpt {
                daemon: opt.daemon,
                test: opt.test,
                upgrade: false,
                nocapture: false,
                conf: None,
            },
            self.server,
        );
        server.bootstrap();

        let mut proxy = http_proxy_service(&server.configuration, app);
        for addr in listen {
            debug!("Listening on {addr}");
            proxy.add_tcp(&addr);
        }
        server.add_service(proxy);

        server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use preview_module_utils::FromYaml;
    use test_log::test;

    #[test]
    fn listen_addrs() {
        let conf = StartupConf::default();
        assert_eq!(
            conf.listen_addrs(&StartupOpt::default()),
            vec!["127.0.0.1:8080".to_owned(), "[::1]:8080".to_owned()]
        );

        let conf = StartupConf::from_yaml("listen: [\"0.0.0.0:80\"]").unwrap();
        assert_eq!(
            conf.listen_addrs(&StartupOpt::default()),
            vec!["0.0.0.0:80".to_owned()]
        );

        let opt = StartupOpt {
            listen: Some(vec!["127.0.0.1:3000".to_owned()]),
            ..Default::default()
        };
        assert_eq!(conf.listen_addrs(&opt), vec!["127.0.0.1:3000".to_owned()]);
    }
}
