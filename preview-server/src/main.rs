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

#![doc = include_str!("../README.md")]

use clap::Parser;
use log::error;
use page_module::{PageConf, PageHandler, PageOpt};
use preview_module_utils::FromYaml;
use serde::Deserialize;
use startup_module::{DefaultApp, StartupConf, StartupOpt};

/// Run the link preview server
#[derive(Debug, Parser)]
struct Opt {
    #[clap(flatten)]
    startup: StartupOpt,
    #[clap(flatten)]
    page: PageOpt,
}

/// The configuration of the link preview server
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Conf {
    #[serde(flatten)]
    startup: StartupConf,
    #[serde(flatten)]
    page: PageConf,
}

fn main() {
    env_logger::init();

    let opt = Opt::parse();

    let mut conf = match Conf::load_from_files(opt.startup.conf.as_deref().unwrap_or(&[])) {
        Ok(conf) => conf,
        Err(err) => {
            error!("{err}");
            return;
        }
    };
    conf.page.merge_with_opt(opt.page);

    let app = match DefaultApp::<PageHandler>::from_conf(conf.page) {
        Ok(app) => app,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let server = conf.startup.into_server(app, Some(opt.startup));
    server.run_forever();
}
