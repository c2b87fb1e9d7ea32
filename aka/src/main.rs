// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::rt::System;
use actix_web::{App, HttpServer, middleware, web};
use std::path::PathBuf;
use std::sync::Arc;

mod app_state;
mod bootstrap;
mod config;
mod i18n;
mod identity;
mod login;
mod rename;
mod security;
mod session;
mod templates;
mod util;

use app_state::AppState;
use i18n::Catalog;
use identity::FileIdentityStore;
use rename::RenameHooks;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

struct ParsedArgs {
    runtime_root: PathBuf,
    show_help: bool,
}

fn parse_args() -> Result<ParsedArgs, String> {
    let mut args = std::env::args().skip(1);
    let mut runtime_root = PathBuf::from(".");
    let mut show_help = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-C" => {
                runtime_root = PathBuf::from(
                    args.next()
                        .ok_or_else(|| "-C requires a directory".to_string())?,
                );
            }
            "-h" | "--help" => show_help = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(ParsedArgs {
        runtime_root,
        show_help,
    })
}

fn help_text() -> &'static str {
    "aka - account rename feature for community platforms\n\
     \n\
     Usage: aka [-C <root>]\n\
     \n\
     Options:\n\
     \x20 -C <root>   Runtime directory (config.yaml, identities.yaml, locales/)\n\
     \x20 -h, --help  Show this help\n"
}

fn run() -> i32 {
    let parsed_args = match parse_args() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("❌ Invalid command line arguments: {}", error);
            eprintln!("❌ Use -C <root> to set the runtime directory.");
            return 1;
        }
    };

    if parsed_args.show_help {
        print!("{}", help_text());
        return 0;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let bootstrap = match bootstrap::bootstrap_runtime(&parsed_args.runtime_root) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("❌ Bootstrap error: {}", error);
            eprintln!("❌ Application cannot start with invalid configuration.");
            return 1;
        }
    };

    let config = bootstrap.validated_config;
    let store = match FileIdentityStore::new(bootstrap.identities_file) {
        Ok(store) => store,
        Err(error) => {
            eprintln!("❌ Identity store error: {}", error);
            return 1;
        }
    };
    let catalog = Catalog::load(&bootstrap.locales_dir, &config.locale);

    System::new().block_on(async move {
        let state = match AppState::new(&config, Arc::new(store), RenameHooks::new(), catalog) {
            Ok(state) => state,
            Err(error) => {
                eprintln!("❌ Failed to initialize identity service: {}", error);
                return 1;
            }
        };
        let state = web::Data::new(state);
        let config_data = web::Data::new(config.clone());
        let config_for_app = config.clone();

        log::info!("Listening on http://{}", config.bind);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(middleware::Logger::default())
                .wrap(middleware::NormalizePath::trim())
                .app_data(state.clone())
                .app_data(config_data.clone())
                .configure(login::configure)
                .configure(|cfg| rename::handlers::configure(cfg, &config_for_app))
        })
        .bind(config.bind);

        match server {
            Ok(server) => match server.run().await {
                Ok(()) => 0,
                Err(error) => {
                    eprintln!("❌ Server error: {}", error);
                    1
                }
            },
            Err(error) => {
                eprintln!("❌ Failed to bind {}: {}", config.bind, error);
                1
            }
        }
    })
}
