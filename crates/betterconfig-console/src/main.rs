// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::process::ExitCode;

use serde::Deserialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use betterconfig::ClientConfig;

/// Shape of the sample project document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SampleConfig {
    key_bool: bool,
    key_double: f64,
    key_integer: i32,
    key_string: String,
}

pub fn main() -> ExitCode {
    let log_level = env::var("BETTERCONFIG_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let filter = match EnvFilter::try_new(env_filter) {
        Ok(filter) => filter,
        Err(err) => {
            eprintln!("could not parse log level in configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration, set BETTERCONFIG_PROJECT_SECRET (e.g. samples/01): {err}");
            return ExitCode::FAILURE;
        }
    };
    let client = match config.build_client() {
        Ok(client) => client,
        Err(err) => {
            error!("Unable to create BetterConfig client: {err}");
            return ExitCode::FAILURE;
        }
    };

    // Whole document deserialized into a struct
    let sample = client.get_configuration(SampleConfig::default());
    println!("keyBool: {}", sample.key_bool);
    println!("keyDouble: {}", sample.key_double);
    println!("keyInteger: {}", sample.key_integer);
    println!("keyString: {}", sample.key_string);

    // Single value looked up by key
    match client.get_string_value("keySampleText", "") {
        Ok(text) => println!("keySampleText: {text}"),
        Err(err) => error!("Unable to read keySampleText: {err}"),
    }

    client.close();
    ExitCode::SUCCESS
}
