//! Fns to read variables from the environment more conveniently, and the config the binaries
//! run with.

use std::env;

use lazy_static::lazy_static;
use tracing::debug;

/// Hosted subgraph gateways take the API key as part of the path.
const SECRET_LOG_BLACKLIST: [&str; 1] = ["SUBGRAPH_URL"];

pub const DEFAULT_SUBGRAPH_URL: &str = "https://api.thegraph.com/subgraphs/name/circlesubi/circles";
pub const DEFAULT_BLOCK_EXPLORER_URL: &str = "https://blockscout.com/poa/xdai/api";

lazy_static! {
    pub static ref ENV_CONFIG: EnvConfig = get_env_config();
}

fn obfuscate_if_secret(blacklist: &[&str], key: &str, value: &str) -> String {
    if blacklist.contains(&key) {
        let mut last_four: Vec<char> = value.chars().rev().take(4).collect();
        last_four.reverse();
        format!("****{}", last_four.into_iter().collect::<String>())
    } else {
        value.to_string()
    }
}

/// Get an environment variable, encoding found or missing as Option, and panic otherwise.
pub fn get_env_var(key: &str) -> Option<String> {
    let var = match env::var(key) {
        Err(env::VarError::NotPresent) => None,
        Err(e) => panic!("{e}"),
        Ok(var) => Some(var),
    };

    if let Some(ref existing_var) = var {
        let output = obfuscate_if_secret(&SECRET_LOG_BLACKLIST, key, existing_var);
        debug!("env var {key}: {output}");
    } else {
        debug!("env var {key} requested but not found")
    };

    var
}

pub fn get_env_bool(key: &str) -> Option<bool> {
    get_env_var(key).map(|var| match var.to_lowercase().as_str() {
        "true" | "t" | "1" => true,
        "false" | "f" | "0" => false,
        str => panic!("invalid bool value {str} for {key}"),
    })
}

pub struct EnvConfig {
    pub block_explorer_url: String,
    pub log_json: bool,
    pub log_perf: bool,
    pub subgraph_url: String,
}

pub fn get_env_config() -> EnvConfig {
    EnvConfig {
        block_explorer_url: get_env_var("BLOCK_EXPLORER_URL")
            .unwrap_or_else(|| DEFAULT_BLOCK_EXPLORER_URL.to_string()),
        log_json: get_env_bool("LOG_JSON").unwrap_or(false),
        log_perf: get_env_bool("LOG_PERF").unwrap_or(false),
        subgraph_url: get_env_var("SUBGRAPH_URL")
            .unwrap_or_else(|| DEFAULT_SUBGRAPH_URL.to_string()),
    }
}
