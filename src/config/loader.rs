//! Configuration loading and environment parsing.

use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Load configuration with the following precedence (highest first):
/// 1) File pointed at by the `GOBANG_CONFIG_PATH` env var
/// 2) `config.json` in the current working directory
/// 3) Defaults compiled into the binary
///
/// Individual fields can additionally be overridden by environment
/// variables prefixed with `GOBANG__`, using `__` as the nested
/// separator, e.g. `GOBANG__PORT=8080` or
/// `GOBANG__LOGGING__LEVEL=debug`. Errors while reading or parsing any
/// source are printed to stderr and that source is skipped; `load()`
/// always returns a usable `Config`.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    if let Ok(path) = std::env::var("GOBANG_CONFIG_PATH") {
        merge_file_source(&mut merged, Path::new(&path));
    } else {
        merge_file_source(&mut merged, Path::new("config.json"));
    }

    apply_env_overrides(&mut merged);

    match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to deserialize config; using defaults: {err}");
            defaults
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Value>(&contents) {
            Ok(value) => merge_values(target, value),
            Err(err) => {
                eprintln!("Failed to parse config from {}: {err}", path.display());
            }
        },
        Err(err) => {
            eprintln!("Failed to read config from {}: {err}", path.display());
        }
    }
}

/// Deep-merge `source` into `target`; objects merge key-wise, everything
/// else replaces.
fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw_value) in std::env::vars() {
        let Some(stripped) = key.strip_prefix("GOBANG__") else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        return Value::Array(trimmed.split(',').map(|s| parse_scalar(s.trim())).collect());
    }
    parse_scalar(trimmed)
}

/// Interpret an env value as JSON when possible, falling back to a
/// plain string (so `GOBANG__PORT=8080` becomes a number but
/// `GOBANG__SERVER__WEB_ROOT=wwwroot` stays a string).
fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    let map = ensure_object(target);
    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    match value.as_object_mut() {
        Some(map) => map,
        // Unreachable: the branch above just coerced the value.
        None => unreachable!("value was coerced into an object"),
    }
}
