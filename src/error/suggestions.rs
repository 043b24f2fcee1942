//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with hints
//! that name the offending record, path, or config key.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::IndexBuildFailed | ErrorCode::CatalogInvalid => {
            suggest_bad_record(code, context)
        }
        ErrorCode::IndexVersionMismatch => suggest_version_mismatch(context),
        ErrorCode::ConfigMissingRequired => suggest_config_missing_required(context),
        ErrorCode::RerankUnavailable => suggest_rerank_unavailable(context),
        _ => code.suggestion().to_string(),
    }
}

fn context_str<'a>(context: Option<&'a Value>, key: &str) -> Option<&'a str> {
    context.and_then(|c| c.get(key)).and_then(Value::as_str)
}

fn suggest_bad_record(code: ErrorCode, context: Option<&Value>) -> String {
    match (context_str(context, "record"), context_str(context, "reason")) {
        (Some(record), Some(reason)) => format!(
            "Catalog record '{record}' is unusable: {reason}\nFix the record, then run `arec build` again"
        ),
        (Some(record), None) => {
            format!("Catalog record '{record}' is unusable. Fix it, then run `arec build` again")
        }
        _ => code.suggestion().to_string(),
    }
}

fn suggest_version_mismatch(context: Option<&Value>) -> String {
    match (context_str(context, "expected"), context_str(context, "found")) {
        (Some(expected), Some(found)) => format!(
            "Index was built for {found} but this build expects {expected}.\nRebuild it with `arec build`"
        ),
        _ => ErrorCode::IndexVersionMismatch.suggestion().to_string(),
    }
}

fn suggest_config_missing_required(context: Option<&Value>) -> String {
    let Some(key) = context_str(context, "config_key") else {
        return ErrorCode::ConfigMissingRequired.suggestion().to_string();
    };
    if key.ends_with("_API_KEY") {
        return format!(
            "Export {key} with your provider key, or set generation.backend = \"heuristic\" to run offline"
        );
    }
    format!("Set '{key}' in config.toml or through its AREC_* environment variable")
}

fn suggest_rerank_unavailable(context: Option<&Value>) -> String {
    match context_str(context, "endpoint") {
        Some(endpoint) => format!(
            "Could not reach {endpoint}. Check connectivity and generation.endpoint, or use generation.backend = \"heuristic\""
        ),
        None => ErrorCode::RerankUnavailable.suggestion().to_string(),
    }
}
