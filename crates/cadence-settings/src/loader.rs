//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CadenceSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `CADENCE_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{CadenceSettings, DevicePreference};

/// Env var naming the settings file.
pub const CONFIG_ENV: &str = "CADENCE_CONFIG";

/// Resolve the settings file path: `$CADENCE_CONFIG`, else `cadence.json`.
pub fn settings_path() -> PathBuf {
    read_env_string(CONFIG_ENV).map_or_else(|| PathBuf::from("cadence.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CadenceSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<CadenceSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file at `path` deep-merged over them. No env overrides.
pub fn load_file_layer(path: &Path) -> Result<CadenceSettings> {
    let defaults =
        serde_json::to_value(CadenceSettings::default()).map_err(SettingsError::json(None))?;

    let merged = if path.exists() {
        debug!(path = %path.display(), "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(SettingsError::json(Some(path)))?;
        deep_merge(defaults, user)
    } else {
        debug!(path = %path.display(), "settings file not found, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(SettingsError::json(Some(path)))
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `CADENCE_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut CadenceSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Empty values are treated as unset. Values that fail to parse are logged
/// and ignored, leaving the file/default value in place.
pub fn apply_overrides<F>(settings: &mut CadenceSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = get("CADENCE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = get("CADENCE_PORT") {
        if let Some(port) = checked("CADENCE_PORT", &v, parse_u16_range(&v, 1, u16::MAX)) {
            settings.server.port = port;
        }
    }
    if let Some(v) = get("CADENCE_MAX_UPLOAD_BYTES") {
        let parsed = parse_usize_range(&v, 1024, usize::MAX);
        if let Some(n) = checked("CADENCE_MAX_UPLOAD_BYTES", &v, parsed) {
            settings.server.max_upload_bytes = n;
        }
    }

    // ── Inference ───────────────────────────────────────────────────
    if let Some(v) = get("CADENCE_EXTRACTOR_PATH") {
        settings.inference.extractor_path = PathBuf::from(v);
    }
    if let Some(v) = get("CADENCE_CLASSIFIER_PATH") {
        settings.inference.classifier_path = PathBuf::from(v);
    }
    if let Some(v) = get("CADENCE_GENRES") {
        if let Some(genres) = checked("CADENCE_GENRES", &v, parse_list(&v)) {
            settings.inference.genres = genres;
        }
    }
    if let Some(v) = get("CADENCE_DEVICE") {
        if let Some(d) = checked("CADENCE_DEVICE", &v, v.parse::<DevicePreference>().ok()) {
            settings.inference.device = d;
        }
    }
    if let Some(v) = get("CADENCE_SAMPLE_RATE") {
        let parsed = parse_u32_range(&v, 1, 384_000);
        if let Some(rate) = checked("CADENCE_SAMPLE_RATE", &v, parsed) {
            settings.inference.sample_rate = rate;
        }
    }
    if let Some(v) = get("CADENCE_EXTRACTOR_SESSIONS") {
        let parsed = parse_usize_range(&v, 1, 64);
        if let Some(n) = checked("CADENCE_EXTRACTOR_SESSIONS", &v, parsed) {
            settings.inference.extractor_sessions = n;
        }
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = get("CADENCE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn checked<T>(key: &str, raw: &str, parsed: Option<T>) -> Option<T> {
    if parsed.is_none() {
        warn!(key, value = %raw, "invalid env var, ignoring");
    }
    parsed
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(settings: &CadenceSettings) -> Result<()> {
    if settings.server.port == 0 {
        return Err(SettingsError::InvalidValue(
            "server.port must be non-zero".into(),
        ));
    }
    let inference = &settings.inference;
    if inference.sample_rate == 0 {
        return Err(SettingsError::InvalidValue(
            "inference.sampleRate must be non-zero".into(),
        ));
    }
    if inference.extractor_sessions == 0 {
        return Err(SettingsError::InvalidValue(
            "inference.extractorSessions must be at least 1".into(),
        ));
    }
    check_genres(&inference.genres)
        .map_err(|msg| SettingsError::InvalidValue(format!("inference.genres: {msg}")))?;
    if !(inference.probe_seconds.is_finite() && inference.probe_seconds > 0.0) {
        return Err(SettingsError::InvalidValue(
            "inference.probeSeconds must be positive".into(),
        ));
    }
    Ok(())
}

/// The one rule for a genre label list: non-empty, no blank or duplicate
/// labels. Returns a message naming the offending label.
pub fn check_genres(genres: &[String]) -> std::result::Result<(), String> {
    if genres.is_empty() {
        return Err("label list is empty".into());
    }
    let mut seen = HashSet::with_capacity(genres.len());
    for genre in genres {
        if genre.trim().is_empty() {
            return Err("blank label".into());
        }
        if !seen.insert(genre.as_str()) {
            return Err(format!("duplicate label '{genre}'"));
        }
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a comma-separated list, trimming entries. Empty entries are dropped.
///
/// Returns `None` when nothing is left.
pub fn parse_list(val: &str) -> Option<Vec<String>> {
    let items: Vec<String> = val
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"genres": ["a", "b", "c"]});
        let source = serde_json::json!({"genres": ["x"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["genres"], serde_json::json!(["x"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_file_layer ─────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/cadence.json")).unwrap();
        assert_eq!(settings, CadenceSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "inference": {"device": "cpu", "sampleRate": 22050}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.inference.device, DevicePreference::Cpu);
        assert_eq!(settings.inference.sample_rate, 22_050);
        assert_eq!(settings.inference.genres.len(), 5);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_file_layer(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json { .. }));
    }

    #[test]
    fn wrong_type_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cadence.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();

        assert!(load_file_layer(&path).is_err());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut settings = CadenceSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("CADENCE_HOST", "127.0.0.1"),
                ("CADENCE_PORT", "9001"),
                ("CADENCE_GENRES", "house, techno ,,trance"),
                ("CADENCE_DEVICE", "cpu"),
                ("CADENCE_SAMPLE_RATE", "32000"),
                ("CADENCE_EXTRACTOR_SESSIONS", "3"),
                ("CADENCE_EXTRACTOR_PATH", "/m/x.onnx"),
                ("CADENCE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.inference.genres, ["house", "techno", "trance"]);
        assert_eq!(settings.inference.device, DevicePreference::Cpu);
        assert_eq!(settings.inference.sample_rate, 32_000);
        assert_eq!(settings.inference.extractor_sessions, 3);
        assert_eq!(settings.inference.extractor_path, PathBuf::from("/m/x.onnx"));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut settings = CadenceSettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("CADENCE_PORT", "0"),
                ("CADENCE_DEVICE", "tpu"),
                ("CADENCE_GENRES", " , "),
                ("CADENCE_EXTRACTOR_SESSIONS", "many"),
                ("CADENCE_HOST", ""),
            ]),
        );
        assert_eq!(settings, CadenceSettings::default());
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn defaults_validate() {
        validate(&CadenceSettings::default()).unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<Box<dyn Fn(&mut CadenceSettings)>> = vec![
            Box::new(|s| s.server.port = 0),
            Box::new(|s| s.inference.sample_rate = 0),
            Box::new(|s| s.inference.extractor_sessions = 0),
            Box::new(|s| s.inference.genres.clear()),
            Box::new(|s| s.inference.genres.push("house".into())),
            Box::new(|s| s.inference.genres[0] = " ".into()),
            Box::new(|s| s.inference.probe_seconds = 0.0),
        ];
        for mutate in cases {
            let mut settings = CadenceSettings::default();
            mutate(&mut settings);
            let err = validate(&settings).unwrap_err();
            assert!(matches!(err, SettingsError::InvalidValue(_)), "{err}");
        }
    }

    #[test]
    fn duplicate_genre_named_in_error() {
        let mut settings = CadenceSettings::default();
        settings.inference.genres = vec!["house".into(), "house".into()];
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("'house'"));
    }

    #[test]
    fn check_genres_rules() {
        let owned = |names: &[&str]| names.iter().map(|s| (*s).to_string()).collect::<Vec<_>>();
        check_genres(&owned(&["house", "techno"])).unwrap();
        assert_eq!(check_genres(&[]).unwrap_err(), "label list is empty");
        assert_eq!(check_genres(&owned(&["house", "\t"])).unwrap_err(), "blank label");
        assert_eq!(
            check_genres(&owned(&["house", "dnb", "house"])).unwrap_err(),
            "duplicate label 'house'"
        );
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8000", 1, u16::MAX), Some(8000));
        assert_eq!(parse_u16_range("0", 1, u16::MAX), None);
        assert_eq!(parse_u16_range("70000", 1, u16::MAX), None);
        assert_eq!(parse_u32_range(" 16000 ", 1, 384_000), Some(16_000));
        assert_eq!(parse_usize_range("-1", 0, 10), None);
    }

    #[test]
    fn parse_list_trims() {
        assert_eq!(
            parse_list("a, b ,c"),
            Some(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(parse_list(""), None);
    }
}
