// tests/locales.rs

// Translations are substituted into `format!` calls by placeholder name, so a
// translated string must use exactly the placeholders of its English original.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

fn table(lang: &str) -> BTreeMap<String, String> {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "locales", &format!("{lang}.toml")]
        .iter()
        .collect();
    let content = std::fs::read_to_string(&path).unwrap();
    toml::from_str(&content).unwrap()
}

fn placeholders(text: &str) -> BTreeSet<String> {
    let re = Regex::new(r"\{([A-Za-z_-]*)\}").unwrap();
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

#[test]
fn test_translations_match_english_placeholders() {
    let english = table("en");
    let spanish = table("es");
    assert!(!spanish.is_empty());

    for (key, value) in &spanish {
        let original = english
            .get(key)
            .unwrap_or_else(|| panic!("'{key}' in es.toml has no English original"));
        assert_eq!(
            placeholders(value),
            placeholders(original),
            "placeholders differ for '{key}'"
        );
    }
}

#[test]
fn test_run_commands_have_strings() {
    let english = table("en");
    for key in ["apply.error.sheet_required", "apply.error.invalid", "error.current_dir"] {
        assert!(english.contains_key(key), "missing '{key}'");
    }
    assert_eq!(placeholders(&english["apply.error.invalid"]), BTreeSet::from(["name".to_string()]));
}
