// build.rs

//! Generates the `t!` macro from `locales/<lang>.toml`.
//!
//! English is the base table. Another language only overrides the keys it
//! defines, and each override must keep the English placeholders, because
//! call sites pass them by name to `format!`.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::Path;

const BASE_LANG: &str = "en";

fn main() {
    let lang = selected_language();
    println!("cargo:rustc-env=EE_LANG_EFFECTIVE={}", lang);
    println!("cargo:rerun-if-env-changed=EE_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    let base_path = format!("locales/{BASE_LANG}.toml");
    let mut translations = load_table(&base_path)
        .unwrap_or_else(|e| panic!("{e}"))
        .unwrap_or_else(|| panic!("Base language file '{base_path}' is missing"));

    if lang != BASE_LANG {
        let path = format!("locales/{lang}.toml");
        match load_table(&path).unwrap_or_else(|e| panic!("{e}")) {
            Some(overrides) => {
                for problem in check_overrides(&translations, &overrides) {
                    println!("cargo:warning={path}: {problem}");
                }
                let usable: Vec<(String, String)> = overrides
                    .into_iter()
                    .filter(|(key, value)| same_placeholders(&translations, key, value))
                    .collect();
                translations.extend(usable);
            }
            None => {
                println!("cargo:warning=Language file '{path}' not found. Using '{BASE_LANG}'.")
            }
        }
    }

    let out_dir = env::var("OUT_DIR").unwrap_or_else(|e| panic!("OUT_DIR is not set: {e}"));
    let dest_path = Path::new(&out_dir).join("translations.rs");
    fs::write(&dest_path, render_macro(&translations))
        .unwrap_or_else(|e| panic!("Failed to write {}: {e}", dest_path.display()));
}

/// A `lang_*` feature wins over `EE_LANG`; English is the default.
fn selected_language() -> String {
    let mut features: Vec<String> = env::vars()
        .filter_map(|(key, _)| key.strip_prefix("CARGO_FEATURE_LANG_").map(str::to_lowercase))
        .collect();
    features.sort();

    match features.as_slice() {
        [] => env::var("EE_LANG").unwrap_or_else(|_| BASE_LANG.to_string()),
        [only] => only.clone(),
        [first, ..] => {
            println!(
                "cargo:warning=Multiple language features enabled ({:?}). Using '{}'.",
                features, first
            );
            first.clone()
        }
    }
}

/// Reads a flat `"key" = "value"` table. `Ok(None)` when the file does not exist.
fn load_table(path: &str) -> Result<Option<BTreeMap<String, String>>, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("Failed to read {path}: {e}")),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| format!("Failed to parse {path}: {e}"))
}

/// Keys unknown to the base table and overrides whose placeholders differ.
/// Mismatched overrides are dropped in favour of the base string.
fn check_overrides(
    base: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut problems = Vec::new();
    for (key, value) in overrides {
        match base.get(key) {
            None => problems.push(format!("'{key}' is not a known key")),
            Some(_) if !same_placeholders(base, key, value) => problems.push(format!(
                "'{key}' uses placeholders {:?}, expected {:?}",
                placeholders(value),
                placeholders(&base[key])
            )),
            Some(_) => {}
        }
    }
    problems
}

fn same_placeholders(base: &BTreeMap<String, String>, key: &str, value: &str) -> bool {
    base.get(key).is_some_and(|original| placeholders(original) == placeholders(value))
}

/// The `{name}` and `{}` placeholders of a format string. `{{`/`}}` are escapes.
fn placeholders(text: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
            }
            '{' => {
                let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                found.insert(name);
            }
            _ => {}
        }
    }
    found
}

/// One arm per key, sorted so rebuilds are reproducible. Unknown keys fail the build.
fn render_macro(translations: &BTreeMap<String, String>) -> String {
    let mut code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, value) in translations {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        code.push_str(&format!("    (\"{key}\") => {{ \"{escaped}\" }};\n"));
    }
    code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    code.push('}');
    code
}
