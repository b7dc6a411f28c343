// src/core/dotenv.rs

//! Reading `.env` files (optionally annotated with variable definitions) and
//! rendering value sets for export.
//!
//! An annotated file describes each variable in the comments right above it:
//!
//! ```text
//! # schema: api
//!
//! # title: Database connection
//! # type: url
//! # required: true
//! DATABASE_URL=postgres://localhost/app
//! ```

use crate::models::{Variable, VariableType};

use lazy_static::lazy_static;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

lazy_static! {
    // `# key: value` annotation comments.
    static ref ANNOTATION_RE: Regex = Regex::new(r"^#\s*([A-Za-z_]+)\s*:\s*(.*)$").unwrap();
}

/// Substrings that mark a key as holding a secret.
const SENSITIVE_MARKERS: &[&str] = &[
    "PASSWORD",
    "SECRET",
    "KEY",
    "TOKEN",
    "AUTH",
    "CREDENTIAL",
    "CERT",
    "SSL",
    "TLS",
    "OAUTH",
    "JWT",
    "BEARER",
    "PASSPHRASE",
    "PIN",
    "SEED",
    "HASH",
    "SIGNATURE",
    "WEBHOOK",
    "DATABASE_URL",
];

/// A malformed `.env` line. Line numbers start at 1.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DotenvError {
    #[error("line {line}: expected KEY=VALUE")]
    MissingSeparator { line: usize },

    #[error("line {line}: empty variable name")]
    EmptyKey { line: usize },
}

/// The result of parsing an annotated `.env` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatedDotenv {
    pub values: BTreeMap<String, String>,
    /// One definition per key, in file order. Keys without annotations are
    /// optional strings.
    pub variables: Vec<Variable>,
    /// The value of a `# schema:` header, if present.
    pub schema_ref: Option<String>,
}

/// Parses plain `KEY=VALUE` content. Comments are ignored.
pub fn parse_dotenv(text: &str) -> Result<BTreeMap<String, String>, DotenvError> {
    Ok(parse_annotated(text)?.values)
}

/// Parses `.env` content, collecting `# key: value` annotations into variable
/// definitions for the assignment that follows them.
pub fn parse_annotated(text: &str) -> Result<AnnotatedDotenv, DotenvError> {
    let mut parsed = AnnotatedDotenv::default();
    let mut pending: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();

    for (number, raw) in text.lines().enumerate() {
        let line_no = number + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = ANNOTATION_RE.captures(line) {
            let key = caps.get(1).map_or("", |m| m.as_str()).to_lowercase();
            let value = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            if key == "schema" {
                parsed.schema_ref = Some(value);
            } else {
                pending.insert(key, value);
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map_or(line, str::trim_start);
        let (key, value) = line
            .split_once('=')
            .ok_or(DotenvError::MissingSeparator { line: line_no })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(DotenvError::EmptyKey { line: line_no });
        }

        let annotations = std::mem::take(&mut pending);
        let variable = variable_from_annotations(key, &annotations);
        if seen.insert(key.to_string()) {
            parsed.variables.push(variable);
        } else if let Some(slot) = parsed.variables.iter_mut().find(|v| v.name == key) {
            *slot = variable;
        }
        parsed.values.insert(key.to_string(), unquote(value.trim()));
    }

    Ok(parsed)
}

fn variable_from_annotations(name: &str, annotations: &HashMap<String, String>) -> Variable {
    let var_type = annotations
        .get("type")
        .map_or(VariableType::String, |t| VariableType::from(t.as_str()));
    let mut variable = Variable::new(name, var_type);
    if let Some(title) = annotations.get("title") {
        variable.title = title.clone();
    }
    if let Some(default) = annotations.get("default") {
        variable.default = Some(default.clone());
    }
    if let Some(regex) = annotations.get("regex") {
        variable.regex = Some(regex.clone());
    }
    variable.required = annotations
        .get("required")
        .is_some_and(|r| r.eq_ignore_ascii_case("true"));
    variable
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return unescape_double_quoted(inner);
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.to_string();
        }
    }
    value.to_string()
}

fn unescape_double_quoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// --- Rendering ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    DotEnv,
    Bash,
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dotenv" | "env" => Ok(Self::DotEnv),
            "bash" | "sh" => Ok(Self::Bash),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}' (expected dotenv, bash or json)")),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DotEnv => "dotenv",
            Self::Bash => "bash",
            Self::Json => "json",
        })
    }
}

/// Orders values by the schema's variable order, then any extra keys by name.
pub fn ordered_pairs(
    variables: &[Variable],
    values: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = variables
        .iter()
        .filter_map(|v| values.get(&v.name).map(|value| (v.name.clone(), value.clone())))
        .collect();
    let known: HashSet<&str> = variables.iter().map(|v| v.name.as_str()).collect();
    pairs.extend(
        values
            .iter()
            .filter(|(k, _)| !known.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    pairs
}

/// Renders key/value pairs in the given format, keeping their order.
pub fn render(pairs: &[(String, String)], format: ExportFormat) -> String {
    match format {
        ExportFormat::DotEnv => pairs
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, dotenv_quote(v)))
            .collect(),
        ExportFormat::Bash => pairs
            .iter()
            .map(|(k, v)| format!("export {}={}\n", k, bash_quote(v)))
            .collect(),
        ExportFormat::Json => render_json(pairs),
    }
}

/// Renders an annotated `.env` file that [`parse_annotated`] reads back.
pub fn render_annotated(
    schema_ref: Option<&str>,
    variables: &[Variable],
    values: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    if let Some(schema) = schema_ref {
        out.push_str(&format!("# schema: {schema}\n\n"));
    }
    for (key, value) in ordered_pairs(variables, values) {
        if let Some(variable) = variables.iter().find(|v| v.name == key) {
            if !variable.title.is_empty() {
                out.push_str(&format!("# title: {}\n", variable.title));
            }
            if variable.var_type != VariableType::String {
                out.push_str(&format!("# type: {}\n", variable.var_type));
            }
            if let Some(default) = variable.default_value() {
                out.push_str(&format!("# default: {default}\n"));
            }
            if let Some(pattern) = variable.pattern() {
                out.push_str(&format!("# regex: {pattern}\n"));
            }
            if variable.required {
                out.push_str("# required: true\n");
            }
        }
        out.push_str(&format!("{}={}\n\n", key, dotenv_quote(&value)));
    }
    out
}

fn dotenv_quote(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '#'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t");
    format!("\"{escaped}\"")
}

fn bash_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Serializes pairs as a JSON object without reordering them.
struct OrderedPairs<'a>(&'a [(String, String)]);

impl Serialize for OrderedPairs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn render_json(pairs: &[(String, String)]) -> String {
    match serde_json::to_string_pretty(&OrderedPairs(pairs)) {
        Ok(json) => json + "\n",
        // String keys and values into an in-memory buffer cannot fail.
        Err(e) => {
            log::error!("Could not render values as JSON: {}", e);
            "{}\n".to_string()
        }
    }
}

// --- Masking ---

/// Whether a key looks like it holds a secret.
pub fn is_sensitive(key: &str) -> bool {
    let upper = key.to_uppercase();
    SENSITIVE_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Masks a value for display. Values of up to eight characters are fully
/// starred; longer ones keep two characters at each end.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len <= 8 {
        return "*".repeat(len);
    }
    let head: String = chars.iter().take(2).collect();
    let tail: String = chars.iter().skip(len - 2).collect();
    format!("{}{}{}", head, "*".repeat(len - 4), tail)
}

pub fn mask_if_sensitive(key: &str, value: &str) -> String {
    if is_sensitive(key) {
        mask(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_plain_dotenv() {
        let text = "\
# a comment
DATABASE_URL=postgres://localhost/app
export DEBUG=true
NAME=\"hello world\"
SINGLE='it''s raw'
EMPTY=
WITH_EQ=a=b
";
        let values = parse_dotenv(text).unwrap();
        assert_eq!(values["DATABASE_URL"], "postgres://localhost/app");
        assert_eq!(values["DEBUG"], "true");
        assert_eq!(values["NAME"], "hello world");
        assert_eq!(values["SINGLE"], "it''s raw");
        assert_eq!(values["EMPTY"], "");
        assert_eq!(values["WITH_EQ"], "a=b");
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        assert_eq!(
            parse_dotenv("A=1\n\nnot an assignment\n"),
            Err(DotenvError::MissingSeparator { line: 3 })
        );
        assert_eq!(parse_dotenv("=value"), Err(DotenvError::EmptyKey { line: 1 }));
    }

    #[test]
    fn test_parse_annotations() {
        let text = "\
# schema: api

# title: Port
# type: number
# default: 8080
# required: TRUE
PORT=9090

PLAIN=x
";
        let parsed = parse_annotated(text).unwrap();
        assert_eq!(parsed.schema_ref.as_deref(), Some("api"));
        assert_eq!(parsed.variables.len(), 2);

        let port = &parsed.variables[0];
        assert_eq!(port.name, "PORT");
        assert_eq!(port.title, "Port");
        assert_eq!(port.var_type, VariableType::Number);
        assert_eq!(port.default_value(), Some("8080"));
        assert!(port.required);

        // Annotations do not leak to the next assignment.
        let plain = &parsed.variables[1];
        assert_eq!(plain.var_type, VariableType::String);
        assert!(!plain.required);
    }

    #[test]
    fn test_annotated_output_reads_back() {
        let variables = vec![
            Variable::new("PORT", "number").with_default("80").required(),
            Variable::new("GREETING", "string").with_title("Greeting"),
        ];
        let mut values = BTreeMap::new();
        values.insert("PORT".to_string(), "8080".to_string());
        values.insert("GREETING".to_string(), "hi \"there\"".to_string());

        let text = render_annotated(Some("api"), &variables, &values);
        let parsed = parse_annotated(&text).unwrap();
        assert_eq!(parsed.values, values);
        assert_eq!(parsed.variables, variables);
        assert_eq!(parsed.schema_ref.as_deref(), Some("api"));
    }

    #[test]
    fn test_ordered_pairs_follow_schema_then_name() {
        let variables = vec![Variable::new("Z", "string"), Variable::new("A", "string")];
        let mut values = BTreeMap::new();
        for key in ["A", "Z", "EXTRA2", "EXTRA1"] {
            values.insert(key.to_string(), "v".to_string());
        }
        let keys: Vec<String> = ordered_pairs(&variables, &values)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["Z", "A", "EXTRA1", "EXTRA2"]);
    }

    #[test]
    fn test_render_formats() {
        let items = pairs(&[("A", "plain"), ("B", "two words"), ("C", "it's")]);
        assert_eq!(
            render(&items, ExportFormat::DotEnv),
            "A=plain\nB=\"two words\"\nC=\"it's\"\n"
        );
        assert_eq!(
            render(&items, ExportFormat::Bash),
            "export A='plain'\nexport B='two words'\nexport C='it'\\''s'\n"
        );
        assert_eq!(
            render(&items, ExportFormat::Json),
            "{\n  \"A\": \"plain\",\n  \"B\": \"two words\",\n  \"C\": \"it's\"\n}\n"
        );
        assert_eq!(render(&[], ExportFormat::Json), "{}\n");

        // Schema order survives and strings are escaped.
        let escaped = pairs(&[("Z", "say \"hi\"\n"), ("A", "")]);
        assert_eq!(
            render(&escaped, ExportFormat::Json),
            "{\n  \"Z\": \"say \\\"hi\\\"\\n\",\n  \"A\": \"\"\n}\n"
        );
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("env".parse::<ExportFormat>(), Ok(ExportFormat::DotEnv));
        assert!("yaml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_masking() {
        assert!(is_sensitive("db_password"));
        assert!(is_sensitive("STRIPE_API_KEY"));
        assert!(!is_sensitive("PORT"));
        assert_eq!(mask(""), "");
        assert_eq!(mask("short"), "*****");
        assert_eq!(mask("supersecret"), "su*******et");
        assert_eq!(mask_if_sensitive("PORT", "8080"), "8080");
    }
}
