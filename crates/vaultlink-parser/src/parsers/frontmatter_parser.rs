//! Frontmatter extraction: `---\nYAML\n---`, and declared aliases.

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

/// Matches YAML frontmatter at the very start of a document
static FRONTMATTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---[ \t]*\r?\n([\s\S]*?)\r?\n---[ \t]*(?:\r?\n|$)").unwrap());

/// Extract the raw YAML frontmatter block, if any.
pub fn extract_frontmatter(content: &str) -> Option<&str> {
    FRONTMATTER_PATTERN
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Aliases declared in frontmatter under `aliases:` or `alias:`, either as a
/// list or a single string.
///
/// Invalid frontmatter yields no aliases rather than an error.
///
/// ```
/// use vaultlink_parser::extract_aliases;
///
/// let doc = "---\naliases: [Roadmap, \"Q3 Plan\"]\n---\n# Plan";
/// assert_eq!(extract_aliases(doc), vec!["Roadmap", "Q3 Plan"]);
/// ```
pub fn extract_aliases(content: &str) -> Vec<String> {
    let Some(yaml) = extract_frontmatter(content) else {
        return Vec::new();
    };

    let value: Value = match serde_yaml::from_str(yaml) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Ignoring invalid frontmatter: {}", e);
            return Vec::new();
        }
    };

    let mut aliases = Vec::new();
    for key in ["aliases", "alias"] {
        match value.get(key) {
            Some(Value::Sequence(items)) => {
                aliases.extend(items.iter().filter_map(scalar_to_string));
            }
            Some(other) => aliases.extend(scalar_to_string(other)),
            None => {}
        }
    }

    aliases.retain(|a| !a.is_empty());
    aliases.dedup();
    aliases
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
