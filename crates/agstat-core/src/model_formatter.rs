//! Short display names for model identifiers
//!
//! Claude ids carry a release date and an inverted version layout
//! (`claude-opus-4-1-20250805`); OpenAI ids are mostly readable already.

/// Format a model id for table display
///
/// - `claude-opus-4-1-20250805` → `Opus 4.1`
/// - `claude-3-5-sonnet-20241022` → `Sonnet 3.5`
/// - `gpt-5-codex` → `GPT-5 Codex`
/// - anything unrecognized is returned unchanged
///
/// # Examples
///
/// ```
/// use agstat_core::model_formatter::format_model_name;
///
/// assert_eq!(format_model_name("claude-sonnet-4-20250514", false), "Sonnet 4");
/// assert_eq!(format_model_name("gpt-5-codex", false), "GPT-5 Codex");
/// assert_eq!(format_model_name("gpt-5-codex", true), "gpt-5-codex");
/// ```
pub fn format_model_name(model: &str, full: bool) -> String {
    if full {
        return model.to_string();
    }
    let lower = model.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("gpt-") {
        return format_gpt(rest);
    }

    let family = ["opus", "sonnet", "haiku"]
        .into_iter()
        .find(|f| lower.split('-').any(|part| part == *f));
    let Some(family) = family else {
        return model.to_string();
    };

    let mut label = String::with_capacity(12);
    label.push_str(&family[..1].to_ascii_uppercase());
    label.push_str(&family[1..]);
    if let Some(version) = claude_version(&lower) {
        label.push(' ');
        label.push_str(&version);
    }
    label
}

/// Format and join a list of model ids
pub fn format_model_list<S: AsRef<str>>(models: &[S], full: bool, separator: &str) -> String {
    models
        .iter()
        .map(|m| format_model_name(m.as_ref(), full))
        .collect::<Vec<_>>()
        .join(separator)
}

fn format_gpt(rest: &str) -> String {
    let mut parts = rest.split('-');
    let mut label = format!("GPT-{}", parts.next().unwrap_or_default());
    for part in parts {
        label.push(' ');
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            label.extend(first.to_uppercase());
            label.push_str(chars.as_str());
        }
    }
    label
}

/// Major and optional minor version, skipping 8-digit release dates
fn claude_version(lower: &str) -> Option<String> {
    let numeric: Vec<&str> = lower
        .split('-')
        .filter(|p| p.len() < 8 && !p.is_empty())
        .filter(|p| p.split('.').all(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit())))
        .collect();

    match numeric.as_slice() {
        [] => None,
        [single] => Some((*single).to_string()),
        [major, minor, ..] if !major.contains('.') => Some(format!("{major}.{minor}")),
        [first, ..] => Some((*first).to_string()),
    }
}
