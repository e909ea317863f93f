//! Response parsing: pulls tagged fields out of free-form generated text.
//!
//! Every field is located by an opening/closing tag pair. Missing or unpaired
//! tags yield an empty field; parsing never fails.

use std::collections::BTreeMap;

/// Tag carrying the exploit function body
pub const EXPLOIT_CODE_TAG: &str = "executeExploitCode";

/// Tag carrying extra interface declarations
pub const EXTRA_INTERFACES_TAG: &str = "extraInterfaces";

/// Tag carrying extra helper contracts
pub const EXTRA_CONTRACTS_TAG: &str = "extraContracts";

/// All known field names
pub const FIELD_TAGS: [&str; 3] = [EXPLOIT_CODE_TAG, EXTRA_INTERFACES_TAG, EXTRA_CONTRACTS_TAG];

/// Fields extracted from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseFields {
    pub execute_exploit_code: String,
    pub extra_interfaces: String,
    pub extra_contracts: String,
}

impl ResponseFields {
    /// Field map keyed by tag name; always contains every known key
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (EXPLOIT_CODE_TAG, self.execute_exploit_code.clone()),
            (EXTRA_INTERFACES_TAG, self.extra_interfaces.clone()),
            (EXTRA_CONTRACTS_TAG, self.extra_contracts.clone()),
        ])
    }
}

/// Parse a generated response into its known fields.
pub fn parse(text: &str) -> ResponseFields {
    ResponseFields {
        execute_exploit_code: extract_field(text, EXPLOIT_CODE_TAG),
        extra_interfaces: extract_field(text, EXTRA_INTERFACES_TAG),
        extra_contracts: extract_field(text, EXTRA_CONTRACTS_TAG),
    }
}

/// Content of the first `<tag>...</tag>` pair, fence-stripped and trimmed.
pub fn extract_field(text: &str, tag: &str) -> String {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let Some(start) = text.find(&open) else {
        return String::new();
    };
    let body_start = start + open.len();

    let Some(len) = text[body_start..].find(&close) else {
        return String::new();
    };

    strip_code_fence(&text[body_start..body_start + len])
}

/// Remove a surrounding markdown code fence (with optional language tag).
pub fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();

    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the info string (e.g. `solidity`) up to the first newline
    let body = match after_open.find('\n') {
        Some(pos) => &after_open[pos + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}
