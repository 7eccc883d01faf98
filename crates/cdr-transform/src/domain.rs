//! Canonical domain names from raw extract labels.

use thiserror::Error;

/// A raw label that does not follow the `<prefix>_<domain>[digits]` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed domain label '{label}': {reason}")]
pub struct MalformedDomainLabel {
    pub label: String,
    pub reason: &'static str,
}

/// Derive the canonical domain name from a raw label.
///
/// The label is uppercased and cut at its first digit; the second
/// underscore-separated token is the domain.
///
/// ```
/// use cdr_transform::normalize_domain_label;
///
/// assert_eq!(normalize_domain_label("sm_ae201").unwrap(), "AE");
/// assert_eq!(normalize_domain_label("sm_ae").unwrap(), "AE");
/// assert!(normalize_domain_label("ae").is_err());
/// ```
pub fn normalize_domain_label(label: &str) -> Result<String, MalformedDomainLabel> {
    let malformed = |reason| MalformedDomainLabel {
        label: label.to_string(),
        reason,
    };

    let upper = label.trim().to_uppercase();
    let head = match upper.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => &upper[..idx],
        None => upper.as_str(),
    };

    let token = head
        .split('_')
        .nth(1)
        .ok_or_else(|| malformed("no '_' before the domain name"))?;
    let name: String = token.chars().filter(|c| !c.is_ascii_digit()).collect();
    if name.is_empty() {
        return Err(malformed("empty domain name"));
    }
    Ok(name)
}
