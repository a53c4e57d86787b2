//! Equality-based Kubernetes label selectors.
//!
//! Nodes are selected on the server side, so the selector is mostly validated
//! here and forwarded as-is. [`LabelSelector::matches`] evaluates it locally for
//! sources that cannot filter by themselves.

use core::error::Error;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use error_stack::Report;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Errors produced while parsing a label selector.
#[derive(Debug, derive_more::Display)]
pub enum SelectorError {
    #[display("label selector is empty")]
    Empty,
    #[display("invalid requirement `{requirement}` in label selector")]
    InvalidRequirement { requirement: String },
    #[display("invalid label key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[display("invalid label value `{value}`: {reason}")]
    InvalidValue { value: String, reason: &'static str },
}

impl Error for SelectorError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Exists { key: String },
    DoesNotExist { key: String },
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals { key, value } => labels.get(key) == Some(value),
            Self::NotEquals { key, value } => labels.get(key) != Some(value),
            Self::Exists { key } => labels.contains_key(key),
            Self::DoesNotExist { key } => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { key, value } => write!(f, "{key}={value}"),
            Self::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Self::Exists { key } => write!(f, "{key}"),
            Self::DoesNotExist { key } => write!(f, "!{key}"),
        }
    }
}

/// A parsed label selector such as `job=training` or `gpu,zone!=us-east-1a`.
///
/// All requirements must hold for a label set to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a comma separated selector.
    ///
    /// # Errors
    ///
    /// - [`SelectorError::Empty`] if the selector has no requirement
    /// - [`SelectorError::InvalidRequirement`] for empty or malformed entries
    /// - [`SelectorError::InvalidKey`] / [`SelectorError::InvalidValue`] if a
    ///   key or value breaks Kubernetes label syntax
    pub fn parse(selector: &str) -> Result<Self, Report<SelectorError>> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Report::new(SelectorError::Empty));
        }

        let requirements = selector
            .split(',')
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Evaluate the selector against a label map.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = Report<SelectorError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{requirement}")?;
        }
        Ok(())
    }
}

fn parse_requirement(raw: &str) -> Result<Requirement, Report<SelectorError>> {
    let requirement = raw.trim();
    if requirement.is_empty() {
        return Err(Report::new(SelectorError::InvalidRequirement {
            requirement: raw.to_string(),
        }));
    }

    let parsed = if let Some((key, value)) = requirement.split_once("!=") {
        Requirement::NotEquals {
            key: validate_key(key.trim())?,
            value: validate_value(value.trim())?,
        }
    } else if let Some((key, value)) = requirement.split_once("==") {
        Requirement::Equals {
            key: validate_key(key.trim())?,
            value: validate_value(value.trim())?,
        }
    } else if let Some((key, value)) = requirement.split_once('=') {
        Requirement::Equals {
            key: validate_key(key.trim())?,
            value: validate_value(value.trim())?,
        }
    } else if let Some(key) = requirement.strip_prefix('!') {
        Requirement::DoesNotExist {
            key: validate_key(key.trim())?,
        }
    } else {
        Requirement::Exists {
            key: validate_key(requirement)?,
        }
    };

    Ok(parsed)
}

fn validate_key(key: &str) -> Result<String, Report<SelectorError>> {
    let invalid = |reason| {
        Report::new(SelectorError::InvalidKey {
            key: key.to_string(),
            reason,
        })
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid("prefix must be 1 to 253 characters"));
            }
            if !is_dns_subdomain(prefix) {
                return Err(invalid("prefix must be a lowercase DNS subdomain"));
            }
            name
        }
        None => key,
    };

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid("name must be 1 to 63 characters"));
    }
    if !is_label_name(name) {
        return Err(invalid(
            "name must be alphanumeric, '-', '_' or '.', starting and ending with an alphanumeric",
        ));
    }

    Ok(key.to_string())
}

fn validate_value(value: &str) -> Result<String, Report<SelectorError>> {
    if value.len() > MAX_NAME_LEN {
        return Err(Report::new(SelectorError::InvalidValue {
            value: value.to_string(),
            reason: "must be at most 63 characters",
        }));
    }
    if !value.is_empty() && !is_label_name(value) {
        return Err(Report::new(SelectorError::InvalidValue {
            value: value.to_string(),
            reason:
                "must be alphanumeric, '-', '_' or '.', starting and ending with an alphanumeric",
        }));
    }
    Ok(value.to_string())
}

fn is_label_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        }
        _ => false,
    }
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|part| {
        let bytes = part.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_single_equality() {
        let selector = LabelSelector::parse("job=training").unwrap();
        assert_eq!(
            selector.requirements(),
            &[Requirement::Equals {
                key: "job".to_string(),
                value: "training".to_string()
            }]
        );
        assert_eq!(selector.to_string(), "job=training");
    }

    #[test]
    fn parse_mixed_requirements() {
        let selector =
            LabelSelector::parse("job==ib, nvidia.com/gpu.present ,zone!=a,!cordoned").unwrap();
        assert_eq!(
            selector.to_string(),
            "job=ib,nvidia.com/gpu.present,zone!=a,!cordoned"
        );
    }

    #[test]
    fn parse_allows_empty_value() {
        let selector = LabelSelector::parse("role=").unwrap();
        assert!(selector.matches(&labels(&[("role", "")])));
        assert!(!selector.matches(&labels(&[("role", "worker")])));
    }

    #[test]
    fn parse_rejects_empty_selector() {
        let err = LabelSelector::parse("  ").unwrap_err();
        assert!(matches!(err.current_context(), SelectorError::Empty));
    }

    #[test]
    fn parse_rejects_empty_requirement() {
        let err = LabelSelector::parse("job=training,").unwrap_err();
        assert!(matches!(
            err.current_context(),
            SelectorError::InvalidRequirement { .. }
        ));
    }

    #[test]
    fn parse_rejects_bad_key() {
        for selector in ["=value", "-job=x", "Bad_Prefix/job=x", "a b=c", "/job=x"] {
            let err = LabelSelector::parse(selector).unwrap_err();
            assert!(
                matches!(err.current_context(), SelectorError::InvalidKey { .. }),
                "{selector} should have an invalid key"
            );
        }
    }

    #[test]
    fn parse_rejects_bad_value() {
        let err = LabelSelector::parse("job=tr aining").unwrap_err();
        assert!(matches!(
            err.current_context(),
            SelectorError::InvalidValue { .. }
        ));

        let long = format!("job={}", "a".repeat(64));
        let err = LabelSelector::parse(&long).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SelectorError::InvalidValue { .. }
        ));
    }

    #[test]
    fn matches_requires_every_requirement() {
        let selector = LabelSelector::parse("job=training,gpu").unwrap();
        assert!(selector.matches(&labels(&[("job", "training"), ("gpu", "a100")])));
        assert!(!selector.matches(&labels(&[("job", "training")])));
        assert!(!selector.matches(&labels(&[("job", "ib"), ("gpu", "a100")])));
    }

    #[test]
    fn not_equals_matches_missing_key() {
        let selector = LabelSelector::parse("job!=ib").unwrap();
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("job", "training")])));
        assert!(!selector.matches(&labels(&[("job", "ib")])));
    }

    #[test]
    fn does_not_exist_matches() {
        let selector = LabelSelector::parse("!cordoned").unwrap();
        assert!(selector.matches(&labels(&[("job", "ib")])));
        assert!(!selector.matches(&labels(&[("cordoned", "true")])));
    }
}
