use std::fmt;

use regex::Regex;
use regex::RegexBuilder;

use crate::selector::LabelSelector;

/// Keyword matched against allocatable resource names.
///
/// The keyword is a case-insensitive, unanchored regular expression, so `gpu`
/// matches `nvidia.com/gpu` and `sriov` matches every SR-IOV device pool.
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    keyword: String,
    regex: Regex,
}

impl ResourcePattern {
    pub fn new(keyword: &str) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(keyword).case_insensitive(true).build()?;
        Ok(Self {
            keyword: keyword.to_string(),
            regex,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn is_match(&self, resource_name: &str) -> bool {
        self.regex.is_match(resource_name)
    }
}

impl PartialEq for ResourcePattern {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword
    }
}

impl Eq for ResourcePattern {}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.keyword)
    }
}

/// What to count: resources matching `resource` on nodes matching `selector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub resource: ResourcePattern,
    pub selector: LabelSelector,
}
