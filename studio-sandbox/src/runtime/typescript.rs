//! TypeScript to JavaScript by annotation stripping
//!
//! This is a textual transform, not a compiler: every `: <word>` is removed.
//! Generics, union types, multi-word annotations and object literals such as
//! `{ a: 1 }` are mangled. Programs outside the simple annotated subset may
//! fail to parse or behave differently once stripped.

use regex::Regex;
use std::sync::OnceLock;

fn annotation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":\s*\w+").expect("annotation pattern is valid"))
}

/// Remove `: <identifier>` occurrences from `source`.
pub fn strip_type_annotations(source: &str) -> String {
    annotation_pattern().replace_all(source, "").into_owned()
}
