//! Recover class names implicated in compiler "cannot find symbol" errors.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn location_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"location: (?:class|interface) ([\w.$]+)",
            r"location: variable \w+ of type ([\w.$]+)",
            r"location: method \w+\([^)]*\) of class ([\w.$]+)",
            r"location: constructor ([\w.$]+)\([^)]*\)",
            r"location: type parameter \w+ of class ([\w.$]+)",
            r"location: annotation element \w+ of annotation type ([\w.$]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Fully-qualified class names named by `location:` lines of javac output.
///
/// `location: package ...` lines name no class and are ignored.
pub fn extract_class_names(diagnostics: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for pattern in location_patterns() {
        for caps in pattern.captures_iter(diagnostics) {
            names.insert(caps[1].trim_end_matches('.').to_string());
        }
    }
    names
}
