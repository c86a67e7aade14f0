//! Pull a compilable test class out of a free-form model answer.

use regex::Regex;
use std::sync::OnceLock;

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)```").unwrap())
}

fn class_decl() -> &'static Regex {
    static DECL: OnceLock<Regex> = OnceLock::new();
    DECL.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:(?:public|final|abstract)\s+)*class\s+([A-Za-z_$][\w$]*)").unwrap()
    })
}

fn package_decl() -> &'static Regex {
    static DECL: OnceLock<Regex> = OnceLock::new();
    DECL.get_or_init(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap())
}

/// The first fenced code block tagged `java`, else the first untagged one.
pub fn java_block(text: &str) -> Option<&str> {
    let mut untagged = None;
    for caps in fence().captures_iter(text) {
        let lang = caps.get(1).map_or("", |m| m.as_str());
        let body = caps.get(2)?.as_str();
        if lang.eq_ignore_ascii_case("java") {
            return Some(body.trim());
        }
        if lang.is_empty() && untagged.is_none() {
            untagged = Some(body.trim());
        }
    }
    untagged.filter(|b| !b.is_empty())
}

/// Name of the first top-level class declared in `code`.
pub fn class_name(code: &str) -> Option<&str> {
    class_decl()
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Package declared in `code`, if any.
pub fn declared_package(code: &str) -> Option<&str> {
    package_decl()
        .captures(code)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `package com.acme;` → `com.acme`.
pub fn package_name(line: &str) -> &str {
    line.trim()
        .trim_start_matches("package")
        .trim_end_matches(';')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_java_tagged_block() {
        let text = "Plan:\n```\nnotes\n```\nHere:\n```java\nclass A {}\n```\n";
        assert_eq!(java_block(text), Some("class A {}"));
    }

    #[test]
    fn test_falls_back_to_untagged_block() {
        let text = "```\nclass B {}\n```";
        assert_eq!(java_block(text), Some("class B {}"));
        assert_eq!(java_block("```xml\n<a/>\n```"), None);
        assert_eq!(java_block("no code here"), None);
    }

    #[test]
    fn test_class_and_package() {
        let code = "package com.acme;\n\nimport org.junit.jupiter.api.Test;\n\n@Tag(\"x\")\npublic final class Cart_add_0_Test {\n}\n";
        assert_eq!(class_name(code), Some("Cart_add_0_Test"));
        assert_eq!(declared_package(code), Some("com.acme"));
        assert_eq!(package_name("package com.acme;"), "com.acme");
        assert_eq!(package_name(""), "");
    }

    #[test]
    fn test_class_word_in_comment_is_not_a_declaration() {
        let code = "// this class tests carts\nclass CartTest {}";
        assert_eq!(class_name(code), Some("CartTest"));
    }
}
