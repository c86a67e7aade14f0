//! Prompt text for generation and repair requests.

use crate::extract::package_name;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use unitsmith_core::context::{GeneratedTest, PromptContext};

pub const SYSTEM: &str = include_str!("prompts/system.md");
const GENERATE: &str = include_str!("prompts/generate.md");
const REPAIR: &str = include_str!("prompts/repair.md");

/// Longest diagnostic excerpt sent back to the model.
const MAX_DIAGNOSTIC_CHARS: usize = 6000;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").unwrap())
}

/// Substitute `{name}` placeholders in one pass; unknown names stay as written.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures<'_>| {
            vars.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

fn dependency_section(title: &str, deps: &BTreeMap<String, String>, out: &mut String) {
    if deps.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {title}\n"));
    for (class, source) in deps {
        out.push_str(&format!("\n### `{class}`\n\n```java\n{}\n```\n", source.trim()));
    }
}

/// Every dependency map of the context as markdown sections.
pub fn dependencies(ctx: &PromptContext) -> String {
    let mut out = String::new();
    dependency_section("Constructor dependencies", &ctx.constructor_deps, &mut out);
    dependency_section(
        "Constructor dependencies (from compiled libraries)",
        &ctx.external_constructor_deps,
        &mut out,
    );
    dependency_section("Called classes", &ctx.method_deps, &mut out);
    dependency_section(
        "Called classes (from compiled libraries)",
        &ctx.external_method_deps,
        &mut out,
    );
    out
}

/// Keep the head and tail of overlong diagnostics.
fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let half = max / 2;
    let head: String = text.chars().take(half).collect();
    let tail: String = {
        let mut tail: Vec<char> = text.chars().rev().take(half).collect();
        tail.reverse();
        tail.into_iter().collect()
    };
    format!("{head}\n... [truncated] ...\n{tail}")
}

pub fn generation(ctx: &PromptContext) -> String {
    let test_class_name = ctx.test_class_name();
    let context = ctx.full_context();
    let deps = dependencies(ctx);
    render(
        GENERATE,
        &[
            ("method_signature", ctx.method_signature.as_str()),
            ("class_name", ctx.class_name.as_str()),
            ("test_class_name", test_class_name.as_str()),
            ("package", package_name(&ctx.package)),
            ("context", context.as_str()),
            ("other_method_brief", ctx.other_method_brief.trim()),
            ("dependencies", deps.as_str()),
        ],
    )
}

pub fn repair(ctx: &PromptContext, test: &GeneratedTest, diagnostics: &str) -> String {
    let test_class_name = ctx.test_class_name();
    let context = ctx.full_context();
    let deps = dependencies(ctx);
    let round = ctx.round.to_string();
    let diagnostics = clip(diagnostics.trim(), MAX_DIAGNOSTIC_CHARS);
    render(
        REPAIR,
        &[
            ("method_signature", ctx.method_signature.as_str()),
            ("class_name", ctx.class_name.as_str()),
            ("round", round.as_str()),
            ("test_source", test.source.trim()),
            ("diagnostics", diagnostics.as_str()),
            ("test_class_name", test_class_name.as_str()),
            ("package", package_name(&ctx.package)),
            ("context", context.as_str()),
            ("dependencies", deps.as_str()),
        ],
    )
}
