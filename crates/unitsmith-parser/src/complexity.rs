//! Decision-point counting for the complexity gate.

use crate::treesitter::{ParseError, parse_strict};
use tree_sitter::Node;

/// Per-kind counts of the branching in one method body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionProfile {
    /// `if` statements.
    pub conditionals: usize,
    /// Switch arms, `default` included.
    pub switch_arms: usize,
    /// `for`, `while` and `do` loops.
    pub loops: usize,
    /// Enhanced `for` loops.
    pub foreach_loops: usize,
    /// Occurrences of `&&` and `||`.
    pub short_circuits: usize,
    /// `?:` expressions.
    pub ternaries: usize,
}

impl DecisionProfile {
    /// Statement-level branching: conditionals, switch arms and classic loops.
    pub fn branch_constructs(&self) -> usize {
        self.conditionals + self.switch_arms + self.loops
    }

    /// Every decision point.
    pub fn decision_points(&self) -> usize {
        self.branch_constructs() + self.foreach_loops + self.short_circuits + self.ternaries
    }
}

const WRAPPER_OPEN: &str = "class __Wrapper__ {\n";
const WRAPPER_CLOSE: &str = "\n}\n";

/// Count the decision points of a single method or constructor declaration.
///
/// Bodies of lambdas, anonymous classes and local classes are not counted.
pub fn analyze_method(method_source: &str) -> Result<DecisionProfile, ParseError> {
    let wrapped = format!("{WRAPPER_OPEN}{method_source}{WRAPPER_CLOSE}");
    let tree = parse_strict(&wrapped)?;

    let mut profile = DecisionProfile::default();
    let Some(body) = first_member_body(&tree.root_node()) else {
        return Ok(profile);
    };
    count(&body, &mut profile);
    Ok(profile)
}

fn first_member_body<'t>(root: &Node<'t>) -> Option<Node<'t>> {
    let class = root.named_child(0)?;
    let members = class.child_by_field_name("body")?;
    let mut cursor = members.walk();
    let found = members
        .named_children(&mut cursor)
        .filter(|m| matches!(m.kind(), "method_declaration" | "constructor_declaration"))
        .find_map(|m| m.child_by_field_name("body"));
    found
}

fn count(node: &Node<'_>, profile: &mut DecisionProfile) {
    match node.kind() {
        "lambda_expression" | "class_body" | "class_declaration" | "method_declaration"
        | "record_declaration" | "enum_declaration" | "interface_declaration" => return,
        "if_statement" => profile.conditionals += 1,
        "switch_block_statement_group" | "switch_rule" => profile.switch_arms += 1,
        "for_statement" | "while_statement" | "do_statement" => profile.loops += 1,
        "enhanced_for_statement" => profile.foreach_loops += 1,
        "ternary_expression" => profile.ternaries += 1,
        "binary_expression" => {
            if let Some(op) = node.child_by_field_name("operator")
                && matches!(op.kind(), "&&" | "||")
            {
                profile.short_circuits += 1;
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        count(&child, profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_each_kind() {
        let src = r#"
public int classify(int[] xs, boolean strict) {
    int n = 0;
    for (int i = 0; i < xs.length; i++) {
        if (xs[i] > 0 && strict || xs[i] == 0) {
            n++;
        }
    }
    for (int x : xs) {
        n += x > 10 ? 1 : 0;
    }
    while (n > 100) { n /= 2; }
    do { n--; } while (n > 50);
    switch (n) {
        case 1: return 1;
        case 2: return 2;
        default: return n;
    }
}
"#;
        let profile = analyze_method(src).unwrap();
        assert_eq!(profile.conditionals, 1);
        assert_eq!(profile.loops, 3);
        assert_eq!(profile.foreach_loops, 1);
        assert_eq!(profile.short_circuits, 2);
        assert_eq!(profile.ternaries, 1);
        assert_eq!(profile.switch_arms, 3);
        assert_eq!(profile.branch_constructs(), 7);
        assert_eq!(profile.decision_points(), 11);
    }

    #[test]
    fn test_lambda_and_anonymous_bodies_excluded() {
        let src = r"
void run(List<Integer> xs) {
    xs.forEach(x -> { if (x > 0) { System.out.println(x); } });
    Runnable r = new Runnable() {
        public void run() { if (true) { return; } }
    };
    class Local { void f() { while (true) {} } }
    if (xs.isEmpty()) { return; }
}
";
        let profile = analyze_method(src).unwrap();
        assert_eq!(profile.conditionals, 1);
        assert_eq!(profile.loops, 0);
        assert_eq!(profile.decision_points(), 1);
    }

    #[test]
    fn test_switch_rules_counted() {
        let src = r#"
String name(int d) {
    return switch (d) {
        case 1 -> "one";
        case 2 -> "two";
        default -> "many";
    };
}
"#;
        assert_eq!(analyze_method(src).unwrap().switch_arms, 3);
    }

    #[test]
    fn test_straight_line_method_has_no_decisions() {
        let profile = analyze_method("int id(int x) { return x; }").unwrap();
        assert_eq!(profile, DecisionProfile::default());
    }

    #[test]
    fn test_constructor_counted() {
        let profile = analyze_method("Cart(int n) { if (n < 0) { n = 0; } }").unwrap();
        assert_eq!(profile.conditionals, 1);
    }

    #[test]
    fn test_unparseable_method_is_error() {
        assert!(analyze_method("int broken( { return; }").is_err());
    }
}
