use std::path::PathBuf;

use unitsmith_core::model::ProjectModel;
use unitsmith_parser::index::{index_source, index_sources};

const CART: &str = r#"package com.acme.shop;

import java.util.List;
import org.lib.Money;
import org.lib.Pricing;

public class Cart {
    private final Pricing pricing;
    private int count;

    public Cart(Pricing pricing) {
        this.pricing = pricing;
        pricing.register(this);
    }

    public int getCount() {
        return count;
    }

    public void setCount(int count) {
        this.count = count;
    }

    public Money total(List<String> skus, boolean member) {
        Money sum = Money.zero();
        for (String sku : skus) {
            sum = sum.plus(pricing.price(sku, 1));
        }
        if (member) {
            sum = discount(sum);
        }
        return sum;
    }

    private Money discount(Money m) {
        return m.times(0.9);
    }
}
"#;

#[test]
fn java_index_class_shape() {
    let classes = index_source(CART).unwrap();
    assert_eq!(classes.len(), 1);
    let cart = &classes[0];

    assert_eq!(cart.full_name, "com.acme.shop.Cart");
    assert_eq!(cart.name, "Cart");
    assert_eq!(cart.package, "package com.acme.shop;");
    assert_eq!(cart.signature, "public class Cart");
    assert_eq!(cart.imports.len(), 3);
    assert_eq!(cart.fields.len(), 2);
    assert!(cart.has_constructor());
    assert_eq!(cart.constructors[0].signature, "Cart(Pricing)");
    assert_eq!(cart.constructors[0].brief, "public Cart(Pricing pricing);");

    let accessors: Vec<_> = cart.accessors.iter().map(|a| a.signature.as_str()).collect();
    assert_eq!(accessors, vec!["getCount()", "setCount(int)"]);
}

#[test]
fn java_index_constructor_deps_exclude_self() {
    let classes = index_source(CART).unwrap();
    let cart = &classes[0];
    let deps = &cart.constructor_deps["org.lib.Pricing"];
    assert!(deps.contains("register(Cart)"));
    assert!(!cart.constructor_deps.contains_key("com.acme.shop.Cart"));
}

#[test]
fn java_index_method_call_edges() {
    let classes = index_source(CART).unwrap();
    let cart = &classes[0];
    let total = cart.method("total(List<String>,boolean)").unwrap();

    assert_eq!(total.brief, "public Money total(List<String> skus, boolean member);");
    assert_eq!(total.descriptor, "(Ljava/util/List;Z)Lorg/lib/Money;");

    let deps = &total.dependent_methods;
    assert!(deps["org.lib.Pricing"].contains("price(String,int)"));
    assert!(deps["org.lib.Money"].contains("zero()"));
    assert!(deps["org.lib.Money"].contains("plus(?)"));
    assert!(
        deps["com.acme.shop.Cart"].contains("discount(Money)"),
        "self calls keyed by the enclosing class"
    );
}

#[test]
fn java_index_nested_and_enum_members() {
    let src = r"package p;
public class Outer {
    public static class Inner {
        public int value() { return 1; }
    }
    enum Mode {
        A, B;
        int code() { return ordinal(); }
    }
}
";
    let classes = index_source(src).unwrap();
    let names: Vec<_> = classes.iter().map(|c| c.full_name.as_str()).collect();
    assert_eq!(names, vec!["p.Outer", "p.Outer.Inner", "p.Outer.Mode"]);
    let mode = classes.iter().find(|c| c.name == "Mode").unwrap();
    assert!(mode.method("code()").is_some());
}

#[test]
fn java_index_sources_reconciles_unknown_arguments() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(src.join("com/acme")).unwrap();
    std::fs::write(
        src.join("com/acme/Ledger.java"),
        r"package com.acme;
public class Ledger {
    public void post(Entry entry) { }
    public void post(Entry entry, boolean force) { }
}
",
    )
    .unwrap();
    std::fs::write(
        src.join("com/acme/Clerk.java"),
        r"package com.acme;
public class Clerk {
    private Ledger ledger;
    public void file() {
        ledger.post(Entry.of(1));
    }
}
",
    )
    .unwrap();

    let index = index_sources(&[src]).unwrap();
    assert_eq!(index.len(), 2);
    let clerk = index.class_unit("com.acme.Clerk").unwrap();
    let file = index.method_unit(clerk, "file()").unwrap();
    let posted = &file.dependent_methods["com.acme.Ledger"];
    assert!(posted.contains("post(Entry)"), "got {posted:?}");
    assert!(!posted.contains("post(?)"));
}

#[test]
fn java_index_sources_missing_root_is_error() {
    assert!(index_sources(&[PathBuf::from("/definitely/not/here")]).is_err());
}
