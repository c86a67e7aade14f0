use criterion::{Criterion, criterion_group, criterion_main};
use std::collections::BTreeSet;
use std::hint::black_box;
use unitsmith_parser::complexity::analyze_method;
use unitsmith_parser::index::index_source;
use unitsmith_parser::prune::prune;
use unitsmith_parser::sanitize::sanitize;

const SAMPLE_DECOMPILED: &str = r#"/*
 * Decompiled with CFR 0.152.
 */
package org.lib.orders;

import java.util.ArrayList;
import java.util.List;
import java.util.Map;

public class OrderBook {
    private final Map<String, List<Order>> bySymbol;
    private OrderBook$1 comparator;
    public static final int MAX_DEPTH = 64;

    public OrderBook(Map<String, List<Order>> bySymbol) {
        this.bySymbol = bySymbol;
    }

    public void add(Order order) {
        List<Order> book = this.bySymbol.get(order.symbol()); // existing side
        if (book == null) {
            book = new ArrayList<Order>();
            this.bySymbol.put(order.symbol(), book);
        }
        book.add(order);
    }

    public Order best(String symbol, boolean buy) {
        List<Order> book = this.bySymbol.get(symbol);
        if (book == null || book.isEmpty()) {
            return null;
        }
        Order best = null;
        for (Order o : book) {
            if (o.isBuy() != buy) continue;
            if (best == null || (buy ? o.price() > best.price() : o.price() < best.price())) {
                best = o;
            }
        }
        return best;
    }

    public int depth(String symbol) {
        List<Order> book = this.bySymbol.get(symbol);
        return book == null ? 0 : Math.min(book.size(), MAX_DEPTH);
    }

    private void compact() {
        for (List<Order> book : this.bySymbol.values()) {
            book.removeIf(o -> o.quantity() == 0);
        }
    }

    protected String dump() {
        return "OrderBook // " + this.bySymbol;
    }
}
"#;

const SAMPLE_METHOD: &str = r"public Order best(String symbol, boolean buy) {
    List<Order> book = this.bySymbol.get(symbol);
    if (book == null || book.isEmpty()) {
        return null;
    }
    Order best = null;
    for (Order o : book) {
        if (o.isBuy() != buy) continue;
        if (best == null || (buy ? o.price() > best.price() : o.price() < best.price())) {
            best = o;
        }
    }
    return best;
}";

fn bench_sanitize(c: &mut Criterion) {
    c.bench_function("sanitize_decompiled", |b| {
        b.iter(|| sanitize(black_box(SAMPLE_DECOMPILED)))
    });
}

fn bench_prune(c: &mut Criterion) {
    let clean = sanitize(SAMPLE_DECOMPILED);
    let wanted: BTreeSet<String> = ["best(String,boolean)".to_string()].into_iter().collect();
    c.bench_function("prune_decompiled", |b| {
        b.iter(|| prune(black_box(&clean), black_box(&wanted)))
    });
}

fn bench_complexity(c: &mut Criterion) {
    c.bench_function("analyze_method", |b| {
        b.iter(|| analyze_method(black_box(SAMPLE_METHOD)))
    });
}

fn bench_index(c: &mut Criterion) {
    let clean = sanitize(SAMPLE_DECOMPILED);
    c.bench_function("index_source", |b| {
        b.iter(|| index_source(black_box(&clean)))
    });
}

criterion_group!(
    benches,
    bench_sanitize,
    bench_prune,
    bench_complexity,
    bench_index
);
criterion_main!(benches);
