//! Matching benchmarks.
//!
//! Measures tag extraction, a single decision, and decisions over a
//! synthetic rule set large enough to exercise the tag index.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uf_core::blocker::decide;
use uf_core::tag::candidates;
use uf_core::{Category, ContentRequest, ContentType, FilterRecord, FilterType, RuleSet, ThirdParty};

const URLS: &[&str] = &[
    "https://www.example.com/index.html",
    "https://cdn.tracker42.net/pixel/counter.gif?id=991&utm_source=news",
    "https://static.news.com/assets/js/vendor.bundle.js",
    "https://ads-17.adserver.io/serve/banner/728x90.png",
    "https://api.shop.co.uk/v2/cart?session=abc123",
];

fn build_rules(count: usize) -> RuleSet {
    let mut rules = RuleSet::new();
    for i in 0..count {
        let (ty, pattern) = match i % 4 {
            0 => (FilterType::Pattern, format!("||ads-{}.adserver.io^", i)),
            1 => (FilterType::Contains, format!("/banner{}/", i)),
            2 => (FilterType::StartEnd, format!("tracker{}.net", i)),
            _ => (FilterType::Pattern, format!("/pixel{}/*.gif", i)),
        };
        if let Ok(filter) = FilterRecord::new(ty, &pattern, ContentType::ALL_NETWORK, true, ThirdParty::NoPreference) {
            rules.add(Category::Deny, filter);
        }
    }
    rules
}

fn bench_candidates(c: &mut Criterion) {
    c.bench_function("tag_candidates", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(candidates(black_box(url)));
            }
        })
    });
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");
    for count in [100usize, 10_000] {
        let rules = build_rules(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rules, |b, rules| {
            b.iter(|| {
                for url in URLS {
                    let request = ContentRequest::new(url, Some("www.example.com"), ContentType::IMAGE);
                    black_box(decide(rules, &request));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_candidates, bench_decide);
criterion_main!(benches);
