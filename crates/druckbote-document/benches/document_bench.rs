// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the druckbote-document crate.
// Covers test-page layout, which runs on every calibration request.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use druckbote_document::testpage::PAPER_PROFILES;
use druckbote_document::{layout_test_page, paper_profile};

/// Layout of the largest and the most heavily wrapped profile.
fn bench_layout(c: &mut Criterion) {
    let a4 = paper_profile("a4").expect("a4 profile");
    let small = paper_profile("label-57x32").expect("small label profile");

    c.bench_function("layout_test_page (a4)", |b| {
        b.iter(|| layout_test_page(black_box(a4)))
    });
    c.bench_function("layout_test_page (label-57x32)", |b| {
        b.iter(|| layout_test_page(black_box(small)))
    });
}

/// Layout of every known profile in one pass.
fn bench_all_profiles(c: &mut Criterion) {
    c.bench_function("layout_test_page (all profiles)", |b| {
        b.iter(|| {
            for profile in PAPER_PROFILES {
                black_box(layout_test_page(profile));
            }
        })
    });
}

criterion_group!(benches, bench_layout, bench_all_profiles);
criterion_main!(benches);
