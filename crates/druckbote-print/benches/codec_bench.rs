// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the settings codec and argument quoting in the
// druckbote-print crate.

use std::num::NonZeroU32;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use druckbote_core::{
    Dialect, DuplexMode, Orientation, PaperFormat, PaperSize, PrintSettings,
};
use druckbote_print::codec::{command_line, encode, escape_arg};

fn full_settings() -> PrintSettings {
    PrintSettings {
        duplex: Some(DuplexMode::LongEdge),
        copies: NonZeroU32::new(3),
        orientation: Some(Orientation::Landscape),
        format: Some(PaperFormat::Named(PaperSize::A4)),
    }
}

/// Encode fully populated settings in both dialects.
fn bench_encode(c: &mut Criterion) {
    let settings = full_settings();

    c.bench_function("encode (posix, all fields)", |b| {
        b.iter(|| encode(black_box(&settings), Dialect::Posix))
    });
    c.bench_function("encode (windows, all fields)", |b| {
        b.iter(|| encode(black_box(&settings), Dialect::Windows))
    });

    let custom = PrintSettings {
        format: Some(PaperFormat::Custom {
            width_mm: 62,
            height_mm: 29,
        }),
        ..PrintSettings::default()
    };
    c.bench_function("encode (posix, custom media)", |b| {
        b.iter(|| encode(black_box(&custom), Dialect::Posix))
    });
}

/// Quote arguments that need escaping, and build a full logged command line.
fn bench_escape(c: &mut Criterion) {
    c.bench_function("escape_arg (posix, quoted)", |b| {
        b.iter(|| escape_arg(black_box("Front Desk's Printer"), Dialect::Posix))
    });
    c.bench_function("escape_arg (windows, quoted)", |b| {
        b.iter(|| escape_arg(black_box(r#"C:\Program Files\a "b"\"#), Dialect::Windows))
    });

    let mut args = vec!["-d".to_string(), "Front Desk".to_string()];
    args.extend(encode(&full_settings(), Dialect::Posix));
    args.push("/tmp/druckbote-abc123.pdf".to_string());
    c.bench_function("command_line (posix, full job)", |b| {
        b.iter(|| command_line("lp", black_box(&args), Dialect::Posix))
    });
}

criterion_group!(benches, bench_encode, bench_escape);
criterion_main!(benches);
