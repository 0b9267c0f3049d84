// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print settings codec -- translate `PrintSettings` into the command-line
// vocabulary of a platform print utility.
//
// # Dialects
//
//   - POSIX (`lp`): one option pair per field, using the IPP keywords CUPS
//     understands (RFC 8011 SS5.2).
//   - Windows (SumatraPDF): every field folded into a single comma-separated
//     `-print-settings` value.
//
// Fields are always emitted in the order duplex, copies, orientation, format.
// Unset fields emit nothing and a copy count of 1 is never emitted.
//
// Tokens are handed to the process as argv; `escape_arg` only produces the
// human-readable command line that gets logged.

use std::iter;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{Dialect, DuplexMode, Orientation, PaperFormat, PaperSize, PrintSettings};

/// Encode `settings` as print-utility arguments for `dialect`.
pub fn encode(settings: &PrintSettings, dialect: Dialect) -> Vec<String> {
    match dialect {
        Dialect::Posix => encode_posix(settings),
        Dialect::Windows => encode_windows(settings),
    }
}

fn encode_posix(settings: &PrintSettings) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(duplex) = settings.duplex {
        args.push("-o".to_string());
        args.push(format!("sides={}", duplex.ipp_sides_keyword()));
    }
    if let Some(copies) = settings.effective_copies() {
        args.push("-n".to_string());
        args.push(copies.to_string());
    }
    if let Some(orientation) = settings.orientation {
        args.push("-o".to_string());
        args.push(format!("orientation-requested={}", orientation.ipp_enum_value()));
    }
    if let Some(format) = settings.format {
        args.push("-o".to_string());
        args.push(match format {
            PaperFormat::Named(size) => format!("media={}", size.name()),
            PaperFormat::Custom {
                width_mm,
                height_mm,
            } => format!("media=Custom.{width_mm}x{height_mm}mm"),
        });
    }

    args
}

fn encode_windows(settings: &PrintSettings) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(duplex) = settings.duplex {
        parts.push(
            match duplex {
                DuplexMode::Simplex => "simplex",
                DuplexMode::ShortEdge => "duplexshort",
                DuplexMode::LongEdge => "duplexlong",
            }
            .to_string(),
        );
    }
    if let Some(copies) = settings.effective_copies() {
        parts.push(format!("{copies}x"));
    }
    if let Some(orientation) = settings.orientation {
        parts.push(
            match orientation {
                Orientation::Portrait => "portrait",
                Orientation::Landscape => "landscape",
            }
            .to_string(),
        );
    }
    if let Some(format) = settings.format {
        parts.push(match format {
            PaperFormat::Named(size) => format!("paper={}", sumatra_paper_name(size)),
            PaperFormat::Custom {
                width_mm,
                height_mm,
            } => format!("paper={width_mm}x{height_mm}mm"),
        });
    }

    if parts.is_empty() {
        return Vec::new();
    }
    vec!["-print-settings".to_string(), parts.join(",")]
}

/// Paper names as SumatraPDF spells them.
fn sumatra_paper_name(size: PaperSize) -> &'static str {
    match size {
        PaperSize::A3 => "A3",
        PaperSize::A4 => "A4",
        PaperSize::A5 => "A5",
        PaperSize::A6 => "A6",
        PaperSize::Letter => "letter",
        PaperSize::Legal => "legal",
        PaperSize::Tabloid => "tabloid",
    }
}

// ---------------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------------

/// Quote `arg` for display on a `dialect` command line.
///
/// Arguments containing a NUL byte cannot be passed to any process and are
/// rejected.
pub fn escape_arg(arg: &str, dialect: Dialect) -> Result<String> {
    if arg.contains('\0') {
        return Err(DruckboteError::InvalidJob(format!(
            "argument contains a NUL byte: {:?}",
            arg.replace('\0', "\\0")
        )));
    }
    Ok(match dialect {
        Dialect::Posix => escape_posix(arg),
        Dialect::Windows => escape_windows(arg),
    })
}

/// Join `program` and `args` into one escaped command line.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S], dialect: Dialect) -> Result<String> {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(escape_arg(program, dialect)?);
    for arg in args {
        parts.push(escape_arg(arg.as_ref(), dialect)?);
    }
    Ok(parts.join(" "))
}

fn is_posix_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c)
}

/// Single-quote unless every character is shell-inert.
fn escape_posix(arg: &str) -> String {
    if !arg.is_empty() && arg.chars().all(is_posix_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quote following the MSVC runtime argv rules: backslashes are literal
/// unless they precede a double quote.
fn escape_windows(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '\n', '\u{0b}', '"']) {
        return arg.to_string();
    }

    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    out.extend(iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}
