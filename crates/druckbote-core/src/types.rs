// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Druckbote print dispatcher.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DruckboteError, Result};

/// Identifier attached to a job for log correlation.  Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// Host platform, as far as print dispatch is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// CUPS / System V `lp` (Linux, macOS, BSD).
    Posix,
    /// Windows, printing through the bundled SumatraPDF utility.
    Windows,
    /// Anything else.  Carries the OS name for the error message.
    Unsupported(String),
}

impl Platform {
    /// Platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(unix) {
            Self::Posix
        } else {
            Self::Unsupported(std::env::consts::OS.to_string())
        }
    }

    /// Command-line dialect of the platform's print utility.
    pub fn dialect(&self) -> Result<Dialect> {
        match self {
            Self::Posix => Ok(Dialect::Posix),
            Self::Windows => Ok(Dialect::Windows),
            Self::Unsupported(name) => Err(DruckboteError::UnsupportedPlatform(name.clone())),
        }
    }
}

/// Command-line vocabulary of a platform print utility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// CUPS `lp`.
    Posix,
    /// SumatraPDF `-print-to`.
    Windows,
}

// ---------------------------------------------------------------------------
// Print settings
// ---------------------------------------------------------------------------

/// Duplex printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    #[serde(rename = "simplex")]
    Simplex,
    #[serde(rename = "short", alias = "short-edge")]
    ShortEdge,
    #[serde(rename = "long", alias = "long-edge")]
    LongEdge,
}

impl DuplexMode {
    /// IPP `sides` keyword (RFC 8011 §5.2.8), as understood by `lp -o sides=`.
    pub fn ipp_sides_keyword(&self) -> &'static str {
        match self {
            Self::Simplex => "one-sided",
            Self::LongEdge => "two-sided-long-edge",
            Self::ShortEdge => "two-sided-short-edge",
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
        }
    }
}

/// Named paper sizes accepted in print settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    A6,
    Letter,
    Legal,
    Tabloid,
}

impl PaperSize {
    pub const ALL: [PaperSize; 7] = [
        Self::A3,
        Self::A4,
        Self::A5,
        Self::A6,
        Self::Letter,
        Self::Legal,
        Self::Tabloid,
    ];

    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A3 => (297, 420),
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::A6 => (105, 148),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
        }
    }

    /// Canonical name, as used on the wire and by CUPS `media=`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::A6 => "A6",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
            Self::Tabloid => "Tabloid",
        }
    }
}

impl FromStr for PaperSize {
    type Err = DruckboteError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DruckboteError::InvalidSettings(format!("unknown paper size '{s}'")))
    }
}

/// Paper format: a named size or explicit dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PaperFormatRepr", into = "PaperFormatRepr")]
pub enum PaperFormat {
    Named(PaperSize),
    Custom { width_mm: u32, height_mm: u32 },
}

/// Wire representation: `"A4"` or `{"width_mm": 100, "height_mm": 150}`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PaperFormatRepr {
    Named(String),
    Custom { width_mm: u32, height_mm: u32 },
}

impl TryFrom<PaperFormatRepr> for PaperFormat {
    type Error = DruckboteError;

    fn try_from(repr: PaperFormatRepr) -> Result<Self> {
        match repr {
            PaperFormatRepr::Named(name) => Ok(Self::Named(name.parse()?)),
            PaperFormatRepr::Custom {
                width_mm,
                height_mm,
            } => {
                if width_mm == 0 || height_mm == 0 {
                    return Err(DruckboteError::InvalidSettings(format!(
                        "paper dimensions must be positive, got {width_mm}x{height_mm}mm"
                    )));
                }
                Ok(Self::Custom {
                    width_mm,
                    height_mm,
                })
            }
        }
    }
}

impl From<PaperFormat> for PaperFormatRepr {
    fn from(format: PaperFormat) -> Self {
        match format {
            PaperFormat::Named(size) => Self::Named(size.name().to_string()),
            PaperFormat::Custom {
                width_mm,
                height_mm,
            } => Self::Custom {
                width_mm,
                height_mm,
            },
        }
    }
}

/// Print settings for a job.  Every field is optional; an unset field leaves
/// the printer default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplex: Option<DuplexMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<NonZeroU32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<PaperFormat>,
}

impl PrintSettings {
    /// Copy count worth passing to the print utility (`None` for 1 or unset).
    pub fn effective_copies(&self) -> Option<u32> {
        self.copies.map(NonZeroU32::get).filter(|&n| n > 1)
    }

    /// Parse settings from an untyped JSON value, rejecting unknown enum values.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| DruckboteError::InvalidSettings(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRef {
    /// A file on this machine, already print-ready.
    Local(PathBuf),
    /// An `http`/`https` URL to fetch.
    Remote(String),
}

impl FromStr for DocumentRef {
    type Err = DruckboteError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DruckboteError::InvalidJob("document reference is empty".into()));
        }

        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(Self::Remote(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix("file://") {
            // file:///C:/docs/a.pdf -> C:/docs/a.pdf
            let rest = match rest.as_bytes() {
                [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() => &rest[1..],
                _ => rest,
            };
            return Ok(Self::Local(PathBuf::from(rest)));
        }

        match lower.split_once("://") {
            Some((scheme, _)) => Err(DruckboteError::InvalidJob(format!(
                "unsupported document scheme '{scheme}'"
            ))),
            None => Ok(Self::Local(PathBuf::from(s))),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Job as it arrives over the wire.  Settings stay untyped here so that one
/// malformed entry fails only its own slot in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub printer: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Request to print a calibration page on a named printer.  `settings`
/// override the paper profile's own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPageRequest {
    #[serde(default)]
    pub printer: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// One validated request to print a document on a named printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub printer: String,
    pub document: DocumentRef,
    pub settings: PrintSettings,
}

impl Job {
    pub fn new(printer: impl Into<String>, document: DocumentRef, settings: PrintSettings) -> Result<Self> {
        let printer = printer.into();
        if printer.trim().is_empty() {
            return Err(DruckboteError::InvalidJob("printer name is empty".into()));
        }
        Ok(Self {
            id: JobId::new(),
            printer,
            document,
            settings,
        })
    }
}

impl TryFrom<JobRequest> for Job {
    type Error = DruckboteError;

    fn try_from(req: JobRequest) -> Result<Self> {
        let document = req.url.parse()?;
        let settings = PrintSettings::from_json(req.settings)?;
        Self::new(req.printer, document, settings)
    }
}

/// Result of one job in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Host enumeration
// ---------------------------------------------------------------------------

/// Printer name → status text (`None` when the provider reports no status).
pub type PrinterList = BTreeMap<String, Option<String>>;

/// A network interface address of this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub address: IpAddr,
    pub family: IpFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    IPv4,
    IPv6,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Transport of the listening service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Transport {
    Plaintext,
    Encrypted { cert_path: PathBuf, key_path: PathBuf },
}

/// Where and how the network API listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    pub transport: Transport,
}

impl ServerConfig {
    pub fn bind_target(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Lifecycle state of the listening service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Running,
}

/// Snapshot reported by the server lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub state: ServerState,
    pub address: Option<SocketAddr>,
    pub encrypted: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub active_connections: usize,
}

impl ServerStatus {
    pub fn stopped() -> Self {
        Self {
            state: ServerState::Stopped,
            address: None,
            encrypted: false,
            started_at: None,
            active_connections: 0,
        }
    }
}
