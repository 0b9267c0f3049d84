// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use druckbote_core::error::Result;
use druckbote_core::{NetworkInterface, Platform, PrinterList};
use druckbote_document::{
    ArtifactStore, ContentResolver, RenderSurface, RenderSurfaceProvider, ResourceLocator,
    TestPageGenerator,
};
use tempfile::TempDir;

use crate::dispatch::PrintDispatcher;
use crate::interfaces::{InterfaceProvider, from_addresses};
use crate::process::{CommandRunner, ProcessCommand, ProcessOutput};
use crate::service::PrintService;
use crate::session::SessionRegistry;

// -- Command runner -------------------------------------------------------------

/// One observed invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub command: ProcessCommand,
    pub printer: Option<String>,
    /// Contents of the file named by the last argument, read while the
    /// command "ran".
    pub document: Option<Vec<u8>>,
}

/// Records invocations instead of spawning processes.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<RecordedCall>>,
    stdout: String,
    failures: HashMap<String, (i32, String)>,
    fail_all: Option<(i32, String)>,
    delays: HashMap<String, Duration>,
    unlaunchable: bool,
}

impl FakeRunner {
    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn failing_on(mut self, printer: &str, code: i32, stderr: &str) -> Self {
        self.failures.insert(printer.to_string(), (code, stderr.to_string()));
        self
    }

    pub fn failing_all(mut self, code: i32, stderr: &str) -> Self {
        self.fail_all = Some((code, stderr.to_string()));
        self
    }

    pub fn delayed(mut self, printer: &str, delay: Duration) -> Self {
        self.delays.insert(printer.to_string(), delay);
        self
    }

    pub fn unlaunchable(mut self) -> Self {
        self.unlaunchable = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn printer_arg(args: &[String]) -> Option<String> {
    args.windows(2)
        .find(|pair| pair[0] == "-d" || pair[0] == "-print-to")
        .map(|pair| pair[1].clone())
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &ProcessCommand) -> std::io::Result<ProcessOutput> {
        if self.unlaunchable {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"));
        }

        let printer = printer_arg(&command.args);
        let document = command
            .args
            .last()
            .and_then(|path| std::fs::read(PathBuf::from(path)).ok());
        self.calls.lock().unwrap().push(RecordedCall {
            command: command.clone(),
            printer: printer.clone(),
            document,
        });

        if let Some(delay) = printer.as_ref().and_then(|p| self.delays.get(p)) {
            tokio::time::sleep(*delay).await;
        }

        let failure = printer
            .as_ref()
            .and_then(|p| self.failures.get(p))
            .or(self.fail_all.as_ref());
        Ok(match failure {
            Some((code, stderr)) => ProcessOutput {
                exit_status: Some(*code),
                success: false,
                stdout: Vec::new(),
                stderr: stderr.clone().into_bytes(),
            },
            None => ProcessOutput {
                exit_status: Some(0),
                success: true,
                stdout: self.stdout.clone().into_bytes(),
                stderr: Vec::new(),
            },
        })
    }
}

// -- Rendering --------------------------------------------------------------------

/// Renders every URL to a fixed PDF and counts surfaces.
#[derive(Default)]
pub struct CountingRenderer {
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

pub const RENDERED_PDF: &[u8] = b"%PDF-1.7 rendered";

struct CountingSurface {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderSurfaceProvider for CountingRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSurface>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSurface {
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl RenderSurface for CountingSurface {
    async fn load(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn print_to_pdf(&mut self) -> Result<Vec<u8>> {
        Ok(RENDERED_PDF.to_vec())
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// -- Host enumeration ---------------------------------------------------------------

pub struct FakePrinters(pub PrinterList);

#[async_trait]
impl crate::printers::PrinterProvider for FakePrinters {
    async fn list(&self) -> Result<PrinterList> {
        Ok(self.0.clone())
    }
}

pub struct FakeInterfaces(pub Vec<NetworkInterface>);

impl InterfaceProvider for FakeInterfaces {
    fn list(&self) -> Result<Vec<NetworkInterface>> {
        Ok(self.0.clone())
    }
}

// -- Assembled service --------------------------------------------------------------

/// A `PrintService` wired to fakes, with its own artifact and document dirs.
/// Network callers may print from the document dir.
pub struct Fixture {
    pub service: Arc<PrintService>,
    pub runner: Arc<FakeRunner>,
    pub renderer: Arc<CountingRenderer>,
    pub sessions: SessionRegistry,
    pub artifact_dir: TempDir,
    pub documents: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with(Platform::Posix, FakeRunner::default())
    }

    pub fn with(platform: Platform, runner: FakeRunner) -> Self {
        Self::build(platform, runner, true)
    }

    pub fn without_network_documents() -> Self {
        Self::build(Platform::Posix, FakeRunner::default(), false)
    }

    fn build(platform: Platform, runner: FakeRunner, network_documents: bool) -> Self {
        let runner = Arc::new(runner);
        let renderer = Arc::new(CountingRenderer::default());
        let sessions = SessionRegistry::new();
        let artifact_dir = tempfile::tempdir().unwrap();
        let documents = tempfile::tempdir().unwrap();
        // No font in here: test pages fail at the generate stage.
        let resources = ResourceLocator::new(documents.path());

        let printers: PrinterList = [
            ("Office".to_string(), Some("idle".to_string())),
            ("Label".to_string(), None),
        ]
        .into_iter()
        .collect();
        let interfaces = from_addresses([("lo".to_string(), "127.0.0.1".parse().unwrap())]);

        let mut service = PrintService::new(
            ContentResolver::new(renderer.clone()).unwrap(),
            ArtifactStore::new(artifact_dir.path()),
            PrintDispatcher::new(platform, resources.clone(), runner.clone()),
            TestPageGenerator::new(resources),
            Arc::new(FakePrinters(printers)),
            Arc::new(FakeInterfaces(interfaces)),
            sessions.clone(),
        );
        if network_documents {
            service = service.with_network_documents(documents.path()).unwrap();
        }

        Self {
            service: Arc::new(service),
            runner,
            renderer,
            sessions,
            artifact_dir,
            documents,
        }
    }

    /// Write a local document and return its path as a job URL.
    pub fn document(&self, name: &str, bytes: &[u8]) -> String {
        let path = self.documents.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path.to_string_lossy().into_owned()
    }

    pub fn artifacts_left(&self) -> usize {
        std::fs::read_dir(self.artifact_dir.path()).unwrap().count()
    }
}
