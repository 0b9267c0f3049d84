// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job intake -- the single pipeline behind both the network API and the
// local control channel.
//
// Per job: platform check -> resolve -> artifact -> dispatch -> dispose.
// Jobs in a batch run concurrently; outcomes come back in submission order.
// A failing job only ever fails its own slot, and the error text names the
// stage it failed in.
//
// Every job runs on a task owned by the service, not by the caller.  A
// caller that goes away (a closed connection, a stopped listener) only loses
// the reply; the job still dispatches, cleans up and reports `JobFinished`.
//
// Network callers may only name local files inside the configured network
// document directory; without one, local paths are refused over the network.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{
    DocumentRef, Job, JobOutcome, JobRequest, NetworkInterface, PrintSettings, PrinterList,
    TestPageRequest,
};
use druckbote_document::{ArtifactStore, ContentResolver, TestPageGenerator, paper_profile};
use druckbote_security::fingerprint;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::PrintDispatcher;
use crate::interfaces::InterfaceProvider;
use crate::printers::PrinterProvider;
use crate::session::{SessionEvent, SessionRegistry};

/// Pipeline stage a job failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Platform,
    Resolve,
    Generate,
    Artifact,
    Dispatch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Platform => "platform",
            Self::Resolve => "resolve",
            Self::Generate => "generate",
            Self::Artifact => "artifact",
            Self::Dispatch => "dispatch",
        })
    }
}

/// An error together with the stage that produced it.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: DruckboteError,
}

impl StageError {
    fn outcome(&self) -> JobOutcome {
        JobOutcome::failure(format!("{}: {}", self.stage, self.error))
    }
}

fn at(stage: Stage) -> impl FnOnce(DruckboteError) -> StageError {
    move |error| StageError { stage, error }
}

/// Who submitted a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    /// The local console or control channel.
    Control,
    /// The HTTP(S) print API.
    Network,
}

/// Everything needed to turn job requests into printed pages.
pub struct PrintService {
    resolver: ContentResolver,
    artifacts: ArtifactStore,
    dispatcher: PrintDispatcher,
    test_pages: TestPageGenerator,
    printers: Arc<dyn PrinterProvider>,
    interfaces: Arc<dyn InterfaceProvider>,
    sessions: SessionRegistry,
    /// Canonical directory network callers may print local files from.
    network_documents: Option<PathBuf>,
    jobs: TaskTracker,
}

impl PrintService {
    pub fn new(
        resolver: ContentResolver,
        artifacts: ArtifactStore,
        dispatcher: PrintDispatcher,
        test_pages: TestPageGenerator,
        printers: Arc<dyn PrinterProvider>,
        interfaces: Arc<dyn InterfaceProvider>,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            resolver,
            artifacts,
            dispatcher,
            test_pages,
            printers,
            interfaces,
            sessions,
            network_documents: None,
            jobs: TaskTracker::new(),
        }
    }

    /// Let network callers print local files below `dir`.
    pub fn with_network_documents(mut self, dir: &Path) -> Result<Self> {
        let dir = std::fs::canonicalize(dir).map_err(|e| {
            DruckboteError::Config(format!("network document directory {}: {e}", dir.display()))
        })?;
        info!(dir = %dir.display(), "network callers may print local files");
        self.network_documents = Some(dir);
        Ok(self)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Wait for every job in flight to finish.
    pub async fn drain(&self) {
        self.jobs.close();
        self.jobs.wait().await;
        self.jobs.reopen();
    }

    // -- Jobs ---------------------------------------------------------------

    /// Run a batch from the control channel.  Always returns one outcome
    /// per request, in order.
    pub async fn submit(self: &Arc<Self>, batch: Vec<JobRequest>) -> Vec<JobOutcome> {
        info!(jobs = batch.len(), "batch submitted");
        join_all(batch.into_iter().map(|request| self.submit_one(request))).await
    }

    /// Run a batch of untyped entries.  Entries that are not job objects
    /// fail their own slot at the validate stage.
    pub async fn submit_json(
        self: &Arc<Self>,
        batch: Vec<serde_json::Value>,
        origin: JobOrigin,
    ) -> Vec<JobOutcome> {
        info!(jobs = batch.len(), ?origin, "batch submitted");
        join_all(batch.into_iter().map(|entry| async move {
            match serde_json::from_value::<JobRequest>(entry) {
                Ok(request) => self.spawn_job(request, origin).await,
                Err(e) => self.finish(String::new(), Err(at(Stage::Validate)(e.into()))),
            }
        }))
        .await
    }

    /// Run a single job from the control channel.
    pub async fn submit_one(self: &Arc<Self>, request: JobRequest) -> JobOutcome {
        self.spawn_job(request, JobOrigin::Control).await
    }

    async fn spawn_job(self: &Arc<Self>, request: JobRequest, origin: JobOrigin) -> JobOutcome {
        let printer = request.printer.clone();
        let service = Arc::clone(self);
        let task = self.jobs.spawn(async move {
            let printer = request.printer.clone();
            let result = match Job::try_from(request) {
                Ok(job) => service.run_job(&job, origin).await,
                Err(e) => Err(at(Stage::Validate)(e)),
            };
            service.finish(printer, result)
        });
        self.join(printer, task).await
    }

    /// Await a job task.  A task that panicked still reports an outcome.
    async fn join(&self, printer: String, task: JoinHandle<JobOutcome>) -> JobOutcome {
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(printer = %printer, error = %e, "job task failed");
                let outcome = JobOutcome::failure(format!("job task failed: {e}"));
                self.sessions.notify(SessionEvent::JobFinished {
                    printer,
                    outcome: outcome.clone(),
                });
                outcome
            }
        }
    }

    #[instrument(skip(self, job), fields(job = %job.id, printer = %job.printer, document = %job.document))]
    async fn run_job(&self, job: &Job, origin: JobOrigin) -> std::result::Result<(), StageError> {
        let document = self.admit(&job.document, origin).await?;

        // Checked first so that nothing is fetched or written for a host
        // that cannot print.
        self.dispatcher.dialect().map_err(at(Stage::Platform))?;

        let resolved = self
            .resolver
            .resolve(&document)
            .await
            .map_err(at(Stage::Resolve))?;
        debug!(source = ?resolved.source, "document resolved");

        self.print_bytes(&job.printer, &job.settings, resolved.bytes).await
    }

    /// Artifact -> dispatch -> dispose.  The artifact is removed whatever the
    /// dispatch outcome.
    async fn print_bytes(
        &self,
        printer: &str,
        settings: &PrintSettings,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), StageError> {
        info!(fingerprint = %fingerprint(&bytes), bytes = bytes.len(), "document ready for dispatch");

        let artifact = self.artifacts.create(bytes).await.map_err(at(Stage::Artifact))?;
        let result = self.dispatcher.dispatch(&artifact, printer, settings).await;
        artifact.dispose().await;

        result.map(|_| ()).map_err(at(Stage::Dispatch))
    }

    /// Apply the local file policy for `origin`.  Admitted network paths
    /// come back canonicalized, so the file read is the file checked.
    async fn admit(
        &self,
        document: &DocumentRef,
        origin: JobOrigin,
    ) -> std::result::Result<DocumentRef, StageError> {
        let (JobOrigin::Network, DocumentRef::Local(path)) = (origin, document) else {
            return Ok(document.clone());
        };
        let refused = |reason: String| at(Stage::Validate)(DruckboteError::InvalidJob(reason));

        let Some(root) = &self.network_documents else {
            return Err(refused(
                "local file paths are not accepted from network clients".into(),
            ));
        };
        let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
            at(Stage::Resolve)(DruckboteError::fetch(path.display().to_string(), e.to_string()))
        })?;
        if !canonical.starts_with(root) {
            return Err(refused(format!(
                "{} is outside the network document directory",
                path.display()
            )));
        }
        Ok(DocumentRef::Local(canonical))
    }

    fn finish(&self, printer: String, result: std::result::Result<(), StageError>) -> JobOutcome {
        let outcome = match result {
            Ok(()) => {
                info!(printer = %printer, "job printed");
                JobOutcome::success()
            }
            Err(e) => {
                warn!(printer = %printer, stage = %e.stage, error = %e.error, "job failed");
                e.outcome()
            }
        };
        self.sessions.notify(SessionEvent::JobFinished {
            printer,
            outcome: outcome.clone(),
        });
        outcome
    }

    // -- Test pages -----------------------------------------------------------

    /// Generate a calibration page for `request.profile` and print it.
    pub async fn test_page(self: &Arc<Self>, request: TestPageRequest) -> JobOutcome {
        let printer = request.printer.clone();
        let service = Arc::clone(self);
        let task = self.jobs.spawn(async move {
            let printer = request.printer.clone();
            let result = service.run_test_page(request).await;
            service.finish(printer, result)
        });
        self.join(printer, task).await
    }

    #[instrument(skip(self, request), fields(printer = %request.printer, profile = %request.profile))]
    async fn run_test_page(&self, request: TestPageRequest) -> std::result::Result<(), StageError> {
        if request.printer.trim().is_empty() {
            return Err(at(Stage::Validate)(DruckboteError::InvalidJob(
                "printer name is empty".into(),
            )));
        }
        let overrides = PrintSettings::from_json(request.settings).map_err(at(Stage::Validate))?;
        let profile = paper_profile(&request.profile).map_err(at(Stage::Validate))?;

        self.dispatcher.dialect().map_err(at(Stage::Platform))?;

        let pdf = self
            .test_pages
            .generate(profile.name)
            .await
            .map_err(at(Stage::Generate))?;

        let settings = overlay(profile.print_settings(), overrides);
        self.print_bytes(&request.printer, &settings, pdf).await
    }

    // -- Host enumeration -------------------------------------------------------

    /// Printers known to the host.  Needs a live session.
    pub async fn printers(&self) -> Result<PrinterList> {
        self.sessions.require_active()?;
        self.printers.list().await
    }

    /// Addresses of this host.  Needs a live session.
    pub fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        self.sessions.require_active()?;
        self.interfaces.list()
    }
}

/// Fields set in `overrides` win over `base`.
fn overlay(base: PrintSettings, overrides: PrintSettings) -> PrintSettings {
    PrintSettings {
        duplex: overrides.duplex.or(base.duplex),
        copies: overrides.copies.or(base.copies),
        orientation: overrides.orientation.or(base.orientation),
        format: overrides.format.or(base.format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use axum::Router;
    use axum::http::header;
    use axum::routing::get;
    use druckbote_core::{DuplexMode, Orientation, PaperFormat, Platform};
    use serde_json::json;

    use crate::testing::{FakeRunner, Fixture, RENDERED_PDF};

    const PDF_BYTES: &[u8] = b"%PDF-1.4\n%\xC7\xEC\x8F\xA2\n1 0 obj<<>>endobj\n%%EOF";

    fn job(printer: &str, url: &str) -> JobRequest {
        JobRequest {
            printer: printer.into(),
            url: url.into(),
            settings: serde_json::Value::Null,
        }
    }

    async fn document_server() -> String {
        let app = Router::new()
            .route(
                "/label.pdf",
                get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], PDF_BYTES) }),
            )
            .route(
                "/receipt.html",
                get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<p>receipt</p>") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn pdf_and_html_batch() {
        let fx = Fixture::new();
        let base = document_server().await;

        let outcomes = fx
            .service
            .submit(vec![
                job("Office", &format!("{base}/label.pdf")),
                job("Office", &format!("{base}/receipt.html")),
            ])
            .await;

        assert_eq!(outcomes, vec![JobOutcome::success(), JobOutcome::success()]);
        assert_eq!(fx.renderer.opened.load(Ordering::SeqCst), 1);
        assert_eq!(fx.renderer.closed.load(Ordering::SeqCst), 1);

        let mut documents: Vec<Vec<u8>> = fx
            .runner
            .calls()
            .into_iter()
            .filter_map(|c| c.document)
            .collect();
        documents.sort();
        let mut expected = vec![PDF_BYTES.to_vec(), RENDERED_PDF.to_vec()];
        expected.sort();
        assert_eq!(documents, expected);
    }

    #[tokio::test]
    async fn print_ready_content_reaches_dispatcher_unchanged() {
        let fx = Fixture::new();
        let base = document_server().await;

        let outcome = fx.service.submit_one(job("Office", &format!("{base}/label.pdf"))).await;

        assert!(outcome.ok, "{outcome:?}");
        let calls = fx.runner.calls();
        assert_eq!(calls[0].document.as_deref(), Some(PDF_BYTES));
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[tokio::test]
    async fn outcomes_keep_submission_order() {
        let runner = FakeRunner::default()
            .delayed("Slow", Duration::from_millis(200))
            .failing_on("Slow", 2, "slow printer gave up");
        let fx = Fixture::with(Platform::Posix, runner);
        let doc = fx.document("a.pdf", PDF_BYTES);

        let outcomes = fx
            .service
            .submit(vec![job("Slow", &doc), job("Fast", &doc), job("Fast", &doc)])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].ok);
        assert!(outcomes[0].error.as_deref().unwrap().starts_with("dispatch:"));
        assert!(outcomes[1].ok);
        assert!(outcomes[2].ok);

        let mut printers: Vec<String> =
            fx.runner.calls().into_iter().filter_map(|c| c.printer).collect();
        printers.sort();
        assert_eq!(printers, ["Fast", "Fast", "Slow"]);
    }

    #[tokio::test]
    async fn abandoned_caller_does_not_cancel_job() {
        let runner = FakeRunner::default().delayed("Slow", Duration::from_millis(300));
        let fx = Fixture::with(Platform::Posix, runner);
        let mut session = fx.sessions.register();
        let doc = fx.document("a.pdf", PDF_BYTES);

        let service = Arc::clone(&fx.service);
        let caller = tokio::spawn(async move { service.submit_one(job("Slow", &doc)).await });
        for _ in 0..250 {
            if !fx.runner.calls().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        fx.service.drain().await;

        assert_eq!(
            session.try_next_event(),
            Some(SessionEvent::JobFinished {
                printer: "Slow".into(),
                outcome: JobOutcome::success(),
            })
        );
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[tokio::test]
    async fn network_jobs_only_read_the_document_dir() {
        let fx = Fixture::new();
        let inside = fx.document("a.pdf", PDF_BYTES);
        let outside_dir = tempfile::tempdir().unwrap();
        let outside = outside_dir.path().join("secret.pdf");
        std::fs::write(&outside, PDF_BYTES).unwrap();
        let escape = fx
            .documents
            .path()
            .join("..")
            .join(outside_dir.path().file_name().unwrap())
            .join("secret.pdf");

        let outcomes = fx
            .service
            .submit_json(
                vec![
                    json!({ "printer": "Office", "url": inside }),
                    json!({ "printer": "Office", "url": outside }),
                    json!({ "printer": "Office", "url": escape }),
                ],
                JobOrigin::Network,
            )
            .await;

        assert!(outcomes[0].ok, "{:?}", outcomes[0]);
        for refused in &outcomes[1..] {
            let error = refused.error.as_deref().unwrap();
            assert!(error.starts_with("validate:"), "{error}");
            assert!(error.contains("outside the network document directory"));
        }
        assert_eq!(fx.runner.calls().len(), 1);

        // The control channel is not restricted.
        let outcome = fx
            .service
            .submit_one(job("Office", &outside.to_string_lossy()))
            .await;
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn network_jobs_without_document_dir_get_no_local_files() {
        let fx = Fixture::without_network_documents();
        let doc = fx.document("a.pdf", PDF_BYTES);

        let outcomes = fx
            .service
            .submit_json(vec![json!({ "printer": "Office", "url": doc })], JobOrigin::Network)
            .await;

        assert_eq!(
            outcomes[0].error.as_deref(),
            Some("validate: invalid job: local file paths are not accepted from network clients")
        );
        assert!(fx.runner.calls().is_empty());
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[test]
    fn network_document_dir_must_exist() {
        let fx = Fixture::new();
        let dir = fx.documents.path().join("missing");
        let service = PrintService::new(
            ContentResolver::new(fx.renderer.clone()).unwrap(),
            ArtifactStore::new(fx.artifact_dir.path()),
            PrintDispatcher::new(
                Platform::Posix,
                druckbote_document::ResourceLocator::new(fx.documents.path()),
                fx.runner.clone(),
            ),
            TestPageGenerator::new(druckbote_document::ResourceLocator::new(fx.documents.path())),
            Arc::new(crate::testing::FakePrinters(PrinterList::new())),
            Arc::new(crate::testing::FakeInterfaces(Vec::new())),
            fx.sessions.clone(),
        );
        assert!(matches!(
            service.with_network_documents(&dir),
            Err(DruckboteError::Config(_))
        ));
    }

    #[tokio::test]
    async fn failures_stay_in_their_slot() {
        let fx = Fixture::new();
        let doc = fx.document("a.pdf", PDF_BYTES);

        let outcomes = fx
            .service
            .submit_json(
                vec![
                    json!({ "printer": "Office", "url": doc }),
                    json!({ "printer": "", "url": doc }),
                    json!({ "printer": "Office", "url": doc, "settings": { "duplex": "sideways" } }),
                    json!({ "printer": "Office", "url": fx.documents.path().join("missing.pdf") }),
                    json!("not a job"),
                    json!({ "printer": "Office", "url": doc, "settings": { "copies": 2 } }),
                ],
                JobOrigin::Control,
            )
            .await;

        assert_eq!(outcomes.len(), 6);
        assert!(outcomes[0].ok);
        assert!(outcomes[1].error.as_deref().unwrap().starts_with("validate:"));
        assert!(outcomes[2].error.as_deref().unwrap().starts_with("validate:"));
        assert!(outcomes[3].error.as_deref().unwrap().starts_with("resolve:"));
        assert!(outcomes[4].error.as_deref().unwrap().starts_with("validate:"));
        assert!(outcomes[5].ok);
        assert_eq!(fx.runner.calls().len(), 2);
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[tokio::test]
    async fn dispatch_failure_still_removes_artifact() {
        let fx = Fixture::with(Platform::Posix, FakeRunner::default().failing_all(1, "lp: offline"));
        let doc = fx.document("a.pdf", PDF_BYTES);

        let outcome = fx.service.submit_one(job("Office", &doc)).await;

        assert_eq!(
            outcome.error.as_deref(),
            Some("dispatch: print utility failed (exit status 1): lp: offline")
        );
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[tokio::test]
    async fn unsupported_platform_creates_no_artifact() {
        let fx = Fixture::with(Platform::Unsupported("plan9".into()), FakeRunner::default());
        let doc = fx.document("a.pdf", PDF_BYTES);

        let outcome = fx.service.submit_one(job("Office", &doc)).await;

        assert!(outcome.error.as_deref().unwrap().starts_with("platform:"));
        assert_eq!(fx.artifacts_left(), 0);
        assert!(fx.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn finished_jobs_are_pushed_to_active_session() {
        let fx = Fixture::new();
        let mut session = fx.sessions.register();
        let doc = fx.document("a.pdf", PDF_BYTES);

        fx.service.submit_one(job("Label", &doc)).await;

        assert_eq!(
            session.try_next_event(),
            Some(SessionEvent::JobFinished {
                printer: "Label".into(),
                outcome: JobOutcome::success(),
            })
        );
    }

    #[tokio::test]
    async fn test_page_rejects_unknown_profile_first() {
        let fx = Fixture::new();
        let outcome = fx
            .service
            .test_page(TestPageRequest {
                printer: "Label".into(),
                profile: "postcard-9000".into(),
                settings: serde_json::Value::Null,
            })
            .await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("validate: unknown paper profile 'postcard-9000'")
        );
        assert!(fx.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_page_without_font_fails_at_generate() {
        let fx = Fixture::new();
        let outcome = fx
            .service
            .test_page(TestPageRequest {
                printer: "Label".into(),
                profile: "label-62x29".into(),
                settings: serde_json::Value::Null,
            })
            .await;
        assert!(outcome.error.as_deref().unwrap().starts_with("generate:"));
        assert_eq!(fx.artifacts_left(), 0);
    }

    #[tokio::test]
    async fn enumeration_needs_a_session() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.service.printers().await.unwrap_err(),
            DruckboteError::NoActivePrinterContext
        ));
        assert!(fx.service.interfaces().is_err());

        let _session = fx.sessions.register();
        let printers = fx.service.printers().await.unwrap();
        assert_eq!(printers["Office"].as_deref(), Some("idle"));
        assert_eq!(fx.service.interfaces().unwrap().len(), 1);
    }

    #[test]
    fn overrides_win_over_profile_settings() {
        let base = PrintSettings {
            orientation: Some(Orientation::Landscape),
            format: Some(PaperFormat::Custom {
                width_mm: 62,
                height_mm: 29,
            }),
            ..PrintSettings::default()
        };
        let overrides = PrintSettings {
            duplex: Some(DuplexMode::Simplex),
            orientation: Some(Orientation::Portrait),
            ..PrintSettings::default()
        };
        let merged = overlay(base, overrides);
        assert_eq!(merged.duplex, Some(DuplexMode::Simplex));
        assert_eq!(merged.orientation, Some(Orientation::Portrait));
        assert_eq!(merged.format, base.format);
    }
}
