// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: reads the persisted settings once and wires the
// print pipeline (resolver, artifacts, dispatcher, test pages, enumeration)
// and the network listener from them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{AppConfig, Platform};
use druckbote_document::{
    ArtifactStore, ContentResolver, HeadlessChromium, ResourceLocator, TestPageGenerator,
};
use druckbote_print::{
    CommandRunner, PrintDispatcher, PrintServer, PrintService, SessionRegistry, SystemInterfaces,
    SystemPrinters, SystemRunner,
};
use tracing::{info, warn};

use super::data_dir;

/// Default browser binary name when none is configured or found on `PATH`.
const FALLBACK_RENDERER: &str = "chromium";

/// Everything the control channel and the listener need.
#[derive(Clone)]
pub struct AppServices {
    config: AppConfig,
    data_dir: PathBuf,
    sessions: SessionRegistry,
    service: Arc<PrintService>,
    server: Arc<PrintServer>,
}

impl AppServices {
    /// Load settings (from `config_path` or the data directory) and build
    /// the services.  Call once at startup.
    pub fn init(config_path: Option<&Path>) -> Result<Self> {
        let dir = data_dir::data_dir();
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.join(CONFIG_FILE));
        info!(path = %path.display(), "loading settings");

        let config = load_config(&path);
        Self::from_config(config, dir)
    }

    /// Build the services for `config` on this host.
    pub fn from_config(config: AppConfig, data_dir: PathBuf) -> Result<Self> {
        let platform = Platform::current();
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let resources = ResourceLocator::detect(config.resource_dir.as_deref());

        let renderer = HeadlessChromium::detect(config.renderer_path.as_deref()).unwrap_or_else(|| {
            warn!("no headless browser found; non-PDF documents cannot be converted");
            HeadlessChromium::new(FALLBACK_RENDERER)
        });
        info!(renderer = %renderer.binary().display(), platform = ?platform, "print pipeline");

        let artifacts = match &config.artifact_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    DruckboteError::Config(format!("artifact directory {}: {e}", dir.display()))
                })?;
                ArtifactStore::new(dir)
            }
            None => ArtifactStore::system_temp(),
        };

        let sessions = SessionRegistry::new();
        let mut service = PrintService::new(
            ContentResolver::new(Arc::new(renderer))?,
            artifacts,
            PrintDispatcher::new(platform.clone(), resources.clone(), Arc::clone(&runner)),
            TestPageGenerator::new(resources),
            Arc::new(SystemPrinters::new(platform, runner)),
            Arc::new(SystemInterfaces),
            sessions.clone(),
        );
        if let Some(dir) = &config.network_document_dir {
            service = service.with_network_documents(dir)?;
        }
        let service = Arc::new(service);
        let server = Arc::new(PrintServer::new(Arc::clone(&service)));

        Ok(Self {
            config,
            data_dir,
            sessions,
            service,
            server,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn service(&self) -> Arc<PrintService> {
        Arc::clone(&self.service)
    }

    pub fn server(&self) -> Arc<PrintServer> {
        Arc::clone(&self.server)
    }
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

/// Read settings from `path`.
///
/// A missing file yields defaults, which are written back so they can be
/// edited.  An unreadable or malformed file yields defaults and is left
/// untouched.
pub fn load_config(path: &Path) -> AppConfig {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            if let Err(e) = persist_config(path, &config) {
                warn!(path = %path.display(), error = %e, "cannot write default settings");
            }
            return config;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read settings; using defaults");
            return AppConfig::default();
        }
    };

    serde_json::from_str(&data).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "malformed settings; using defaults");
        AppConfig::default()
    })
}

fn persist_config(path: &Path, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}
