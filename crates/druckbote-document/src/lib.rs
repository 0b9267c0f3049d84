// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// druckbote-document — Everything between a document reference and a file the
// print utility can consume.
//
// Resolves local and remote documents into print-ready bytes (converting web
// content on a rendering surface when needed), generates calibration test
// pages, and owns the temporary artifacts handed to the dispatcher.

pub mod artifact;
pub mod render;
pub mod resolve;
pub mod resources;
pub mod testpage;

pub use artifact::{Artifact, ArtifactStore};
pub use render::{HeadlessChromium, RenderSurface, RenderSurfaceProvider, render_to_pdf};
pub use resolve::{ContentResolver, ContentSource, ResolvedDocument};
pub use resources::ResourceLocator;
pub use testpage::{PaperProfile, TestPageGenerator, layout_test_page, paper_profile};
