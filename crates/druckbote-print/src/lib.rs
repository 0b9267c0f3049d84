// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckbote Print — settings codec, print dispatch through the host print
// utility, job intake, control-channel sessions and the HTTP/TLS print API.
// This crate joins the document pipeline from `druckbote-document` to the
// operating system's print subsystem.

pub mod codec;
pub mod dispatch;
pub mod http_server;
pub mod interfaces;
pub mod printers;
pub mod process;
pub mod service;
pub mod session;

#[cfg(test)]
mod testing;

pub use codec::{encode, escape_arg};
pub use dispatch::PrintDispatcher;
pub use http_server::PrintServer;
pub use interfaces::{InterfaceProvider, SystemInterfaces};
pub use printers::{PrinterProvider, SystemPrinters};
pub use process::{CommandRunner, ProcessCommand, SystemRunner};
pub use service::{JobOrigin, PrintService};
pub use session::{Session, SessionEvent, SessionRegistry};
