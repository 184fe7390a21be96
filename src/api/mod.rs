//! SOAP access to the APplus application server
//!
//! The transport trait is the seam between the typed service wrappers and the
//! HTTP client; everything above it only sees [`SoapCall`]s and return texts.

pub mod client;
pub mod constants;
pub mod envelope;
pub mod gateway;
pub mod job;
pub mod logging;
pub mod scripttool;
pub mod sysconf;
pub mod transport;

pub use client::AppServerClient;
pub use constants::{Service, services};
pub use gateway::Gateway;
pub use job::Jobs;
pub use logging::CallLogger;
pub use scripttool::{DuplicateSpec, ScriptTool, XmlDefinition};
pub use sysconf::SysConf;
pub use transport::{SoapCall, SoapTransport};
