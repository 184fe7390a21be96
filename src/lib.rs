//! Convenience layer over the APplus ERP application server: SOAP calls,
//! database queries, record changes through useXML, copying of business
//! objects and Excel reports.

pub mod api;
pub mod config;
pub mod db;
pub mod duplicate;
pub mod error;
pub mod mutation;
pub mod report;
pub mod session;
pub mod sql;
pub mod value;

pub use config::Config;
pub use db::{Database, DbTableIds, QueryResult};
pub use error::{Error, RemoteFailure, Result};
pub use mutation::{Fields, RecordMutator};
pub use session::Session;
pub use value::FieldValue;
