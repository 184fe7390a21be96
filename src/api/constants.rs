//! Wire constants and service addresses of the APplus application server

use std::borrow::Cow;
use std::fmt;

/// SOAP 1.1 envelope namespace
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.1 RPC encoding style
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Datatype namespace declared on every useXML row
pub const USEXML_DT_NS: &str = "urn:schemas-microsoft-com:datatypes";

/// Prefix the job service puts in front of plain-text results
pub const RETSTRING_PREFIX: &str = "retstring://";

/// Content type for SOAP 1.1 requests
pub const CONTENT_TYPE_XML: &str = "text/xml; charset=utf-8";

/// A JWS service on the application server, addressed as `package/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Service {
    package: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl Service {
    pub const fn fixed(package: &'static str, name: &'static str) -> Self {
        Self {
            package: Cow::Borrowed(package),
            name: Cow::Borrowed(name),
        }
    }

    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: Cow::Owned(package.into()),
            name: Cow::Owned(name.into()),
        }
    }

    /// Parses `"p2core/Table"` (a `.` separator is accepted too).
    pub fn parse(path: &str) -> Option<Self> {
        let (package, name) = path.split_once('/').or_else(|| path.split_once('.'))?;
        let name = name.trim_end_matches(".jws");
        if package.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(package, name))
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.name)
    }
}

/// Services used by this crate
pub mod services {
    use super::Service;

    /// SQL completion
    pub const TABLE: Service = Service::fixed("p2core", "Table");
    /// Record mutation via useXML
    pub const XML: Service = Service::fixed("p2core", "XML");
    pub const JOB: Service = Service::fixed("p2core", "Job");
    /// Number ranges
    pub const NUMMER: Service = Service::fixed("p2system", "Nummer");
    pub const SYSCONF: Service = Service::fixed("p2system", "SysConf");
    pub const SCRIPT_TOOL: Service = Service::fixed("p2script", "ScriptTool");
    pub const ADAPT_DB: Service = Service::fixed("p2dbtools", "AdaptDB");
}

/// Build the endpoint URL of a service
pub fn service_endpoint(base_url: &str, service: &Service) -> String {
    format!(
        "{}/{}/{}.jws",
        base_url.trim_end_matches('/'),
        service.package(),
        service.name()
    )
}

/// Basic-auth user name: the server reads the environment from the login.
pub fn auth_user(user: &str, env: &str) -> String {
    format!("{}|{}", user, env)
}
