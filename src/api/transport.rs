use super::constants::Service;
use crate::error::Result;
use crate::value::FieldValue;
use async_trait::async_trait;

/// One remote procedure call
#[derive(Debug, Clone, PartialEq)]
pub struct SoapCall {
    pub service: Service,
    pub method: String,
    pub params: Vec<FieldValue>,
}

impl SoapCall {
    pub fn new(service: Service, method: impl Into<String>, params: Vec<FieldValue>) -> Self {
        Self {
            service,
            method: method.into(),
            params,
        }
    }

    /// First parameter as text, which is what most services take.
    pub fn text_param(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(|p| p.as_str())
    }
}

/// Anything that can carry a [`SoapCall`] to an application server.
///
/// `Ok(None)` is a nil or void return.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    async fn invoke(&self, call: &SoapCall) -> Result<Option<String>>;

    /// Where calls go, for diagnostics.
    fn endpoint(&self) -> String;
}
