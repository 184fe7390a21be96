//! Generic remote procedure invocation plus the named conveniences.

use super::constants::{Service, services};
use super::transport::{SoapCall, SoapTransport};
use crate::error::{Error, RemoteFailure, Result};
use crate::value::FieldValue;
use log::debug;
use std::sync::Arc;

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn SoapTransport>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("endpoint", &self.transport.endpoint())
            .finish()
    }
}

fn unexpected(service: &Service, method: &str, msg: String) -> Error {
    Error::remote(&service.to_string(), method, RemoteFailure::Malformed(msg))
}

impl Gateway {
    pub fn new(transport: Arc<dyn SoapTransport>) -> Self {
        Self { transport }
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Invokes `method` on `service` with positional parameters.
    pub async fn invoke(
        &self,
        service: &Service,
        method: &str,
        params: Vec<FieldValue>,
    ) -> Result<Option<String>> {
        let call = SoapCall::new(service.clone(), method, params);
        self.transport.invoke(&call).await
    }

    /// Like [`invoke`](Self::invoke) but a nil answer is an error.
    pub async fn invoke_string(
        &self,
        service: &Service,
        method: &str,
        params: Vec<FieldValue>,
    ) -> Result<String> {
        self.invoke(service, method, params)
            .await?
            .ok_or_else(|| unexpected(service, method, "no value returned".to_string()))
    }

    pub async fn invoke_i64(
        &self,
        service: &Service,
        method: &str,
        params: Vec<FieldValue>,
    ) -> Result<Option<i64>> {
        match self.invoke(service, method, params).await? {
            None => Ok(None),
            Some(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| unexpected(service, method, format!("expected integer, got '{}'", text))),
        }
    }

    pub async fn invoke_f64(
        &self,
        service: &Service,
        method: &str,
        params: Vec<FieldValue>,
    ) -> Result<Option<f64>> {
        match self.invoke(service, method, params).await? {
            None => Ok(None),
            Some(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| unexpected(service, method, format!("expected number, got '{}'", text))),
        }
    }

    pub async fn invoke_bool(
        &self,
        service: &Service,
        method: &str,
        params: Vec<FieldValue>,
    ) -> Result<Option<bool>> {
        match self.invoke(service, method, params).await? {
            None => Ok(None),
            Some(text) => match text.trim() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                other => Err(unexpected(service, method, format!("expected boolean, got '{}'", other))),
            },
        }
    }

    /// Allocates the next number of the number range of `object_type`, e.g. `"Artikel"`.
    pub async fn next_number(&self, object_type: &str) -> Result<String> {
        let number = self
            .invoke_string(&services::NUMMER, "nextNumber", vec![object_type.into()])
            .await?;
        if number.trim().is_empty() {
            return Err(unexpected(
                &services::NUMMER,
                "nextNumber",
                format!("empty number for '{}'", object_type),
            ));
        }
        debug!("Allocated number {} for {}", number, object_type);
        Ok(number)
    }

    /// Lets the server add tenant and environment scoping to `sql`.
    pub async fn complete_sql(&self, sql: &str) -> Result<String> {
        let completed = self
            .invoke_string(&services::TABLE, "getCompleteSQL", vec![sql.into()])
            .await?;
        debug!("Completed SQL '{}' to '{}'", sql, completed);
        Ok(completed)
    }

    /// Sends a useXML document; the answer is the server's raw result text.
    pub async fn use_xml(&self, xml: &str) -> Result<Option<String>> {
        self.invoke(&services::XML, "useXML", vec![xml.into()]).await
    }
}
