//! SysConf access with a per-session cache.

use super::constants::services;
use super::gateway::Gateway;
use crate::error::Result;
use crate::value::FieldValue;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct SysConf {
    gateway: Gateway,
    cache: Mutex<HashMap<String, FieldValue>>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Int,
    Double,
    Boolean,
}

impl Kind {
    fn method(self) -> &'static str {
        match self {
            Kind::String => "getString",
            Kind::Int => "getInt",
            Kind::Double => "getDouble",
            Kind::Boolean => "getBoolean",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Int => "int",
            Kind::Double => "double",
            Kind::Boolean => "boolean",
        }
    }
}

impl SysConf {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, key: &str) -> Option<FieldValue> {
        self.cache.lock().ok().and_then(|c| c.get(key).cloned())
    }

    fn store(&self, key: String, value: FieldValue) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, value);
        }
    }

    async fn lookup(&self, kind: Kind, module: &str, name: &str, use_cache: bool) -> Result<FieldValue> {
        let key = format!("{}/{}/{}", module, name, kind.tag());
        if use_cache {
            if let Some(value) = self.cached(&key) {
                return Ok(value);
            }
        }

        let service = &services::SYSCONF;
        let params = vec![FieldValue::from(module), FieldValue::from(name)];
        let value: FieldValue = match kind {
            Kind::String => self.gateway.invoke(service, kind.method(), params).await?.into(),
            Kind::Int => self.gateway.invoke_i64(service, kind.method(), params).await?.into(),
            Kind::Double => self.gateway.invoke_f64(service, kind.method(), params).await?.into(),
            Kind::Boolean => self.gateway.invoke_bool(service, kind.method(), params).await?.into(),
        };
        debug!("SysConf {} = {:?}", key, value);

        self.store(key, value.clone());
        Ok(value)
    }

    pub async fn get_string(&self, module: &str, name: &str) -> Result<Option<String>> {
        self.get_string_with(module, name, true).await
    }

    pub async fn get_string_with(&self, module: &str, name: &str, use_cache: bool) -> Result<Option<String>> {
        Ok(match self.lookup(Kind::String, module, name, use_cache).await? {
            FieldValue::Text(s) => Some(s),
            _ => None,
        })
    }

    pub async fn get_int(&self, module: &str, name: &str) -> Result<Option<i64>> {
        Ok(self.lookup(Kind::Int, module, name, true).await?.as_i64())
    }

    pub async fn get_double(&self, module: &str, name: &str) -> Result<Option<f64>> {
        Ok(self.lookup(Kind::Double, module, name, true).await?.as_f64())
    }

    pub async fn get_boolean(&self, module: &str, name: &str) -> Result<Option<bool>> {
        Ok(match self.lookup(Kind::Boolean, module, name, true).await? {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        })
    }

    /// Splits a string setting on `sep`; an empty or missing setting is `None`.
    pub async fn get_list(&self, module: &str, name: &str, sep: &str) -> Result<Option<Vec<String>>> {
        let value = self.get_string(module, name).await?;
        Ok(split_list(value.as_deref(), sep))
    }
}

fn split_list(value: Option<&str>, sep: &str) -> Option<Vec<String>> {
    match value {
        None | Some("") => None,
        Some(s) => Some(s.split(sep).map(str::to_string).collect()),
    }
}
