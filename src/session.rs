//! Connection to one APplus system: app server, database and settings

use crate::api::{AppServerClient, Gateway, Jobs, ScriptTool, SoapTransport, SysConf};
use crate::config::Config;
use crate::db::{self, Database, QueryResult};
use crate::error::{Error, Result};
use crate::value::FieldValue;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub mod pages {
    pub const WAUFTRAG_POS: &str = "wp/wauftragPosRec.aspx";
    pub const WAUFTRAG: &str = "wp/wauftragRec.aspx";
    pub const BAUFTRAG: &str = "wp/bauftragRec.aspx";
    pub const AUFTRAG: &str = "sales/auftragRec.aspx";
    pub const VKRAHMEN: &str = "sales/vkrahmenRec.aspx";
    pub const WARENAUSGANG: &str = "sales/warenausgangRec.aspx";
}

/// Handle on one APplus system.
///
/// Nothing is contacted at construction; the app server is first hit by the
/// first remote call and the database is opened by the first query.
pub struct Session {
    config: Config,
    gateway: Gateway,
    sysconf: SysConf,
    database: OnceCell<Arc<dyn Database>>,
    tenant: OnceCell<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.gateway.endpoint())
            .field("env", &self.config.appserver.env)
            .field("user", &self.config.appserver.user)
            .finish()
    }
}

impl Session {
    pub fn connect(config: &Config) -> Result<Self> {
        let client = AppServerClient::new(config)?;
        Ok(Self::with_transport(config.clone(), Arc::new(client)))
    }

    /// Session on an existing transport; the database comes from the config.
    pub fn with_transport(config: Config, transport: Arc<dyn SoapTransport>) -> Self {
        Self::assemble(config, transport, None)
    }

    /// Session on explicit parts, e.g. a recorded transport and a staging database.
    pub fn from_parts(config: Config, transport: Arc<dyn SoapTransport>, database: Arc<dyn Database>) -> Self {
        Self::assemble(config, transport, Some(database))
    }

    fn assemble(config: Config, transport: Arc<dyn SoapTransport>, database: Option<Arc<dyn Database>>) -> Self {
        let gateway = Gateway::new(transport);
        let tenant = OnceCell::new_with(config.appserver.tenant.clone());
        Self {
            sysconf: SysConf::new(gateway.clone()),
            gateway,
            config,
            database: OnceCell::new_with(database),
            tenant,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn sysconf(&self) -> &SysConf {
        &self.sysconf
    }

    pub fn script_tool(&self) -> ScriptTool {
        ScriptTool::new(self.gateway.clone())
    }

    pub fn jobs(&self) -> Jobs {
        Jobs::new(self.gateway.clone())
    }

    pub fn environment(&self) -> &str {
        &self.config.appserver.env
    }

    pub fn user(&self) -> &str {
        &self.config.appserver.user
    }

    /// Database handle, connected on first use.
    pub async fn database(&self) -> Result<&Arc<dyn Database>> {
        self.database
            .get_or_try_init(|| async {
                debug!("Opening database {}", self.config.dbserver.describe());
                db::connect(&self.config.dbserver).await
            })
            .await
    }

    /// Configured tenant, otherwise asked from the server once.
    pub async fn tenant(&self) -> Result<&str> {
        let tenant = self
            .tenant
            .get_or_try_init(|| async { self.script_tool().tenant().await })
            .await?;
        Ok(tenant.as_str())
    }

    pub async fn next_number(&self, object_type: &str) -> Result<String> {
        self.gateway.next_number(object_type).await
    }

    pub async fn complete_sql(&self, sql: &str) -> Result<String> {
        self.gateway.complete_sql(sql).await
    }

    /// Runs `sql` after completing it on the server.
    pub async fn query(&self, sql: &str, params: &[FieldValue]) -> Result<QueryResult> {
        let completed = self.complete_sql(sql).await?;
        self.query_raw(&completed, params).await
    }

    /// Runs `sql` exactly as given.
    pub async fn query_raw(&self, sql: &str, params: &[FieldValue]) -> Result<QueryResult> {
        self.database().await?.query(sql, params).await
    }

    pub async fn query_single_row(&self, sql: &str, params: &[FieldValue]) -> Result<Option<BTreeMap<String, FieldValue>>> {
        Ok(self.query(sql, params).await?.row_map(0))
    }

    pub async fn query_single_value(&self, sql: &str, params: &[FieldValue]) -> Result<FieldValue> {
        Ok(self.query(sql, params).await?.single_value().cloned().unwrap_or_default())
    }

    /// First column of every row.
    pub async fn query_single_values(&self, sql: &str, params: &[FieldValue]) -> Result<Vec<FieldValue>> {
        Ok(self.query(sql, params).await?.first_column())
    }

    pub async fn is_table_known(&self, table: &str) -> Result<bool> {
        self.database().await?.table_exists(table).await
    }

    /// Link into the web client; `None` parameters are left out.
    pub fn web_link(&self, page: &str, params: &[(&str, Option<String>)]) -> Result<String> {
        let base = self
            .config
            .web_base_url()
            .ok_or_else(|| Error::Config("no webserver baseurl configured".to_string()))?;
        Ok(build_link(base, page, params))
    }

    pub fn web_link_wauftrag_pos(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::WAUFTRAG_POS, params)
    }

    pub fn web_link_wauftrag(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::WAUFTRAG, params)
    }

    pub fn web_link_bauftrag(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::BAUFTRAG, params)
    }

    pub fn web_link_auftrag(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::AUFTRAG, params)
    }

    pub fn web_link_vkrahmen(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::VKRAHMEN, params)
    }

    pub fn web_link_warenausgang(&self, params: &[(&str, Option<String>)]) -> Result<String> {
        self.web_link(pages::WARENAUSGANG, params)
    }

    /// Releases the database connection. The HTTP pool goes with the session.
    pub async fn close(&self) -> Result<()> {
        if let Some(database) = self.database.get() {
            database.close().await?;
        }
        Ok(())
    }
}

fn build_link(base: &str, page: &str, params: &[(&str, Option<String>)]) -> String {
    let mut url = format!("{}{}", base, page);
    let mut separator = '?';
    for (name, value) in params {
        if let Some(value) = value {
            url.push(separator);
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_skips_missing_params_and_encodes() {
        let link = build_link(
            "http://some-server/APplusProd6/",
            pages::WAUFTRAG_POS,
            &[
                ("Auftrag", Some("W 100/1".to_string())),
                ("Position", None),
                ("Bereich", Some("WP".to_string())),
            ],
        );
        assert_eq!(
            link,
            "http://some-server/APplusProd6/wp/wauftragPosRec.aspx?Auftrag=W%20100%2F1&Bereich=WP"
        );
        assert_eq!(build_link("http://x/", pages::AUFTRAG, &[]), "http://x/sales/auftragRec.aspx");
    }
}
