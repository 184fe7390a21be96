//! Job service and the database maintenance calls that run as jobs.

use super::constants::{RETSTRING_PREFIX, services};
use super::gateway::Gateway;
use crate::error::Result;
use crate::value::FieldValue;
use log::info;
use serde_json::json;

/// Header the DB-adjust job prints when no statement failed.
const NOTHING_FAILED: &str = "Folgende Befehle konnten nicht ausgeführt werden:\n\n";

#[derive(Debug, Clone)]
pub struct Jobs {
    gateway: Gateway,
}

fn job_param(job_id: &str) -> FieldValue {
    FieldValue::from(job_id)
}

impl Jobs {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Registers a new SOAP job and returns its id.
    pub async fn create_soap_job(&self, description: &str) -> Result<String> {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.gateway
            .invoke(
                &services::JOB,
                "create",
                vec![
                    job_param(&job_id),
                    "SOAP".into(),
                    "0".into(),
                    "about:soapcall".into(),
                    description.into(),
                ],
            )
            .await?;
        info!("Created SOAP job {} ({})", job_id, description);
        Ok(job_id)
    }

    pub async fn restart(&self, job_id: &str) -> Result<Option<String>> {
        self.gateway.invoke(&services::JOB, "restart", vec![job_param(job_id)]).await
    }

    pub async fn result_url(&self, job_id: &str) -> Result<Option<String>> {
        self.gateway.invoke(&services::JOB, "getResultURL", vec![job_param(job_id)]).await
    }

    pub async fn set_result_url(&self, job_id: &str, url: &str) -> Result<()> {
        self.gateway
            .invoke(&services::JOB, "setResultURL", vec![job_param(job_id), url.into()])
            .await?;
        Ok(())
    }

    /// Result URL with the `retstring://` prefix removed; other URLs are `None`.
    pub async fn result_url_string(&self, job_id: &str) -> Result<Option<String>> {
        Ok(strip_retstring(self.result_url(job_id).await?.as_deref()))
    }

    pub async fn result(&self, job_id: &str) -> Result<Option<String>> {
        self.gateway.invoke(&services::JOB, "getResult", vec![job_param(job_id)]).await
    }

    pub async fn set_result(&self, job_id: &str, result: &str) -> Result<()> {
        self.gateway
            .invoke(&services::JOB, "setResult", vec![job_param(job_id), result.into()])
            .await?;
        Ok(())
    }

    pub async fn info(&self, job_id: &str) -> Result<Option<String>> {
        self.gateway.invoke(&services::JOB, "getInfo", vec![job_param(job_id)]).await
    }

    pub async fn set_info(&self, job_id: &str, info: &str) -> Result<Option<bool>> {
        self.gateway
            .invoke_bool(&services::JOB, "setInfo", vec![job_param(job_id), info.into()])
            .await
    }

    pub async fn status(&self, job_id: &str) -> Result<Option<String>> {
        self.gateway.invoke(&services::JOB, "getStatus", vec![job_param(job_id)]).await
    }

    pub async fn set_position(&self, job_id: &str, position: i64, max: i64) -> Result<Option<bool>> {
        self.gateway
            .invoke_bool(
                &services::JOB,
                "setPosition",
                vec![job_param(job_id), position.into(), max.into()],
            )
            .await
    }

    pub async fn start(&self, job_id: &str) -> Result<Option<bool>> {
        self.gateway.invoke_bool(&services::JOB, "start", vec![job_param(job_id)]).await
    }

    pub async fn kill(&self, job_id: &str) -> Result<()> {
        self.gateway.invoke(&services::JOB, "kill", vec![job_param(job_id)]).await?;
        Ok(())
    }

    pub async fn finish(&self, job_id: &str, status: i64, result_url: &str) -> Result<Option<bool>> {
        self.gateway
            .invoke_bool(
                &services::JOB,
                "finish",
                vec![job_param(job_id), status.into(), result_url.into()],
            )
            .await
    }

    /// Runs a DB-adjust file. Returns the job report, empty if every statement ran.
    pub async fn update_database(&self, file: &str) -> Result<String> {
        let job_id = self.create_soap_job(&format!("run DBAnpass {}", file)).await?;
        self.gateway
            .invoke(
                &services::ADAPT_DB,
                "updateDatabase",
                vec![job_param(&job_id), "de".into(), file.into()],
            )
            .await?;

        let report = self.result_url_string(&job_id).await?.unwrap_or_else(|| "FEHLER".to_string());
        Ok(if report == NOTHING_FAILED { String::new() } else { report })
    }

    pub async fn import_udfs_and_views(
        &self,
        environment: &str,
        views: &[String],
        udfs: &[String],
    ) -> Result<String> {
        let files = import_file_list(views, udfs);
        let job_id = self.create_soap_job("importing UDFs and Views").await?;
        self.gateway
            .invoke(
                &services::ADAPT_DB,
                "importUdfsAndViews",
                vec![
                    job_param(&job_id),
                    environment.into(),
                    false.into(),
                    files.into(),
                    "de".into(),
                ],
            )
            .await?;

        Ok(self.result_url_string(&job_id).await?.unwrap_or_else(|| "FEHLER".to_string()))
    }
}

fn strip_retstring(url: Option<&str>) -> Option<String> {
    url.and_then(|u| u.strip_prefix(RETSTRING_PREFIX)).map(str::to_string)
}

/// JSON list the AdaptDB service expects: type 1 for views, 0 for UDFs.
fn import_file_list(views: &[String], udfs: &[String]) -> String {
    let files: Vec<_> = views
        .iter()
        .map(|v| json!({"type": 1, "name": v}))
        .chain(udfs.iter().map(|u| json!({"type": 0, "name": u})))
        .collect();
    serde_json::Value::Array(files).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_retstring_prefix() {
        assert_eq!(strip_retstring(Some("retstring://OK")), Some("OK".to_string()));
        assert_eq!(strip_retstring(Some("http://x/report.pdf")), None);
        assert_eq!(strip_retstring(None), None);
    }

    #[test]
    fn import_list_marks_views_and_udfs() {
        let list = import_file_list(&["V_ART".to_string()], &["F_PREIS".to_string()]);
        assert_eq!(list, r#"[{"name":"V_ART","type":1},{"name":"F_PREIS","type":0}]"#);
    }
}
