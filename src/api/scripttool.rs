//! ScriptTool service: server facts and business-object XML definitions.

use super::constants::services;
use super::gateway::Gateway;
use crate::error::{Error, RemoteFailure, Result};
use crate::sql::normalise_field;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ScriptTool {
    gateway: Gateway,
}

/// Property list of the `<duplicate>` element of an XML definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSpec {
    pub fields: BTreeSet<String>,
    /// `true` if `fields` are excluded from copying, `false` if only they are copied.
    pub exclude: bool,
}

impl Default for DuplicateSpec {
    fn default() -> Self {
        Self {
            fields: BTreeSet::new(),
            exclude: true,
        }
    }
}

/// The `object` node of a business-object definition (e.g. `ArtikelDefinition.xml`).
#[derive(Debug, Clone)]
pub struct XmlDefinition {
    xml: String,
}

impl XmlDefinition {
    /// Accepts a definition document only if it was really loaded from disk,
    /// which the server signals with an `md5` node next to `object`.
    pub fn from_document(xml: &str) -> Result<Option<Self>> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            Error::remote(
                &services::SCRIPT_TOOL.to_string(),
                "getXMLDefinition2",
                RemoteFailure::Malformed(e.to_string()),
            )
        })?;
        let root = doc.root_element();
        let has_md5 = root.children().any(|n| n.has_tag_name("md5"));
        let object = root.children().find(|n| n.has_tag_name("object"));

        Ok(match (has_md5, object) {
            (true, Some(object)) => Some(Self {
                xml: xml[object.range()].to_string(),
            }),
            _ => None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Reads `<duplicate type="include|exclude"><property ref="FIELD"/>...</duplicate>`.
    pub fn duplicate_spec(&self) -> DuplicateSpec {
        let Ok(doc) = roxmltree::Document::parse(&self.xml) else {
            return DuplicateSpec::default();
        };
        let Some(duplicate) = doc.root_element().children().find(|n| n.has_tag_name("duplicate")) else {
            return DuplicateSpec::default();
        };

        let exclude = duplicate
            .attribute("type")
            .map(|t| !t.eq_ignore_ascii_case("include"))
            .unwrap_or(true);
        let fields = duplicate
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "property")
            .filter_map(|n| n.attribute("ref"))
            .map(normalise_field)
            .collect();

        DuplicateSpec { fields, exclude }
    }
}

impl ScriptTool {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    async fn text(&self, method: &str) -> Result<String> {
        self.gateway
            .invoke_string(&services::SCRIPT_TOOL, method, Vec::new())
            .await
    }

    pub async fn current_date(&self) -> Result<String> {
        self.text("getCurrentDate").await
    }

    pub async fn current_time(&self) -> Result<String> {
        self.text("getCurrentTime").await
    }

    pub async fn current_date_time(&self) -> Result<String> {
        self.text("getCurrentDateTime").await
    }

    pub async fn login_name(&self) -> Result<String> {
        self.text("getLoginName").await
    }

    pub async fn user_name(&self) -> Result<String> {
        self.text("getUserName").await
    }

    pub async fn user_full_name(&self) -> Result<String> {
        self.text("getUserFullName").await
    }

    pub async fn system_name(&self) -> Result<String> {
        self.text("getSystemName").await
    }

    /// Install directory of the application server, as seen by the server.
    pub async fn install_path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.text("getInstallPath").await?))
    }

    /// `WebServer` sibling of the application server's install directory.
    pub async fn install_path_web_server(&self) -> Result<PathBuf> {
        let app = self.install_path().await?;
        let parent = app.parent().map(PathBuf::from).unwrap_or_default();
        Ok(parent.join("WebServer"))
    }

    pub async fn client_property(&self, property: &str) -> Result<Option<String>> {
        self.gateway
            .invoke(&services::SCRIPT_TOOL, "getCurrentClientProperty", vec![property.into()])
            .await
    }

    /// Tenant id ("Mandant") of the logged in environment.
    pub async fn tenant(&self) -> Result<String> {
        self.client_property("MANDANTID").await?.ok_or_else(|| {
            Error::remote(
                &services::SCRIPT_TOOL.to_string(),
                "getCurrentClientProperty",
                RemoteFailure::Malformed("no MANDANTID".to_string()),
            )
        })
    }

    pub async fn tenant_name(&self) -> Result<Option<String>> {
        self.client_property("NAME").await
    }

    pub async fn xml_definition_string(&self, object: &str, tenant: &str) -> Result<Option<String>> {
        self.gateway
            .invoke(
                &services::SCRIPT_TOOL,
                "getXMLDefinition2",
                vec![object.into(), tenant.into()],
            )
            .await
    }

    /// Definition of a business object, `None` if the server has no file for it.
    pub async fn xml_definition(&self, object: &str) -> Result<Option<XmlDefinition>> {
        match self.xml_definition_string(object, "").await? {
            Some(xml) if !xml.trim().is_empty() => XmlDefinition::from_document(&xml),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIKEL_DEF: &str = r#"<definition>
  <md5>0cc175b9c0f1b6a831c399e269772661</md5>
  <object name="Artikel">
    <duplicate type="exclude">
      <property ref="ztext"/>
      <property ref=" Lagerort "/>
    </duplicate>
  </object>
</definition>"#;

    #[test]
    fn reads_exclude_list() {
        let def = XmlDefinition::from_document(ARTIKEL_DEF).unwrap().unwrap();
        let spec = def.duplicate_spec();

        assert!(spec.exclude);
        assert_eq!(
            spec.fields.into_iter().collect::<Vec<_>>(),
            vec!["LAGERORT".to_string(), "ZTEXT".to_string()]
        );
    }

    #[test]
    fn include_type_is_case_insensitive() {
        let def = XmlDefinition {
            xml: r#"<object><duplicate type="Include"><property ref="bez"/></duplicate></object>"#.to_string(),
        };
        let spec = def.duplicate_spec();
        assert!(!spec.exclude);
        assert!(spec.fields.contains("BEZ"));
    }

    #[test]
    fn documents_without_md5_are_ignored() {
        let xml = "<definition><object name=\"Artikel\"/></definition>";
        assert!(XmlDefinition::from_document(xml).unwrap().is_none());
    }

    #[test]
    fn missing_duplicate_element_excludes_nothing() {
        let def = XmlDefinition {
            xml: "<object name=\"Stueli\"/>".to_string(),
        };
        assert_eq!(def.duplicate_spec(), DuplicateSpec::default());
    }
}
