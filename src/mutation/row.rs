//! Row documents understood by `p2core/XML.useXML`

use crate::api::constants::USEXML_DT_NS;
use crate::error::{Error, Result};
use crate::sql::normalise_field;
use crate::value::FieldValue;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCommand {
    Insert,
    Update,
    Delete,
}

impl RowCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            RowCommand::Insert => "insert",
            RowCommand::Update => "update",
            RowCommand::Delete => "delete",
        }
    }
}

impl fmt::Display for RowCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<row>` element. Fields keep insertion order; setting a field twice
/// replaces the earlier value.
#[derive(Debug, Clone, PartialEq)]
pub struct UseXmlRow {
    table: String,
    command: RowCommand,
    fields: Vec<(String, FieldValue)>,
}

impl UseXmlRow {
    pub fn new(command: RowCommand, table: &str) -> Self {
        Self {
            table: table.to_string(),
            command,
            fields: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn command(&self) -> RowCommand {
        self.command
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> &mut Self {
        let name = normalise_field(name);
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        let name = normalise_field(name);
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn to_xml(&self) -> Result<String> {
        self.write_xml().map_err(|e| Error::Validation {
            table: self.table.clone(),
            message: format!("cannot encode row: {}", e),
        })
    }

    fn write_xml(&self) -> std::result::Result<String, Box<dyn std::error::Error>> {
        let mut writer = Writer::new(Vec::new());

        let mut row = BytesStart::new("row");
        row.push_attribute(("cmd", self.command.as_str()));
        row.push_attribute(("table", self.table.as_str()));
        row.push_attribute(("xmlns:dt", USEXML_DT_NS));
        writer.write_event(Event::Start(row))?;

        for (name, value) in &self.fields {
            if value.is_null() {
                writer.write_event(Event::Empty(BytesStart::new(name.as_str())))?;
                continue;
            }
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            let text = value.to_xml_text();
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        }

        writer.write_event(Event::End(BytesEnd::new("row")))?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}
