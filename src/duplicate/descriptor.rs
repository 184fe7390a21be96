//! Business object descriptors: which table, which fields, which dependents

use crate::sql::normalise_field;
use std::collections::{BTreeMap, BTreeSet};

/// How the copyable fields of a table are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// `<duplicate>` property list of the server's XML definition, falling
    /// back to all non-computed columns.
    FromServer,
    Include(BTreeSet<String>),
    /// All non-computed columns except these.
    Exclude(BTreeSet<String>),
}

impl FieldSelection {
    pub fn include<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        FieldSelection::Include(fields.into_iter().map(normalise_field).collect())
    }

    pub fn exclude<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        FieldSelection::Exclude(fields.into_iter().map(normalise_field).collect())
    }
}

/// Parent field to child field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldLink {
    pub parent: String,
    pub child: String,
}

impl FieldLink {
    pub fn new(parent: &str, child: &str) -> Self {
        Self {
            parent: normalise_field(parent),
            child: normalise_field(child),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    /// Descriptor type of the dependent records.
    pub child: String,
    pub links: Vec<FieldLink>,
}

/// Schema-less attribute values stored in a side table and keyed by the
/// owner's GUID.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DynamicAttributes {
    pub table: String,
    /// Owner field selecting the attribute class.
    pub class_field: String,
    /// Table listing the attribute keys of each class.
    pub class_table: String,
    pub owner_field: String,
    pub instance_field: String,
    pub owner_table_field: String,
    pub key_field: String,
    pub value_field: String,
}

impl DynamicAttributes {
    /// APplus "Sachgruppen" values.
    pub fn sachwert() -> Self {
        Self {
            table: "SACHWERT".to_string(),
            class_field: "SACHGRUPPENKLASSE".to_string(),
            class_table: "SACHGRUPPENKLASSEPOS".to_string(),
            owner_field: "GUID".to_string(),
            instance_field: "INSTANZGUID".to_string(),
            owner_table_field: "TABELLE".to_string(),
            key_field: "SACHGRUPPE".to_string(),
            value_field: "WERT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessObjectDescriptor {
    pub object_type: String,
    pub table: String,
    /// Business key, e.g. `ARTIKEL`. Records are looked up by `ID` without one.
    pub key_field: Option<String>,
    /// Number range used to allocate a new key when none is given.
    pub number_object: Option<String>,
    pub fields: FieldSelection,
    pub relations: Vec<Relation>,
    pub attributes: Option<DynamicAttributes>,
    /// Update an existing record (found by unique index) instead of failing.
    pub allow_update: bool,
}

impl BusinessObjectDescriptor {
    pub fn new(object_type: &str, table: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            table: normalise_field(table),
            key_field: None,
            number_object: None,
            fields: FieldSelection::FromServer,
            relations: Vec::new(),
            attributes: None,
            allow_update: false,
        }
    }

    pub fn key(mut self, field: &str) -> Self {
        self.key_field = Some(normalise_field(field));
        self
    }

    pub fn numbered_by(mut self, number_object: &str) -> Self {
        self.number_object = Some(number_object.to_string());
        self
    }

    pub fn fields(mut self, selection: FieldSelection) -> Self {
        self.fields = selection;
        self
    }

    pub fn relation(mut self, name: &str, child: &str, links: &[(&str, &str)]) -> Self {
        self.relations.push(Relation {
            name: name.to_string(),
            child: child.to_string(),
            links: links.iter().map(|(p, c)| FieldLink::new(p, c)).collect(),
        });
        self
    }

    pub fn attributes(mut self, attributes: DynamicAttributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn allow_update(mut self) -> Self {
        self.allow_update = true;
        self
    }

    /// Field identifying a source record: the business key, else `ID`.
    pub fn lookup_field(&self) -> &str {
        self.key_field.as_deref().unwrap_or("ID")
    }
}

/// Descriptors by case-insensitive type name.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<String, BusinessObjectDescriptor>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Article with its work plan and bill of materials.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            BusinessObjectDescriptor::new("Artikel", "ARTIKEL")
                .key("ARTIKEL")
                .numbered_by("Artikel")
                .attributes(DynamicAttributes::sachwert())
                .relation("aplan", "Aplan", &[("ARTIKEL", "APLAN")])
                .relation("stueli", "Stueli", &[("ARTIKEL", "STUELI")]),
        );
        registry.register(
            BusinessObjectDescriptor::new("Aplan", "APLAN")
                .key("APLAN")
                .relation("aplanpos", "AplanPos", &[("APLAN", "APLAN")]),
        );
        registry.register(BusinessObjectDescriptor::new("AplanPos", "APLANPOS"));
        registry.register(
            BusinessObjectDescriptor::new("Stueli", "STUELI")
                .key("STUELI")
                .relation("stuelipos", "StueliPos", &[("STUELI", "STUELI")]),
        );
        registry.register(BusinessObjectDescriptor::new("StueliPos", "STUELIPOS"));
        registry
    }

    /// Adds or replaces a descriptor.
    pub fn register(&mut self, descriptor: BusinessObjectDescriptor) {
        self.descriptors
            .insert(descriptor.object_type.to_lowercase(), descriptor);
    }

    pub fn get(&self, object_type: &str) -> Option<&BusinessObjectDescriptor> {
        self.descriptors.get(&object_type.to_lowercase())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.values().map(|d| d.object_type.as_str())
    }
}
