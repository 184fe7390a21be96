use crate::mutation::Fields;
use crate::sql::normalise_field;
use crate::value::FieldValue;
use std::collections::BTreeSet;

/// Which relations of the descriptors are followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RelationFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
    Except(BTreeSet<String>),
}

impl RelationFilter {
    pub fn includes(&self, relation: &str) -> bool {
        let relation = relation.to_lowercase();
        match self {
            RelationFilter::All => true,
            RelationFilter::Only(names) => names.contains(&relation),
            RelationFilter::Except(names) => !names.contains(&relation),
        }
    }
}

/// Caller choices for one duplication.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicationPlan {
    pub overrides: Fields,
    pub relations: RelationFilter,
    pub copy_attributes: bool,
    /// Attribute keys left out, upper case.
    pub excluded_attributes: BTreeSet<String>,
}

impl Default for DuplicationPlan {
    fn default() -> Self {
        Self {
            overrides: Fields::new(),
            relations: RelationFilter::All,
            copy_attributes: true,
            excluded_attributes: BTreeSet::new(),
        }
    }
}

impl DuplicationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.overrides.insert(normalise_field(field), value.into());
        self
    }

    pub fn only_relations<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.relations = RelationFilter::Only(names.into_iter().map(str::to_lowercase).collect());
        self
    }

    /// Leaves out a relation; combines with earlier exclusions.
    pub fn exclude_relation(mut self, name: &str) -> Self {
        let name = name.to_lowercase();
        match &mut self.relations {
            RelationFilter::Except(names) => {
                names.insert(name);
            }
            RelationFilter::Only(names) => {
                names.remove(&name);
            }
            RelationFilter::All => self.relations = RelationFilter::Except(BTreeSet::from([name])),
        }
        self
    }

    pub fn without_attributes(mut self) -> Self {
        self.copy_attributes = false;
        self
    }

    pub fn exclude_attribute(mut self, key: &str) -> Self {
        self.excluded_attributes.insert(normalise_field(key));
        self
    }

    pub fn copies_attribute(&self, key: &str) -> bool {
        self.copy_attributes && !self.excluded_attributes.contains(&normalise_field(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_filters() {
        let plan = DuplicationPlan::new().exclude_relation("APLAN").exclude_relation("stuelipos");
        assert!(!plan.relations.includes("aplan"));
        assert!(!plan.relations.includes("StueliPos"));
        assert!(plan.relations.includes("stueli"));

        let plan = DuplicationPlan::new().only_relations(["stueli", "stuelipos"]).exclude_relation("stuelipos");
        assert!(plan.relations.includes("stueli"));
        assert!(!plan.relations.includes("stuelipos"));
        assert!(!plan.relations.includes("aplan"));
    }

    #[test]
    fn overrides_and_attributes_are_normalised() {
        let plan = DuplicationPlan::new().set("artikel", "A200").exclude_attribute("farbe");

        assert_eq!(plan.overrides.get("ARTIKEL"), Some(&FieldValue::from("A200")));
        assert!(!plan.copies_attribute("FARBE"));
        assert!(plan.copies_attribute("GEWICHT"));
        assert!(!plan.clone().without_attributes().copies_attribute("GEWICHT"));
    }
}
