use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Record IDs grouped by (upper-case) table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbTableIds {
    data: BTreeMap<String, BTreeSet<i64>>,
}

impl DbTableIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, table: &str, id: i64) {
        self.data.entry(table.to_uppercase()).or_default().insert(id);
    }

    pub fn extend(&mut self, table: &str, ids: impl IntoIterator<Item = i64>) {
        self.data.entry(table.to_uppercase()).or_default().extend(ids);
    }

    pub fn table(&self, table: &str) -> BTreeSet<i64> {
        self.data.get(&table.to_uppercase()).cloned().unwrap_or_default()
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &BTreeSet<i64>)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for DbTableIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .data
            .iter()
            .map(|(table, ids)| {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                format!("{}: [{}]", table, ids.join(", "))
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_upper_case_table() {
        let mut ids = DbTableIds::new();
        ids.add("stueli", 4);
        ids.extend("STUELI", [5, 4]);
        ids.add("Artikel", 1);

        assert_eq!(ids.table("Stueli"), BTreeSet::from([4, 5]));
        assert_eq!(ids.len(), 3);
        assert_eq!(ids.to_string(), "{ARTIKEL: [1], STUELI: [4, 5]}");
        assert!(ids.table("APLAN").is_empty());
    }
}
