use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{compare_fields, values_equal, Document, FieldRef};

/// Predicate over documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every document.
    #[default]
    All,
    /// Field equals the value exactly.
    Eq(String, Value),
    /// Field is a string containing the needle, ignoring case.
    ContainsIgnoreCase(String, String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn contains_ignore_case(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::ContainsIgnoreCase(field.into(), needle.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => values_equal(&doc.get(field), value),
            Filter::ContainsIgnoreCase(field, needle) => match doc.get(field) {
                FieldRef::Value(Value::String(text)) => {
                    text.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|filter| filter.matches(doc)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub(crate) fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub(crate) fn compare(&self, a: &Document, b: &Document) -> Ordering {
        self.direction
            .apply(compare_fields(&a.get(&self.field), &b.get(&self.field)))
    }
}

/// Ordering and paging for `Collection::find`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book(title: &str, author: &str, year: i64) -> Document {
        let fields = json!({"title": title, "author": author, "publishedYear": year});
        Document::new(fields.as_object().cloned().unwrap())
    }

    #[test]
    fn contains_ignores_case() {
        let doc = book("Dune", "Frank Herbert", 1965);
        assert!(Filter::contains_ignore_case("author", "HERB").matches(&doc));
        assert!(!Filter::contains_ignore_case("author", "asimov").matches(&doc));
        assert!(!Filter::contains_ignore_case("publishedYear", "1965").matches(&doc));
    }

    #[test]
    fn and_or_compose() {
        let doc = book("Dune", "Frank Herbert", 1965);
        let filter = Filter::And(vec![
            Filter::eq("publishedYear", 1965),
            Filter::Or(vec![
                Filter::contains_ignore_case("title", "foundation"),
                Filter::contains_ignore_case("title", "dun"),
            ]),
        ]);
        assert!(filter.matches(&doc));
        assert!(!Filter::And(vec![filter, Filter::eq("publishedYear", 1966)]).matches(&doc));
    }

    #[test]
    fn eq_on_missing_field_does_not_match() {
        let doc = book("Dune", "Frank Herbert", 1965);
        assert!(!Filter::eq("genre", "SciFi").matches(&doc));
        assert!(Filter::All.matches(&doc));
    }

    #[test]
    fn sort_direction_reverses() {
        let old = book("Dune", "Frank Herbert", 1965);
        let new = book("Hyperion", "Dan Simmons", 1989);
        let sort = Sort::new("publishedYear", SortDirection::Descending);
        assert_eq!(sort.compare(&old, &new), Ordering::Greater);
    }
}
