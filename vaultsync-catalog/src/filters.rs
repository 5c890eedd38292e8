//! Query filter objects
//!
//! The remote filter language expresses disjunction only as a binary `OR`
//! nested inside a filter object, so a match against many path tokens is
//! built as a right-nested chain: the first token sits at the top and each
//! further token adds one nesting level.

use serde::Serialize;

/// Pagination and sorting envelope shared by all find-many operations.
#[derive(Debug, Clone, Serialize)]
pub struct FindFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    pub page: i32,
    /// `-1` means unbounded.
    pub per_page: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

impl FindFilter {
    /// All rows, no text query.
    pub fn unbounded() -> Self {
        Self {
            q: None,
            page: 1,
            per_page: -1,
            sort: None,
            direction: None,
        }
    }

    /// Text query over all rows.
    pub fn query(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Self::unbounded()
        }
    }
}

impl Default for FindFilter {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// String predicate with a comparison modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringCriterion {
    pub value: String,
    pub modifier: CriterionModifier,
}

impl StringCriterion {
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            modifier: CriterionModifier::Equals,
        }
    }

    pub fn includes(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            modifier: CriterionModifier::Includes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionModifier {
    Equals,
    Includes,
}

/// Path predicate over image or scene files, with optional binary `OR`
/// chaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathFilter {
    pub path: StringCriterion,
    #[serde(rename = "OR", skip_serializing_if = "Option::is_none")]
    pub or: Option<Box<PathFilter>>,
}

impl PathFilter {
    /// Match any of the given path tokens. Built iteratively from the back
    /// so the first token ends up at the top of the chain. Returns `None`
    /// for an empty token list.
    pub fn any_of<I, S>(tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut chain: Option<Box<PathFilter>> = None;
        for token in tokens.into_iter().rev() {
            chain = Some(Box::new(PathFilter {
                path: StringCriterion::includes(token),
                or: chain,
            }));
        }
        chain.map(|boxed| *boxed)
    }

    /// Path conditions in chain order.
    pub fn conditions(&self) -> Vec<&StringCriterion> {
        let mut out = vec![&self.path];
        let mut cursor = self.or.as_deref();
        while let Some(node) = cursor {
            out.push(&node.path);
            cursor = node.or.as_deref();
        }
        out
    }

    /// Number of `OR` nesting levels below this node.
    pub fn or_depth(&self) -> usize {
        self.conditions().len() - 1
    }
}

/// Predicate object for gallery queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GalleryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<StringCriterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<StringCriterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<StringCriterion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<StringCriterion>,
}

impl GalleryFilter {
    pub fn title_and_date(title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: Some(StringCriterion::equals(title)),
            date: Some(StringCriterion::equals(date)),
            ..Default::default()
        }
    }

    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(StringCriterion::equals(code)),
            ..Default::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(StringCriterion::equals(url)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_of_empty() {
        assert!(PathFilter::any_of(Vec::<String>::new()).is_none());
    }

    #[test]
    fn test_any_of_single_token_has_no_or() {
        let filter = PathFilter::any_of(["123"]).unwrap();
        assert_eq!(filter.path.value, "123");
        assert_eq!(filter.path.modifier, CriterionModifier::Includes);
        assert!(filter.or.is_none());
        assert_eq!(filter.or_depth(), 0);
    }

    // n tokens flatten to n conditions across n-1 OR levels.
    #[test]
    fn test_any_of_condition_and_nesting_counts() {
        for n in 1..=6 {
            let tokens: Vec<String> = (0..n).map(|i| format!("tok{}", i)).collect();
            let filter = PathFilter::any_of(tokens.clone()).unwrap();
            let conditions = filter.conditions();
            assert_eq!(conditions.len(), n);
            assert_eq!(filter.or_depth(), n - 1);
            let values: Vec<&str> = conditions.iter().map(|c| c.value.as_str()).collect();
            assert_eq!(values, tokens.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_path_filter_wire_shape() {
        let filter = PathFilter::any_of(["100", "101"]).unwrap();
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["path"]["value"], "100");
        assert_eq!(json["path"]["modifier"], "INCLUDES");
        assert_eq!(json["OR"]["path"]["value"], "101");
        assert!(json["OR"].get("OR").is_none());
    }

    #[test]
    fn test_find_filter_unbounded() {
        let json = serde_json::to_value(FindFilter::unbounded()).unwrap();
        assert_eq!(json["per_page"], -1);
        assert!(json.get("q").is_none());
    }

    #[test]
    fn test_gallery_filter_skips_unset() {
        let json = serde_json::to_value(GalleryFilter::code("m-9")).unwrap();
        assert_eq!(json["code"]["modifier"], "EQUALS");
        assert!(json.get("title").is_none());
        assert!(json.get("url").is_none());
    }
}
