//! Output column targets
//!
//! A projection resolves a set of selectables into a map from output name to
//! expression. Resolution fails on the first duplicate output name.

use std::collections::BTreeMap;

use crate::errors::{BuildError, BuildResult};

use super::{AggregatorTarget, Expr, Field};

/// Anything usable as one or more named output columns
pub trait Selectable {
    fn columns(&self) -> Vec<(String, Expr)>;
}

impl Selectable for Field {
    fn columns(&self) -> Vec<(String, Expr)> {
        vec![(self.path().to_string(), Expr::Field(self.clone()))]
    }
}

/// Several fields selected under their own names
#[derive(Debug, Clone, PartialEq)]
pub struct Fields(Vec<Field>);

impl Fields {
    pub fn of<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields(paths.into_iter().map(Field::of).collect())
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

impl Selectable for Fields {
    fn columns(&self) -> Vec<(String, Expr)> {
        self.0.iter().flat_map(Selectable::columns).collect()
    }
}

/// `expr AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedExpr {
    expr: Expr,
    alias: String,
}

impl AliasedExpr {
    pub fn new(expr: impl Into<Expr>, alias: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            alias: alias.into(),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Selectable for AliasedExpr {
    fn columns(&self) -> Vec<(String, Expr)> {
        vec![(self.alias.clone(), self.expr.clone())]
    }
}

/// Owned selectable, so heterogeneous columns fit in one list
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    Fields(Fields),
    Aliased(AliasedExpr),
    Aggregate(AggregatorTarget),
}

impl Selectable for Selection {
    fn columns(&self) -> Vec<(String, Expr)> {
        match self {
            Selection::Field(f) => f.columns(),
            Selection::Fields(f) => f.columns(),
            Selection::Aliased(a) => a.columns(),
            Selection::Aggregate(t) => t.columns(),
        }
    }
}

impl From<&str> for Selection {
    fn from(path: &str) -> Self {
        Selection::Field(Field::of(path))
    }
}

impl From<String> for Selection {
    fn from(path: String) -> Self {
        Selection::Field(Field::of(path))
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

impl From<Fields> for Selection {
    fn from(fields: Fields) -> Self {
        Selection::Fields(fields)
    }
}

impl From<AliasedExpr> for Selection {
    fn from(aliased: AliasedExpr) -> Self {
        Selection::Aliased(aliased)
    }
}

impl From<AggregatorTarget> for Selection {
    fn from(target: AggregatorTarget) -> Self {
        Selection::Aggregate(target)
    }
}

/// Builds the output-name map, rejecting duplicate names
pub fn resolve_selectables<I, S>(items: I) -> BuildResult<BTreeMap<String, Expr>>
where
    I: IntoIterator<Item = S>,
    S: Selectable,
{
    let mut out = BTreeMap::new();
    for item in items {
        for (name, expr) in item.columns() {
            if name.is_empty() {
                return Err(BuildError::invalid_argument("output field name must not be empty"));
            }
            if out.contains_key(&name) {
                return Err(BuildError::duplicate_field(name));
            }
            out.insert(name, expr);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BuildErrorCode;
    use crate::expr::{sum, ExprMethods};

    #[test]
    fn test_shorthand_maps_name_to_field() {
        let map = resolve_selectables([Selection::from("name"), Selection::from("city")]).unwrap();
        assert_eq!(map.get("name"), Some(&Expr::field("name")));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_duplicate_output_name_rejected() {
        let err = resolve_selectables([
            Selection::from("total"),
            Selection::from(Expr::field("price").alias("total")),
        ])
        .unwrap_err();
        assert_eq!(err.code(), BuildErrorCode::DuplicateField);
    }

    #[test]
    fn test_fields_expand() {
        let map = resolve_selectables([Fields::of(["a", "b.c"])]).unwrap();
        assert!(map.contains_key("b.c"));
    }

    #[test]
    fn test_aggregate_target_column() {
        let map = resolve_selectables([Selection::from(sum("price").alias("revenue"))]).unwrap();
        assert!(matches!(map.get("revenue"), Some(Expr::Aggregate(_))));
    }
}
