//! Query and retrieve AST nodes

use crate::{BoxExpr, Expr, OptBoxExpr};

/// A query pipeline:
/// sources, lets, relationship clauses, where, return-or-aggregate, sort.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// One or more aliased sources; more than one implies a Cartesian product
    pub sources: Vec<AliasedSource>,
    /// Let bindings, evaluated per row in declaration order
    pub lets: Vec<LetBinding>,
    /// With / without semi-join clauses, applied in order
    pub relationships: Vec<RelationshipClause>,
    /// Row filter
    pub where_clause: OptBoxExpr,
    /// Exactly one of return or aggregate; absent means the bare elements
    pub selection: Option<QuerySelection>,
    /// Post-pass ordering
    pub sort: Option<SortClause>,
}

impl Query {
    /// A single-source query with no clauses
    pub fn from_source(expression: Expr, alias: impl Into<String>) -> Self {
        Self {
            sources: vec![AliasedSource {
                expression: expression.boxed(),
                alias: alias.into(),
            }],
            lets: Vec::new(),
            relationships: Vec::new(),
            where_clause: None,
            selection: None,
            sort: None,
        }
    }

    pub fn with_source(mut self, expression: Expr, alias: impl Into<String>) -> Self {
        self.sources.push(AliasedSource {
            expression: expression.boxed(),
            alias: alias.into(),
        });
        self
    }

    pub fn with_let(mut self, name: impl Into<String>, expression: Expr) -> Self {
        self.lets.push(LetBinding {
            name: name.into(),
            expression: expression.boxed(),
        });
        self
    }

    pub fn with_relationship(mut self, clause: RelationshipClause) -> Self {
        self.relationships.push(clause);
        self
    }

    pub fn with_where(mut self, condition: Expr) -> Self {
        self.where_clause = Some(condition.boxed());
        self
    }

    pub fn with_return(mut self, expression: Expr) -> Self {
        self.selection = Some(QuerySelection::Return(ReturnClause {
            expression: expression.boxed(),
            all: false,
        }));
        self
    }

    pub fn with_return_all(mut self, expression: Expr) -> Self {
        self.selection = Some(QuerySelection::Return(ReturnClause {
            expression: expression.boxed(),
            all: true,
        }));
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateClause) -> Self {
        self.selection = Some(QuerySelection::Aggregate(aggregate));
        self
    }

    pub fn with_sort(mut self, sort: SortClause) -> Self {
        self.sort = Some(sort);
        self
    }
}

/// A query source with its alias
#[derive(Debug, Clone, PartialEq)]
pub struct AliasedSource {
    pub expression: BoxExpr,
    pub alias: String,
}

/// A let binding inside a query
#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub name: String,
    pub expression: BoxExpr,
}

/// A with / without semi-join clause
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipClause {
    /// Keep rows for which some related element satisfies the condition
    With(RelatedSource),
    /// Keep rows for which no related element satisfies the condition
    Without(RelatedSource),
}

/// The related source and predicate of a with / without clause
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedSource {
    pub expression: BoxExpr,
    pub alias: String,
    pub such_that: BoxExpr,
}

/// The terminal projection of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySelection {
    Return(ReturnClause),
    Aggregate(AggregateClause),
}

/// Return clause; deduplicates unless `all` is set
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub expression: BoxExpr,
    pub all: bool,
}

/// Aggregate clause
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateClause {
    /// Accumulator identifier, bound per row
    pub identifier: String,
    /// Starting value; null when absent
    pub starting: OptBoxExpr,
    /// Accumulation body
    pub expression: BoxExpr,
    /// Deduplicate rows before accumulation
    pub distinct: bool,
}

/// Sort clause
#[derive(Debug, Clone, PartialEq)]
pub struct SortClause {
    pub items: Vec<SortByItem>,
}

impl SortClause {
    /// Sort by the items themselves in the given direction
    pub fn natural(direction: SortDirection) -> Self {
        Self {
            items: vec![SortByItem {
                key: SortKey::Natural,
                direction,
            }],
        }
    }

    /// Sort by a key expression evaluated with `$this` bound to the item
    pub fn by_expression(key: Expr, direction: SortDirection) -> Self {
        Self {
            items: vec![SortByItem {
                key: SortKey::Expression(key.boxed()),
                direction,
            }],
        }
    }
}

/// One sort key with its direction
#[derive(Debug, Clone, PartialEq)]
pub struct SortByItem {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// The key of a sort item
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Sort by the item itself
    Natural,
    /// Sort by an expression with `$this` bound to the item
    Expression(BoxExpr),
}

/// Sort direction; defaults to ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A clinical data retrieve: `[Type: codeProperty in terminology]`
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieve {
    /// Resource type to read, e.g. `Condition`
    pub data_type: String,
    /// Path to the coded element; a per-type default applies when absent
    pub code_property: Option<String>,
    /// Code filter: a valueset reference, code reference, or code list
    pub codes: OptBoxExpr,
    /// Path to the date element for range filtering
    pub date_property: Option<String>,
    /// Date interval the resource must fall inside
    pub date_range: OptBoxExpr,
}

impl Retrieve {
    /// Retrieve all resources of a type
    pub fn of_type(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            code_property: None,
            codes: None,
            date_property: None,
            date_range: None,
        }
    }

    pub fn with_code_filter(mut self, property: impl Into<String>, codes: Expr) -> Self {
        self.code_property = Some(property.into());
        self.codes = Some(codes.boxed());
        self
    }

    pub fn with_codes(mut self, codes: Expr) -> Self {
        self.codes = Some(codes.boxed());
        self
    }

    pub fn with_date_filter(mut self, property: impl Into<String>, range: Expr) -> Self {
        self.date_property = Some(property.into());
        self.date_range = Some(range.boxed());
        self
    }
}
