use std::sync::Arc;

use super::{unwrap_parenthesized, RestrictedNames, Statement};
use crate::db::Platform;
use crate::error::{Error, Result, StatementKind};

#[derive(Debug, Clone)]
enum FromClause {
    Table(String),
    Subquery { query: String, alias: String },
}

/// Builder for `SELECT`.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    platform: Platform,
    restricted: Arc<RestrictedNames>,
    distinct: bool,
    straight_join: bool,
    parenthesized: bool,
    projection: Vec<String>,
    from: Option<FromClause>,
    filters: Vec<String>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl SelectStatement {
    pub(super) fn new(platform: Platform, restricted: Arc<RestrictedNames>) -> Self {
        Self {
            platform,
            restricted,
            distinct: false,
            straight_join: false,
            parenthesized: false,
            projection: Vec::new(),
            from: None,
            filters: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Keep the written join order. Ignored by the embedded engine.
    pub fn straight_join(mut self) -> Self {
        self.straight_join = true;
        self
    }

    /// Wrap the statement in parentheses so it can be nested. The embedded
    /// engine rejects the wrapping, so it is never emitted there.
    pub fn parenthesized(mut self) -> Self {
        self.parenthesized = true;
        self
    }

    pub fn column(mut self, expression: impl Into<String>) -> Self {
        self.projection.push(expression.into());
        self
    }

    /// Projected expression with an alias; restricted aliases are rewritten.
    pub fn column_as(mut self, expression: impl Into<String>, alias: &str) -> Self {
        let alias = self.restricted.rewrite(alias);
        self.projection
            .push(format!("{} AS {}", expression.into(), alias));
        self
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(FromClause::Table(table.into()));
        self
    }

    pub fn from_subquery(mut self, query: impl Into<String>, alias: impl Into<String>) -> Self {
        self.from = Some(FromClause::Subquery {
            query: query.into(),
            alias: alias.into(),
        });
        self
    }

    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filters.push(condition.into());
        self
    }

    pub fn group_by(mut self, expression: impl Into<String>) -> Self {
        self.group_by.push(expression.into());
        self
    }

    pub fn order_by(mut self, expression: impl Into<String>) -> Self {
        self.order_by.push(expression.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<Statement> {
        if self.projection.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::malformed(
                StatementKind::Select,
                "missing projection expression",
            ));
        }

        let network = self.platform != Platform::Embedded;
        let mut parts = Vec::new();

        let mut select_clause = String::from("SELECT ");
        if self.straight_join && network {
            select_clause.push_str("STRAIGHT_JOIN ");
        }
        if self.distinct {
            select_clause.push_str("DISTINCT ");
        }
        select_clause.push_str(&self.projection.join(", "));
        parts.push(select_clause);

        match &self.from {
            Some(FromClause::Table(table)) => parts.push(format!("FROM {}", table)),
            Some(FromClause::Subquery { query, alias }) => parts.push(format!(
                "FROM ({}) {}",
                unwrap_parenthesized(query),
                alias
            )),
            None => {}
        }

        if !self.filters.is_empty() {
            let conditions: Vec<String> =
                self.filters.iter().map(|c| format!("({})", c)).collect();
            parts.push(format!("WHERE {}", conditions.join(" AND ")));
        }

        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }

        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by.join(", ")));
        }

        if let Some(limit) = self.limit {
            parts.push(format!("LIMIT {}", limit));
        }

        let sql = parts.join(" ");
        if self.parenthesized && network {
            Ok(Statement::new(format!("({})", sql)))
        } else {
            Ok(Statement::new(sql))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Platform;
    use crate::error::Error;
    use crate::statement::{RestrictedNames, StatementBuilder};

    #[test]
    fn test_simple_select() {
        let stmt = StatementBuilder::new(Platform::Network)
            .select_expr("s")
            .from("bigtable_parquet")
            .build()
            .unwrap();
        assert_eq!(stmt.as_str(), "SELECT s FROM bigtable_parquet");
    }

    #[test]
    fn test_missing_projection() {
        let err = StatementBuilder::new(Platform::Network)
            .select()
            .from("t")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MalformedStatement { .. }));
    }

    #[test]
    fn test_restricted_aliases_are_rewritten() {
        let stmt = StatementBuilder::new(Platform::Network)
            .select()
            .column_as("t1.o", "?comment")
            .column_as("t2.o", "date")
            .column_as("t3.o", "?name")
            .from("t")
            .build()
            .unwrap();
        assert_eq!(
            stmt.as_str(),
            "SELECT t1.o AS comme, t2.o AS dat, t3.o AS name FROM t"
        );
    }

    #[test]
    fn test_caller_registered_alias() {
        let mut names = RestrictedNames::new();
        names.register("location", "loc");
        let stmt = StatementBuilder::new(Platform::Network)
            .with_restricted_names(names)
            .select()
            .column_as("o", "?location")
            .build()
            .unwrap();
        assert_eq!(stmt.as_str(), "SELECT o AS loc");
    }

    #[test]
    fn test_all_clauses() {
        let stmt = StatementBuilder::new(Platform::Network)
            .select()
            .straight_join()
            .distinct()
            .column("s")
            .column("COUNT(*)")
            .from("t")
            .filter("p = 'knows'")
            .filter("o IS NOT NULL")
            .group_by("s")
            .order_by("s")
            .limit(10)
            .build()
            .unwrap();
        assert_eq!(
            stmt.as_str(),
            "SELECT STRAIGHT_JOIN DISTINCT s, COUNT(*) FROM t \
             WHERE (p = 'knows') AND (o IS NOT NULL) GROUP BY s ORDER BY s LIMIT 10"
        );
    }

    #[test]
    fn test_parenthesized_per_platform() {
        let network = StatementBuilder::new(Platform::Network)
            .select_expr("s")
            .from("t")
            .parenthesized()
            .build()
            .unwrap();
        assert_eq!(network.as_str(), "(SELECT s FROM t)");

        let embedded = StatementBuilder::new(Platform::Embedded)
            .select_expr("s")
            .from("t")
            .parenthesized()
            .straight_join()
            .build()
            .unwrap();
        assert_eq!(embedded.as_str(), "SELECT s FROM t");
    }

    #[test]
    fn test_from_subquery() {
        let stmt = StatementBuilder::new(Platform::Embedded)
            .select_expr("COUNT(*)")
            .from_subquery("(SELECT s FROM t)", "tabletemp")
            .build()
            .unwrap();
        assert_eq!(
            stmt.as_str(),
            "SELECT COUNT(*) FROM (SELECT s FROM t) tabletemp"
        );
    }

    #[test]
    fn test_builder_output_parses() {
        use sqlparser::dialect::HiveDialect;
        use sqlparser::parser::Parser;

        let stmt = StatementBuilder::new(Platform::Network)
            .select()
            .column_as("t.o", "?date")
            .from_subquery("(SELECT o FROM bigtable_parquet)", "t")
            .filter("t.o > 10")
            .limit(5)
            .build()
            .unwrap();
        let parsed = Parser::parse_sql(&HiveDialect {}, stmt.as_str()).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
