//! Offset/limit pagination for query builders.

use sqlx::{Database, QueryBuilder};

use crate::models::Backend;

/// Offset/limit pair derived from a half-open row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    /// Builds the page for rows `[start, end)`.
    ///
    /// `end < start` is not rejected: the difference wraps and is read back as
    /// a signed value, giving a negative limit whose meaning is up to the
    /// backend (SQLite treats it as "no limit").
    pub fn from_range(start: u64, end: u64) -> Self {
        Self {
            offset: start as i64,
            limit: end.wrapping_sub(start) as i64,
        }
    }

    /// Renders the clause for `backend`, with a leading space.
    ///
    /// SQL Server's `OFFSET .. FETCH` form is only valid after an `ORDER BY`.
    pub fn sql_clause(&self, backend: Backend) -> String {
        match backend {
            Backend::SqlServer => format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                self.offset, self.limit
            ),
            _ => format!(" LIMIT {} OFFSET {}", self.limit, self.offset),
        }
    }
}

/// Scopes a query to a row range without executing it.
pub trait Paginate {
    fn paginate(&mut self, start: u64, end: u64) -> &mut Self;
}

impl<'args, DB: Database> Paginate for QueryBuilder<'args, DB> {
    fn paginate(&mut self, start: u64, end: u64) -> &mut Self {
        let page = Page::from_range(start, end);
        self.push(" LIMIT ")
            .push(page.limit)
            .push(" OFFSET ")
            .push(page.offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Sqlite;

    #[test]
    fn test_page_from_range() {
        assert_eq!(Page::from_range(0, 10), Page { offset: 0, limit: 10 });
        assert_eq!(Page::from_range(20, 45), Page { offset: 20, limit: 25 });
        assert_eq!(Page::from_range(7, 7), Page { offset: 7, limit: 0 });
    }

    #[test]
    fn test_reversed_range_gives_negative_limit() {
        assert_eq!(Page::from_range(10, 4).limit, -6);
    }

    #[test]
    fn test_sql_clause_per_dialect() {
        let page = Page::from_range(40, 60);
        assert_eq!(page.sql_clause(Backend::Postgres), " LIMIT 20 OFFSET 40");
        assert_eq!(page.sql_clause(Backend::ClickHouse), " LIMIT 20 OFFSET 40");
        assert_eq!(
            page.sql_clause(Backend::SqlServer),
            " OFFSET 40 ROWS FETCH NEXT 20 ROWS ONLY"
        );
    }

    #[test]
    fn test_paginate_query_builder() {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM users ORDER BY id");
        builder.paginate(10, 30);
        assert_eq!(builder.sql(), "SELECT id FROM users ORDER BY id LIMIT 20 OFFSET 10");
    }

    #[test]
    fn test_paginate_keeps_bound_arguments() {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE name LIKE ");
        builder.push_bind("%ann%").paginate(0, 5);
        assert_eq!(
            builder.sql(),
            "SELECT id FROM users WHERE name LIKE ? LIMIT 5 OFFSET 0"
        );
    }
}
