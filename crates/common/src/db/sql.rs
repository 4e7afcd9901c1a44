//! Statement text for table-shaped repositories
//!
//! Every identifier is double-quoted so mixed-case columns such as
//! `"ElectCertMgNo"` keep their case, and placeholders come from a numeric
//! formatter so statements past `$9` stay correct.

use std::fmt::Write;

/// Quote an identifier, doubling embedded quotes
pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `$n`
pub fn placeholder(n: usize) -> String {
    format!("${}", n)
}

/// `"a", "b", "c"`
pub fn column_list(columns: &[&str]) -> String {
    columns.iter().map(|c| ident(c)).collect::<Vec<_>>().join(", ")
}

/// `"a" = $start AND "b" = $start+1`
pub fn equals_all(columns: &[&str], start: usize) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", ident(c), placeholder(start + i)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// How a table marks rows as deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Live {
    /// No marker; delete removes the row
    Always,
    /// `deleted_at IS NULL`; delete stamps `now()`
    DeletedAt,
    /// `<column> IS NULL`; delete stamps the current time as text
    NullText(&'static str),
    /// `<column> = ''`; delete stamps the current time as text
    EmptyText(&'static str),
}

impl Live {
    /// Predicate selecting live rows, if the table has a marker
    pub fn predicate(&self) -> Option<String> {
        match self {
            Live::Always => None,
            Live::DeletedAt => Some(format!("{} IS NULL", ident("deleted_at"))),
            Live::NullText(col) => Some(format!("{} IS NULL", ident(col))),
            Live::EmptyText(col) => Some(format!("{} = ''", ident(col))),
        }
    }

    pub fn is_soft(&self) -> bool {
        !matches!(self, Live::Always)
    }

    /// Column holding the marker
    pub fn column(&self) -> Option<&'static str> {
        match self {
            Live::Always => None,
            Live::DeletedAt => Some("deleted_at"),
            Live::NullText(col) | Live::EmptyText(col) => Some(col),
        }
    }

    /// Whether the delete statement takes a bound text stamp
    pub fn stamps_text(&self) -> bool {
        matches!(self, Live::NullText(_) | Live::EmptyText(_))
    }
}

/// Static description of one table
#[derive(Debug, Clone, Copy)]
pub struct Table {
    pub name: &'static str,
    /// Entity name used in not-found errors
    pub entity: &'static str,
    pub columns: &'static [&'static str],
    pub key: &'static [&'static str],
    pub live: Live,
    pub order_by: &'static [(&'static str, Order)],
    /// Timestamp column set to `now()` on update and soft delete
    pub updated_at: Option<&'static str>,
    /// Text columns stamped alongside the delete marker
    pub delete_stamps: &'static [&'static str],
}

impl Table {
    pub const fn new(
        name: &'static str,
        entity: &'static str,
        columns: &'static [&'static str],
        key: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            entity,
            columns,
            key,
            live: Live::Always,
            order_by: &[],
            updated_at: None,
            delete_stamps: &[],
        }
    }

    pub const fn live(self, live: Live) -> Self {
        Self { live, ..self }
    }

    pub const fn order_by(self, order_by: &'static [(&'static str, Order)]) -> Self {
        Self { order_by, ..self }
    }

    pub const fn updated_at(self, column: &'static str) -> Self {
        Self {
            updated_at: Some(column),
            ..self
        }
    }

    pub const fn delete_stamps(self, columns: &'static [&'static str]) -> Self {
        Self {
            delete_stamps: columns,
            ..self
        }
    }

    fn with_live(&self, mut predicate: String) -> String {
        if let Some(live) = self.live.predicate() {
            if predicate.is_empty() {
                predicate = live;
            } else {
                let _ = write!(predicate, " AND {}", live);
            }
        }
        predicate
    }

    fn order_clause(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let parts = self
            .order_by
            .iter()
            .map(|(col, dir)| match dir {
                Order::Asc => ident(col),
                Order::Desc => format!("{} DESC", ident(col)),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {}", parts)
    }

    /// `INSERT ... RETURNING` over every column, bound `$1..$n` in column order
    pub fn insert(&self) -> String {
        let values = (1..=self.columns.len())
            .map(placeholder)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            ident(self.name),
            column_list(self.columns),
            values,
            column_list(self.columns)
        )
    }

    /// Live row by primary key, keys bound `$1..$k`
    pub fn select_by_key(&self) -> String {
        self.select_where(self.key)
    }

    /// Live rows matching every filter column, filters bound from `$1`
    pub fn select_where(&self, filters: &[&str]) -> String {
        let predicate = self.with_live(equals_all(filters, 1));
        let mut sql = format!(
            "SELECT {} FROM {}",
            column_list(self.columns),
            ident(self.name)
        );
        if !predicate.is_empty() {
            let _ = write!(sql, " WHERE {}", predicate);
        }
        sql
    }

    /// Ordered page of live rows matching the filters; filters first, then
    /// `LIMIT` and `OFFSET`
    pub fn list_where(&self, filters: &[&str]) -> String {
        let mut sql = self.select_where(filters);
        sql.push_str(&self.order_clause());
        let _ = write!(
            sql,
            " LIMIT {} OFFSET {}",
            placeholder(filters.len() + 1),
            placeholder(filters.len() + 2)
        );
        sql
    }

    pub fn list(&self) -> String {
        self.list_where(&[])
    }

    /// Update of `set` columns on a live row; `set` bound `$1..$s`, keys after
    pub fn update(&self, set: &[&str]) -> String {
        let mut assignments = set
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", ident(c), placeholder(i + 1)))
            .collect::<Vec<_>>();
        if let Some(col) = self.updated_at {
            if !set.contains(&col) {
                assignments.push(format!("{} = now()", ident(col)));
            }
        }
        format!(
            "UPDATE {} SET {} WHERE {} RETURNING {}",
            ident(self.name),
            assignments.join(", "),
            self.with_live(equals_all(self.key, set.len() + 1)),
            column_list(self.columns)
        )
    }

    /// Delete by key. Soft tables flip the marker on live rows only, so a
    /// second delete matches nothing. Keys bound `$1..$k`, a text stamp
    /// (when the marker takes one) at `$k+1`.
    pub fn delete(&self) -> String {
        let keys = equals_all(self.key, 1);
        let stamp = placeholder(self.key.len() + 1);
        let mut assignments = match self.live {
            Live::Always => {
                return format!("DELETE FROM {} WHERE {}", ident(self.name), keys);
            }
            Live::DeletedAt => vec![format!("{} = now()", ident("deleted_at"))],
            Live::NullText(col) | Live::EmptyText(col) => {
                vec![format!("{} = {}", ident(col), stamp)]
            }
        };
        for col in self.delete_stamps {
            assignments.push(format!("{} = {}", ident(col), stamp));
        }
        if let Some(col) = self.updated_at {
            assignments.push(format!("{} = now()", ident(col)));
        }
        format!(
            "UPDATE {} SET {} WHERE {}",
            ident(self.name),
            assignments.join(", "),
            self.with_live(keys)
        )
    }

    /// Columns outside the primary key
    pub fn non_key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .copied()
            .filter(|c| !self.key.contains(c))
            .collect()
    }

    /// Columns an update may rewrite: neither key nor delete marker
    pub fn writable_columns(&self) -> Vec<&'static str> {
        let marker = self.live.column();
        self.non_key_columns()
            .into_iter()
            .filter(|c| Some(*c) != marker)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAM: Table = Table::new(
        "cam_files",
        "cam file",
        &["name", "organization_id", "date", "hour"],
        &["name", "organization_id"],
    )
    .order_by(&[("date", Order::Desc), ("hour", Order::Desc), ("name", Order::Asc)]);

    const ORGS: Table = Table::new(
        "organizations",
        "organization",
        &["id", "name", "deleted_at"],
        &["id"],
    )
    .live(Live::DeletedAt)
    .updated_at("updated_at");

    const FILES: Table = Table::new("files", "file", &["uuid", "filename", "deleted"], &["uuid"])
        .live(Live::EmptyText("deleted"));

    const INSPECTION_FILES: Table = Table::new(
        "car_inspection_files",
        "car inspection file",
        &["uuid", "type", "modified", "deleted"],
        &["uuid"],
    )
    .live(Live::NullText("deleted"))
    .delete_stamps(&["modified"]);

    #[test]
    fn test_ident_quotes() {
        assert_eq!(ident("ElectCertMgNo"), "\"ElectCertMgNo\"");
        assert_eq!(ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_placeholders_past_nine() {
        assert_eq!(placeholder(10), "$10");
        let eq = equals_all(&["a", "b", "c"], 9);
        assert_eq!(eq, "\"a\" = $9 AND \"b\" = $10 AND \"c\" = $11");
    }

    #[test]
    fn test_insert_returning() {
        assert_eq!(
            CAM.insert(),
            "INSERT INTO \"cam_files\" (\"name\", \"organization_id\", \"date\", \"hour\") \
             VALUES ($1, $2, $3, $4) RETURNING \"name\", \"organization_id\", \"date\", \"hour\""
        );
    }

    #[test]
    fn test_list_has_order_and_paging() {
        assert_eq!(
            CAM.list_where(&["organization_id"]),
            "SELECT \"name\", \"organization_id\", \"date\", \"hour\" FROM \"cam_files\" \
             WHERE \"organization_id\" = $1 ORDER BY \"date\" DESC, \"hour\" DESC, \"name\" \
             LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn test_live_predicate_on_reads() {
        assert_eq!(
            ORGS.select_by_key(),
            "SELECT \"id\", \"name\", \"deleted_at\" FROM \"organizations\" \
             WHERE \"id\" = $1 AND \"deleted_at\" IS NULL"
        );
        assert_eq!(
            FILES.list(),
            "SELECT \"uuid\", \"filename\", \"deleted\" FROM \"files\" WHERE \"deleted\" = '' \
             LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_update_binds_set_then_keys() {
        assert_eq!(
            ORGS.update(&["name"]),
            "UPDATE \"organizations\" SET \"name\" = $1, \"updated_at\" = now() \
             WHERE \"id\" = $2 AND \"deleted_at\" IS NULL \
             RETURNING \"id\", \"name\", \"deleted_at\""
        );
    }

    #[test]
    fn test_delete_shapes() {
        assert_eq!(
            CAM.delete(),
            "DELETE FROM \"cam_files\" WHERE \"name\" = $1 AND \"organization_id\" = $2"
        );
        assert_eq!(
            ORGS.delete(),
            "UPDATE \"organizations\" SET \"deleted_at\" = now(), \"updated_at\" = now() \
             WHERE \"id\" = $1 AND \"deleted_at\" IS NULL"
        );
        assert_eq!(
            INSPECTION_FILES.delete(),
            "UPDATE \"car_inspection_files\" SET \"deleted\" = $2, \"modified\" = $2 \
             WHERE \"uuid\" = $1 AND \"deleted\" IS NULL"
        );
        assert_eq!(
            FILES.delete(),
            "UPDATE \"files\" SET \"deleted\" = $2 WHERE \"uuid\" = $1 AND \"deleted\" = ''"
        );
    }

    #[test]
    fn test_non_key_columns() {
        assert_eq!(ORGS.non_key_columns(), vec!["name", "deleted_at"]);
    }

    #[test]
    fn test_writable_columns_skip_marker() {
        assert_eq!(ORGS.writable_columns(), vec!["name"]);
        assert_eq!(FILES.writable_columns(), vec!["filename"]);
        assert_eq!(
            INSPECTION_FILES.writable_columns(),
            vec!["type", "modified"]
        );
        assert_eq!(CAM.writable_columns(), vec!["date", "hour"]);
    }
}
