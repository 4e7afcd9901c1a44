//! Row records and their column mapping

use super::Params;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

/// A struct mapped one-to-one onto a table's columns
pub trait Record: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Column names in declaration order
    const COLUMNS: &'static [&'static str];

    /// Append the value of `column` to `params`
    fn bind_column(&self, column: &str, params: Params) -> Params;

    /// Append every column of `columns`, in order
    fn bind_columns(&self, columns: &[&str], params: Params) -> Params {
        columns
            .iter()
            .fold(params, |params, column| self.bind_column(column, params))
    }
}

/// Declare a record struct together with its column names.
///
/// ```ignore
/// record! {
///     pub struct CamFileExeStage {
///         stage: i32 => "stage",
///         organization_id: String => "organization_id",
///         name: String => "name",
///     }
/// }
/// ```
///
/// Fields decode by column name, so `COLUMNS` may be reordered freely.
macro_rules! record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty => $col:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )+
        }

        impl $crate::db::Record for $name {
            const COLUMNS: &'static [&'static str] = &[$($col),+];

            fn bind_column(
                &self,
                column: &str,
                params: $crate::db::Params,
            ) -> $crate::db::Params {
                match column {
                    $( $col => params.bind(self.$field.clone()), )+
                    other => params.fail(format!(
                        "{} has no column {:?}",
                        stringify!($name),
                        other
                    )),
                }
            }
        }

        impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for $name {
            fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
                use sqlx::Row as _;
                Ok(Self {
                    $( $field: row.try_get($col)?, )+
                })
            }
        }
    };
}

pub(crate) use record;
