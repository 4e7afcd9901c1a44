//! Positional statement parameters

use crate::errors::{AppError, Result};
use sqlx::error::BoxDynError;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, Encode, Postgres, Type};

/// Ordered parameter list for one statement.
///
/// Values are encoded as they are bound. An encode failure is held back and
/// reported when the statement is about to run, so call sites can keep the
/// builder chain.
#[derive(Default)]
pub struct Params {
    args: PgArguments,
    len: usize,
    error: Option<BoxDynError>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `value` as the next `$n`
    pub fn bind<T>(mut self, value: T) -> Self
    where
        T: 'static + Encode<'static, Postgres> + Type<Postgres> + Send,
    {
        self.push(value);
        self
    }

    /// Append in place
    pub fn push<T>(&mut self, value: T)
    where
        T: 'static + Encode<'static, Postgres> + Type<Postgres> + Send,
    {
        if self.error.is_some() {
            return;
        }
        match <PgArguments as Arguments<'static>>::add(&mut self.args, value) {
            Ok(()) => self.len += 1,
            Err(e) => self.error = Some(e),
        }
    }

    /// Record a failure found while building the list
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        if self.error.is_none() {
            let message: String = message.into();
            self.error = Some(message.into());
        }
        self
    }

    /// Number of parameters bound so far
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consume into driver arguments
    pub fn into_arguments(self) -> Result<PgArguments> {
        match self.error {
            Some(e) => Err(AppError::InvalidInput {
                message: format!("cannot encode statement parameter: {}", e),
                constraint: None,
            }),
            None => Ok(self.args),
        }
    }
}

impl std::fmt::Debug for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Params")
            .field("len", &self.len)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}
