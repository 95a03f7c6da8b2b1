use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::assembly::{CompiledStatement, assemble_simple, assemble_with_columns, escape_braces};
use crate::columns::{ColumnSet, ColumnSpec, TableDescriptor};
use crate::error::RawlError;
use crate::executor::{self, ExecOptions, Executed, Target};
use crate::pool::PoolRegistry;
use crate::quoting::quote_column;
use crate::results::ResultRow;
use crate::transaction::TransactionState;
use crate::types::{DatabaseType, RowValues, TransactionStatus};

/// Data access for one table.
///
/// A model knows its table, its ordered columns and its primary key, and runs
/// statements through connections drawn from a shared [`PoolRegistry`]. Build one
/// per table and keep domain-specific queries as methods on a wrapper type:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rawl::prelude::*;
///
/// struct TheModel(Model);
///
/// impl TheModel {
///     fn get_name(&mut self, pk: i64) -> Result<Option<String>, RawlError> {
///         let rows = self.0.select(
///             "SELECT {0} FROM rawl WHERE rawl_id = {1}",
///             &["name"],
///             &[pk.into()],
///             &ExecOptions::new().columns(["name"]),
///         )?;
///         Ok(rows
///             .first()
///             .and_then(|row| row.get("name").ok())
///             .and_then(|v| v.as_text().map(str::to_owned)))
///     }
/// }
///
/// let registry = Arc::new(PoolRegistry::new(PoolConfig::default())?);
/// let model = Model::new(registry, "sqlite:///tmp/rawl.db", "rawl_id stamp name", "rawl", None)?;
/// let mut the_model = TheModel(model);
/// let _name = the_model.get_name(1)?;
/// # Ok::<(), RawlError>(())
/// ```
#[derive(Debug)]
pub struct Model {
    registry: Arc<PoolRegistry>,
    dsn: String,
    database_type: DatabaseType,
    columns: ColumnSet,
    table: TableDescriptor,
    // quoted, brace-escaped forms for embedding in templates
    table_sql: String,
    pk_sql: String,
    transaction: TransactionState,
}

impl Model {
    /// # Errors
    /// Returns `RawlError::ConfigError` for an empty column declaration, an empty
    /// table or key name, or a DSN that names no compiled-in backend, and
    /// `RawlError::ParameterError` if the table or key name cannot be quoted.
    pub fn new(
        registry: Arc<PoolRegistry>,
        dsn: impl Into<String>,
        columns: impl Into<ColumnSpec>,
        table: &str,
        pk: Option<&str>,
    ) -> Result<Self, RawlError> {
        let dsn = dsn.into();
        let database_type = DatabaseType::from_dsn(&dsn)?;
        let columns = ColumnSet::process_columns(columns.into())?;
        let table = TableDescriptor::new(table, pk, &columns)?;
        let table_sql = escape_braces(&quote_column(&table.table)?);
        let pk_sql = escape_braces(&quote_column(&table.pk)?);
        Ok(Model {
            registry,
            dsn,
            database_type,
            columns,
            table,
            table_sql,
            pk_sql,
            transaction: TransactionState::default(),
        })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table.table
    }

    #[must_use]
    pub fn pk(&self) -> &str {
        &self.table.pk
    }

    #[must_use]
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Backend named by the DSN; statements for this model are assembled for it.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    fn run(
        &mut self,
        statement: &CompiledStatement,
        opts: &ExecOptions,
    ) -> Result<Executed, RawlError> {
        if statement.database_type() != self.database_type {
            return Err(RawlError::ConfigError(format!(
                "statement was assembled for {:?} but {} uses {:?}",
                statement.database_type(),
                self.table.table,
                self.database_type
            )));
        }
        let target = Target {
            registry: &self.registry,
            dsn: &self.dsn,
            transaction: &mut self.transaction,
        };
        executor::execute(target, statement, self.columns.names(), opts)
    }

    /// Execute an already assembled statement.
    ///
    /// # Errors
    /// Returns `RawlError::ConfigError` if the statement was assembled for another
    /// backend, otherwise the pool's connectivity error or the database's error
    /// unchanged.
    pub fn execute(
        &mut self,
        statement: &CompiledStatement,
        opts: &ExecOptions,
    ) -> Result<Vec<ResultRow>, RawlError> {
        Ok(self.run(statement, opts)?.rows)
    }

    /// Simple assembly plus execution: every placeholder is a literal.
    ///
    /// # Errors
    /// Returns template and parameter errors before touching the database, then any
    /// connectivity or execution error.
    pub fn query(
        &mut self,
        template: &str,
        args: &[RowValues],
        opts: &ExecOptions,
    ) -> Result<Vec<ResultRow>, RawlError> {
        let statement = assemble_simple(self.database_type, template, args)?;
        self.execute(&statement, opts)
    }

    /// With-columns assembly plus execution.
    ///
    /// `columns` fills `{0}`. Rows are named by the model's columns, positionally,
    /// unless `opts` names other working columns.
    ///
    /// # Errors
    /// Same as [`Model::query`].
    pub fn select<S: AsRef<str>>(
        &mut self,
        template: &str,
        columns: &[S],
        args: &[RowValues],
        opts: &ExecOptions,
    ) -> Result<Vec<ResultRow>, RawlError> {
        let statement = assemble_with_columns(self.database_type, template, columns, args)?;
        self.execute(&statement, opts)
    }

    /// Insert one row and return its primary key.
    ///
    /// Every key must be one of the model's columns; an unknown key fails before any
    /// statement is sent. Values are written in column-set order. An empty map
    /// inserts a row of defaults. Returns `RowValues::Int(0)` if the database
    /// returned no key.
    ///
    /// # Errors
    /// Returns `RawlError::ValidationError` for an unknown column, otherwise any
    /// assembly, connectivity or execution error.
    pub fn insert_map<I, K, V>(&mut self, values: I, opts: &ExecOptions) -> Result<RowValues, RawlError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        let mut values: IndexMap<String, RowValues> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(unknown) = values.keys().find(|k| !self.columns.contains(k)) {
            return Err(RawlError::ValidationError(format!(
                "{unknown} is not a column of {}",
                self.table.table
            )));
        }

        let mut insert_columns = Vec::with_capacity(values.len());
        let mut args = Vec::with_capacity(values.len());
        for column in self.columns.names() {
            if let Some(value) = values.shift_remove(column) {
                insert_columns.push(column.clone());
                args.push(value);
            }
        }

        let statement = if insert_columns.is_empty() {
            assemble_simple(
                self.database_type,
                &format!(
                    "INSERT INTO {} DEFAULT VALUES RETURNING {};",
                    self.table_sql, self.pk_sql
                ),
                &[],
            )?
        } else {
            let slots: Vec<String> = (1..=args.len()).map(|i| format!("{{{i}}}")).collect();
            assemble_with_columns(
                self.database_type,
                &format!(
                    "INSERT INTO {} ({{0}}) VALUES ({}) RETURNING {};",
                    self.table_sql,
                    slots.join(", "),
                    self.pk_sql
                ),
                &insert_columns,
                &args,
            )?
        };

        let opts = opts.clone().columns([self.table.pk.clone()]);
        let executed = self.run(&statement, &opts)?;
        let pk = executed
            .rows
            .first()
            .and_then(|row| row.get_index(0).ok().cloned())
            .unwrap_or(RowValues::Int(0));
        debug!(table = %self.table.table, %pk, "inserted row");
        Ok(pk)
    }

    /// The row with primary key `pk`, if any.
    ///
    /// Text that parses as an integer is looked up as an integer.
    ///
    /// # Errors
    /// Returns any assembly, connectivity or execution error.
    pub fn get(&mut self, pk: impl Into<RowValues>) -> Result<Vec<ResultRow>, RawlError> {
        let pk = coerce_pk(pk.into());
        let statement = assemble_with_columns(
            self.database_type,
            &format!("SELECT {{0}} FROM {} WHERE {} = {{1}};", self.table_sql, self.pk_sql),
            self.columns.names(),
            &[pk],
        )?;
        self.execute(&statement, &ExecOptions::new())
    }

    /// Every row of the table.
    ///
    /// # Errors
    /// Returns any connectivity or execution error.
    pub fn all(&mut self) -> Result<Vec<ResultRow>, RawlError> {
        let statement = assemble_with_columns(
            self.database_type,
            &format!("SELECT {{0}} FROM {};", self.table_sql),
            self.columns.names(),
            &[],
        )?;
        self.execute(&statement, &ExecOptions::new())
    }

    /// Delete the row with primary key `pk`; returns the number of rows removed.
    ///
    /// # Errors
    /// Returns any connectivity or execution error.
    pub fn delete(&mut self, pk: impl Into<RowValues>) -> Result<u64, RawlError> {
        let pk = coerce_pk(pk.into());
        let statement = assemble_simple(
            self.database_type,
            &format!("DELETE FROM {} WHERE {} = {{0}};", self.table_sql, self.pk_sql),
            &[pk],
        )?;
        let executed = self.run(&statement, &ExecOptions::new())?;
        Ok(u64::try_from(executed.rowcount).unwrap_or(0))
    }

    /// Run trusted multi-statement SQL such as schema setup.
    ///
    /// Commits unless a transaction is open.
    ///
    /// # Errors
    /// Returns any connectivity or execution error.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), RawlError> {
        if let Some(tx) = self.transaction.current() {
            return tx.conn.run_batch(sql);
        }
        let mut conn = self.registry.acquire(&self.dsn, None)?;
        conn.run_batch(sql)?;
        conn.commit()
    }

    /// Hold one connection for the following statements until [`Model::commit`] or
    /// [`Model::rollback`].
    ///
    /// # Errors
    /// Returns `RawlError::TransactionError` if one is already open, or the pool's error.
    pub fn start_transaction(&mut self) -> Result<(), RawlError> {
        self.transaction.start(&self.registry, &self.dsn)
    }

    /// Commit the open transaction; logs a warning and does nothing when none is open.
    ///
    /// # Errors
    /// Returns the database's error if the commit fails.
    pub fn commit(&mut self) -> Result<(), RawlError> {
        self.transaction.commit()
    }

    /// Roll back the open transaction; logs a warning and does nothing when none is open.
    ///
    /// # Errors
    /// Returns the database's error if the rollback fails.
    pub fn rollback(&mut self) -> Result<(), RawlError> {
        self.transaction.rollback()
    }

    #[must_use]
    pub fn has_open_transaction(&self) -> bool {
        self.transaction.is_open()
    }

    #[must_use]
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction.status()
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// # Errors
    /// Returns the error from starting, from `f`, or from the commit.
    pub fn in_transaction<T, F>(&mut self, f: F) -> Result<T, RawlError>
    where
        F: FnOnce(&mut Self) -> Result<T, RawlError>,
    {
        self.start_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    debug!(error = %rollback_err, "rollback after failed transaction body");
                }
                Err(err)
            }
        }
    }
}

fn coerce_pk(pk: RowValues) -> RowValues {
    if let RowValues::Text(s) = &pk {
        if let Ok(id) = s.trim().parse::<i64>() {
            return RowValues::Int(id);
        }
    }
    pk
}
