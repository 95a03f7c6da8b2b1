//! Statement assembly from raw SQL templates.
//!
//! A template is plain SQL with `{N}` (or `{}`) placeholders. With-columns assembly
//! fills `{0}` with a comma-joined list of quoted identifiers and `{1}`.. with quoted
//! literals; simple assembly fills every placeholder with a quoted literal. Literals
//! are rendered for one backend, named by a [`DatabaseType`]. Templates are trusted
//! text, arguments never are.

use std::fmt;

use crate::error::RawlError;
use crate::quoting::{quote_column, quote_literal};
use crate::types::{DatabaseType, RowValues};

mod template;

pub(crate) use template::escape_braces;
use template::Template;

/// A fully rendered statement, ready to execute.
///
/// Only [`assemble_with_columns`] and [`assemble_simple`] construct one, so every
/// dynamic fragment inside it went through identifier or literal quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledStatement {
    sql: String,
    dialect: DatabaseType,
}

impl CompiledStatement {
    /// The backend whose literal syntax this statement uses.
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.dialect
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.sql
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl AsRef<str> for CompiledStatement {
    fn as_ref(&self) -> &str {
        &self.sql
    }
}

/// Assemble a statement whose `{0}` is a column list.
///
/// Dotted columns (`alias.column`) have each segment quoted separately.
///
/// ```rust
/// use rawl::prelude::*;
///
/// let stmt = assemble_with_columns(
///     DatabaseType::Sqlite,
///     "SELECT {0} FROM rawl r WHERE r.rawl_id = {1};",
///     &["r.rawl_id", "name"],
///     &[RowValues::Int(2)],
/// )?;
/// assert_eq!(
///     stmt.as_str(),
///     r#"SELECT "r"."rawl_id", "name" FROM rawl r WHERE r.rawl_id = 2;"#
/// );
/// # Ok::<(), RawlError>(())
/// ```
///
/// # Errors
/// Returns `RawlError::TemplateError` if the template is malformed, references a
/// placeholder with no argument, or leaves the column list or an argument unused.
/// Returns `RawlError::ParameterError` if a column or value cannot be quoted.
pub fn assemble_with_columns<S: AsRef<str>>(
    dialect: DatabaseType,
    sql: &str,
    columns: &[S],
    args: &[RowValues],
) -> Result<CompiledStatement, RawlError> {
    let template = Template::parse(sql)?;
    if columns.is_empty() {
        return Err(RawlError::TemplateError(
            "column list for {0} is empty".to_string(),
        ));
    }
    check_arity(&template, 1 + args.len(), sql)?;

    let quoted_columns = columns
        .iter()
        .map(|c| quote_column(c.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fragments = Vec::with_capacity(1 + args.len());
    fragments.push(quoted_columns.join(", "));
    for arg in args {
        fragments.push(quote_literal(arg, dialect)?);
    }

    Ok(CompiledStatement {
        sql: template.render(&fragments),
        dialect,
    })
}

/// Assemble a statement whose placeholders are all literals.
///
/// ```rust
/// use rawl::prelude::*;
///
/// let stmt = assemble_simple(
///     DatabaseType::Sqlite,
///     "DELETE FROM rawl WHERE name = {0};",
///     &["it's".into()],
/// )?;
/// assert_eq!(stmt.as_str(), "DELETE FROM rawl WHERE name = 'it''s';");
/// # Ok::<(), RawlError>(())
/// ```
///
/// # Errors
/// Returns `RawlError::TemplateError` on a malformed template or placeholder/argument
/// mismatch, and `RawlError::ParameterError` if a value cannot be quoted.
pub fn assemble_simple(
    dialect: DatabaseType,
    sql: &str,
    args: &[RowValues],
) -> Result<CompiledStatement, RawlError> {
    let template = Template::parse(sql)?;
    check_arity(&template, args.len(), sql)?;

    let fragments = args
        .iter()
        .map(|arg| quote_literal(arg, dialect))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledStatement {
        sql: template.render(&fragments),
        dialect,
    })
}

fn check_arity(template: &Template, supplied: usize, sql: &str) -> Result<(), RawlError> {
    let wanted = template.arity();
    if wanted > supplied {
        return Err(RawlError::TemplateError(format!(
            "template references placeholder {{{}}} but only {supplied} value(s) were supplied: {sql}",
            wanted - 1
        )));
    }
    if let Some(unused) = (0..supplied).find(|slot| !template.references(*slot)) {
        return Err(RawlError::TemplateError(format!(
            "value for placeholder {{{unused}}} is never used: {sql}"
        )));
    }
    Ok(())
}
