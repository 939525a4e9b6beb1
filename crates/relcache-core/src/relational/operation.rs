//! SQL operation descriptors.

use crate::error::{CacheError, Result};
use crate::value::Value;
use indexmap::IndexMap;

/// Bound parameters of an operation.
///
/// The shape follows the parameter style of the builder that produced it:
/// positional styles pack an ordered list, named styles a name map.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters {
    Positional(Vec<Value>),
    Named(IndexMap<String, Value>),
}

impl Parameters {
    pub fn len(&self) -> usize {
        match self {
            Parameters::Positional(values) => values.len(),
            Parameters::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::Positional(Vec::new())
    }
}

/// One SQL statement (or a `;`-separated batch) with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub statement: String,
    pub parameters: Parameters,
    /// The statement holds several statements and must go through
    /// batch execution instead of a single bound execution.
    pub many: bool,
}

impl Operation {
    /// A single statement without parameters.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Parameters::default(),
            many: false,
        }
    }

    pub fn with_parameters(statement: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            statement: statement.into(),
            parameters,
            many: false,
        }
    }

    /// A `;`-separated batch without parameters.
    pub fn batch(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Parameters::default(),
            many: true,
        }
    }

    /// Batches cannot carry bindings once they are split into statements.
    pub fn ensure_unbound(&self) -> Result<()> {
        if self.parameters.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Config {
                message: format!(
                    "batch operation carries {} parameter(s); batches must be unbound",
                    self.parameters.len()
                ),
            })
        }
    }

    /// Split a batch into its statements.
    ///
    /// Splits on every `;`, so a statement containing a quoted semicolon
    /// is cut in two. Empty pieces are dropped.
    pub fn split_statements(&self) -> Vec<&str> {
        self.statement
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<&str> for Operation {
    fn from(statement: &str) -> Self {
        Operation::new(statement)
    }
}
