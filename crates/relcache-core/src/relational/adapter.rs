//! Conversion between cache values and data-column values.

use crate::error::{CacheError, Result};
use crate::value::{CacheValue, Row, Value};
use serde::{Deserialize, Serialize};

/// Maps a [`CacheValue`] onto the data columns of a table and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAdapter {
    /// The value is already a column map.
    Identity,
    /// The value is a scalar bound to the only data column.
    Single,
    /// The value is a tuple bound positionally to the data columns.
    Tuple,
    /// The value is a list bound positionally to the data columns.
    List,
}

impl ValueAdapter {
    /// Adapter chosen when a table config does not name one.
    pub fn default_for(data_columns: &[String]) -> Self {
        if data_columns.len() == 1 {
            ValueAdapter::Single
        } else {
            ValueAdapter::Identity
        }
    }

    /// Check that the adapter can serve the given data columns.
    pub fn validate(&self, data_columns: &[String]) -> Result<()> {
        match self {
            ValueAdapter::Single if data_columns.len() != 1 => Err(CacheError::AdapterMismatch {
                expected: 1,
                actual: data_columns.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Turn a cache value into data-column assignments.
    ///
    /// The result holds every data column in order. The identity adapter
    /// writes NULL for columns missing from the map and keeps extra entries
    /// after them so the caller can check them against the table.
    pub fn build(&self, value: &CacheValue, data_columns: &[String]) -> Result<Row> {
        match (self, value) {
            (ValueAdapter::Identity, CacheValue::Map(map)) => {
                let mut row: Row = data_columns
                    .iter()
                    .map(|col| (col.clone(), map.get(col).cloned().unwrap_or(Value::Null)))
                    .collect();
                for (name, v) in map {
                    if !row.contains_key(name) {
                        row.insert(name.clone(), v.clone());
                    }
                }
                Ok(row)
            }
            (ValueAdapter::Single, CacheValue::Scalar(v)) => {
                self.validate(data_columns)?;
                Ok(data_columns.iter().map(|col| (col.clone(), v.clone())).collect())
            }
            (ValueAdapter::Tuple, CacheValue::Tuple(values))
            | (ValueAdapter::List, CacheValue::List(values)) => {
                if values.len() != data_columns.len() {
                    return Err(CacheError::AdapterMismatch {
                        expected: data_columns.len(),
                        actual: values.len(),
                    });
                }
                Ok(data_columns
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect())
            }
            (adapter, other) => Err(CacheError::invalid_value(format!(
                "{:?} adapter cannot store a {} value",
                adapter,
                other.kind()
            ))),
        }
    }

    /// Turn fetched data-column values back into a cache value.
    pub fn parse(&self, data_columns: &[String], values: Vec<Value>) -> Result<CacheValue> {
        if values.len() != data_columns.len() {
            return Err(CacheError::AdapterMismatch {
                expected: data_columns.len(),
                actual: values.len(),
            });
        }
        match self {
            ValueAdapter::Identity => Ok(CacheValue::Map(
                data_columns.iter().cloned().zip(values).collect(),
            )),
            ValueAdapter::Single => {
                self.validate(data_columns)?;
                Ok(CacheValue::Scalar(values.into_iter().next().unwrap_or(Value::Null)))
            }
            ValueAdapter::Tuple => Ok(CacheValue::Tuple(values)),
            ValueAdapter::List => Ok(CacheValue::List(values)),
        }
    }
}
