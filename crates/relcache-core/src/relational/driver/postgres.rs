//! PostgreSQL connection (postgres crate, synchronous client).

use super::{CursorMode, DbConnection, FetchSize, Record};
use crate::error::{CacheError, Result};
use crate::relational::builder::ParamStyle;
use crate::relational::operation::{Operation, Parameters};
use crate::value::Value;
use bytes::BytesMut;
use postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use postgres::{Client, NoTls, Row, Statement};
use std::collections::HashMap;
use std::error::Error;
use tracing::debug;

type BoxError = Box<dyn Error + Sync + Send>;

const TEXT_TYPES: [Type; 4] = [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME];
const INTEGER_TYPES: [Type; 4] = [Type::INT2, Type::INT4, Type::INT8, Type::OID];
const FLOAT_TYPES: [Type; 2] = [Type::FLOAT4, Type::FLOAT8];

/// Domains resolve to their base type.
fn base_type(ty: &Type) -> &Type {
    match ty.kind() {
        Kind::Domain(inner) => base_type(inner),
        _ => ty,
    }
}

/// Column types a [`Value`] is encoded to and decoded from.
fn is_supported(ty: &Type) -> bool {
    let ty = base_type(ty);
    TEXT_TYPES.contains(ty)
        || INTEGER_TYPES.contains(ty)
        || FLOAT_TYPES.contains(ty)
        || *ty == Type::BOOL
        || *ty == Type::BYTEA
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot encode {:?} as PostgreSQL type {}", value, ty).into()
}

fn integer_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::OID {
        u32::try_from(i)?.to_sql(ty, out)
    } else {
        i.to_sql(ty, out)
    }
}

fn float_to_sql(f: f64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    if *ty == Type::FLOAT4 {
        (f as f32).to_sql(ty, out)
    } else {
        f.to_sql(ty, out)
    }
}

fn parse_bool(s: &str) -> std::result::Result<bool, BoxError> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("invalid boolean: {}", s).into()),
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        let ty = base_type(ty);
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(i) => {
                if INTEGER_TYPES.contains(ty) {
                    integer_to_sql(*i, ty, out)
                } else if FLOAT_TYPES.contains(ty) {
                    float_to_sql(*i as f64, ty, out)
                } else if *ty == Type::BOOL {
                    (*i != 0).to_sql(ty, out)
                } else if TEXT_TYPES.contains(ty) {
                    i.to_string().as_str().to_sql(ty, out)
                } else {
                    Err(mismatch(self, ty))
                }
            }
            Value::Real(f) => {
                if FLOAT_TYPES.contains(ty) {
                    float_to_sql(*f, ty, out)
                } else if TEXT_TYPES.contains(ty) {
                    f.to_string().as_str().to_sql(ty, out)
                } else {
                    Err(mismatch(self, ty))
                }
            }
            Value::Text(s) => {
                if TEXT_TYPES.contains(ty) {
                    s.as_str().to_sql(ty, out)
                } else if INTEGER_TYPES.contains(ty) {
                    integer_to_sql(s.trim().parse::<i64>()?, ty, out)
                } else if FLOAT_TYPES.contains(ty) {
                    float_to_sql(s.trim().parse::<f64>()?, ty, out)
                } else if *ty == Type::BOOL {
                    parse_bool(s.trim())?.to_sql(ty, out)
                } else if *ty == Type::BYTEA {
                    s.as_bytes().to_sql(ty, out)
                } else {
                    Err(mismatch(self, ty))
                }
            }
            Value::Blob(b) => {
                if *ty == Type::BYTEA {
                    b.as_slice().to_sql(ty, out)
                } else if TEXT_TYPES.contains(ty) {
                    std::str::from_utf8(b)?.to_sql(ty, out)
                } else {
                    Err(mismatch(self, ty))
                }
            }
        }
    }

    fn accepts(ty: &Type) -> bool {
        is_supported(ty)
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        let ty = base_type(ty);
        if *ty == Type::BOOL {
            Ok(Value::from(bool::from_sql(ty, raw)?))
        } else if *ty == Type::INT2 {
            Ok(Value::Integer(i64::from(i16::from_sql(ty, raw)?)))
        } else if *ty == Type::INT4 {
            Ok(Value::Integer(i64::from(i32::from_sql(ty, raw)?)))
        } else if *ty == Type::INT8 {
            Ok(Value::Integer(i64::from_sql(ty, raw)?))
        } else if *ty == Type::OID {
            Ok(Value::Integer(i64::from(u32::from_sql(ty, raw)?)))
        } else if *ty == Type::FLOAT4 {
            Ok(Value::Real(f64::from(f32::from_sql(ty, raw)?)))
        } else if *ty == Type::FLOAT8 {
            Ok(Value::Real(f64::from_sql(ty, raw)?))
        } else if *ty == Type::BYTEA {
            Ok(Value::Blob(raw.to_vec()))
        } else if TEXT_TYPES.contains(ty) {
            Ok(Value::Text(<&str>::from_sql(ty, raw)?.to_string()))
        } else {
            Err(format!("unsupported PostgreSQL column type {}", ty).into())
        }
    }

    fn from_sql_null(_ty: &Type) -> std::result::Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(ty: &Type) -> bool {
        is_supported(ty)
    }
}

/// A PostgreSQL server connection.
///
/// The shared cursor keeps prepared statements by SQL text; a fresh cursor
/// prepares a statement for a single execution.
pub struct PostgresConnection {
    client: Client,
    statements: HashMap<String, Statement>,
}

impl PostgresConnection {
    /// Connect with a libpq-style URL or key/value string.
    pub fn connect(params: &str) -> Result<Self> {
        let client = Client::connect(params, NoTls)?;
        debug!("Connected to PostgreSQL");
        Ok(Self {
            client,
            statements: HashMap::new(),
        })
    }

    fn statement(&mut self, sql: &str, cursor: CursorMode) -> Result<Statement> {
        if cursor == CursorMode::Fresh {
            return Ok(self.client.prepare(sql)?);
        }
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt.clone());
        }
        let stmt = self.client.prepare(sql)?;
        self.statements.insert(sql.to_string(), stmt.clone());
        Ok(stmt)
    }
}

fn record(row: &Row) -> Result<Record> {
    (0..row.len())
        .map(|i| row.try_get::<_, Value>(i).map_err(Into::into))
        .collect()
}

impl DbConnection for PostgresConnection {
    fn backend(&self) -> &'static str {
        "postgresql"
    }

    fn supports_param_style(&self, style: ParamStyle) -> bool {
        style == ParamStyle::Dollar
    }

    fn execute(
        &mut self,
        op: &Operation,
        cursor: CursorMode,
        fetch: FetchSize,
    ) -> Result<Vec<Record>> {
        let values = match &op.parameters {
            Parameters::Positional(values) => values.as_slice(),
            Parameters::Named(_) => {
                return Err(CacheError::UnsupportedParamStyle {
                    style: "named parameters for postgresql".to_string(),
                })
            }
        };
        let params: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let stmt = self.statement(&op.statement, cursor)?;
        if stmt.columns().is_empty() {
            self.client.execute(&stmt, &params)?;
            return Ok(Vec::new());
        }

        let rows = self.client.query(&stmt, &params)?;
        let mut records = Vec::new();
        for row in &rows {
            if !fetch.wants_more(records.len()) {
                break;
            }
            records.push(record(row)?);
        }
        Ok(records)
    }

    /// Runs each `;`-separated piece on its own; batched DDL is otherwise
    /// dropped by the server.
    fn execute_many(&mut self, op: &Operation) -> Result<()> {
        op.ensure_unbound()?;
        for statement in op.split_statements() {
            self.client.execute(statement, &[])?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        // The client runs every statement outside an explicit transaction.
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.client.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, ty: &Type) -> std::result::Result<Vec<u8>, BoxError> {
        let mut out = BytesMut::new();
        value.to_sql_checked(ty, &mut out)?;
        Ok(out.to_vec())
    }

    #[test]
    fn test_accepts_supported_types_only() {
        for ty in [
            Type::INT2,
            Type::INT4,
            Type::INT8,
            Type::OID,
            Type::FLOAT4,
            Type::FLOAT8,
            Type::BOOL,
            Type::TEXT,
            Type::VARCHAR,
            Type::BPCHAR,
            Type::NAME,
            Type::BYTEA,
        ] {
            assert!(<Value as ToSql>::accepts(&ty), "{}", ty);
            assert!(<Value as FromSql>::accepts(&ty), "{}", ty);
        }
        for ty in [Type::NUMERIC, Type::TIMESTAMP, Type::UUID, Type::JSONB] {
            assert!(!<Value as ToSql>::accepts(&ty), "{}", ty);
            assert!(!<Value as FromSql>::accepts(&ty), "{}", ty);
        }
    }

    #[test]
    fn test_unsupported_type_is_wrong_type_error() {
        let err = encode(&Value::Real(1.5), &Type::NUMERIC).unwrap_err();
        assert!(err.is::<postgres::types::WrongType>());
        assert!(encode(&Value::from("2024-01-01"), &Type::TIMESTAMP).is_err());
    }

    #[test]
    fn test_encode_binary_formats() {
        assert_eq!(encode(&Value::Integer(7), &Type::INT4).unwrap(), vec![0, 0, 0, 7]);
        assert_eq!(encode(&Value::Integer(7), &Type::INT2).unwrap(), vec![0, 7]);
        assert_eq!(
            encode(&Value::Integer(7), &Type::FLOAT8).unwrap(),
            7.0f64.to_be_bytes().to_vec()
        );
        assert_eq!(encode(&Value::from("42"), &Type::INT8).unwrap(), 42i64.to_be_bytes().to_vec());
        assert_eq!(encode(&Value::from("true"), &Type::BOOL).unwrap(), vec![1]);
        assert_eq!(encode(&Value::Integer(5), &Type::TEXT).unwrap(), b"5".to_vec());
        assert_eq!(encode(&Value::Blob(vec![1, 2]), &Type::BYTEA).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_encode_mismatches() {
        assert!(encode(&Value::Integer(70_000), &Type::INT2).is_err());
        assert!(encode(&Value::from("abc"), &Type::INT4).is_err());
        assert!(encode(&Value::from("maybe"), &Type::BOOL).is_err());
        assert!(encode(&Value::Real(1.5), &Type::INT4).is_err());
        assert!(encode(&Value::Blob(vec![0xff]), &Type::TEXT).is_err());
    }

    #[test]
    fn test_decode_binary_formats() {
        assert_eq!(Value::from_sql(&Type::INT4, &[0, 0, 0, 7]).unwrap(), Value::Integer(7));
        assert_eq!(Value::from_sql(&Type::BOOL, &[1]).unwrap(), Value::Integer(1));
        assert_eq!(
            Value::from_sql(&Type::FLOAT8, &2.5f64.to_be_bytes()).unwrap(),
            Value::Real(2.5)
        );
        assert_eq!(Value::from_sql(&Type::TEXT, b"jii").unwrap(), Value::from("jii"));
        assert_eq!(Value::from_sql(&Type::BYTEA, &[1, 2]).unwrap(), Value::Blob(vec![1, 2]));
        assert!(Value::from_sql(&Type::NUMERIC, &[0, 1]).is_err());
        assert_eq!(Value::from_sql_null(&Type::INT4).unwrap(), Value::Null);
    }
}
