// Relational query handler (read-or-exec against the service's own store)

use crate::parse_payload;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};

#[derive(Debug, Deserialize)]
struct DbQueryPayload {
    query: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    return_rows: bool,
}

/// `db_query`: `{query, args?, return_rows?}`. With `return_rows` the
/// result is an array of column->value objects; otherwise the statement
/// is executed and `{"rows_affected": n}` returned.
pub struct DbQueryHandler {
    pool: PgPool,
}

impl DbQueryHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobHandler for DbQueryHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: DbQueryPayload = parse_payload("db_query", payload)?;
        if params.query.is_empty() {
            return Err(HandlerError::validation("missing 'query'"));
        }

        if params.return_rows {
            let query = bind_args(sqlx::query(&params.query), &params.args);
            let rows = query
                .fetch_all(&self.pool)
                .await
                .map_err(|e| HandlerError::upstream(format!("query failed: {e}")))?;

            let results: Vec<Value> = rows.iter().map(row_to_json).collect();
            return Ok(HandlerOutput::json(200, &Value::Array(results)));
        }

        let query = bind_args(sqlx::query(&params.query), &params.args);
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| HandlerError::upstream(format!("query failed: {e}")))?;

        Ok(HandlerOutput::json(
            200,
            &serde_json::json!({"rows_affected": result.rows_affected()}),
        ))
    }
}

/// Bind loosely-typed JSON arguments as their natural Postgres types
fn bind_args<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else {
                    query.bind(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            // Arrays and objects travel as JSONB
            other => query.bind(other),
        };
    }
    query
}

fn row_to_json(row: &PgRow) -> Value {
    let mut object = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(
            column.name().to_string(),
            column_to_json(row, index, column.type_info().name()),
        );
    }
    Value::Object(object)
}

fn column_to_json(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => get_as(row, index, Value::Bool),
        "INT2" => get_as(row, index, |v: i16| Value::from(v)),
        "INT4" => get_as(row, index, |v: i32| Value::from(v)),
        "INT8" => get_as(row, index, |v: i64| Value::from(v)),
        "FLOAT4" => get_as(row, index, |v: f32| Value::from(v)),
        "FLOAT8" => get_as(row, index, |v: f64| Value::from(v)),
        "JSON" | "JSONB" => get_as(row, index, |v: Value| v),
        "TIMESTAMPTZ" => get_as(row, index, |v: DateTime<Utc>| Value::String(v.to_rfc3339())),
        "TIMESTAMP" => get_as(row, index, |v: NaiveDateTime| Value::String(v.to_string())),
        "DATE" => get_as(row, index, |v: NaiveDate| Value::String(v.to_string())),
        // TEXT, VARCHAR, NAME, enums and everything else textual
        _ => get_as(row, index, Value::String),
    }
}

fn get_as<T>(row: &PgRow, index: usize, convert: impl Fn(T) -> Value) -> Value
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => convert(value),
        _ => Value::Null,
    }
}
