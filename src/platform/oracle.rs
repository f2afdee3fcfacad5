//! Live Oracle connection through the `oracle` crate (ODPI-C).

use oracle::sql_type::{OracleType, ToSql};

use crate::core::config::DatabaseConfig;
use crate::core::monitor::{Connection, QueryError, QueryParams, Row, SqlValue};

/// ORA codes after which the session is unusable
const CONNECTION_LOST_CODES: &[i32] = &[3113, 3114, 3135, 28, 1012, 12170, 12541];

pub struct OracleConnection {
    conn: oracle::Connection,
    target: String,
}

impl OracleConnection {
    pub fn connect(config: &DatabaseConfig) -> Result<Self, QueryError> {
        let target = config.connect_string();
        log::info!("Connecting to {} as {}", target, config.username);
        let conn = oracle::Connection::connect(&config.username, &config.password, &target)
            .map_err(classify)?;
        Ok(Self { conn, target })
    }
}

fn classify(err: oracle::Error) -> QueryError {
    let lost = err
        .db_error()
        .map(|db| CONNECTION_LOST_CODES.contains(&db.code()))
        .unwrap_or(false);
    if lost {
        QueryError::ConnectionLost(err.to_string())
    } else {
        QueryError::database(err.to_string())
    }
}

fn bind_value(value: &SqlValue) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None),
        SqlValue::Int(v) => Box::new(*v),
        SqlValue::Float(v) => Box::new(*v),
        SqlValue::Text(s) => Box::new(s.clone()),
    }
}

fn read_value(value: &oracle::SqlValue) -> Result<SqlValue, QueryError> {
    if value.is_null().map_err(classify)? {
        return Ok(SqlValue::Null);
    }
    let numeric = matches!(
        value.oracle_type().map_err(classify)?,
        OracleType::Number(_, _)
            | OracleType::Float(_)
            | OracleType::BinaryFloat
            | OracleType::BinaryDouble
            | OracleType::Int64
            | OracleType::UInt64
    );
    let text: String = value.get().map_err(classify)?;
    if numeric {
        if let Ok(v) = text.parse::<i64>() {
            return Ok(SqlValue::Int(v));
        }
        if let Ok(v) = text.parse::<f64>() {
            return Ok(SqlValue::Float(v));
        }
    }
    Ok(SqlValue::Text(text))
}

impl Connection for OracleConnection {
    fn execute(&self, sql: &str, params: &QueryParams) -> Result<Vec<Row>, QueryError> {
        let binds: Vec<(&str, Box<dyn ToSql>)> =
            params.iter().map(|(name, v)| (name, bind_value(v))).collect();
        let named: Vec<(&str, &dyn ToSql)> =
            binds.iter().map(|(name, v)| (*name, v.as_ref())).collect();

        let rows = self.conn.query_named(sql, &named).map_err(classify)?;
        let mut out = Vec::new();
        for row in rows {
            let row = row.map_err(classify)?;
            let values = row
                .sql_values()
                .iter()
                .map(read_value)
                .collect::<Result<Vec<_>, _>>()?;
            out.push(Row::new(values));
        }
        Ok(out)
    }

    fn is_alive(&self) -> bool {
        self.conn.ping().is_ok()
    }

    fn describe(&self) -> String {
        self.target.clone()
    }
}

impl Drop for OracleConnection {
    fn drop(&mut self) {
        if let Err(e) = self.conn.close() {
            log::debug!("Error closing connection to {}: {}", self.target, e);
        }
    }
}
