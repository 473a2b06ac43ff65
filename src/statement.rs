//! Server-side prepared statements.

use crate::completion::Completion;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::transport::Transport;
use crate::value::Value;

/// A statement prepared on the server with `PREPARE <name> AS ...`.
///
/// Execution goes through the same text path as `query`: an
/// `EXECUTE <name> ( ... )` statement with inline-substituted arguments,
/// not protocol-level Bind/Execute. The statement stays allocated on the
/// server for the lifetime of its session.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    name: String,
    param_count: usize,
    exec_sql: String,
}

impl PreparedStatement {
    pub(crate) fn new(name: String, param_count: usize) -> Self {
        let exec_sql = if param_count == 0 {
            format!("EXECUTE {name}")
        } else {
            let placeholders = vec!["?"; param_count].join(",");
            format!("EXECUTE {name} ( {placeholders} )")
        };
        Self {
            name,
            param_count,
            exec_sql,
        }
    }

    /// Server-side statement name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared parameters.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Execute with the given arguments on the connection that prepared it.
    ///
    /// Fails with [`Error::Argument`] when given more arguments than the
    /// statement declares; missing trailing arguments are padded with NULL.
    pub fn execute<T: Transport>(
        &self,
        conn: &mut Connection<T>,
        args: &[Value],
    ) -> Result<Completion<Vec<Row>>> {
        if args.len() > self.param_count {
            return Err(Error::Argument(format!(
                "statement {} declares {} parameters but {} arguments were supplied",
                self.name,
                self.param_count,
                args.len()
            )));
        }
        let mut padded = args.to_vec();
        padded.resize(self.param_count, Value::Null);
        conn.query_with(&self.exec_sql, &padded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_text_shape() {
        let stmt = PreparedStatement::new("abcd".into(), 3);
        assert_eq!(stmt.exec_sql, "EXECUTE abcd ( ?,?,? )");
        assert_eq!(stmt.param_count(), 3);
    }

    #[test]
    fn zero_parameters_omit_the_list() {
        let stmt = PreparedStatement::new("abcd".into(), 0);
        assert_eq!(stmt.exec_sql, "EXECUTE abcd");
    }
}
