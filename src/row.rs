//! Query result rows.

use std::rc::Rc;

use crate::protocol::backend::RowDescription;
use crate::value::Value;

/// One result row, with marshaled values keyed by the result set's
/// column descriptors.
///
/// Rows of the same result set share one [`RowDescription`].
#[derive(Debug, Clone)]
pub struct Row {
    desc: Rc<RowDescription>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(desc: Rc<RowDescription>, values: Vec<Value>) -> Self {
        Self { desc, values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value by column name. The first matching column wins when
    /// the result set repeats a name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.desc.fields.iter().position(|f| f.name == name)?;
        self.values.get(idx)
    }

    /// Look up a value by column position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Column names in declared order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.desc.fields.iter().map(|f| f.name.as_str())
    }

    /// Iterate `(column name, value)` pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns().zip(self.values.iter())
    }

    /// Values in declared order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
