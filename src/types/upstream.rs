use std::fmt;

use parking_lot::RwLock;

use super::value::Value;

/// Read side of an upstream field, e.g. one order field of an order-management client.
pub trait FieldReader: Send + Sync + fmt::Debug {
    fn field_name(&self) -> &str;

    /// Current upstream value.
    fn read(&self) -> Value;
}

/// Change event pushed by the upstream collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Identifies the monitored entity; matches the name of its [`DataSet`](super::DataSet).
    pub subject: String,
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// In-memory upstream field.
///
/// Stands in for a venue or order-management field: the owner calls
/// [`set`](Self::set) and forwards the returned [`FieldChange`] to the engine.
#[derive(Debug)]
pub struct Field {
    subject: String,
    name: String,
    value: RwLock<Value>,
}

impl Field {
    pub fn new(subject: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            subject: subject.into(),
            name: name.into(),
            value: RwLock::new(value.into()),
        }
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Replace the value and describe the change.
    pub fn set(&self, value: impl Into<Value>) -> FieldChange {
        let new = value.into();
        let old = std::mem::replace(&mut *self.value.write(), new.clone());
        FieldChange {
            subject: self.subject.clone(),
            field: self.name.clone(),
            old,
            new,
        }
    }
}

impl FieldReader for Field {
    fn field_name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> Value {
        self.value.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_old_and_new() {
        let field = Field::new("order-7", "EMSX_FILLED", 0_i64);
        let change = field.set(60_i64);
        assert_eq!(
            change,
            FieldChange {
                subject: "order-7".into(),
                field: "EMSX_FILLED".into(),
                old: Value::Int(0),
                new: Value::Int(60),
            }
        );
        assert_eq!(field.read(), Value::Int(60));
        assert_eq!(field.subject(), "order-7");
    }
}
