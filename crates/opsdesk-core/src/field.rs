//! Kind-tagged scalar values and the ordered record field map.
//!
//! `RecordFields` replaces the untyped name→value arrays the mutation
//! builders consume: every value carries its scalar kind explicitly, so the
//! adapter layer can bind each parameter with the right wire type.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Scalar kind tag. Carried by NULLs so the adapter can bind them with the
/// column's wire type; a NULL sent with a text parameter OID fails to
/// prepare against date or numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Decimal,
    Text,
    Bool,
    Date,
    Timestamp,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
        }
    }
}

/// One bindable scalar. `Null` binds as SQL NULL of the tagged kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Null(FieldKind),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Int(_) => FieldKind::Int,
            Self::Float(_) => FieldKind::Float,
            Self::Decimal(_) => FieldKind::Decimal,
            Self::Text(_) => FieldKind::Text,
            Self::Bool(_) => FieldKind::Bool,
            Self::Date(_) => FieldKind::Date,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::Null(kind) => *kind,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for FieldValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

// `None` becomes an explicit, kind-tagged SQL NULL. To omit the column
// entirely use `RecordFields::set_if_some` instead. One impl per type
// because the NULL has to remember what it binds as.
macro_rules! option_into_field_value {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(impl From<Option<$ty>> for FieldValue {
            fn from(v: Option<$ty>) -> Self {
                match v {
                    Some(inner) => inner.into(),
                    None => Self::Null($kind),
                }
            }
        })*
    };
}

option_into_field_value! {
    i64 => FieldKind::Int,
    i32 => FieldKind::Int,
    f64 => FieldKind::Float,
    Decimal => FieldKind::Decimal,
    &str => FieldKind::Text,
    String => FieldKind::Text,
    bool => FieldKind::Bool,
    NaiveDate => FieldKind::Date,
    DateTime<Utc> => FieldKind::Timestamp,
}

/// Ordered column→value map for one mutation.
///
/// Insertion order is preserved; setting a column that is already present
/// replaces the value in place without moving it.
#[derive(Debug, Clone, Default)]
pub struct RecordFields {
    fields: Vec<(String, FieldValue)>,
}

impl RecordFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column. Replacement keeps the original position.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.fields.push((column, value));
        }
        self
    }

    /// Add the column only when a value was actually supplied. This is the
    /// sparse-update entry point: absent means "leave the column alone",
    /// which is different from `set(col, None)` (write SQL NULL).
    pub fn set_if_some<V: Into<FieldValue>>(self, column: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn into_parts(self) -> Vec<(String, FieldValue)> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let fields = RecordFields::new()
            .set("title", "Intro")
            .set("call_date", NaiveDate::from_ymd_opt(2026, 8, 20).unwrap())
            .set("assigned_to", 7i64);
        let cols: Vec<&str> = fields.iter().map(|(c, _)| c).collect();
        assert_eq!(cols, vec!["title", "call_date", "assigned_to"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let fields = RecordFields::new()
            .set("a", 1i64)
            .set("b", 2i64)
            .set("a", 99i64);
        let pairs: Vec<(&str, &FieldValue)> = fields.iter().collect();
        assert_eq!(pairs[0], ("a", &FieldValue::Int(99)));
        assert_eq!(pairs[1], ("b", &FieldValue::Int(2)));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn set_if_some_skips_none() {
        let fields = RecordFields::new()
            .set("title", "x")
            .set_if_some("follow_up_date", None::<NaiveDate>);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn explicit_none_becomes_null() {
        let fields = RecordFields::new().set("follow_up_date", None::<NaiveDate>);
        let (_, value) = fields.iter().next().unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn kinds_and_labels() {
        assert_eq!(FieldValue::Int(1).kind(), FieldKind::Int);
        assert_eq!(FieldValue::Float(1.5).kind(), FieldKind::Float);
        assert_eq!(FieldValue::from("s").kind(), FieldKind::Text);
        assert_eq!(FieldValue::Decimal(Decimal::new(1250, 2)).kind().as_str(), "decimal");
    }

    #[test]
    fn null_remembers_its_bind_kind() {
        assert_eq!(FieldValue::from(None::<NaiveDate>), FieldValue::Null(FieldKind::Date));
        assert_eq!(FieldValue::from(None::<Decimal>).kind(), FieldKind::Decimal);
        assert!(FieldValue::from(None::<String>).is_null());
    }

    #[test]
    fn conversions_cover_common_inputs() {
        assert_eq!(FieldValue::from(3i32), FieldValue::Int(3));
        assert_eq!(FieldValue::from(true), FieldValue::Bool(true));
        assert_eq!(
            FieldValue::from(Some("x")),
            FieldValue::Text("x".to_string())
        );
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null(FieldKind::Int));
    }
}
