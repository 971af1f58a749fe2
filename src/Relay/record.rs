use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// A single field value. `None` marks a missing (null) value.
pub type Field = Option<String>;

/// An ordered, immutable row of field values.
///
/// Cloning is cheap: the fields are shared, never copied.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Record {
    fields: Arc<[Field]>,
}

impl Record {
    pub fn new<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = Field>,
    {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Number of fields, nulls included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the value at `index`, or `None` if it is out of range or null.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(|field| field.as_deref())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.fields.iter().map(|field| field.as_deref())
    }
}

impl Index<usize> for Record {
    type Output = Field;

    fn index(&self, index: usize) -> &Field {
        &self.fields[index]
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|value| Some(value.into())))
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Record {
    fn from(values: [S; N]) -> Self {
        values.into_iter().collect()
    }
}

impl From<Vec<String>> for Record {
    fn from(values: Vec<String>) -> Self {
        values.into_iter().collect()
    }
}

impl From<Vec<Field>> for Record {
    fn from(fields: Vec<Field>) -> Self {
        Self::new(fields)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_are_kept_in_position() {
        let record = Record::new(vec![Some("a".to_string()), None, Some("c".to_string())]);
        assert_eq!(record.len(), 3);
        assert_eq!(record.get(0), Some("a"));
        assert_eq!(record.get(1), None);
        assert_eq!(record[1], None);
        assert_eq!(record.get(2), Some("c"));
        assert_eq!(record.get(3), None);
    }

    #[test]
    fn clones_share_fields() {
        let record = Record::from(["x", "y"]);
        let copy = record.clone();
        assert_eq!(record, copy);
        assert!(std::ptr::eq(record.fields().as_ptr(), copy.fields().as_ptr()));
        assert_eq!(format!("{:?}", copy), r#"[Some("x"), Some("y")]"#);
    }
}
