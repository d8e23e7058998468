//! One row of raw, unaligned input

use crate::types::frame::{Frame, Value};

/// Split a `KEY=VALUE` override into a trimmed, non-empty key and the raw value.
pub fn split_assignment(assignment: &str) -> Option<(&str, &str)> {
    let (name, raw) = assignment.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, raw))
}

/// Raw user input: arbitrary column names mapped to scalars, in entry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRecord {
    fields: Vec<(String, Value)>,
}

impl InputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field; an existing field with the exact same name is replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Single-row frame with one column per field.
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::with_rows(1);
        for (name, value) in &self.fields {
            // Names are unique by construction, so this never changes the row count.
            let _ = frame.push_column(name.clone(), vec![value.clone()]);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_exact_name() {
        let mut record = InputRecord::new();
        record.insert("sqft", 900.0);
        record.insert("sqft", 950.0);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("sqft"), Some(&Value::Number(950.0)));
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment(" bhk =3"), Some(("bhk", "3")));
        assert_eq!(split_assignment("Amenities=Gym,Pool"), Some(("Amenities", "Gym,Pool")));
        assert_eq!(split_assignment("ID="), Some(("ID", "")));
        assert_eq!(split_assignment("novalue"), None);
        assert_eq!(split_assignment("=3"), None);
    }

    #[test]
    fn test_to_frame_single_row() {
        let frame = InputRecord::new().with("sqft", 900.0).with("bhk", 2.0).to_frame();
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.columns(), &["sqft".to_string(), "bhk".to_string()]);
    }

    #[test]
    fn test_empty_record_is_one_row() {
        let frame = InputRecord::new().to_frame();
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.n_cols(), 0);
    }
}
