//! Static per-request-type field tables.
//!
//! Each request type publishes a table from field name to accessor. The
//! engine only calls through these tables; it never inspects request types.

use serde_json::Value;
use std::collections::HashMap;
use vigil_core::{FieldResolver, RequestTypeId, VigilError, VigilResult};

/// Reads one field from a request. `None` means the field was not set.
pub type FieldAccessor<R> = fn(&R) -> Option<Value>;

/// Field accessors for a single request type.
pub struct FieldTable<R> {
    fields: HashMap<&'static str, FieldAccessor<R>>,
}

impl<R> Default for FieldTable<R> {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }
}

impl<R> FieldTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, accessor: FieldAccessor<R>) -> Self {
        self.fields.insert(name, accessor);
        self
    }

    pub fn accessor(&self, name: &str) -> Option<FieldAccessor<R>> {
        self.fields.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field tables for every request type that can be field-denied.
pub struct FieldRegistry<R> {
    tables: HashMap<RequestTypeId, FieldTable<R>>,
}

impl<R> Default for FieldRegistry<R> {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }
}

impl<R> FieldRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, request_type: impl Into<RequestTypeId>, table: FieldTable<R>) -> Self {
        self.tables.insert(request_type.into(), table);
        self
    }

    pub fn table(&self, request_type: &RequestTypeId) -> Option<&FieldTable<R>> {
        self.tables.get(request_type)
    }
}

impl<R> FieldResolver<R> for FieldRegistry<R> {
    fn value_of(
        &self,
        request_type: &RequestTypeId,
        field: &str,
        request: &R,
    ) -> VigilResult<Option<Value>> {
        let accessor = self
            .tables
            .get(request_type)
            .and_then(|table| table.accessor(field))
            .ok_or_else(|| VigilError::UnknownField {
                request_type: request_type.to_string(),
                field: field.to_string(),
            })?;
        Ok(accessor(request))
    }
}

/// A resolved value counts as set unless it is absent or JSON `null`.
/// Empty strings and collections are set: they still overwrite the target.
pub fn is_set(value: &Option<Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}
