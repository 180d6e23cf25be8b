use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use vigil_core::{ApiRequest, FieldResolver, RequestTypeId, VigilError, VigilResult};

use crate::error::{RootError, RootResult};

// ---------------------------------------------------------------------------
// Request type metadata
// ---------------------------------------------------------------------------

/// One `[[request_types]]` entry: the operation name, its exemption flag and
/// the fields a field-scoped deny may name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTypeConfig {
    pub name: String,

    #[serde(default)]
    pub exempt: bool,

    #[serde(default)]
    pub fields: Vec<String>,
}

impl RequestTypeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exempt: false,
            fields: Vec::new(),
        }
    }

    pub fn exempt(mut self) -> Self {
        self.exempt = true;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

// ---------------------------------------------------------------------------
// DynamicRequest: a request read from JSON
// ---------------------------------------------------------------------------

/// JSON form of a request: `{"type": "UpdateVmMsg", "fields": {"name": "web-1"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFixture {
    #[serde(rename = "type")]
    pub request_type: String,

    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A request whose metadata comes from the catalog rather than a Rust type.
#[derive(Debug, Clone)]
pub struct DynamicRequest {
    request_type: RequestTypeId,
    exempt: bool,
    fields: Map<String, Value>,
}

impl DynamicRequest {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl ApiRequest for DynamicRequest {
    fn request_type(&self) -> &RequestTypeId {
        &self.request_type
    }

    fn is_exempt(&self) -> bool {
        self.exempt
    }
}

// ---------------------------------------------------------------------------
// RequestCatalog
// ---------------------------------------------------------------------------

/// The request types known to this deployment.
///
/// The catalog is the field table for dynamic requests: a field is
/// resolvable only if its request type declares it.
#[derive(Debug, Clone, Default)]
pub struct RequestCatalog {
    types: HashMap<RequestTypeId, RequestTypeConfig>,
}

impl RequestCatalog {
    pub fn from_config(entries: &[RequestTypeConfig]) -> RootResult<Self> {
        let mut types = HashMap::with_capacity(entries.len());
        for entry in entries {
            let id = RequestTypeId::new(entry.name.as_str());
            if types.insert(id, entry.clone()).is_some() {
                return Err(RootError::Config(format!(
                    "request type '{}' declared more than once",
                    entry.name
                )));
            }
        }
        Ok(Self { types })
    }

    pub fn get(&self, request_type: &RequestTypeId) -> Option<&RequestTypeConfig> {
        self.types.get(request_type)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build a request from its JSON form. The type must be in the catalog
    /// and every submitted field must be declared by it.
    pub fn request(&self, fixture: RequestFixture) -> VigilResult<DynamicRequest> {
        let request_type = RequestTypeId::new(fixture.request_type);
        let entry = self
            .get(&request_type)
            .ok_or_else(|| VigilError::UnknownRequestType(request_type.to_string()))?;

        if let Some(undeclared) = fixture.fields.keys().find(|k| !entry.declares(k)) {
            return Err(VigilError::UnknownField {
                request_type: request_type.to_string(),
                field: undeclared.clone(),
            });
        }

        Ok(DynamicRequest {
            exempt: entry.exempt,
            request_type,
            fields: fixture.fields,
        })
    }

    pub fn request_from_json(&self, json: &str) -> RootResult<DynamicRequest> {
        let fixture: RequestFixture = serde_json::from_str(json)?;
        Ok(self.request(fixture)?)
    }
}

impl FieldResolver<DynamicRequest> for RequestCatalog {
    fn value_of(
        &self,
        request_type: &RequestTypeId,
        field: &str,
        request: &DynamicRequest,
    ) -> VigilResult<Option<Value>> {
        let declared = self
            .get(request_type)
            .is_some_and(|entry| entry.declares(field));
        if !declared {
            return Err(VigilError::UnknownField {
                request_type: request_type.to_string(),
                field: field.to_string(),
            });
        }
        Ok(request.field(field).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> RequestCatalog {
        RequestCatalog::from_config(&[
            RequestTypeConfig::new("UpdateVmMsg").with_fields(["name", "cpu"]),
            RequestTypeConfig::new("QueryZoneMsg").exempt(),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_request_type_rejected() {
        let result = RequestCatalog::from_config(&[
            RequestTypeConfig::new("CreateVmMsg"),
            RequestTypeConfig::new("CreateVmMsg"),
        ]);
        assert!(matches!(result, Err(RootError::Config(_))));
    }

    #[test]
    fn test_request_from_json() {
        let req = catalog()
            .request_from_json(r#"{"type": "UpdateVmMsg", "fields": {"name": "web-1"}}"#)
            .unwrap();
        assert_eq!(req.request_type().as_str(), "UpdateVmMsg");
        assert!(!req.is_exempt());
        assert_eq!(req.field("name"), Some(&json!("web-1")));
        assert_eq!(req.field("cpu"), None);
    }

    #[test]
    fn test_exempt_flag_from_catalog() {
        let req = catalog()
            .request_from_json(r#"{"type": "QueryZoneMsg"}"#)
            .unwrap();
        assert!(req.is_exempt());
    }

    #[test]
    fn test_unknown_request_type() {
        let result = catalog().request_from_json(r#"{"type": "DeleteVmMsg"}"#);
        assert!(matches!(
            result,
            Err(RootError::Request(VigilError::UnknownRequestType(_)))
        ));
    }

    #[test]
    fn test_undeclared_submitted_field() {
        let result =
            catalog().request_from_json(r#"{"type": "UpdateVmMsg", "fields": {"memory": 4}}"#);
        assert!(matches!(
            result,
            Err(RootError::Request(VigilError::UnknownField { .. }))
        ));
    }

    #[test]
    fn test_resolver_reads_submitted_values() {
        let catalog = catalog();
        let req = catalog
            .request_from_json(r#"{"type": "UpdateVmMsg", "fields": {"cpu": null}}"#)
            .unwrap();
        let id = RequestTypeId::new("UpdateVmMsg");
        assert_eq!(
            catalog.value_of(&id, "cpu", &req).unwrap(),
            Some(Value::Null)
        );
        assert_eq!(catalog.value_of(&id, "name", &req).unwrap(), None);
        assert!(catalog.value_of(&id, "memory", &req).is_err());
    }

    #[test]
    fn test_catalog_len() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.is_empty());
        assert!(RequestCatalog::default().is_empty());
    }
}
