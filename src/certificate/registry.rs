use std::collections::BTreeMap;

use super::domain::{Field, FieldKey, FieldMutation, FieldUpdate, FieldValue, Snapshot};
use super::schema::CertificateSchema;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("field `{0}` is not part of the certificate")]
    UnknownField(String),
}

/// Field state owned by a single editing session.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: BTreeMap<FieldKey, Field>,
    order: Vec<FieldKey>,
}

impl FieldRegistry {
    /// Every declared field, empty and at its default enabled state.
    pub fn from_schema(schema: &CertificateSchema) -> Self {
        let mut fields = BTreeMap::new();
        let mut order = Vec::with_capacity(schema.len());
        for spec in schema.fields() {
            let key = spec.field_key();
            order.push(key.clone());
            fields.insert(
                key.clone(),
                Field {
                    key,
                    value: FieldValue::Empty,
                    enabled: spec.enabled_by_default,
                    required: spec.required,
                    visible: true,
                },
            );
        }
        Self { fields, order }
    }

    /// Starts from the schema defaults and loads stored values.
    pub fn with_values<'a, I>(schema: &CertificateSchema, values: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (&'a FieldKey, &'a FieldValue)>,
    {
        let mut registry = Self::from_schema(schema);
        for (key, value) in values {
            registry.set(key.as_str(), FieldUpdate::value(value.clone()))?;
        }
        Ok(registry)
    }

    pub fn get(&self, key: &str) -> Result<&Field, RegistryError> {
        self.fields
            .get(key)
            .ok_or_else(|| RegistryError::UnknownField(key.to_string()))
    }

    pub fn set(&mut self, key: &str, update: FieldUpdate) -> Result<(), RegistryError> {
        let field = self
            .fields
            .get_mut(key)
            .ok_or_else(|| RegistryError::UnknownField(key.to_string()))?;

        if let Some(value) = update.value {
            field.value = value;
        }
        if let Some(enabled) = update.enabled {
            field.enabled = enabled;
        }
        if let Some(visible) = update.visible {
            field.visible = visible;
        }
        Ok(())
    }

    pub fn apply(&mut self, mutation: &FieldMutation) -> Result<(), RegistryError> {
        self.set(mutation.key.as_str(), mutation.to_update())
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for field in self.fields.values() {
            snapshot.insert(field.key.clone(), field.value.clone(), field.enabled);
        }
        snapshot
    }

    /// Non-empty values in schema order, as they would be stored.
    pub fn values(&self) -> Vec<(FieldKey, FieldValue)> {
        self.iter()
            .filter(|field| !field.value.is_empty())
            .map(|field| (field.key.clone(), field.value.clone()))
            .collect()
    }

    /// Fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.order.iter().filter_map(|key| self.fields.get(key))
    }
}
