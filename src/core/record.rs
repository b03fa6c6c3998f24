//! Typed mapping records
//!
//! A record is a named mapping schema: string keys with per-field descriptors
//! and per-field presence. Presence comes from the record's totality unless
//! the field descriptor carries a `Required` or `NotRequired` modifier.

use crate::core::types::Type;
use crate::errors::DeclarationError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSchema {
    name: String,
    total: bool,
    fields: Vec<RecordField>,
}

pub struct RecordBuilder {
    name: String,
    total: bool,
    fields: Vec<RecordField>,
}

impl RecordBuilder {
    /// Partial records make every unmodified field optional
    pub fn total(mut self, total: bool) -> Self {
        self.total = total;
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.fields.push(RecordField { name: name.into(), ty });
        self
    }

    /// Finish the schema, rejecting malformed declarations
    pub fn build(self) -> Result<Arc<RecordSchema>, DeclarationError> {
        let schema = RecordSchema {
            name: self.name,
            total: self.total,
            fields: self.fields,
        };
        schema.check_declaration()?;
        Ok(Arc::new(schema))
    }
}

/// Explicit modifier found on a field descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Required,
    NotRequired,
}

/// Strip presence modifiers, returning the outermost one and the bare descriptor
fn split_modifiers(ty: &Type) -> (Vec<Modifier>, &Type) {
    let mut mods = Vec::new();
    let mut current = ty;
    loop {
        match current {
            Type::Required(inner) => {
                mods.push(Modifier::Required);
                current = inner;
            }
            Type::NotRequired(inner) => {
                mods.push(Modifier::NotRequired);
                current = inner;
            }
            _ => return (mods, current),
        }
    }
}

impl RecordSchema {
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            total: true,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total(&self) -> bool {
        self.total
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn presence(&self, field: &RecordField) -> Presence {
        match split_modifiers(&field.ty).0.first() {
            Some(Modifier::Required) => Presence::Required,
            Some(Modifier::NotRequired) => Presence::Optional,
            None if self.total => Presence::Required,
            None => Presence::Optional,
        }
    }

    /// Field descriptor without its presence modifiers
    pub fn field_type<'a>(&self, field: &'a RecordField) -> &'a Type {
        split_modifiers(&field.ty).1
    }

    pub(crate) fn check_declaration(&self) -> Result<(), DeclarationError> {
        let mut first_optional: Option<&str> = None;

        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(DeclarationError::DuplicateField {
                    record: self.name.clone(),
                    field: field.name.clone(),
                });
            }

            let (mods, bare) = split_modifiers(&field.ty);
            if mods.contains(&Modifier::Required) && mods.contains(&Modifier::NotRequired) {
                return Err(DeclarationError::ConflictingModifiers {
                    record: self.name.clone(),
                    field: field.name.clone(),
                });
            }

            match (mods.first(), first_optional) {
                (Some(Modifier::NotRequired), None) => first_optional = Some(&field.name),
                (Some(Modifier::NotRequired), Some(_)) => {}
                (_, Some(optional)) => {
                    return Err(DeclarationError::FieldOrder {
                        record: self.name.clone(),
                        optional: optional.to_string(),
                        field: field.name.clone(),
                    })
                }
                _ => {}
            }

            bare.check_declaration()?;
        }
        Ok(())
    }
}
