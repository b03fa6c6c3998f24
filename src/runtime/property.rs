//! Properties assembled from getter, setter and deleter functions
//!
//! All accessors are collected on one `PropertyBuilder` and frozen by
//! `build`, which wraps the setter in argument validation.

use crate::analysis::matcher::TypeMatcher;
use crate::core::value::Value;
use crate::errors::{CallError, DeclarationError};
use crate::runtime::function::{CallArgs, Function};
use crate::runtime::guard::{validate_with, GuardOptions};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    Getter,
    Setter,
    Deleter,
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Getter => write!(f, "getter"),
            Accessor::Setter => write!(f, "setter"),
            Accessor::Deleter => write!(f, "deleter"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyBuilder {
    name: String,
    getter: Option<Arc<Function>>,
    setter: Option<Arc<Function>>,
    deleter: Option<Arc<Function>>,
    doc: Option<String>,
}

impl PropertyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn slot(&mut self, accessor: Accessor) -> &mut Option<Arc<Function>> {
        match accessor {
            Accessor::Getter => &mut self.getter,
            Accessor::Setter => &mut self.setter,
            Accessor::Deleter => &mut self.deleter,
        }
    }

    /// Install `function` for every accessor in `accessors`, refusing to overwrite one
    pub fn define(mut self, accessors: &[Accessor], function: impl Into<Arc<Function>>) -> Result<Self, DeclarationError> {
        let function = function.into();
        for accessor in accessors {
            if self.slot(*accessor).is_some() {
                return Err(DeclarationError::DuplicateAccessor(format!("{}.{}", self.name, accessor)));
            }
            *self.slot(*accessor) = Some(Arc::clone(&function));
        }
        Ok(self)
    }

    pub fn getter(self, function: impl Into<Arc<Function>>) -> Result<Self, DeclarationError> {
        self.define(&[Accessor::Getter], function)
    }

    pub fn setter(self, function: impl Into<Arc<Function>>) -> Result<Self, DeclarationError> {
        self.define(&[Accessor::Setter], function)
    }

    pub fn deleter(self, function: impl Into<Arc<Function>>) -> Result<Self, DeclarationError> {
        self.define(&[Accessor::Deleter], function)
    }

    /// One function serving as both getter and setter
    pub fn getter_setter(self, function: impl Into<Arc<Function>>) -> Result<Self, DeclarationError> {
        self.define(&[Accessor::Getter, Accessor::Setter], function)
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn build(self, options: GuardOptions) -> Result<Property, DeclarationError> {
        self.build_with(options, TypeMatcher::global())
    }

    /// Freeze the accessors; the setter is validated with the receiver skipped
    pub fn build_with(self, options: GuardOptions, matcher: Arc<TypeMatcher>) -> Result<Property, DeclarationError> {
        let setter = match self.setter {
            Some(setter) if !setter.is_checked() => {
                let checked = validate_with(setter, options.subclass(true), matcher)?;
                Some(Arc::new(checked.into_function()))
            }
            other => other,
        };
        let doc = self.doc.or_else(|| self.getter.as_ref().and_then(|g| g.doc().map(str::to_string)));
        Ok(Property {
            name: self.name,
            getter: self.getter,
            setter,
            deleter: self.deleter,
            doc,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    getter: Option<Arc<Function>>,
    setter: Option<Arc<Function>>,
    deleter: Option<Arc<Function>>,
    doc: Option<String>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn get(&self, receiver: &Value) -> Result<Value, CallError> {
        let getter = self
            .getter
            .as_ref()
            .ok_or_else(|| CallError::Attribute(format!("property '{}' has no getter", self.name)))?;
        getter.call(&CallArgs::new().arg(receiver.clone()))
    }

    pub fn set(&self, receiver: &Value, value: Value) -> Result<(), CallError> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| CallError::Attribute(format!("can't set attribute '{}'", self.name)))?;
        setter.call(&CallArgs::new().arg(receiver.clone()).arg(value))?;
        Ok(())
    }

    pub fn delete(&self, receiver: &Value) -> Result<(), CallError> {
        let deleter = self
            .deleter
            .as_ref()
            .ok_or_else(|| CallError::Attribute(format!("can't delete attribute '{}'", self.name)))?;
        deleter.call(&CallArgs::new().arg(receiver.clone()))?;
        Ok(())
    }
}
