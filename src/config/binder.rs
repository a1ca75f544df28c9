//! Constructor binding
//!
//! Maps declared class paths to constructors, validates declared fields
//! against each constructor's parameter schema, and invokes it with bound
//! values. References are substituted with already-resolved objects from the
//! object table before validation, so a constructor only ever sees live
//! collaborators.
//!
//! The registry is an explicit, injected object rather than a process-wide
//! lookup, so independent resolutions cannot interfere.

use super::parser::Declaration;
use super::resolver::ObjectTable;
use super::value::Value;
use crate::component::Component;
use crate::error::{BoxError, Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A field value after reference substitution.
#[derive(Clone)]
pub enum BoundValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<BoundValue>),
    Tuple(Vec<BoundValue>),
    ClassPath(String),
    Object(Arc<dyn Component>),
}

impl BoundValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BoundValue::Str(_) => "string",
            BoundValue::Int(_) => "integer",
            BoundValue::Float(_) => "float",
            BoundValue::Bool(_) => "boolean",
            BoundValue::None => "None",
            BoundValue::List(_) => "list",
            BoundValue::Tuple(_) => "tuple",
            BoundValue::ClassPath(_) => "class path",
            BoundValue::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundValue::Str(s) => Some(s),
            _ => Option::None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BoundValue::Int(i) => Some(*i),
            _ => Option::None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            BoundValue::Float(x) => Some(*x),
            BoundValue::Int(i) => Some(*i as f64),
            _ => Option::None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoundValue::Bool(b) => Some(*b),
            _ => Option::None,
        }
    }

    pub fn as_list(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::List(items) => Some(items),
            _ => Option::None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::Tuple(items) => Some(items),
            _ => Option::None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Component>> {
        match self {
            BoundValue::Object(obj) => Some(obj),
            _ => Option::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, BoundValue::None)
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundValue::Str(s) => write!(f, "Str({s:?})"),
            BoundValue::Int(i) => write!(f, "Int({i})"),
            BoundValue::Float(x) => write!(f, "Float({x})"),
            BoundValue::Bool(b) => write!(f, "Bool({b})"),
            BoundValue::None => write!(f, "None"),
            BoundValue::List(items) => f.debug_tuple("List").field(items).finish(),
            BoundValue::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            BoundValue::ClassPath(p) => write!(f, "ClassPath({p})"),
            BoundValue::Object(_) => write!(f, "Object(..)"),
        }
    }
}

/// Expected kind of a constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Float,
    Bool,
    List,
    Tuple,
    Object,
    Any,
}

impl ParamKind {
    fn matches(self, value: &BoundValue) -> bool {
        match self {
            ParamKind::Any => true,
            // None is the declared absence of a value; every parameter
            // accepts it and the constructor applies its default.
            _ if value.is_none() => true,
            ParamKind::Str => matches!(value, BoundValue::Str(_)),
            ParamKind::Int => matches!(value, BoundValue::Int(_)),
            ParamKind::Float => matches!(value, BoundValue::Float(_) | BoundValue::Int(_)),
            ParamKind::Bool => matches!(value, BoundValue::Bool(_)),
            ParamKind::List => matches!(value, BoundValue::List(_)),
            ParamKind::Tuple => matches!(value, BoundValue::Tuple(_)),
            ParamKind::Object => matches!(value, BoundValue::Object(_)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Int => "integer",
            ParamKind::Float => "float",
            ParamKind::Bool => "boolean",
            ParamKind::List => "list",
            ParamKind::Tuple => "tuple",
            ParamKind::Object => "object",
            ParamKind::Any => "any",
        }
    }
}

/// One entry of a constructor's parameter schema.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }
}

/// A constructible collaborator.
///
/// The schema drives binding validation; `construct` receives the validated
/// bindings and returns the live object. Constructor failures are wrapped by
/// the binder with the declaration name and class path.
pub trait Constructor: Send + Sync {
    fn params(&self) -> &'static [ParamSpec];

    /// Accept fields beyond the schema (e.g. a dataset whose series names are
    /// free-form). Extra fields skip kind checking.
    fn allow_extra(&self) -> bool {
        false
    }

    fn construct(&self, args: &Bindings) -> std::result::Result<Arc<dyn Component>, BoxError>;
}

/// Dotted class path → constructor.
#[derive(Default)]
pub struct ConstructorRegistry {
    constructors: HashMap<String, Arc<dyn Constructor>>,
}

impl ConstructorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_path: impl Into<String>, ctor: Arc<dyn Constructor>) {
        self.constructors.insert(class_path.into(), ctor);
    }

    pub fn get(&self, class_path: &str) -> Option<&Arc<dyn Constructor>> {
        self.constructors.get(class_path)
    }
}

/// Bound fields of one declaration, in declared order, with typed accessors.
#[derive(Debug, Clone)]
pub struct Bindings {
    section: String,
    values: Vec<(String, BoundValue)>,
}

impl Bindings {
    pub fn new(section: impl Into<String>, values: Vec<(String, BoundValue)>) -> Self {
        Self {
            section: section.into(),
            values,
        }
    }

    /// Name of the declaration these bindings came from.
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A declared `None` counts as absent.
    pub fn get(&self, key: &str) -> Option<&BoundValue> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .filter(|v| !v.is_none())
    }

    fn expected(&self, key: &str, kind: &str, got: &BoundValue) -> Error {
        Error::binding(
            self.section.as_str(),
            format!("{}.{} must be a {}, got {}", self.section, key, kind, got.kind_name()),
        )
    }

    fn missing(&self, key: &str) -> Error {
        Error::binding(
            self.section.as_str(),
            format!("missing required field {}.{}", self.section, key),
        )
    }

    pub fn require(&self, key: &str) -> Result<&BoundValue> {
        self.get(key).ok_or_else(|| self.missing(key))
    }

    pub fn str_field(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| self.expected(key, "string", value))
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key) {
            Some(value) => value
                .as_i64()
                .ok_or_else(|| self.expected(key, "integer", value)),
            Option::None => Ok(default),
        }
    }

    pub fn usize_field(&self, key: &str) -> Result<usize> {
        let value = self.require(key)?;
        self.to_usize(key, value)
    }

    pub fn usize_opt(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            Some(value) => self.to_usize(key, value).map(Some),
            Option::None => Ok(Option::None),
        }
    }

    fn to_usize(&self, key: &str, value: &BoundValue) -> Result<usize> {
        value
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| self.expected(key, "non-negative integer", value))
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            Some(value) => value
                .as_f64()
                .ok_or_else(|| self.expected(key, "number", value)),
            Option::None => Ok(default),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(value) => value
                .as_bool()
                .ok_or_else(|| self.expected(key, "boolean", value)),
            Option::None => Ok(default),
        }
    }

    pub fn list_field(&self, key: &str) -> Result<&[BoundValue]> {
        let value = self.require(key)?;
        value.as_list().ok_or_else(|| self.expected(key, "list", value))
    }

    pub fn list_or_empty(&self, key: &str) -> Result<&[BoundValue]> {
        match self.get(key) {
            Some(value) => value.as_list().ok_or_else(|| self.expected(key, "list", value)),
            Option::None => Ok(&[]),
        }
    }

    pub fn object_field(&self, key: &str) -> Result<Arc<dyn Component>> {
        let value = self.require(key)?;
        value
            .as_object()
            .cloned()
            .ok_or_else(|| self.expected(key, "object reference", value))
    }

    pub fn object_opt(&self, key: &str) -> Result<Option<Arc<dyn Component>>> {
        match self.get(key) {
            Some(value) => value
                .as_object()
                .cloned()
                .map(Some)
                .ok_or_else(|| self.expected(key, "object reference", value)),
            Option::None => Ok(Option::None),
        }
    }
}

/// A class-less declaration resolved to its bound fields. The `main` section
/// is the canonical example.
pub struct FieldTable {
    bindings: Bindings,
}

impl FieldTable {
    pub fn new(bindings: Bindings) -> Self {
        Self { bindings }
    }

    pub fn name(&self) -> &str {
        self.bindings.section()
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

impl Component for FieldTable {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_field_table(&self) -> Option<&FieldTable> {
        Some(self)
    }
}

/// Substitute references in a declaration's fields with resolved objects.
///
/// All referenced objects are present in the table by construction order; a
/// miss here means the resolver scheduled this declaration too early and is
/// reported as an unknown reference.
pub fn bind_fields(decl: &Declaration, table: &ObjectTable) -> Result<Bindings> {
    let mut values = Vec::with_capacity(decl.fields.len());
    for (key, value) in &decl.fields {
        let path = format!("{}.{}", decl.name, key);
        values.push((key.clone(), bind_value(value, &path, table)?));
    }
    Ok(Bindings::new(decl.name.as_str(), values))
}

fn bind_value(value: &Value, path: &str, table: &ObjectTable) -> Result<BoundValue> {
    Ok(match value {
        Value::Str(s) => BoundValue::Str(s.clone()),
        Value::Int(i) => BoundValue::Int(*i),
        Value::Float(x) => BoundValue::Float(*x),
        Value::Bool(b) => BoundValue::Bool(*b),
        Value::None => BoundValue::None,
        Value::ClassPath(p) => BoundValue::ClassPath(p.clone()),
        Value::Reference(target) => BoundValue::Object(
            table
                .get(target)
                .cloned()
                .ok_or_else(|| Error::UnknownReference {
                    target: target.clone(),
                    path: path.to_string(),
                })?,
        ),
        Value::List(items) => BoundValue::List(bind_items(items, path, table)?),
        Value::Tuple(items) => BoundValue::Tuple(bind_items(items, path, table)?),
    })
}

fn bind_items(items: &[Value], path: &str, table: &ObjectTable) -> Result<Vec<BoundValue>> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| bind_value(item, &format!("{path}[{i}]"), table))
        .collect()
}

/// Validate bindings against a constructor's schema and invoke it.
pub fn bind_and_call(
    registry: &ConstructorRegistry,
    class_path: &str,
    bindings: Bindings,
) -> Result<Arc<dyn Component>> {
    let section = bindings.section().to_string();
    let ctor = registry.get(class_path).ok_or_else(|| {
        Error::binding(section.as_str(), format!("unknown class path {class_path}"))
    })?;

    validate(ctor.as_ref(), &bindings)?;

    ctor.construct(&bindings).map_err(|err| Error::Constructor {
        section,
        class_path: class_path.to_string(),
        message: err.to_string(),
    })
}

fn validate(ctor: &dyn Constructor, bindings: &Bindings) -> Result<()> {
    let schema = ctor.params();

    let missing: Vec<&str> = schema
        .iter()
        .filter(|p| p.required && bindings.get(p.name).is_none())
        .map(|p| p.name)
        .collect();

    let unexpected: Vec<&str> = if ctor.allow_extra() {
        Vec::new()
    } else {
        bindings
            .iter()
            .filter(|(key, _)| !schema.iter().any(|p| p.name == *key))
            .map(|(key, _)| key)
            .collect()
    };

    if !missing.is_empty() || !unexpected.is_empty() {
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing required fields: {}", missing.join(", ")));
        }
        if !unexpected.is_empty() {
            parts.push(format!("unexpected fields: {}", unexpected.join(", ")));
        }
        return Err(Error::binding(bindings.section(), parts.join("; ")));
    }

    for spec in schema {
        if let Some(value) = bindings.get(spec.name) {
            if !spec.kind.matches(value) {
                return Err(Error::binding(
                    bindings.section(),
                    format!(
                        "{}.{} must be a {}, got {}",
                        bindings.section(),
                        spec.name,
                        spec.kind.name(),
                        value.kind_name()
                    ),
                ));
            }
        }
    }

    Ok(())
}
