//! In-memory side of a conversion.
//!
//! [`Value`] is what [`Persistable::get`] hands to the converter and what
//! [`Persistable::set`] receives back. It mirrors the document tree but keeps
//! typed entities, custom scalar types and lazy references intact.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use odm_document::{Scalar, ScalarKind};

use crate::entity::{Entity, Persistable};
use crate::error::{MappingError, MappingResult};
use crate::lazy::LazyReference;
use crate::types::TypeKey;

/// A value of a type that only a custom conversion knows how to store.
#[derive(Clone)]
pub struct CustomValue {
    type_key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn as_any(&self) -> &dyn Any {
        &*self.value
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomValue({})", self.type_key.short_name())
    }
}

/// Dynamic in-memory value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Bytes),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Entity(Box<dyn Entity>),
    Custom(CustomValue),
    Lazy(LazyReference),
}

impl Value {
    pub fn entity<T: Persistable>(entity: T) -> Self {
        Self::Entity(Box::new(entity))
    }

    /// `Null` for `None`, an entity value otherwise.
    pub fn optional_entity<T: Persistable>(entity: Option<T>) -> Self {
        entity.map_or(Self::Null, Self::entity)
    }

    pub fn entities<T: Persistable>(entities: Vec<T>) -> Self {
        Self::List(entities.into_iter().map(Self::entity).collect())
    }

    /// Wrap a value produced by custom code.
    ///
    /// Native scalar types (`bool`, `i64`, `f64`, `String`, `Bytes`) come
    /// back as their native variant so the usual [`FromValue`] impls accept
    /// them; anything else becomes [`Value::Custom`].
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        let any: &dyn Any = &value;
        if let Some(b) = any.downcast_ref::<bool>() {
            return Self::Bool(*b);
        }
        if let Some(i) = any.downcast_ref::<i64>() {
            return Self::Int(*i);
        }
        if let Some(f) = any.downcast_ref::<f64>() {
            return Self::Float(*f);
        }
        if let Some(s) = any.downcast_ref::<String>() {
            return Self::String(s.clone());
        }
        if let Some(b) = any.downcast_ref::<Bytes>() {
            return Self::Binary(b.clone());
        }
        Self::Custom(CustomValue::new(value))
    }

    pub fn from_scalar(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Null => Self::Null,
            Scalar::Bool(b) => Self::Bool(b),
            Scalar::Int(i) => Self::Int(i),
            Scalar::Float(f) => Self::Float(f),
            Scalar::String(s) => Self::String(s),
            Scalar::Binary(b) => Self::Binary(b),
        }
    }

    /// The scalar form of a primitive value. `None` for everything else.
    pub fn to_scalar(&self) -> Option<Scalar> {
        match self {
            Self::Null => Some(Scalar::Null),
            Self::Bool(b) => Some(Scalar::Bool(*b)),
            Self::Int(i) => Some(Scalar::Int(*i)),
            Self::Float(f) => Some(Scalar::Float(*f)),
            Self::String(s) => Some(Scalar::String(s.clone())),
            Self::Binary(b) => Some(Scalar::Binary(b.clone())),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Runtime type of this value, used to look up write overrides.
    pub fn runtime_type(&self) -> TypeKey {
        match self {
            Self::Null => TypeKey::of::<()>(),
            Self::Bool(_) => TypeKey::of::<bool>(),
            Self::Int(_) => TypeKey::of::<i64>(),
            Self::Float(_) => TypeKey::of::<f64>(),
            Self::String(_) => TypeKey::of::<String>(),
            Self::Binary(_) => TypeKey::of::<Bytes>(),
            Self::List(_) => TypeKey::of::<Vec<Value>>(),
            Self::Map(_) => TypeKey::of::<BTreeMap<String, Value>>(),
            Self::Entity(e) => e.type_key(),
            Self::Custom(c) => c.type_key(),
            Self::Lazy(l) => l.target(),
        }
    }

    /// Borrow the underlying Rust value for a write override.
    ///
    /// Containers, nulls and lazy references have none: overrides convert
    /// single values only, and a lazy reference must not be resolved to
    /// be written.
    pub fn as_any(&self) -> Option<&dyn Any> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Int(i) => Some(i),
            Self::Float(f) => Some(f),
            Self::String(s) => Some(s),
            Self::Binary(b) => Some(b),
            Self::Entity(e) => Some(e.as_any()),
            Self::Custom(c) => Some(c.as_any()),
            Self::Null | Self::List(_) | Self::Map(_) | Self::Lazy(_) => None,
        }
    }

    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Null => ScalarKind::Null.to_string(),
            Self::Bool(_) => ScalarKind::Bool.to_string(),
            Self::Int(_) => ScalarKind::Int.to_string(),
            Self::Float(_) => ScalarKind::Float.to_string(),
            Self::String(_) => ScalarKind::String.to_string(),
            Self::Binary(_) => ScalarKind::Binary.to_string(),
            Self::List(_) => "list".to_string(),
            Self::Map(_) => "map".to_string(),
            Self::Entity(e) => format!("entity {}", e.type_key()),
            Self::Custom(c) => format!("custom {}", c.type_key()),
            Self::Lazy(l) => format!("lazy reference to {}", l.target()),
        }
    }

    /// Extract a typed entity or custom value.
    pub fn downcast<T: Any + Clone>(self) -> MappingResult<T> {
        let expected = TypeKey::of::<T>();
        match self {
            Self::Entity(e) => {
                let actual = e.type_key();
                e.downcast::<T>().map(|boxed| *boxed).ok_or_else(|| {
                    MappingError::shape_mismatch(expected, format!("entity {actual}"))
                })
            }
            Self::Custom(c) => c.downcast_ref::<T>().cloned().ok_or_else(|| {
                MappingError::shape_mismatch(expected, format!("custom {}", c.type_key()))
            }),
            other => Err(MappingError::shape_mismatch(expected, other.describe())),
        }
    }

    pub fn into_entity<T: Persistable>(self) -> MappingResult<T> {
        self.downcast::<T>()
    }

    /// `None` for `Null`, the typed entity otherwise.
    pub fn into_optional_entity<T: Persistable>(self) -> MappingResult<Option<T>> {
        match self {
            Self::Null => Ok(None),
            other => other.downcast::<T>().map(Some),
        }
    }

    pub fn into_entities<T: Persistable>(self) -> MappingResult<Vec<T>> {
        match self {
            Self::List(items) => items.into_iter().map(Self::downcast::<T>).collect(),
            Self::Null => Ok(Vec::new()),
            other => Err(MappingError::shape_mismatch("list", other.describe())),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        Self::from_scalar(value)
    }
}

/// Conversion into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion out of a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: Value) -> MappingResult<Self>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> MappingResult<Self> {
        Ok(value)
    }
}

macro_rules! impl_native_value {
    ($ty:ty, $variant:ident, $kind:expr) => {
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> MappingResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(MappingError::shape_mismatch($kind, other.describe())),
                }
            }
        }
    };
}

impl_native_value!(bool, Bool, ScalarKind::Bool);
impl_native_value!(i64, Int, ScalarKind::Int);
impl_native_value!(String, String, ScalarKind::String);
impl_native_value!(Bytes, Binary, ScalarKind::Binary);

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(MappingError::shape_mismatch(ScalarKind::Float, other.describe())),
        }
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> MappingResult<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|e| MappingError::conversion("i32", e))
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoValue for Box<dyn Entity> {
    fn into_value(self) -> Value {
        Value::Entity(self)
    }
}

impl FromValue for Box<dyn Entity> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Entity(e) => Ok(e),
            other => Err(MappingError::shape_mismatch("entity", other.describe())),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| T::from_value(item).map_err(|e| e.at(&format!("[{i}]"))))
                .collect(),
            other => Err(MappingError::shape_mismatch("list", other.describe())),
        }
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(MappingError::shape_mismatch("map", other.describe())),
        }
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(k, v)| (k, v.into_value())).collect())
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: Value) -> MappingResult<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(MappingError::shape_mismatch("map", other.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Point;

    #[test]
    fn custom_maps_native_types_back() {
        assert!(matches!(Value::custom(true), Value::Bool(true)));
        assert!(matches!(Value::custom(5i64), Value::Int(5)));
        assert!(matches!(Value::custom("s".to_string()), Value::String(ref s) if s == "s"));
        assert!(matches!(Value::custom(5u8), Value::Custom(_)));
    }

    #[test]
    fn downcast_entity_and_custom() {
        let point = Point { x: 1, y: 2 };
        assert_eq!(Value::entity(point.clone()).downcast::<Point>().unwrap(), point);
        assert_eq!(Value::custom(point.clone()).downcast::<Point>().unwrap(), point);
    }

    #[test]
    fn downcast_wrong_type_is_shape_mismatch() {
        let err = Value::Int(1).downcast::<Point>().unwrap_err();
        assert!(matches!(err, MappingError::ShapeMismatch { .. }));
    }

    #[test]
    fn optional_entity_roundtrip() {
        assert!(Value::optional_entity::<Point>(None).is_null());
        let back = Value::optional_entity(Some(Point { x: 5, y: 6 }))
            .into_optional_entity::<Point>()
            .unwrap();
        assert_eq!(back, Some(Point { x: 5, y: 6 }));
    }

    #[test]
    fn float_accepts_int() {
        assert_eq!(f64::from_value(Value::Int(3)).unwrap(), 3.0);
        assert!(i64::from_value(Value::Float(3.0)).is_err());
    }

    #[test]
    fn i32_out_of_range_is_conversion_error() {
        let err = i32::from_value(Value::Int(i64::MAX)).unwrap_err();
        assert!(matches!(err, MappingError::Conversion { .. }));
    }

    #[test]
    fn vec_error_carries_index() {
        let list = Value::List(vec![Value::Int(1), Value::from("two")]);
        let err = Vec::<i64>::from_value(list).unwrap_err();
        assert_eq!(err.path(), Some("[1]"));
    }

    #[test]
    fn runtime_type_of_primitives_and_entities() {
        assert_eq!(Value::Int(1).runtime_type(), TypeKey::of::<i64>());
        assert_eq!(
            Value::entity(Point::default()).runtime_type(),
            TypeKey::of::<Point>()
        );
        assert!(Value::List(vec![]).as_any().is_none());
    }
}
