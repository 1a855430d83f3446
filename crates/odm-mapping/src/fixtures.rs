//! Persistable types shared by the unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;
use odm_document::{DocumentNode, ScalarKind};
use odm_store::{DocumentFetcher, StoreResult};

use crate::entity::{Entity, Persistable};
use crate::error::MappingResult;
use crate::lazy::Lazy;
use crate::metadata::{EntityMetadata, PropertyMetadata, PropertyShape};
use crate::value::{FromValue, IntoValue, Value};

pub(crate) trait Shape: Send + Sync {}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Point {
    pub x: i64,
    pub y: i64,
}

impl Shape for Point {}

impl Persistable for Point {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .extends::<dyn Shape>()
            .collection("shapes")
            .property(PropertyMetadata::new("x", PropertyShape::int()))
            .property(PropertyMetadata::new("y", PropertyShape::int()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "x" => Some(self.x.into_value()),
            "y" => Some(self.y.into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "x" => self.x = i64::from_value(value)?,
            "y" => self.y = i64::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Circle {
    pub center: Point,
    pub radius: f64,
}

impl Shape for Circle {}

impl Persistable for Circle {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .extends::<dyn Shape>()
            .collection("shapes")
            .property(PropertyMetadata::new("center", PropertyShape::entity::<Point>()))
            .property(PropertyMetadata::new("radius", PropertyShape::float()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "center" => Some(Value::entity(self.center.clone())),
            "radius" => Some(self.radius.into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "center" => self.center = value.into_entity()?,
            "radius" => self.radius = f64::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Holds shapes through the abstract `dyn Shape`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Drawing {
    pub id: String,
    pub main: Option<Box<dyn Entity>>,
    pub shapes: Vec<Box<dyn Entity>>,
    pub tags: Vec<String>,
    pub layers: BTreeMap<String, i64>,
}

impl Persistable for Drawing {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("main", PropertyShape::abstract_entity::<dyn Shape>()))
            .property(PropertyMetadata::new(
                "shapes",
                PropertyShape::collection(PropertyShape::abstract_entity::<dyn Shape>()),
            ))
            .property(PropertyMetadata::new(
                "tags",
                PropertyShape::collection(PropertyShape::string()),
            ))
            .property(PropertyMetadata::new("layers", PropertyShape::map(PropertyShape::int())))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "main" => Some(self.main.clone().into_value()),
            "shapes" => Some(self.shapes.clone().into_value()),
            "tags" => Some(self.tags.clone().into_value()),
            "layers" => Some(self.layers.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "main" => self.main = FromValue::from_value(value)?,
            "shapes" => self.shapes = FromValue::from_value(value)?,
            "tags" => self.tags = FromValue::from_value(value)?,
            "layers" => self.layers = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Customer {
    pub id: String,
    pub name: String,
    pub rev: Option<String>,
}

impl Persistable for Customer {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .collection("customers")
            .property(
                PropertyMetadata::new("id", PropertyShape::string())
                    .stored_as("_id")
                    .identifier(),
            )
            .property(PropertyMetadata::new("name", PropertyShape::string()))
            .property(
                PropertyMetadata::new("rev", PropertyShape::string())
                    .stored_as("_rev")
                    .revision()
                    .read_only(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "name" => Some(self.name.clone().into_value()),
            "rev" => Some(self.rev.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "name" => self.name = String::from_value(value)?,
            "rev" => self.rev = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

pub(crate) fn customer(id: &str, name: &str) -> Customer {
    Customer {
        id: id.to_string(),
        name: name.to_string(),
        rev: None,
    }
}

/// Eager references to customers.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Order {
    pub id: String,
    pub customer: Option<Customer>,
    pub watchers: Vec<Customer>,
}

impl Persistable for Order {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(
                PropertyMetadata::new("customer", PropertyShape::entity::<Customer>()).reference(),
            )
            .property(
                PropertyMetadata::new(
                    "watchers",
                    PropertyShape::collection(PropertyShape::entity::<Customer>()),
                )
                .reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "customer" => Some(Value::optional_entity(self.customer.clone())),
            "watchers" => Some(Value::entities(self.watchers.clone())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "customer" => self.customer = value.into_optional_entity()?,
            "watchers" => self.watchers = value.into_entities()?,
            _ => {}
        }
        Ok(())
    }
}

pub(crate) fn order_metadata() -> EntityMetadata {
    Order::metadata()
}

/// Lazy references to customers.
#[derive(Clone, Debug, Default)]
pub(crate) struct LazyOrder {
    pub id: String,
    pub customer: Option<Lazy<Customer>>,
    pub watchers: Vec<Lazy<Customer>>,
}

impl Persistable for LazyOrder {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(
                PropertyMetadata::new("customer", PropertyShape::entity::<Customer>())
                    .lazy_reference(),
            )
            .property(
                PropertyMetadata::new(
                    "watchers",
                    PropertyShape::collection(PropertyShape::entity::<Customer>()),
                )
                .lazy_reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "customer" => Some(self.customer.clone().into_value()),
            "watchers" => Some(self.watchers.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "customer" => self.customer = FromValue::from_value(value)?,
            "watchers" => self.watchers = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// An entity-shaped value that applications often store as one string.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Money {
    pub cents: i64,
    pub currency: String,
}

impl Persistable for Money {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("cents", PropertyShape::int()))
            .property(PropertyMetadata::new("currency", PropertyShape::string()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "cents" => Some(self.cents.into_value()),
            "currency" => Some(self.currency.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "cents" => self.cents = i64::from_value(value)?,
            "currency" => self.currency = String::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Invoice {
    pub id: String,
    pub total: Money,
}

impl Persistable for Invoice {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("total", PropertyShape::entity::<Money>()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "total" => Some(Value::entity(self.total.clone())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "total" => self.total = value.downcast()?,
            _ => {}
        }
        Ok(())
    }
}

/// Refers to itself through an eager reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Person {
    pub id: String,
    pub name: String,
    pub friend: Option<Box<Person>>,
}

impl Persistable for Person {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("name", PropertyShape::string()))
            .property(
                PropertyMetadata::new("friend", PropertyShape::entity::<Person>()).reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "name" => Some(self.name.clone().into_value()),
            "friend" => Some(Value::optional_entity(self.friend.as_deref().cloned())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "name" => self.name = String::from_value(value)?,
            "friend" => self.friend = value.into_optional_entity::<Person>()?.map(Box::new),
            _ => {}
        }
        Ok(())
    }
}

/// Custom scalar plus non-string map keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Event {
    pub id: String,
    pub on: Option<NaiveDate>,
    pub seats: BTreeMap<String, f64>,
    pub flags: HashMap<String, bool>,
}

impl Persistable for Event {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("on", PropertyShape::custom::<NaiveDate>()))
            .property(PropertyMetadata::new(
                "seats",
                PropertyShape::map_keyed(ScalarKind::Int, PropertyShape::float()),
            ))
            .property(PropertyMetadata::new("flags", PropertyShape::map(PropertyShape::bool())))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "on" => Some(self.on.map_or(Value::Null, Value::custom)),
            "seats" => Some(self.seats.clone().into_value()),
            "flags" => Some(self.flags.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "on" => self.on = Some(value.downcast()?),
            "seats" => self.seats = FromValue::from_value(value)?,
            "flags" => self.flags = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Declares no properties.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Empty;

impl Persistable for Empty {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>().build()
    }

    fn get(&self, _property: &str) -> Option<Value> {
        None
    }

    fn set(&mut self, _property: &str, _value: Value) -> MappingResult<()> {
        Ok(())
    }
}

pub(crate) trait Pet: Send + Sync {}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Dog {
    pub id: String,
    pub name: String,
}

impl Pet for Dog {}

impl Persistable for Dog {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .extends::<dyn Pet>()
            .collection("dogs")
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("name", PropertyShape::string()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "name" => Some(self.name.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "name" => self.name = String::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Cat {
    pub id: String,
    pub lives: i64,
}

impl Pet for Cat {}

impl Persistable for Cat {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .extends::<dyn Pet>()
            .collection("cats")
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("lives", PropertyShape::int()))
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "lives" => Some(self.lives.into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "lives" => self.lives = i64::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

/// Refers to a pet through the abstract `dyn Pet`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Owner {
    pub id: String,
    pub pet: Option<Box<dyn Entity>>,
}

impl Persistable for Owner {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(
                PropertyMetadata::new("pet", PropertyShape::abstract_entity::<dyn Pet>())
                    .reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "pet" => Some(self.pet.clone().into_value()),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "pet" => self.pet = FromValue::from_value(value)?,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Book {
    pub id: String,
    pub title: String,
    pub author: Option<Person>,
}

impl Persistable for Book {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .collection("books")
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(PropertyMetadata::new("title", PropertyShape::string()))
            .property(
                PropertyMetadata::new("author", PropertyShape::entity::<Person>()).reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "title" => Some(self.title.clone().into_value()),
            "author" => Some(Value::optional_entity(self.author.clone())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "title" => self.title = String::from_value(value)?,
            "author" => self.author = value.into_optional_entity()?,
            _ => {}
        }
        Ok(())
    }
}

/// An eager collection of references to books.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Shelf {
    pub id: String,
    pub books: Vec<Book>,
}

impl Persistable for Shelf {
    fn metadata() -> EntityMetadata {
        EntityMetadata::builder::<Self>()
            .collection("shelves")
            .property(PropertyMetadata::new("id", PropertyShape::string()).identifier())
            .property(
                PropertyMetadata::new(
                    "books",
                    PropertyShape::collection(PropertyShape::entity::<Book>()),
                )
                .reference(),
            )
            .build()
    }

    fn get(&self, property: &str) -> Option<Value> {
        match property {
            "id" => Some(self.id.clone().into_value()),
            "books" => Some(Value::entities(self.books.clone())),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: Value) -> MappingResult<()> {
        match property {
            "id" => self.id = String::from_value(value)?,
            "books" => self.books = value.into_entities()?,
            _ => {}
        }
        Ok(())
    }
}

/// Keeps one keyspace per collection, so equal identifiers in different
/// collections name different documents.
#[derive(Debug, Default)]
pub(crate) struct CollectionStore {
    docs: RwLock<HashMap<(String, String), DocumentNode>>,
}

impl CollectionStore {
    pub fn insert(&self, collection: &str, id: &str, node: DocumentNode) {
        self.docs
            .write()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), node);
    }
}

impl DocumentFetcher for CollectionStore {
    fn fetch_by_id(&self, id: &str, target: &str) -> StoreResult<Option<DocumentNode>> {
        let key = (target.to_string(), id.to_string());
        Ok(self.docs.read().unwrap().get(&key).cloned())
    }
}
