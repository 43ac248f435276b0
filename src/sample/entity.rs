//! `parent_entity` and `child_entity` JSON:API resources
//!
//! Both resources carry the same five attributes; `child_entity` prefixes
//! them with `child_`. A child lists its parents under `parent_entities`, and
//! a parent renders the reverse side as `child_entities`.

use crate::core::dispatch::{AppRouter, FieldError, HandlerError, HandlerRequest, HandlerResponse};
use crate::storage::{MemoryDatabase, StorageError};
use actix_web::http::Method;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Mount point of every sample resource
pub const API_PREFIX: &str = "/api/v1/entity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeKind {
    Text,
    Bool,
    Decimal,
    DateTime,
}

/// Attributes of both resources, before the resource's field prefix
const ATTRIBUTES: [(&str, AttributeKind); 5] = [
    ("name", AttributeKind::Text),
    ("description", AttributeKind::Text),
    ("is_active", AttributeKind::Bool),
    ("price", AttributeKind::Decimal),
    ("dt_approved", AttributeKind::DateTime),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    /// Related ids are stored on this resource's rows
    Owned,
    /// Rows of the related resource list this row's id under `field`
    Reverse { field: &'static str },
}

#[derive(Debug)]
struct Relationship {
    name: &'static str,
    target: &'static str,
    link: Link,
}

/// A resource: its table, attribute prefix and relationships
#[derive(Debug)]
pub struct Resource {
    name: &'static str,
    prefix: &'static str,
    relationships: &'static [Relationship],
}

pub static PARENT_ENTITY: Resource = Resource {
    name: "parent_entity",
    prefix: "",
    relationships: &[Relationship {
        name: "child_entities",
        target: "child_entity",
        link: Link::Reverse {
            field: "parent_entities",
        },
    }],
};

pub static CHILD_ENTITY: Resource = Resource {
    name: "child_entity",
    prefix: "child_",
    relationships: &[Relationship {
        name: "parent_entities",
        target: "parent_entity",
        link: Link::Owned,
    }],
};

#[derive(Debug, Deserialize)]
struct Document {
    data: ResourceObject,
}

#[derive(Debug, Deserialize)]
struct ResourceObject {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    relationships: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Linkage {
    data: Vec<Identifier>,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

impl Resource {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// JSON:API type, e.g. `entity.parent_entity`
    pub fn type_name(&self) -> String {
        format!("entity.{}", self.name)
    }

    pub fn collection_path(&self) -> String {
        format!("{}/{}/", API_PREFIX, self.name)
    }

    pub fn item_path(&self, id: &str) -> String {
        format!("{}{}/", self.collection_path(), id)
    }

    /// Stored name of an attribute, e.g. `price` -> `child_price`
    pub fn field(&self, attribute: &str) -> String {
        format!("{}{}", self.prefix, attribute)
    }

    /// Create the table and mount list, retrieve, create, patch and delete
    pub fn register(&'static self, router: &mut AppRouter, db: &Arc<MemoryDatabase>) {
        let unique = self.field("name");
        db.create_table(self.name, &[unique.as_str()]);

        let collection = self.collection_path();
        let item = format!("{}{{id}}/", collection);

        let store = Arc::clone(db);
        router.route(Method::GET, &collection, move |req| self.list(&store, &req));
        let store = Arc::clone(db);
        router.route(Method::POST, &collection, move |req| self.create(&store, &req));
        let store = Arc::clone(db);
        router.route(Method::GET, &item, move |req| self.retrieve(&store, &req));
        let store = Arc::clone(db);
        router.route(Method::PATCH, &item, move |req| self.update(&store, &req));
        let store = Arc::clone(db);
        router.route(Method::DELETE, &item, move |req| self.destroy(&store, &req));
    }

    fn list(&self, db: &MemoryDatabase, req: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        let mut rows = db.list(self.name)?;

        if let Some(filter) = req.query_param("filter") {
            for clause in filter.split('&').filter(|c| !c.is_empty()) {
                let (field, expected) = clause.split_once('=').ok_or_else(|| {
                    HandlerError::BadRequest(format!("invalid filter clause {}", clause))
                })?;
                self.check_field(field)?;
                rows.retain(|row| matches_filter(row.get(field).unwrap_or(&Value::Null), expected));
            }
        }

        if let Some(sort) = req.query_param("sort") {
            let keys = sort
                .split(',')
                .filter(|k| !k.is_empty())
                .map(|key| {
                    let (field, descending) = match key.strip_prefix('-') {
                        Some(field) => (field, true),
                        None => (key, false),
                    };
                    self.check_field(field).map(|_| (field, descending))
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.sort_by(|a, b| {
                keys.iter()
                    .map(|(field, descending)| {
                        let ordering = compare(a.get(*field), b.get(*field));
                        if *descending { ordering.reverse() } else { ordering }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = page_param(req, "page[offset]")?.unwrap_or(0);
        let limit = page_param(req, "page[limit]")?;
        let count = rows.len();
        let data = rows
            .iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| self.render(db, row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut document = json!({ "data": data });
        if req
            .query_param("meta")
            .is_some_and(|meta| meta.split(',').any(|m| m == "pagination"))
        {
            document["meta"] = json!({
                "pagination": { "count": count, "limit": limit, "offset": offset }
            });
        }
        Ok(HandlerResponse::json(200, &document))
    }

    fn retrieve(&self, db: &MemoryDatabase, req: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        let row = db.get(self.name, req.param("id")?)?;
        Ok(HandlerResponse::json(200, &json!({ "data": self.render(db, &row)? })))
    }

    fn create(&self, db: &MemoryDatabase, req: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        let object = self.parse_document(req)?;
        let mut row = self.clean_attributes(&object.attributes, true)?;
        row.extend(self.clean_relationships(db, &object.relationships)?);

        let now = timestamp();
        row.insert("dt_created".to_string(), Value::String(now.clone()));
        row.insert("dt_updated".to_string(), Value::String(now));

        let id = object.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if db.get(self.name, &id).is_ok() {
            return Err(HandlerError::Conflict(format!("{} {} already exists", self.name, id)));
        }
        debug!(resource = self.name, id = %id, "Creating row");
        self.respond(db, db.insert(self.name, &id, Value::Object(row)), 201)
    }

    fn update(&self, db: &MemoryDatabase, req: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        let id = req.param("id")?;
        let object = self.parse_document(req)?;
        if let Some(body_id) = &object.id {
            if body_id != id {
                return Err(HandlerError::Conflict(format!(
                    "id {} does not match endpoint id {}",
                    body_id, id
                )));
            }
        }
        db.get(self.name, id)?;

        let mut patch = self.clean_attributes(&object.attributes, false)?;
        patch.extend(self.clean_relationships(db, &object.relationships)?);
        patch.insert("dt_updated".to_string(), Value::String(timestamp()));

        debug!(resource = self.name, id, "Updating row");
        self.respond(db, db.update(self.name, id, patch), 200)
    }

    fn destroy(&self, db: &MemoryDatabase, req: &HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        let id = req.param("id")?;
        db.delete(self.name, id)?;
        for relationship in self.relationships {
            if let Link::Reverse { field } = relationship.link {
                unlink(db, relationship.target, field, id)?;
            }
        }
        debug!(resource = self.name, id, "Deleted row");
        Ok(HandlerResponse::no_content())
    }

    fn respond(
        &self,
        db: &MemoryDatabase,
        written: Result<Value, StorageError>,
        status: u16,
    ) -> Result<HandlerResponse, HandlerError> {
        match written {
            Ok(row) => Ok(HandlerResponse::json(status, &json!({ "data": self.render(db, &row)? }))),
            // Answered here; the failed write has already poisoned the request scope
            Err(StorageError::UniqueViolation { field, .. }) => Ok(HandlerError::Conflict(format!(
                "{} with this {} already exists",
                self.name, field
            ))
            .into_response()),
            Err(e) => Err(e.into()),
        }
    }

    fn parse_document(&self, req: &HandlerRequest) -> Result<ResourceObject, HandlerError> {
        let document: Document = req.json()?;
        let object = document.data;
        if let Some(kind) = &object.kind {
            if *kind != self.type_name() {
                return Err(HandlerError::Conflict(format!(
                    "type {} does not match {}",
                    kind,
                    self.type_name()
                )));
            }
        }
        Ok(object)
    }

    /// Check and normalize submitted attributes. On create every attribute
    /// ends up in the result and the name is required.
    fn clean_attributes(
        &self,
        submitted: &Map<String, Value>,
        creating: bool,
    ) -> Result<Map<String, Value>, HandlerError> {
        let mut cleaned = Map::new();
        let mut errors = Vec::new();

        for (attribute, kind) in ATTRIBUTES {
            let field = self.field(attribute);
            let required = attribute == "name";
            match submitted.get(&field) {
                Some(value) => match clean_value(kind, required, value) {
                    Ok(value) => {
                        cleaned.insert(field, value);
                    }
                    Err((kind, detail)) => errors.push(FieldError::new(field, kind, detail)),
                },
                None if creating && required => {
                    errors.push(FieldError::new(field, "missing", "Field required"))
                }
                None if creating => {
                    let default = match kind {
                        AttributeKind::Bool => Value::Bool(false),
                        _ => Value::Null,
                    };
                    cleaned.insert(field, default);
                }
                None => {}
            }
        }

        if errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(HandlerError::Validation(errors))
        }
    }

    /// Resolve owned relationships to stored id lists
    fn clean_relationships(
        &self,
        db: &MemoryDatabase,
        submitted: &Map<String, Value>,
    ) -> Result<Map<String, Value>, HandlerError> {
        let mut cleaned = Map::new();
        for relationship in self.relationships.iter().filter(|r| r.link == Link::Owned) {
            let Some(value) = submitted.get(relationship.name) else {
                continue;
            };
            let linkage: Linkage = serde_json::from_value(value.clone()).map_err(|e| {
                HandlerError::BadRequest(format!("invalid relationship {}: {}", relationship.name, e))
            })?;

            let expected = format!("entity.{}", relationship.target);
            let mut ids = Vec::with_capacity(linkage.data.len());
            for identifier in linkage.data {
                if identifier.kind != expected {
                    return Err(HandlerError::Conflict(format!(
                        "{} expects {}, got {}",
                        relationship.name, expected, identifier.kind
                    )));
                }
                match db.get(relationship.target, &identifier.id) {
                    Ok(_) => ids.push(Value::String(identifier.id)),
                    Err(StorageError::NotFound { .. }) => {
                        return Err(HandlerError::Validation(vec![FieldError::new(
                            relationship.name,
                            "does_not_exist",
                            format!("{} {} does not exist", relationship.target, identifier.id),
                        )]));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            cleaned.insert(relationship.name.to_string(), Value::Array(ids));
        }
        Ok(cleaned)
    }

    fn check_field(&self, field: &str) -> Result<(), HandlerError> {
        let known = matches!(field, "id" | "dt_created" | "dt_updated")
            || ATTRIBUTES.iter().any(|(attribute, _)| self.field(attribute) == field);
        if known {
            Ok(())
        } else {
            Err(HandlerError::BadRequest(format!(
                "unknown field {} on {}",
                field, self.name
            )))
        }
    }

    fn render(&self, db: &MemoryDatabase, row: &Value) -> Result<Value, HandlerError> {
        let id = row["id"].as_str().unwrap_or_default();

        let mut attributes = Map::new();
        for field in ["dt_created", "dt_updated"] {
            attributes.insert(field.to_string(), row.get(field).cloned().unwrap_or(Value::Null));
        }
        for (attribute, _) in ATTRIBUTES {
            let field = self.field(attribute);
            let value = row.get(&field).cloned().unwrap_or(Value::Null);
            attributes.insert(field, value);
        }

        let mut relationships = Map::new();
        for relationship in self.relationships {
            let ids: Vec<String> = match relationship.link {
                Link::Owned => row
                    .get(relationship.name)
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
                Link::Reverse { field } => db
                    .list(relationship.target)?
                    .into_iter()
                    .filter(|other| links_to(other, field, id))
                    .filter_map(|other| other["id"].as_str().map(str::to_string))
                    .collect(),
            };
            let data: Vec<Value> = ids
                .into_iter()
                .map(|id| json!({ "id": id, "type": format!("entity.{}", relationship.target) }))
                .collect();
            relationships.insert(relationship.name.to_string(), json!({ "data": data }));
        }

        Ok(json!({
            "id": id,
            "type": self.type_name(),
            "bs:action": "view",
            "attributes": attributes,
            "relationships": relationships,
        }))
    }
}

/// Remove `id` from the `field` lists of every row in `table`
fn unlink(db: &MemoryDatabase, table: &str, field: &str, id: &str) -> Result<(), StorageError> {
    for row in db.list(table)? {
        if !links_to(&row, field, id) {
            continue;
        }
        let remaining: Vec<Value> = row[field]
            .as_array()
            .map(|ids| ids.iter().filter(|v| *v != id).cloned().collect())
            .unwrap_or_default();
        let mut patch = Map::new();
        patch.insert(field.to_string(), Value::Array(remaining));
        db.update(table, row["id"].as_str().unwrap_or_default(), patch)?;
    }
    Ok(())
}

fn links_to(row: &Value, field: &str, id: &str) -> bool {
    row.get(field)
        .and_then(Value::as_array)
        .is_some_and(|ids| ids.iter().any(|v| v == id))
}

fn clean_value(
    kind: AttributeKind,
    required: bool,
    value: &Value,
) -> Result<Value, (&'static str, &'static str)> {
    const STRING_TYPE: (&str, &str) = ("string_type", "Input should be a valid string");

    if value.is_null() {
        return if required { Err(STRING_TYPE) } else { Ok(Value::Null) };
    }
    match kind {
        AttributeKind::Text => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or(STRING_TYPE),
        AttributeKind::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or(("bool_type", "Input should be a valid boolean")),
        AttributeKind::Decimal => match value {
            Value::String(s) if is_decimal(s.trim()) => Ok(Value::String(s.trim().to_string())),
            Value::String(_) => Err(("decimal_parsing", "Input should be a valid decimal")),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err((
                "decimal_type",
                "Decimal input should be an integer, float, string or Decimal object",
            )),
        },
        AttributeKind::DateTime => value
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| Value::String(dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)))
            .ok_or(("datetime_parsing", "Input should be a valid datetime")),
    }
}

fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

fn matches_filter(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Null => expected == "null",
        other => other.to_string() == expected,
    }
}

/// Sort position of a stored value. Classes order as null, bool, number,
/// text, then anything else; decimal attributes are stored as strings and
/// sort with the numbers.
enum SortKey<'a> {
    Null,
    Bool(bool),
    Number(f64),
    Text(&'a str),
    Other,
}

impl<'a> SortKey<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value.unwrap_or(&Value::Null) {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Other, Self::Number),
            Value::String(s) => s.parse::<f64>().map_or(Self::Text(s), Self::Number),
            Value::Array(_) | Value::Object(_) => Self::Other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Text(_) => 3,
            Self::Other => 4,
        }
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (SortKey::of(a), SortKey::of(b)) {
        (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(&y),
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(&y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (x, y) => x.rank().cmp(&y.rank()),
    }
}

fn page_param(req: &HandlerRequest, name: &str) -> Result<Option<usize>, HandlerError> {
    req.query_param(name)
        .map(|value| {
            value.parse::<usize>().map_err(|_| {
                HandlerError::BadRequest(format!("{} must be a non-negative integer", name))
            })
        })
        .transpose()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
