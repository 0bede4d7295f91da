//! Filter, projection, and sort evaluation for in-memory documents.
//!
//! Filters use the MongoDB query dialect: implicit equality on (dotted) field
//! paths, the comparison operators, `$in`/`$nin`, `$exists`, `$size`, `$not`, and
//! the logical `$and`/`$or`/`$nor`. Values of different types are ordered the way
//! MongoDB orders BSON types.

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmapper_core::{
    error::{MapperError, MapperResult},
    identifier::ID_FIELD,
};


/// Totally ordered view of a BSON value.
///
/// All numeric types are normalized to f64. Types without a natural order
/// compare as null.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Embedded document, fields in stored order
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Document identifier
    ObjectId(ObjectId),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl Ord for Comparable<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Comparable::String(a), Comparable::String(b)) => a.cmp(b),
            (Comparable::Map(a), Comparable::Map(b)) => a.cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a.cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.cmp(b),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Comparable<'_> {}

/// Resolves a dotted path inside a document. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn unsupported(operator: &str) -> MapperError {
    MapperError::Backend(format!("Unsupported query operator: {operator}"))
}

fn is_operator_document(document: &Document) -> bool {
    document
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

/// Equality with MongoDB semantics: null matches a missing field, and a scalar
/// matches an array containing it.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let Some(value) = value else {
        return matches!(expected, Bson::Null);
    };

    let expected = Comparable::from(expected);

    if Comparable::from(value) == expected {
        return true;
    }

    match value {
        Bson::Array(items) => items.iter().any(|item| Comparable::from(item) == expected),
        _ => false,
    }
}

/// Ordered comparison; only values of the same type bracket are compared.
fn compares(value: Option<&Bson>, operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let operand = Comparable::from(operand);
    let check = |item: &Bson| {
        let item = Comparable::from(item);
        item.rank() == operand.rank() && accept(item.cmp(&operand))
    };

    match value {
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
        None => false,
    }
}

fn operand_array<'b>(operator: &str, operand: &'b Bson) -> MapperResult<&'b Vec<Bson>> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(MapperError::InvalidDocument(format!("{operator} expects an array"))),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> MapperResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(key, condition)?,
                "$or" => self.any(key, condition)?,
                "$nor" => !self.any(key, condition)?,
                operator if operator.starts_with('$') => return Err(unsupported(operator)),
                path => self.matches_field(lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> MapperResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clauses<'b>(operator: &str, condition: &'b Bson) -> MapperResult<Vec<&'b Document>> {
        operand_array(operator, condition)?
            .iter()
            .map(|clause| {
                clause
                    .as_document()
                    .ok_or_else(|| MapperError::InvalidDocument(format!("{operator} expects documents")))
            })
            .collect()
    }

    fn all(&self, operator: &str, condition: &Bson) -> MapperResult<bool> {
        for clause in Self::clauses(operator, condition)? {
            if !self.matches(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, operator: &str, condition: &Bson) -> MapperResult<bool> {
        for clause in Self::clauses(operator, condition)? {
            if self.matches(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn matches_field(&self, value: Option<&Bson>, condition: &Bson) -> MapperResult<bool> {
        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (operator, operand) in operators {
                    if !self.apply_operator(value, operator, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            _ => Ok(equals(value, condition)),
        }
    }

    fn apply_operator(&self, value: Option<&Bson>, operator: &str, operand: &Bson) -> MapperResult<bool> {
        Ok(match operator {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, Ordering::is_gt),
            "$gte" => compares(value, operand, Ordering::is_ge),
            "$lt" => compares(value, operand, Ordering::is_lt),
            "$lte" => compares(value, operand, Ordering::is_le),
            "$in" => operand_array(operator, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$nin" => !operand_array(operator, operand)?
                .iter()
                .any(|candidate| equals(value, candidate)),
            "$exists" => value.is_some() == truthy(operand),
            "$size" => match (value, operand.as_i64().or_else(|| operand.as_i32().map(i64::from))) {
                (Some(Bson::Array(items)), Some(size)) => items.len() as i64 == size,
                _ => false,
            },
            "$not" => !self.matches_field(value, operand)?,
            other => return Err(unsupported(other)),
        })
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        _ => true,
    }
}

/// Applies a top-level projection.
///
/// A projection including any field other than `_id` keeps only the included
/// fields (plus `_id` unless excluded); otherwise the listed fields are removed.
pub(crate) fn project(document: Document, projection: Option<&Document>) -> Document {
    let projection = match projection {
        Some(projection) if !projection.is_empty() => projection,
        _ => return document,
    };

    let inclusive = projection
        .iter()
        .any(|(key, value)| key != ID_FIELD && truthy(value));

    if inclusive {
        let keep_id = projection.get(ID_FIELD).is_none_or(truthy);

        document
            .into_iter()
            .filter(|(key, _)| match key.as_str() {
                ID_FIELD => keep_id,
                key => projection.get(key).is_some_and(truthy),
            })
            .collect()
    } else {
        document
            .into_iter()
            .filter(|(key, _)| !projection.get(key).is_some_and(|value| !truthy(value)))
            .collect()
    }
}

fn descending(direction: &Bson) -> bool {
    match direction {
        Bson::String(direction) => direction.eq_ignore_ascii_case("desc") || direction.eq_ignore_ascii_case("descending"),
        Bson::Int32(direction) => *direction < 0,
        Bson::Int64(direction) => *direction < 0,
        Bson::Double(direction) => *direction < 0.0,
        _ => false,
    }
}

/// Compares two documents by a sort specification such as `{ "a": 1, "b": -1 }`.
pub(crate) fn compare_documents(left: &Document, right: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ordering = lookup(left, field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null)
            .cmp(
                &lookup(right, field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null)
            );

        let ordering = if descending(direction) { ordering.reverse() } else { ordering };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Stable multi-key sort.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) {
    documents.sort_by(|left, right| compare_documents(left, right, sort));
}
