//! Update document evaluation for in-memory documents.
//!
//! An update is either a replacement document or a set of operators: `$set`,
//! `$unset`, `$inc`, `$push`, `$addToSet`, and `$pull`. Operator paths may be
//! dotted; missing intermediate documents are created.

use bson::{Bson, Document};

use docmapper_core::{
    error::{MapperError, MapperResult},
    identifier::ID_FIELD,
};

use crate::evaluator::{Comparable, lookup};

fn is_operator_update(update: &Document) -> bool {
    update
        .keys()
        .next()
        .is_some_and(|key| key.starts_with('$'))
}

fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(*value as f64),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn add_long(a: i64, b: i64, path: &str) -> MapperResult<Bson> {
    a.checked_add(b)
        .map(Bson::Int64)
        .ok_or_else(|| MapperError::InvalidDocument(format!("Increment of {path} overflows a 64-bit integer")))
}

fn increment(current: Option<&Bson>, by: &Bson, path: &str) -> MapperResult<Bson> {
    let current = current.cloned().unwrap_or(Bson::Int32(0));

    match (&current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b)))),
        (Bson::Int64(a), Bson::Int32(b)) => add_long(*a, i64::from(*b), path),
        (Bson::Int32(a), Bson::Int64(b)) => add_long(i64::from(*a), *b, path),
        (Bson::Int64(a), Bson::Int64(b)) => add_long(*a, *b, path),
        _ => match (number(&current), number(by)) {
            (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
            _ => Err(MapperError::InvalidDocument(format!("Cannot increment non-numeric field {path}"))),
        },
    }
}

fn array_at(document: &Document, path: &str, operator: &str) -> MapperResult<Vec<Bson>> {
    match lookup(document, path) {
        Some(Bson::Array(items)) => Ok(items.clone()),
        None => Ok(Vec::new()),
        Some(_) => Err(MapperError::InvalidDocument(format!("{operator} on non-array field {path}"))),
    }
}

/// Applies `update` to `document`.
///
/// A replacement keeps the stored `_id`. The document is left untouched when the
/// update fails.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> MapperResult<()> {
    if !is_operator_update(update) {
        let mut replacement = Document::new();

        if let Some(id) = document.get(ID_FIELD).or_else(|| update.get(ID_FIELD)) {
            replacement.insert(ID_FIELD, id.clone());
        }

        for (key, value) in update {
            if key != ID_FIELD {
                replacement.insert(key.clone(), value.clone());
            }
        }

        *document = replacement;
        return Ok(());
    }

    let mut updated = document.clone();

    for (operator, fields) in update {
        let fields = fields
            .as_document()
            .ok_or_else(|| MapperError::InvalidDocument(format!("{operator} expects a document")))?;

        for (path, value) in fields {
            match operator.as_str() {
                "$set" => set_path(&mut updated, path, value.clone()),
                "$unset" => unset_path(&mut updated, path),
                "$inc" => {
                    let incremented = increment(lookup(&updated, path), value, path)?;
                    set_path(&mut updated, path, incremented);
                }
                "$push" => {
                    let mut items = array_at(&updated, path, operator)?;
                    items.push(value.clone());
                    set_path(&mut updated, path, Bson::Array(items));
                }
                "$addToSet" => {
                    let mut items = array_at(&updated, path, operator)?;
                    if !items.iter().any(|item| Comparable::from(item) == Comparable::from(value)) {
                        items.push(value.clone());
                    }
                    set_path(&mut updated, path, Bson::Array(items));
                }
                "$pull" => {
                    let mut items = array_at(&updated, path, operator)?;
                    items.retain(|item| Comparable::from(item) != Comparable::from(value));
                    set_path(&mut updated, path, Bson::Array(items));
                }
                other => {
                    return Err(MapperError::Backend(format!("Unsupported update operator: {other}")));
                }
            }
        }
    }

    *document = updated;

    Ok(())
}

/// Builds the document inserted by an upsert from the equality clauses of `filter`.
pub(crate) fn upsert_seed(filter: &Document) -> Document {
    filter
        .iter()
        .filter(|(key, value)| {
            !key.starts_with('$')
                && !matches!(value, Bson::Document(inner) if inner.keys().next().is_some_and(|key| key.starts_with('$')))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
