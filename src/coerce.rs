//! Conversion of type-erased cached records into the caller's requested type.
//!
//! Attempts, first success wins:
//!
//! 1. The stored value is a `T`.
//! 2. `T` is the erased handle itself (`Arc<dyn Record>`).
//! 3. The stored value is a pointer or nullable wrapper (`Arc<E>`,
//!    `Some(E)`); the ladder is retried on the wrapped record.
//! 4. `T` is the shared-pointer (`Arc<E>`) or nullable (`Option<E>`) form
//!    of the stored `E`.

use crate::entity::Record;
use crate::error::{Error, Result};
use crate::key::Table;
use std::any::Any;
use std::sync::Arc;

/// Produce a `T` from a stored record, or `None` if no rule applies.
pub fn coerce<T: Clone + 'static>(record: &Arc<dyn Record>) -> Option<T> {
    if let Some(value) = record.as_any().downcast_ref::<T>() {
        return Some(value.clone());
    }

    if let Some(value) = (record as &dyn Any).downcast_ref::<T>() {
        return Some(value.clone());
    }

    if let Some(value) = record.pointee().and_then(|inner| coerce::<T>(&inner)) {
        return Some(value);
    }

    if let Ok(value) = record.into_nullable().downcast::<T>() {
        return Some(*value);
    }

    Arc::clone(record)
        .into_shared()
        .downcast::<T>()
        .ok()
        .map(|value| *value)
}

/// Like [`coerce`], but reports a mismatch naming both types.
pub fn coerce_record<T: Clone + 'static>(table: &Table, record: &Arc<dyn Record>) -> Result<T> {
    coerce::<T>(record).ok_or_else(|| Error::TypeMismatch {
        table: table.clone(),
        stored: record.type_name(),
        requested: std::any::type_name::<T>(),
    })
}
