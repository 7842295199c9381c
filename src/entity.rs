//! Core entity trait that all cached records must implement.

use crate::key::{Field, FieldValue, Table};
use std::any::Any;
use std::sync::Arc;

/// Trait that all records stored in cache must implement.
///
/// Field access is resolved at compile time per type, so the cache can read
/// the key and filter fields of any record shape without reflection.
///
/// # Example
///
/// ```
/// use dao_cache::{CacheEntity, Field, FieldValue};
///
/// #[derive(Clone)]
/// pub struct Employment {
///     pub id: u64,
///     pub employer_name: String,
/// }
///
/// impl CacheEntity for Employment {
///     fn table_name() -> &'static str {
///         "Employment"
///     }
///
///     fn field_value(&self, field: &Field) -> Option<FieldValue> {
///         match field.as_str() {
///             "ID" => Some(self.id.into()),
///             "EmployerName" => Some(self.employer_name.clone().into()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait CacheEntity: Clone + Send + Sync + 'static {
    /// Return the table this entity type is cached under.
    ///
    /// Never reuse one name for two distinct entity shapes.
    fn table_name() -> &'static str;

    /// Read the named attribute, or `None` if the record has no such field.
    fn field_value(&self, field: &Field) -> Option<FieldValue>;

    /// Whether this value is a nil record.
    ///
    /// Only nullable wrappers such as `Option<E>` ever report true.
    fn is_nil(&self) -> bool {
        false
    }

    /// Table identifier for this entity type.
    fn table() -> Table {
        Table::from_static(Self::table_name())
    }

    /// The record a pointer or nullable form wraps; `None` for plain records.
    #[doc(hidden)]
    fn pointee(&self) -> Option<Arc<dyn Record>> {
        None
    }
}

// ============================================================================
// Pointer and nullable forms
// ============================================================================

/// Shared-pointer form, cached under the same table as `E`.
impl<E: CacheEntity> CacheEntity for Arc<E> {
    fn table_name() -> &'static str {
        E::table_name()
    }

    fn field_value(&self, field: &Field) -> Option<FieldValue> {
        CacheEntity::field_value(&**self, field)
    }

    fn is_nil(&self) -> bool {
        CacheEntity::is_nil(&**self)
    }

    fn pointee(&self) -> Option<Arc<dyn Record>> {
        Some(Arc::clone(self) as Arc<dyn Record>)
    }
}

/// Nullable form; `None` is the nil record.
impl<E: CacheEntity> CacheEntity for Option<E> {
    fn table_name() -> &'static str {
        E::table_name()
    }

    fn field_value(&self, field: &Field) -> Option<FieldValue> {
        self.as_ref().and_then(|item| CacheEntity::field_value(item, field))
    }

    fn is_nil(&self) -> bool {
        self.as_ref().map_or(true, CacheEntity::is_nil)
    }

    fn pointee(&self) -> Option<Arc<dyn Record>> {
        self.clone().map(|item| Arc::new(item) as Arc<dyn Record>)
    }
}

/// Type-erased view of a cached record.
///
/// Blanket-implemented for every [`CacheEntity`]; the cache stores
/// `Arc<dyn Record>` so one registry can hold unrelated shapes.
pub trait Record: Any + Send + Sync {
    fn field_value(&self, field: &Field) -> Option<FieldValue>;

    fn is_nil(&self) -> bool;

    /// Concrete type name, used in diagnostics and mismatch errors.
    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    /// Re-wrap the record as `Box<Arc<E>>` for callers asking for the
    /// shared-pointer form.
    fn into_shared(self: Arc<Self>) -> Box<dyn Any>;

    /// Re-wrap the record as `Box<Option<E>>` for callers asking for the
    /// nullable form.
    fn into_nullable(&self) -> Box<dyn Any>;

    /// The record wrapped by a stored `Arc<E>` or `Some(E)`.
    fn pointee(&self) -> Option<Arc<dyn Record>>;
}

impl<E: CacheEntity> Record for E {
    fn field_value(&self, field: &Field) -> Option<FieldValue> {
        CacheEntity::field_value(self, field)
    }

    fn is_nil(&self) -> bool {
        CacheEntity::is_nil(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_shared(self: Arc<Self>) -> Box<dyn Any> {
        Box::new(self)
    }

    fn into_nullable(&self) -> Box<dyn Any> {
        Box::new(Some(self.clone()))
    }

    fn pointee(&self) -> Option<Arc<dyn Record>> {
        CacheEntity::pointee(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestEntity {
        id: String,
        value: String,
    }

    impl CacheEntity for TestEntity {
        fn table_name() -> &'static str {
            "TestEntity"
        }

        fn field_value(&self, field: &Field) -> Option<FieldValue> {
            match field.as_str() {
                "ID" => Some(self.id.clone().into()),
                "Value" => Some(self.value.clone().into()),
                _ => None,
            }
        }
    }

    fn entity(id: &str) -> TestEntity {
        TestEntity {
            id: id.to_string(),
            value: "data".to_string(),
        }
    }

    #[test]
    fn test_field_access() {
        let e = entity("entity_123");
        assert_eq!(
            CacheEntity::field_value(&e, &Field::from("ID")),
            Some(FieldValue::from("entity_123"))
        );
        assert_eq!(CacheEntity::field_value(&e, &Field::from("Missing")), None);
        assert_eq!(TestEntity::table(), Table::from("TestEntity"));
    }

    #[test]
    fn test_arc_entity_shares_table() {
        let e = Arc::new(entity("1"));
        assert_eq!(<Arc<TestEntity>>::table_name(), "TestEntity");
        assert_eq!(
            CacheEntity::field_value(&e, &Field::from("ID")),
            Some(FieldValue::from("1"))
        );
        assert!(!CacheEntity::is_nil(&e));
    }

    #[test]
    fn test_option_entity() {
        let some: Option<TestEntity> = Some(entity("opt_1"));
        assert!(!CacheEntity::is_nil(&some));
        assert_eq!(
            CacheEntity::field_value(&some, &Field::from("ID")),
            Some(FieldValue::from("opt_1"))
        );

        let none: Option<TestEntity> = None;
        assert!(CacheEntity::is_nil(&none));
        assert_eq!(CacheEntity::field_value(&none, &Field::from("ID")), None);
    }

    #[test]
    fn test_record_erasure() {
        let record: Arc<dyn Record> = Arc::new(entity("1"));
        assert!(record.type_name().ends_with("TestEntity"));
        assert!(record.as_any().downcast_ref::<TestEntity>().is_some());

        let nullable = record.into_nullable();
        assert_eq!(
            nullable.downcast_ref::<Option<TestEntity>>(),
            Some(&Some(entity("1")))
        );
        assert!(record.pointee().is_none());

        let shared = record.into_shared();
        assert!(shared.downcast_ref::<Arc<TestEntity>>().is_some());
    }

    #[test]
    fn test_pointee_of_wrapped_forms() {
        let shared: Arc<dyn Record> = Arc::new(Arc::new(entity("1")));
        let inner = shared.pointee().expect("Arc form wraps a record");
        assert!(inner.as_any().downcast_ref::<TestEntity>().is_some());

        let nullable: Arc<dyn Record> = Arc::new(Some(entity("2")));
        let inner = nullable.pointee().expect("Some form wraps a record");
        assert_eq!(
            inner.as_any().downcast_ref::<TestEntity>(),
            Some(&entity("2"))
        );

        let none: Arc<dyn Record> = Arc::new(None::<TestEntity>);
        assert!(none.pointee().is_none());
    }
}
