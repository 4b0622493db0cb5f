//! In-memory tables for students, classes and registrations
//!
//! A single lock guards all three tables so cascading deletes and
//! registration inserts see a consistent view.

use chrono::Utc;
use classroll::{
    error::{Error, Result},
    query::{FilterClause, FilterOp, Operand, Value},
};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::models::{
    registration::{RegistrationKey, INVALID_CLASS_URL, INVALID_STUDENT_URL},
    Class, Registration, Student,
};

pub const NOT_FOUND_MESSAGE: &str = "item not found";

/// Rows of one table, borrowed under the read lock
pub type Rows<'a, T> = RwLockReadGuard<'a, [T]>;

// every table is kept sorted by its key
#[derive(Debug, Default)]
struct Tables {
    students: Vec<Student>,
    classes: Vec<Class>,
    registrations: Vec<Registration>,
    last_student_id: i64,
    last_class_id: i64,
}

impl Tables {
    fn student_index(&self, id: i64) -> Result<usize> {
        self.students
            .binary_search_by_key(&id, |s| s.id)
            .map_err(|_| not_found())
    }

    fn class_index(&self, id: i64) -> Result<usize> {
        self.classes
            .binary_search_by_key(&id, |c| c.id)
            .map_err(|_| not_found())
    }

    fn registration_slot(&self, key: RegistrationKey) -> std::result::Result<usize, usize> {
        self.registrations
            .binary_search_by_key(&(key.student_id, key.class_id), |r| {
                (r.student_id, r.class_id)
            })
    }

    fn cascade(&mut self, keep: impl Fn(&Registration) -> bool) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|registration| keep(registration));
        before - self.registrations.len()
    }
}

fn not_found() -> Error {
    Error::NotFound(NOT_FOUND_MESSAGE.to_string())
}

/// The record a nested registrations listing hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Student(i64),
    Class(i64),
}

impl Owner {
    /// Clause selecting this owner's registrations
    pub fn clause(self) -> FilterClause {
        let (field, id) = match self {
            Owner::Student(id) => ("student_id", id),
            Owner::Class(id) => ("class_id", id),
        };
        FilterClause {
            field: field.to_string(),
            op: FilterOp::Eq,
            operand: Operand::Single(Value::Integer(id)),
        }
    }
}

/// Shared school data
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn students(&self) -> Rows<'_, Student> {
        RwLockReadGuard::map(self.tables.read().await, |t| t.students.as_slice())
    }

    pub async fn student(&self, id: i64) -> Result<Student> {
        let tables = self.tables.read().await;
        let index = tables.student_index(id)?;
        Ok(tables.students[index].clone())
    }

    pub async fn insert_student(&self, name: String) -> Student {
        let mut tables = self.tables.write().await;
        tables.last_student_id += 1;
        let student = Student {
            id: tables.last_student_id,
            name,
        };
        tables.students.push(student.clone());
        student
    }

    pub async fn rename_student(&self, id: i64, name: String) -> Result<Student> {
        let mut tables = self.tables.write().await;
        let index = tables.student_index(id)?;
        let student = &mut tables.students[index];
        student.name = name;
        Ok(student.clone())
    }

    /// Delete a student and every registration of it
    pub async fn delete_student(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let index = tables.student_index(id)?;
        tables.students.remove(index);
        let removed = tables.cascade(|r| r.student_id != id);
        tracing::debug!("Deleted student {} and {} registrations", id, removed);
        Ok(())
    }

    pub async fn classes(&self) -> Rows<'_, Class> {
        RwLockReadGuard::map(self.tables.read().await, |t| t.classes.as_slice())
    }

    pub async fn class(&self, id: i64) -> Result<Class> {
        let tables = self.tables.read().await;
        let index = tables.class_index(id)?;
        Ok(tables.classes[index].clone())
    }

    pub async fn insert_class(&self, name: String) -> Class {
        let mut tables = self.tables.write().await;
        tables.last_class_id += 1;
        let class = Class {
            id: tables.last_class_id,
            name,
        };
        tables.classes.push(class.clone());
        class
    }

    pub async fn rename_class(&self, id: i64, name: String) -> Result<Class> {
        let mut tables = self.tables.write().await;
        let index = tables.class_index(id)?;
        let class = &mut tables.classes[index];
        class.name = name;
        Ok(class.clone())
    }

    /// Delete a class and every registration in it
    pub async fn delete_class(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let index = tables.class_index(id)?;
        tables.classes.remove(index);
        let removed = tables.cascade(|r| r.class_id != id);
        tracing::debug!("Deleted class {} and {} registrations", id, removed);
        Ok(())
    }

    pub async fn registrations(&self) -> Rows<'_, Registration> {
        RwLockReadGuard::map(self.tables.read().await, |t| t.registrations.as_slice())
    }

    /// The registrations table, provided `owner` exists
    ///
    /// Narrow it with [`Owner::clause`].
    pub async fn owned_registrations(&self, owner: Owner) -> Result<Rows<'_, Registration>> {
        let tables = self.tables.read().await;
        match owner {
            Owner::Student(id) => tables.student_index(id)?,
            Owner::Class(id) => tables.class_index(id)?,
        };
        Ok(RwLockReadGuard::map(tables, |t| t.registrations.as_slice()))
    }

    pub async fn registration(&self, key: RegistrationKey) -> Result<Registration> {
        let tables = self.tables.read().await;
        let index = tables.registration_slot(key).map_err(|_| not_found())?;
        Ok(tables.registrations[index].clone())
    }

    /// Register a student in a class, stamped with the current time
    ///
    /// Both records must exist, and a student registers in a class once.
    pub async fn insert_registration(&self, key: RegistrationKey) -> Result<Registration> {
        let mut tables = self.tables.write().await;
        if tables.student_index(key.student_id).is_err() {
            return Err(Error::Validation(INVALID_STUDENT_URL.to_string()));
        }
        if tables.class_index(key.class_id).is_err() {
            return Err(Error::Validation(INVALID_CLASS_URL.to_string()));
        }
        let Err(slot) = tables.registration_slot(key) else {
            return Err(Error::Validation(
                "Student is already registered in this class".to_string(),
            ));
        };

        let registration = Registration {
            student_id: key.student_id,
            class_id: key.class_id,
            timestamp: Utc::now(),
        };
        tables.registrations.insert(slot, registration.clone());
        Ok(registration)
    }

    pub async fn delete_registration(&self, key: RegistrationKey) -> Result<()> {
        let mut tables = self.tables.write().await;
        let index = tables.registration_slot(key).map_err(|_| not_found())?;
        tables.registrations.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(student_id: i64, class_id: i64) -> RegistrationKey {
        RegistrationKey {
            student_id,
            class_id,
        }
    }

    async fn seeded() -> Store {
        let store = Store::new();
        for name in ["susan", "john"] {
            store.insert_student(name.to_string()).await;
        }
        for name in ["algebra", "biology"] {
            store.insert_class(name.to_string()).await;
        }
        for (student, class) in [(1, 1), (1, 2), (2, 1)] {
            store.insert_registration(key(student, class)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let store = Store::new();
        assert_eq!(store.insert_student("susan".to_string()).await.id, 1);
        store.delete_student(1).await.unwrap();
        assert_eq!(store.insert_student("john".to_string()).await.id, 2);
    }

    #[tokio::test]
    async fn test_rename_missing_is_not_found() {
        let store = Store::new();
        let err = store.rename_class(9, "art".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg == NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_delete_student_cascades() {
        let store = seeded().await;
        store.delete_student(1).await.unwrap();

        let left: Vec<_> = store.registrations().await.iter().map(Registration::key).collect();
        assert_eq!(left, vec![key(2, 1)]);
        assert!(store.owned_registrations(Owner::Student(1)).await.is_err());
        assert!(store.student(1).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_class_cascades() {
        let store = seeded().await;
        store.delete_class(1).await.unwrap();

        let left: Vec<_> = store.registrations().await.iter().map(Registration::key).collect();
        assert_eq!(left, vec![key(1, 2)]);
        let classes: Vec<_> = store.classes().await.iter().map(|c| c.id).collect();
        assert_eq!(classes, vec![2]);
    }

    #[tokio::test]
    async fn test_registration_requires_existing_records() {
        let store = seeded().await;

        let err = store.insert_registration(key(5, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg == INVALID_STUDENT_URL));

        let err = store.insert_registration(key(1, 5)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg == INVALID_CLASS_URL));

        let err = store.insert_registration(key(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_registrations_stay_in_key_order() {
        let store = seeded().await;
        store.insert_registration(key(2, 2)).await.unwrap();
        store.insert_registration(key(1, 3)).await.unwrap_err();
        store.delete_registration(key(1, 1)).await.unwrap();

        let keys: Vec<_> = store.registrations().await.iter().map(Registration::key).collect();
        assert_eq!(keys, vec![key(1, 2), key(2, 1), key(2, 2)]);
        assert!(matches!(
            store.delete_registration(key(1, 1)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_owned_registrations_need_an_owner() {
        let store = seeded().await;
        let clause = Owner::Class(1).clause();
        let students: Vec<_> = store
            .owned_registrations(Owner::Class(1))
            .await
            .unwrap()
            .iter()
            .filter(|r| clause.matches(&Value::Integer(r.class_id)))
            .map(|r| r.student_id)
            .collect();
        assert_eq!(students, vec![1, 2]);
        assert!(matches!(
            store.owned_registrations(Owner::Class(7)).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.owned_registrations(Owner::Student(7)).await,
            Err(Error::NotFound(_))
        ));
    }
}
