use anyhow::Result;
use moka::future::Cache;
use std::time::Duration;

use crate::model::student::{STUDENT_PARTITION, Student};
use crate::store::{StoreError, Table, TableStore};

/// Read-through cache in front of the `Students` table. Attendance resolves
/// a student's owning center through here on every record.
#[derive(Clone)]
pub struct StudentDirectory {
    store: TableStore,
    cache: Cache<String, Student>,
}

impl StudentDirectory {
    pub fn new(store: TableStore, capacity: u64, ttl: Duration) -> Self {
        Self {
            store,
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub async fn get(&self, student_id: &str) -> Result<Option<Student>, StoreError> {
        if let Some(student) = self.cache.get(student_id).await {
            return Ok(Some(student));
        }

        let student: Option<Student> = self
            .store
            .get(Table::Students, STUDENT_PARTITION, student_id)
            .await?;

        if let Some(s) = &student {
            self.cache.insert(s.id.clone(), s.clone()).await;
        }
        Ok(student)
    }

    /// Persist and refresh the cached copy.
    pub async fn save(&self, student: &Student) -> Result<(), StoreError> {
        self.store
            .upsert(Table::Students, STUDENT_PARTITION, &student.id, student)
            .await?;
        self.cache.insert(student.id.clone(), student.clone()).await;
        Ok(())
    }

    /// Every student, straight from storage.
    pub async fn list_all(&self) -> Result<Vec<Student>, StoreError> {
        let rows = self
            .store
            .query_partition::<Student>(Table::Students, STUDENT_PARTITION)
            .await?;
        Ok(rows.into_iter().map(|e| e.value).collect())
    }

    /// Batch insert into the cache
    async fn batch_cache(&self, students: &[Student]) {
        let futures: Vec<_> = students
            .iter()
            .map(|s| self.cache.insert(s.id.clone(), s.clone()))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Load the student table into the cache in batches.
    pub async fn warmup(&self, batch_size: usize) -> Result<()> {
        let students = self.list_all().await?;
        let batch_size = batch_size.max(1);

        for batch in students.chunks(batch_size) {
            self.batch_cache(batch).await;
        }

        log::info!("Student cache warmup complete: {} students", students.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::student::StudentStatus;
    use crate::store::MemoryTables;
    use chrono::{NaiveDate, Utc};

    fn student(id: &str, center: &str) -> Student {
        Student {
            id: id.into(),
            first_name: "Amina".into(),
            last_name: "Yusuf".into(),
            center_id: center.into(),
            email: None,
            status: StudentStatus::Active,
            enrolled_at: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn directory() -> StudentDirectory {
        let store = TableStore::Memory(MemoryTables::default());
        StudentDirectory::new(store, 100, Duration::from_secs(60))
    }

    #[actix_web::test]
    async fn save_then_get_returns_latest_center() {
        let dir = directory();
        dir.save(&student("s1", "north")).await.unwrap();
        dir.save(&student("s1", "south")).await.unwrap();

        let found = dir.get("s1").await.unwrap().unwrap();
        assert_eq!(found.center_id, "south");
        assert!(dir.get("missing").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn get_reads_through_to_storage() {
        let dir = directory();
        let s = student("s2", "north");
        dir.store()
            .upsert(Table::Students, STUDENT_PARTITION, "s2", &s)
            .await
            .unwrap();

        assert_eq!(dir.get("s2").await.unwrap().unwrap().center_id, "north");
    }

    #[actix_web::test]
    async fn warmup_loads_every_student() {
        let dir = directory();
        for i in 0..5 {
            dir.save(&student(&format!("s{i}"), "north")).await.unwrap();
        }

        dir.warmup(2).await.unwrap();
        assert_eq!(dir.list_all().await.unwrap().len(), 5);
    }
}
