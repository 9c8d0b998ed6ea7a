#[cfg(test)]
pub mod test_utils {
    use crate::database::apply_schema;
    use crate::db::{create_specialty, insert_applicant};
    use crate::env::Settings;
    use crate::error::AppError;
    use crate::forms::{
        ApplicantForm, ApplicantSubmission, DocumentForm, HealthForm, ParentForm, SpecialtyData,
    };
    use crate::storage::{ScanStorage, sanitize_file_name};
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::io;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, Once};

    static INIT: Once = Once::new();

    fn init_test_logging() {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .parse_filters("debug,sqlx=warn")
                .is_test(true)
                .try_init();
        });
    }

    /// One connection that never expires, so the in-memory database lives as
    /// long as the pool does.
    pub async fn test_pool() -> Result<Pool<Sqlite>, AppError> {
        init_test_logging();

        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        apply_schema(&pool).await?;
        Ok(pool)
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        specialties: Vec<(String, Option<String>)>,
        applicants: Vec<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn specialty(mut self, name: &str, code: Option<&str>) -> Self {
            self.specialties
                .push((name.to_string(), code.map(String::from)));
            self
        }

        pub fn applicant(mut self, fio: &str) -> Self {
            self.applicants.push(fio.to_string());
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            let pool = test_pool().await?;

            let mut specialty_id_map = HashMap::new();
            for (name, code) in &self.specialties {
                let data = SpecialtyData {
                    name: name.clone(),
                    code: code.clone(),
                    description: String::new(),
                };
                let id = create_specialty(&pool, &data).await?;
                specialty_id_map.insert(name.clone(), id);
            }

            let mut applicant_id_map = HashMap::new();
            for fio in &self.applicants {
                let data = applicant_form(fio)
                    .clean()
                    .map_err(AppError::Form)?;
                let mut conn = pool.acquire().await?;
                let id = insert_applicant(&mut conn, &data).await?;
                applicant_id_map.insert(fio.clone(), id);
            }

            Ok(TestDb {
                pool,
                specialty_id_map,
                applicant_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub specialty_id_map: HashMap<String, i64>,
        pub applicant_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn specialty_id(&self, name: &str) -> Option<i64> {
            self.specialty_id_map.get(name).copied()
        }

        pub fn applicant_id(&self, fio: &str) -> Option<i64> {
            self.applicant_id_map.get(fio).copied()
        }

        pub async fn count(&self, table: &str) -> i64 {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
                .expect("Failed to count rows")
        }

        /// Row counts of every table a composite save can touch.
        pub async fn snapshot(&self) -> Vec<(&'static str, i64)> {
            let mut counts = Vec::new();
            for table in [
                "applicants",
                "parents",
                "applicant_parents",
                "health_records",
                "documents",
            ] {
                counts.push((table, self.count(table).await));
            }
            counts
        }
    }

    /// Scan storage kept in memory. Clones share the same files, so a test can
    /// keep one handle while the service owns another.
    #[derive(Clone, Default)]
    pub struct MemoryScanStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        counter: Arc<AtomicUsize>,
    }

    impl MemoryScanStorage {
        pub fn with_files(keys: &[&str]) -> Self {
            let storage = Self::default();
            {
                let mut files = storage.files.lock().expect("scan storage lock poisoned");
                for key in keys {
                    files.insert(key.to_string(), b"scan".to_vec());
                }
            }
            storage
        }

        pub fn contains(&self, key: &str) -> bool {
            self.files
                .lock()
                .expect("scan storage lock poisoned")
                .contains_key(key)
        }
    }

    #[rocket::async_trait]
    impl ScanStorage for MemoryScanStorage {
        async fn store(&self, file_name: &str, contents: &[u8]) -> io::Result<String> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let key = format!("documents/{}_{}", n, sanitize_file_name(file_name));
            self.files
                .lock()
                .map_err(|_| io::Error::other("scan storage lock poisoned"))?
                .insert(key.clone(), contents.to_vec());
            Ok(key)
        }

        async fn exists(&self, key: &str) -> io::Result<bool> {
            Ok(self.contains(key))
        }

        async fn delete(&self, key: &str) -> io::Result<()> {
            self.files
                .lock()
                .map_err(|_| io::Error::other("scan storage lock poisoned"))?
                .remove(key);
            Ok(())
        }
    }

    pub fn applicant_form(fio: &str) -> ApplicantForm {
        ApplicantForm {
            fio: fio.to_string(),
            date_of_birth: "2008-05-01".to_string(),
            class_of_entry: "9".to_string(),
            phone: "+79001234567".to_string(),
            address: "Москва".to_string(),
            email: "i@example.com".to_string(),
            ..Default::default()
        }
    }

    pub fn parent_form(fio: &str, phone: &str) -> ParentForm {
        ParentForm {
            fio: fio.to_string(),
            phone: phone.to_string(),
            ..Default::default()
        }
    }

    pub fn document_form(scan: Option<&str>, description: &str) -> DocumentForm {
        DocumentForm {
            doc_type: "package".to_string(),
            scan: scan.map(String::from),
            description: description.to_string(),
            ..Default::default()
        }
    }

    /// The reference submission: applicant and mother filled in, father left
    /// empty, health with only the disability flag.
    pub fn standard_submission() -> ApplicantSubmission {
        ApplicantSubmission {
            applicant: applicant_form("Иванов Иван"),
            mother: parent_form("Иванова Мария", "+79007654321"),
            father: ParentForm::default(),
            health: HealthForm {
                disability: Some(false),
                ..Default::default()
            },
            documents: Vec::new(),
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .specialty("Программирование в компьютерных системах", Some("09.02.03"))
            .specialty("Информационные системы", Some("09.02.07"))
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, MemoryScanStorage) {
        let storage = MemoryScanStorage::default();
        let settings = Settings {
            max_scan_size_mb: 1,
            page_size: 2,
            ..Settings::default()
        };

        let rocket = crate::init_rocket(test_db.pool, Box::new(storage.clone()), settings);
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, storage)
    }
}
