#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use actix_web::test::TestRequest;
use chrono::{NaiveDate, Utc};
use edutrack::auth::jwt::generate_access_token;
use edutrack::config::{Config, StorageBackend};
use edutrack::model::role::Role;
use edutrack::model::student::{Student, StudentStatus};
use edutrack::store::{MemoryTables, TableStore};
use edutrack::utils::student_directory::StudentDirectory;

pub const SECRET: &str = "integration-test-secret";

pub fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".into(),
        jwt_secret: SECRET.into(),
        storage_backend: StorageBackend::Memory,
        database_url: None,
        rate_protected_per_min: 100_000,
        api_prefix: "/api".into(),
        student_cache_capacity: 1_000,
        student_cache_ttl_secs: 60,
        log_dir: "logs".into(),
    }
}

#[derive(Clone)]
pub struct TestState {
    pub config: Config,
    pub store: TableStore,
    /// Same tables as `store`, for switching a table read-only.
    pub memory: MemoryTables,
    pub directory: StudentDirectory,
}

impl TestState {
    pub fn new() -> Self {
        let memory = MemoryTables::default();
        let store = TableStore::Memory(memory.clone());
        let directory = StudentDirectory::new(store.clone(), 1_000, Duration::from_secs(60));
        Self {
            config: test_config(),
            store,
            memory,
            directory,
        }
    }

    pub async fn add_student(&self, id: &str, first: &str, last: &str, center: &str) -> Student {
        let student = Student {
            id: id.into(),
            first_name: first.into(),
            last_name: last.into(),
            center_id: center.into(),
            email: None,
            status: StudentStatus::Active,
            enrolled_at: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            created_at: Utc::now(),
        };
        self.directory.save(&student).await.unwrap();
        student
    }
}

/// Builds the full app (auth middleware, rate limiter, routes) over `state`.
#[macro_export]
macro_rules! test_app {
    ($state:expr) => {{
        let state: &$crate::common::TestState = &$state;
        let config = state.config.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state.store.clone()))
                .app_data(actix_web::web::Data::new(state.directory.clone()))
                .app_data(actix_web::web::Data::new(state.config.clone()))
                .configure(move |cfg| edutrack::routes::configure(cfg, config.clone())),
        )
        .await
    }};
}

pub fn admin_token() -> String {
    generate_access_token("admin-1", Some("Ada".into()), Role::Admin, None, SECRET, 3600).unwrap()
}

pub fn staff_token(center: &str) -> String {
    generate_access_token(
        &format!("staff-{center}"),
        None,
        Role::Staff,
        Some(center.into()),
        SECRET,
        3600,
    )
    .unwrap()
}

fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn get(uri: &str, token: &str) -> TestRequest {
    TestRequest::get()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {token}")))
}

pub fn post(uri: &str, token: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::post()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body)
}

pub fn put(uri: &str, token: &str, body: serde_json::Value) -> TestRequest {
    TestRequest::put()
        .uri(uri)
        .peer_addr(peer())
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(body)
}

pub fn anonymous_get(uri: &str) -> TestRequest {
    TestRequest::get().uri(uri).peer_addr(peer())
}
