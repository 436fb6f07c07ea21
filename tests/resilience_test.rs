mod helpers;

use tempfile::TempDir;
use tessera::config::{StorageConfig, TesseraConfig};
use tessera::db;
use tessera::error::MemoryError;
use tessera::memory::store::MemoryStore;
use tessera::memory::types::{NewMemory, Source};
use tessera::server::build_service;

fn memory(text: &str) -> NewMemory {
    NewMemory {
        text: text.into(),
        tags: vec!["test".into()],
        source: Source::Explicit,
        model: helpers::test_model(),
        embedding: helpers::hash_embedding(text),
    }
}

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");

    assert!(!db_path.exists());

    let store = MemoryStore::open(&db_path, &StorageConfig::default()).unwrap();

    assert!(db_path.exists());
    assert_eq!(store.count_memories().unwrap(), 0);
}

#[test]
fn health_check_passes_on_valid_db() {
    let store = MemoryStore::open_in_memory().unwrap();
    let report = store.health().unwrap();
    assert!(report.integrity_ok);
    assert_eq!(report.schema_version, db::migrations::CURRENT_SCHEMA_VERSION);
    assert_eq!(report.memory_count, 0);
    assert_eq!(report.history_count, 0);
    assert!(report.embedding_model.is_none());
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("test.db");

    let conn = db::open_database(&db_path, 5000).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let sync: i64 = conn
        .pragma_query_value(None, "synchronous", |row| row.get(0))
        .unwrap();
    assert_eq!(sync, 2, "synchronous should be FULL");
}

#[test]
fn second_open_of_same_file_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("locked.db");
    let config = StorageConfig {
        busy_timeout_ms: 50,
        ..StorageConfig::default()
    };

    let mut first = MemoryStore::open(&db_path, &config).unwrap();
    let second = MemoryStore::open(&db_path, &config);
    assert!(matches!(second, Err(MemoryError::StorageUnavailable(_))));

    first.close().unwrap();
    assert!(MemoryStore::open(&db_path, &config).is_ok());
}

#[test]
fn saved_memories_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("durable.db");
    let config = StorageConfig::default();

    let id = {
        let mut store = MemoryStore::open(&db_path, &config).unwrap();
        let id = store.save_memory(memory("I prefer dark mode")).unwrap();
        store.close().unwrap();
        id
    };

    let store = MemoryStore::open(&db_path, &config).unwrap();
    let item = store.get_memory(&id).unwrap();
    assert_eq!(item.text, "I prefer dark mode");
    assert_eq!(item.tags, vec!["test"]);
    assert_eq!(store.lexical_search_memories("dark", 5).unwrap().len(), 1);
    assert_eq!(
        store.embedding_model().unwrap().as_deref(),
        Some("test/hash-256")
    );
}

#[test]
fn closed_store_rejects_every_operation() {
    let mut store = MemoryStore::open_in_memory().unwrap();
    store.close().unwrap();

    assert!(store.is_closed());
    assert!(matches!(store.close(), Err(MemoryError::StoreClosed)));
    assert!(matches!(store.list_memories(None), Err(MemoryError::StoreClosed)));
    assert!(matches!(
        store.save_memory(memory("too late")),
        Err(MemoryError::StoreClosed)
    ));
    assert!(matches!(store.clear_history(), Err(MemoryError::StoreClosed)));
}

#[test]
fn misconfigured_rewriter_does_not_block_startup() {
    let tmp = TempDir::new().unwrap();
    let mut config = TesseraConfig::default();
    config.storage.db_path = tmp.path().join("memory.db").to_string_lossy().into_owned();
    config.provider.openai.api_key = Some("sk-test".into());
    config.rewrite.enabled = true;
    config.rewrite.provider = "carrier-pigeon".into();

    let service = build_service(config).unwrap();
    assert!(!service.has_rewriter());
}
