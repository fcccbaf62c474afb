//! End-to-end coverage of the store surface against the in-memory driver.

use serde_json::{Value, json};

use aqldb_core::{
    backend::StoreBackend,
    filter::{CompareMode, FilterSpec},
    join::JoinStep,
    provision::{CreateOptions, DatabaseConfig, IndexSpec},
    query::QueryOptions,
    store::{AqlStore, StoreConfig},
};
use aqldb_memory::MemoryStore;

fn store() -> AqlStore<MemoryStore> {
    AqlStore::new(MemoryStore::new())
}

#[tokio::test]
async fn query_dump_logging_leaves_results_untouched() {
    let config = StoreConfig { query_dump: true };
    let store = AqlStore::with_config(MemoryStore::new(), config);
    let users = store.collection("users");

    users.add(json!({ "id": "u1", "name": "Mario" }), None).await;

    let found = users
        .find_all(&FilterSpec::new().field("name", "Mario"), None, None)
        .await;
    assert_eq!(found.len(), 1);
    assert_eq!(users.count(&FilterSpec::new().field("name", "Mario")).await, 1);
}

#[tokio::test]
async fn count_on_an_empty_collection_is_zero() {
    let store = store();
    let users = store.collection("users");

    assert_eq!(users.count(&FilterSpec::new()).await, 0);
}

#[tokio::test]
async fn count_ignores_pagination_in_the_filter() {
    let store = store();
    let users = store.collection("users");

    for (id, role) in [("a", "admin"), ("b", "user"), ("c", "admin"), ("d", "admin")] {
        users.add(json!({ "id": id, "role": role }), None).await;
    }

    let filter = FilterSpec::new().field("role", "admin").skip(1).rows(1);
    assert_eq!(users.count(&filter).await, 3);
}

#[tokio::test]
async fn add_inserts_then_merge_updates_by_persisted_id() {
    let store = store();
    let users = store.collection("users");

    let inserted = users
        .add(json!({ "id": "u1", "name": "Mario", "nickname": "Il Baffo" }), None)
        .await
        .unwrap();
    let id = inserted["_id"].as_str().unwrap().to_string();
    let created = inserted["created"].as_str().unwrap().to_string();
    let updated = inserted["updated"].as_str().unwrap().to_string();
    assert!(updated >= created);

    let mut patch = inserted.clone();
    patch["name"] = json!("Maria");
    let written = users.add(patch, None).await.unwrap();

    assert_eq!(written["_id"].as_str().unwrap(), id);
    assert_eq!(written["name"], "Maria");
    // Merge semantics: untouched fields and the insert timestamp survive.
    assert_eq!(written["nickname"], "Il Baffo");
    assert_eq!(written["created"].as_str().unwrap(), created);
    assert!(written["updated"].as_str().unwrap() >= updated.as_str());

    assert_eq!(users.count(&FilterSpec::new().field("id", "u1")).await, 1);
}

#[tokio::test]
async fn replace_drops_fields_absent_from_the_argument() {
    let store = store();
    let users = store.collection("users");

    let inserted = users
        .add(json!({ "id": "u1", "name": "Mario", "nickname": "Il Baffo" }), None)
        .await
        .unwrap();
    let id = inserted["_id"].as_str().unwrap();

    let replaced = users
        .replace(json!({ "_id": id, "id": "u1", "name": "Maria" }), None)
        .await
        .unwrap();

    assert_eq!(replaced["name"], "Maria");
    assert!(replaced.get("nickname").is_none());
    assert!(replaced.get("updated").is_some());
}

#[tokio::test]
async fn add_all_stamps_timestamps_on_every_document() {
    let store = store();
    let users = store.collection("users");

    let saved = users
        .add_all(vec![json!({ "id": "a" }), json!({ "id": "b" })])
        .await
        .unwrap();

    assert_eq!(saved.len(), 2);
    for doc in &saved {
        assert!(doc.get("created").is_some());
        assert!(doc.get("updated").is_some());
        assert!(doc.get("_id").is_some());
    }
}

#[tokio::test]
async fn find_one_refuses_an_empty_filter() {
    let store = store();
    let users = store.collection("users");
    users.add(json!({ "id": "u1" }), None).await;

    assert!(users.find_one(&FilterSpec::new(), None).await.is_none());
    assert!(
        users
            .find_one(&FilterSpec::new().field("id", "u1"), None)
            .await
            .is_some()
    );
}

#[tokio::test]
async fn membership_filters_match_any_listed_value() {
    let store = store();
    let users = store.collection("users");

    for id in ["a", "b", "c"] {
        users.add(json!({ "id": id }), None).await;
    }

    let filter = FilterSpec::new().term("id", CompareMode::In, json!(["a", "c", "zz"]));
    let found = users.find_all(&filter, None, None).await;
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn list_valued_fields_require_every_element() {
    let store = store();
    let posts = store.collection("posts");

    posts.add(json!({ "id": "p1", "tags": ["rust", "db"] }), None).await;
    posts.add(json!({ "id": "p2", "tags": ["rust"] }), None).await;
    posts.add(json!({ "id": "p3", "tags": ["db", "rust", "aql"] }), None).await;

    let filter = FilterSpec::new().field("tags", json!(["rust", "db"]));
    let found = posts.find_all(&filter, None, None).await;

    let ids: Vec<&str> = found.iter().filter_map(|d| d["id"].as_str()).collect();
    assert_eq!(ids, vec!["p1", "p3"]);
}

#[tokio::test]
async fn fulltext_filters_match_substrings_case_insensitively() {
    let store = store();
    let users = store.collection("users");

    users.add(json!({ "id": "u1", "name": "MARIO" }), None).await;
    users.add(json!({ "id": "u2", "name": "Luigi" }), None).await;

    let filter = FilterSpec::new().fulltext("name", "mar");
    let found = users.find_all(&filter, None, None).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "u1");
}

#[tokio::test]
async fn sort_and_pagination_shape_the_result_window() {
    let store = store();
    let nums = store.collection("nums");

    for n in [3, 1, 4, 2, 5] {
        nums.add(json!({ "n": n }), None).await;
    }

    let options = QueryOptions::new().sort("n", true).skip(1).rows(2);
    let found = nums.find_all(&FilterSpec::new(), Some(&options), None).await;

    let values: Vec<i64> = found.iter().filter_map(|d| d["n"].as_i64()).collect();
    assert_eq!(values, vec![4, 3]);
}

#[tokio::test]
async fn requesting_count_duplicates_the_total_onto_every_row() {
    let store = store();
    let nums = store.collection("nums");

    for n in 0..5 {
        nums.add(json!({ "n": n }), None).await;
    }

    let options = QueryOptions::new().rows(2).count(true);
    let found = nums.find_all(&FilterSpec::new(), Some(&options), None).await;

    assert_eq!(found.len(), 2);
    for row in &found {
        assert_eq!(row["__count"], json!(5));
    }
}

#[tokio::test]
async fn del_all_returns_the_logical_ids_it_removed() {
    let store = store();
    let users = store.collection("users");

    for (id, role) in [("a", "user"), ("b", "admin"), ("c", "user")] {
        users.add(json!({ "id": id, "role": role }), None).await;
    }

    let mut removed = users.del_all(&FilterSpec::new().field("role", "user")).await;
    removed.sort();
    assert_eq!(removed, vec!["a".to_string(), "c".to_string()]);
    assert_eq!(users.count(&FilterSpec::new()).await, 1);
}

#[tokio::test]
async fn del_one_removes_a_single_document() {
    let store = store();
    let users = store.collection("users");

    users.add(json!({ "id": "a", "role": "user" }), None).await;
    users.add(json!({ "id": "b", "role": "user" }), None).await;

    users.del_one(&FilterSpec::new().field("role", "user")).await;
    assert_eq!(users.count(&FilterSpec::new()).await, 1);
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    let backend = MemoryStore::new();
    let store = AqlStore::new(backend.clone());

    let indexes = [
        IndexSpec::persistent(["email"]).unique(),
        IndexSpec::fulltext("title"),
    ];

    let posts = store
        .provision_collection("posts", &indexes, CreateOptions::default())
        .await
        .unwrap();
    // The returned handle is usable straight away.
    posts.add(json!({ "id": "p1", "title": "Hello" }), None).await;

    let again = store
        .provision_collection("posts", &indexes, CreateOptions::default())
        .await
        .unwrap();
    assert_eq!(again.count(&FilterSpec::new().field("id", "p1")).await, 1);

    // Two baseline indexes plus the declared persistent one, each once.
    let names = backend.index_names("posts").await;
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"idx_posts_email".to_string()));

    let views = backend.list_views().await.unwrap();
    assert_eq!(views, vec!["v_posts".to_string()]);
}

#[tokio::test]
async fn truncation_empties_but_keeps_the_collection() {
    let store = store();
    let users = store.collection("users");

    users.add(json!({ "id": "a" }), None).await;
    store.truncate_collection("users").await.unwrap();

    assert_eq!(users.count(&FilterSpec::new()).await, 0);
    assert!(store.backend().collection_exists("users").await.unwrap());
}

#[tokio::test]
async fn database_init_creates_once_and_is_repeatable() {
    let store = store();
    let config = DatabaseConfig { name: "appdb".to_string() };

    let first = store.init_database(&config).await.unwrap();
    let second = store.init_database(&config).await.unwrap();

    assert_eq!(first, second);
    let databases = store.backend().list_databases().await.unwrap();
    assert_eq!(databases.iter().filter(|db| **db == first).count(), 1);
}

#[tokio::test]
async fn joins_are_inner_and_respect_every_step_filter() {
    let store = store();
    let users = store.collection("users");
    let profiles = store.collection("profiles");
    let customers = store.collection("customers");

    for (id, name) in [("u1", "Mario"), ("u2", "Luigi"), ("u3", "Marco")] {
        users.add(json!({ "id": id, "name": name }), None).await;
    }
    for (user, enabled) in [("u1", true), ("u2", true), ("u3", false)] {
        profiles
            .add(json!({ "id_user": user, "enabled": enabled }), None)
            .await;
    }
    for (name, agent) in [
        ("Giovanni", "u1"),
        ("Anna", "u2"),
        ("Carlo", "u1"),
        ("Elena", "u3"),
    ] {
        customers
            .add(json!({ "name": name, "id_agent": agent }), None)
            .await;
    }

    let steps = [
        JoinStep::new("customers", "c")
            .filter(FilterSpec::new().term(
                "id_agent",
                CompareMode::In,
                json!(["u1", "u2", "u3"]),
            ))
            .fields(["name:cust_name"]),
        JoinStep::new("users", "u").join_condition("c.id_agent == u.id"),
        JoinStep::new("profiles", "p")
            .join_condition("u.id == p.id_user")
            .filter(FilterSpec::new().field("enabled", true)),
    ];

    let rows = store.find_with_joins(&steps).await;

    // Elena's agent has a disabled profile, so her row is dropped.
    let mut names: Vec<&str> = rows.iter().filter_map(|r| r["cust_name"].as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Anna", "Carlo", "Giovanni"]);
}

#[tokio::test]
async fn join_with_no_steps_returns_nothing() {
    let store = store();
    let rows: Vec<Value> = store.find_with_joins(&[]).await;
    assert!(rows.is_empty());
}
