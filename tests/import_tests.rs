//! Bulk import integration tests: tolerant header resolution, skip semantics,
//! reconciliation against existing records, and re-import idempotence.

use tempfile::tempdir;

use rbadmin::error::AppError;
use rbadmin::identity;
use rbadmin::import::import_users;
use rbadmin::store::{Role, SharedStore, UserRecord};

fn store() -> (tempfile::TempDir, SharedStore) {
    let tmp = tempdir().unwrap();
    let store = SharedStore::new(tmp.path()).unwrap();
    (tmp, store)
}

#[tokio::test]
async fn varied_headers_resolve_by_substring() {
    let (_tmp, store) = store();
    let csv = "Full Name,Email Address,User Role,Temp Password\n\
               Jane Doe,JANE@X.COM,manager,hunter2\n";
    let report = import_users(&store, csv).await.unwrap();

    assert_eq!(report.total_processed, 1);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].email, "jane@x.com");
    assert_eq!(report.created[0].role, Role::Manager);
    assert!(report.updated.is_empty());
    assert!(report.errors.is_empty());

    let jane = store.0.lock().find_by_email("jane@x.com").unwrap().unwrap();
    assert_eq!(jane.name, "Jane Doe");
    assert!(identity::verify_password(&jane.password_hash, "hunter2"));
}

#[tokio::test]
async fn rows_missing_email_are_skipped_not_errored() {
    let (_tmp, store) = store();
    let csv = "name,email,role\nAlice,alice@x.com,ADMIN\nBob,,USER\n";
    let report = import_users(&store, csv).await.unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].email, "alice@x.com");
    assert_eq!(report.created[0].role, Role::Admin);
    assert!(report.errors.is_empty());
    assert_eq!(report.total_processed, 1);

    // Alice had no password column: she got a synthetic placeholder secret.
    let alice = store.0.lock().find_by_email("alice@x.com").unwrap().unwrap();
    assert_eq!(alice.role, Role::Admin);
}

#[tokio::test]
async fn empty_or_headers_only_file_is_bad_input() {
    let (_tmp, store) = store();
    for text in ["", "\n\n\n", "name,email,role\n", "name,email,role\n,,\n"] {
        let err = import_users(&store, text).await.unwrap_err();
        assert!(matches!(err, AppError::BadInput { .. }), "text {:?}", text);
        assert_eq!(err.http_status(), 400);
    }
}

#[tokio::test]
async fn reimport_is_idempotent_on_name_and_role() {
    let (_tmp, store) = store();
    let csv = "name,email,role\nAlice,alice@x.com,ADMIN\nBob,bob@x.com,MANAGER\n";

    let first = import_users(&store, csv).await.unwrap();
    assert_eq!(first.created.len(), 2);
    assert!(first.updated.is_empty());

    let second = import_users(&store, csv).await.unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.updated.len(), 2);
    assert!(second.errors.is_empty());

    let emails: Vec<String> = second.updated.iter().map(|u| u.email.clone()).collect();
    assert!(emails.contains(&"alice@x.com".to_string()));
    assert!(emails.contains(&"bob@x.com".to_string()));
    assert_eq!(store.0.lock().count().unwrap(), 2);
}

#[tokio::test]
async fn placeholder_password_never_overwrites_a_real_hash() {
    let (_tmp, store) = store();

    // Existing user with a genuine secret.
    let hash = identity::hash_password("real-password").unwrap();
    let user = UserRecord::new("carol@x.com", "Carol", Role::User, hash.clone());
    store.0.lock().insert(user).unwrap();

    // Re-import without a password column: a synthetic ImportedPass secret is
    // generated, recognized as a placeholder, and must not replace the hash.
    let csv = "name,email,role\nCarol Renamed,carol@x.com,MANAGER\n";
    let report = import_users(&store, csv).await.unwrap();
    assert_eq!(report.updated.len(), 1);

    let carol = store.0.lock().find_by_email("carol@x.com").unwrap().unwrap();
    assert_eq!(carol.name, "Carol Renamed");
    assert_eq!(carol.role, Role::Manager);
    assert_eq!(carol.password_hash, hash);
    assert!(identity::verify_password(&carol.password_hash, "real-password"));
}

#[tokio::test]
async fn temppass_prefix_is_also_treated_as_placeholder() {
    let (_tmp, store) = store();
    let hash = identity::hash_password("original").unwrap();
    store
        .0
        .lock()
        .insert(UserRecord::new("dave@x.com", "Dave", Role::User, hash.clone()))
        .unwrap();

    let csv = "name,email,role,password\nDave,dave@x.com,USER,TempPass123456\n";
    import_users(&store, csv).await.unwrap();

    let dave = store.0.lock().find_by_email("dave@x.com").unwrap().unwrap();
    assert_eq!(dave.password_hash, hash);
}

#[tokio::test]
async fn real_password_on_reimport_is_rehashed() {
    let (_tmp, store) = store();
    let hash = identity::hash_password("old-secret").unwrap();
    store
        .0
        .lock()
        .insert(UserRecord::new("erin@x.com", "Erin", Role::User, hash))
        .unwrap();

    let csv = "name,email,role,password\nErin,erin@x.com,USER,new-secret\n";
    import_users(&store, csv).await.unwrap();

    let erin = store.0.lock().find_by_email("erin@x.com").unwrap().unwrap();
    assert!(identity::verify_password(&erin.password_hash, "new-secret"));
    assert!(!identity::verify_password(&erin.password_hash, "old-secret"));
}

#[tokio::test]
async fn quoted_names_with_commas_import_intact() {
    let (_tmp, store) = store();
    let csv = "name,email,role\n\"Doe, Jane\",jane.doe@x.com,USER\n";
    let report = import_users(&store, csv).await.unwrap();
    assert_eq!(report.created.len(), 1);

    let jane = store.0.lock().find_by_email("jane.doe@x.com").unwrap().unwrap();
    assert_eq!(jane.name, "Doe, Jane");
}

#[tokio::test]
async fn rows_racing_on_the_same_email_resolve_in_file_order() {
    let (_tmp, store) = store();
    // Two rows normalize to the same email within one batch: the first
    // creates, the second reconciles as an update, and later rows still run.
    let csv = "name,email,role\nA One,dup@x.com,USER\nA Two,DUP@X.COM,ADMIN\nB,ok@x.com,USER\n";
    let report = import_users(&store, csv).await.unwrap();

    assert_eq!(report.total_processed, 3);
    assert_eq!(report.created.len(), 2);
    assert_eq!(report.updated.len(), 1);
    assert!(report.errors.is_empty());

    let dup = store.0.lock().find_by_email("dup@x.com").unwrap().unwrap();
    assert_eq!(dup.name, "A Two");
    assert_eq!(dup.role, Role::Admin);
    assert!(store.0.lock().find_by_email("ok@x.com").unwrap().is_some());
}
