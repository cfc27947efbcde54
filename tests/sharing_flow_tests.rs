//! End-to-end sharing flow tests: registration, login, upload, share and
//! fetch across two accounts, exercising positive and negative paths and the
//! opacity guarantees (credential and existence probing both come back as
//! one generic error).

use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;

use cubby::error::AppError;
use cubby::identity::{Account, AuthService, Session};
use cubby::sharing::FileService;
use cubby::storage::{FsObjectStore, JsonKv, MemKv, ObjectStore, RecordStore};

struct App {
    auth: AuthService,
    files: FileService,
    _tmp: tempfile::TempDir,
}

// Wire the services exactly as server startup does, with the account table
// persisted under the temp data root.
fn app() -> Result<App> {
    let tmp = tempdir()?;
    let accounts: Arc<dyn RecordStore<Account>> =
        Arc::new(JsonKv::<Account>::load_or_default(tmp.path().join("accounts.json"))?);
    let sessions: Arc<dyn RecordStore<Session>> = Arc::new(MemKv::new());
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(tmp.path().join("objects"))?);
    let auth = AuthService::new(accounts.clone(), sessions);
    let files = FileService::new(objects, accounts);
    Ok(App { auth, files, _tmp: tmp })
}

#[test]
fn full_share_scenario() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    app.auth.register("bob", "pw2").unwrap();

    let token_a = app.auth.login("alice", "pw1").unwrap();
    let alice = app.auth.resolve(&token_a).unwrap();
    assert_eq!(alice, "alice");

    app.files.upload(&alice, "a.txt", b"hi").unwrap();
    app.files.share(&alice, "a.txt", "bob").unwrap();

    let token_b = app.auth.login("bob", "pw2").unwrap();
    let bob = app.auth.resolve(&token_b).unwrap();
    let fetched = app.files.fetch(&bob, "a.txt", Some("alice")).unwrap();
    assert_eq!(fetched, b"hi");

    let listed: Vec<String> = app.files.list(&bob)?.into_iter().map(|m| m.key).collect();
    assert_eq!(listed, vec!["alice/a.txt"]);

    // An unknown token never reaches the file layer.
    let err = app.auth.resolve("0000000000000000ffffffffffffffff").unwrap_err();
    assert!(matches!(err, AppError::Auth { .. }));
    assert_eq!(err.http_status(), 401);
    Ok(())
}

#[test]
fn duplicate_registration_conflicts() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    let err = app.auth.register("alice", "other").unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
    assert_eq!(err.http_status(), 400);
    Ok(())
}

#[test]
fn credential_failures_are_opaque() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    let wrong_pw = app.auth.login("alice", "nope").unwrap_err();
    let no_user = app.auth.login("mallory", "pw1").unwrap_err();
    assert_eq!(wrong_pw.to_string(), no_user.to_string());
    assert_eq!(wrong_pw.http_status(), no_user.http_status());
    Ok(())
}

#[test]
fn upload_fetch_roundtrip_preserves_bytes() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    let token = app.auth.login("alice", "pw1").unwrap();
    let alice = app.auth.resolve(&token).unwrap();

    let content: Vec<u8> = (0u16..=255).map(|b| b as u8).cycle().take(4096).collect();
    app.files.upload(&alice, "blob.bin", &content).unwrap();
    assert_eq!(app.files.fetch(&alice, "blob.bin", None).unwrap(), content);

    // Re-upload overwrites in place.
    app.files.upload(&alice, "blob.bin", b"short").unwrap();
    assert_eq!(app.files.fetch(&alice, "blob.bin", None).unwrap(), b"short");
    Ok(())
}

#[test]
fn denial_and_absence_are_the_same_not_found() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    app.auth.register("bob", "pw2").unwrap();
    app.files.upload("alice", "secret.txt", b"s").unwrap();

    let denied = app.files.fetch("bob", "secret.txt", Some("alice")).unwrap_err();
    let absent = app.files.fetch("bob", "no-such-file.txt", Some("alice")).unwrap_err();
    assert_eq!(denied.to_string(), absent.to_string());
    assert_eq!(denied.http_status(), 404);
    Ok(())
}

#[test]
fn double_share_and_self_share_rejections() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    app.auth.register("bob", "pw2").unwrap();
    app.files.upload("alice", "a.txt", b"hi").unwrap();

    app.files.share("alice", "a.txt", "bob").unwrap();
    let dup = app.files.share("alice", "a.txt", "bob").unwrap_err();
    assert!(matches!(dup, AppError::Conflict { .. }));

    let own = app.files.share("alice", "a.txt", "alice").unwrap_err();
    assert!(matches!(own, AppError::Validation { .. }));

    // The failed attempts left exactly one grant behind.
    assert_eq!(app.files.list("bob")?.len(), 1);
    Ok(())
}

#[test]
fn logout_revokes_and_stays_idempotent() -> Result<()> {
    let app = app()?;
    app.auth.register("alice", "pw1").unwrap();
    let token = app.auth.login("alice", "pw1").unwrap();
    assert_eq!(app.auth.resolve(&token).unwrap(), "alice");

    app.auth.logout(&token).unwrap();
    assert!(app.auth.resolve(&token).is_err());
    app.auth.logout(&token).unwrap();
    app.auth.logout("not-a-token").unwrap();
    Ok(())
}

#[test]
fn accounts_and_grants_survive_reopen() -> Result<()> {
    let tmp = tempdir()?;
    let accounts_path = tmp.path().join("accounts.json");
    let objects_root = tmp.path().join("objects");
    {
        let accounts: Arc<dyn RecordStore<Account>> =
            Arc::new(JsonKv::<Account>::load_or_default(accounts_path.clone())?);
        let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(objects_root.clone())?);
        let auth = AuthService::new(accounts.clone(), Arc::new(MemKv::new()));
        let files = FileService::new(objects, accounts);
        auth.register("alice", "pw1").unwrap();
        auth.register("bob", "pw2").unwrap();
        files.upload("alice", "a.txt", b"hi").unwrap();
        files.share("alice", "a.txt", "bob").unwrap();
    }

    // Fresh handles over the same data root: accounts, grants and objects
    // are all still there; sessions are not.
    let accounts: Arc<dyn RecordStore<Account>> = Arc::new(JsonKv::<Account>::load_or_default(accounts_path)?);
    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(objects_root)?);
    let auth = AuthService::new(accounts.clone(), Arc::new(MemKv::new()));
    let files = FileService::new(objects, accounts);

    let token = auth.login("bob", "pw2").unwrap();
    let bob = auth.resolve(&token).unwrap();
    assert_eq!(files.fetch(&bob, "a.txt", Some("alice")).unwrap(), b"hi");
    Ok(())
}
