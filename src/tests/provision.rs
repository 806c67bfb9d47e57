use std::sync::Arc;

use super::support::{build, harness, MemoryCache, MockEmbedder, MockRemote};
use crate::entries::EntryCreate;
use crate::provision::ProvisionState;
use crate::remote::RemoteRepository;
use crate::store::BackendMode;

fn create(title: &str) -> EntryCreate {
    EntryCreate {
        title: title.to_string(),
        content: "body".to_string(),
        folder_id: None,
    }
}

#[test]
fn first_use_provisions_the_backing_store() {
    let h = harness();
    assert!(h.remote.repo_names().is_empty());

    h.store.create_entry(create("first")).unwrap();

    assert_eq!(h.remote.repo_names(), vec!["jot-notes-alice".to_string()]);
    assert_eq!(
        h.store.provision_state(),
        ProvisionState::Created("jot-notes-alice".to_string())
    );
}

#[test]
fn an_existing_backing_store_is_reused() {
    let h = harness();
    h.remote
        .create_repository("jot-notes-alice", "pre-existing", true)
        .unwrap();

    h.store.create_entry(create("first")).unwrap();

    assert_eq!(h.remote.repo_names().len(), 1);
    assert_eq!(
        h.store.provision_state(),
        ProvisionState::Exists("jot-notes-alice".to_string())
    );
}

#[test]
fn name_conflict_retries_once_with_a_suffix() {
    let h = harness();
    h.remote.hide_name("jot-notes-alice");

    h.store.create_entry(create("first")).unwrap();

    let names = h.remote.repo_names();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("jot-notes-alice-"));

    // later operations keep using the renamed store
    let entry = h.store.create_entry(create("second")).unwrap();
    assert!(h.remote.file_exists(&names[0], &format!("{}.md", entry.id)));
}

#[test]
fn unresolvable_conflict_degrades_to_local_only() {
    let h = harness();
    h.remote.reject_all_creates();

    let entry = h.store.create_entry(create("stranded")).unwrap();

    assert!(h.remote.repo_names().is_empty());
    assert_eq!(h.store.backend_mode(), BackendMode::LocalOnly);
    assert_eq!(h.store.provision_state(), ProvisionState::Failed);

    // the entry still exists, held by the cache
    assert!(h.store.get_entry(&entry.id).unwrap().is_some());
}

#[test]
fn transient_failures_are_not_remembered() {
    let h = harness();
    h.remote.set_offline(true);

    h.store.create_entry(create("offline")).unwrap();
    assert_eq!(h.store.backend_mode(), BackendMode::LocalOnly);

    // the remote comes back; the next operation provisions normally
    h.remote.set_offline(false);
    h.store.create_entry(create("online")).unwrap();

    assert_eq!(h.remote.repo_names(), vec!["jot-notes-alice".to_string()]);
    assert_eq!(
        h.store.backend_mode(),
        BackendMode::Remote("jot-notes-alice".to_string())
    );
}

#[test]
fn reset_provisions_fresh_and_migrates_cached_records() {
    let remote = Arc::new(MockRemote::new("alice"));
    remote.set_offline(true);

    let h = build(
        remote,
        Arc::new(MemoryCache::new()),
        Arc::new(MockEmbedder::new("test-model")),
    );

    // records accumulate locally while the remote is unreachable
    let a = h.store.create_entry(create("one")).unwrap();
    let b = h.store.create_entry(create("two")).unwrap();

    h.remote.set_offline(false);
    let repo = h.store.reset_backing_store().unwrap();
    assert!(repo.starts_with("jot-notes-alice-"));

    assert!(h.remote.file_exists(&repo, &format!("{}.md", a.id)));
    assert!(h.remote.file_exists(&repo, &format!("{}.md", b.id)));
}
