//! Registry and error-context behavior under concurrent callers.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use renterbind_core::{BindingError, ContextKey, ErrorContext, Handle, HandleRegistry};

#[test]
fn concurrent_stores_never_share_a_handle() {
    let registry = Arc::new(HandleRegistry::new(100_000));
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                (0..1000)
                    .map(|i| registry.store(t * 1000 + i).unwrap())
                    .collect::<Vec<Handle>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for t in threads {
        for h in t.join().unwrap() {
            assert!(!h.is_null());
            assert!(seen.insert(h), "duplicate handle {}", h);
        }
    }
    assert_eq!(registry.len(), 8000);
}

#[test]
fn load_racing_release_is_present_or_absent() {
    let registry = Arc::new(HandleRegistry::new(100_000));
    let handles: Vec<Handle> = (0..2000u32)
        .map(|i| registry.store(Arc::new(i)).unwrap())
        .collect();
    let handles = Arc::new(handles);

    let releaser = {
        let registry = Arc::clone(&registry);
        let handles = Arc::clone(&handles);
        thread::spawn(move || {
            for h in handles.iter() {
                registry.release(*h);
            }
        })
    };
    let loaders: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let handles = Arc::clone(&handles);
            thread::spawn(move || {
                for (i, h) in handles.iter().enumerate() {
                    match registry.load(*h) {
                        Ok(v) => assert_eq!(*v, i as u32),
                        Err(BindingError::InvalidHandle(bad)) => assert_eq!(bad, *h),
                        Err(other) => panic!("unexpected error {other}"),
                    }
                }
            })
        })
        .collect();

    releaser.join().unwrap();
    for l in loaders {
        l.join().unwrap();
    }
    assert!(registry.is_empty());
    for h in handles.iter() {
        assert!(registry.load(*h).is_err());
    }
}

#[test]
fn per_handle_error_slots_do_not_clobber() {
    let errors = Arc::new(ErrorContext::new());
    let threads: Vec<_> = (1..=8usize)
        .map(|n| {
            let errors = Arc::clone(&errors);
            thread::spawn(move || {
                let key = ContextKey::from(Handle::from_raw(n));
                for _ in 0..200 {
                    errors.record(key, "us_file_read", &format!("client {n} failed"));
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    for n in 1..=8usize {
        assert_eq!(
            errors.fetch(ContextKey::from_raw(n)).unwrap(),
            format!("us_file_read: client {n} failed")
        );
    }
    assert!(errors.fetch(ContextKey::GLOBAL).is_none());
}
