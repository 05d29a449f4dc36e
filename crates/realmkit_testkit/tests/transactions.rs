//! Transaction state machine scenarios against the in-memory engine.

use realmkit_core::{Config, CoreError, EngineError, ErrorCode, TransactionKind, TransactionState};
use realmkit_engine::EngineCall;
use realmkit_testkit::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Barrier;
use std::thread;

#[derive(Debug, PartialEq)]
enum AppError {
    Core(CoreError),
    Aborted(&'static str),
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::Core(e)
    }
}

#[test]
fn second_begin_write_fails() {
    init_tracing();
    let test = TestRealm::sample();

    test.begin_write().unwrap();
    let err = test.begin_write().unwrap_err();
    assert_eq!(
        err,
        CoreError::TransactionAlreadyInProgress {
            current: TransactionState::Write
        }
    );
    assert_eq!(test.transaction_state(), TransactionState::Write);
    assert_eq!(test.transaction_calls(), vec![EngineCall::BeginWrite]);
}

#[test]
fn begin_read_after_commit() {
    let test = TestRealm::sample();

    test.begin_write().unwrap();
    assert!(test.commit().unwrap());
    test.begin_read().unwrap();
    assert_eq!(test.transaction_state(), TransactionState::Read);
    assert!(test.rollback().unwrap());
    assert_eq!(test.transaction_state(), TransactionState::None);
}

#[test]
fn ending_nothing_is_a_noop() {
    let test = TestRealm::empty();

    assert!(!test.commit().unwrap());
    assert!(!test.rollback().unwrap());
    assert!(test.transaction_calls().is_empty());
}

#[test]
fn engine_refusal_leaves_state_none() {
    let test = TestRealm::sample();
    test.engine.fail_next(
        EngineCall::BeginWrite,
        EngineError::new(ErrorCode::IllegalOperation, "busy"),
    );

    let err = test.begin_write().unwrap_err();
    assert_eq!(err.as_engine().map(EngineError::code), Some(ErrorCode::IllegalOperation));
    assert_eq!(test.transaction_state(), TransactionState::None);

    test.begin_write().unwrap();
    assert_eq!(test.transaction_state(), TransactionState::Write);
}

#[test]
fn silent_engine_failure_still_reports_an_error() {
    let test = TestRealm::sample();
    test.engine.fail_next_silently(EngineCall::BeginRead);

    let err = test.begin_read().unwrap_err();
    assert_eq!(err.as_engine().map(EngineError::code), Some(ErrorCode::Unknown));
    assert_eq!(test.transaction_state(), TransactionState::None);
}

#[test]
fn failed_write_scope_rolls_back_and_propagates() {
    let test = TestRealm::sample();

    let result: Result<(), AppError> = test.write(|txn| {
        assert_eq!(txn.kind(), TransactionKind::Write);
        assert_eq!(txn.realm().transaction_state(), TransactionState::Write);
        Err(AppError::Aborted("halfway"))
    });

    assert_eq!(result, Err(AppError::Aborted("halfway")));
    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginWrite, EngineCall::Rollback]
    );
    assert_eq!(test.engine.count(EngineCall::Commit), 0);
}

#[test]
fn successful_write_scope_commits() {
    let test = TestRealm::sample();
    let before = test.engine.file_version("sample.realm").unwrap();

    let answer = test.write(|_txn| Ok::<_, CoreError>(42)).unwrap();

    assert_eq!(answer, 42);
    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginWrite, EngineCall::Commit]
    );
    assert_eq!(test.engine.file_version("sample.realm"), Some(before + 1));
}

#[test]
fn refused_commit_in_scope_rolls_back() {
    let test = TestRealm::sample();
    test.engine.fail_next(
        EngineCall::Commit,
        EngineError::new(ErrorCode::IllegalOperation, "disk full"),
    );

    let err = test.write(|_txn| Ok::<_, CoreError>(())).unwrap_err();

    assert_eq!(err.as_engine().map(EngineError::code), Some(ErrorCode::IllegalOperation));
    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginWrite, EngineCall::Commit, EngineCall::Rollback]
    );

    test.begin_write().unwrap();
    assert_eq!(test.transaction_state(), TransactionState::Write);
}

#[test]
fn read_scope_ends_with_commit() {
    let test = TestRealm::sample();

    let names = test
        .read(|txn| {
            let schema = txn.realm().schema()?;
            Ok::<_, CoreError>(schema.classes().len())
        })
        .unwrap();

    assert_eq!(names, 2);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginRead, EngineCall::Commit]
    );
}

#[test]
fn cancelled_scope_is_not_committed() {
    let test = TestRealm::sample();

    test.write(|txn| {
        assert!(txn.cancel()?);
        assert!(txn.is_resolved());
        assert!(!txn.cancel()?);
        Ok::<_, CoreError>(())
    })
    .unwrap();

    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginWrite, EngineCall::Rollback]
    );
}

#[test]
fn panic_inside_scope_rolls_back() {
    let test = TestRealm::sample();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        test.write(|_txn| -> Result<(), CoreError> { panic!("writer crashed") })
    }));

    assert!(outcome.is_err());
    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(
        test.transaction_calls(),
        vec![EngineCall::BeginWrite, EngineCall::Rollback]
    );
}

#[test]
fn scope_cannot_start_inside_a_transaction() {
    let test = TestRealm::sample();
    test.begin_read().unwrap();

    let mut ran = false;
    let err = test
        .write(|_txn| {
            ran = true;
            Ok::<_, CoreError>(())
        })
        .unwrap_err();

    assert!(!ran);
    assert_eq!(
        err,
        CoreError::TransactionAlreadyInProgress {
            current: TransactionState::Read
        }
    );
    assert_eq!(test.transaction_state(), TransactionState::Read);
}

#[test]
fn only_one_thread_wins_begin_write() {
    const THREADS: usize = 8;
    let test = TestRealm::sample();
    let barrier = Barrier::new(THREADS);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    test.begin_write()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        CoreError::TransactionAlreadyInProgress {
            current: TransactionState::Write
        }
    )));
    assert_eq!(test.engine.count(EngineCall::BeginWrite), 1);
}

#[test]
fn read_only_realm_refuses_writes() {
    let test = TestRealm::with_config(
        Config::new("reader.realm")
            .in_memory(true)
            .read_only(true),
    );
    assert!(!test.is_writable());

    assert!(test.begin_write().is_err());
    assert_eq!(test.transaction_state(), TransactionState::None);
    test.begin_read().unwrap();
    assert!(test.commit().unwrap());
}

#[test]
fn closing_discards_the_open_transaction() {
    let test = TestRealm::sample();
    test.begin_write().unwrap();

    test.close().unwrap();
    assert!(test.is_closed());
    assert_eq!(test.transaction_state(), TransactionState::None);
    assert_eq!(test.begin_read().unwrap_err(), CoreError::RealmClosed);
}
