use std::ptr::null_mut;

use assert_matches::assert_matches;

use crate::downcast_error;
use crate::engine::test_engine::{
    alloc_doubles, alloc_string, assert_balanced, ledger, releasers, reset_ledger, string_err,
    string_ok,
};
use crate::errors::{IqTreeError, ProtocolError};
use crate::ffi::{DoubleArrayResult, IntegerResult, StringResult};

#[test]
fn string_success() {
    reset_ledger();
    let envelope = unsafe { string_ok("(a,b,c);").into_envelope(releasers()) };
    assert!(!envelope.is_error());
    assert_eq!(envelope.into_host().unwrap(), "(a,b,c);");
    assert_balanced();
}

#[test]
fn error_releases_payload_unread() {
    reset_ledger();
    let result = StringResult {
        value: alloc_string("partial output"),
        error: alloc_string("Model GTR+G0 is invalid"),
    };
    let envelope = unsafe { result.into_envelope(releasers()) };
    assert!(envelope.is_error());
    let host = envelope.into_host();
    assert_eq!(
        downcast_error::<IqTreeError>(&host).message(),
        "Model GTR+G0 is invalid"
    );
    ledger(|l| assert_eq!(l.released, 2));
    assert_balanced();
}

#[test]
fn empty_error_string_is_success() {
    reset_ledger();
    let result = StringResult {
        value: alloc_string("2.3.6"),
        error: alloc_string(""),
    };
    let envelope = unsafe { result.into_envelope(releasers()) };
    assert!(!envelope.is_error());
    assert_eq!(envelope.into_host().unwrap(), "2.3.6");
    assert_balanced();
}

#[test]
fn second_conversion_fails_fast() {
    reset_ledger();
    let mut envelope = unsafe { string_ok("(a,b,c);").into_envelope(releasers()) };
    assert!(envelope.take().is_ok());
    let again = envelope.take();
    assert!(downcast_error::<ProtocolError>(&again)
        .message()
        .contains("already been converted"));
    drop(envelope);
    assert_balanced();
}

#[test]
fn second_conversion_of_error_fails_fast() {
    reset_ledger();
    let mut envelope = unsafe { string_err("boom").into_envelope(releasers()) };
    assert_matches!(envelope.take(), Err(e) if e.downcast_ref::<IqTreeError>().is_some());
    assert_matches!(envelope.take(), Err(e) if e.downcast_ref::<ProtocolError>().is_some());
    assert_balanced();
}

#[test]
fn dropped_envelope_releases_everything() {
    reset_ledger();
    let result = StringResult {
        value: alloc_string("never read"),
        error: alloc_string("never read either"),
    };
    drop(unsafe { result.into_envelope(releasers()) });
    assert_balanced();
}

#[test]
fn aliased_slots_released_once() {
    reset_ledger();
    let shared = alloc_string("Engine failure");
    let result = StringResult {
        value: shared,
        error: shared,
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host();
    assert_eq!(
        downcast_error::<IqTreeError>(&host).message(),
        "Engine failure"
    );
    ledger(|l| assert_eq!(l.released, 1));
    assert_balanced();
}

#[test]
fn null_string_payload() {
    reset_ledger();
    let result = StringResult {
        value: null_mut(),
        error: null_mut(),
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host();
    assert!(downcast_error::<ProtocolError>(&host)
        .message()
        .contains("neither a string result nor an error"));
    assert_balanced();
}

#[test]
fn integer_envelope() {
    reset_ledger();
    let ok = IntegerResult {
        value: 4,
        error: null_mut(),
    };
    assert_eq!(unsafe { ok.into_envelope(releasers()) }.into_host().unwrap(), 4);
    let failed = IntegerResult {
        value: 4,
        error: alloc_string("Trees have different taxa"),
    };
    let host = unsafe { failed.into_envelope(releasers()) }.into_host();
    assert_eq!(
        downcast_error::<IqTreeError>(&host).message(),
        "Trees have different taxa"
    );
    assert_balanced();
}

#[test]
fn double_array_copied_then_released() {
    reset_ledger();
    let (value, length) = alloc_doubles(vec![0.0, 0.5, 0.5, 0.0]);
    let result = DoubleArrayResult {
        value,
        length,
        error: null_mut(),
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host().unwrap();
    assert_eq!(host, vec![0.0, 0.5, 0.5, 0.0]);
    assert_balanced();
}

#[test]
fn empty_double_array() {
    reset_ledger();
    let result = DoubleArrayResult {
        value: null_mut(),
        length: 0,
        error: null_mut(),
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host().unwrap();
    assert!(host.is_empty());
    assert_balanced();
}

#[test]
fn null_double_array_with_length() {
    reset_ledger();
    let result = DoubleArrayResult {
        value: null_mut(),
        length: 3,
        error: null_mut(),
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host();
    assert_eq!(
        downcast_error::<ProtocolError>(&host).message(),
        "Engine returned a null array of length 3"
    );
}

#[test]
fn double_array_error_releases_buffer() {
    reset_ledger();
    let (value, length) = alloc_doubles(vec![1.0, 2.0]);
    let result = DoubleArrayResult {
        value,
        length,
        error: alloc_string("Alignment is empty"),
    };
    let host = unsafe { result.into_envelope(releasers()) }.into_host();
    assert!(downcast_error::<IqTreeError>(&host)
        .message()
        .contains("Alignment is empty"));
    ledger(|l| assert_eq!(l.released, 2));
    assert_balanced();
}
