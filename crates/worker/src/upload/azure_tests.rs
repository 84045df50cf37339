// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn signature_is_deterministic_for_a_fixed_key_and_input() {
    let key = base64::engine::general_purpose::STANDARD.encode(b"account-key-bytes");
    let a = sign(&key, "PUT\n/account/container/blob").unwrap();
    let b = sign(&key, "PUT\n/account/container/blob").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, sign(&key, "PUT\n/account/container/other").unwrap());
}

#[test]
fn non_base64_account_key_is_rejected() {
    let err = sign("!!not-base64!!", "PUT").unwrap_err();
    assert!(matches!(err, UploadError::Azure(_)));
}
