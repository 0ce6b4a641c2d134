//! Account wire schema.
//!
//! An account travels as a CBOR map keyed by integer field numbers:
//!
//! | Field | Meaning        | Default |
//! |-------|----------------|---------|
//! | 0     | schema version | 1       |
//! | 1     | account id     | 0       |
//! | 2     | balance        | 0       |
//!
//! Field numbers are never reused. Readers skip field numbers they do not
//! know and fall back to the default for fields that are absent, so a
//! writer may add fields without breaking older readers.

use crate::account::{Account, AccountId};
use crate::error::{CodecError, CodecResult};
use ciborium::value::{Integer, Value};

/// Current schema version written by [`encode_account`].
pub const SCHEMA_VERSION: u64 = 1;

/// Field numbers of the account schema.
pub mod field {
    /// Schema version.
    pub const VERSION: u64 = 0;
    /// Account identifier.
    pub const ID: u64 = 1;
    /// Account balance.
    pub const BALANCE: u64 = 2;
}

/// Encodes an account to its wire form.
///
/// Fields are written in ascending field-number order so that identical
/// accounts always produce identical bytes.
///
/// # Errors
///
/// Returns an error if the CBOR writer fails.
pub fn encode_account(account: &Account) -> CodecResult<Vec<u8>> {
    let map = Value::Map(vec![
        (int_key(field::VERSION), Value::Integer(SCHEMA_VERSION.into())),
        (int_key(field::ID), Value::Integer(account.id.as_i64().into())),
        (int_key(field::BALANCE), Value::Integer(account.balance.into())),
    ]);

    let mut bytes = Vec::with_capacity(16);
    ciborium::ser::into_writer(&map, &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes an account from its wire form.
///
/// # Errors
///
/// Returns an error if the bytes are not CBOR, the top-level item is not a
/// map, a key is not an unsigned integer, or a known field holds a value
/// that is not an `i64`.
pub fn decode_account(bytes: &[u8]) -> CodecResult<Account> {
    let value: Value = ciborium::de::from_reader(bytes)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;

    let Value::Map(pairs) = value else {
        return Err(CodecError::invalid_structure("account must be a map"));
    };

    let mut account = Account::new(AccountId::new(0), 0);
    for (key, value) in pairs {
        let field = field_number(&key)?;
        match field {
            field::ID => account.id = AccountId::new(int_field(field, &value)?),
            field::BALANCE => account.balance = int_field(field, &value)?,
            // Version is informational; unknown fields are skipped.
            _ => {}
        }
    }

    Ok(account)
}

fn int_key(field: u64) -> Value {
    Value::Integer(field.into())
}

fn field_number(key: &Value) -> CodecResult<u64> {
    key.as_integer()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| CodecError::invalid_structure("field keys must be unsigned integers"))
}

fn int_field(field: u64, value: &Value) -> CodecResult<i64> {
    let n: Integer = value.as_integer().ok_or_else(|| {
        CodecError::invalid_structure(format!("field {field} must be an integer"))
    })?;
    i64::try_from(n).map_err(|_| CodecError::IntegerOverflow { field })
}
