//! # Ledger Codec
//!
//! Wire codec for accounts replicated between ledger nodes.
//!
//! The schema is an explicit, versioned contract: every field has a fixed
//! field number and a default, and readers tolerate fields they do not
//! know. See [`schema`] for the field table.
//!
//! ## Usage
//!
//! ```
//! use ledger_codec::{decode_account, encode_account, Account, AccountId};
//!
//! let account = Account::new(AccountId::new(1), 250);
//! let bytes = encode_account(&account).unwrap();
//! assert_eq!(decode_account(&bytes).unwrap(), account);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod error;
pub mod schema;

pub use account::{Account, AccountId};
pub use error::{CodecError, CodecResult};
pub use schema::{decode_account, encode_account, SCHEMA_VERSION};

/// Trait for types that can be encoded to their wire form.
pub trait Encode {
    /// Encode this value to bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from their wire form.
pub trait Decode: Sized {
    /// Decode this value from bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Account {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_account(self)
    }
}

impl Decode for Account {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_account(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_account_survives_the_wire(id in any::<i64>(), balance in any::<i64>()) {
            let account = Account::new(AccountId::new(id), balance);
            let bytes = account.encode().unwrap();
            prop_assert_eq!(Account::decode(&bytes).unwrap(), account);
        }
    }
}
