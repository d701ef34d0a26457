// Bitcoin Dev Kit
// Written in 2020 by Alekos Filini <alekos.filini@gmail.com>
//
// Copyright (c) 2020-2021 Bitcoin Dev Kit Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Descriptor checksum
//!
//! Thin wrapper over the Bitcoin Core compatible checksum engine shipped with [`miniscript`].

use crate::descriptor::DescriptorError;

use miniscript::descriptor::checksum::desc_checksum;

/// Compute the checksum of a descriptor, excluding any checksum already present in the string
pub fn calc_checksum(desc: &str) -> Result<String, DescriptorError> {
    let body = desc.split_once('#').map(|(body, _)| body).unwrap_or(desc);
    Ok(desc_checksum(body)?)
}

/// Check that `checksum` is the one Bitcoin Core would compute for `body`
pub fn verify_checksum(body: &str, checksum: &str) -> Result<(), DescriptorError> {
    if desc_checksum(body)? != checksum {
        return Err(DescriptorError::InvalidDescriptorChecksum);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_calc_checksum() {
        let desc = "wpkh(tprv8ZgxMBicQKsPdpkqS7Eair4YxjcuuvDPNYmKX3sCniCf16tHEVrjjiSXEkFRnUH77yXc6ZcwHHcLNfjdi5qUvw3VDfgYiH5mNsj5izuiu2N/1/2/*)";
        assert_eq!(calc_checksum(desc).unwrap(), "tqz0nc62");

        let desc = "pkh(tpubD6NzVbkrYhZ4XHndKkuB8FifXm8r5FQHwrN6oZuWCz13qb93rtgKvD4PQsqC4HP4yhV3tA2fqr2RbY5mNXfM7RxXUoeABoDtsFUq2zJq6YK/44'/1'/0'/0/*)#lasegmfs";
        assert_eq!(calc_checksum(desc).unwrap(), "lasegmfs");
    }

    #[test]
    fn test_verify_checksum() {
        let body = "pkh(tpubD6NzVbkrYhZ4XHndKkuB8FifXm8r5FQHwrN6oZuWCz13qb93rtgKvD4PQsqC4HP4yhV3tA2fqr2RbY5mNXfM7RxXUoeABoDtsFUq2zJq6YK/44'/1'/0'/0/*)";
        assert!(verify_checksum(body, "lasegmfs").is_ok());
        assert_matches!(
            verify_checksum(body, "lasegmsf"),
            Err(DescriptorError::InvalidDescriptorChecksum)
        );
    }
}
