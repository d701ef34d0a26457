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

//! Key resolution
//!
//! The node reports the coins it can spend with descriptors that embed a single public key and
//! the key origin (`[<fingerprint>/<path>]`) it was derived from. [`resolve`] joins such a
//! descriptor back to one of the wallet's private extended keys and re-derives the signing key.

use std::fmt;

use bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, KeySource, Xpriv};
use bitcoin::secp256k1::{PublicKey, SecretKey};

use crate::descriptor::{Descriptor, DescriptorKeyMaterial, Wildcard};
use crate::wallet::utils::SecpCtx;

/// Signing key re-derived for a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    /// Private key
    pub secret_key: SecretKey,
    /// Matching public key
    pub public_key: PublicKey,
    /// Master fingerprint and full derivation path of the key
    pub key_source: KeySource,
}

/// Errors thrown while resolving the signing key of a descriptor
#[derive(Debug)]
pub enum KeyError {
    /// No known extended key has the requested fingerprint
    KeyNotFound(Fingerprint),
    /// The extended key with the requested fingerprint has no private part
    MissingPrivateKey(Fingerprint),
    /// The descriptor ends with a wildcard and doesn't identify a single key
    RangedDescriptor,
    /// The derived key differs from the one embedded in the descriptor
    KeyMismatch {
        /// Key found in the descriptor
        expected: String,
        /// Key obtained by derivation
        derived: PublicKey,
    },

    /// BIP32 derivation error
    Derivation(bitcoin::bip32::Error),
}

impl_error!(bitcoin::bip32::Error, Derivation, KeyError);

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyNotFound(fp) => write!(f, "No extended private key with label {}", fp),
            Self::MissingPrivateKey(fp) => {
                write!(f, "Extended key with label {} has no private key", fp)
            }
            Self::RangedDescriptor => write!(f, "Cannot derive a single key from a ranged path"),
            Self::KeyMismatch { expected, derived } => write!(
                f,
                "Derived key {} doesn't match the descriptor key {}",
                derived, expected
            ),
            Self::Derivation(err) => write!(f, "Derivation error: {}", err),
        }
    }
}

impl std::error::Error for KeyError {}

/// Find the private extended key `desc` descends from and derive its signing key
///
/// `known_xprvs` is matched twice: first against a root key whose label is the descriptor's
/// origin fingerprint (the full path is then derived), then against an account-level key
/// sharing the same origin whose path is a prefix of the descriptor's (only the remainder is
/// derived).
pub fn resolve(
    secp: &SecpCtx,
    desc: &Descriptor,
    known_xprvs: &[Descriptor],
) -> Result<DerivedKey, KeyError> {
    if desc.wildcard != Wildcard::None {
        return Err(KeyError::RangedDescriptor);
    }

    let fingerprint = desc.origin_fingerprint();
    let mut found_public = false;

    for known in known_xprvs {
        let remainder = if known.is_parent() && known.label == fingerprint {
            &desc.path[..]
        } else if known.parent_label == Some(fingerprint)
            && desc.path.starts_with(known.origin_path())
        {
            &desc.path[known.origin_path().len()..]
        } else {
            continue;
        };

        let xprv = match &known.key {
            DescriptorKeyMaterial::XPrv(xprv) => xprv,
            _ => {
                found_public = true;
                continue;
            }
        };

        log::debug!(
            "Resolving {} from {} with {} derivation steps",
            desc.fullpath,
            known.label,
            remainder.len()
        );
        return derive(secp, desc, xprv, remainder);
    }

    if found_public {
        Err(KeyError::MissingPrivateKey(fingerprint))
    } else {
        Err(KeyError::KeyNotFound(fingerprint))
    }
}

fn derive(
    secp: &SecpCtx,
    desc: &Descriptor,
    xprv: &Xpriv,
    steps: &[ChildNumber],
) -> Result<DerivedKey, KeyError> {
    let derived = xprv.derive_priv(secp, &DerivationPath::from(steps.to_vec()))?;
    let secret_key = derived.private_key;
    let public_key = secret_key.public_key(secp);

    let matches = match &desc.key {
        DescriptorKeyMaterial::Single(pk) => *pk == public_key,
        DescriptorKeyMaterial::XOnly(pk) => *pk == public_key.x_only_public_key().0,
        _ => true,
    };
    if !matches {
        return Err(KeyError::KeyMismatch {
            expected: desc.keystr.clone(),
            derived: public_key,
        });
    }

    Ok(DerivedKey {
        secret_key,
        public_key,
        key_source: desc.key_source(),
    })
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use bitcoin::bip32::Xpub;
    use bitcoin::secp256k1::Secp256k1;

    use super::*;
    use crate::descriptor::calc_checksum;

    const TEST_TPRV: &str = "tprv8ZgxMBicQKsPdZXrcHNLf5JAJWFAoJ2TrstMRdSKtEggz6PddbuSkvHKM9oKJyFgZV1B7rw8oChspxyYbtmEXYyg1AjfWbL3ho3XHDpHRZf";
    const OTHER_TPRV: &str = "tprv8ZgxMBicQKsPdpkqS7Eair4YxjcuuvDPNYmKX3sCniCf16tHEVrjjiSXEkFRnUH77yXc6ZcwHHcLNfjdi5qUvw3VDfgYiH5mNsj5izuiu2N";

    fn parse(secp: &SecpCtx, body: &str) -> Descriptor {
        let desc = format!("{}#{}", body, calc_checksum(body).unwrap());
        Descriptor::parse(secp, &desc).unwrap()
    }

    /// The coin descriptor the node would report for `path` below `tprv`
    fn coin_descriptor(secp: &SecpCtx, tprv: &str, path: &str) -> Descriptor {
        let xprv = Xpriv::from_str(tprv).unwrap();
        let derived = xprv
            .derive_priv(secp, &DerivationPath::from_str(&format!("m{}", path)).unwrap())
            .unwrap();
        let pk = derived.private_key.public_key(secp);

        parse(
            secp,
            &format!("wpkh([{}{}]{})", xprv.fingerprint(secp), path, pk),
        )
    }

    #[test]
    fn test_resolve_from_root() {
        let secp = Secp256k1::new();
        let known = vec![
            parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", OTHER_TPRV)),
            parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", TEST_TPRV)),
        ];
        let coin = coin_descriptor(&secp, TEST_TPRV, "/84'/1'/0'/0/3");

        let key = resolve(&secp, &coin, &known).unwrap();

        assert_matches!(coin.key, DescriptorKeyMaterial::Single(pk) if pk == key.public_key);
        assert_eq!(key.public_key, key.secret_key.public_key(&secp));
        assert_eq!(key.key_source.0, known[1].label);
        assert_eq!(
            key.key_source.1,
            DerivationPath::from_str("m/84'/1'/0'/0/3").unwrap()
        );
    }

    #[test]
    fn test_resolve_from_account_key() {
        let secp = Secp256k1::new();
        let master = Xpriv::from_str(TEST_TPRV).unwrap();
        let account = master
            .derive_priv(&secp, &DerivationPath::from_str("m/84'/1'/0'").unwrap())
            .unwrap();
        let known = vec![parse(
            &secp,
            &format!(
                "wpkh([{}/84h/1h/0h]{}/1/*)",
                master.fingerprint(&secp),
                account
            ),
        )];
        let coin = coin_descriptor(&secp, TEST_TPRV, "/84'/1'/0'/1/9");

        let key = resolve(&secp, &coin, &known).unwrap();
        assert_matches!(coin.key, DescriptorKeyMaterial::Single(pk) if pk == key.public_key);
    }

    #[test]
    fn test_key_not_found() {
        let secp = Secp256k1::new();
        let known = vec![parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", OTHER_TPRV))];
        let coin = coin_descriptor(&secp, TEST_TPRV, "/84'/1'/0'/0/0");

        assert_matches!(
            resolve(&secp, &coin, &known),
            Err(KeyError::KeyNotFound(fp)) if fp == coin.parent_label.unwrap()
        );
        assert_matches!(
            resolve(&secp, &coin, &[]),
            Err(KeyError::KeyNotFound(_))
        );
    }

    #[test]
    fn test_missing_private_key() {
        let secp = Secp256k1::new();
        let xprv = Xpriv::from_str(TEST_TPRV).unwrap();
        let tpub = Xpub::from_priv(&secp, &xprv);
        let known = vec![parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", tpub))];
        let coin = coin_descriptor(&secp, TEST_TPRV, "/84'/1'/0'/0/0");

        assert_matches!(
            resolve(&secp, &coin, &known),
            Err(KeyError::MissingPrivateKey(_))
        );
    }

    #[test]
    fn test_ranged_descriptor() {
        let secp = Secp256k1::new();
        let known = vec![parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", TEST_TPRV))];

        assert_matches!(
            resolve(&secp, &known[0], &known),
            Err(KeyError::RangedDescriptor)
        );
    }

    #[test]
    fn test_key_mismatch() {
        let secp = Secp256k1::new();
        let xprv = Xpriv::from_str(TEST_TPRV).unwrap();
        let known = vec![parse(&secp, &format!("wpkh({}/84h/1h/0h/0/*)", TEST_TPRV))];
        // key of index 1 reported with the path of index 2
        let wrong = xprv
            .derive_priv(&secp, &DerivationPath::from_str("m/84'/1'/0'/0/1").unwrap())
            .unwrap()
            .private_key
            .public_key(&secp);
        let coin = parse(
            &secp,
            &format!("wpkh([{}/84h/1h/0h/0/2]{})", xprv.fingerprint(&secp), wrong),
        );

        assert_matches!(
            resolve(&secp, &coin, &known),
            Err(KeyError::KeyMismatch { derived, .. }) if derived != wrong
        );
    }
}
