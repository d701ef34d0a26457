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

//! Input signers
//!
//! The signature scheme of an input only depends on the script type of the descriptor that owns
//! the coin: `tr()` coins are spent through the taproot key path with a BIP340 signature, every
//! other supported type is signed with ECDSA over the BIP143 (segwit v0) sighash.
//!
//! ```
//! # use corefund::descriptor::KeyType;
//! # use corefund::wallet::signer::*;
//! assert_eq!(select_signer(&KeyType::Tr)?, SignatureScheme::Taproot);
//! assert_eq!(select_signer(&KeyType::Wpkh)?, SignatureScheme::SegwitV0);
//! assert!(select_signer(&KeyType::Other("multi".into())).is_err());
//! # Ok::<_, SignerError>(())
//! ```

use std::fmt;

use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, TapTweak};
use bitcoin::script::{Builder, PushBytes};
use bitcoin::secp256k1::Message;
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{ecdsa, taproot, CompressedPublicKey, ScriptBuf, Transaction, TxOut, Witness};

use crate::descriptor::KeyType;
use crate::keys::DerivedKey;
use crate::wallet::utils::SecpCtx;

/// Signing error
#[derive(Debug)]
pub enum SignerError {
    /// The descriptor's script type can't be signed by this wallet
    UnsupportedKeyType(String),
    /// The sighash flag is not valid for the signature scheme
    NonStandardSighash(u8),
    /// Input index is out of range
    InputIndexOutOfRange(usize),
    /// Error computing the BIP143 sighash
    SegwitSighash(bitcoin::sighash::P2wpkhError),
    /// Error computing the BIP341 sighash
    TaprootSighash(bitcoin::sighash::TaprootError),
    /// The redeem script can't be pushed in the `scriptSig`
    PushBytes(bitcoin::script::PushBytesError),
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKeyType(keytype) => write!(f, "Unsupported key type: {}", keytype),
            Self::NonStandardSighash(flag) => write!(f, "Non-standard sighash flag: {:#04x}", flag),
            Self::InputIndexOutOfRange(index) => write!(f, "Input index out of range: {}", index),
            Self::SegwitSighash(err) => write!(f, "Segwit sighash error: {}", err),
            Self::TaprootSighash(err) => write!(f, "Taproot sighash error: {}", err),
            Self::PushBytes(err) => write!(f, "Invalid redeem script: {}", err),
        }
    }
}

impl std::error::Error for SignerError {}

impl_error!(bitcoin::sighash::P2wpkhError, SegwitSighash, SignerError);
impl_error!(bitcoin::sighash::TaprootError, TaprootSighash, SignerError);
impl_error!(bitcoin::script::PushBytesError, PushBytes, SignerError);

/// Signature algorithm used to spend a coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// ECDSA over the BIP143 sighash, the public key is pushed after the signature
    SegwitV0,
    /// Schnorr over the BIP341 sighash, key path spend
    Taproot,
}

/// Pick the signature scheme for a descriptor script type
///
/// `pkh` maps to [`SignatureScheme::SegwitV0`] like the other ECDSA types. The BIP143 signature
/// and witness this produces do not satisfy a legacy P2PKH output, so a transaction spending
/// one is rejected by consensus.
pub fn select_signer(keytype: &KeyType) -> Result<SignatureScheme, SignerError> {
    match keytype {
        KeyType::Tr => Ok(SignatureScheme::Taproot),
        KeyType::Pkh | KeyType::Wpkh | KeyType::ShWpkh => Ok(SignatureScheme::SegwitV0),
        KeyType::Other(other) => Err(SignerError::UnsupportedKeyType(other.clone())),
    }
}

/// Signs the input spending one specific coin
#[derive(Debug, Clone)]
pub struct InputSigner {
    keytype: KeyType,
    scheme: SignatureScheme,
    key: DerivedKey,
}

impl InputSigner {
    /// Create a signer for a coin owned by a descriptor of type `keytype`
    pub fn new(keytype: KeyType, key: DerivedKey) -> Result<Self, SignerError> {
        let scheme = select_signer(&keytype)?;
        Ok(InputSigner {
            keytype,
            scheme,
            key,
        })
    }

    /// Signature scheme in use
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// The key signing the input
    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    /// `scriptSig` of the input, only non-empty for P2SH-wrapped segwit
    pub fn script_sig(&self) -> Result<ScriptBuf, SignerError> {
        if self.keytype != KeyType::ShWpkh {
            return Ok(ScriptBuf::new());
        }

        let redeem_script = self.p2wpkh_script_code();
        let push: &PushBytes = redeem_script.as_bytes().try_into()?;
        Ok(Builder::new().push_slice(push).into_script())
    }

    fn p2wpkh_script_code(&self) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&CompressedPublicKey(self.key.public_key).wpubkey_hash())
    }

    /// Sign input `input_index` of the transaction cached in `cache`
    ///
    /// `prevouts` holds the outputs spent by every input of the transaction, in input order.
    /// With an `ANYONECANPAY` flag only the entry of `input_index` is committed to.
    pub fn sign_input(
        &self,
        secp: &SecpCtx,
        cache: &mut SighashCache<&Transaction>,
        input_index: usize,
        prevouts: &[TxOut],
        sighash: u8,
    ) -> Result<Witness, SignerError> {
        let prevout = prevouts
            .get(input_index)
            .ok_or(SignerError::InputIndexOutOfRange(input_index))?;

        match self.scheme {
            SignatureScheme::SegwitV0 => {
                let sighash_type = EcdsaSighashType::from_standard(sighash as u32)
                    .map_err(|_| SignerError::NonStandardSighash(sighash))?;
                let hash = cache.p2wpkh_signature_hash(
                    input_index,
                    &self.p2wpkh_script_code(),
                    prevout.value,
                    sighash_type,
                )?;

                let msg = Message::from_digest(hash.to_byte_array());
                let signature = ecdsa::Signature {
                    signature: secp.sign_ecdsa(&msg, &self.key.secret_key),
                    sighash_type,
                };

                Ok(Witness::from(vec![
                    signature.to_vec(),
                    self.key.public_key.serialize().to_vec(),
                ]))
            }
            SignatureScheme::Taproot => {
                let sighash_type = TapSighashType::from_consensus_u8(sighash)
                    .map_err(|_| SignerError::NonStandardSighash(sighash))?;
                let anyone_can_pay = matches!(
                    sighash_type,
                    TapSighashType::AllPlusAnyoneCanPay
                        | TapSighashType::NonePlusAnyoneCanPay
                        | TapSighashType::SinglePlusAnyoneCanPay
                );
                let hash = if anyone_can_pay {
                    cache.taproot_key_spend_signature_hash(
                        input_index,
                        &Prevouts::One(input_index, prevout),
                        sighash_type,
                    )?
                } else {
                    cache.taproot_key_spend_signature_hash(
                        input_index,
                        &Prevouts::All(prevouts),
                        sighash_type,
                    )?
                };

                let keypair = Keypair::from_secret_key(secp, &self.key.secret_key)
                    .tap_tweak(secp, None)
                    .to_inner();
                let msg = Message::from_digest(hash.to_byte_array());
                let signature = taproot::Signature {
                    signature: secp.sign_schnorr_no_aux_rand(&msg, &keypair),
                    sighash_type,
                };

                Ok(Witness::from(vec![signature.to_vec()]))
            }
        }
    }
}
