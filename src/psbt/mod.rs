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

//! Additional functions on the `rust-bitcoin` `Psbt` structure.

use bitcoin::psbt::{Input, Output, Psbt};
use bitcoin::{Amount, CompressedPublicKey, ScriptBuf, Sequence, TxIn, TxOut, Witness};

use crate::descriptor::{Descriptor, DescriptorError, KeyType, SinglePubKey};
use crate::error::Error;
use crate::types::Utxo;
use crate::wallet::signer::{select_signer, SignatureScheme};
use crate::wallet::utils::SecpCtx;

/// Trait to add functions to extract utxos and add wallet funding to a PSBT.
pub trait PsbtUtils {
    /// Get the `TxOut` for the specified input index, if it doesn't exist in the PSBT `None` is returned.
    fn get_utxo_for(&self, input_index: usize) -> Option<TxOut>;

    /// Sum of the values of the inputs whose previous output is known
    fn known_input_amount(&self) -> Amount;

    /// Sum of the values of the outputs
    fn output_amount(&self) -> Amount;

    /// What the wallet has to add for the outputs to be paid, fees excluded
    ///
    /// Inputs without a previous output are considered funded by someone else and count as zero.
    fn funding_requirement(&self) -> Amount;

    /// Append an output to the unsigned transaction
    fn add_output(&mut self, txout: TxOut);

    /// Append an unsigned input spending `utxo`, with the derivation data of the key owning it
    fn add_funding_input(
        &mut self,
        secp: &SecpCtx,
        utxo: &Utxo,
        desc: &Descriptor,
    ) -> Result<(), Error>;
}

impl PsbtUtils for Psbt {
    fn get_utxo_for(&self, input_index: usize) -> Option<TxOut> {
        let tx = &self.unsigned_tx;
        let input = self.inputs.get(input_index)?;

        match (&input.witness_utxo, &input.non_witness_utxo) {
            (Some(_), _) => input.witness_utxo.clone(),
            (_, Some(in_tx)) => {
                let vout = tx.input.get(input_index)?.previous_output.vout as usize;
                in_tx.output.get(vout).cloned()
            }
            _ => None,
        }
    }

    fn known_input_amount(&self) -> Amount {
        (0..self.unsigned_tx.input.len())
            .filter_map(|i| self.get_utxo_for(i))
            .map(|txout| txout.value)
            .sum()
    }

    fn output_amount(&self) -> Amount {
        self.unsigned_tx.output.iter().map(|o| o.value).sum()
    }

    fn funding_requirement(&self) -> Amount {
        self.output_amount()
            .checked_sub(self.known_input_amount())
            .unwrap_or(Amount::ZERO)
    }

    fn add_output(&mut self, txout: TxOut) {
        self.unsigned_tx.output.push(txout);
        self.outputs.push(Output::default());
    }

    fn add_funding_input(
        &mut self,
        secp: &SecpCtx,
        utxo: &Utxo,
        desc: &Descriptor,
    ) -> Result<(), Error> {
        let scheme = select_signer(&desc.keytype)?;
        let public_key = desc.public_key(secp)?;
        let key_source = desc.key_source();

        let mut input = Input {
            witness_utxo: Some(utxo.txout()),
            ..Default::default()
        };

        match (scheme, public_key) {
            (SignatureScheme::SegwitV0, SinglePubKey::FullKey(pk)) => {
                if desc.keytype == KeyType::ShWpkh {
                    input.redeem_script = Some(ScriptBuf::new_p2wpkh(
                        &CompressedPublicKey(pk.inner).wpubkey_hash(),
                    ));
                }
                input.bip32_derivation.insert(pk.inner, key_source);
            }
            (SignatureScheme::Taproot, key) => {
                let xonly = match key {
                    SinglePubKey::XOnly(xonly) => xonly,
                    SinglePubKey::FullKey(pk) => pk.inner.x_only_public_key().0,
                };
                input.tap_internal_key = Some(xonly);
                input.tap_key_origins.insert(xonly, (vec![], key_source));
            }
            (SignatureScheme::SegwitV0, SinglePubKey::XOnly(_)) => {
                return Err(DescriptorError::InvalidKey(desc.keystr.clone()).into());
            }
        }

        self.unsigned_tx.input.push(TxIn {
            previous_output: utxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        });
        self.inputs.push(input);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use bitcoin::bip32::{DerivationPath, Xpriv};
    use bitcoin::secp256k1::Secp256k1;
    use bitcoin::transaction::Version;
    use bitcoin::{absolute, OutPoint, Transaction};

    use super::*;
    use crate::descriptor::calc_checksum;
    use crate::wallet::signer::SignerError;

    const TEST_TPRV: &str = "tprv8ZgxMBicQKsPdZXrcHNLf5JAJWFAoJ2TrstMRdSKtEggz6PddbuSkvHKM9oKJyFgZV1B7rw8oChspxyYbtmEXYyg1AjfWbL3ho3XHDpHRZf";
    const TXID: &str = "ebd9813ecebc57ff8f30797de7c205e3c7498ca950ea4341ee51a685ff2fa30a";

    fn coin_descriptor(secp: &SecpCtx, func: &str, path: &str, xonly: bool) -> Descriptor {
        let xprv = Xpriv::from_str(TEST_TPRV).unwrap();
        let pk = xprv
            .derive_priv(secp, &DerivationPath::from_str(&format!("m{}", path)).unwrap())
            .unwrap()
            .private_key
            .public_key(secp);
        let keystr = if xonly {
            pk.x_only_public_key().0.to_string()
        } else {
            pk.to_string()
        };

        let closing = ")".repeat(func.matches('(').count() + 1);
        let body = format!(
            "{}([{}{}]{}{}",
            func,
            xprv.fingerprint(secp),
            path,
            keystr,
            closing
        );
        let desc = format!("{}#{}", body, calc_checksum(&body).unwrap());
        Descriptor::parse(secp, &desc).unwrap()
    }

    fn utxo(value: u64, vout: u32, desc: &Descriptor) -> Utxo {
        Utxo {
            outpoint: OutPoint::from_str(&format!("{}:{}", TXID, vout)).unwrap(),
            desc: desc.to_string(),
            amount: Amount::from_sat(value),
            script_pubkey: ScriptBuf::new(),
        }
    }

    fn psbt(inputs: Vec<Option<u64>>, outputs: Vec<u64>) -> Psbt {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: (0..inputs.len() as u32)
                .map(|vout| TxIn {
                    previous_output: OutPoint::from_str(&format!("{}:{}", TXID, 100 + vout))
                        .unwrap(),
                    ..Default::default()
                })
                .collect(),
            output: outputs
                .into_iter()
                .map(|value| TxOut {
                    value: Amount::from_sat(value),
                    script_pubkey: ScriptBuf::new(),
                })
                .collect(),
        };

        let mut psbt = Psbt::from_unsigned_tx(tx).unwrap();
        for (input, value) in psbt.inputs.iter_mut().zip(inputs) {
            input.witness_utxo = value.map(|value| TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::new(),
            });
        }
        psbt
    }

    #[test]
    fn test_funding_requirement() {
        let psbt = psbt(vec![Some(30_000), None], vec![50_000, 20_000]);

        assert_eq!(psbt.known_input_amount(), Amount::from_sat(30_000));
        assert_eq!(psbt.output_amount(), Amount::from_sat(70_000));
        assert_eq!(psbt.funding_requirement(), Amount::from_sat(40_000));
    }

    #[test]
    fn test_overfunded_psbt_requires_nothing() {
        let psbt = psbt(vec![Some(90_000)], vec![50_000]);
        assert_eq!(psbt.funding_requirement(), Amount::ZERO);
    }

    #[test]
    fn test_add_segwit_input() {
        let secp = Secp256k1::new();
        let desc = coin_descriptor(&secp, "wpkh", "/84'/1'/0'/0/4", false);
        let mut psbt = psbt(vec![], vec![50_000]);

        psbt.add_funding_input(&secp, &utxo(60_000, 1, &desc), &desc)
            .unwrap();

        assert_eq!(psbt.unsigned_tx.input.len(), 1);
        assert_eq!(psbt.inputs.len(), 1);
        let input = &psbt.inputs[0];
        assert_eq!(
            input.witness_utxo.as_ref().map(|o| o.value),
            Some(Amount::from_sat(60_000))
        );
        assert!(input.tap_key_origins.is_empty());
        assert!(input.redeem_script.is_none());

        let (pk, source) = input.bip32_derivation.iter().next().unwrap();
        assert_eq!(pk.to_string(), desc.keystr);
        assert_eq!(source, &desc.key_source());
        assert_eq!(psbt.known_input_amount(), Amount::from_sat(60_000));
    }

    #[test]
    fn test_add_nested_segwit_input() {
        let secp = Secp256k1::new();
        let desc = coin_descriptor(&secp, "sh(wpkh", "/49'/1'/0'/0/0", false);
        let mut psbt = psbt(vec![], vec![]);

        psbt.add_funding_input(&secp, &utxo(60_000, 0, &desc), &desc)
            .unwrap();

        assert!(psbt.inputs[0].redeem_script.as_ref().unwrap().is_p2wpkh());
        assert_eq!(psbt.inputs[0].bip32_derivation.len(), 1);
    }

    #[test]
    fn test_add_taproot_input() {
        let secp = Secp256k1::new();
        let desc = coin_descriptor(&secp, "tr", "/86'/1'/0'/0/2", true);
        let mut psbt = psbt(vec![], vec![50_000]);

        psbt.add_funding_input(&secp, &utxo(60_000, 0, &desc), &desc)
            .unwrap();

        let input = &psbt.inputs[0];
        assert!(input.bip32_derivation.is_empty());
        let (xonly, (leaves, source)) = input.tap_key_origins.iter().next().unwrap();
        assert_eq!(xonly.to_string(), desc.keystr);
        assert!(leaves.is_empty());
        assert_eq!(source, &desc.key_source());
        assert_eq!(input.tap_internal_key, Some(*xonly));
    }

    #[test]
    fn test_unknown_keytype_leaves_psbt_untouched() {
        let secp = Secp256k1::new();
        let desc = coin_descriptor(&secp, "pk", "/0'/0'/0'/0/0", false);
        let mut psbt = psbt(vec![], vec![50_000]);

        assert_matches!(
            psbt.add_funding_input(&secp, &utxo(60_000, 0, &desc), &desc),
            Err(Error::Signer(SignerError::UnsupportedKeyType(t))) if t == "pk"
        );
        assert!(psbt.unsigned_tx.input.is_empty());
        assert!(psbt.inputs.is_empty());
    }

    #[test]
    fn test_add_output() {
        let mut psbt = psbt(vec![], vec![50_000]);
        psbt.add_output(TxOut {
            value: Amount::from_sat(1_500),
            script_pubkey: ScriptBuf::new(),
        });

        assert_eq!(psbt.unsigned_tx.output.len(), 2);
        assert_eq!(psbt.outputs.len(), 2);
        assert_eq!(psbt.output_amount(), Amount::from_sat(51_500));
    }
}
