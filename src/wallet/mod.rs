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

//! Wallet
//!
//! This module defines the [`CoreWallet`] structure, a funding wallet layered over the wallet of
//! a Bitcoin Core node. The node lists coins, hands out addresses and broadcasts, while the
//! wallet selects coins, re-derives the signing keys from the node's descriptors and signs.

use std::str::FromStr;

use bitcoin::absolute::LockTime;
use bitcoin::bip32::Fingerprint;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::psbt::Psbt;
use bitcoin::sighash::SighashCache;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid};
use rand::RngCore;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

pub mod address_cache;
pub mod coin_selection;
pub mod params;
pub mod signer;
pub mod utils;

use address_cache::AddressCache;
use coin_selection::{CoinSelectionAlgorithm, CoinSelectionResult, InsufficientFunds};
use params::{FundOptions, PsbtFundOptions, WalletConfig};
use signer::{select_signer, InputSigner};
use utils::SecpCtx;

use crate::descriptor::{Descriptor, KeyType};
use crate::error::Error;
use crate::keys;
use crate::node::{AddressType, NewAddressOptions, NodeRpc};
use crate::psbt::PsbtUtils;
use crate::types::{btc_to_sat, sat_to_btc, Utxo};

/// Balance a faucet must keep on top of what it hands out
pub const FAUCET_RESERVE: Amount = Amount::from_sat(10_000);

/// A funding wallet backed by a node
///
/// Every call reads fresh data from the node: UTXOs and descriptors are never cached, so two
/// fundings running against the same node wallet may pick the same coins. Callers needing
/// exclusive coins must serialize their funding calls.
#[derive(Debug)]
pub struct CoreWallet<N> {
    node: N,
    secp: SecpCtx,
    config: WalletConfig,
    address_cache: AddressCache,
}

impl<N> CoreWallet<N>
where
    N: NodeRpc,
{
    /// Create a wallet over `node`
    pub fn new(node: N, config: WalletConfig) -> Self {
        CoreWallet {
            node,
            secp: SecpCtx::new(),
            config,
            address_cache: AddressCache::new(),
        }
    }

    /// Return a reference to the node backend
    pub fn node(&self) -> &N {
        &self.node
    }

    /// Get the Bitcoin network the wallet is using.
    pub fn network(&self) -> Network {
        self.config.network
    }

    /// Return the secp256k1 context used for all signing operations
    pub fn secp_ctx(&self) -> &SecpCtx {
        &self.secp
    }

    /// Return the labelled address cache
    pub fn address_cache(&self) -> &AddressCache {
        &self.address_cache
    }

    /// Return the list of unspent outputs of this wallet
    pub fn utxos(&self) -> Result<Vec<Utxo>, Error> {
        Ok(self
            .node
            .list_unspent()?
            .into_iter()
            .map(Utxo::from)
            .collect())
    }

    /// Descriptors of the node wallet, with their private keys
    pub fn xprvs(&self) -> Result<Vec<Descriptor>, Error> {
        self.descriptors(true)
    }

    /// Descriptors of the node wallet, public keys only
    pub fn xpubs(&self) -> Result<Vec<Descriptor>, Error> {
        self.descriptors(false)
    }

    fn descriptors(&self, private: bool) -> Result<Vec<Descriptor>, Error> {
        let descriptors = self
            .node
            .list_descriptors(private)?
            .iter()
            .filter_map(|desc| match Descriptor::parse(&self.secp, desc) {
                Ok(desc) => Some(desc),
                Err(e) => {
                    warn!("Skipping descriptor {}: {}", desc, e);
                    None
                }
            })
            .collect();

        Ok(descriptors)
    }

    /// Key string of the first private `wpkh` descriptor of the node wallet
    pub fn xprv(&self) -> Result<String, Error> {
        first_wpkh_key(self.xprvs()?)
    }

    /// Key string of the first public `wpkh` descriptor of the node wallet
    pub fn xpub(&self) -> Result<String, Error> {
        first_wpkh_key(self.xpubs()?)
    }

    /// Private descriptor whose key is labelled `label`
    pub fn get_xprv(&self, label: Fingerprint) -> Result<Option<Descriptor>, Error> {
        Ok(self.xprvs()?.into_iter().find(|desc| desc.label == label))
    }

    /// Balance of the wallet
    pub fn balance(&self) -> Result<Amount, Error> {
        Ok(Amount::from_sat(btc_to_sat(self.node.get_balance()?)))
    }

    /// Ask the node for a fresh address
    pub fn new_address(&self, address_type: Option<AddressType>) -> Result<Address, Error> {
        let address = self.node.new_address(&NewAddressOptions {
            label: None,
            address_type,
        })?;
        self.parse_address(&address)
    }

    /// Locking script of a fresh address
    pub fn new_script_pubkey(&self) -> Result<ScriptBuf, Error> {
        Ok(self.new_address(None)?.script_pubkey())
    }

    /// Address attached to `label`
    ///
    /// Looks in the wallet cache first, then among the addresses the node already attached to
    /// the label, and finally asks the node for a new labelled address. The address found is
    /// cached, so the same label always maps to the same address.
    pub fn get_address(&mut self, label: &str) -> Result<Address, Error> {
        if let Some(address) = self.address_cache.get(label) {
            debug!("Address cache hit for label `{}`", label);
            return Ok(address.clone());
        }

        let address = match self.node.addresses_by_label(label)?.into_iter().next() {
            Some(address) => address,
            None => self.node.new_address(&NewAddressOptions {
                label: Some(label.to_string()),
                address_type: None,
            })?,
        };
        let address = self.parse_address(&address)?;

        Ok(self.address_cache.insert(label, address).clone())
    }

    fn parse_address(&self, address: &str) -> Result<Address, Error> {
        Ok(Address::from_str(address)?.require_network(self.config.network)?)
    }

    /// Output paying `amount` to `address`, or to a fresh wallet address when `None`
    pub fn create_txout(&self, amount: Amount, address: Option<&Address>) -> Result<TxOut, Error> {
        let script_pubkey = match address {
            Some(address) => address.script_pubkey(),
            None => self.new_script_pubkey()?,
        };

        Ok(TxOut {
            value: amount,
            script_pubkey,
        })
    }

    /// Select coins from a fresh listing to cover `amount`
    pub fn select_utxos<Cs, R>(
        &self,
        amount: Amount,
        coin_selection: &Cs,
        rng: &mut R,
    ) -> Result<CoinSelectionResult, Error>
    where
        Cs: CoinSelectionAlgorithm,
        R: RngCore,
    {
        let result = coin_selection.coin_select(self.utxos()?, amount, rng)?;
        debug!(
            "Coin selection: {} utxos for {}, selected {}",
            result.selected.len(),
            amount,
            result.selected_amount()
        );
        Ok(result)
    }

    /// Build the signer of a coin owned by `desc`, deriving its key from `known_xprvs`
    ///
    /// `pkh` coins are signed like `wpkh` ones, see [`select_signer`].
    pub fn get_signer(
        &self,
        desc: &Descriptor,
        known_xprvs: &[Descriptor],
    ) -> Result<InputSigner, Error> {
        select_signer(&desc.keytype)?;
        if desc.keytype == KeyType::Pkh {
            warn!(
                "Coin of {} is a legacy pkh output, its segwit signature won't be valid on chain",
                desc.keystr
            );
        }
        let key = keys::resolve(&self.secp, desc, known_xprvs)?;
        debug!(
            "Signer for {} ({}) at {}",
            desc.keystr, desc.keytype, desc.fullpath
        );
        Ok(InputSigner::new(desc.keytype.clone(), key)?)
    }

    /// Fund and sign a transaction paying the `template` outputs
    ///
    /// Coins are selected to cover the template plus the fee, change goes to a fresh wallet
    /// address and is appended after the template outputs. Every input is signed with
    /// `options.sighash`. Nothing is returned unless all the inputs could be signed.
    pub fn fund_tx<Cs, R>(
        &self,
        template: &[TxOut],
        options: &FundOptions,
        coin_selection: &Cs,
        rng: &mut R,
    ) -> Result<Transaction, Error>
    where
        Cs: CoinSelectionAlgorithm,
        R: RngCore,
    {
        let fee = options.fee.unwrap_or(self.config.min_tx_fee);
        let target: Amount = template.iter().map(|txout| txout.value).sum();
        let needed = target
            .checked_add(fee)
            .ok_or_else(|| Error::Generic("Amount overflow".to_string()))?;

        let selection = self.select_utxos(needed, coin_selection, rng)?;
        let change = selection.excess();

        let known_xprvs = self.xprvs()?;
        let signers = selection
            .selected
            .iter()
            .map(|utxo| {
                let desc = Descriptor::parse(&self.secp, &utxo.desc)?;
                self.get_signer(&desc, &known_xprvs)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let input = selection
            .selected
            .iter()
            .zip(&signers)
            .map(|(utxo, signer)| {
                Ok(TxIn {
                    previous_output: utxo.outpoint,
                    script_sig: signer.script_sig()?,
                    sequence: Sequence::MAX,
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut output = template.to_vec();
        if change > Amount::ZERO {
            output.push(self.create_txout(change, None)?);
        } else {
            debug!("Exact match, no change output");
        }

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input,
            output,
        };

        let prevouts: Vec<TxOut> = selection.selected.iter().map(Utxo::txout).collect();
        let witnesses = {
            let mut cache = SighashCache::new(&tx);
            signers
                .iter()
                .enumerate()
                .map(|(index, signer)| {
                    signer.sign_input(&self.secp, &mut cache, index, &prevouts, options.sighash)
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        for (input, witness) in tx.input.iter_mut().zip(witnesses) {
            input.witness = witness;
        }

        info!(
            "Funded tx {}: {} inputs, {} outputs, fee {}, change {}",
            tx.compute_txid(),
            tx.input.len(),
            tx.output.len(),
            fee,
            change
        );

        Ok(tx)
    }

    /// Fund a serialized PSBT, see [`CoreWallet::fund_psbt_data`]
    pub fn fund_psbt<Cs, R>(
        &self,
        psbt: &[u8],
        options: &PsbtFundOptions,
        coin_selection: &Cs,
        rng: &mut R,
    ) -> Result<Vec<u8>, Error>
    where
        Cs: CoinSelectionAlgorithm,
        R: RngCore,
    {
        let psbt = Psbt::deserialize(psbt)?;
        Ok(self
            .fund_psbt_data(psbt, options, coin_selection, rng)?
            .serialize())
    }

    /// Fund a base64 encoded PSBT, see [`CoreWallet::fund_psbt_data`]
    pub fn fund_psbt_base64<Cs, R>(
        &self,
        psbt: &str,
        options: &PsbtFundOptions,
        coin_selection: &Cs,
        rng: &mut R,
    ) -> Result<String, Error>
    where
        Cs: CoinSelectionAlgorithm,
        R: RngCore,
    {
        let psbt = Psbt::from_str(psbt)?;
        Ok(self
            .fund_psbt_data(psbt, options, coin_selection, rng)?
            .to_string())
    }

    /// Add wallet inputs and change to `psbt` so that its outputs and the fee are paid
    ///
    /// The amount to fund is `options.amount` or, when unset, what the outputs require on top
    /// of the inputs whose previous output is known. The added inputs are left unsigned and
    /// carry the derivation data an external signer needs to sign them, see
    /// [`CoreWallet::process_psbt`].
    pub fn fund_psbt_data<Cs, R>(
        &self,
        mut psbt: Psbt,
        options: &PsbtFundOptions,
        coin_selection: &Cs,
        rng: &mut R,
    ) -> Result<Psbt, Error>
    where
        Cs: CoinSelectionAlgorithm,
        R: RngCore,
    {
        let amount = options
            .amount
            .unwrap_or_else(|| psbt.funding_requirement());

        let selection = self.select_utxos(amount, coin_selection, rng)?;
        let selected_amount = selection.selected_amount();
        let n_inputs = selection.selected.len() as u64;

        let vsize = options.estimate_vsize(psbt.unsigned_tx.vsize() as u64, n_inputs);
        let fee = options
            .rate()
            .fee_vb(vsize)
            .ok_or_else(|| Error::Generic("Fee overflow".to_string()))?;
        debug!("Estimated vsize {} vB, fee {}", vsize, fee);

        let needed = amount
            .checked_add(fee)
            .ok_or_else(|| Error::Generic("Amount overflow".to_string()))?;
        let change = selected_amount
            .checked_sub(needed)
            .ok_or(InsufficientFunds {
                needed,
                available: selected_amount,
            })?;

        let descriptors = selection
            .selected
            .iter()
            .map(|utxo| Descriptor::parse(&self.secp, &utxo.desc))
            .collect::<Result<Vec<_>, _>>()?;
        for (utxo, desc) in selection.selected.iter().zip(&descriptors) {
            psbt.add_funding_input(&self.secp, utxo, desc)?;
        }

        if change > Amount::ZERO {
            psbt.add_output(self.create_txout(change, None)?);
        }

        info!(
            "Funded psbt with {} inputs for {}, fee {}, change {}",
            n_inputs, amount, fee, change
        );

        Ok(psbt)
    }

    /// Let the node sign and finalize the inputs it owns
    ///
    /// Returns the processed PSBT and whether it is now complete.
    pub fn process_psbt(&self, psbt: &Psbt) -> Result<(Psbt, bool), Error> {
        let processed = self.node.process_psbt(&psbt.to_string())?;
        Ok((Psbt::from_str(&processed.psbt)?, processed.complete))
    }

    /// Let the node pay `amount` to `address` from its own coins
    pub fn send_funds(&self, amount: Amount, address: &Address) -> Result<Txid, Error> {
        let txid = self
            .node
            .send_to_address(&address.to_string(), sat_to_btc(amount.to_sat()))?;
        info!("Sent {} to {}: {}", amount, address, txid);
        Ok(txid)
    }

    /// Broadcast a transaction through the node
    pub fn broadcast(&self, tx: &Transaction) -> Result<Txid, Error> {
        let txid = self.node.broadcast(&serialize_hex(tx))?;
        info!("Broadcast tx {}", txid);
        Ok(txid)
    }

    /// Have `faucet` pay `amount` to `address`, or to a fresh address of this wallet
    ///
    /// The faucet must hold more than `amount` plus [`FAUCET_RESERVE`].
    pub fn drain_faucet<F: NodeRpc>(
        &self,
        faucet: &CoreWallet<F>,
        amount: Amount,
        address: Option<&Address>,
    ) -> Result<Txid, Error> {
        let address = match address {
            Some(address) => address.clone(),
            None => self.new_address(None)?,
        };

        let needed = amount
            .checked_add(FAUCET_RESERVE)
            .ok_or_else(|| Error::Generic("Amount overflow".to_string()))?;
        let available = faucet.balance()?;
        if available <= needed {
            return Err(Error::InsufficientFunds { needed, available });
        }

        faucet.send_funds(amount, &address)
    }

    /// Top the wallet up from `faucet` when its balance is `min_balance` or less
    ///
    /// Returns the funding transaction, if one was needed. The payment is unconfirmed.
    pub fn ensure_funds<F: NodeRpc>(
        &self,
        faucet: &CoreWallet<F>,
        min_balance: Amount,
    ) -> Result<Option<Txid>, Error> {
        if self.balance()? > min_balance {
            return Ok(None);
        }

        self.drain_faucet(faucet, min_balance, None).map(Some)
    }
}

fn first_wpkh_key(descriptors: Vec<Descriptor>) -> Result<String, Error> {
    descriptors
        .into_iter()
        .find(|desc| desc.keytype == KeyType::Wpkh)
        .map(|desc| desc.keystr)
        .ok_or_else(|| Error::Generic("No wpkh descriptor in the wallet".to_string()))
}
