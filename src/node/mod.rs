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

//! Node backend
//!
//! The wallet never talks to the network by itself, every piece of chain and wallet state comes
//! from a Bitcoin Core node through the [`NodeRpc`] trait. All the values crossing this boundary
//! are expressed in the node's display unit (BTC), the wallet converts them with
//! [`btc_to_sat`](crate::btc_to_sat) and [`sat_to_btc`](crate::sat_to_btc).
//!
//! When the `rpc` feature is enabled [`rpc::RpcNode`] implements the trait over a
//! `bitcoincore-rpc` client.

use bitcoin::Txid;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::UnspentEntry;

#[cfg(feature = "rpc")]
#[cfg_attr(docsrs, doc(cfg(feature = "rpc")))]
pub mod rpc;

/// Type of the addresses generated by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressType {
    /// P2PKH
    Legacy,
    /// P2SH-P2WPKH
    P2shSegwit,
    /// P2WPKH
    Bech32,
    /// P2TR
    Bech32m,
}

impl AddressType {
    /// Name of the type in the node's RPC interface
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Legacy => "legacy",
            AddressType::P2shSegwit => "p2sh-segwit",
            AddressType::Bech32 => "bech32",
            AddressType::Bech32m => "bech32m",
        }
    }
}

/// Options of the `getnewaddress` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddressOptions {
    /// Label attached to the address
    pub label: Option<String>,
    /// Address type, the node's default when `None`
    pub address_type: Option<AddressType>,
}

/// Reply of the `walletprocesspsbt` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPsbt {
    /// The signed PSBT, base64 encoded
    pub psbt: String,
    /// Whether every input is now finalized
    pub complete: bool,
}

/// Trait that defines the node operations the wallet relies on
///
/// Implementations are expected to be scoped to a single wallet of the node.
pub trait NodeRpc {
    /// List the spendable outputs of the wallet (`listunspent`)
    fn list_unspent(&self) -> Result<Vec<UnspentEntry>, Error>;

    /// List the wallet's descriptors, with their private keys when `private` is set
    /// (`listdescriptors`)
    fn list_descriptors(&self, private: bool) -> Result<Vec<String>, Error>;

    /// Generate a fresh address (`getnewaddress`)
    fn new_address(&self, options: &NewAddressOptions) -> Result<String, Error>;

    /// List the addresses attached to `label` (`getaddressesbylabel`)
    fn addresses_by_label(&self, label: &str) -> Result<Vec<String>, Error>;

    /// Broadcast a raw transaction, hex encoded (`sendrawtransaction`)
    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, Error>;

    /// Hand a base64 PSBT to the node's signer (`walletprocesspsbt`)
    fn process_psbt(&self, psbt_base64: &str) -> Result<ProcessedPsbt, Error>;

    /// Confirmed balance of the wallet, in BTC (`getbalance`)
    fn get_balance(&self) -> Result<f64, Error>;

    /// Let the node fund, sign and broadcast a payment of `amount` BTC (`sendtoaddress`)
    fn send_to_address(&self, address: &str, amount: f64) -> Result<Txid, Error>;
}

impl<T: NodeRpc + ?Sized> NodeRpc for &T {
    fn list_unspent(&self) -> Result<Vec<UnspentEntry>, Error> {
        (**self).list_unspent()
    }
    fn list_descriptors(&self, private: bool) -> Result<Vec<String>, Error> {
        (**self).list_descriptors(private)
    }
    fn new_address(&self, options: &NewAddressOptions) -> Result<String, Error> {
        (**self).new_address(options)
    }
    fn addresses_by_label(&self, label: &str) -> Result<Vec<String>, Error> {
        (**self).addresses_by_label(label)
    }
    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, Error> {
        (**self).broadcast(raw_tx_hex)
    }
    fn process_psbt(&self, psbt_base64: &str) -> Result<ProcessedPsbt, Error> {
        (**self).process_psbt(psbt_base64)
    }
    fn get_balance(&self) -> Result<f64, Error> {
        (**self).get_balance()
    }
    fn send_to_address(&self, address: &str, amount: f64) -> Result<Txid, Error> {
        (**self).send_to_address(address, amount)
    }
}
