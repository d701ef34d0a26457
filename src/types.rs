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

use bitcoin::{Amount, OutPoint, ScriptBuf, TxOut, Txid};

use serde::{Deserialize, Serialize};

/// Smallest change the coin selection is allowed to leave behind, in satoshi
pub const DUST_LIMIT: Amount = Amount::from_sat(1_000);

/// Absolute fee used by [`CoreWallet::fund_tx`](crate::wallet::CoreWallet::fund_tx) when none is
/// given
pub const MIN_TX_FEE: Amount = Amount::from_sat(1_000);

/// Number of satoshi in one bitcoin, the node's display unit
pub const SAT_MULTI: u64 = 100_000_000;

/// Convert a value in the node's display unit (BTC) into satoshi, rounding to the closest unit
pub fn btc_to_sat(amount: f64) -> u64 {
    (amount * SAT_MULTI as f64).round() as u64
}

/// Convert a satoshi value into the node's display unit (BTC)
pub fn sat_to_btc(sats: u64) -> f64 {
    sats as f64 / SAT_MULTI as f64
}

/// One entry of the node's `listunspent` reply
///
/// Amounts are still expressed in the node's display unit here, see [`Utxo`] for the
/// satoshi-denominated version used by coin selection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UnspentEntry {
    /// Id of the transaction holding the output
    pub txid: Txid,
    /// Index of the output in the transaction
    pub vout: u32,
    /// Descriptor able to spend the output
    pub desc: String,
    /// Value in BTC
    pub amount: f64,
    /// Locking script of the output
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptBuf,
    /// Number of confirmations, when reported
    #[serde(default)]
    pub confirmations: Option<u32>,
}

/// An unspent output owned by the node wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Utxo {
    /// Reference to the transaction output
    pub outpoint: OutPoint,
    /// Descriptor able to spend this output
    pub desc: String,
    /// Value of the output
    pub amount: Amount,
    /// Locking script of the output
    pub script_pubkey: ScriptBuf,
}

impl Utxo {
    /// The previous output, as needed by sighash computation and PSBT inputs
    pub fn txout(&self) -> TxOut {
        TxOut {
            value: self.amount,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}

impl From<UnspentEntry> for Utxo {
    fn from(entry: UnspentEntry) -> Self {
        Utxo {
            outpoint: OutPoint {
                txid: entry.txid,
                vout: entry.vout,
            },
            desc: entry.desc,
            amount: Amount::from_sat(btc_to_sat(entry.amount)),
            script_pubkey: entry.script_pubkey,
        }
    }
}
