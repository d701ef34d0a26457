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

use bitcoin::{Amount, FeeRate, Network};
use serde::{Deserialize, Serialize};

use crate::types::MIN_TX_FEE;

/// `SIGHASH_ALL | SIGHASH_ANYONECANPAY`
///
/// Each signature only commits to its own input, so inputs can be added after signing. This
/// suits funding test transactions but leaves the transaction open to tampering.
pub const DEFAULT_SIGHASH: u8 = 0x81;

/// Wallet level configuration of a [`CoreWallet`](super::CoreWallet)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Network the addresses handed out by the node must belong to
    pub network: Network,
    /// Absolute fee used by [`fund_tx`](super::CoreWallet::fund_tx) when the options don't set one
    pub min_tx_fee: Amount,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            network: Network::Regtest,
            min_tx_fee: MIN_TX_FEE,
        }
    }
}

impl WalletConfig {
    /// Configuration for `network` with the default fee
    pub fn new(network: Network) -> Self {
        WalletConfig {
            network,
            ..Default::default()
        }
    }
}

/// Options of [`fund_tx`](super::CoreWallet::fund_tx)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundOptions {
    /// Absolute fee, [`WalletConfig::min_tx_fee`] when `None`
    pub fee: Option<Amount>,
    /// Sighash flag used for every input
    pub sighash: u8,
}

impl Default for FundOptions {
    fn default() -> Self {
        FundOptions {
            fee: None,
            sighash: DEFAULT_SIGHASH,
        }
    }
}

impl FundOptions {
    /// Set an absolute fee
    pub fn fee(mut self, fee: Amount) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Set the sighash flag
    pub fn sighash(mut self, sighash: u8) -> Self {
        self.sighash = sighash;
        self
    }
}

/// Options of [`fund_psbt`](super::CoreWallet::fund_psbt)
///
/// The size of the funded transaction is estimated as the size of the original unsigned
/// transaction, plus `input_vsize + witness_vsize` for every added input, plus `output_vsize`
/// for the change output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsbtFundOptions {
    /// Amount to fund, computed from the PSBT when `None`
    pub amount: Option<Amount>,
    /// Fee rate in sat/vB
    pub fee_rate: u64,
    /// Size of an input without its witness, in vB
    pub input_vsize: u64,
    /// Size of an input's witness, in vB
    pub witness_vsize: u64,
    /// Size of the change output, in vB
    pub output_vsize: u64,
}

impl Default for PsbtFundOptions {
    fn default() -> Self {
        PsbtFundOptions {
            amount: None,
            fee_rate: 1,
            input_vsize: 41,
            witness_vsize: 27,
            output_vsize: 43,
        }
    }
}

impl PsbtFundOptions {
    /// Fund exactly `amount`
    pub fn amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the fee rate in sat/vB
    pub fn fee_rate(mut self, sat_per_vb: u64) -> Self {
        self.fee_rate = sat_per_vb;
        self
    }

    pub(crate) fn rate(&self) -> FeeRate {
        FeeRate::from_sat_per_vb_unchecked(self.fee_rate)
    }

    /// Estimated size of the transaction once `inputs` inputs and the change output are added
    pub fn estimate_vsize(&self, base_vsize: u64, inputs: u64) -> u64 {
        base_vsize + inputs * (self.input_vsize + self.witness_vsize) + self.output_vsize
    }
}
