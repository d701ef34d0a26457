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

//! Coin selection
//!
//! This module provides the trait [`CoinSelectionAlgorithm`] that can be implemented to
//! define custom coin selection algorithms.
//!
//! Every algorithm shipped here only decides the *order* in which the wallet's UTXOs are
//! considered. The stopping rule is shared: UTXOs are accumulated one by one and the selection
//! ends as soon as the running total either matches the target exactly or exceeds it by more
//! than [`DUST_LIMIT`], so that the resulting change output is never dust.
//!
//! [`DefaultCoinSelectionAlgorithm`] aliases the algorithm used by
//! [`CoreWallet`](super::CoreWallet) when none is given explicitly.
//!
//! ## Example
//!
//! ```
//! # use bitcoin::Amount;
//! # use corefund::Utxo;
//! # use corefund::wallet::coin_selection::*;
//! # use rand::RngCore;
//! /// Spend the UTXOs in the order the node listed them, but newest first
//! #[derive(Debug)]
//! struct ReverseListed;
//!
//! impl CoinSelectionAlgorithm for ReverseListed {
//!     fn coin_select<R: RngCore>(
//!         &self,
//!         utxos: Vec<Utxo>,
//!         target_amount: Amount,
//!         _: &mut R,
//!     ) -> Result<CoinSelectionResult, InsufficientFunds> {
//!         select_ordered_utxos(utxos.into_iter().rev(), target_amount)
//!     }
//! }
//! ```

use core::fmt;

use bitcoin::Amount;
use rand::RngCore;

use crate::types::{Utxo, DUST_LIMIT};
use crate::wallet::utils::{is_acceptable_selection, shuffle_slice};

/// Default coin selection algorithm used by [`CoreWallet`](super::CoreWallet) if not overridden
pub type DefaultCoinSelectionAlgorithm = SingleRandomDraw;

/// Wallet's UTXO set is not enough to cover the requested amount without leaving dust change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientFunds {
    /// Smallest total the selection would have needed
    pub needed: Amount,
    /// Total value of the UTXOs that were considered
    pub available: Amount,
}

impl fmt::Display for InsufficientFunds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Insufficient funds: {} available of {} needed",
            self.available, self.needed
        )
    }
}

impl std::error::Error for InsufficientFunds {}

/// Result of a successful coin selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelectionResult {
    /// UTXOs selected for use as inputs, in selection order
    pub selected: Vec<Utxo>,
    /// The amount the selection had to cover
    pub target_amount: Amount,
}

impl CoinSelectionResult {
    /// The total value of the inputs selected
    pub fn selected_amount(&self) -> Amount {
        self.selected.iter().map(|u| u.amount).sum()
    }

    /// What is left once the target is paid, either zero or more than [`DUST_LIMIT`]
    pub fn excess(&self) -> Amount {
        self.selected_amount()
            .checked_sub(self.target_amount)
            .unwrap_or(Amount::ZERO)
    }
}

/// Trait for generalized coin selection algorithms
///
/// For an example see [this module](crate::wallet::coin_selection)'s documentation.
pub trait CoinSelectionAlgorithm: core::fmt::Debug {
    /// Perform the coin selection
    ///
    /// - `utxos`: the wallet's spendable outputs, as freshly listed by the node
    /// - `target_amount`: the amount to cover, fees included
    /// - `rand`: random number generator used by some coin selection algorithms such as
    ///           [`SingleRandomDraw`]
    fn coin_select<R: RngCore>(
        &self,
        utxos: Vec<Utxo>,
        target_amount: Amount,
        rand: &mut R,
    ) -> Result<CoinSelectionResult, InsufficientFunds>;
}

/// Pull UTXOs at random until we have enough to meet the target
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRandomDraw;

impl CoinSelectionAlgorithm for SingleRandomDraw {
    fn coin_select<R: RngCore>(
        &self,
        mut utxos: Vec<Utxo>,
        target_amount: Amount,
        rand: &mut R,
    ) -> Result<CoinSelectionResult, InsufficientFunds> {
        shuffle_slice(&mut utxos, rand);
        select_ordered_utxos(utxos.into_iter(), target_amount)
    }
}

/// Simple and dumb coin selection
///
/// This coin selection algorithm sorts the available UTXOs by value and then picks them starting
/// from the largest ones until the required amount is reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargestFirstCoinSelection;

impl CoinSelectionAlgorithm for LargestFirstCoinSelection {
    fn coin_select<R: RngCore>(
        &self,
        mut utxos: Vec<Utxo>,
        target_amount: Amount,
        _: &mut R,
    ) -> Result<CoinSelectionResult, InsufficientFunds> {
        utxos.sort_by(|a, b| b.amount.cmp(&a.amount));
        select_ordered_utxos(utxos.into_iter(), target_amount)
    }
}

/// Picks the UTXOs in the order the node listed them
#[derive(Debug, Clone, Copy, Default)]
pub struct ListedOrderCoinSelection;

impl CoinSelectionAlgorithm for ListedOrderCoinSelection {
    fn coin_select<R: RngCore>(
        &self,
        utxos: Vec<Utxo>,
        target_amount: Amount,
        _: &mut R,
    ) -> Result<CoinSelectionResult, InsufficientFunds> {
        select_ordered_utxos(utxos.into_iter(), target_amount)
    }
}

/// Accumulate `utxos` in the given order until the total is acceptable for `target_amount`
///
/// When the whole set is consumed without success, [`InsufficientFunds::needed`] reports
/// `target_amount` if the total fell short, or the first total above the dust window otherwise.
pub fn select_ordered_utxos(
    utxos: impl Iterator<Item = Utxo>,
    target_amount: Amount,
) -> Result<CoinSelectionResult, InsufficientFunds> {
    let mut selected = Vec::new();
    let mut selected_amount = Amount::ZERO;

    for utxo in utxos {
        selected_amount += utxo.amount;
        log::debug!(
            "Selected {}, running total = `{}`, target = `{}`",
            utxo.outpoint,
            selected_amount,
            target_amount
        );
        selected.push(utxo);

        if is_acceptable_selection(selected_amount, target_amount) {
            return Ok(CoinSelectionResult {
                selected,
                target_amount,
            });
        }
    }

    let needed = if selected_amount < target_amount {
        target_amount
    } else {
        target_amount + DUST_LIMIT + Amount::from_sat(1)
    };

    Err(InsufficientFunds {
        needed,
        available: selected_amount,
    })
}
