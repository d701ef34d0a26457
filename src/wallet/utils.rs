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

use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::Amount;

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::types::DUST_LIMIT;

/// Trait to check if a value is below the dust limit
pub trait IsDust {
    /// Check whether or not a value is below dust limit
    fn is_dust(&self) -> bool;
}

impl IsDust for Amount {
    fn is_dust(&self) -> bool {
        *self <= DUST_LIMIT
    }
}

/// Whether a selection totalling `selected` can pay `target` without leaving dust behind: either
/// it matches exactly or the change is strictly above [`DUST_LIMIT`]
pub fn is_acceptable_selection(selected: Amount, target: Amount) -> bool {
    match selected.checked_sub(target) {
        Some(change) => change == Amount::ZERO || !change.is_dust(),
        None => false,
    }
}

pub(crate) fn shuffle_slice<T, R: RngCore>(list: &mut [T], rng: &mut R) {
    list.shuffle(rng);
}

/// Secp256k1 context able to both sign and verify
pub type SecpCtx = Secp256k1<All>;
