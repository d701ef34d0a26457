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

//! Labelled address cache
//!
//! Maps a label to the address first handed out for it, so that repeated lookups of the same
//! label always return the same address without a round trip to the node.

use std::collections::HashMap;

use bitcoin::Address;

/// One address per label, the first one stored wins
#[derive(Debug, Clone, Default)]
pub struct AddressCache {
    map: HashMap<String, Address>,
}

impl AddressCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Address cached for `label`
    pub fn get(&self, label: &str) -> Option<&Address> {
        self.map.get(label)
    }

    /// Cache `address` for `label` unless the label already has one, return the cached address
    pub fn insert(&mut self, label: &str, address: Address) -> &Address {
        self.map.entry(label.to_string()).or_insert(address)
    }

    /// Number of cached labels
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Forget every cached address
    pub fn clear(&mut self) {
        self.map.clear()
    }
}
