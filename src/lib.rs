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

// only enables the `doc_cfg` feature when
// the `docsrs` configuration attribute is defined
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A descriptor-driven funding wallet for Bitcoin Core nodes.
//!
//! `corefund` sits next to the wallet of a Bitcoin Core node. It reads the node's descriptors
//! and coins, selects coins without ever leaving dust change, re-derives the signing keys from
//! the node's extended private keys, and produces either fully signed transactions or PSBTs
//! enriched with the derivation data the node needs to sign them.
//!
//! ## Parsing a descriptor
//!
//! ```
//! use corefund::bitcoin::bip32::ChildNumber;
//! use corefund::descriptor::{Descriptor, KeyType};
//!
//! let desc: Descriptor = "wpkh([d34db33f/84'/1'/0'/0/7]0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798)#4mczxq3c"
//!     .parse()?;
//! assert_eq!(desc.keytype, KeyType::Wpkh);
//! assert_eq!(desc.purpose(), ChildNumber::from_hardened_idx(84)?);
//! assert_eq!(desc.index(), ChildNumber::from_normal_idx(7)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Funding a transaction
//!
//! ```no_run
//! # use corefund::bitcoin::{Amount, Network};
//! # use corefund::node::NodeRpc;
//! # use corefund::wallet::coin_selection::DefaultCoinSelectionAlgorithm;
//! # use corefund::wallet::params::{FundOptions, WalletConfig};
//! # use corefund::CoreWallet;
//! # fn fund<N: NodeRpc>(node: N) -> Result<(), corefund::Error> {
//! let wallet = CoreWallet::new(node, WalletConfig::new(Network::Regtest));
//! let payment = wallet.create_txout(Amount::from_sat(100_000), None)?;
//! let tx = wallet.fund_tx(
//!     &[payment],
//!     &FundOptions::default(),
//!     &DefaultCoinSelectionAlgorithm::default(),
//!     &mut rand::thread_rng(),
//! )?;
//! wallet.broadcast(&tx)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! * `rpc`: enables [`node::rpc::RpcNode`], a node backend built on `bitcoincore-rpc`

pub extern crate bitcoin;
pub extern crate miniscript;

#[cfg(feature = "rpc")]
pub extern crate bitcoincore_rpc;

#[macro_use]
pub(crate) mod error;
pub mod descriptor;
pub mod keys;
pub mod node;
pub mod psbt;
pub(crate) mod types;
pub mod wallet;

pub use descriptor::Descriptor;
pub use error::Error;
pub use types::*;
pub use wallet::CoreWallet;
