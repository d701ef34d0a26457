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

use std::fmt;

use bitcoin::{Amount, Network};

use crate::wallet::coin_selection::InsufficientFunds;

/// Errors that can be thrown by the [`CoreWallet`](crate::wallet::CoreWallet)
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// Wallet's UTXO set is not enough to cover the requested amount plus fee
    InsufficientFunds {
        /// Amount needed
        needed: Amount,
        /// Amount available for spending
        available: Amount,
    },
    /// An address reported by the node belongs to another network
    InvalidNetwork {
        /// Network the wallet is configured for
        requested: Network,
        /// Network found
        found: Network,
    },

    /// Error related to the parsing of descriptors
    Descriptor(crate::descriptor::DescriptorError),
    /// Error while resolving a signing key
    Key(crate::keys::KeyError),
    /// Signing error
    Signer(crate::wallet::signer::SignerError),
    /// Address parsing error
    Address(bitcoin::address::ParseError),
    /// Partially signed bitcoin transaction error
    Psbt(bitcoin::psbt::Error),
    /// Partially signed bitcoin transaction parse error
    PsbtParse(bitcoin::psbt::PsbtParseError),
    #[cfg(feature = "rpc")]
    /// Rpc client error
    Rpc(bitcoincore_rpc::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::InsufficientFunds { needed, available } => write!(
                f,
                "Insufficient funds: {} available of {} needed",
                available, needed
            ),
            Self::InvalidNetwork { requested, found } => write!(
                f,
                "Invalid network: requested {} but found {}",
                requested, found
            ),
            Self::Descriptor(err) => write!(f, "Descriptor error: {}", err),
            Self::Key(err) => write!(f, "Key error: {}", err),
            Self::Signer(err) => write!(f, "Signer error: {}", err),
            Self::Address(err) => write!(f, "Address error: {}", err),
            Self::Psbt(err) => write!(f, "PSBT error: {}", err),
            Self::PsbtParse(err) => write!(f, "Impossible to parse PSBT: {}", err),
            #[cfg(feature = "rpc")]
            Self::Rpc(err) => write!(f, "RPC client error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(crate::descriptor::DescriptorError, Descriptor);
impl_error!(crate::keys::KeyError, Key);
impl_error!(crate::wallet::signer::SignerError, Signer);
impl_error!(bitcoin::address::ParseError, Address);
impl_error!(bitcoin::psbt::Error, Psbt);
impl_error!(bitcoin::psbt::PsbtParseError, PsbtParse);

#[cfg(feature = "rpc")]
impl_error!(bitcoincore_rpc::Error, Rpc);

impl From<InsufficientFunds> for Error {
    fn from(err: InsufficientFunds) -> Self {
        Error::InsufficientFunds {
            needed: err.needed,
            available: err.available,
        }
    }
}
