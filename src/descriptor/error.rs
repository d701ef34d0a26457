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

//! Descriptor errors

use core::fmt;

/// Errors related to the parsing of descriptors
#[derive(Debug)]
pub enum Error {
    /// The string doesn't follow the `<keytype>([<label><path>]<key><path>)#<checksum>` shape
    InvalidFormat(String),
    /// A derivation path segment is not a (possibly hardened) non-negative integer
    InvalidPathSegment(String),
    /// The full derivation path has less than 4 segments
    PathTooShort(usize),
    /// The bracketed parent label is not a 4-byte hex fingerprint
    InvalidParentLabel(String),
    /// The provided descriptor doesn't match its checksum
    InvalidDescriptorChecksum,
    /// The key string is neither an extended key nor a hex encoded public key
    InvalidKey(String),
    /// The descriptor ends with a wildcard, a child index is needed to get a single key
    RangedDescriptor,

    /// BIP32 error
    Bip32(bitcoin::bip32::Error),
    /// Hex decoding error
    Hex(bitcoin::hex::HexToBytesError),
    /// A secp256k1 error
    Secp256k1(bitcoin::secp256k1::Error),
    /// Miniscript error, raised by the checksum engine
    Miniscript(miniscript::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(desc) => write!(f, "Unable to parse descriptor: {}", desc),
            Self::InvalidPathSegment(segment) => {
                write!(f, "Invalid descriptor path segment: {}", segment)
            }
            Self::PathTooShort(len) => write!(
                f,
                "Full path is invalid: {} segments found, at least 4 are required",
                len
            ),
            Self::InvalidParentLabel(label) => write!(f, "Invalid parent label: {}", label),
            Self::InvalidDescriptorChecksum => write!(f, "Descriptor checksum mismatch"),
            Self::InvalidKey(key) => write!(f, "Invalid key: {}", key),
            Self::RangedDescriptor => write!(f, "Ranged descriptor, a child index is required"),
            Self::Bip32(err) => write!(f, "BIP32 error: {}", err),
            Self::Hex(err) => write!(f, "Hex decoding error: {}", err),
            Self::Secp256k1(err) => write!(f, "Secp256k1 error: {}", err),
            Self::Miniscript(err) => write!(f, "Miniscript error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl_error!(bitcoin::bip32::Error, Bip32);
impl_error!(bitcoin::hex::HexToBytesError, Hex);
impl_error!(bitcoin::secp256k1::Error, Secp256k1);
impl_error!(miniscript::Error, Miniscript);
