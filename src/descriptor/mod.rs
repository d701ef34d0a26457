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

//! Descriptors
//!
//! This module parses the single-key output descriptors a Bitcoin Core wallet reports through
//! `listdescriptors` and `listunspent` into a [`Descriptor`] record: script type, key material,
//! parent fingerprint and derivation path.
//!
//! The accepted shape is `<keytype>([<label><path>]<key><path>)#<checksum>`, for example:
//!
//! ```
//! # use std::str::FromStr;
//! # use corefund::descriptor::{Descriptor, KeyType};
//! let desc = Descriptor::from_str("wpkh([8f6cb80c/44'/0'/0']xpub6DWYS8bbihFevy29M4cbw4ZR3P5E12jB8R88gBDWCTCNpYiDHhYWNywrCF9VZQYagzPmsZpxXpytzSoxynyeFr4ZyzheVjnpLKuse4fiwZw/0/*)#h0j0tg5m")?;
//!
//! assert_eq!(desc.keytype, KeyType::Wpkh);
//! assert_eq!(desc.fullpath, "/44'/0'/0'/0/*");
//! assert!(!desc.is_parent());
//! # Ok::<_, corefund::descriptor::DescriptorError>(())
//! ```

use core::fmt;
use core::str::FromStr;

use bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, KeySource, Xpriv, Xpub};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::hex::FromHex;
use bitcoin::secp256k1::{PublicKey, Secp256k1, XOnlyPublicKey};

pub use miniscript::descriptor::{SinglePubKey, Wildcard};

pub mod checksum;
pub mod error;

pub use self::checksum::{calc_checksum, verify_checksum};
pub use self::error::Error as DescriptorError;
use crate::wallet::utils::SecpCtx;

/// Minimum number of numeric segments in the full derivation path of a descriptor
pub const MIN_PATH_SEGMENTS: usize = 4;

/// Script type of a descriptor, taken from its outer function(s)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// `pkh(...)`
    Pkh,
    /// `wpkh(...)`
    Wpkh,
    /// `sh(wpkh(...))`
    ShWpkh,
    /// `tr(...)`
    Tr,
    /// Any other function, stored with nested calls joined by `-`
    Other(String),
}

impl KeyType {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "pkh" => KeyType::Pkh,
            "wpkh" => KeyType::Wpkh,
            "sh(wpkh" => KeyType::ShWpkh,
            "tr" => KeyType::Tr,
            other => KeyType::Other(other.replace('(', "-")),
        }
    }

    /// Tag of the script type, nested functions are joined with `-` (`sh-wpkh`)
    pub fn as_str(&self) -> &str {
        match self {
            KeyType::Pkh => "pkh",
            KeyType::Wpkh => "wpkh",
            KeyType::ShWpkh => "sh-wpkh",
            KeyType::Tr => "tr",
            KeyType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key embedded in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKeyMaterial {
    /// Extended private key (`xprv`/`tprv`)
    XPrv(Xpriv),
    /// Extended public key (`xpub`/`tpub`)
    XPub(Xpub),
    /// Hex encoded ECDSA public key
    Single(PublicKey),
    /// Hex encoded x-only public key, as found in `tr()` descriptors
    XOnly(XOnlyPublicKey),
}

impl DescriptorKeyMaterial {
    fn parse(secp: &SecpCtx, keystr: &str) -> Result<(Self, Fingerprint), DescriptorError> {
        if is_private_xkey(keystr) {
            let xprv = Xpriv::from_str(keystr)?;
            return Ok((DescriptorKeyMaterial::XPrv(xprv), xprv.fingerprint(secp)));
        }
        if is_public_xkey(keystr) {
            let xpub = Xpub::from_str(keystr)?;
            return Ok((DescriptorKeyMaterial::XPub(xpub), xpub.fingerprint()));
        }

        let bytes = Vec::<u8>::from_hex(keystr)?;
        let key = match bytes.len() {
            32 => DescriptorKeyMaterial::XOnly(XOnlyPublicKey::from_slice(&bytes)?),
            33 | 65 => DescriptorKeyMaterial::Single(PublicKey::from_slice(&bytes)?),
            _ => return Err(DescriptorError::InvalidKey(keystr.to_string())),
        };

        Ok((key, label_of(&bytes)))
    }
}

fn is_private_xkey(keystr: &str) -> bool {
    keystr.starts_with("xprv") || keystr.starts_with("tprv")
}

fn is_public_xkey(keystr: &str) -> bool {
    keystr.starts_with("xpub") || keystr.starts_with("tpub")
}

/// First four bytes of the HASH160 of `data`
fn label_of(data: &[u8]) -> Fingerprint {
    let hash = hash160::Hash::hash(data);
    let mut label = [0u8; 4];
    label.copy_from_slice(&hash[..4]);
    Fingerprint::from(label)
}

/// A parsed single-key descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// The original descriptor string
    pub descriptor: String,
    /// Script type
    pub keytype: KeyType,
    /// The key as it appears in the descriptor
    pub keystr: String,
    /// Decoded key
    pub key: DescriptorKeyMaterial,
    /// Fingerprint found in the bracketed key origin, if any
    pub parent_label: Option<Fingerprint>,
    /// The descriptor's own path, after the key
    pub relpath: String,
    /// Origin path followed by the descriptor's own path
    pub fullpath: String,
    /// Numeric segments of `fullpath`, without the trailing wildcard
    pub path: Vec<ChildNumber>,
    /// Trailing wildcard of the path
    pub wildcard: Wildcard,
    /// Checksum following the `#`
    pub checksum: String,
    /// Short identifier of the key material, see [`Descriptor::label`]
    pub label: Fingerprint,
    origin_len: usize,
}

impl Descriptor {
    /// Parse a descriptor string
    ///
    /// The checksum is verified, the full path must hold at least [`MIN_PATH_SEGMENTS`] numeric
    /// segments and `h` hardening markers are normalized to `'`.
    pub fn parse(secp: &SecpCtx, desc: &str) -> Result<Self, DescriptorError> {
        let invalid = || DescriptorError::InvalidFormat(desc.to_string());

        let (body, checksum) = desc.rsplit_once('#').ok_or_else(invalid)?;
        if checksum.is_empty() || !checksum.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        verify_checksum(body, checksum)?;

        // The key type is everything up to the last `(` of the leading run of word characters
        // and parentheses, so `sh(wpkh(` yields `sh(wpkh`.
        let prefix_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '('))
            .unwrap_or(body.len());
        let open = body[..prefix_len].rfind('(').ok_or_else(invalid)?;
        let tag = &body[..open];
        if tag.is_empty() {
            return Err(invalid());
        }

        let depth = tag.matches('(').count() + 1;
        let inner = (0..depth)
            .try_fold(&body[open + 1..], |s, _| s.strip_suffix(')'))
            .ok_or_else(invalid)?;
        if inner.contains(|c| matches!(c, '(' | ')' | ',')) {
            return Err(invalid());
        }

        let (origin, key_and_path) = match inner.strip_prefix('[') {
            Some(rest) => {
                let (origin, rest) = rest.split_once(']').ok_or_else(invalid)?;
                (Some(origin), rest)
            }
            None => (None, inner),
        };

        let (parent_label, parent_path) = match origin {
            Some(origin) => {
                let (label, path) = match origin.find('/') {
                    Some(pos) => origin.split_at(pos),
                    None => (origin, ""),
                };
                let label = parse_label(label)?;
                (Some(label), normalize_hardening(path))
            }
            None => (None, String::new()),
        };

        let key_len = key_and_path
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(key_and_path.len());
        let (keystr, own_path) = key_and_path.split_at(key_len);
        if keystr.is_empty() || !(own_path.is_empty() || own_path.starts_with('/')) {
            return Err(invalid());
        }

        let origin_len = parse_origin_path(&parent_path)?.len();
        let relpath = normalize_hardening(own_path);
        let fullpath = format!("{}{}", parent_path, relpath);
        let (path, wildcard) = parse_path(&fullpath)?;

        let (key, label) = DescriptorKeyMaterial::parse(secp, keystr)?;

        Ok(Descriptor {
            descriptor: desc.to_string(),
            keytype: KeyType::from_tag(tag),
            keystr: keystr.to_string(),
            key,
            parent_label,
            relpath,
            fullpath,
            path,
            wildcard,
            checksum: checksum.to_string(),
            label,
            origin_len,
        })
    }

    /// Whether the key is an extended key (carrying a chain code)
    pub fn is_extended(&self) -> bool {
        matches!(
            self.key,
            DescriptorKeyMaterial::XPrv(_) | DescriptorKeyMaterial::XPub(_)
        )
    }

    /// Whether the key is an extended private key
    pub fn is_private(&self) -> bool {
        is_private_xkey(&self.keystr)
    }

    /// Whether the descriptor has no bracketed key origin, i.e. it is the root itself
    pub fn is_parent(&self) -> bool {
        self.parent_label.is_none()
    }

    /// Fingerprint of the key `fullpath` is relative to: the parent label or, for a root, its
    /// own label
    pub fn origin_fingerprint(&self) -> Fingerprint {
        self.parent_label.unwrap_or(self.label)
    }

    /// `fullpath` as a BIP32 derivation path, without the wildcard
    pub fn derivation_path(&self) -> DerivationPath {
        DerivationPath::from(self.path.clone())
    }

    /// Segments taken from the bracketed key origin
    pub fn origin_path(&self) -> &[ChildNumber] {
        &self.path[..self.origin_len]
    }

    /// Key origin suitable for PSBT derivation maps
    pub fn key_source(&self) -> KeySource {
        (self.origin_fingerprint(), self.derivation_path())
    }

    /// BIP44 purpose
    pub fn purpose(&self) -> ChildNumber {
        self.path[0]
    }

    /// BIP44 coin type, which also encodes the network
    pub fn coin_type(&self) -> ChildNumber {
        self.path[1]
    }

    /// BIP44 account
    pub fn account(&self) -> ChildNumber {
        self.path[2]
    }

    /// BIP44 change branch
    pub fn change(&self) -> ChildNumber {
        self.path[3]
    }

    /// BIP44 address index, `0` when the descriptor is ranged or stops at the change branch
    pub fn index(&self) -> ChildNumber {
        self.path
            .get(4)
            .copied()
            .unwrap_or(ChildNumber::Normal { index: 0 })
    }

    /// The single public key this descriptor resolves to
    ///
    /// Extended keys are walked down the descriptor's own path, which fails for ranged
    /// descriptors and for hardened steps below an `xpub`.
    pub fn public_key(&self, secp: &SecpCtx) -> Result<SinglePubKey, DescriptorError> {
        let relative = || DerivationPath::from(self.path[self.origin_len..].to_vec());

        match &self.key {
            DescriptorKeyMaterial::Single(pk) => {
                Ok(SinglePubKey::FullKey(bitcoin::PublicKey::new(*pk)))
            }
            DescriptorKeyMaterial::XOnly(pk) => Ok(SinglePubKey::XOnly(*pk)),
            _ if self.wildcard != Wildcard::None => Err(DescriptorError::RangedDescriptor),
            DescriptorKeyMaterial::XPub(xpub) => {
                let derived = xpub.derive_pub(secp, &relative())?;
                Ok(SinglePubKey::FullKey(bitcoin::PublicKey::new(
                    derived.public_key,
                )))
            }
            DescriptorKeyMaterial::XPrv(xprv) => {
                let derived = xprv.derive_priv(secp, &relative())?;
                Ok(SinglePubKey::FullKey(bitcoin::PublicKey::new(
                    derived.private_key.public_key(secp),
                )))
            }
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

impl FromStr for Descriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Descriptor::parse(&Secp256k1::new(), s)
    }
}

fn parse_label(label: &str) -> Result<Fingerprint, DescriptorError> {
    if label.len() != 8 {
        return Err(DescriptorError::InvalidParentLabel(label.to_string()));
    }
    Fingerprint::from_str(label).map_err(|_| DescriptorError::InvalidParentLabel(label.to_string()))
}

fn normalize_hardening(path: &str) -> String {
    path.replace('h', "'")
}

/// Key origins are fixed paths, a wildcard there is an invalid segment
fn parse_origin_path(path: &str) -> Result<Vec<ChildNumber>, DescriptorError> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(parse_segment)
        .collect()
}

/// Parse a single derivation path segment, `'` or `h` marking a hardened step
pub fn parse_segment(segment: &str) -> Result<ChildNumber, DescriptorError> {
    let invalid = || DescriptorError::InvalidPathSegment(segment.to_string());

    let (index, hardened) = match segment
        .strip_suffix('\'')
        .or_else(|| segment.strip_suffix('h'))
    {
        Some(index) => (index, true),
        None => (segment, false),
    };
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let index: u32 = index.parse().map_err(|_| invalid())?;
    let child = if hardened {
        ChildNumber::from_hardened_idx(index)
    } else {
        ChildNumber::from_normal_idx(index)
    };

    child.map_err(|_| invalid())
}

fn parse_path(fullpath: &str) -> Result<(Vec<ChildNumber>, Wildcard), DescriptorError> {
    let mut segments: Vec<&str> = fullpath.split('/').collect();
    if matches!(segments.first(), Some(&"") | Some(&"m")) {
        segments.remove(0);
    }

    let mut wildcard = Wildcard::None;
    if let Some(last) = segments.last() {
        wildcard = match *last {
            "*" => Wildcard::Unhardened,
            "*'" => Wildcard::Hardened,
            _ => Wildcard::None,
        };
        if wildcard != Wildcard::None {
            segments.pop();
        }
    }

    let path = segments
        .into_iter()
        .map(parse_segment)
        .collect::<Result<Vec<_>, _>>()?;
    if path.len() < MIN_PATH_SEGMENTS {
        return Err(DescriptorError::PathTooShort(path.len()));
    }

    Ok((path, wildcard))
}
