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

//! Rpc Node
//!
//! Backend that gets wallet data from a Bitcoin Core node through its JSON-RPC interface.
//!
//! ## Example
//!
//! ```no_run
//! # use corefund::node::rpc::{Auth, RpcConfig, RpcNode};
//! let config = RpcConfig {
//!     url: "127.0.0.1:18443".to_string(),
//!     auth: Auth::Cookie {
//!         file: "/home/user/.bitcoin/regtest/.cookie".into(),
//!     },
//!     network: bitcoin::Network::Regtest,
//!     wallet_name: "funder".to_string(),
//! };
//! let node = RpcNode::from_config(&config)?;
//! # Ok::<(), corefund::Error>(())
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use bitcoin::{Network, Txid};
use bitcoincore_rpc::jsonrpc;
use bitcoincore_rpc::{Auth as RpcAuth, Client, RpcApi};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{NewAddressOptions, NodeRpc, ProcessedPsbt};
use crate::error::Error;
use crate::types::UnspentEntry;

/// Error code returned by `getaddressesbylabel` for an unknown label
const RPC_WALLET_INVALID_LABEL_NAME: i32 = -11;

/// RpcNode configuration options
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcConfig {
    /// The bitcoin node url
    pub url: String,
    /// The bitcoin node authentication mechanism
    pub auth: Auth,
    /// The network we are using (it will be checked the bitcoin node network matches this)
    pub network: Network,
    /// The wallet name in the bitcoin node, the wallet must already exist
    pub wallet_name: String,
}

/// This struct is equivalent to [bitcoincore_rpc::Auth] but it implements [serde::Serialize]
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(untagged)]
pub enum Auth {
    /// None authentication
    None,
    /// Authentication with username and password, usually [Auth::Cookie] should be preferred
    UserPass {
        /// Username
        username: String,
        /// Password
        password: String,
    },
    /// Authentication with a cookie file
    Cookie {
        /// Cookie file
        file: PathBuf,
    },
}

impl From<Auth> for RpcAuth {
    fn from(auth: Auth) -> Self {
        match auth {
            Auth::None => RpcAuth::None,
            Auth::UserPass { username, password } => RpcAuth::UserPass(username, password),
            Auth::Cookie { file } => RpcAuth::CookieFile(file),
        }
    }
}

/// Node backend talking to a single wallet of a Bitcoin Core node
pub struct RpcNode {
    /// Rpc client to the node, includes the wallet name
    client: Client,
    /// Network of the node
    network: Network,
}

impl std::fmt::Debug for RpcNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcNode")
            .field("network", &self.network)
            .finish()
    }
}

impl RpcNode {
    /// Connect to the wallet `config.wallet_name`, loading it when needed and checking that the
    /// node runs on `config.network`
    pub fn from_config(config: &RpcConfig) -> Result<Self, Error> {
        let wallet_name = config.wallet_name.clone();
        let wallet_url = format!("{}/wallet/{}", config.url, &wallet_name);
        debug!("connecting to {} auth:{:?}", wallet_url, config.auth);

        let client = Client::new(wallet_url.as_str(), config.auth.clone().into())?;

        if client.list_wallets()?.contains(&wallet_name) {
            debug!("wallet already loaded {:?}", wallet_name);
        } else {
            client.load_wallet(&wallet_name)?;
            debug!("wallet loaded {:?}", wallet_name);
        }

        #[derive(Deserialize)]
        struct BlockchainInfo {
            chain: String,
        }

        let info: BlockchainInfo = client.call("getblockchaininfo", &[])?;
        let network = match info.chain.as_str() {
            "main" => Network::Bitcoin,
            "test" => Network::Testnet,
            "regtest" => Network::Regtest,
            "signet" => Network::Signet,
            other => return Err(Error::Generic(format!("Invalid network: {}", other))),
        };
        if network != config.network {
            return Err(Error::InvalidNetwork {
                requested: config.network,
                found: network,
            });
        }

        Ok(RpcNode { client, network })
    }

    /// Network of the node
    pub fn network(&self) -> Network {
        self.network
    }
}

impl NodeRpc for RpcNode {
    fn list_unspent(&self) -> Result<Vec<UnspentEntry>, Error> {
        Ok(self.client.call("listunspent", &[])?)
    }

    fn list_descriptors(&self, private: bool) -> Result<Vec<String>, Error> {
        #[derive(Deserialize)]
        struct Entry {
            desc: String,
        }
        #[derive(Deserialize)]
        struct CallResult {
            descriptors: Vec<Entry>,
        }

        let result: CallResult = self.client.call("listdescriptors", &[json!(private)])?;
        Ok(result.descriptors.into_iter().map(|d| d.desc).collect())
    }

    fn new_address(&self, options: &NewAddressOptions) -> Result<String, Error> {
        let mut args = vec![json!(options.label.as_deref().unwrap_or(""))];
        if let Some(address_type) = options.address_type {
            args.push(json!(address_type.as_str()));
        }

        Ok(self.client.call("getnewaddress", &args)?)
    }

    fn addresses_by_label(&self, label: &str) -> Result<Vec<String>, Error> {
        let result: Result<HashMap<String, Value>, _> =
            self.client.call("getaddressesbylabel", &[json!(label)]);

        match result {
            Ok(addresses) => Ok(addresses.into_keys().collect()),
            Err(bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(ref e)))
                if e.code == RPC_WALLET_INVALID_LABEL_NAME =>
            {
                Ok(vec![])
            }
            Err(e) => Err(e.into()),
        }
    }

    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, Error> {
        Ok(self.client.call("sendrawtransaction", &[json!(raw_tx_hex)])?)
    }

    fn process_psbt(&self, psbt_base64: &str) -> Result<ProcessedPsbt, Error> {
        Ok(self.client.call("walletprocesspsbt", &[json!(psbt_base64)])?)
    }

    fn get_balance(&self) -> Result<f64, Error> {
        Ok(self.client.call("getbalance", &[])?)
    }

    fn send_to_address(&self, address: &str, amount: f64) -> Result<Txid, Error> {
        Ok(self
            .client
            .call("sendtoaddress", &[json!(address), json!(amount)])?)
    }
}
