#![allow(unused)]
use std::cell::RefCell;
use std::collections::HashMap;
use std::str::FromStr;

use bitcoin::bip32::{DerivationPath, Fingerprint, Xpriv, Xpub};
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{Address, CompressedPublicKey, Network, ScriptBuf, Txid};
use corefund::descriptor::calc_checksum;
use corefund::node::{NewAddressOptions, NodeRpc, ProcessedPsbt};
use corefund::wallet::params::WalletConfig;
use corefund::wallet::utils::SecpCtx;
use corefund::{sat_to_btc, CoreWallet, Error, UnspentEntry};

pub const TEST_TPRV: &str = "tprv8ZgxMBicQKsPdZXrcHNLf5JAJWFAoJ2TrstMRdSKtEggz6PddbuSkvHKM9oKJyFgZV1B7rw8oChspxyYbtmEXYyg1AjfWbL3ho3XHDpHRZf";
pub const OTHER_TPRV: &str = "tprv8ZgxMBicQKsPdpkqS7Eair4YxjcuuvDPNYmKX3sCniCf16tHEVrjjiSXEkFRnUH77yXc6ZcwHHcLNfjdi5qUvw3VDfgYiH5mNsj5izuiu2N";

pub fn init_logger() {
    let _ = env_logger::try_init();
}

pub fn with_checksum(body: &str) -> String {
    format!("{}#{}", body, calc_checksum(body).unwrap())
}

pub fn derive(secp: &SecpCtx, tprv: &str, path: &str) -> (Fingerprint, SecretKey, PublicKey) {
    let xprv = Xpriv::from_str(tprv).unwrap();
    let derived = xprv
        .derive_priv(secp, &DerivationPath::from_str(&format!("m{}", path)).unwrap())
        .unwrap();
    let sk = derived.private_key;
    (xprv.fingerprint(secp), sk, sk.public_key(secp))
}

/// A coin of the node wallet, as reported by `listunspent`
#[derive(Debug, Clone)]
pub struct TestCoin {
    pub entry: UnspentEntry,
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

/// Build a coin worth `sats` locked to the key at `path` below `tprv`
///
/// `func` is the descriptor function wrapping the key: `wpkh`, `sh(wpkh`, `tr` or `pkh`.
pub fn coin(tprv: &str, func: &str, path: &str, sats: u64, vout: u32) -> TestCoin {
    let secp = Secp256k1::new();
    let (fingerprint, secret_key, public_key) = derive(&secp, tprv, path);
    let compressed = CompressedPublicKey(public_key);

    let (keystr, script_pubkey) = match func {
        "tr" => {
            let xonly = public_key.x_only_public_key().0;
            (xonly.to_string(), ScriptBuf::new_p2tr(&secp, xonly, None))
        }
        "sh(wpkh" => (
            public_key.to_string(),
            ScriptBuf::new_p2sh(
                &ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()).script_hash(),
            ),
        ),
        "pkh" => (
            public_key.to_string(),
            ScriptBuf::new_p2pkh(&bitcoin::PublicKey::new(public_key).pubkey_hash()),
        ),
        _ => (
            public_key.to_string(),
            ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash()),
        ),
    };

    let closing = ")".repeat(func.matches('(').count() + 1);
    let body = format!("{}([{}{}]{}{}", func, fingerprint, path, keystr, closing);

    TestCoin {
        entry: UnspentEntry {
            txid: Txid::from_str(&format!("{:064x}", vout as u64 + 1)).unwrap(),
            vout,
            desc: with_checksum(&body),
            amount: sat_to_btc(sats),
            script_pubkey,
            confirmations: Some(101),
        },
        secret_key,
        public_key,
    }
}

/// In-memory stand-in for a Bitcoin Core wallet
#[derive(Debug)]
pub struct MockNode {
    pub network: Network,
    pub tprv: String,
    pub unspent: Vec<UnspentEntry>,
    pub balance: f64,
    pub labels: RefCell<HashMap<String, Vec<String>>>,
    pub issued: RefCell<u32>,
    pub broadcasts: RefCell<Vec<String>>,
    pub payments: RefCell<Vec<(String, f64)>>,
    pub processed: RefCell<Vec<String>>,
}

impl MockNode {
    pub fn new(coins: &[TestCoin]) -> Self {
        MockNode {
            network: Network::Regtest,
            tprv: TEST_TPRV.to_string(),
            unspent: coins.iter().map(|c| c.entry.clone()).collect(),
            balance: coins.iter().map(|c| c.entry.amount).sum(),
            labels: RefCell::new(HashMap::new()),
            issued: RefCell::new(0),
            broadcasts: RefCell::new(vec![]),
            payments: RefCell::new(vec![]),
            processed: RefCell::new(vec![]),
        }
    }

    /// Addresses handed out so far, in order
    pub fn issued_address(&self, index: u32) -> Address {
        let secp = Secp256k1::new();
        let (_, _, pk) = derive(&secp, &self.tprv, &format!("/84'/1'/0'/1/{}", index));
        Address::p2wpkh(&CompressedPublicKey(pk), self.network)
    }

    fn account_xpub(&self, purpose: u32) -> (Fingerprint, Xpub) {
        let secp = Secp256k1::new();
        let xprv = Xpriv::from_str(&self.tprv).unwrap();
        let path = DerivationPath::from_str(&format!("m/{}'/1'/0'", purpose)).unwrap();
        let account = xprv.derive_priv(&secp, &path).unwrap();
        (xprv.fingerprint(&secp), Xpub::from_priv(&secp, &account))
    }
}

impl NodeRpc for MockNode {
    fn list_unspent(&self) -> Result<Vec<UnspentEntry>, Error> {
        Ok(self.unspent.clone())
    }

    fn list_descriptors(&self, private: bool) -> Result<Vec<String>, Error> {
        let bodies = if private {
            vec![
                format!("pkh({}/44h/1h/0h/0/*)", self.tprv),
                format!("wpkh({}/84h/1h/0h/0/*)", self.tprv),
                format!("tr({}/86h/1h/0h/0/*)", self.tprv),
            ]
        } else {
            [(44, "pkh"), (84, "wpkh"), (86, "tr")]
                .iter()
                .map(|(purpose, func)| {
                    let (fingerprint, xpub) = self.account_xpub(*purpose);
                    format!("{}([{}/{}'/1'/0']{}/0/*)", func, fingerprint, purpose, xpub)
                })
                .collect()
        };

        let mut descriptors: Vec<String> = bodies.iter().map(|b| with_checksum(b)).collect();
        descriptors.push("raw(deadbeef)#00000000".to_string());
        Ok(descriptors)
    }

    fn new_address(&self, options: &NewAddressOptions) -> Result<String, Error> {
        let mut issued = self.issued.borrow_mut();
        let address = self.issued_address(*issued).to_string();
        *issued += 1;

        if let Some(label) = &options.label {
            self.labels
                .borrow_mut()
                .entry(label.clone())
                .or_default()
                .push(address.clone());
        }
        Ok(address)
    }

    fn addresses_by_label(&self, label: &str) -> Result<Vec<String>, Error> {
        Ok(self.labels.borrow().get(label).cloned().unwrap_or_default())
    }

    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid, Error> {
        self.broadcasts.borrow_mut().push(raw_tx_hex.to_string());
        Ok(Txid::from_str(&format!("{:064x}", 0xb0b)).unwrap())
    }

    fn process_psbt(&self, psbt_base64: &str) -> Result<ProcessedPsbt, Error> {
        self.processed.borrow_mut().push(psbt_base64.to_string());
        Ok(ProcessedPsbt {
            psbt: psbt_base64.to_string(),
            complete: false,
        })
    }

    fn get_balance(&self) -> Result<f64, Error> {
        Ok(self.balance)
    }

    fn send_to_address(&self, address: &str, amount: f64) -> Result<Txid, Error> {
        self.payments
            .borrow_mut()
            .push((address.to_string(), amount));
        Ok(Txid::from_str(&format!("{:064x}", 0xfa0ce7)).unwrap())
    }
}

pub fn get_wallet(coins: &[TestCoin]) -> CoreWallet<MockNode> {
    init_logger();
    CoreWallet::new(MockNode::new(coins), WalletConfig::default())
}

/// Address outside the wallet, used as payment destination
pub fn external_address() -> Address {
    let secp = Secp256k1::new();
    let (_, _, pk) = derive(&secp, OTHER_TPRV, "/84'/1'/0'/0/0");
    Address::p2wpkh(&CompressedPublicKey(pk), Network::Regtest)
}
