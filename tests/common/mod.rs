#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use bitcoin::{Amount, ScriptBuf};

use dcrms::address::{Address, AddressKind};
use dcrms::error::{AppError, AppResult};
use dcrms::explorer::{AddressInfo, ChainData};
use dcrms::types::{Network, TxHash, TxTree, UnspentOutput};
use dcrms::wallet::{
    CreateMultiSigResult, GetBalanceResult, MultisigOutInfo, SignRawTransactionResult,
    ValidateAddressResult, WalletSigner,
};
use dcrms::wire::{MsgTx, OutPoint, TxIn, TxOut, encode_tx_hex};

pub const NET: Network = Network::Testnet3;
pub const COIN: u64 = 100_000_000;

/// 2-of-3 の redeem script (OP_2 <33>*3 OP_3 OP_CHECKMULTISIG)
pub fn redeem_script_2_of_3() -> Vec<u8> {
    let mut s = vec![0x52];
    for b in [2u8, 3, 2] {
        s.push(33);
        s.push(b);
        s.extend_from_slice(&[b; 32]);
    }
    s.extend_from_slice(&[0x53, 0xae]);
    s
}

pub fn compressed_pubkey(prefix: u8) -> String {
    let mut key = vec![prefix];
    key.extend_from_slice(&[prefix; 32]);
    hex::encode(key)
}

pub fn multisig_address() -> String {
    Address::from_hash(NET, AddressKind::ScriptHash, [0x11; 20]).to_string()
}

pub fn payee_address() -> String {
    Address::from_hash(NET, AddressKind::PubKeyHash, [0x22; 20]).to_string()
}

pub fn utxo(seed: u8, vout: u32, atoms: u64, confirmations: i64) -> UnspentOutput {
    UnspentOutput {
        txid: TxHash([seed; 32]),
        vout,
        amount: Amount::from_sat(atoms),
        confirmations,
        script_pub_key: Address::from_hash(NET, AddressKind::ScriptHash, [0x11; 20])
            .script_pubkey()
            .to_bytes(),
    }
}

/// `vout` 番目に `atoms` を持つ親トランザクション。`stake` なら先頭出力を OP_SSTX でタグ付けする。
pub fn parent_tx(vout: u32, atoms: u64, stake: bool) -> MsgTx {
    let mut tx = MsgTx::new();
    tx.add_tx_in(TxIn::new(
        OutPoint {
            hash: TxHash([0xee; 32]),
            index: 0,
            tree: TxTree::Regular,
        },
        atoms as i64,
        ScriptBuf::new(),
    ));
    for i in 0..=vout {
        let mut script = Address::from_hash(NET, AddressKind::ScriptHash, [0x11; 20])
            .script_pubkey()
            .to_bytes();
        if stake && i == 0 {
            script.insert(0, 0xba);
        }
        let value = if i == vout { atoms as i64 } else { 1 };
        tx.add_tx_out(TxOut::new(value, ScriptBuf::from_bytes(script)));
    }
    tx
}

#[derive(Default)]
pub struct FakeChain {
    pub balance: f64,
    pub utxos: Vec<UnspentOutput>,
    pub raw_txs: HashMap<TxHash, String>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeChain {
    pub fn with_utxos(utxos: Vec<UnspentOutput>) -> Self {
        let raw_txs = utxos
            .iter()
            .map(|u| (u.txid, encode_tx_hex(&parent_tx(u.vout, u.amount.to_sat(), false))))
            .collect();
        FakeChain {
            utxos,
            raw_txs,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ChainData for FakeChain {
    fn address_info(&self, address: &str) -> AppResult<AddressInfo> {
        self.calls.borrow_mut().push(format!("address_info {}", address));
        Ok(AddressInfo {
            addr_str: address.to_string(),
            balance: self.balance,
            balance_sat: 0,
            unconfirmed_balance: 0.0,
        })
    }

    fn address_utxos(&self, address: &str) -> AppResult<Vec<UnspentOutput>> {
        self.calls.borrow_mut().push(format!("address_utxos {}", address));
        Ok(self.utxos.clone())
    }

    fn raw_transaction_hex(&self, txid: &TxHash) -> AppResult<String> {
        self.calls.borrow_mut().push(format!("raw_transaction_hex {}", txid));
        self.raw_txs
            .get(txid)
            .cloned()
            .ok_or_else(|| AppError::Network(format!("404 Not Found: {}", txid)))
    }
}

pub struct FakeWallet {
    pub spendable: f64,
    pub multisig_info: AppResult<MultisigOutInfo>,
    pub sign_result: SignRawTransactionResult,
    pub calls: RefCell<Vec<String>>,
}

impl Default for FakeWallet {
    fn default() -> Self {
        FakeWallet {
            spendable: 100.0,
            multisig_info: Ok(MultisigOutInfo {
                address: multisig_address(),
                redeem_script: hex::encode(redeem_script_2_of_3()),
                m: 2,
                n: 3,
                pubkeys: vec![compressed_pubkey(2), compressed_pubkey(3), "zz".to_string()],
                ..Default::default()
            }),
            sign_result: SignRawTransactionResult::default(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl FakeWallet {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl WalletSigner for FakeWallet {
    fn balance(&self) -> AppResult<GetBalanceResult> {
        self.record("getbalance");
        Ok(GetBalanceResult {
            total_spendable: self.spendable,
            ..Default::default()
        })
    }

    fn new_address(&self, account: &str, gap_policy: &str) -> AppResult<String> {
        self.record(format!("getnewaddress {} {}", account, gap_policy));
        Ok(payee_address())
    }

    fn validate_address(&self, address: &str) -> AppResult<ValidateAddressResult> {
        self.record(format!("validateaddress {}", address));
        Ok(ValidateAddressResult {
            is_valid: true,
            address: address.to_string(),
            is_mine: true,
            pub_key_addr: "TkQ-fake".to_string(),
        })
    }

    fn create_multisig(&self, required: u32, keys: &[String]) -> AppResult<CreateMultiSigResult> {
        self.record(format!("createmultisig {} {}", required, keys.join(",")));
        Ok(CreateMultiSigResult {
            address: multisig_address(),
            redeem_script: hex::encode(redeem_script_2_of_3()),
        })
    }

    fn send_to_address(&self, address: &str, amount: Amount) -> AppResult<String> {
        self.record(format!("sendtoaddress {} {}", address, amount.to_sat()));
        Ok("ab".repeat(32))
    }

    fn multisig_out_info(&self, txid: &TxHash, vout: u32) -> AppResult<MultisigOutInfo> {
        self.record(format!("getmultisigoutinfo {} {}", txid, vout));
        match &self.multisig_info {
            Ok(info) => Ok(info.clone()),
            Err(AppError::Rpc { method, code, message }) => Err(AppError::Rpc {
                method: method.clone(),
                code: *code,
                message: message.clone(),
            }),
            Err(e) => Err(AppError::Network(e.to_string())),
        }
    }

    fn sign_raw_transaction(&self, tx_hex: &str) -> AppResult<SignRawTransactionResult> {
        self.record(format!("signrawtransaction {}", tx_hex));
        Ok(self.sign_result.clone())
    }

    fn send_raw_transaction(&self, tx_hex: &str) -> AppResult<String> {
        self.record(format!("sendrawtransaction {}", tx_hex));
        Ok("cd".repeat(32))
    }

    fn import_script(&self, script_hex: &str, rescan: bool) -> AppResult<()> {
        self.record(format!("importscript {} {}", script_hex, rescan));
        Ok(())
    }
}
