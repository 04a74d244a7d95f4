//! 署名サービス (dcrwallet) への JSON-RPC 呼び出し

use bitcoin::Amount;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cell::Cell;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::types::TxHash;

/// 秘密鍵を持つウォレットの機能。組み立てロジックはこのトレイト越しにしか署名側を触らない。
pub trait WalletSigner {
    fn balance(&self) -> AppResult<GetBalanceResult>;
    fn new_address(&self, account: &str, gap_policy: &str) -> AppResult<String>;
    fn validate_address(&self, address: &str) -> AppResult<ValidateAddressResult>;
    fn create_multisig(&self, required: u32, keys: &[String]) -> AppResult<CreateMultiSigResult>;
    fn send_to_address(&self, address: &str, amount: Amount) -> AppResult<String>;
    fn multisig_out_info(&self, txid: &TxHash, vout: u32) -> AppResult<MultisigOutInfo>;
    fn sign_raw_transaction(&self, tx_hex: &str) -> AppResult<SignRawTransactionResult>;
    fn send_raw_transaction(&self, tx_hex: &str) -> AppResult<String>;
    fn import_script(&self, script_hex: &str, rescan: bool) -> AppResult<()>;
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GetBalanceResult {
    #[serde(rename = "totalspendable")]
    pub total_spendable: f64,
    #[serde(rename = "totalunconfirmed")]
    pub total_unconfirmed: f64,
    #[serde(rename = "cumulativetotal")]
    pub cumulative_total: f64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ValidateAddressResult {
    #[serde(rename = "isvalid")]
    pub is_valid: bool,
    pub address: String,
    #[serde(rename = "ismine")]
    pub is_mine: bool,
    #[serde(rename = "pubkeyaddr")]
    pub pub_key_addr: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CreateMultiSigResult {
    pub address: String,
    #[serde(rename = "redeemScript")]
    pub redeem_script: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MultisigOutInfo {
    pub address: String,
    #[serde(rename = "redeemscript")]
    pub redeem_script: String,
    pub m: u32,
    pub n: u32,
    pub pubkeys: Vec<String>,
    #[serde(rename = "txhash")]
    pub tx_hash: String,
    pub spent: bool,
    pub amount: f64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SignRawTransactionError {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: u32,
    #[serde(default, rename = "scriptSig")]
    pub script_sig: String,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default)]
    pub error: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SignRawTransactionResult {
    pub hex: String,
    pub complete: bool,
    #[serde(default)]
    pub errors: Vec<SignRawTransactionError>,
}

#[derive(Serialize, Debug)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// JSON-RPC の応答本文を解釈する。ウォレット側のエラーオブジェクトは `AppError::Rpc` になる。
pub(crate) fn decode_response<T: DeserializeOwned>(
    method: &str,
    http_ok: bool,
    body: &str,
) -> AppResult<T> {
    let response: RpcResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(_) if !http_ok => {
            return Err(AppError::Network(format!("wallet error: {} {}", method, body.trim())));
        }
        Err(e) => return Err(AppError::json(method, e)),
    };
    if let Some(err) = response.error {
        return Err(AppError::Rpc {
            method: method.to_string(),
            code: err.code,
            message: err.message,
        });
    }
    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .map_err(|e| AppError::json(method, e))
}

pub struct WalletRpcClient {
    url: String,
    user: String,
    pass: String,
    ca_pem: Vec<u8>,
    timeout: Duration,
    next_id: Cell<u64>,
}

impl WalletRpcClient {
    pub fn new(
        url: String,
        user: String,
        pass: String,
        ca_pem: Vec<u8>,
        timeout: Duration,
    ) -> Self {
        WalletRpcClient {
            url,
            user,
            pass,
            ca_pem,
            timeout,
            next_id: Cell::new(1),
        }
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> AppResult<T> {
        // 呼び出しごとに新しい接続を張る (接続は使い回さない)
        let mut builder = reqwest::blocking::Client::builder().timeout(self.timeout);
        if !self.ca_pem.is_empty() {
            let cert = reqwest::Certificate::from_pem(&self.ca_pem).map_err(|e| {
                AppError::Config(format!("ウォレット証明書を読み込めません: {}", e))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder.build()?;

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let request = RpcRequest {
            jsonrpc: "1.0",
            id,
            method,
            params,
        };
        log::debug!("walletCall: {} (id {})", method, id);

        let response = http
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(&request)
            .send()?;
        let http_ok = response.status().is_success();
        let body = response.text()?;
        log::trace!("{}: {}", method, body);
        decode_response(method, http_ok, &body)
    }
}

impl WalletSigner for WalletRpcClient {
    fn balance(&self) -> AppResult<GetBalanceResult> {
        self.call("getbalance", vec![])
    }

    fn new_address(&self, account: &str, gap_policy: &str) -> AppResult<String> {
        self.call("getnewaddress", vec![json!(account), json!(gap_policy)])
    }

    fn validate_address(&self, address: &str) -> AppResult<ValidateAddressResult> {
        self.call("validateaddress", vec![json!(address)])
    }

    fn create_multisig(&self, required: u32, keys: &[String]) -> AppResult<CreateMultiSigResult> {
        self.call("createmultisig", vec![json!(required), json!(keys)])
    }

    fn send_to_address(&self, address: &str, amount: Amount) -> AppResult<String> {
        self.call("sendtoaddress", vec![json!(address), json!(amount.to_btc())])
    }

    fn multisig_out_info(&self, txid: &TxHash, vout: u32) -> AppResult<MultisigOutInfo> {
        self.call("getmultisigoutinfo", vec![json!(txid.to_string()), json!(vout)])
    }

    fn sign_raw_transaction(&self, tx_hex: &str) -> AppResult<SignRawTransactionResult> {
        self.call("signrawtransaction", vec![json!(tx_hex)])
    }

    fn send_raw_transaction(&self, tx_hex: &str) -> AppResult<String> {
        self.call("sendrawtransaction", vec![json!(tx_hex)])
    }

    fn import_script(&self, script_hex: &str, rescan: bool) -> AppResult<()> {
        self.call("importscript", vec![json!(script_hex), json!(rescan)])
    }
}
