//! ブロックエクスプローラ (dcrdata / Insight API) への読み取り専用クエリ

use bitcoin::Amount;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::types::{NetParams, TxHash, UnspentOutput};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// データサービスに対する問い合わせ。テストではフェイク実装に差し替える。
pub trait ChainData {
    fn address_info(&self, address: &str) -> AppResult<AddressInfo>;
    fn address_utxos(&self, address: &str) -> AppResult<Vec<UnspentOutput>>;
    /// 生トランザクションの16進数表現
    fn raw_transaction_hex(&self, txid: &TxHash) -> AppResult<String>;
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub addr_str: String,
    pub balance: f64,
    #[serde(default)]
    pub balance_sat: i64,
    #[serde(default)]
    pub unconfirmed_balance: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InsightUtxo {
    #[serde(default)]
    pub address: String,
    pub txid: String,
    pub vout: u32,
    pub script_pub_key: String,
    #[serde(default)]
    pub amount: f64,
    pub satoshis: i64,
    #[serde(default)]
    pub confirmations: i64,
}

impl TryFrom<InsightUtxo> for UnspentOutput {
    type Error = AppError;

    fn try_from(u: InsightUtxo) -> Result<Self, Self::Error> {
        let txid: TxHash = u.txid.parse()?;
        let atoms = u64::try_from(u.satoshis)
            .map_err(|_| AppError::amount_conversion(u.satoshis, "UTXOの金額が負です"))?;
        let script_pub_key = hex::decode(&u.script_pub_key).map_err(|e| {
            AppError::ScriptDecode(format!("scriptPubKey ({}:{}): {}", u.txid, u.vout, e))
        })?;
        Ok(UnspentOutput {
            txid,
            vout: u.vout,
            amount: Amount::from_sat(atoms),
            confirmations: u.confirmations,
            script_pub_key,
        })
    }
}

pub fn parse_utxos(body: &str) -> AppResult<Vec<UnspentOutput>> {
    let raw: Vec<InsightUtxo> = serde_json::from_str(body).map_err(|e| AppError::json("utxo", e))?;
    raw.into_iter().map(UnspentOutput::try_from).collect()
}

pub struct ExplorerClient {
    http: reqwest::blocking::Client,
    insight_url: String,
    dcrdata_url: String,
}

impl ExplorerClient {
    pub fn new(params: &NetParams, timeout: Duration) -> AppResult<Self> {
        Self::with_urls(params.insight_url, params.dcrdata_url, timeout)
    }

    pub fn with_urls(insight_url: &str, dcrdata_url: &str, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(ExplorerClient {
            http,
            insight_url: insight_url.trim_end_matches('/').to_string(),
            dcrdata_url: dcrdata_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, url: &str) -> AppResult<String> {
        log::debug!("httpRequest: {}", url);
        let response = self.http.get(url).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(AppError::Network(format!("dcrdata error: {} {} {}", status, url, body)));
        }
        log::trace!("{}", body);
        Ok(body)
    }
}

impl ChainData for ExplorerClient {
    fn address_info(&self, address: &str) -> AppResult<AddressInfo> {
        let url = format!("{}/addr/{}", self.insight_url, address);
        let body = self.get(&url)?;
        serde_json::from_str(&body).map_err(|e| AppError::json(url, e))
    }

    fn address_utxos(&self, address: &str) -> AppResult<Vec<UnspentOutput>> {
        let url = format!("{}/addr/{}/utxo", self.insight_url, address);
        parse_utxos(&self.get(&url)?)
    }

    fn raw_transaction_hex(&self, txid: &TxHash) -> AppResult<String> {
        let url = format!("{}/tx/hex/{}", self.dcrdata_url, txid);
        let body = self.get(&url)?;
        Ok(body.trim().trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::serve_once;

    fn client(url: &str) -> ExplorerClient {
        ExplorerClient::with_urls(url, url, Duration::from_secs(5)).unwrap()
    }

    const UTXO_JSON: &str = r#"[
        {
            "address": "DcXTb4QtmnyRsjjYfeYbKgJjXHDL6DAHBmR",
            "txid": "9b2d5a5e4f07e4b2a8c0fb3e1a6e9a0c6a4b6f43d0b9f5dbd3c0f9a8e7d6c5b4",
            "vout": 1,
            "ts": 1600000000,
            "scriptPubKey": "a914f5a7fd7e3d2b1d1c0e5f4a3b2c1d0e9f8a7b6c5d87",
            "height": 500000,
            "amount": 10.0,
            "satoshis": 1000000000,
            "confirmations": 6
        }
    ]"#;

    #[test]
    fn parses_insight_utxo_list() {
        let utxos = parse_utxos(UTXO_JSON).unwrap();
        assert_eq!(utxos.len(), 1);
        let u = &utxos[0];
        assert_eq!(
            u.txid.to_string(),
            "9b2d5a5e4f07e4b2a8c0fb3e1a6e9a0c6a4b6f43d0b9f5dbd3c0f9a8e7d6c5b4"
        );
        assert_eq!(u.vout, 1);
        assert_eq!(u.amount, Amount::from_sat(1_000_000_000));
        assert_eq!(u.confirmations, 6);
        assert_eq!(u.script_pub_key.len(), 23);
    }

    #[test]
    fn empty_list_is_ok() {
        assert!(parse_utxos("[]").unwrap().is_empty());
    }

    #[test]
    fn bad_utxo_fields_are_rejected() {
        let bad_txid = UTXO_JSON.replace("9b2d5a5e", "zz2d5a5e");
        assert!(matches!(parse_utxos(&bad_txid), Err(AppError::MalformedHex(_))));

        let bad_script = UTXO_JSON.replace("a914f5a7", "a914f5aX");
        assert!(matches!(parse_utxos(&bad_script), Err(AppError::ScriptDecode(_))));

        let negative = UTXO_JSON.replace("1000000000", "-5");
        assert!(matches!(parse_utxos(&negative), Err(AppError::AmountConversion { .. })));

        assert!(matches!(parse_utxos("{"), Err(AppError::Json { .. })));
    }

    #[test]
    fn parses_address_info() {
        let info: AddressInfo = serde_json::from_str(
            r#"{"addrStr":"DsExample","balance":1.5,"balanceSat":150000000,"totalReceived":2}"#,
        )
        .unwrap();
        assert_eq!(info.balance, 1.5);
        assert_eq!(info.balance_sat, 150_000_000);
        assert_eq!(info.unconfirmed_balance, 0.0);
    }

    #[test]
    fn fetches_utxos_over_http() {
        let (url, server) = serve_once("200 OK", UTXO_JSON);
        let utxos = client(&url).address_utxos("DcXTb4QtmnyRsjjYfeYbKgJjXHDL6DAHBmR").unwrap();
        assert_eq!(utxos.len(), 1);
        let request = server.join().unwrap();
        assert!(request
            .starts_with("GET /addr/DcXTb4QtmnyRsjjYfeYbKgJjXHDL6DAHBmR/utxo HTTP/1.1\r\n"));
    }

    #[test]
    fn raw_transaction_hex_is_unquoted() {
        let (url, server) = serve_once("200 OK", "\"0100abcd\"\n");
        let txid = TxHash([0xab; 32]);
        assert_eq!(client(&url).raw_transaction_hex(&txid).unwrap(), "0100abcd");
        let request = server.join().unwrap();
        assert!(request.starts_with(&format!("GET /tx/hex/{} HTTP/1.1\r\n", txid)));
    }

    #[test]
    fn non_success_status_carries_status_url_and_body() {
        let (url, server) = serve_once("404 Not Found", "transaction not found");
        let txid = TxHash([0xab; 32]);
        let err = client(&url).raw_transaction_hex(&txid).unwrap_err();
        server.join().unwrap();
        match err {
            AppError::Network(msg) => {
                assert!(msg.contains("404 Not Found"), "{msg}");
                assert!(msg.contains(&format!("{}/tx/hex/{}", url, txid)), "{msg}");
                assert!(msg.contains("transaction not found"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
