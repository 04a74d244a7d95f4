use bitcoin::Amount;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::TxHash;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("引数エラー: {0}")]
    Argument(String),

    #[error("無効なアクション: {0}")]
    InvalidAction(String),

    #[error("無効なアドレス ({address}): {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("金額変換エラー ({input}): {reason}")]
    AmountConversion { input: String, reason: String },

    #[error("16進数文字列が不正です: {0}")]
    MalformedHex(#[from] hex::FromHexError),

    #[error("トランザクションの構造が不正です: {0}")]
    MalformedTransaction(String),

    #[error("スクリプトのデコードに失敗: {0}")]
    ScriptDecode(String),

    #[error("ネットワークエラー: {0}")]
    Network(String),

    #[error("ウォレットRPCエラー ({method}, code {code}): {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("JSONパースエラー ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("設定ファイルのパースに失敗 ファイル: {file_path:?}, 詳細: {source}")]
    ConfigParse {
        file_path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },

    #[error("資金不足: 選択可能なUTXOの総額 {found} atoms, 要求額 {target} atoms")]
    InsufficientFunds { found: u64, target: u64 },

    #[error("ウォレット残高不足: 利用可能 {available} atoms, 要求額 {required} atoms")]
    InsufficientWalletBalance { available: u64, required: u64 },

    #[error("トランザクション構築に使えるUTXOが見つかりません: {address}")]
    NoUtxosFound { address: String },

    #[error("UTXOのtxidが重複しています: {txid}")]
    DuplicateOutput { txid: TxHash },

    #[error("マルチシグ情報を取得できません ({outpoint}): {reason}")]
    RedeemInfoUnavailable { outpoint: String, reason: String },

    #[error(
        "おつりが正になりません: 入力 {found} atoms, 送金額 {amount} atoms, 手数料 {fee} atoms"
    )]
    NegativeChange { found: u64, amount: u64, fee: u64 },

    #[error("署名が完了していません (他の署名者の署名が必要です)")]
    SigningIncomplete,

    #[error("ウォレットのアドレスが利用できません ({address}): {reason}")]
    WalletAddress { address: String, reason: String },

    #[error("未実装のアクションです: {0}")]
    Unimplemented(String),
}

impl AppError {
    pub fn missing_argument(name: &str) -> Self {
        AppError::Argument(format!("引数が見つかりません: {}", name))
    }

    pub fn invalid_address(address: &str, reason: impl ToString) -> Self {
        AppError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn amount_conversion(input: impl ToString, reason: impl ToString) -> Self {
        AppError::AmountConversion {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn json(context: impl ToString, source: serde_json::Error) -> Self {
        AppError::Json {
            context: context.to_string(),
            source,
        }
    }

    pub(crate) fn insufficient_funds(found: Amount, target: Amount) -> Self {
        AppError::InsufficientFunds {
            found: found.to_sat(),
            target: target.to_sat(),
        }
    }
}

impl From<bitcoin::consensus::encode::Error> for AppError {
    fn from(e: bitcoin::consensus::encode::Error) -> Self {
        AppError::MalformedTransaction(e.to_string())
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(e: ::config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
