use crate::error::{AppError, AppResult};
use crate::wallet::{SignRawTransactionError, WalletSigner};
use crate::wire::decode_tx_hex;

/// 署名結果。`complete == false` はエラーではなく、他の署名者がまだ必要という意味。
#[derive(Debug, Clone, PartialEq)]
pub struct SignOutcome {
    pub hex: String,
    pub complete: bool,
    pub errors: Vec<SignRawTransactionError>,
}

impl SignOutcome {
    /// 全署名が揃ったトランザクションの16進数表現を返す
    pub fn require_complete(&self) -> AppResult<&str> {
        if self.complete {
            Ok(&self.hex)
        } else {
            Err(AppError::SigningIncomplete)
        }
    }
}

/// ウォレットで署名する。送る前に16進数とトランザクション構造を手元で検証する。
pub fn sign_multisig_tx(wallet: &dyn WalletSigner, tx_hex: &str) -> AppResult<SignOutcome> {
    let tx_hex = tx_hex.trim();
    let tx = decode_tx_hex(tx_hex)?;
    log::debug!("署名対象: 入力 {} 件, 出力 {} 件", tx.inputs.len(), tx.outputs.len());

    let result = wallet.sign_raw_transaction(tx_hex)?;
    for e in &result.errors {
        log::warn!("入力 {}:{} の署名エラー: {}", e.txid, e.vout, e.error);
    }
    Ok(SignOutcome {
        hex: result.hex,
        complete: result.complete,
        errors: result.errors,
    })
}

/// 署名済みトランザクションをブロードキャストする。署名が揃っているかは確認しない。
pub fn broadcast_multisig_tx(wallet: &dyn WalletSigner, tx_hex: &str) -> AppResult<String> {
    let tx_hex = tx_hex.trim();
    decode_tx_hex(tx_hex)?;
    let txid = wallet.send_raw_transaction(tx_hex)?;
    log::info!("トランザクションをブロードキャストしました: {}", txid);
    Ok(txid)
}
