use crate::error::{AppError, AppResult};
use crate::types::{RedeemScriptInfo, TxHash};
use crate::wallet::WalletSigner;

/// マルチシグ出力の redeem script と必要署名数をウォレットから取得する。
/// 再試行はしない。
pub fn resolve_redeem_script(
    wallet: &dyn WalletSigner,
    txid: &TxHash,
    vout: u32,
) -> AppResult<RedeemScriptInfo> {
    let outpoint = format!("{}:{}", txid, vout);
    let info = wallet.multisig_out_info(txid, vout).map_err(|e| match e {
        AppError::Rpc { message, .. } => AppError::RedeemInfoUnavailable {
            outpoint: outpoint.clone(),
            reason: message,
        },
        other => other,
    })?;
    log::trace!("{:?}", info);

    let redeem_script = hex::decode(&info.redeem_script)
        .map_err(|e| AppError::ScriptDecode(format!("redeem script ({}): {}", outpoint, e)))?;
    if redeem_script.is_empty() || info.m == 0 {
        return Err(AppError::RedeemInfoUnavailable {
            outpoint,
            reason: "マルチシグ出力ではありません".to_string(),
        });
    }

    Ok(RedeemScriptInfo {
        address: info.address,
        redeem_script,
        required: info.m,
        total: info.n,
        pub_keys: info.pubkeys,
    })
}
