use bitcoin::Amount;
use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::explorer::ChainData;
use crate::types::UnspentOutput;

/// 選択されたUTXOとその合計額
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub utxos: Vec<UnspentOutput>,
    pub found: Amount,
}

/// アドレスのUTXOを取得して `target` を厳密に上回るまで先頭から積み上げる。
///
/// 順序は取得したリストの順のまま。確認数が `min_confirmations` 未満のものは使わない。
pub fn select_utxos(
    chain: &dyn ChainData,
    address: &str,
    min_confirmations: i64,
    target: Amount,
) -> AppResult<Selection> {
    let fetched = chain.address_utxos(address)?;
    log::debug!("{} のUTXOを {} 件取得しました", address, fetched.len());
    select_from(address, fetched, min_confirmations, target)
}

pub(crate) fn select_from(
    address: &str,
    fetched: Vec<UnspentOutput>,
    min_confirmations: i64,
    target: Amount,
) -> AppResult<Selection> {
    let mut seen = HashSet::with_capacity(fetched.len());
    for utxo in &fetched {
        if !seen.insert(utxo.txid) {
            return Err(AppError::DuplicateOutput { txid: utxo.txid });
        }
    }

    let spendable: Vec<UnspentOutput> = fetched
        .into_iter()
        .filter(|u| {
            let ok = u.confirmations >= min_confirmations;
            if !ok {
                log::debug!(
                    "確認数不足のため除外: {}:{} ({} confirmations)",
                    u.txid,
                    u.vout,
                    u.confirmations
                );
            }
            ok
        })
        .collect();
    if spendable.is_empty() {
        return Err(AppError::NoUtxosFound {
            address: address.to_string(),
        });
    }

    let mut utxos = Vec::new();
    let mut found = Amount::ZERO;
    for utxo in spendable {
        found = found.checked_add(utxo.amount).ok_or_else(|| {
            AppError::amount_conversion(address, "UTXO合計額がオーバーフローしました")
        })?;
        utxos.push(utxo);
        if found > target {
            break;
        }
    }
    if found <= target {
        return Err(AppError::insufficient_funds(found, target));
    }

    log::debug!("{} 件のUTXOを選択: 合計 {} atoms", utxos.len(), found.to_sat());
    Ok(Selection { utxos, found })
}
