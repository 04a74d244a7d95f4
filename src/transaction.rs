use bitcoin::{Amount, ScriptBuf};

use crate::address::Address;
use crate::error::{AppError, AppResult};
use crate::explorer::ChainData;
use crate::redeem::resolve_redeem_script;
use crate::selector::select_utxos;
use crate::stake::tx_tree;
use crate::types::{
    MAX_AMOUNT, Network, RedeemScriptInfo, UnspentOutput, amount_from_coins, parse_coin_amount,
};
use crate::wallet::WalletSigner;
use crate::wire::{MsgTx, OutPoint, TxIn, TxOut, decode_tx_hex, var_int_serialize_size};

pub const DEFAULT_CONFIRMATIONS: i64 = 6;

/// 最低リレー手数料 (atoms/kB)
pub const DEFAULT_RELAY_FEE_PER_KB: Amount = Amount::from_sat(10_000);

// 推定サイズ用のスクリプト長
// 署名スクリプト: OP_DATA_73 <sig+hashtype> OP_DATA_33 <pubkey>
pub const REDEEM_P2PKH_SIG_SCRIPT_SIZE: usize = 1 + 73 + 1 + 33;
pub const P2SH_PK_SCRIPT_SIZE: usize = 1 + 1 + 20 + 1;

const OP_PUSHDATA1: usize = 0x4c;

/// 組み立て結果。`tx` の入力は署名スクリプトが空のまま。
#[derive(Debug, Clone)]
pub struct AssembledTx {
    pub tx: MsgTx,
    pub fee: Amount,
    pub found: Amount,
    pub estimated_size: usize,
    pub redeem: RedeemScriptInfo,
}

/// 入力1つ分の推定シリアライズサイズ (prefix + witness)
pub fn estimate_input_size(script_size: usize) -> usize {
    // hash + index + tree + value_in + block height + block index + script + sequence
    32 + 4 + 1 + 8 + 4 + 4 + var_int_serialize_size(script_size as u64) + script_size + 4
}

pub fn estimate_output_size(script_size: usize) -> usize {
    8 + 2 + var_int_serialize_size(script_size as u64) + script_size
}

/// 署名スクリプト長・出力スクリプト長からトランザクション全体のサイズを見積もる。
/// `change_script_size` が0ならおつり出力なし。
pub fn estimate_serialize_size(
    input_script_sizes: &[usize],
    output_script_sizes: &[usize],
    change_script_size: usize,
) -> usize {
    let ins: usize = input_script_sizes.iter().map(|s| estimate_input_size(*s)).sum();
    let outs: usize = output_script_sizes.iter().map(|s| estimate_output_size(*s)).sum();
    let mut output_count = output_script_sizes.len();
    let change = if change_script_size > 0 {
        output_count += 1;
        estimate_output_size(change_script_size)
    } else {
        0
    };
    // version, locktime, expiry の12バイト。入力数は prefix と witness の2回現れる。
    12 + 2 * var_int_serialize_size(input_script_sizes.len() as u64)
        + var_int_serialize_size(output_count as u64)
        + ins
        + outs
        + change
}

fn push_data_size(len: usize) -> usize {
    match len {
        0..OP_PUSHDATA1 => 1,
        OP_PUSHDATA1..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    }
}

/// M-of-N マルチシグ入力の署名スクリプト長 (M個の署名 + redeem script のプッシュ)。
/// 署名ごとに公開鍵分も数えるので少し多めに払う。
pub fn multisig_sig_script_size(required: u32, redeem_script_len: usize) -> usize {
    required as usize * REDEEM_P2PKH_SIG_SCRIPT_SIZE
        + push_data_size(redeem_script_len)
        + redeem_script_len
}

/// サイズに対する手数料。切り上げで、0になる場合は1kB分を払う。
pub fn fee_for_serialize_size(relay_fee_per_kb: Amount, size: usize) -> Amount {
    let rate = relay_fee_per_kb.to_sat();
    let fee = (rate as u128 * size as u128).div_ceil(1000);
    let fee = if fee == 0 && rate > 0 { rate as u128 } else { fee };
    Amount::from_sat(fee.min(MAX_AMOUNT.to_sat() as u128) as u64)
}

fn atoms_i64(amount: Amount) -> AppResult<i64> {
    i64::try_from(amount.to_sat())
        .map_err(|_| AppError::amount_conversion(amount.to_sat(), "金額が大きすぎます"))
}

/// UTXO から未署名の入力を作る。
///
/// 親トランザクションを取得してツリー (regular/stake) を判定する。
/// 署名スクリプトは空のまま。署名はウォレットが後で埋める。
pub fn resolve_spendable_input(chain: &dyn ChainData, utxo: &UnspentOutput) -> AppResult<TxIn> {
    let raw = chain.raw_transaction_hex(&utxo.txid)?;
    let prev_tx = decode_tx_hex(&raw).map_err(|e| {
        log::error!("親トランザクション {} のデコードに失敗しました", utxo.txid);
        e
    })?;
    let tree = tx_tree(&prev_tx);

    match prev_tx.outputs.get(utxo.vout as usize) {
        None => {
            return Err(AppError::MalformedTransaction(format!(
                "親トランザクション {} に出力 {} がありません",
                utxo.txid, utxo.vout
            )));
        }
        Some(out) if out.value as i128 != utxo.amount.to_sat() as i128 => {
            log::warn!(
                concat!(
                    "UTXO {}:{} の金額がデータサービス ({} atoms) と",
                    "親トランザクション ({} atoms) で異なります"
                ),
                utxo.txid,
                utxo.vout,
                utxo.amount.to_sat(),
                out.value
            );
        }
        Some(_) => {}
    }

    log::debug!(
        "入力追加: {}:{} tree={:?} value={}",
        utxo.txid,
        utxo.vout,
        tree,
        utxo.amount.to_sat()
    );
    Ok(TxIn::new(
        OutPoint {
            hash: utxo.txid,
            index: utxo.vout,
            tree,
        },
        atoms_i64(utxo.amount)?,
        ScriptBuf::new(),
    ))
}

/// マルチシグアドレスから `to` へ `amount` を送る未署名トランザクションを組み立てる。
/// おつりはマルチシグアドレスに戻す。
pub fn assemble_multisig_tx(
    wallet: &dyn WalletSigner,
    chain: &dyn ChainData,
    net: Network,
    change_address: &str,
    to_address: &str,
    amount: &str,
    confirmations: i64,
) -> AppResult<AssembledTx> {
    log::info!("マルチシグトランザクションの組み立てを開始します。");

    let change = Address::decode(change_address, net)?;
    let to = Address::decode(to_address, net)?;
    let out_value = parse_coin_amount(amount)?;

    // UTXO 選択とは独立した大まかな残高チェック
    let balance = wallet.balance()?;
    let spendable = amount_from_coins(balance.total_spendable)?;
    if spendable < out_value {
        return Err(AppError::InsufficientWalletBalance {
            available: spendable.to_sat(),
            required: out_value.to_sat(),
        });
    }

    let selection = select_utxos(chain, change_address, confirmations, out_value)?;
    let Some(first) = selection.utxos.first() else {
        return Err(AppError::NoUtxosFound {
            address: change_address.to_string(),
        });
    };

    // アドレス内のUTXOはすべて同じ redeem script を持つ前提
    let redeem = resolve_redeem_script(wallet, &first.txid, first.vout)?;
    log::debug!("redeem script: {}-of-{}", redeem.required, redeem.total);

    let mut tx = MsgTx::new();

    let payment_script = to.script_pubkey();
    log::debug!(
        "支払い先: {} ({:?}), おつり: {} ({:?})",
        to,
        to.kind(),
        change,
        change.kind()
    );
    let sig_script_size = multisig_sig_script_size(redeem.required, redeem.redeem_script.len());
    let input_sizes = vec![sig_script_size; selection.utxos.len()];
    let estimated_size =
        estimate_serialize_size(&input_sizes, &[payment_script.len()], P2SH_PK_SCRIPT_SIZE);
    let fee = fee_for_serialize_size(DEFAULT_RELAY_FEE_PER_KB, estimated_size);
    log::debug!(
        "推定サイズ: {} bytes, 手数料率: {} atoms/kB, 手数料: {} atoms",
        estimated_size,
        DEFAULT_RELAY_FEE_PER_KB.to_sat(),
        fee.to_sat()
    );

    let change_value = selection
        .found
        .checked_sub(out_value)
        .and_then(|v| v.checked_sub(fee))
        .filter(|v| *v > Amount::ZERO)
        .ok_or(AppError::NegativeChange {
            found: selection.found.to_sat(),
            amount: out_value.to_sat(),
            fee: fee.to_sat(),
        })?;

    tx.add_tx_out(TxOut::new(atoms_i64(out_value)?, payment_script));
    tx.add_tx_out(TxOut::new(atoms_i64(change_value)?, change.script_pubkey()));

    for utxo in &selection.utxos {
        tx.add_tx_in(resolve_spendable_input(chain, utxo)?);
    }

    log::trace!("{:#?}", tx);
    log::info!(
        "未署名トランザクションを組み立てました: 入力 {} 件, おつり {} atoms",
        tx.inputs.len(),
        change_value.to_sat()
    );

    Ok(AssembledTx {
        tx,
        fee,
        found: selection.found,
        estimated_size,
        redeem,
    })
}
