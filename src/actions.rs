//! アクション名と `key=value` 引数を1回のパイプライン実行に対応付ける

use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;

use bitcoin::Denomination;

use crate::address::{Address, pubkey_address};
use crate::error::{AppError, AppResult};
use crate::explorer::ChainData;
use crate::redeem::resolve_redeem_script;
use crate::signing::{broadcast_multisig_tx, sign_multisig_tx};
use crate::transaction::{DEFAULT_CONFIRMATIONS, assemble_multisig_tx};
use crate::types::{Network, amount_from_coins, parse_coin_amount};
use crate::wallet::WalletSigner;
use crate::wire::{MsgTx, decode_tx_hex, encode_tx_hex};

/// 1回の実行で使う外部サービスとネットワーク
pub struct Context<'a> {
    pub wallet: &'a dyn WalletSigner,
    pub chain: &'a dyn ChainData,
    pub net: Network,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    GetMultisigBalance,
    GetWalletBalance,
    GetNewKey,
    CreateMultisigAddress,
    SendToMultisig,
    CreateMultisigTx,
    SignMultisigTx,
    BroadcastMultisigTx,
    MultisigInfo,
    ImportRedeemScript,
    DeserializeTx,
    SweepMultisig,
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s {
            "getmultisigbalance" => Action::GetMultisigBalance,
            "getwalletbalance" => Action::GetWalletBalance,
            "getnewkey" => Action::GetNewKey,
            "createmultisigaddress" => Action::CreateMultisigAddress,
            "sendtomultisig" => Action::SendToMultisig,
            "createmultisigtx" => Action::CreateMultisigTx,
            "signmultisigtx" => Action::SignMultisigTx,
            "broadcastmultisigtx" => Action::BroadcastMultisigTx,
            "multisiginfo" => Action::MultisigInfo,
            "importredeemscript" => Action::ImportRedeemScript,
            "deserializetx" => Action::DeserializeTx,
            "sweepmultisig" => Action::SweepMultisig,
            other => return Err(AppError::InvalidAction(other.to_string())),
        };
        Ok(action)
    }
}

impl Action {
    /// ウォレットへの接続 (認証情報と証明書) が必要か
    pub fn uses_wallet(self) -> bool {
        !matches!(
            self,
            Action::GetMultisigBalance | Action::DeserializeTx | Action::SweepMultisig
        )
    }
}

/// `key=value` 形式の引数。最初の `=` で分割し、`=` がなければ値は空文字列。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Args(HashMap<String, String>);

impl Args {
    pub fn parse<I, S>(args: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').unwrap_or((arg, ""));
            if key.is_empty() {
                return Err(AppError::Argument(format!("引数名がありません: {}", arg)));
            }
            if map.insert(key.to_string(), value.to_string()).is_some() {
                return Err(AppError::Argument(format!("引数が重複しています: {}", key)));
            }
        }
        Ok(Args(map))
    }

    pub fn string(&self, key: &str) -> AppResult<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| AppError::missing_argument(key))
    }

    pub fn uint(&self, key: &str) -> AppResult<u32> {
        let v = self.string(key)?;
        v.parse().map_err(|e| {
            AppError::Argument(format!("{} は正の整数ではありません ({}): {}", key, v, e))
        })
    }

    /// 引数がなければ `default`。値があって数値でなければエラー。
    pub fn int_or(&self, key: &str, default: i64) -> AppResult<i64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|e| {
                AppError::Argument(format!("{} は整数ではありません ({}): {}", key, v, e))
            }),
        }
    }

    pub fn list(&self, key: &str) -> AppResult<Vec<String>> {
        Ok(self.string(key)?.split(',').map(str::to_string).collect())
    }
}

pub fn run(ctx: &Context<'_>, action: Action, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    log::debug!("action: {:?}", action);
    match action {
        Action::GetMultisigBalance => get_multisig_balance(ctx, args, out),
        Action::GetWalletBalance => get_wallet_balance(ctx, out),
        Action::GetNewKey => get_new_key(ctx, out),
        Action::CreateMultisigAddress => create_multisig_address(ctx, args, out),
        Action::SendToMultisig => send_to_multisig(ctx, args, out),
        Action::CreateMultisigTx => create_multisig_tx(ctx, args, out),
        Action::SignMultisigTx => sign_tx(ctx, args, out),
        Action::BroadcastMultisigTx => broadcast_tx(ctx, args, out),
        Action::MultisigInfo => multisig_info(ctx, args, out),
        Action::ImportRedeemScript => import_redeem_script(ctx, args),
        Action::DeserializeTx => deserialize_tx(args, out),
        Action::SweepMultisig => Err(AppError::Unimplemented("sweepmultisig".to_string())),
    }
}

fn get_multisig_balance(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let address = args.string("address")?;
    let info = ctx.chain.address_info(address)?;
    log::trace!("{:?}", info);
    let balance = amount_from_coins(info.balance)?;
    writeln!(out, "{}", balance.to_string_in(Denomination::Bitcoin))?;
    Ok(())
}

fn get_wallet_balance(ctx: &Context<'_>, out: &mut dyn Write) -> AppResult<()> {
    let balance = ctx.wallet.balance()?;
    log::trace!("{:?}", balance);
    let spendable = amount_from_coins(balance.total_spendable)?;
    writeln!(out, "{}", spendable.to_string_in(Denomination::Bitcoin))?;
    Ok(())
}

fn get_new_key(ctx: &Context<'_>, out: &mut dyn Write) -> AppResult<()> {
    let address = ctx.wallet.new_address("default", "wrap")?;
    let va = ctx.wallet.validate_address(&address)?;
    log::trace!("{:?}", va);
    if !va.is_valid {
        return Err(AppError::WalletAddress {
            address,
            reason: "無効なアドレスです".to_string(),
        });
    }
    if !va.is_mine {
        return Err(AppError::WalletAddress {
            address,
            reason: "このウォレットの管理下にありません".to_string(),
        });
    }
    writeln!(out, "{}", va.pub_key_addr)?;
    Ok(())
}

fn create_multisig_address(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let n = args.uint("n")?;
    let keys = args.list("keys")?;
    if n == 0 || n as usize > keys.len() {
        return Err(AppError::Argument(format!(
            "必要署名数 {} は 1 以上かつ鍵の数 {} 以下でなければなりません",
            n,
            keys.len()
        )));
    }
    let msa = ctx.wallet.create_multisig(n, &keys)?;
    writeln!(out, "{}", msa.address)?;
    writeln!(out, "{}", msa.redeem_script)?;
    Ok(())
}

fn send_to_multisig(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let address = Address::decode(args.string("address")?, ctx.net)?;
    let amount = parse_coin_amount(args.string("amount")?)?;
    let txid = ctx.wallet.send_to_address(&address.to_string(), amount)?;
    writeln!(out, "{}", txid)?;
    Ok(())
}

fn create_multisig_tx(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let address = args.string("address")?;
    let to = args.string("to")?;
    let amount = args.string("amount")?;
    let confirmations = args.int_or("confirmations", DEFAULT_CONFIRMATIONS)?;
    let assembled = assemble_multisig_tx(
        ctx.wallet,
        ctx.chain,
        ctx.net,
        address,
        to,
        amount,
        confirmations,
    )?;
    writeln!(out, "{}", encode_tx_hex(&assembled.tx))?;
    Ok(())
}

fn sign_tx(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let outcome = sign_multisig_tx(ctx.wallet, args.string("tx")?)?;
    writeln!(out, "complete: {}", outcome.complete)?;
    for e in &outcome.errors {
        writeln!(out, "error: {}:{}: {}", e.txid, e.vout, e.error)?;
    }
    match outcome.require_complete() {
        Ok(_) => writeln!(out, "signing complete")?,
        Err(e) => {
            log::info!("{}", e);
            writeln!(out, "signing not complete")?;
        }
    }
    writeln!(out, "{}", outcome.hex)?;
    Ok(())
}

fn broadcast_tx(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let txid = broadcast_multisig_tx(ctx.wallet, args.string("tx")?)?;
    writeln!(out, "{}", txid)?;
    Ok(())
}

fn multisig_info(ctx: &Context<'_>, args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let address = args.string("address")?;
    let utxos = ctx.chain.address_utxos(address)?;
    // 最初のUTXOからマルチシグアドレスの情報を引く
    let Some(first) = utxos.first() else {
        return Err(AppError::RedeemInfoUnavailable {
            outpoint: address.to_string(),
            reason: "UTXOがないため情報を取得できません".to_string(),
        });
    };
    let info = resolve_redeem_script(ctx.wallet, &first.txid, first.vout)?;

    writeln!(out, "Address      : {}", info.address)?;
    writeln!(out, "M            : {}", info.required)?;
    writeln!(out, "N            : {}", info.total)?;
    for key in &info.pub_keys {
        let encoded = hex::decode(key)
            .map_err(|e| AppError::ScriptDecode(e.to_string()))
            .and_then(|pk| pubkey_address(&pk, ctx.net));
        match encoded {
            Ok(a) => writeln!(out, "Public key   : {}", a)?,
            Err(e) => writeln!(out, "Could not decode {}: {}", key, e)?,
        }
    }
    writeln!(out, "Redeem script: {}", hex::encode(&info.redeem_script))?;
    Ok(())
}

fn import_redeem_script(ctx: &Context<'_>, args: &Args) -> AppResult<()> {
    let script = args.string("script")?;
    hex::decode(script)?;
    ctx.wallet.import_script(script, true)?;
    log::info!("redeem script をインポートしました。ウォレットが認識するまで数分かかります。");
    Ok(())
}

fn deserialize_tx(args: &Args, out: &mut dyn Write) -> AppResult<()> {
    let tx = decode_tx_hex(args.string("tx")?)?;
    write_tx_dump(&tx, out)
}

fn write_tx_dump(tx: &MsgTx, out: &mut dyn Write) -> AppResult<()> {
    writeln!(out, "version      : {}", tx.version)?;
    writeln!(out, "serialization: {:?}", tx.ser_type)?;
    writeln!(out, "lock time    : {}", tx.lock_time)?;
    writeln!(out, "expiry       : {}", tx.expiry)?;
    for (k, txin) in tx.inputs.iter().enumerate() {
        let op = &txin.previous_out_point;
        writeln!(
            out,
            "input {}: {}:{} tree={:?} sequence={} value_in={} block_height={} block_index={}",
            k,
            op.hash,
            op.index,
            op.tree,
            txin.sequence,
            txin.value_in,
            txin.block_height,
            txin.block_index
        )?;
        writeln!(out, "  {}", hex::encode(txin.signature_script.as_bytes()))?;
        writeln!(out, "  {}: {}", k, txin.signature_script.to_asm_string())?;
    }
    for (k, txout) in tx.outputs.iter().enumerate() {
        writeln!(
            out,
            "output {}: value={} version={} script={}",
            k,
            txout.value,
            txout.version,
            hex::encode(txout.pk_script.as_bytes())
        )?;
    }
    Ok(())
}
