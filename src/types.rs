use bitcoin::{Amount, Denomination};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// 1 DCR = 1e8 atoms。最大供給量を超える金額は扱わない。
pub const ATOMS_PER_COIN: u64 = 100_000_000;
pub const MAX_AMOUNT: Amount = Amount::from_sat(21_000_000 * ATOMS_PER_COIN);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet3,
}

/// ネットワークごとのアドレスプレフィックスと既定の接続先
#[derive(Debug)]
pub struct NetParams {
    pub name: &'static str,
    pub pubkey_addr_id: [u8; 2],
    pub pubkey_hash_addr_id: [u8; 2],
    pub pkh_edwards_addr_id: [u8; 2],
    pub pkh_schnorr_addr_id: [u8; 2],
    pub script_hash_addr_id: [u8; 2],
    pub dcrdata_url: &'static str,
    pub insight_url: &'static str,
    pub default_wallet_url: &'static str,
}

const MAINNET_PARAMS: NetParams = NetParams {
    name: "mainnet",
    pubkey_addr_id: [0x13, 0x86],      // Dk
    pubkey_hash_addr_id: [0x07, 0x3f], // Ds
    pkh_edwards_addr_id: [0x07, 0x1f], // De
    pkh_schnorr_addr_id: [0x07, 0x01], // DS
    script_hash_addr_id: [0x07, 0x1a], // Dc
    dcrdata_url: "https://explorer.dcrdata.org/api",
    insight_url: "https://explorer.dcrdata.org/insight/api",
    default_wallet_url: "https://localhost:9110",
};

const TESTNET3_PARAMS: NetParams = NetParams {
    name: "testnet3",
    pubkey_addr_id: [0x28, 0xf7],      // Tk
    pubkey_hash_addr_id: [0x0f, 0x21], // Ts
    pkh_edwards_addr_id: [0x0f, 0x01], // Te
    pkh_schnorr_addr_id: [0x0e, 0xe3], // TS
    script_hash_addr_id: [0x0e, 0xfc], // Tc
    dcrdata_url: "https://testnet.dcrdata.org/api",
    insight_url: "https://testnet.dcrdata.org/insight/api",
    default_wallet_url: "https://localhost:19110",
};

impl Network {
    pub fn params(&self) -> &'static NetParams {
        match self {
            Network::Mainnet => &MAINNET_PARAMS,
            Network::Testnet3 => &TESTNET3_PARAMS,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet3" | "testnet" => Ok(Network::Testnet3),
            other => Err(AppError::Config(format!(
                "無効なネットワークが指定されました: {}",
                other
            ))),
        }
    }
}

/// 32バイトのトランザクションハッシュ。内部はワイヤ上のバイト順、表示は逆順の16進数。
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TxHash(pub [u8; 32]);

impl FromStr for TxHash {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(TxHash(bytes))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = self.0;
        display.reverse();
        f.write_str(&hex::encode(display))
    }
}

/// トランザクションが属するツリー (Decred固有)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxTree {
    Regular,
    Stake,
}

impl TxTree {
    pub fn to_u8(self) -> u8 {
        match self {
            TxTree::Regular => 0,
            TxTree::Stake => 1,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(TxTree::Regular),
            1 => Some(TxTree::Stake),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: TxHash,
    pub vout: u32,
    pub amount: Amount,
    pub confirmations: i64,
    pub script_pub_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemScriptInfo {
    pub address: String,
    pub redeem_script: Vec<u8>,
    /// 必要署名数 M
    pub required: u32,
    /// 署名者総数 N
    pub total: u32,
    pub pub_keys: Vec<String>,
}

/// 10進数の通貨表記 ("1.5") を atoms に変換する。浮動小数点は経由しない。
pub fn parse_coin_amount(input: &str) -> AppResult<Amount> {
    let amount = Amount::from_str_in(input.trim(), Denomination::Bitcoin)
        .map_err(|e| AppError::amount_conversion(input, e))?;
    if amount == Amount::ZERO {
        return Err(AppError::amount_conversion(input, "金額は0より大きくなければなりません"));
    }
    if amount > MAX_AMOUNT {
        return Err(AppError::amount_conversion(input, "最大金額を超えています"));
    }
    Ok(amount)
}

/// ウォレットが返す浮動小数点の金額を atoms に丸める
pub fn amount_from_coins(coins: f64) -> AppResult<Amount> {
    if !coins.is_finite() || coins < 0.0 {
        return Err(AppError::amount_conversion(coins, "無効な金額です"));
    }
    let atoms = (coins * ATOMS_PER_COIN as f64).round();
    if atoms > MAX_AMOUNT.to_sat() as f64 {
        return Err(AppError::amount_conversion(coins, "最大金額を超えています"));
    }
    Ok(Amount::from_sat(atoms as u64))
}
