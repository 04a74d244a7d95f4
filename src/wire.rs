//! Decred トランザクションのワイヤ形式。
//!
//! bitcoin クレートの consensus エンコーダ (リトルエンディアン整数、VarInt、
//! 長さ付きスクリプト) をそのまま使い、Decred 固有のレイアウトを組み立てる:
//! `version | ser_type << 16`、prefix (入力/出力/locktime/expiry)、witness。

use bitcoin::consensus::encode::{self, Decodable, Encodable, VarInt};
use bitcoin::io::{Read, Write};
use bitcoin::ScriptBuf;

use crate::error::AppResult;
use crate::types::{TxHash, TxTree};

pub const TX_VERSION: u16 = 1;
pub const MAX_TX_IN_SEQUENCE_NUM: u32 = 0xffff_ffff;
pub const NULL_BLOCK_HEIGHT: u32 = 0x0000_0000;
pub const NULL_BLOCK_INDEX: u32 = 0xffff_ffff;
pub const DEFAULT_PK_SCRIPT_VERSION: u16 = 0;

// 32MiB のメッセージに収まる最大個数 (最小の入力は 41 バイト、出力は 11 バイト)
const MAX_MESSAGE_PAYLOAD: u64 = 32 * 1024 * 1024;
const MAX_TX_IN_PER_MESSAGE: u64 = MAX_MESSAGE_PAYLOAD / 41 + 1;
const MAX_TX_OUT_PER_MESSAGE: u64 = MAX_MESSAGE_PAYLOAD / 11 + 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SerializeType {
    Full,
    NoWitness,
}

impl SerializeType {
    fn to_u16(self) -> u16 {
        match self {
            SerializeType::Full => 0,
            SerializeType::NoWitness => 1,
        }
    }

    fn from_u16(v: u16) -> Result<Self, encode::Error> {
        match v {
            0 => Ok(SerializeType::Full),
            1 => Ok(SerializeType::NoWitness),
            _ => Err(encode::Error::ParseFailed("unsupported transaction serialization type")),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub hash: TxHash,
    pub index: u32,
    pub tree: TxTree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_out_point: OutPoint,
    pub sequence: u32,
    pub value_in: i64,
    pub block_height: u32,
    pub block_index: u32,
    pub signature_script: ScriptBuf,
}

impl TxIn {
    /// 署名前の入力。ブロック位置は不明、シーケンスは最大値。
    pub fn new(previous_out_point: OutPoint, value_in: i64, signature_script: ScriptBuf) -> Self {
        TxIn {
            previous_out_point,
            sequence: MAX_TX_IN_SEQUENCE_NUM,
            value_in,
            block_height: NULL_BLOCK_HEIGHT,
            block_index: NULL_BLOCK_INDEX,
            signature_script,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub version: u16,
    pub pk_script: ScriptBuf,
}

impl TxOut {
    pub fn new(value: i64, pk_script: ScriptBuf) -> Self {
        TxOut {
            value,
            version: DEFAULT_PK_SCRIPT_VERSION,
            pk_script,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgTx {
    pub version: u16,
    pub ser_type: SerializeType,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry: u32,
}

impl Default for MsgTx {
    fn default() -> Self {
        MsgTx {
            version: TX_VERSION,
            ser_type: SerializeType::Full,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            expiry: 0,
        }
    }
}

impl MsgTx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tx_in(&mut self, txin: TxIn) {
        self.inputs.push(txin);
    }

    pub fn add_tx_out(&mut self, txout: TxOut) {
        self.outputs.push(txout);
    }

    pub fn serialize_size(&self) -> usize {
        encode::serialize(self).len()
    }

    fn encode_prefix<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, bitcoin::io::Error> {
        let mut len = VarInt(self.inputs.len() as u64).consensus_encode(w)?;
        for txin in &self.inputs {
            let op = &txin.previous_out_point;
            len += op.hash.0.consensus_encode(w)?;
            len += op.index.consensus_encode(w)?;
            len += op.tree.to_u8().consensus_encode(w)?;
            len += txin.sequence.consensus_encode(w)?;
        }
        len += VarInt(self.outputs.len() as u64).consensus_encode(w)?;
        for txout in &self.outputs {
            len += txout.value.consensus_encode(w)?;
            len += txout.version.consensus_encode(w)?;
            len += txout.pk_script.consensus_encode(w)?;
        }
        len += self.lock_time.consensus_encode(w)?;
        len += self.expiry.consensus_encode(w)?;
        Ok(len)
    }

    fn encode_witness<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, bitcoin::io::Error> {
        let mut len = VarInt(self.inputs.len() as u64).consensus_encode(w)?;
        for txin in &self.inputs {
            len += txin.value_in.consensus_encode(w)?;
            len += txin.block_height.consensus_encode(w)?;
            len += txin.block_index.consensus_encode(w)?;
            len += txin.signature_script.consensus_encode(w)?;
        }
        Ok(len)
    }
}

impl Encodable for MsgTx {
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, bitcoin::io::Error> {
        let raw_version = u32::from(self.version) | (u32::from(self.ser_type.to_u16()) << 16);
        let mut len = raw_version.consensus_encode(w)?;
        len += self.encode_prefix(w)?;
        if self.ser_type == SerializeType::Full {
            len += self.encode_witness(w)?;
        }
        Ok(len)
    }
}

fn read_count<R: Read + ?Sized>(
    r: &mut R,
    max: u64,
    what: &'static str,
) -> Result<usize, encode::Error> {
    let VarInt(count) = VarInt::consensus_decode_from_finite_reader(r)?;
    if count > max {
        return Err(encode::Error::ParseFailed(what));
    }
    Ok(count as usize)
}

impl Decodable for MsgTx {
    fn consensus_decode_from_finite_reader<R: Read + ?Sized>(
        r: &mut R,
    ) -> Result<Self, encode::Error> {
        let raw_version = u32::consensus_decode_from_finite_reader(r)?;
        let version = (raw_version & 0xffff) as u16;
        let ser_type = SerializeType::from_u16((raw_version >> 16) as u16)?;

        let in_count = read_count(r, MAX_TX_IN_PER_MESSAGE, "too many transaction inputs")?;
        let mut inputs = Vec::with_capacity(in_count.min(1024));
        for _ in 0..in_count {
            let hash = TxHash(<[u8; 32]>::consensus_decode_from_finite_reader(r)?);
            let index = u32::consensus_decode_from_finite_reader(r)?;
            let tree = TxTree::from_u8(u8::consensus_decode_from_finite_reader(r)?)
                .ok_or(encode::Error::ParseFailed("invalid transaction tree"))?;
            let sequence = u32::consensus_decode_from_finite_reader(r)?;
            inputs.push(TxIn {
                previous_out_point: OutPoint { hash, index, tree },
                sequence,
                value_in: 0,
                block_height: 0,
                block_index: 0,
                signature_script: ScriptBuf::new(),
            });
        }

        let out_count = read_count(r, MAX_TX_OUT_PER_MESSAGE, "too many transaction outputs")?;
        let mut outputs = Vec::with_capacity(out_count.min(1024));
        for _ in 0..out_count {
            let value = i64::consensus_decode_from_finite_reader(r)?;
            let version = u16::consensus_decode_from_finite_reader(r)?;
            let pk_script = ScriptBuf::consensus_decode_from_finite_reader(r)?;
            outputs.push(TxOut { value, version, pk_script });
        }

        let lock_time = u32::consensus_decode_from_finite_reader(r)?;
        let expiry = u32::consensus_decode_from_finite_reader(r)?;

        if ser_type == SerializeType::Full {
            let wit_count = read_count(r, MAX_TX_IN_PER_MESSAGE, "too many witness entries")?;
            if wit_count != inputs.len() {
                return Err(encode::Error::ParseFailed("witness count does not match input count"));
            }
            for txin in inputs.iter_mut() {
                txin.value_in = i64::consensus_decode_from_finite_reader(r)?;
                txin.block_height = u32::consensus_decode_from_finite_reader(r)?;
                txin.block_index = u32::consensus_decode_from_finite_reader(r)?;
                txin.signature_script = ScriptBuf::consensus_decode_from_finite_reader(r)?;
            }
        }

        Ok(MsgTx {
            version,
            ser_type,
            inputs,
            outputs,
            lock_time,
            expiry,
        })
    }
}

/// VarInt のエンコード長
pub fn var_int_serialize_size(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

pub fn encode_tx_hex(tx: &MsgTx) -> String {
    encode::serialize_hex(tx)
}

/// 16進数文字列からトランザクションを復元する。
/// 16進数として不正なら MalformedHex、バイナリとして不正なら MalformedTransaction。
pub fn decode_tx_hex(s: &str) -> AppResult<MsgTx> {
    let bytes = hex::decode(s.trim())?;
    let tx = encode::deserialize::<MsgTx>(&bytes)?;
    Ok(tx)
}
