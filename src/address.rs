use bitcoin::hashes::Hash;
use bitcoin::{PubkeyHash, ScriptBuf, ScriptHash};
use blake_hash::{Blake256, Digest};
use std::fmt;

use crate::error::{AppError, AppResult};
use crate::types::Network;

const HASH_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;
const SECP256K1_SIGNATURE_TYPE: u8 = 0;

/// ロック可能なアドレス種別。支払い先/おつり先として扱えるものだけを持つ。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressKind {
    /// secp256k1 ECDSA の pay-to-pubkey-hash
    PubKeyHash,
    /// pay-to-script-hash (マルチシグアドレス)
    ScriptHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    kind: AddressKind,
    hash: [u8; HASH_LEN],
    encoded: String,
}

impl Address {
    /// 指定ネットワークのパラメータでアドレスをデコードする
    pub fn decode(encoded: &str, net: Network) -> AppResult<Self> {
        let raw = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| AppError::invalid_address(encoded, e))?;
        if raw.len() < 2 + CHECKSUM_LEN {
            return Err(AppError::invalid_address(encoded, "長さが不正です"));
        }
        let (body, check) = raw.split_at(raw.len() - CHECKSUM_LEN);
        if checksum(body) != check {
            return Err(AppError::invalid_address(encoded, "チェックサムが一致しません"));
        }

        let id = [body[0], body[1]];
        let payload = &body[2..];
        let params = net.params();

        let kind = if id == params.pubkey_hash_addr_id {
            AddressKind::PubKeyHash
        } else if id == params.script_hash_addr_id {
            AddressKind::ScriptHash
        } else if id == params.pubkey_addr_id
            || id == params.pkh_edwards_addr_id
            || id == params.pkh_schnorr_addr_id
        {
            return Err(AppError::invalid_address(encoded, "サポートされていないアドレス種別です"));
        } else if let Some(other) = network_of(id).filter(|n| *n != net) {
            return Err(AppError::invalid_address(
                encoded,
                format!("ネットワーク不整合: 指定 {} vs アドレス {}", net, other),
            ));
        } else {
            return Err(AppError::invalid_address(encoded, "不明なアドレスプレフィックスです"));
        };

        let hash: [u8; HASH_LEN] = payload
            .try_into()
            .map_err(|_| AppError::invalid_address(encoded, "ハッシュ長が不正です"))?;

        Ok(Address {
            kind,
            hash,
            encoded: encoded.to_string(),
        })
    }

    pub fn from_hash(net: Network, kind: AddressKind, hash: [u8; HASH_LEN]) -> Self {
        let params = net.params();
        let id = match kind {
            AddressKind::PubKeyHash => params.pubkey_hash_addr_id,
            AddressKind::ScriptHash => params.script_hash_addr_id,
        };
        Address {
            kind,
            hash,
            encoded: encode_address(&hash, id),
        }
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// このアドレスへ支払うロックスクリプト (スクリプトバージョン0)
    pub fn script_pubkey(&self) -> ScriptBuf {
        match self.kind {
            AddressKind::PubKeyHash => {
                ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(self.hash))
            }
            AddressKind::ScriptHash => {
                ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(self.hash))
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

fn network_of(id: [u8; 2]) -> Option<Network> {
    [Network::Mainnet, Network::Testnet3].into_iter().find(|n| {
        let p = n.params();
        [
            p.pubkey_addr_id,
            p.pubkey_hash_addr_id,
            p.pkh_edwards_addr_id,
            p.pkh_schnorr_addr_id,
            p.script_hash_addr_id,
        ]
        .contains(&id)
    })
}

/// BLAKE-256 を2回かけた先頭4バイト
fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Blake256::digest(data);
    let second = Blake256::digest(first.as_slice());
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

pub fn encode_address(payload: &[u8], net_id: [u8; 2]) -> String {
    let mut data = Vec::with_capacity(2 + payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(&net_id);
    data.extend_from_slice(payload);
    let check = checksum(&data);
    data.extend_from_slice(&check);
    bs58::encode(data).into_string()
}

/// secp256k1 公開鍵から公開鍵アドレス (Dk.../Tk...) を作る。
/// 先頭バイトは署名方式とY座標の偶奇、その後にX座標32バイトが続く。
pub fn pubkey_address(pubkey: &[u8], net: Network) -> AppResult<String> {
    let (odd, x) = match pubkey.len() {
        33 if pubkey[0] == 0x02 || pubkey[0] == 0x03 => (pubkey[0] == 0x03, &pubkey[1..33]),
        65 if pubkey[0] == 0x04 => (pubkey[64] & 1 == 1, &pubkey[1..33]),
        _ => {
            return Err(AppError::ScriptDecode(format!(
                "secp256k1公開鍵ではありません: {}",
                hex::encode(pubkey)
            )));
        }
    };
    let mut payload = Vec::with_capacity(33);
    payload.push(SECP256K1_SIGNATURE_TYPE | if odd { 0x80 } else { 0x00 });
    payload.extend_from_slice(x);
    Ok(encode_address(&payload, net.params().pubkey_addr_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_address_decodes_back() {
        let a = Address::from_hash(Network::Mainnet, AddressKind::ScriptHash, [7u8; 20]);
        assert!(a.to_string().starts_with("Dc"));
        let b = Address::decode(&a.to_string(), Network::Mainnet).unwrap();
        assert_eq!(a, b);
        assert_eq!(b.kind(), AddressKind::ScriptHash);

        let t = Address::from_hash(Network::Testnet3, AddressKind::PubKeyHash, [1u8; 20]);
        assert!(t.to_string().starts_with("Ts"));
    }

    #[test]
    fn network_mismatch_is_rejected() {
        let a = Address::from_hash(Network::Testnet3, AddressKind::PubKeyHash, [3u8; 20]);
        let err = Address::decode(&a.to_string(), Network::Mainnet).unwrap_err();
        match err {
            AppError::InvalidAddress { reason, .. } => assert!(reason.contains("testnet3")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let a = Address::from_hash(Network::Mainnet, AddressKind::PubKeyHash, [9u8; 20]);
        let mut raw = bs58::decode(a.to_string()).into_vec().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let bad = bs58::encode(raw).into_string();
        assert!(matches!(
            Address::decode(&bad, Network::Mainnet),
            Err(AppError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["", "0OIl", "Ds"] {
            assert!(Address::decode(bad, Network::Mainnet).is_err(), "{bad}");
        }
    }

    #[test]
    fn pubkey_address_is_not_spendable_target() {
        let mut pk = vec![0x02];
        pk.extend_from_slice(&[0x11; 32]);
        let encoded = pubkey_address(&pk, Network::Mainnet).unwrap();
        assert!(encoded.starts_with("Dk"));
        assert!(Address::decode(&encoded, Network::Mainnet).is_err());
    }

    #[test]
    fn pubkey_address_parity_bit() {
        let mut even = vec![0x02];
        even.extend_from_slice(&[0x22; 32]);
        let mut odd = even.clone();
        odd[0] = 0x03;
        assert_ne!(
            pubkey_address(&even, Network::Mainnet).unwrap(),
            pubkey_address(&odd, Network::Mainnet).unwrap()
        );
        assert!(pubkey_address(&[0x05; 33], Network::Mainnet).is_err());
    }

    #[test]
    fn locking_scripts() {
        let pkh = Address::from_hash(Network::Mainnet, AddressKind::PubKeyHash, [0xab; 20]);
        let script = pkh.script_pubkey();
        assert!(script.is_p2pkh());
        assert_eq!(script.len(), 25);

        let sh = Address::from_hash(Network::Mainnet, AddressKind::ScriptHash, [0xcd; 20]);
        assert!(sh.script_pubkey().is_p2sh());
        assert_eq!(sh.script_pubkey().len(), 23);
    }
}
