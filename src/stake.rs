use crate::types::TxTree;
use crate::wire::{MsgTx, TxOut};

// Decred のステーク用タグオペコード
const OP_SSTX: u8 = 0xba;
const OP_SSGEN: u8 = 0xbb;
const OP_SSRTX: u8 = 0xbc;
const OP_TADD: u8 = 0xc1;
const OP_TSPEND: u8 = 0xc2;
const OP_TGEN: u8 = 0xc3;

const TREASURY_TX_VERSION: u16 = 3;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StakeTxType {
    Regular,
    TicketPurchase,
    Vote,
    Revocation,
    TreasuryAdd,
    TreasurySpend,
    TreasuryBase,
}

fn first_opcode(out: &TxOut) -> Option<u8> {
    out.pk_script.as_bytes().first().copied()
}

fn tagged(out: &TxOut, opcode: u8) -> bool {
    first_opcode(out) == Some(opcode)
}

impl StakeTxType {
    /// 出力スクリプトのタグと入力の形からトランザクション種別を判定する
    pub fn classify(tx: &MsgTx) -> Self {
        let outputs = &tx.outputs;
        let Some(first) = outputs.first() else {
            return StakeTxType::Regular;
        };

        if tx.version == TREASURY_TX_VERSION {
            if tagged(first, OP_TADD) {
                let stakebase = tx.inputs.len() == 1
                    && tx.inputs[0].previous_out_point.hash.0 == [0u8; 32]
                    && tx.inputs[0].previous_out_point.index == u32::MAX;
                return if stakebase {
                    StakeTxType::TreasuryBase
                } else {
                    StakeTxType::TreasuryAdd
                };
            }
            let tspend_sig = tx.inputs.len() == 1
                && tx.inputs[0].signature_script.as_bytes().last() == Some(&OP_TSPEND);
            if tspend_sig && outputs.len() > 1 && outputs[1..].iter().all(|o| tagged(o, OP_TGEN)) {
                return StakeTxType::TreasurySpend;
            }
        }

        if tagged(first, OP_SSTX) {
            return StakeTxType::TicketPurchase;
        }
        if outputs.len() > 2 && outputs[2..].iter().any(|o| tagged(o, OP_SSGEN)) {
            return StakeTxType::Vote;
        }
        if outputs.iter().all(|o| tagged(o, OP_SSRTX)) {
            return StakeTxType::Revocation;
        }
        StakeTxType::Regular
    }

    pub fn tree(self) -> TxTree {
        match self {
            StakeTxType::Regular => TxTree::Regular,
            StakeTxType::TicketPurchase
            | StakeTxType::Vote
            | StakeTxType::Revocation
            | StakeTxType::TreasuryAdd
            | StakeTxType::TreasurySpend
            | StakeTxType::TreasuryBase => TxTree::Stake,
        }
    }
}

/// 出力を作ったトランザクションのツリー
pub fn tx_tree(tx: &MsgTx) -> TxTree {
    StakeTxType::classify(tx).tree()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxHash;
    use crate::wire::{OutPoint, TxIn};
    use bitcoin::ScriptBuf;

    fn out(script: Vec<u8>) -> TxOut {
        TxOut::new(1, ScriptBuf::from_bytes(script))
    }

    fn input(hash: [u8; 32], index: u32, sig: Vec<u8>) -> TxIn {
        TxIn::new(
            OutPoint {
                hash: TxHash(hash),
                index,
                tree: TxTree::Regular,
            },
            1,
            ScriptBuf::from_bytes(sig),
        )
    }

    fn p2pkh() -> Vec<u8> {
        let mut s = vec![0x76, 0xa9, 0x14];
        s.extend_from_slice(&[0u8; 20]);
        s.extend_from_slice(&[0x88, 0xac]);
        s
    }

    #[test]
    fn plain_payment_is_regular() {
        let mut tx = MsgTx::new();
        tx.add_tx_in(input([1; 32], 0, vec![]));
        tx.add_tx_out(out(p2pkh()));
        tx.add_tx_out(out(p2pkh()));
        assert_eq!(StakeTxType::classify(&tx), StakeTxType::Regular);
        assert_eq!(tx_tree(&tx), TxTree::Regular);
    }

    #[test]
    fn ticket_purchase_is_stake() {
        let mut tx = MsgTx::new();
        tx.add_tx_in(input([1; 32], 0, vec![]));
        let mut sstx = vec![OP_SSTX];
        sstx.extend(p2pkh());
        tx.add_tx_out(out(sstx));
        tx.add_tx_out(out(vec![0x6a, 0x1e]));
        assert_eq!(StakeTxType::classify(&tx), StakeTxType::TicketPurchase);
        assert_eq!(tx_tree(&tx), TxTree::Stake);
    }

    #[test]
    fn vote_is_stake() {
        let mut tx = MsgTx::new();
        tx.add_tx_in(input([0; 32], u32::MAX, vec![]));
        tx.add_tx_in(input([2; 32], 0, vec![]));
        tx.add_tx_out(out(vec![0x6a, 0x24]));
        tx.add_tx_out(out(vec![0x6a, 0x06]));
        let mut ssgen = vec![OP_SSGEN];
        ssgen.extend(p2pkh());
        tx.add_tx_out(out(ssgen));
        assert_eq!(StakeTxType::classify(&tx), StakeTxType::Vote);
    }

    #[test]
    fn revocation_is_stake() {
        let mut tx = MsgTx::new();
        tx.add_tx_in(input([3; 32], 0, vec![]));
        let mut ssrtx = vec![OP_SSRTX];
        ssrtx.extend(p2pkh());
        tx.add_tx_out(out(ssrtx));
        assert_eq!(StakeTxType::classify(&tx), StakeTxType::Revocation);
    }

    #[test]
    fn treasury_transactions_are_stake() {
        let mut tadd = MsgTx::new();
        tadd.version = TREASURY_TX_VERSION;
        tadd.add_tx_in(input([4; 32], 1, vec![]));
        tadd.add_tx_out(out(vec![OP_TADD]));
        assert_eq!(StakeTxType::classify(&tadd), StakeTxType::TreasuryAdd);

        let mut tbase = MsgTx::new();
        tbase.version = TREASURY_TX_VERSION;
        tbase.add_tx_in(input([0; 32], u32::MAX, vec![]));
        tbase.add_tx_out(out(vec![OP_TADD]));
        tbase.add_tx_out(out(vec![0x6a, 0x0c]));
        assert_eq!(StakeTxType::classify(&tbase), StakeTxType::TreasuryBase);

        let mut tspend = MsgTx::new();
        tspend.version = TREASURY_TX_VERSION;
        tspend.add_tx_in(input([0; 32], u32::MAX, vec![0x40, OP_TSPEND]));
        tspend.add_tx_out(out(vec![0x6a, 0x20]));
        let mut tgen = vec![OP_TGEN];
        tgen.extend(p2pkh());
        tspend.add_tx_out(out(tgen));
        assert_eq!(StakeTxType::classify(&tspend), StakeTxType::TreasurySpend);
        assert_eq!(tx_tree(&tspend), TxTree::Stake);
    }

    #[test]
    fn tadd_opcode_in_old_version_is_regular() {
        let mut tx = MsgTx::new();
        tx.add_tx_in(input([4; 32], 1, vec![]));
        tx.add_tx_out(out(vec![OP_TADD]));
        assert_eq!(StakeTxType::classify(&tx), StakeTxType::Regular);
    }

    #[test]
    fn no_outputs_is_regular() {
        let tx = MsgTx::new();
        assert_eq!(tx_tree(&tx), TxTree::Regular);
    }
}
