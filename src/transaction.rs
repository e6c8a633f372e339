//! 组装完成、尚未提交的交易。

use std::hash::{Hash as StdHash, Hasher};
use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;

use crate::error::{RelayError, RelayResult};
use crate::fee::FeeAmount;

/// SPL 代币账户及其 mint；以地址区分身份。
#[derive(Debug, Clone, Copy, Eq)]
pub struct TokenAccount {
    pub address: Pubkey,
    pub mint: Pubkey,
}

impl PartialEq for TokenAccount {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl StdHash for TokenAccount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// 指令、签名者与预期费用。fee payer 的签名由中继后端补上。
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    instructions: Vec<Instruction>,
    signers: Vec<Arc<Keypair>>,
    pub expected_fee: FeeAmount,
    fee_payer: Pubkey,
    blockhash: Hash,
    signed: Option<Transaction>,
}

impl PreparedTransaction {
    pub fn new(
        instructions: Vec<Instruction>,
        signers: Vec<Arc<Keypair>>,
        expected_fee: FeeAmount,
        fee_payer: Pubkey,
        blockhash: Hash,
    ) -> Self {
        Self {
            instructions,
            signers,
            expected_fee,
            fee_payer,
            blockhash,
            signed: None,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn signers(&self) -> &[Arc<Keypair>] {
        &self.signers
    }

    pub fn signer_pubkeys(&self) -> Vec<Pubkey> {
        self.signers.iter().map(|signer| signer.pubkey()).collect()
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.fee_payer
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    /// fee payer 加上本地签名者。
    pub fn signature_count(&self) -> usize {
        1 + self.signers.len()
    }

    /// 追加指令后需要重新签名。
    pub fn append_instructions(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.extend(instructions);
        self.signed = None;
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.signed.as_ref()
    }

    /// 编译消息并用本地签名者部分签名；fee payer 必须与上下文一致。
    pub fn sign(&mut self, expected_fee_payer: &Pubkey) -> RelayResult<&Transaction> {
        if self.fee_payer != *expected_fee_payer {
            return Err(RelayError::InvalidFeePayer {
                expected: *expected_fee_payer,
                actual: self.fee_payer,
            });
        }

        let message =
            Message::new_with_blockhash(&self.instructions, Some(&self.fee_payer), &self.blockhash);
        let required = message.header.num_required_signatures as usize;
        let required_signers: Vec<Pubkey> = message.account_keys[..required].to_vec();
        let mut transaction = Transaction::new_unsigned(message);

        // 只签消息真正需要的账户；多余的签名者会让 try_partial_sign 失败
        let keypairs: Vec<&Keypair> = self
            .signers
            .iter()
            .map(Arc::as_ref)
            .filter(|keypair| required_signers.contains(&keypair.pubkey()))
            .collect();
        transaction.try_partial_sign(keypairs.as_slice(), self.blockhash)?;

        for (index, signer) in required_signers.iter().enumerate() {
            if *signer == self.fee_payer {
                continue;
            }
            if transaction.signatures[index] == Signature::default() {
                return Err(RelayError::InvalidSignature(*signer));
            }
        }

        Ok(self.signed.insert(transaction))
    }

    /// 已签名交易中 `pubkey` 的签名。
    pub fn signature_of(&self, pubkey: &Pubkey) -> Option<Signature> {
        let transaction = self.signed.as_ref()?;
        let index = transaction
            .message
            .account_keys
            .iter()
            .position(|key| key == pubkey)?;
        transaction
            .signatures
            .get(index)
            .copied()
            .filter(|signature| *signature != Signature::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_system_interface::instruction as system_instruction;

    fn transfer_tx(user: &Arc<Keypair>, fee_payer: Pubkey) -> PreparedTransaction {
        let ix = system_instruction::transfer(&user.pubkey(), &fee_payer, 10);
        PreparedTransaction::new(
            vec![ix],
            vec![user.clone()],
            FeeAmount::new(10_000, 0),
            fee_payer,
            Hash::new_unique(),
        )
    }

    #[test]
    fn sign_leaves_fee_payer_slot_for_backend() {
        let user = Arc::new(Keypair::new());
        let fee_payer = Pubkey::new_unique();
        let mut prepared = transfer_tx(&user, fee_payer);
        let signed = prepared.sign(&fee_payer).expect("sign").clone();
        assert_eq!(signed.signatures.len(), 2);
        assert_eq!(signed.signatures[0], Signature::default());
        assert_ne!(signed.signatures[1], Signature::default());
        assert_eq!(prepared.signature_of(&user.pubkey()), Some(signed.signatures[1]));
        assert_eq!(prepared.signature_of(&fee_payer), None);
    }

    #[test]
    fn sign_rejects_mismatched_fee_payer() {
        let user = Arc::new(Keypair::new());
        let mut prepared = transfer_tx(&user, Pubkey::new_unique());
        let other = Pubkey::new_unique();
        assert!(matches!(
            prepared.sign(&other),
            Err(RelayError::InvalidFeePayer { expected, .. }) if expected == other
        ));
    }

    #[test]
    fn sign_requires_every_local_signature() {
        let user = Arc::new(Keypair::new());
        let fee_payer = Pubkey::new_unique();
        let ix = system_instruction::transfer(&user.pubkey(), &fee_payer, 10);
        let mut prepared = PreparedTransaction::new(
            vec![ix],
            Vec::new(),
            FeeAmount::ZERO,
            fee_payer,
            Hash::new_unique(),
        );
        assert!(matches!(
            prepared.sign(&fee_payer),
            Err(RelayError::InvalidSignature(key)) if key == user.pubkey()
        ));
    }

    #[test]
    fn appending_invalidates_signature() {
        let user = Arc::new(Keypair::new());
        let fee_payer = Pubkey::new_unique();
        let mut prepared = transfer_tx(&user, fee_payer);
        prepared.sign(&fee_payer).expect("sign");
        prepared.append_instructions([system_instruction::transfer(&user.pubkey(), &fee_payer, 1)]);
        assert!(prepared.transaction().is_none());
        let signed = prepared.sign(&fee_payer).expect("re-sign");
        assert_eq!(signed.message.instructions.len(), 2);
    }

    #[test]
    fn token_account_identity_is_address() {
        let address = Pubkey::new_unique();
        let a = TokenAccount {
            address,
            mint: Pubkey::new_unique(),
        };
        let b = TokenAccount {
            address,
            mint: Pubkey::new_unique(),
        };
        assert_eq!(a, b);
    }
}
