//! 外部账户（EOA）签名校验
//!
//! EIP-191 personal message 哈希 + secp256k1 公钥恢复。

use crate::address::Address;
use alloy_primitives::B256;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

pub use alloy_primitives::eip191_hash_message;

/// r || s || v
pub const RECOVERABLE_SIGNATURE_LEN: usize = 65;

/// 从 65 字节签名中恢复签名者地址
///
/// 支持 v ∈ {0, 1, 27, 28}，高位 s 会被规范化并翻转恢复位。
/// 任何格式问题或恢复失败都返回 `None`。
pub fn recover_address(prehash: &B256, signature: &[u8]) -> Option<Address> {
    if signature.len() != RECOVERABLE_SIGNATURE_LEN {
        return None;
    }

    let v = match signature[64] {
        0 | 1 => signature[64],
        27 | 28 => signature[64] - 27,
        _ => return None,
    };

    let mut sig = Signature::from_slice(&signature[..64]).ok()?;
    let mut recovery_id = RecoveryId::from_byte(v)?;

    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &sig, recovery_id).ok()?;
    Some(Address::from_public_key(&key))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use k256::ecdsa::SigningKey;

    /// 按钱包的 personal_sign 方式签名，返回 65 字节 r||s||v（v = 27/28）
    pub fn personal_sign(key: &SigningKey, message: &str) -> Vec<u8> {
        let (sig, recovery_id) = key
            .sign_prehash_recoverable(eip191_hash_message(message).as_slice())
            .unwrap();

        let mut out = sig.to_bytes().to_vec();
        out.push(27 + recovery_id.to_byte());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::personal_sign;
    use super::*;
    use alloy_primitives::{b256, keccak256};
    use k256::ecdsa::SigningKey;

    fn test_key(seed: u8) -> SigningKey {
        SigningKey::from_slice(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_eip191_hash_includes_length_prefix() {
        let expected = keccak256(b"\x19Ethereum Signed Message:\n5hello");

        assert_eq!(eip191_hash_message("hello"), expected);
        assert_ne!(eip191_hash_message("hello"), eip191_hash_message("hellO"));
        assert_eq!(
            eip191_hash_message("Hello World"),
            b256!("a1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2")
        );
    }

    #[test]
    fn test_recover_round_trip() {
        let key = test_key(7);
        let expected = Address::from_public_key(key.verifying_key());
        let message = "example.com wants you to sign in\nNonce: abc123";

        let signature = personal_sign(&key, message);
        assert_eq!(
            recover_address(&eip191_hash_message(message), &signature),
            Some(expected)
        );
    }

    #[test]
    fn test_recover_accepts_raw_recovery_byte() {
        let key = test_key(9);
        let expected = Address::from_public_key(key.verifying_key());
        let message = "Nonce: zz";

        let mut signature = personal_sign(&key, message);
        signature[64] -= 27;
        assert_eq!(
            recover_address(&eip191_hash_message(message), &signature),
            Some(expected)
        );
    }

    #[test]
    fn test_recover_normalizes_high_s() {
        let key = test_key(3);
        let expected = Address::from_public_key(key.verifying_key());
        let prehash = eip191_hash_message("Nonce: highs");

        let (sig, recovery_id) = key.sign_prehash_recoverable(prehash.as_slice()).unwrap();
        let (r, s) = sig.split_scalars();
        let high = Signature::from_scalars(*r.as_ref(), -*s.as_ref()).unwrap();
        let flipped = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());

        let mut signature = high.to_bytes().to_vec();
        signature.push(27 + flipped.to_byte());
        assert_eq!(recover_address(&prehash, &signature), Some(expected));
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let key = test_key(5);
        let expected = Address::from_public_key(key.verifying_key());

        let signature = personal_sign(&key, "Nonce: one");
        let recovered = recover_address(&eip191_hash_message("Nonce: two"), &signature);
        assert_ne!(recovered, Some(expected));
    }

    #[test]
    fn test_rejects_malformed_signatures() {
        let prehash = eip191_hash_message("Nonce: x");
        assert_eq!(recover_address(&prehash, &[0u8; 64]), None);
        assert_eq!(recover_address(&prehash, &[0u8; 65]), None);

        let mut signature = personal_sign(&test_key(1), "Nonce: x");
        signature[64] = 35;
        assert_eq!(recover_address(&prehash, &signature), None);
    }
}
