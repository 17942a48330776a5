//! 以太坊账户地址
//!
//! 地址类型直接使用 `alloy_primitives::Address`。这里只补充请求入口的
//! 严格格式检查：必须带 `0x` 前缀，大小写不敏感，不校验 EIP-55。

pub use alloy_primitives::Address;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid address regex");
}

/// 地址格式错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account address, expected 0x followed by 40 hex characters")]
pub struct AddressParseError;

/// 解析请求中的账户地址
pub fn parse_address(s: &str) -> Result<Address, AddressParseError> {
    if !ADDRESS_RE.is_match(s) {
        return Err(AddressParseError);
    }
    s.parse().map_err(|_| AddressParseError)
}

/// 小写 hex 形式，与 nonce 作用域键一致
pub fn scope_key(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    #[test]
    fn test_parse_is_case_insensitive() {
        let a = parse_address("0xAbCdEF0000000000000000000000000000000001").unwrap();
        let b = parse_address("0xabcdef0000000000000000000000000000000001").unwrap();
        assert_eq!(a, b);
        assert_eq!(scope_key(&a), "0xabcdef0000000000000000000000000000000001");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for bad in [
            "",
            "0x",
            // alloy 自身接受无前缀形式，入口要求 0x
            "abcdef0000000000000000000000000000000001",
            "0xabcdef000000000000000000000000000000001",
            "0xabcdef00000000000000000000000000000000012",
            "0xzzcdef0000000000000000000000000000000001",
            " 0xabcdef0000000000000000000000000000000001",
        ] {
            assert_eq!(parse_address(bad), Err(AddressParseError), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_eip55_checksum_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address = parse_address(&expected.to_lowercase()).unwrap();
            assert_eq!(address.to_checksum(None), expected);
        }
    }

    #[test]
    fn test_address_from_known_private_key() {
        let secret =
            hex::decode("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
                .unwrap();
        let key = SigningKey::from_slice(&secret).unwrap();

        let address = Address::from_public_key(key.verifying_key());
        assert_eq!(
            address.to_checksum(None),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }
}
