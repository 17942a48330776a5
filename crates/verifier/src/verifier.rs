//! SIWE 签名校验流程
//!
//! 每次校验：格式检查 → 提取 nonce → 消费 nonce → 密码学校验 → 返回地址。
//! nonce 在密码学校验之前被消费，无论签名是否有效，每次尝试都会烧掉一个 nonce。

use crate::account::AccountVerifier;
use crate::address::{Address, parse_address, scope_key};
use crate::eoa::{eip191_hash_message, recover_address};
use crate::error::{VerifyError, VerifyResult};
use crate::message::extract_nonce;
use siwe_nonce::NonceRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 账户校验后端的默认超时
pub const DEFAULT_ACCOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// SIWE 签名校验器
///
/// 自身不保存状态，所有状态都在注入的 [`NonceRegistry`] 中
#[derive(Clone)]
pub struct SiweVerifier {
    registry: Arc<NonceRegistry>,
    accounts: Option<Arc<dyn AccountVerifier>>,
    account_timeout: Duration,
}

impl std::fmt::Debug for SiweVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiweVerifier")
            .field("registry", &self.registry)
            .field("smart_accounts", &self.accounts.is_some())
            .field("account_timeout", &self.account_timeout)
            .finish()
    }
}

impl SiweVerifier {
    /// 只支持 EOA 签名的校验器
    pub fn new(registry: Arc<NonceRegistry>) -> Self {
        Self {
            registry,
            accounts: None,
            account_timeout: DEFAULT_ACCOUNT_TIMEOUT,
        }
    }

    /// 启用智能合约账户校验
    pub fn with_account_verifier(
        mut self,
        accounts: Arc<dyn AccountVerifier>,
        timeout: Duration,
    ) -> Self {
        self.accounts = Some(accounts);
        self.account_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<NonceRegistry> {
        &self.registry
    }

    pub fn supports_smart_accounts(&self) -> bool {
        self.accounts.is_some()
    }

    /// 校验签名消息，成功时返回已验证的地址
    pub async fn verify(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> VerifyResult<Address> {
        // 1. 格式检查
        let address =
            parse_address(address).map_err(|e| VerifyError::MalformedRequest(e.to_string()))?;
        if message.trim().is_empty() {
            return Err(VerifyError::MalformedRequest("message is empty".into()));
        }
        let signature = decode_signature(signature)?;

        // 2. 提取 nonce
        let nonce = extract_nonce(message).ok_or(VerifyError::NonceMissing)?;

        // 3. 消费 nonce，必须先于密码学校验
        let scope = self
            .registry
            .scope_for(Some(&scope_key(&address)))
            .ok_or_else(|| VerifyError::MalformedRequest("address is required".into()))?;
        if !self.registry.consume(&scope, nonce).await? {
            info!("Rejected sign-in for {}: nonce invalid or expired", address);
            return Err(VerifyError::NonceInvalidOrExpired);
        }

        // 4. 密码学校验
        let hash = eip191_hash_message(message);
        if recover_address(&hash, &signature) == Some(address) {
            debug!("EOA signature verified for {}", address);
            return Ok(address);
        }

        let valid = match &self.accounts {
            Some(accounts) => {
                let call = accounts.is_valid_signature(&address, &hash, &signature);
                match tokio::time::timeout(self.account_timeout, call).await {
                    Ok(Ok(valid)) => valid,
                    Ok(Err(e)) => {
                        warn!("Account verification backend failed for {}: {}", address, e);
                        return Err(VerifyError::VerificationUnavailable(e.to_string()));
                    }
                    Err(_) => {
                        warn!(
                            "Account verification backend timed out for {} after {:?}",
                            address,
                            self.account_timeout
                        );
                        return Err(VerifyError::VerificationUnavailable(
                            "request timed out".into(),
                        ));
                    }
                }
            }
            None => false,
        };

        if !valid {
            warn!(
                target: "siwe_verifier::security",
                "Invalid signature for {} (possible forgery attempt)",
                address
            );
            return Err(VerifyError::InvalidSignature);
        }

        // 5. 成功
        debug!("Smart account signature verified for {}", address);
        Ok(address)
    }
}

/// 解码 `0x` 前缀的 hex 签名
fn decode_signature(signature: &str) -> VerifyResult<Vec<u8>> {
    let digits = signature.strip_prefix("0x").ok_or_else(|| {
        VerifyError::MalformedRequest("signature must be 0x-prefixed hex".into())
    })?;
    if digits.is_empty() {
        return Err(VerifyError::MalformedRequest("signature is empty".into()));
    }

    hex::decode(digits)
        .map_err(|e| VerifyError::MalformedRequest(format!("signature is not valid hex: {e}")))
}
