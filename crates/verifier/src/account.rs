//! 智能合约账户签名校验
//!
//! 智能合约账户没有固定公钥，需要通过节点调用账户合约的
//! ERC-1271 `isValidSignature(bytes32,bytes)` 入口。
//!
//! ERC-6492 包装的签名来自尚未部署的账户：账户已有代码时解包后走
//! ERC-1271；没有代码时通过一次不带 `to` 的 `eth_call` 在模拟环境中
//! 先调用工厂部署，再校验内部签名。

use crate::address::Address;
use alloy_primitives::{B256, Bytes, FixedBytes, U256, fixed_bytes, hex};
use alloy_sol_types::{SolCall, SolType, sol};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

sol! {
    /// ERC-1271 校验入口
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);

    /// ERC-6492 包装体：`abi.encode(factory, factoryCalldata, innerSig)`
    #[derive(Debug, PartialEq, Eq)]
    struct Sig6492 {
        address factory;
        bytes factoryCalldata;
        bytes innerSig;
    }
}

/// 合法签名时 `isValidSignature` 的返回值
pub const ERC1271_MAGIC_VALUE: FixedBytes<4> = fixed_bytes!("1626ba7e");

/// ERC-6492 签名后缀（32 字节）
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

/// 未部署账户的校验辅助合约（init code）
///
/// 参数追加在代码之后，每项一个字：
/// `factory | account | len(factoryCalldata) | len(checkCalldata) | factoryCalldata | checkCalldata`。
/// 先调用工厂（结果忽略），再 STATICCALL 账户的 `isValidSignature`，
/// 返回值与魔数相等时返回字 1，否则返回字 0。
const DEPLOYLESS_VALIDATOR: [u8; 99] = hex!(
    // 整段代码连同参数复制到 memory[0..]
    "38 6000 6000 39"
    // factory.call(factoryCalldata)
    "6000 6000 6100a3 51 6100e3 6000 610063 51 5a f1 50"
    // memory[0..32] = 0
    "6000 6000 52"
    // account.staticcall(checkCalldata)，返回值写入 memory[0..32]
    "6020 6000 6100c3 51 6100a3 51 6100e3 01 610083 51 5a fa"
    // success && memory[0..32] == 0x1626ba7e << 224
    "6000 51 7f1626ba7e00000000000000000000000000000000000000000000000000000000 14 16"
    // memory[0..32] = 结果，返回该字
    "6000 52 6020 6000 f3"
);

/// 辅助合约参数区的起始偏移
const DEPLOYLESS_ARGS_OFFSET: usize = 0x63;

/// 账户校验后端错误
///
/// 表示"无法完成校验"，与"校验失败"严格区分
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed node response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// 账户签名校验后端
///
/// `Ok(false)` 表示节点确认签名无效，`Err` 表示无法得出结论
#[async_trait]
pub trait AccountVerifier: Send + Sync {
    async fn is_valid_signature(
        &self,
        account: &Address,
        hash: &B256,
        signature: &[u8],
    ) -> Result<bool, BackendError>;
}

/// 基于以太坊 JSON-RPC 节点的实现
#[derive(Debug)]
pub struct JsonRpcAccountVerifier {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

impl RpcErrorObject {
    /// 执行 revert（EIP-1474 code 3 或节点的 revert 文本）
    fn is_revert(&self) -> bool {
        self.code == 3 || self.message.to_lowercase().contains("revert")
    }
}

impl From<RpcErrorObject> for BackendError {
    fn from(error: RpcErrorObject) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
        }
    }
}

impl JsonRpcAccountVerifier {
    /// # Arguments
    /// * `endpoint` - 节点 JSON-RPC 地址
    /// * `timeout` - 单次调用超时
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// 外层错误为传输问题，内层错误为节点返回的 JSON-RPC error 对象
    async fn call(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Result<Value, RpcErrorObject>, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let response: RpcResponse = response.json().await?;
        match (response.result, response.error) {
            (_, Some(error)) => Ok(Err(error)),
            (Some(result), None) => Ok(Ok(result)),
            (None, None) => Err(BackendError::MalformedResponse(
                "response carries neither result nor error".into(),
            )),
        }
    }

    async fn has_code(&self, account: &Address) -> Result<bool, BackendError> {
        let code = self
            .call("eth_getCode", json!([account.to_string(), "latest"]))
            .await??;

        let code = decode_hex_value(&code)?;
        Ok(!code.is_empty())
    }

    async fn erc1271_call(
        &self,
        account: &Address,
        hash: &B256,
        signature: Bytes,
    ) -> Result<bool, BackendError> {
        let data = isValidSignatureCall {
            hash: *hash,
            signature,
        }
        .abi_encode();
        let params = json!([
            {
                "to": account.to_string(),
                "data": format!("0x{}", hex::encode(data)),
            },
            "latest"
        ]);

        match self.call("eth_call", params).await? {
            Ok(value) => {
                let output = decode_hex_value(&value)?;
                Ok(isValidSignatureCall::abi_decode_returns(&output, false)
                    .is_ok_and(|ret| ret.magicValue == ERC1271_MAGIC_VALUE))
            }
            // 合约 revert 视为签名无效
            Err(error) if error.is_revert() => {
                debug!("isValidSignature reverted for {}: {}", account, error.message);
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// 未部署账户：在一次无 `to` 的 `eth_call` 中部署并校验
    async fn deployless_call(
        &self,
        account: &Address,
        hash: &B256,
        wrapped: &Sig6492,
    ) -> Result<bool, BackendError> {
        let data = encode_deployless_validation(account, hash, wrapped);
        let params = json!([
            { "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);

        match self.call("eth_call", params).await? {
            Ok(value) => {
                let output = decode_hex_value(&value)?;
                Ok(output.len() == 32 && U256::from_be_slice(&output) == U256::from(1))
            }
            Err(error) if error.is_revert() => {
                debug!(
                    "Deployless validation reverted for {} (factory {}): {}",
                    account, wrapped.factory, error.message
                );
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl AccountVerifier for JsonRpcAccountVerifier {
    async fn is_valid_signature(
        &self,
        account: &Address,
        hash: &B256,
        signature: &[u8],
    ) -> Result<bool, BackendError> {
        let deployed = self.has_code(account).await?;

        match decode_erc6492(signature) {
            Some(wrapped) if deployed => {
                debug!("Unwrapped ERC-6492 signature for deployed account {}", account);
                self.erc1271_call(account, hash, wrapped.innerSig).await
            }
            Some(wrapped) => {
                debug!(
                    "Account {} not deployed, validating through factory {}",
                    account, wrapped.factory
                );
                self.deployless_call(account, hash, &wrapped).await
            }
            None if deployed => {
                self.erc1271_call(account, hash, Bytes::copy_from_slice(signature))
                    .await
            }
            // 未部署且没有工厂信息，无法执行 isValidSignature
            None => {
                debug!("Account {} has no code, signature rejected", account);
                Ok(false)
            }
        }
    }
}

/// 解码 ERC-6492 签名：`abi.encode(address, bytes, bytes) ++ magic`
///
/// 不是 ERC-6492 格式时返回 `None`
pub fn decode_erc6492(signature: &[u8]) -> Option<Sig6492> {
    let body = signature.strip_suffix(&ERC6492_MAGIC_SUFFIX)?;
    <Sig6492 as SolType>::abi_decode_params(body, true).ok()
}

/// 构造未部署账户的校验调用数据：辅助合约代码 + 参数区
pub fn encode_deployless_validation(account: &Address, hash: &B256, wrapped: &Sig6492) -> Vec<u8> {
    let check = isValidSignatureCall {
        hash: *hash,
        signature: wrapped.innerSig.clone(),
    }
    .abi_encode();

    let factory_calldata = &wrapped.factoryCalldata;
    let mut data =
        Vec::with_capacity(DEPLOYLESS_VALIDATOR.len() + 128 + factory_calldata.len() + check.len());
    data.extend_from_slice(&DEPLOYLESS_VALIDATOR);
    data.extend_from_slice(wrapped.factory.into_word().as_slice());
    data.extend_from_slice(account.into_word().as_slice());
    data.extend_from_slice(&U256::from(factory_calldata.len()).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(check.len()).to_be_bytes::<32>());
    data.extend_from_slice(factory_calldata);
    data.extend_from_slice(&check);
    data
}

fn decode_hex_value(value: &Value) -> Result<Vec<u8>, BackendError> {
    let text = value
        .as_str()
        .ok_or_else(|| BackendError::MalformedResponse(format!("expected hex string, got {value}")))?;

    hex::decode(text)
        .map_err(|e| BackendError::MalformedResponse(format!("invalid hex in result: {e}")))
}
