//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 调用取消支持。
//!
//! 拦截器的所有操作都在调用方的 future 内完成，不会派生后台任务，
//! 因此丢弃 future 即可在下一个 `.await` 处放弃未完成的缓存操作和上游调用。
//! 需要把取消作为调用失败返回时，使用 [`with_cancellation`]。

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::debug;

/// 在取消令牌触发时放弃调用并返回 `Status::cancelled`
///
/// 写请求在清理缓存之后被取消是安全的：旧令牌已经删除，
/// 只是部分键可能没有重新填充。
pub async fn with_cancellation<F, T>(token: &CancellationToken, call: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("call cancelled by caller");
            Err(Status::cancelled("call cancelled by caller"))
        }
        res = call => res,
    }
}
