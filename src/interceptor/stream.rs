//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 流式响应包装器：缓存流中第一条携带令牌的消息的令牌。
//!
//! 同一个流的所有消息共享同一个评估时间点，因此只需要写一次缓存。

use super::store_token;
use crate::backend::TokenCache;
use crate::model::EvaluatedAt;
use crate::service::ResponseStream;
use futures::future::BoxFuture;
use futures::{ready, FutureExt, Stream};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::Status;

enum State<T> {
    /// 尚未见到携带令牌的消息
    Open,
    /// 正在写缓存，写完后交出暂存的消息
    Storing {
        store: BoxFuture<'static, ()>,
        item: Option<T>,
    },
    /// 令牌已写入，后续消息直接透传
    Cached,
    /// 流已结束（EOF 或错误）
    Done,
}

/// 捕获令牌的流包装器
///
/// 由调用方独占，`cached` 状态只在接收路径上修改。
pub struct TokenCapturingStream<T> {
    inner: ResponseStream<T>,
    cache: Arc<dyn TokenCache>,
    key: String,
    service: Arc<str>,
    state: State<T>,
}

// 从不对 `T` 做结构化 pin，暂存的消息只会被整体移出。
impl<T> Unpin for TokenCapturingStream<T> {}

impl<T> TokenCapturingStream<T> {
    pub fn new(
        inner: ResponseStream<T>,
        cache: Arc<dyn TokenCache>,
        key: String,
        service: Arc<str>,
    ) -> Self {
        Self {
            inner,
            cache,
            key,
            service,
            state: State::Open,
        }
    }

    /// 缓存键
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 是否已经写入过令牌
    pub fn is_cached(&self) -> bool {
        matches!(self.state, State::Cached)
    }
}

impl<T> Stream for TokenCapturingStream<T>
where
    T: EvaluatedAt + Send + 'static,
{
    type Item = Result<T, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Done => return Poll::Ready(None),
                State::Storing { store, item } => {
                    ready!(store.poll_unpin(cx));
                    let item = item.take();
                    this.state = State::Cached;
                    if let Some(item) = item {
                        return Poll::Ready(Some(Ok(item)));
                    }
                }
                State::Open | State::Cached => {
                    let msg = match ready!(this.inner.as_mut().poll_next(cx)) {
                        None => {
                            this.state = State::Done;
                            return Poll::Ready(None);
                        }
                        Some(Err(status)) => {
                            this.state = State::Done;
                            return Poll::Ready(Some(Err(status)));
                        }
                        Some(Ok(msg)) => msg,
                    };

                    if matches!(this.state, State::Cached) {
                        return Poll::Ready(Some(Ok(msg)));
                    }

                    let token = match msg.evaluated_at() {
                        Some(t) if !t.token.is_empty() => t.token.clone(),
                        _ => return Poll::Ready(Some(Ok(msg))),
                    };

                    let cache = this.cache.clone();
                    let service = this.service.clone();
                    let key = this.key.clone();
                    let store = async move {
                        store_token(cache.as_ref(), &service, &key, &token).await;
                    }
                    .boxed();
                    this.state = State::Storing {
                        store,
                        item: Some(msg),
                    };
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = match &self.state {
            State::Storing { item: Some(_), .. } => 1,
            State::Done => return (0, Some(0)),
            _ => 0,
        };
        let (lower, upper) = self.inner.size_hint();
        (
            lower.saturating_add(pending),
            upper.and_then(|u| u.checked_add(pending)),
        )
    }
}
