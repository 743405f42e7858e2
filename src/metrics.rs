//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了令牌缓存的指标收集功能。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// 指标收集器
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    /// key: "service:op:result"
    pub requests_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 操作耗时
    /// key: "service:op" -> (total_duration_secs, count)
    pub operation_duration: Arc<Mutex<HashMap<String, (f64, u64)>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Metrics {
    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `service` - 服务名称
    /// * `op` - 操作类型（lookup/store/invalidate）
    /// * `result` - 操作结果（hit/miss/success/error）
    pub fn record_request(&self, service: &str, op: &str, result: &str) {
        let key = format!("{}:{}:{}", service, op, result);
        *lock(&self.requests_total).entry(key).or_insert(0) += 1;
    }

    /// 记录操作耗时
    pub fn record_duration(&self, service: &str, op: &str, duration_secs: f64) {
        let key = format!("{}:{}", service, op);
        let mut map = lock(&self.operation_duration);
        let entry = map.entry(key).or_insert((0.0, 0));
        entry.0 += duration_secs;
        entry.1 += 1;
    }

    /// 读取某个计数
    pub fn request_count(&self, service: &str, op: &str, result: &str) -> u64 {
        let key = format!("{}:{}:{}", service, op, result);
        lock(&self.requests_total).get(&key).copied().unwrap_or(0)
    }
}

/// 获取指标字符串
///
/// 以Prometheus文本格式返回所有指标
pub fn get_metrics_string() -> String {
    render(&GLOBAL_METRICS)
}

fn render(metrics: &Metrics) -> String {
    let reqs = lock(&metrics.requests_total);
    let dur = lock(&metrics.operation_duration);

    let mut lines: Vec<String> = Vec::new();
    for (k, v) in reqs.iter() {
        let parts: Vec<&str> = k.splitn(3, ':').collect();
        if parts.len() == 3 {
            lines.push(format!(
                "zedcache_requests_total{{service=\"{}\", operation=\"{}\", result=\"{}\"}} {}",
                parts[0], parts[1], parts[2], v
            ));
        }
    }
    for (k, (total, count)) in dur.iter() {
        let parts: Vec<&str> = k.splitn(2, ':').collect();
        if parts.len() == 2 {
            lines.push(format!(
                "zedcache_operation_duration_seconds_sum{{service=\"{}\", operation=\"{}\"}} {}",
                parts[0], parts[1], total
            ));
            lines.push(format!(
                "zedcache_operation_duration_seconds_count{{service=\"{}\", operation=\"{}\"}} {}",
                parts[0], parts[1], count
            ));
        }
    }
    lines.sort();

    let mut output = lines.join("\n");
    if !output.is_empty() {
        output.push('\n');
    }
    output
}
