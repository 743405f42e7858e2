//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 缓存键格式化
//!
//! 键只由对象的身份 `<类型>#<ID>` 决定，主体上的关系字段被忽略。

use crate::model::{ObjectReference, SubjectReference};

/// 类型与 ID 之间的分隔符
pub const KEY_SEPARATOR: char = '#';

/// 计算对象引用的缓存键
///
/// # Panics
///
/// 引用缺失属于调用方的编程错误，格式正确的请求不会出现这种情况。
pub fn object_key(reference: Option<&ObjectReference>) -> String {
    match reference {
        Some(r) => format!("{}{}{}", r.object_type, KEY_SEPARATOR, r.object_id),
        None => panic!("can not build a cache key from a missing object reference"),
    }
}

/// 计算主体引用的缓存键，等同于其内部对象的键
///
/// # Panics
///
/// 主体缺失或主体内部对象缺失时 panic。
pub fn subject_key(reference: Option<&SubjectReference>) -> String {
    match reference.and_then(|s| s.object.as_ref()) {
        Some(object) => object_key(Some(object)),
        None => panic!("can not build a cache key from a missing subject reference"),
    }
}

/// 由资源类型和可选资源 ID 计算键；ID 为空时没有稳定的键
pub fn filter_key(resource_type: &str, optional_resource_id: &str) -> Option<String> {
    if optional_resource_id.is_empty() {
        None
    } else {
        Some(format!(
            "{}{}{}",
            resource_type, KEY_SEPARATOR, optional_resource_id
        ))
    }
}
