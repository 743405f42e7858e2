//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了上游权限服务客户端的接口。

use crate::model::*;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tonic::Status;

/// 服务端流式响应
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send + 'static>>;

/// 权限服务客户端
///
/// 对应 Authzed v1 `PermissionsService`。gRPC 客户端、测试替身和
/// [`CachedPermissionsClient`](crate::interceptor::CachedPermissionsClient)
/// 都实现这个接口，因此缓存层可以透明地包裹任何实现。
#[async_trait]
pub trait PermissionsService: Send + Sync {
    /// 检查主体在资源上是否拥有某个权限
    async fn check_permission(
        &self,
        request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse, Status>;

    /// 展开资源上某个权限或关系的图结构（只展开一层）
    async fn expand_permission_tree(
        &self,
        request: ExpandPermissionTreeRequest,
    ) -> Result<ExpandPermissionTreeResponse, Status>;

    /// 按过滤条件读取关系
    async fn read_relationships(
        &self,
        request: ReadRelationshipsRequest,
    ) -> Result<ResponseStream<ReadRelationshipsResponse>, Status>;

    /// 查找主体可以访问的某类资源
    async fn lookup_resources(
        &self,
        request: LookupResourcesRequest,
    ) -> Result<ResponseStream<LookupResourcesResponse>, Status>;

    /// 查找对资源拥有权限的某类主体
    async fn lookup_subjects(
        &self,
        request: LookupSubjectsRequest,
    ) -> Result<ResponseStream<LookupSubjectsResponse>, Status>;

    /// 原子地写入或删除一组关系
    async fn write_relationships(
        &self,
        request: WriteRelationshipsRequest,
    ) -> Result<WriteRelationshipsResponse, Status>;
}

#[async_trait]
impl<T: PermissionsService + ?Sized> PermissionsService for Arc<T> {
    async fn check_permission(
        &self,
        request: CheckPermissionRequest,
    ) -> Result<CheckPermissionResponse, Status> {
        (**self).check_permission(request).await
    }

    async fn expand_permission_tree(
        &self,
        request: ExpandPermissionTreeRequest,
    ) -> Result<ExpandPermissionTreeResponse, Status> {
        (**self).expand_permission_tree(request).await
    }

    async fn read_relationships(
        &self,
        request: ReadRelationshipsRequest,
    ) -> Result<ResponseStream<ReadRelationshipsResponse>, Status> {
        (**self).read_relationships(request).await
    }

    async fn lookup_resources(
        &self,
        request: LookupResourcesRequest,
    ) -> Result<ResponseStream<LookupResourcesResponse>, Status> {
        (**self).lookup_resources(request).await
    }

    async fn lookup_subjects(
        &self,
        request: LookupSubjectsRequest,
    ) -> Result<ResponseStream<LookupSubjectsResponse>, Status> {
        (**self).lookup_subjects(request).await
    }

    async fn write_relationships(
        &self,
        request: WriteRelationshipsRequest,
    ) -> Result<WriteRelationshipsResponse, Status> {
        (**self).write_relationships(request).await
    }
}
