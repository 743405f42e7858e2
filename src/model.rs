//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了权限服务（SpiceDB / Authzed v1 API）的消息类型。
//!
//! 字段布局与生成的 RPC 类型保持一致：所有消息类型的字段都是 `Option`。

/// ZedToken：标识服务端写入历史中某个时间点的不透明令牌
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ZedToken {
    pub token: String,
}

impl ZedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// 对象引用（类型 + ID）
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ObjectReference {
    pub object_type: String,
    pub object_id: String,
}

impl ObjectReference {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            object_id: object_id.into(),
        }
    }
}

/// 主体引用，包装一个对象引用和可选的关系
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SubjectReference {
    pub object: Option<ObjectReference>,
    pub optional_relation: String,
}

impl SubjectReference {
    pub fn new(object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            object: Some(ObjectReference::new(object_type, object_id)),
            optional_relation: String::new(),
        }
    }
}

/// 一致性要求
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// 服务端自行选择（上游的默认值）
    MinimizeLatency(bool),
    /// 结果至少与给定令牌一样新
    AtLeastAsFresh(ZedToken),
    /// 结果精确对应给定令牌的快照
    AtExactSnapshot(ZedToken),
    /// 使用服务端最新状态
    FullyConsistent(bool),
}

/// 请求携带的一致性字段
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Consistency {
    pub requirement: Option<Requirement>,
}

impl Consistency {
    pub fn fully_consistent() -> Self {
        Self {
            requirement: Some(Requirement::FullyConsistent(true)),
        }
    }

    pub fn at_least_as_fresh(token: impl Into<String>) -> Self {
        Self {
            requirement: Some(Requirement::AtLeastAsFresh(ZedToken::new(token))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Permissionship {
    #[default]
    Unspecified,
    NoPermission,
    HasPermission,
    ConditionalPermission,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relationship {
    pub resource: Option<ObjectReference>,
    pub relation: String,
    pub subject: Option<SubjectReference>,
}

impl Relationship {
    pub fn new(resource: ObjectReference, relation: impl Into<String>, subject: SubjectReference) -> Self {
        Self {
            resource: Some(resource),
            relation: relation.into(),
            subject: Some(subject),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubjectFilter {
    pub subject_type: String,
    pub optional_subject_id: String,
    pub optional_relation: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationshipFilter {
    pub resource_type: String,
    pub optional_resource_id: String,
    pub optional_relation: String,
    pub optional_subject_filter: Option<SubjectFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckPermissionRequest {
    pub consistency: Option<Consistency>,
    pub resource: Option<ObjectReference>,
    pub permission: String,
    pub subject: Option<SubjectReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckPermissionResponse {
    pub checked_at: Option<ZedToken>,
    pub permissionship: Permissionship,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpandPermissionTreeRequest {
    pub consistency: Option<Consistency>,
    pub resource: Option<ObjectReference>,
    pub permission: String,
}

/// 展开后的权限树节点
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionRelationshipTree {
    pub expanded_object: Option<ObjectReference>,
    pub expanded_relation: String,
    pub children: Vec<PermissionRelationshipTree>,
    pub subjects: Vec<SubjectReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpandPermissionTreeResponse {
    pub expanded_at: Option<ZedToken>,
    pub tree_root: Option<PermissionRelationshipTree>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRelationshipsRequest {
    pub consistency: Option<Consistency>,
    pub relationship_filter: Option<RelationshipFilter>,
    pub optional_limit: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRelationshipsResponse {
    pub read_at: Option<ZedToken>,
    pub relationship: Option<Relationship>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupResourcesRequest {
    pub consistency: Option<Consistency>,
    pub resource_object_type: String,
    pub permission: String,
    pub subject: Option<SubjectReference>,
    pub optional_limit: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupResourcesResponse {
    pub looked_up_at: Option<ZedToken>,
    pub resource_object_id: String,
    pub permissionship: Permissionship,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupSubjectsRequest {
    pub consistency: Option<Consistency>,
    pub resource: Option<ObjectReference>,
    pub permission: String,
    pub subject_object_type: String,
    pub optional_subject_relation: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedSubject {
    pub subject_object_id: String,
    pub permissionship: Permissionship,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupSubjectsResponse {
    pub looked_up_at: Option<ZedToken>,
    pub subject: Option<ResolvedSubject>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Operation {
    #[default]
    Unspecified,
    Create,
    Touch,
    Delete,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelationshipUpdate {
    pub operation: Operation,
    pub relationship: Option<Relationship>,
}

impl RelationshipUpdate {
    pub fn new(operation: Operation, relationship: Relationship) -> Self {
        Self {
            operation,
            relationship: Some(relationship),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PreconditionOperation {
    #[default]
    Unspecified,
    MustNotMatch,
    MustMatch,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Precondition {
    pub operation: PreconditionOperation,
    pub filter: Option<RelationshipFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteRelationshipsRequest {
    pub updates: Vec<RelationshipUpdate>,
    pub optional_preconditions: Vec<Precondition>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteRelationshipsResponse {
    pub written_at: Option<ZedToken>,
}

/// 携带"评估时间点"令牌的响应
pub trait EvaluatedAt {
    /// 返回响应中的令牌，缺失时返回 `None`
    fn evaluated_at(&self) -> Option<&ZedToken>;
}

impl EvaluatedAt for CheckPermissionResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.checked_at.as_ref()
    }
}

impl EvaluatedAt for ExpandPermissionTreeResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.expanded_at.as_ref()
    }
}

impl EvaluatedAt for ReadRelationshipsResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.read_at.as_ref()
    }
}

impl EvaluatedAt for LookupResourcesResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.looked_up_at.as_ref()
    }
}

impl EvaluatedAt for LookupSubjectsResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.looked_up_at.as_ref()
    }
}

impl EvaluatedAt for WriteRelationshipsResponse {
    fn evaluated_at(&self) -> Option<&ZedToken> {
        self.written_at.as_ref()
    }
}
