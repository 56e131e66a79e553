use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// Closed set of detail fields shared by every record and every version.
///
/// Declaration order is the canonical display and iteration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    ConstructionUnit,
    Description,
    IsNational,
    Alias,
    SystemTag,
    Cost,
    RunStatus,
    Vendor,
    IsAccepted,
    FirstBuiltAt,
    IsConnectedToShandong,
    UserLevel,
    Domain,
    AccessUrl,
    Deployment,
    UserCount,
    UserGroup,
    SecurityLevel,
    ContactPhone,
    Remark,
    ResponsibilityItems,
    ServiceItems,
    Contact,
    RelatedSystems,
}

impl FieldKey {
    pub const ALL: [Self; 24] = [
        Self::ConstructionUnit,
        Self::Description,
        Self::IsNational,
        Self::Alias,
        Self::SystemTag,
        Self::Cost,
        Self::RunStatus,
        Self::Vendor,
        Self::IsAccepted,
        Self::FirstBuiltAt,
        Self::IsConnectedToShandong,
        Self::UserLevel,
        Self::Domain,
        Self::AccessUrl,
        Self::Deployment,
        Self::UserCount,
        Self::UserGroup,
        Self::SecurityLevel,
        Self::ContactPhone,
        Self::Remark,
        Self::ResponsibilityItems,
        Self::ServiceItems,
        Self::Contact,
        Self::RelatedSystems,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConstructionUnit => "construction_unit",
            Self::Description => "description",
            Self::IsNational => "is_national",
            Self::Alias => "alias",
            Self::SystemTag => "system_tag",
            Self::Cost => "cost",
            Self::RunStatus => "run_status",
            Self::Vendor => "vendor",
            Self::IsAccepted => "is_accepted",
            Self::FirstBuiltAt => "first_built_at",
            Self::IsConnectedToShandong => "is_connected_to_shandong",
            Self::UserLevel => "user_level",
            Self::Domain => "domain",
            Self::AccessUrl => "access_url",
            Self::Deployment => "deployment",
            Self::UserCount => "user_count",
            Self::UserGroup => "user_group",
            Self::SecurityLevel => "security_level",
            Self::ContactPhone => "contact_phone",
            Self::Remark => "remark",
            Self::ResponsibilityItems => "responsibility_items",
            Self::ServiceItems => "service_items",
            Self::Contact => "contact",
            Self::RelatedSystems => "related_systems",
        }
    }

    /// Human-readable label shown next to the field.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ConstructionUnit => "建设单位",
            Self::Description => "系统功能描述",
            Self::IsNational => "是否国家建设省级使用",
            Self::Alias => "曾用名或别名",
            Self::SystemTag => "系统标识",
            Self::Cost => "总建设费用(万元)",
            Self::RunStatus => "运行情况",
            Self::Vendor => "承建厂商",
            Self::IsAccepted => "是否验收",
            Self::FirstBuiltAt => "首次建成时间",
            Self::IsConnectedToShandong => "是否接入爱山东",
            Self::UserLevel => "用户层级",
            Self::Domain => "应用领域",
            Self::AccessUrl => "访问地址",
            Self::Deployment => "部署云节点",
            Self::UserCount => "用户数量",
            Self::UserGroup => "使用群体",
            Self::SecurityLevel => "安全保护等级",
            Self::ContactPhone => "联系电话",
            Self::Remark => "备注",
            Self::ResponsibilityItems => "权责事项",
            Self::ServiceItems => "政务服务事项",
            Self::Contact => "联系人",
            Self::RelatedSystems => "对应系统",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

/// Scalar value of one detail field as seen by the diff engine.
///
/// An empty string and a missing number both read as [`FieldValue::Empty`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Empty,
}

impl FieldValue {
    fn from_text(value: &str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(lhs), Self::Text(rhs)) => lhs == rhs,
            // Bitwise, so a NaN cost still equals itself.
            (Self::Number(lhs), Self::Number(rhs)) => lhs.to_bits() == rhs.to_bits(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordDetail {
    pub construction_unit: String,
    pub description: String,
    pub is_national: String,
    pub alias: String,
    pub system_tag: String,
    /// Total construction cost in units of 10k CNY.
    pub cost: Option<f64>,
    pub run_status: String,
    pub vendor: String,
    pub is_accepted: String,
    pub first_built_at: String,
    pub is_connected_to_shandong: String,
    pub user_level: String,
    pub domain: String,
    pub access_url: String,
    pub deployment: String,
    pub user_count: String,
    pub user_group: String,
    pub security_level: String,
    pub contact_phone: String,
    pub remark: String,
    pub responsibility_items: String,
    pub service_items: String,
    pub contact: String,
    pub related_systems: String,
}

impl RecordDetail {
    #[must_use]
    pub fn value(&self, key: FieldKey) -> FieldValue {
        let text = match key {
            FieldKey::Cost => return self.cost.map_or(FieldValue::Empty, FieldValue::Number),
            FieldKey::ConstructionUnit => &self.construction_unit,
            FieldKey::Description => &self.description,
            FieldKey::IsNational => &self.is_national,
            FieldKey::Alias => &self.alias,
            FieldKey::SystemTag => &self.system_tag,
            FieldKey::RunStatus => &self.run_status,
            FieldKey::Vendor => &self.vendor,
            FieldKey::IsAccepted => &self.is_accepted,
            FieldKey::FirstBuiltAt => &self.first_built_at,
            FieldKey::IsConnectedToShandong => &self.is_connected_to_shandong,
            FieldKey::UserLevel => &self.user_level,
            FieldKey::Domain => &self.domain,
            FieldKey::AccessUrl => &self.access_url,
            FieldKey::Deployment => &self.deployment,
            FieldKey::UserCount => &self.user_count,
            FieldKey::UserGroup => &self.user_group,
            FieldKey::SecurityLevel => &self.security_level,
            FieldKey::ContactPhone => &self.contact_phone,
            FieldKey::Remark => &self.remark,
            FieldKey::ResponsibilityItems => &self.responsibility_items,
            FieldKey::ServiceItems => &self.service_items,
            FieldKey::Contact => &self.contact,
            FieldKey::RelatedSystems => &self.related_systems,
        };
        FieldValue::from_text(text)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Db,
    Api,
    File,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Db => "DB",
            Self::Api => "API",
            Self::File => "FILE",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DB" => Some(Self::Db),
            "API" => Some(Self::Api),
            "FILE" => Some(Self::File),
            _ => None,
        }
    }
}

/// Linked data resource of one version. Identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ResourceEntry {
    pub id: ResourceId,
    pub name: String,
    pub count: u64,
    pub kind: ResourceKind,
}
