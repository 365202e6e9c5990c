//! Rule families (spec.md §3). Each family shares `RuleMeta` by composition
//! rather than inheritance.

use std::collections::{HashMap, HashSet};

use crate::model::feature::GeometryKind;

#[derive(Debug, Clone)]
pub struct RuleMeta {
    pub rule_id: String,
    pub enabled: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Numeric(u8, u8),
    Text(u32),
    Char(u32),
    Date,
}

#[derive(Debug, Clone)]
pub struct TableRule {
    pub meta: RuleMeta,
    pub table_id: String,
    pub table_name: String,
    pub expected_geom_type: GeometryKind,
    pub expected_epsg: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SchemaRule {
    pub meta: RuleMeta,
    pub table_id: String,
    pub field_name: String,
    pub data_type: DataType,
    pub is_pk: bool,
    pub is_uk: bool,
    pub is_fk: bool,
    pub is_not_null: bool,
    pub ref_table: Option<String>,
    pub ref_field: Option<String>,
}

/// Geometry check families (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckType {
    Duplicate,
    Overlap,
    SelfIntersection,
    Sliver,
    ShortObject,
    SmallArea,
    HoleTopology,
    MinVertexCount,
    Spike,
    SelfOverlap,
    UnderOverShoot,
}

impl CheckType {
    pub const ALL: [CheckType; 11] = [
        CheckType::Duplicate,
        CheckType::Overlap,
        CheckType::SelfIntersection,
        CheckType::Sliver,
        CheckType::ShortObject,
        CheckType::SmallArea,
        CheckType::HoleTopology,
        CheckType::MinVertexCount,
        CheckType::Spike,
        CheckType::SelfOverlap,
        CheckType::UnderOverShoot,
    ];

    pub fn code(self) -> &'static str {
        match self {
            CheckType::Duplicate => "GEO_DUPLICATE",
            CheckType::Overlap => "GEO_OVERLAP",
            CheckType::SelfIntersection => "GEO_SELF_INTERSECTION",
            CheckType::Sliver => "GEO_SLIVER",
            CheckType::ShortObject => "GEO_SHORT_OBJECT",
            CheckType::SmallArea => "GEO_SMALL_AREA",
            CheckType::HoleTopology => "GEO_HOLE_TOPOLOGY",
            CheckType::MinVertexCount => "GEO_MIN_VERTEX_COUNT",
            CheckType::Spike => "GEO_SPIKE",
            CheckType::SelfOverlap => "GEO_SELF_OVERLAP",
            CheckType::UnderOverShoot => "GEO_UNDER_OVER_SHOOT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeometryRule {
    pub meta: RuleMeta,
    pub table_id: String,
    pub geom_type: GeometryKind,
    pub flags: HashSet<CheckType>,
    /// Raw filter expression (spec.md §4.2), compiled once by the stage
    /// runner before dispatch.
    pub filter: Option<String>,
}

/// Attribute check families (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeCheckType {
    NotNull,
    NotZero,
    Range,
    NumericEquals,
    MultipleOf,
    IfCodeThenNotNullAll,
    IfCodeThenNull,
    IfCodeThenNumericEquals,
    IfCodeThenBetweenExclusive,
    IfCodeThenGreaterThanOrEqual,
    IfCodeThenMultipleOf,
    Regex,
    KoreanTypo,
    CodeList,
    BuildHeightBaseVsMax,
    BuildHeightMaxVsFacility,
    BuildHeightLowestVsBase,
}

impl AttributeCheckType {
    pub const ALL: [AttributeCheckType; 17] = [
        AttributeCheckType::NotNull,
        AttributeCheckType::NotZero,
        AttributeCheckType::Range,
        AttributeCheckType::NumericEquals,
        AttributeCheckType::MultipleOf,
        AttributeCheckType::IfCodeThenNotNullAll,
        AttributeCheckType::IfCodeThenNull,
        AttributeCheckType::IfCodeThenNumericEquals,
        AttributeCheckType::IfCodeThenBetweenExclusive,
        AttributeCheckType::IfCodeThenGreaterThanOrEqual,
        AttributeCheckType::IfCodeThenMultipleOf,
        AttributeCheckType::Regex,
        AttributeCheckType::KoreanTypo,
        AttributeCheckType::CodeList,
        AttributeCheckType::BuildHeightBaseVsMax,
        AttributeCheckType::BuildHeightMaxVsFacility,
        AttributeCheckType::BuildHeightLowestVsBase,
    ];

    pub fn code(self) -> &'static str {
        match self {
            AttributeCheckType::NotNull => "ATTR_NOT_NULL",
            AttributeCheckType::NotZero => "ATTR_NOT_ZERO",
            AttributeCheckType::Range => "ATTR_RANGE",
            AttributeCheckType::NumericEquals => "ATTR_NUMERIC_EQUALS",
            AttributeCheckType::MultipleOf => "ATTR_MULTIPLE_OF",
            AttributeCheckType::IfCodeThenNotNullAll => "ATTR_IF_CODE_THEN_NOT_NULL_ALL",
            AttributeCheckType::IfCodeThenNull => "ATTR_IF_CODE_THEN_NULL",
            AttributeCheckType::IfCodeThenNumericEquals => "ATTR_IF_CODE_THEN_NUMERIC_EQUALS",
            AttributeCheckType::IfCodeThenBetweenExclusive => "ATTR_IF_CODE_THEN_BETWEEN_EXCLUSIVE",
            AttributeCheckType::IfCodeThenGreaterThanOrEqual => "ATTR_IF_CODE_THEN_GREATER_THAN_OR_EQUAL",
            AttributeCheckType::IfCodeThenMultipleOf => "ATTR_IF_CODE_THEN_MULTIPLE_OF",
            AttributeCheckType::Regex => "ATTR_REGEX",
            AttributeCheckType::KoreanTypo => "ATTR_KOREAN_TYPO",
            AttributeCheckType::CodeList => "ATTR_CODE_LIST",
            AttributeCheckType::BuildHeightBaseVsMax => "ATTR_BUILD_HEIGHT_BASE_VS_MAX",
            AttributeCheckType::BuildHeightMaxVsFacility => "ATTR_BUILD_HEIGHT_MAX_VS_FACILITY",
            AttributeCheckType::BuildHeightLowestVsBase => "ATTR_BUILD_HEIGHT_LOWEST_VS_BASE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub meta: RuleMeta,
    /// May be `"*"`, expanded to all non-excluded layers at dispatch time.
    pub table_id: String,
    pub field: String,
    pub check_type: AttributeCheckType,
    pub params: HashMap<String, String>,
}

/// Relation check families (spec.md §4.5), 27 strategies dispatched by
/// `CaseType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseType {
    PolygonNotOverlap,
    PolygonWithinPolygon,
    PolygonNotWithinPolygon,
    PolygonMissingLine,
    PolygonContainsObjects,
    PolygonBoundaryMatch,
    PolygonIntersectionWithAttribute,
    PolygonNotIntersectLine,
    LineWithinPolygon,
    LineEndpointWithinPolygon,
    PolygonNotContainPoint,
    PointInsidePolygon,
    LineConnectivity,
    LineConnectivityWithFilter,
    LineDisconnection,
    LineDisconnectionWithAttribute,
    DefectiveConnection,
    LineIntersectionWithAttribute,
    RoadSharpBend,
    ContourSharpBend,
    ContourIntersection,
    CenterlineAttributeMismatch,
    ConnectedLinesSameAttribute,
    AttributeSpatialMismatch,
    BridgeRiverNameMatch,
    PointSpacingCheck,
    HoleDuplicateCheck,
}

impl CaseType {
    pub const ALL: [CaseType; 27] = [
        CaseType::PolygonNotOverlap,
        CaseType::PolygonWithinPolygon,
        CaseType::PolygonNotWithinPolygon,
        CaseType::PolygonMissingLine,
        CaseType::PolygonContainsObjects,
        CaseType::PolygonBoundaryMatch,
        CaseType::PolygonIntersectionWithAttribute,
        CaseType::PolygonNotIntersectLine,
        CaseType::LineWithinPolygon,
        CaseType::LineEndpointWithinPolygon,
        CaseType::PolygonNotContainPoint,
        CaseType::PointInsidePolygon,
        CaseType::LineConnectivity,
        CaseType::LineConnectivityWithFilter,
        CaseType::LineDisconnection,
        CaseType::LineDisconnectionWithAttribute,
        CaseType::DefectiveConnection,
        CaseType::LineIntersectionWithAttribute,
        CaseType::RoadSharpBend,
        CaseType::ContourSharpBend,
        CaseType::ContourIntersection,
        CaseType::CenterlineAttributeMismatch,
        CaseType::ConnectedLinesSameAttribute,
        CaseType::AttributeSpatialMismatch,
        CaseType::BridgeRiverNameMatch,
        CaseType::PointSpacingCheck,
        CaseType::HoleDuplicateCheck,
    ];

    pub fn code(self) -> &'static str {
        match self {
            CaseType::PolygonNotOverlap => "REL_POLYGON_NOT_OVERLAP",
            CaseType::PolygonWithinPolygon => "REL_POLYGON_WITHIN_POLYGON",
            CaseType::PolygonNotWithinPolygon => "REL_POLYGON_NOT_WITHIN_POLYGON",
            CaseType::PolygonMissingLine => "REL_POLYGON_MISSING_LINE",
            CaseType::PolygonContainsObjects => "REL_POLYGON_CONTAINS_OBJECTS",
            CaseType::PolygonBoundaryMatch => "REL_POLYGON_BOUNDARY_MATCH",
            CaseType::PolygonIntersectionWithAttribute => "REL_POLYGON_INTERSECTION_WITH_ATTRIBUTE",
            CaseType::PolygonNotIntersectLine => "REL_POLYGON_NOT_INTERSECT_LINE",
            CaseType::LineWithinPolygon => "REL_LINE_WITHIN_POLYGON",
            CaseType::LineEndpointWithinPolygon => "REL_LINE_ENDPOINT_WITHIN_POLYGON",
            CaseType::PolygonNotContainPoint => "REL_POLYGON_NOT_CONTAIN_POINT",
            CaseType::PointInsidePolygon => "REL_POINT_INSIDE_POLYGON",
            CaseType::LineConnectivity => "REL_LINE_CONNECTIVITY",
            CaseType::LineConnectivityWithFilter => "REL_LINE_CONNECTIVITY_WITH_FILTER",
            CaseType::LineDisconnection => "REL_LINE_DISCONNECTION",
            CaseType::LineDisconnectionWithAttribute => "REL_LINE_DISCONNECTION_WITH_ATTRIBUTE",
            CaseType::DefectiveConnection => "REL_DEFECTIVE_CONNECTION",
            CaseType::LineIntersectionWithAttribute => "REL_LINE_INTERSECTION_WITH_ATTRIBUTE",
            CaseType::RoadSharpBend => "REL_ROAD_SHARP_BEND",
            CaseType::ContourSharpBend => "REL_CONTOUR_SHARP_BEND",
            CaseType::ContourIntersection => "REL_CONTOUR_INTERSECTION",
            CaseType::CenterlineAttributeMismatch => "REL_CENTERLINE_ATTRIBUTE_MISMATCH",
            CaseType::ConnectedLinesSameAttribute => "REL_CONNECTED_LINES_SAME_ATTRIBUTE",
            CaseType::AttributeSpatialMismatch => "REL_ATTRIBUTE_SPATIAL_MISMATCH",
            CaseType::BridgeRiverNameMatch => "REL_BRIDGE_RIVER_NAME_MATCH",
            CaseType::PointSpacingCheck => "REL_POINT_SPACING_CHECK",
            CaseType::HoleDuplicateCheck => "REL_HOLE_DUPLICATE_CHECK",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationRule {
    pub meta: RuleMeta,
    pub case_type: CaseType,
    pub main_table: String,
    /// May be `"*"`.
    pub related_table: String,
    pub filter: Option<String>,
    pub tolerance: f64,
    pub params: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_type_all_has_eleven_entries() {
        assert_eq!(CheckType::ALL.len(), 11);
    }

    #[test]
    fn case_type_all_has_twenty_seven_entries() {
        assert_eq!(CaseType::ALL.len(), 27);
    }

    #[test]
    fn check_type_codes_are_unique() {
        let codes: HashSet<&str> = CheckType::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), CheckType::ALL.len());
    }

    #[test]
    fn case_type_codes_are_unique() {
        let codes: HashSet<&str> = CaseType::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), CaseType::ALL.len());
    }

    #[test]
    fn attribute_check_type_all_has_seventeen_entries() {
        assert_eq!(AttributeCheckType::ALL.len(), 17);
    }

    #[test]
    fn attribute_check_type_codes_are_unique() {
        let codes: HashSet<&str> = AttributeCheckType::ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), AttributeCheckType::ALL.len());
    }
}
