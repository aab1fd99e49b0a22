//! Earth Engine expression graphs.
//!
//! The REST API evaluates an `Expression`: a map of named `ValueNode`s plus
//! the name of the result node. Nodes are constants, function invocations
//! from the algorithm catalogue, dictionaries, references to other nodes, or
//! function definitions (used for `Collection.map`).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aoi::Polygon;
use crate::config::QueryConfig;
use crate::model::{BAND_VH, BAND_VV, DS_FORMAT, EE_DATE_FORMAT, INSTRUMENT_MODE_IW, S1_COLLECTION};

/// Argument name bound to each image inside the mapped RVI function.
const MAPPING_VAR: &str = "_MAPPING_VAR_0_0";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueNode {
    ConstantValue(serde_json::Value),
    FunctionInvocationValue(FunctionInvocation),
    DictionaryValue(DictionaryValue),
    ArgumentReference(String),
    ValueReference(String),
    FunctionDefinitionValue(FunctionDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub function_name: String,
    pub arguments: BTreeMap<String, ValueNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DictionaryValue {
    pub values: BTreeMap<String, ValueNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub argument_names: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    pub result: String,
    pub values: BTreeMap<String, ValueNode>,
}

// ---------------------------------------------------------------------------
// Node constructors
// ---------------------------------------------------------------------------

pub fn constant(value: impl Into<serde_json::Value>) -> ValueNode {
    ValueNode::ConstantValue(value.into())
}

/// Invokes a catalogue function with named arguments.
pub fn invoke<const N: usize>(function_name: &str, arguments: [(&str, ValueNode); N]) -> ValueNode {
    ValueNode::FunctionInvocationValue(FunctionInvocation {
        function_name: function_name.to_string(),
        arguments: arguments
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    })
}

pub fn dictionary<const N: usize>(entries: [(&str, ValueNode); N]) -> ValueNode {
    ValueNode::DictionaryValue(DictionaryValue {
        values: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    })
}

fn date(d: NaiveDate) -> ValueNode {
    invoke("Date", [("value", constant(d.format(DS_FORMAT).to_string()))])
}

// ---------------------------------------------------------------------------
// Sentinel-1 RVI query
// ---------------------------------------------------------------------------

pub fn polygon_geometry(polygon: &Polygon) -> ValueNode {
    invoke(
        "GeometryConstructors.Polygon",
        [("coordinates", constant(polygon.coordinates_json()))],
    )
}

fn filter_equals(field: &str, value: &str) -> ValueNode {
    invoke(
        "Filter.equals",
        [("leftField", constant(field)), ("rightValue", constant(value))],
    )
}

fn filter_list_contains(field: &str, value: &str) -> ValueNode {
    invoke(
        "Filter.listContains",
        [("leftField", constant(field)), ("rightValue", constant(value))],
    )
}

fn filter_collection(collection: ValueNode, filter: ValueNode) -> ValueNode {
    invoke("Collection.filter", [("collection", collection), ("filter", filter)])
}

/// The Sentinel-1 GRD collection restricted to the AOI, date range, IW
/// mode, dual VV+VH polarisation and one orbit direction.
pub fn filtered_s1_collection(polygon: &Polygon, query: &QueryConfig) -> ValueNode {
    let geometry = polygon_geometry(polygon);

    let filters = [
        invoke(
            "Filter.intersects",
            [("leftField", constant(".all")), ("rightValue", geometry)],
        ),
        invoke(
            "Filter.dateRangeContains",
            [
                (
                    "leftValue",
                    invoke(
                        "DateRange",
                        [("start", date(query.start_date)), ("end", date(query.end_date))],
                    ),
                ),
                ("rightField", constant("system:time_start")),
            ],
        ),
        filter_equals("instrumentMode", INSTRUMENT_MODE_IW),
        filter_list_contains("transmitterReceiverPolarisation", BAND_VV),
        filter_list_contains("transmitterReceiverPolarisation", BAND_VH),
        filter_equals("orbitProperties_pass", query.orbit_pass.as_str()),
    ];

    filters.into_iter().fold(
        invoke("ImageCollection.load", [("id", constant(S1_COLLECTION))]),
        filter_collection,
    )
}

fn select_band(image: ValueNode, band: &str) -> ValueNode {
    invoke(
        "Image.select",
        [("input", image), ("bandSelectors", constant(vec![band]))],
    )
}

fn image_op(op: &str, lhs: ValueNode, rhs: ValueNode) -> ValueNode {
    invoke(op, [("image1", lhs), ("image2", rhs)])
}

/// Body of the per-image function: a geometry-less feature carrying the
/// acquisition date and the AOI mean of `4·VH / (VV + VH)`.
fn rvi_feature(polygon: &Polygon, scale: f64) -> ValueNode {
    let image = || ValueNode::ArgumentReference(MAPPING_VAR.to_string());

    let ds = invoke(
        "Date.format",
        [
            (
                "date",
                invoke(
                    "Date",
                    [(
                        "value",
                        invoke(
                            "Element.get",
                            [("object", image()), ("property", constant("system:time_start"))],
                        ),
                    )],
                ),
            ),
            ("format", constant(EE_DATE_FORMAT)),
        ],
    );

    let vv = select_band(image(), BAND_VV);
    let vh = select_band(image(), BAND_VH);
    let four = invoke("Image.constant", [("value", constant(4))]);
    let rvi = image_op(
        "Image.divide",
        image_op("Image.multiply", vh.clone(), four),
        image_op("Image.add", vv, vh),
    );

    let mean_rvi = invoke(
        "Dictionary.get",
        [
            (
                "dictionary",
                invoke(
                    "Image.reduceRegion",
                    [
                        ("image", rvi),
                        ("reducer", invoke("Reducer.mean", [])),
                        ("geometry", polygon_geometry(polygon)),
                        ("scale", constant(scale)),
                    ],
                ),
            ),
            ("key", constant(BAND_VH)),
        ],
    );

    invoke(
        "Feature",
        [
            ("geometry", constant(serde_json::Value::Null)),
            ("metadata", dictionary([("ds", ds), ("y", mean_rvi)])),
        ],
    )
}

/// Expression evaluating to a FeatureCollection with one `{ds, y}` feature
/// per matching scene.
pub fn rvi_time_series(polygon: &Polygon, query: &QueryConfig) -> Expression {
    let mapped = invoke(
        "Collection.map",
        [
            ("collection", filtered_s1_collection(polygon, query)),
            (
                "baseAlgorithm",
                ValueNode::FunctionDefinitionValue(FunctionDefinition {
                    argument_names: vec![MAPPING_VAR.to_string()],
                    body: "1".to_string(),
                }),
            ),
        ],
    );

    Expression {
        result: "0".to_string(),
        values: BTreeMap::from([
            ("0".to_string(), mapped),
            ("1".to_string(), rvi_feature(polygon, query.scale)),
        ]),
    }
}

/// Expression evaluating to the number of scenes matching the query.
pub fn scene_count(polygon: &Polygon, query: &QueryConfig) -> Expression {
    Expression {
        result: "0".to_string(),
        values: BTreeMap::from([(
            "0".to_string(),
            invoke(
                "Collection.size",
                [("collection", filtered_s1_collection(polygon, query))],
            ),
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn polygon() -> Polygon {
        Polygon::new(vec![vec![
            [126.80, 35.10],
            [126.82, 35.10],
            [126.82, 35.12],
            [126.80, 35.10],
        ]])
        .unwrap()
    }

    #[test]
    fn test_value_nodes_serialize_in_rest_shape() {
        let node = invoke("Image.constant", [("value", constant(4))]);
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "functionInvocationValue": {
                    "functionName": "Image.constant",
                    "arguments": { "value": { "constantValue": 4 } }
                }
            })
        );

        let def = ValueNode::FunctionDefinitionValue(FunctionDefinition {
            argument_names: vec!["x".to_string()],
            body: "1".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({ "functionDefinitionValue": { "argumentNames": ["x"], "body": "1" } })
        );
    }

    #[test]
    fn test_rvi_expression_maps_over_collection_with_body_reference() {
        let expr = rvi_time_series(&polygon(), &QueryConfig::default());
        let v = serde_json::to_value(&expr).unwrap();

        assert_eq!(v["result"], "0");
        let map = &v["values"]["0"]["functionInvocationValue"];
        assert_eq!(map["functionName"], "Collection.map");
        let body_key = map["arguments"]["baseAlgorithm"]["functionDefinitionValue"]["body"]
            .as_str()
            .unwrap();
        assert!(v["values"].get(body_key).is_some(), "body must reference a defined node");
        assert_eq!(
            v["values"][body_key]["functionInvocationValue"]["functionName"],
            "Feature"
        );
    }

    #[test]
    fn test_rvi_is_read_from_vh_key_at_configured_scale() {
        let expr = rvi_time_series(&polygon(), &QueryConfig::default());
        let v = serde_json::to_value(&expr).unwrap();
        let y = &v["values"]["1"]["functionInvocationValue"]["arguments"]["metadata"]
            ["dictionaryValue"]["values"]["y"]["functionInvocationValue"];
        assert_eq!(y["functionName"], "Dictionary.get");
        assert_eq!(y["arguments"]["key"]["constantValue"], "VH");
        let reduce = &y["arguments"]["dictionary"]["functionInvocationValue"];
        assert_eq!(reduce["functionName"], "Image.reduceRegion");
        assert_eq!(reduce["arguments"]["scale"]["constantValue"], 10.0);
    }

    #[test]
    fn test_collection_filters_are_all_applied() {
        let text = serde_json::to_string(&filtered_s1_collection(&polygon(), &QueryConfig::default()))
            .unwrap();
        for needle in [
            "COPERNICUS/S1_GRD",
            "Filter.intersects",
            "Filter.dateRangeContains",
            "2021-01-01",
            "2024-01-01",
            "instrumentMode",
            "orbitProperties_pass",
            "ASCENDING",
        ] {
            assert!(text.contains(needle), "missing {} in {}", needle, text);
        }
        assert_eq!(text.matches("Filter.listContains").count(), 2);
        assert_eq!(text.matches("Collection.filter").count(), 6);
    }

    #[test]
    fn test_descending_pass_replaces_default() {
        use crate::config::OrbitPass;

        let query = QueryConfig {
            orbit_pass: OrbitPass::Descending,
            ..QueryConfig::default()
        };
        let text = serde_json::to_string(&filtered_s1_collection(&polygon(), &query)).unwrap();
        assert!(text.contains("DESCENDING"));
        assert!(!text.contains("ASCENDING"));
    }

    #[test]
    fn test_scene_count_wraps_collection_size() {
        let v = serde_json::to_value(scene_count(&polygon(), &QueryConfig::default())).unwrap();
        assert_eq!(v["values"]["0"]["functionInvocationValue"]["functionName"], "Collection.size");
    }
}
