//! Process catalogue: the processes this service offers and their OGC
//! descriptions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const PROCESS_VERSION: &str = "v4.0.5-1.0.0";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessId {
    /// Road traffic noise propagation with isosurface output.
    TrafficNoisePropagation,
    /// Road traffic noise immissions at receivers around building facades.
    TrafficNoiseBuildings,
}

impl ProcessId {
    pub const ALL: [ProcessId; 2] = [
        ProcessId::TrafficNoisePropagation,
        ProcessId::TrafficNoiseBuildings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessId::TrafficNoisePropagation => "traffic_noise_propagation",
            ProcessId::TrafficNoiseBuildings => "traffic_noise_buildings",
        }
    }

    pub fn parse(value: &str) -> Option<ProcessId> {
        ProcessId::ALL.into_iter().find(|p| p.as_str() == value)
    }

    /// Outputs this process can produce.
    pub fn outputs(self) -> &'static [OutputId] {
        &OutputId::ALL
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Noise level outputs, one per assessment period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputId {
    NoiseDay,
    NoiseEvening,
    NoiseNight,
    NoiseDen,
}

impl OutputId {
    pub const ALL: [OutputId; 4] = [
        OutputId::NoiseDay,
        OutputId::NoiseEvening,
        OutputId::NoiseNight,
        OutputId::NoiseDen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputId::NoiseDay => "noise_day",
            OutputId::NoiseEvening => "noise_evening",
            OutputId::NoiseNight => "noise_night",
            OutputId::NoiseDen => "noise_den",
        }
    }

    pub fn parse(value: &str) -> Option<OutputId> {
        OutputId::ALL.into_iter().find(|o| o.as_str() == value)
    }

    fn period(self) -> &'static str {
        match self {
            OutputId::NoiseDay => "the day period (6-18h)",
            OutputId::NoiseEvening => "the evening period (18-22h)",
            OutputId::NoiseNight => "the night period (22-6h)",
            OutputId::NoiseDen => "a 24 hour day-evening-night period",
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

/// OGC API Processes `processSummary` / `process` document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescription {
    pub id: &'static str,
    pub title: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub job_control_options: Vec<&'static str>,
    pub output_transmission: Vec<&'static str>,
    pub keywords: Vec<&'static str>,
    pub inputs: Value,
    pub outputs: Value,
}

/// Describe every offered process.
pub fn catalogue() -> Vec<ProcessDescription> {
    ProcessId::ALL.into_iter().map(describe).collect()
}

/// Full description of one process.
pub fn describe(process: ProcessId) -> ProcessDescription {
    let (title, description) = match process {
        ProcessId::TrafficNoisePropagation => (
            "Traffic Noise Propagation Calculation",
            "Calculates road traffic noise propagation and creates isosurfaces \
             of the resulting noise levels (CNOSSOS-EU, NoiseModelling 4.0.5).",
        ),
        ProcessId::TrafficNoiseBuildings => (
            "Traffic Noise Immissions Around Buildings",
            "Calculates road traffic noise levels at receivers placed around \
             building facades (CNOSSOS-EU, NoiseModelling 4.0.5).",
        ),
    };

    let mut inputs = common_inputs();
    match process {
        ProcessId::TrafficNoisePropagation => {
            inputs["receiver_grid_settings"] = receiver_grid_input();
            inputs["isosurface_settings"] = isosurface_input();
        }
        ProcessId::TrafficNoiseBuildings => {
            inputs["building_grid_settings"] = building_grid_input();
        }
    }

    let outputs: serde_json::Map<String, Value> = process
        .outputs()
        .iter()
        .map(|o| {
            (
                o.as_str().to_string(),
                json!({
                    "title": o.as_str(),
                    "description": format!("Noise levels during {}", o.period()),
                    "schema": feature_collection_schema(),
                }),
            )
        })
        .collect();

    ProcessDescription {
        id: process.as_str(),
        title,
        version: PROCESS_VERSION,
        description,
        job_control_options: vec!["sync-execute", "async-execute", "dismiss"],
        output_transmission: vec!["value"],
        keywords: vec!["noise", "traffic", "cnossos"],
        inputs,
        outputs: Value::Object(outputs),
    }
}

fn feature_collection_schema() -> Value {
    json!({
        "allOf": [
            {"format": "geojson-feature-collection"},
            {"$ref": "https://geojson.org/schema/FeatureCollection.json"}
        ]
    })
}

fn common_inputs() -> Value {
    json!({
        "buildings": {
            "title": "Buildings Feature Collection",
            "description": "GeoJSON FeatureCollection of Polygon buildings with `id` and `building_height`",
            "schema": feature_collection_schema(),
            "minOccurs": 1,
            "maxOccurs": 1
        },
        "roads": {
            "title": "Roads Feature Collection",
            "description": "GeoJSON FeatureCollection of LineString or MultiLineString roads with traffic flow properties",
            "schema": feature_collection_schema(),
            "minOccurs": 1,
            "maxOccurs": 1
        },
        "crs": {
            "title": "Coordinate Reference System",
            "description": "CRS of the input data, e.g. 'http://www.opengis.net/def/crs/EPSG/0/25832' or an EPSG integer code",
            "schema": {"oneOf": [{"type": "string"}, {"type": "integer"}]},
            "minOccurs": 0,
            "maxOccurs": 1
        },
        "dem_url": {
            "title": "Digital Elevation Model",
            "description": "URL of a Cloud Optimized GeoTIFF elevation model",
            "schema": {"type": "string", "format": "uri"},
            "minOccurs": 0,
            "maxOccurs": 1
        },
        "dem_bbox_feature": {
            "title": "Polygon feature as substitute for a bbox",
            "description": "GeoJSON Polygon feature bounding the DEM extent",
            "schema": {"allOf": [
                {"format": "geojson-feature"},
                {"$ref": "https://geojson.org/schema/Polygon.json"}
            ]},
            "minOccurs": 0,
            "maxOccurs": 1
        },
        "ground_absorption": {
            "title": "Ground Absorption Feature Collection",
            "description": "GeoJSON FeatureCollection of Polygon areas with an `absorption` coefficient",
            "schema": feature_collection_schema(),
            "minOccurs": 0,
            "maxOccurs": 1
        },
        "acoustic_parameters": {
            "title": "Acoustic Parameters",
            "schema": {
                "type": "object",
                "properties": {
                    "wall_alpha": {"type": "number", "minimum": 0.0, "maximum": 1.0, "default": 0.1},
                    "max_source_distance": {"type": "number", "minimum": 0, "maximum": 1000.0, "default": 150.0},
                    "max_reflection_distance": {"type": "number", "minimum": 0, "maximum": 1000.0, "default": 50.0},
                    "reflection_order": {"type": "integer", "minimum": 0, "maximum": 2, "default": 1},
                    "humidity": {"type": "number", "minimum": 0.0, "maximum": 100.0, "default": 70.0},
                    "temperature": {"type": "number", "minimum": -20.0, "maximum": 50.0, "default": 15.0}
                }
            },
            "minOccurs": 0,
            "maxOccurs": 1
        },
        "propagation_settings": {
            "title": "Propagation Settings",
            "schema": {
                "type": "object",
                "properties": {
                    "vertical_diffraction": {"type": "boolean", "default": false},
                    "horizontal_diffraction": {"type": "boolean", "default": false},
                    "favorable_day": {"type": "string"},
                    "favorable_evening": {"type": "string"},
                    "favorable_night": {"type": "string"}
                }
            },
            "minOccurs": 0,
            "maxOccurs": 1
        }
    })
}

fn receiver_grid_input() -> Value {
    json!({
        "title": "Receiver Grid Settings",
        "schema": {
            "type": "object",
            "properties": {
                "grid_type": {"type": "string", "enum": ["DELAUNAY"], "default": "DELAUNAY"},
                "calculation_height": {"type": "number", "minimum": 0, "maximum": 100.0, "default": 4.0},
                "max_area": {"type": "number", "minimum": 0, "maximum": 2500.0, "default": 2500.0},
                "max_cell_dist": {"type": "number", "minimum": 0, "maximum": 10000.0, "default": 600.0},
                "road_width": {"type": "number", "minimum": 0, "maximum": 50.0, "default": 2.0}
            }
        },
        "minOccurs": 0,
        "maxOccurs": 1
    })
}

fn isosurface_input() -> Value {
    json!({
        "title": "IsoSurface Settings",
        "schema": {
            "type": "object",
            "properties": {
                "iso_classes": {
                    "type": "string",
                    "default": "35.0,40.0,45.0,50.0,55.0,60.0,65.0,70.0,75.0,80.0,200.0"
                },
                "smooth_coefficient": {"type": "number", "minimum": 0.0, "maximum": 100.0, "default": 0.5}
            }
        },
        "minOccurs": 0,
        "maxOccurs": 1
    })
}

fn building_grid_input() -> Value {
    json!({
        "title": "Building Grid Settings",
        "schema": {
            "type": "object",
            "properties": {
                "grid_type": {"type": "string", "enum": ["BUILDINGS_2D", "BUILDINGS_3D"], "default": "BUILDINGS_2D"},
                "distance_from_wall": {"type": "number", "minimum": 0, "maximum": 50.0, "default": 2.0},
                "receiver_distance": {"type": "number", "exclusiveMinimum": 0, "maximum": 100.0, "default": 10.0},
                "receiver_height_2d": {"type": "number", "minimum": 0, "maximum": 100.0, "default": 4.0}
            }
        },
        "minOccurs": 1,
        "maxOccurs": 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_ids_round_trip() {
        for p in ProcessId::ALL {
            assert_eq!(ProcessId::parse(p.as_str()), Some(p));
        }
        assert_eq!(ProcessId::parse("echo"), None);
    }

    #[test]
    fn propagation_process_describes_grid_and_isosurface_inputs() {
        let d = describe(ProcessId::TrafficNoisePropagation);
        assert!(d.inputs.get("receiver_grid_settings").is_some());
        assert!(d.inputs.get("isosurface_settings").is_some());
        assert!(d.inputs.get("building_grid_settings").is_none());
        assert_eq!(d.outputs.as_object().unwrap().len(), 4);
    }

    #[test]
    fn buildings_process_requires_building_grid() {
        let d = describe(ProcessId::TrafficNoiseBuildings);
        assert_eq!(d.inputs["building_grid_settings"]["minOccurs"], 1);
    }

    #[test]
    fn description_serializes_with_ogc_field_names() {
        let json = serde_json::to_value(describe(ProcessId::TrafficNoisePropagation)).unwrap();
        assert!(json["jobControlOptions"].is_array());
        assert!(json["outputTransmission"].is_array());
    }
}
