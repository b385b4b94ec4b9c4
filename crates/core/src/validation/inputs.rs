//! Typed process inputs.
//!
//! Numeric bounds are declared with `validator` attributes. String formats,
//! cross-field rules and geometry are checked by hand in [`check_inputs`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::geojson::{check_geometry, Feature, FeatureCollection, GeometryKind};
use super::violations::Violations;
use crate::process::ProcessId;

static PAVEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(NL(0[1-9]|1[0-4])|DEF)$").expect("valid regex"));
static CRS_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://www\.opengis\.net/def/crs/EPSG/0/[1-9][0-9]*$").expect("valid regex")
});
static CRS_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^EPSG:[1-9][0-9]*$").expect("valid regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/?#]+[^\s]*$").expect("valid regex"));

const TEMPERATURE_RANGE: (f64, f64) = (-20.0, 50.0);

// ---------------------------------------------------------------------------
// Feature properties
// ---------------------------------------------------------------------------

/// Feature identifiers may be numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureKey {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BuildingProperties {
    pub id: FeatureKey,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub building_height: f64,
}

/// CNOSSOS-EU traffic description of one road segment.
///
/// Vehicle categories: `light` (1), `medium` (2), `heavy` (3),
/// `light_motorcycle` (4a) and `heavy_motorcycle` (4b). Counts are vehicles
/// per hour, speeds km/h.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrafficFlow {
    pub id: FeatureKey,

    #[validate(range(min = 0.0))]
    pub light_vehicles_day: Option<f64>,
    #[validate(range(min = 0.0))]
    pub medium_vehicles_day: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_vehicles_day: Option<f64>,
    #[validate(range(min = 0.0))]
    pub light_motorcycles_day: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_motorcycles_day: Option<f64>,

    #[validate(range(min = 0.0))]
    pub light_vehicles_evening: Option<f64>,
    #[validate(range(min = 0.0))]
    pub medium_vehicles_evening: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_vehicles_evening: Option<f64>,
    #[validate(range(min = 0.0))]
    pub light_motorcycles_evening: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_motorcycles_evening: Option<f64>,

    #[validate(range(min = 0.0))]
    pub light_vehicles_night: Option<f64>,
    #[validate(range(min = 0.0))]
    pub medium_vehicles_night: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_vehicles_night: Option<f64>,
    #[validate(range(min = 0.0))]
    pub light_motorcycles_night: Option<f64>,
    #[validate(range(min = 0.0))]
    pub heavy_motorcycles_night: Option<f64>,

    #[validate(range(min = 0.0, max = 200.0))]
    pub light_speed_day: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub medium_speed_day: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_speed_day: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub light_moto_speed_day: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_moto_speed_day: Option<f64>,

    #[validate(range(min = 0.0, max = 200.0))]
    pub light_speed_evening: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub medium_speed_evening: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_speed_evening: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub light_moto_speed_evening: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_moto_speed_evening: Option<f64>,

    #[validate(range(min = 0.0, max = 200.0))]
    pub light_speed_night: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub medium_speed_night: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_speed_night: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub light_moto_speed_night: Option<f64>,
    #[validate(range(min = 0.0, max = 200.0))]
    pub heavy_moto_speed_night: Option<f64>,

    /// Road surface reference, `NL01`..`NL14` or `DEF`. Defaults to `NL08`.
    pub pavement: Option<String>,

    pub temperature_day: Option<f64>,
    pub temperature_evening: Option<f64>,
    pub temperature_night: Option<f64>,

    /// Months per year studded tyres are used.
    #[validate(range(min = 0.0, max = 12.0))]
    pub studded_tires_months: Option<f64>,
    /// Share of light vehicles with studded tyres.
    #[validate(range(min = 0.0, max = 1.0))]
    pub studded_tires_ratio: Option<f64>,

    #[validate(range(min = 0.0))]
    pub junction_distance: Option<f64>,
    /// 0 none, 1 traffic lights, 2 roundabout.
    #[validate(range(min = 0, max = 2))]
    pub junction_type: Option<i64>,
    /// Road gradient in percent.
    pub slope: Option<f64>,
}

impl TrafficFlow {
    /// `(count field, count, speed field, speed)` for every category and
    /// period.
    fn count_speed_pairs(&self) -> [(&'static str, Option<f64>, &'static str, Option<f64>); 15] {
        [
            ("light_vehicles_day", self.light_vehicles_day, "light_speed_day", self.light_speed_day),
            ("medium_vehicles_day", self.medium_vehicles_day, "medium_speed_day", self.medium_speed_day),
            ("heavy_vehicles_day", self.heavy_vehicles_day, "heavy_speed_day", self.heavy_speed_day),
            ("light_motorcycles_day", self.light_motorcycles_day, "light_moto_speed_day", self.light_moto_speed_day),
            ("heavy_motorcycles_day", self.heavy_motorcycles_day, "heavy_moto_speed_day", self.heavy_moto_speed_day),
            ("light_vehicles_evening", self.light_vehicles_evening, "light_speed_evening", self.light_speed_evening),
            ("medium_vehicles_evening", self.medium_vehicles_evening, "medium_speed_evening", self.medium_speed_evening),
            ("heavy_vehicles_evening", self.heavy_vehicles_evening, "heavy_speed_evening", self.heavy_speed_evening),
            ("light_motorcycles_evening", self.light_motorcycles_evening, "light_moto_speed_evening", self.light_moto_speed_evening),
            ("heavy_motorcycles_evening", self.heavy_motorcycles_evening, "heavy_moto_speed_evening", self.heavy_moto_speed_evening),
            ("light_vehicles_night", self.light_vehicles_night, "light_speed_night", self.light_speed_night),
            ("medium_vehicles_night", self.medium_vehicles_night, "medium_speed_night", self.medium_speed_night),
            ("heavy_vehicles_night", self.heavy_vehicles_night, "heavy_speed_night", self.heavy_speed_night),
            ("light_motorcycles_night", self.light_motorcycles_night, "light_moto_speed_night", self.light_moto_speed_night),
            ("heavy_motorcycles_night", self.heavy_motorcycles_night, "heavy_moto_speed_night", self.heavy_moto_speed_night),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GroundAbsorption {
    /// G coefficient: 0 hard (asphalt, water), 1 soft (grass, fields).
    #[validate(range(min = 0.0, max = 1.0))]
    pub absorption: f64,
}

// ---------------------------------------------------------------------------
// Settings objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AcousticParameters {
    #[validate(range(min = 0.0, max = 1.0))]
    pub wall_alpha: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub max_source_distance: Option<f64>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub max_reflection_distance: Option<f64>,
    #[validate(range(min = 0, max = 2))]
    pub reflection_order: Option<i64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropagationSettings {
    pub vertical_diffraction: Option<bool>,
    pub horizontal_diffraction: Option<bool>,
    /// 16 comma separated probabilities of favourable propagation, one per
    /// 22.5 degree sector.
    pub favorable_day: Option<String>,
    pub favorable_evening: Option<String>,
    pub favorable_night: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ReceiverGridSettings {
    pub grid_type: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub calculation_height: Option<f64>,
    #[validate(range(min = 0.0, max = 2500.0))]
    pub max_area: Option<f64>,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub max_cell_dist: Option<f64>,
    #[validate(range(min = 0.0, max = 50.0))]
    pub road_width: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct IsoSurfaceSettings {
    /// Comma separated, strictly increasing class boundaries in dB.
    pub iso_classes: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub smooth_coefficient: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BuildingGridSettings {
    pub grid_type: Option<String>,
    #[validate(range(min = 0.0, max = 50.0))]
    pub distance_from_wall: Option<f64>,
    /// Spacing between facade receivers; must be positive.
    #[validate(range(min = 0.0, max = 100.0))]
    pub receiver_distance: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub receiver_height_2d: Option<f64>,
}

/// EPSG code given as a URI, `EPSG:<code>` or a bare integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Crs {
    Code(i64),
    Name(String),
}

/// Everything a noise calculation request may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInputs {
    pub buildings: FeatureCollection<BuildingProperties>,
    pub roads: FeatureCollection<TrafficFlow>,
    #[serde(default)]
    pub crs: Option<Crs>,
    #[serde(default, alias = "dem")]
    pub dem_url: Option<String>,
    #[serde(default)]
    pub dem_bbox_feature: Option<Feature<Option<Value>>>,
    #[serde(default)]
    pub ground_absorption: Option<FeatureCollection<GroundAbsorption>>,
    #[serde(default)]
    pub acoustic_parameters: Option<AcousticParameters>,
    #[serde(default)]
    pub propagation_settings: Option<PropagationSettings>,
    #[serde(default)]
    pub receiver_grid_settings: Option<ReceiverGridSettings>,
    #[serde(default, alias = "iosurface_settings")]
    pub isosurface_settings: Option<IsoSurfaceSettings>,
    #[serde(default)]
    pub building_grid_settings: Option<BuildingGridSettings>,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Walk the typed inputs and record every constraint violation. Paths are
/// rooted at `inputs`.
pub fn check_inputs(process: ProcessId, inputs: &ProcessInputs, v: &mut Violations) {
    for (i, feature) in inputs.buildings.features.iter().enumerate() {
        let path = format!("inputs.buildings.features[{i}]");
        check_geometry(&feature.geometry, &[GeometryKind::Polygon], &format!("{path}.geometry"), v);
        validate_struct(&feature.properties, &format!("{path}.properties"), v);
    }

    if inputs.roads.features.is_empty() {
        v.push("inputs.roads.features", "required", "at least one road is required", None);
    }
    for (i, feature) in inputs.roads.features.iter().enumerate() {
        let path = format!("inputs.roads.features[{i}]");
        check_geometry(
            &feature.geometry,
            &[GeometryKind::LineString, GeometryKind::MultiLineString],
            &format!("{path}.geometry"),
            v,
        );
        check_traffic_flow(&feature.properties, &format!("{path}.properties"), v);
    }

    if let Some(crs) = &inputs.crs {
        check_crs(crs, v);
    }

    if let Some(url) = &inputs.dem_url {
        if !URL_RE.is_match(url) {
            v.push(
                "inputs.dem_url",
                "format",
                "must be an http(s) URL",
                Some(Value::String(url.clone())),
            );
        }
    }

    if let Some(bbox) = &inputs.dem_bbox_feature {
        check_geometry(
            &bbox.geometry,
            &[GeometryKind::Polygon],
            "inputs.dem_bbox_feature.geometry",
            v,
        );
    }

    if let Some(ground) = &inputs.ground_absorption {
        for (i, feature) in ground.features.iter().enumerate() {
            let path = format!("inputs.ground_absorption.features[{i}]");
            check_geometry(
                &feature.geometry,
                &[GeometryKind::Polygon],
                &format!("{path}.geometry"),
                v,
            );
            validate_struct(&feature.properties, &format!("{path}.properties"), v);
        }
    }

    if let Some(acoustic) = &inputs.acoustic_parameters {
        validate_struct(acoustic, "inputs.acoustic_parameters", v);
        check_signed_range(
            acoustic.temperature,
            TEMPERATURE_RANGE,
            "inputs.acoustic_parameters.temperature",
            v,
        );
    }

    if let Some(propagation) = &inputs.propagation_settings {
        for (name, value) in [
            ("favorable_day", &propagation.favorable_day),
            ("favorable_evening", &propagation.favorable_evening),
            ("favorable_night", &propagation.favorable_night),
        ] {
            if let Some(raw) = value {
                check_favorable(raw, &format!("inputs.propagation_settings.{name}"), v);
            }
        }
    }

    match process {
        ProcessId::TrafficNoisePropagation => {
            if let Some(grid) = &inputs.receiver_grid_settings {
                validate_struct(grid, "inputs.receiver_grid_settings", v);
                check_choice(
                    grid.grid_type.as_deref(),
                    &["DELAUNAY"],
                    "inputs.receiver_grid_settings.grid_type",
                    v,
                );
            }
            if let Some(iso) = &inputs.isosurface_settings {
                validate_struct(iso, "inputs.isosurface_settings", v);
                if let Some(classes) = &iso.iso_classes {
                    check_iso_classes(classes, "inputs.isosurface_settings.iso_classes", v);
                }
            }
        }
        ProcessId::TrafficNoiseBuildings => match &inputs.building_grid_settings {
            None => v.push(
                "inputs.building_grid_settings",
                "required",
                "required for this process",
                None,
            ),
            Some(grid) => {
                validate_struct(grid, "inputs.building_grid_settings", v);
                if grid.receiver_distance == Some(0.0) {
                    v.push(
                        "inputs.building_grid_settings.receiver_distance",
                        "range",
                        "must be > 0",
                        Some(Value::from(0.0)),
                    );
                }
                check_choice(
                    grid.grid_type.as_deref(),
                    &["BUILDINGS_2D", "BUILDINGS_3D"],
                    "inputs.building_grid_settings.grid_type",
                    v,
                );
            }
        },
    }
}

fn validate_struct<T: Validate>(value: &T, path: &str, v: &mut Violations) {
    if let Err(errors) = value.validate() {
        v.extend_from_validator(path, &errors);
    }
}

fn check_traffic_flow(flow: &TrafficFlow, path: &str, v: &mut Violations) {
    validate_struct(flow, path, v);

    for (name, value) in [
        ("temperature_day", flow.temperature_day),
        ("temperature_evening", flow.temperature_evening),
        ("temperature_night", flow.temperature_night),
    ] {
        check_signed_range(value, TEMPERATURE_RANGE, &format!("{path}.{name}"), v);
    }

    for (count_field, count, speed_field, speed) in flow.count_speed_pairs() {
        if count.is_some_and(|c| c > 0.0) && speed.is_none() {
            v.push(
                format!("{path}.{speed_field}"),
                "required",
                format!("required when {count_field} is greater than 0"),
                None,
            );
        }
    }

    if let Some(pavement) = &flow.pavement {
        if !PAVEMENT_RE.is_match(pavement) {
            v.push(
                format!("{path}.pavement"),
                "pattern",
                "must be NL01..NL14 or DEF",
                Some(Value::String(pavement.clone())),
            );
        }
    }
}

/// Bounds that go below zero are checked here rather than in `#[validate]`.
fn check_signed_range(
    value: Option<f64>,
    (min, max): (f64, f64),
    path: &str,
    v: &mut Violations,
) {
    if let Some(x) = value {
        if !(min..=max).contains(&x) {
            v.push(
                path,
                "range",
                format!("must be >= {min} and <= {max}"),
                serde_json::Number::from_f64(x).map(Value::Number),
            );
        }
    }
}

fn check_crs(crs: &Crs, v: &mut Violations) {
    let valid = match crs {
        Crs::Code(code) => *code > 0,
        Crs::Name(name) => CRS_URI_RE.is_match(name) || CRS_CODE_RE.is_match(name),
    };
    if !valid {
        v.push(
            "inputs.crs",
            "format",
            "must be an EPSG code, `EPSG:<code>` or an OGC CRS URI",
            serde_json::to_value(crs).ok(),
        );
    }
}

fn check_choice(value: Option<&str>, allowed: &[&str], path: &str, v: &mut Violations) {
    if let Some(value) = value {
        if !allowed.contains(&value) {
            v.push(
                path,
                "enum",
                format!("must be one of {}", allowed.join(", ")),
                Some(Value::String(value.to_string())),
            );
        }
    }
}

fn check_favorable(raw: &str, path: &str, v: &mut Violations) {
    let parsed: Result<Vec<f64>, _> = raw.split(',').map(|p| p.trim().parse::<f64>()).collect();
    let ok = match parsed {
        Ok(values) => values.len() == 16 && values.iter().all(|p| (0.0..=1.0).contains(p)),
        Err(_) => false,
    };
    if !ok {
        v.push(
            path,
            "format",
            "must be 16 comma separated values between 0 and 1",
            Some(Value::String(raw.to_string())),
        );
    }
}

fn check_iso_classes(raw: &str, path: &str, v: &mut Violations) {
    let parsed: Result<Vec<f64>, _> = raw.split(',').map(|p| p.trim().parse::<f64>()).collect();
    let ok = match parsed {
        Ok(values) => !values.is_empty() && values.windows(2).all(|w| w[0] < w[1]),
        Err(_) => false,
    };
    if !ok {
        v.push(
            path,
            "format",
            "must be comma separated, strictly increasing numbers",
            Some(Value::String(raw.to_string())),
        );
    }
}
