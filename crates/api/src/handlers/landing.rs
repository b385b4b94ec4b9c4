//! Handlers for the landing page and conformance declaration.

use axum::Json;
use serde::Serialize;

use crate::response::Link;

const CONFORMANCE_CLASSES: [&str; 6] = [
    "http://www.opengis.net/spec/ogcapi-common-1/1.0/conf/core",
    "http://www.opengis.net/spec/ogcapi-processes-1/1.0/conf/core",
    "http://www.opengis.net/spec/ogcapi-processes-1/1.0/conf/json",
    "http://www.opengis.net/spec/ogcapi-processes-1/1.0/conf/ogc-process-description",
    "http://www.opengis.net/spec/ogcapi-processes-1/1.0/conf/job-list",
    "http://www.opengis.net/spec/ogcapi-processes-1/1.0/conf/dismiss",
];

#[derive(Debug, Serialize)]
pub struct LandingPage {
    pub title: &'static str,
    pub description: &'static str,
    pub links: Vec<Link>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conformance {
    pub conforms_to: Vec<&'static str>,
}

/// GET /
pub async fn landing_page() -> Json<LandingPage> {
    Json(LandingPage {
        title: "Noise Processes",
        description: "OGC API Processes service for road traffic noise calculations",
        links: vec![
            Link::new("/", "self").titled("This document"),
            Link::new("/conformance", "http://www.opengis.net/def/rel/ogc/1.0/conformance")
                .titled("Conformance classes"),
            Link::new("/processes", "http://www.opengis.net/def/rel/ogc/1.0/processes")
                .titled("Processes"),
            Link::new("/jobs", "http://www.opengis.net/def/rel/ogc/1.0/job-list").titled("Jobs"),
        ],
    })
}

/// GET /conformance
pub async fn conformance() -> Json<Conformance> {
    Json(Conformance {
        conforms_to: CONFORMANCE_CLASSES.to_vec(),
    })
}
