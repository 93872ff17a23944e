#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

const GPX10: &str = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0" creator="old">
  <name>Kösseine</name>
  <wpt lat="50.04" lon="11.99"/>
</gpx>"#;

#[wasm_bindgen_test]
fn upgrade_writes_gpx11() {
    let out = gpx_compat::upgrade_gpx(GPX10, JsValue::UNDEFINED).unwrap();
    assert!(out.contains(r#"xmlns="http://www.topografix.com/GPX/1/1""#));
    assert!(out.contains(r#"version="1.1""#));
}

#[wasm_bindgen_test]
fn summary_reports_counts() {
    let value = gpx_compat::gpx_summary(GPX10, JsValue::NULL).unwrap();
    let summary: serde_json::Value = serde_wasm_bindgen::from_value(value).unwrap();
    assert_eq!(summary["version"], "1.0");
    assert_eq!(summary["name"], "Kösseine");
    assert_eq!(summary["waypoints"], 1);
}

#[wasm_bindgen_test]
fn strict_policy_rejects_gpx10() {
    let options = js_sys::Object::new();
    js_sys::Reflect::set(&options, &"policy".into(), &"strictGpx1_1".into()).unwrap();
    assert!(gpx_compat::upgrade_gpx(GPX10, options.into()).is_err());
}
