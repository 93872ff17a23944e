use gpx_compat::{
    Extensions, Gpx, GpxError, GpxExtension, GpxFile, LoadPolicy, Result, Track, TrackSegment, Waypoint,
    XmlElement,
};

const TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";
const CUSTOM_NS: &str = "http://example.com/gpx/custom/v1";

fn fixture_path(name: &str) -> String {
    format!("tests/fixtures/{name}")
}

/// Garmin's track point extension, heart rate only.
#[derive(Debug, Clone, Default, PartialEq)]
struct TrackPointExtension {
    hr: Option<u32>,
}

impl GpxExtension for TrackPointExtension {
    const NAMESPACE: &'static str = TPX_NS;
    const LOCAL_NAME: &'static str = "TrackPointExtension";

    fn from_element(element: &XmlElement) -> Result<Self> {
        let hr = match element.child_text("hr") {
            Some(text) => Some(text.trim().parse().map_err(|_| GpxError::InvalidValue {
                element: "hr",
                value: text.clone(),
            })?),
            None => None,
        };
        Ok(Self { hr })
    }

    fn to_element(&self) -> XmlElement {
        let element = XmlElement::new(TPX_NS, "TrackPointExtension");
        match self.hr {
            Some(hr) => element.with_text_child("hr", hr.to_string()),
            None => element,
        }
    }
}

/// A caller-defined extension with attributes and nested elements.
#[derive(Debug, Clone, Default, PartialEq)]
struct SurfaceInfo {
    surface: String,
    difficulty: u8,
    tags: Vec<String>,
}

impl GpxExtension for SurfaceInfo {
    const NAMESPACE: &'static str = CUSTOM_NS;
    const LOCAL_NAME: &'static str = "surface";

    fn from_element(element: &XmlElement) -> Result<Self> {
        let difficulty = element.attribute("difficulty").unwrap_or("0");
        Ok(Self {
            surface: element.child_text("kind").unwrap_or_default(),
            difficulty: difficulty.parse().map_err(|_| GpxError::InvalidAttribute {
                element: "surface",
                attribute: "difficulty",
                value: difficulty.to_string(),
            })?,
            tags: element
                .child_elements()
                .filter(|e| e.local_name == "tag")
                .map(XmlElement::text)
                .collect(),
        })
    }

    fn to_element(&self) -> XmlElement {
        let mut element = XmlElement::new(CUSTOM_NS, "surface")
            .with_attribute("difficulty", self.difficulty.to_string())
            .with_text_child("kind", self.surface.clone());
        for tag in &self.tags {
            element = element.with_text_child("tag", tag.clone());
        }
        element
    }
}

fn document_with_surface() -> GpxFile {
    let mut point = Waypoint::new(50.04, 11.99);
    let mut ext = Extensions::new();
    let info = ext.get_or_create::<SurfaceInfo>();
    info.surface = "gravel".to_string();
    info.difficulty = 3;
    info.tags = vec!["forest".to_string(), "steep".to_string()];
    point.extensions = Some(ext);

    let mut file = GpxFile::new();
    file.tracks.push(Track {
        name: Some("Kösseine".to_string()),
        segments: vec![TrackSegment {
            points: vec![point],
            extensions: None,
        }],
        ..Track::default()
    });
    file
}

#[test]
fn test_registered_type_decoded_from_fixture() {
    let gpx = Gpx::new();
    gpx.register_extension_type::<TrackPointExtension>();

    let file = gpx
        .load_path(fixture_path("Test_Gpx1_1.gpx"), LoadPolicy::Compatibility)
        .unwrap();
    let ext = file.tracks[0].segments[0].points[0].extensions.as_ref().unwrap();
    assert_eq!(
        ext.try_get_single::<TrackPointExtension>(),
        Some(&TrackPointExtension { hr: Some(92) })
    );
    assert_eq!(ext.unknown().count(), 0);
}

#[test]
fn test_registration_after_first_load_applies() {
    let gpx = Gpx::new();
    let before = gpx
        .load_path(fixture_path("Test_Gpx1_1.gpx"), LoadPolicy::Compatibility)
        .unwrap();
    let ext = before.tracks[0].segments[0].points[0].extensions.as_ref().unwrap();
    assert!(ext.try_get_single::<TrackPointExtension>().is_none());

    gpx.register_extension_type::<TrackPointExtension>();
    let after = gpx
        .load_path(fixture_path("Test_Gpx1_1.gpx"), LoadPolicy::Compatibility)
        .unwrap();
    let ext = after.tracks[0].segments[0].points[0].extensions.as_ref().unwrap();
    assert!(ext.try_get_single::<TrackPointExtension>().is_some());
}

#[test]
fn test_custom_extension_round_trip() {
    let gpx = Gpx::new();
    gpx.register_namespace("surf", CUSTOM_NS).unwrap();
    gpx.register_extension_type::<SurfaceInfo>();

    let file = document_with_surface();
    let xml = gpx.save_to_string(&file).unwrap();
    assert!(xml.contains(r#"xmlns:surf="http://example.com/gpx/custom/v1""#));
    assert!(xml.contains(r#"<surf:surface difficulty="3">"#));
    assert!(xml.contains("<surf:kind>gravel</surf:kind>"));

    let reloaded = gpx.load_str(&xml, LoadPolicy::Compatibility).unwrap();
    let point = &reloaded.tracks[0].segments[0].points[0];
    let info = point
        .extensions
        .as_ref()
        .and_then(|e| e.try_get_single::<SurfaceInfo>())
        .unwrap();
    assert_eq!(info, &SurfaceInfo {
        surface: "gravel".to_string(),
        difficulty: 3,
        tags: vec!["forest".to_string(), "steep".to_string()],
    });
    assert_eq!(reloaded.tracks, file.tracks);
}

#[test]
fn test_unregistered_namespace_declared_locally() {
    let gpx = Gpx::new();
    let xml = gpx.save_to_string(&document_with_surface()).unwrap();
    assert!(xml.contains(r#"<surface xmlns="http://example.com/gpx/custom/v1" difficulty="3">"#));

    // Without the type registered the element survives as a generic tree.
    let reloaded = gpx.load_str(&xml, LoadPolicy::Compatibility).unwrap();
    let ext = reloaded.tracks[0].segments[0].points[0].extensions.as_ref().unwrap();
    let element = ext.unknown().next().unwrap();
    assert!(element.matches(CUSTOM_NS, "surface"));
    assert_eq!(element.attribute("difficulty"), Some("3"));
    assert_eq!(element.child_text("kind").as_deref(), Some("gravel"));
}

#[test]
fn test_invalid_payload_fails_load() {
    let gpx = Gpx::new();
    gpx.register_extension_type::<SurfaceInfo>();
    let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <wpt lat="1" lon="2">
    <extensions><s:surface xmlns:s="http://example.com/gpx/custom/v1" difficulty="hard"/></extensions>
  </wpt>
</gpx>"#;
    let err = gpx.load_str(xml, LoadPolicy::Compatibility).unwrap_err();
    match err {
        GpxError::DeserializationFailed { source, .. } => {
            assert!(matches!(
                source.as_deref(),
                Some(GpxError::InvalidAttribute { attribute: "difficulty", .. })
            ));
        }
        other => panic!("Expected DeserializationFailed, got {other:?}"),
    }
}

#[test]
fn test_root_extensions_round_trip() {
    let gpx = Gpx::new();
    gpx.register_extension_type::<TrackPointExtension>();

    let mut file = GpxFile::new();
    let mut ext = Extensions::new();
    ext.insert(TrackPointExtension { hr: Some(120) });
    ext.push_unknown(XmlElement::new("http://example.com/misc", "note").with_text_child("by", "me"));
    file.extensions = Some(ext);

    let xml = gpx.save_to_string(&file).unwrap();
    let reloaded = gpx.load_str(&xml, LoadPolicy::StrictGpx1_1).unwrap();
    assert_eq!(reloaded.extensions, file.extensions);
}

#[test]
fn test_registry_rules() {
    let gpx = Gpx::new();
    gpx.register_namespace("surf", CUSTOM_NS).unwrap();
    gpx.register_namespace("surf", CUSTOM_NS).unwrap();
    assert_eq!(gpx.registry().namespaces().len(), 1);

    let err = gpx.register_namespace("surf", TPX_NS).unwrap_err();
    assert!(matches!(err, GpxError::DuplicatePrefix { .. }));
    assert_eq!(gpx.registry().namespaces().get("surf"), Some(CUSTOM_NS));

    gpx.register_extension_type::<SurfaceInfo>();
    gpx.register_extension_type::<SurfaceInfo>();
    assert_eq!(gpx.registry().extension_types().len(), 1);
}

#[test]
fn test_track_extension_round_trip() {
    let gpx = Gpx::new();
    gpx.register_extension_type::<SurfaceInfo>();

    let mut track = Track {
        name: Some("Kösseine".to_string()),
        ..Track::default()
    };
    let mut ext = Extensions::new();
    ext.get_or_create::<SurfaceInfo>().difficulty = 4;
    track.extensions = Some(ext);
    let mut file = GpxFile::new();
    file.tracks.push(track);

    let xml = gpx.save_to_string(&file).unwrap();
    assert!(xml.contains("<extensions>"));
    let reloaded = gpx.load_str(&xml, LoadPolicy::StrictGpx1_1).unwrap();
    let info = reloaded.tracks[0]
        .extensions
        .as_ref()
        .and_then(|e| e.try_get_single::<SurfaceInfo>())
        .unwrap();
    assert_eq!(info.difficulty, 4);
    assert_eq!(reloaded.tracks, file.tracks);
}

#[test]
fn test_locally_declared_attribute_prefix_survives_save() {
    let gpx = Gpx::new();
    let source = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <extensions><a:foo xmlns:a="http://a.example/" a:x="1"/></extensions>
</gpx>"#;
    let file = gpx.load_str(source, LoadPolicy::Compatibility).unwrap();
    let xml = gpx.save_to_string(&file).unwrap();

    assert!(!xml.contains("a:x"));
    assert!(xml.contains(r#"<foo xmlns="http://a.example/" xmlns:ns0="http://a.example/" ns0:x="1"/>"#));

    // Unbound prefixes fail to load, so this also checks the output is namespace-correct.
    let reloaded = gpx.load_str(&xml, LoadPolicy::StrictGpx1_1).unwrap();
    let foo = reloaded.extensions.as_ref().unwrap().unknown().next().unwrap();
    assert_eq!(foo.attribute_ns("http://a.example/", "x"), Some("1"));
    assert_eq!(reloaded.extensions, file.extensions);
}

#[test]
fn test_attribute_keeps_namespace_when_prefix_is_rebound() {
    let gpx = Gpx::new();
    gpx.register_namespace("ex", "http://registered.example/").unwrap();
    let source = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1" xmlns:ex="http://document.example/" version="1.1">
  <extensions><note xmlns="http://misc/" ex:by="me"/></extensions>
</gpx>"#;
    let file = gpx.load_str(source, LoadPolicy::Compatibility).unwrap();
    let xml = gpx.save_to_string(&file).unwrap();
    assert!(xml.contains(r#"xmlns:ex="http://registered.example/""#));
    assert!(!xml.contains("ex:by"));

    let reloaded = gpx.load_str(&xml, LoadPolicy::StrictGpx1_1).unwrap();
    let note = reloaded.extensions.as_ref().unwrap().unknown().next().unwrap();
    assert_eq!(note.attribute_ns("http://document.example/", "by"), Some("me"));
    assert_eq!(note.attribute_ns("http://registered.example/", "by"), None);
}
