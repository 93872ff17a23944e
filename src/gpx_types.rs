use chrono::{DateTime, Utc};

use crate::extensions::Extensions;

/// A parsed GPX document (`<gpx>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxFile {
    pub version: String,
    pub creator: String,
    pub metadata: Option<Metadata>,
    pub waypoints: Vec<Waypoint>,
    pub routes: Vec<Route>,
    pub tracks: Vec<Track>,
    pub extensions: Option<Extensions>,
    pub namespaces: Namespaces,
}

impl GpxFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of points across waypoints, routes and track segments.
    pub fn point_count(&self) -> usize {
        self.waypoints.len()
            + self.routes.iter().map(|r| r.points.len()).sum::<usize>()
            + self
                .tracks
                .iter()
                .flat_map(|t| &t.segments)
                .map(|s| s.points.len())
                .sum::<usize>()
    }
}

/// Ordered set of namespace declarations, keyed by prefix.
///
/// The empty prefix stands for the default namespace (`xmlns="..."`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    entries: Vec<NamespaceDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix` to `uri`, replacing an existing binding of the same prefix in place.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.entries.iter_mut().find(|d| d.prefix == prefix) {
            Some(existing) => existing.uri = uri,
            None => self.entries.push(NamespaceDecl { prefix, uri }),
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|d| d.prefix == prefix)
            .map(|d| d.uri.as_str())
    }

    /// First non-default prefix bound to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|d| d.uri == uri && !d.prefix.is_empty())
            .map(|d| d.prefix.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceDecl> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Into<String>, U: Into<String>> FromIterator<(P, U)> for Namespaces {
    fn from_iter<I: IntoIterator<Item = (P, U)>>(iter: I) -> Self {
        let mut namespaces = Namespaces::new();
        for (prefix, uri) in iter {
            namespaces.insert(prefix, uri);
        }
        namespaces
    }
}

/// Document-level information (`<metadata>`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub author: Option<Person>,
    pub copyright: Option<Copyright>,
    pub links: Vec<GpxLink>,
    pub time: Option<DateTime<Utc>>,
    pub keywords: Option<String>,
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub link: Option<GpxLink>,
}

/// An e-mail address split as `id@domain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Email {
    pub id: String,
    pub domain: String,
}

impl Email {
    /// Split a plain `id@domain` string, as GPX 1.0 writes it.
    pub fn parse(address: &str) -> Option<Self> {
        let (id, domain) = address.trim().split_once('@')?;
        Some(Self {
            id: id.to_string(),
            domain: domain.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Copyright {
    pub author: String,
    pub year: Option<i32>,
    pub license: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// A GPX link element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxLink {
    pub href: String,
    pub text: Option<String>,
    pub link_type: Option<String>,
}

/// Type of GPS fix (`<fix>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    None,
    TwoD,
    ThreeD,
    Dgps,
    Pps,
}

impl Fix {
    pub fn as_str(self) -> &'static str {
        match self {
            Fix::None => "none",
            Fix::TwoD => "2d",
            Fix::ThreeD => "3d",
            Fix::Dgps => "dgps",
            Fix::Pps => "pps",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "none" => Some(Fix::None),
            "2d" => Some(Fix::TwoD),
            "3d" => Some(Fix::ThreeD),
            "dgps" => Some(Fix::Dgps),
            "pps" => Some(Fix::Pps),
            _ => None,
        }
    }
}

/// A single GPX point (used for wpt, rtept, trkpt).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub magvar: Option<f64>,
    pub geoid_height: Option<f64>,
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub links: Vec<GpxLink>,
    pub sym: Option<String>,
    pub point_type: Option<String>,
    pub fix: Option<Fix>,
    pub sat: Option<u32>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,
    pub pdop: Option<f64>,
    pub age_of_dgps_data: Option<f64>,
    pub dgps_id: Option<u16>,
    pub extensions: Option<Extensions>,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ..Self::default()
        }
    }
}

/// A GPX route (<rte>).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub links: Vec<GpxLink>,
    pub number: Option<u32>,
    pub route_type: Option<String>,
    pub extensions: Option<Extensions>,
    pub points: Vec<Waypoint>,
}

/// A GPX track (<trk>).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub cmt: Option<String>,
    pub desc: Option<String>,
    pub src: Option<String>,
    pub links: Vec<GpxLink>,
    pub number: Option<u32>,
    pub track_type: Option<String>,
    pub extensions: Option<Extensions>,
    pub segments: Vec<TrackSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSegment {
    pub points: Vec<Waypoint>,
    pub extensions: Option<Extensions>,
}
