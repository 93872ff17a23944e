use std::io::BufRead;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesRef, BytesStart, Event};

use crate::binding::GpxBinding;
use crate::dialect::GpxVersion;
use crate::error::GpxError;
use crate::extensions::{Extensions, XmlAttribute, XmlElement, XmlNode};
use crate::gpx_types::*;

type Result<T> = std::result::Result<T, GpxError>;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse a GPX document from `source` with the given binding engine.
pub fn parse_gpx<R: BufRead>(source: R, binding: &GpxBinding) -> Result<GpxFile> {
    let mut parser = Parser {
        src: EventSource::new(source),
        binding,
    };
    parser.read_document()
}

/// Pull reader that keeps track of the namespace declarations in scope.
struct EventSource<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    scopes: Vec<Vec<(String, String)>>,
    pop_pending: bool,
}

impl<R: BufRead> EventSource<R> {
    fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            scopes: Vec::new(),
            pop_pending: false,
        }
    }

    fn next(&mut self) -> Result<Event<'static>> {
        if self.pop_pending {
            self.scopes.pop();
            self.pop_pending = false;
        }
        self.buf.clear();
        let event = self.reader.read_event_into(&mut self.buf)?.into_owned();
        match &event {
            Event::Start(e) => self.scopes.push(declarations(e)?),
            Event::Empty(e) => {
                // An empty element's scope ends with the element itself.
                self.scopes.push(declarations(e)?);
                self.pop_pending = true;
            }
            Event::End(_) => {
                self.scopes.pop();
            }
            _ => {}
        }
        Ok(event)
    }

    /// Namespace URI bound to the prefix of `qname` in the current scope.
    fn resolve(&self, qname: &[u8]) -> Option<String> {
        let qname = std::str::from_utf8(qname).ok()?;
        let prefix = qname.split_once(':').map(|(p, _)| p).unwrap_or("");
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then(|| uri.clone()))
    }

    /// Namespace of an attribute key. Unprefixed attributes are in no
    /// namespace; a prefix must be bound.
    fn resolve_attribute(&self, key: &[u8]) -> Result<Option<String>> {
        if !key.contains(&b':') {
            return Ok(None);
        }
        match self.resolve(key) {
            Some(uri) => Ok(Some(uri)),
            None => Err(GpxError::xml(format!(
                "Unbound namespace prefix on attribute '{}'",
                String::from_utf8_lossy(key)
            ))),
        }
    }
}

/// `xmlns` / `xmlns:p` declarations on a start tag.
fn declarations(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut decls = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::XmlParse(e.into()))?;
        if let Some(prefix) = declared_prefix(attr.key.as_ref())? {
            decls.push((prefix.to_string(), attribute_value(&attr)?));
        }
    }
    Ok(decls)
}

/// Prefix declared by an attribute key: `""` for `xmlns`, `p` for `xmlns:p`.
fn declared_prefix(key: &[u8]) -> Result<Option<&str>> {
    if key == b"xmlns" {
        return Ok(Some(""));
    }
    match key.strip_prefix(b"xmlns:") {
        Some(prefix) => Ok(Some(std::str::from_utf8(prefix)?)),
        None => Ok(None),
    }
}

fn attribute_value(attr: &Attribute<'_>) -> Result<String> {
    let raw = std::str::from_utf8(&attr.value)?;
    let value = quick_xml::escape::unescape(raw).map_err(|e| GpxError::xml(format!("Attribute value error: {e}")))?;
    Ok(value.into_owned())
}

/// Read an attribute by local name.
fn find_attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::XmlParse(e.into()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attribute_value(&attr)?));
        }
    }
    Ok(None)
}

/// Parse required floating point attributes (lat/lon, bounds) from a start tag.
fn float_attributes<const N: usize>(
    e: &BytesStart<'_>,
    element: &'static str,
    names: [&'static str; N],
) -> Result<[f64; N]> {
    let mut values: [Option<f64>; N] = [None; N];

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| GpxError::XmlParse(e.into()))?;
        let key = attr.key.local_name();
        let Some(index) = names.iter().position(|n| n.as_bytes() == key.as_ref()) else {
            continue;
        };
        let raw = attribute_value(&attr)?;
        match raw.trim().parse::<f64>() {
            Ok(value) => values[index] = Some(value),
            Err(_) => {
                return Err(GpxError::InvalidAttribute {
                    element,
                    attribute: names[index],
                    value: raw,
                });
            }
        }
    }

    let mut out = [0.0; N];
    for (index, value) in values.into_iter().enumerate() {
        out[index] = value.ok_or(GpxError::MissingAttribute {
            element,
            attribute: names[index],
        })?;
    }
    Ok(out)
}

fn check_declaration(decl: &BytesDecl<'_>) -> Result<()> {
    let version = decl
        .version()
        .map_err(|e| GpxError::xml(format!("XML declaration error: {e}")))?;
    let version = String::from_utf8_lossy(&version);
    if version != "1.0" {
        return Err(GpxError::UnsupportedXmlVersion(version.into_owned()));
    }
    Ok(())
}

/// Append a run of character data, with `\r\n` and lone `\r` read as `\n`.
fn push_text(text: &mut String, raw: &[u8]) -> Result<()> {
    let raw = std::str::from_utf8(raw)?;
    if raw.contains('\r') {
        text.push_str(&raw.replace("\r\n", "\n").replace('\r', "\n"));
    } else {
        text.push_str(raw);
    }
    Ok(())
}

/// Append a character or predefined entity reference to `text`.
fn push_entity(text: &mut String, e: &BytesRef<'_>) -> Result<()> {
    // Handle character references (&#60; &#x3C;) and predefined entities
    let name = std::str::from_utf8(e.as_ref())?;
    match e.resolve_char_ref() {
        Ok(Some(ch)) => {
            text.push(ch);
            return Ok(());
        }
        Ok(None) => {}
        Err(err) => return Err(GpxError::xml(format!("Invalid character reference &{name};: {err}"))),
    }
    match name {
        "amp" => text.push('&'),
        "lt" => text.push('<'),
        "gt" => text.push('>'),
        "quot" => text.push('"'),
        "apos" => text.push('\''),
        _ => return Err(GpxError::xml(format!("Unknown entity reference &{name};"))),
    }
    Ok(())
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // xsd:dateTime without an offset
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

/// GPX 1.0 `url`/`urlname` pair, folded into a link.
#[derive(Default)]
struct LegacyLink {
    url: Option<String>,
    urlname: Option<String>,
}

impl LegacyLink {
    fn into_link(self) -> Option<GpxLink> {
        Some(GpxLink {
            href: self.url?,
            text: self.urlname,
            link_type: None,
        })
    }
}

struct Parser<'b, R> {
    src: EventSource<R>,
    binding: &'b GpxBinding,
}

impl<R: BufRead> Parser<'_, R> {
    fn read_document(&mut self) -> Result<GpxFile> {
        loop {
            match self.src.next()? {
                Event::Decl(decl) => check_declaration(&decl)?,
                Event::Start(e) => return self.parse_root(&e, false),
                Event::Empty(e) => return self.parse_root(&e, true),
                Event::Eof => return Err(GpxError::xml("Document has no root element")),
                _ => {}
            }
        }
    }

    fn legacy(&self) -> bool {
        self.binding.version() == GpxVersion::V1_0
    }

    /// Whether `e` belongs to the engine's GPX namespace (or to no namespace).
    fn in_gpx_namespace(&self, e: &BytesStart<'_>) -> bool {
        self.src
            .resolve(e.name().as_ref())
            .is_none_or(|ns| ns == self.binding.default_namespace())
    }

    /// Next child element of the current element, or `None` at its end tag.
    fn next_child(&mut self, parent: &'static str) -> Result<Option<(BytesStart<'static>, bool)>> {
        loop {
            match self.src.next()? {
                Event::Start(e) => return Ok(Some((e, false))),
                Event::Empty(e) => return Ok(Some((e, true))),
                Event::End(_) => return Ok(None),
                Event::Eof => {
                    return Err(GpxError::xml(format!(
                        "Unexpected end of document inside <{parent}>"
                    )));
                }
                _ => {}
            }
        }
    }

    /// Skip the rest of an element whose start tag was just read.
    fn skip(&mut self, empty: bool) -> Result<()> {
        if empty {
            return Ok(());
        }
        let mut depth = 1usize;
        loop {
            match self.src.next()? {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Event::Eof => return Err(GpxError::xml("Unexpected end of document")),
                _ => {}
            }
        }
    }

    /// Read text content of an element as an owned String.
    /// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
    fn read_text(&mut self, element: &'static str, empty: bool) -> Result<String> {
        let mut text = String::new();
        if empty {
            return Ok(text);
        }
        loop {
            match self.src.next()? {
                Event::Text(e) => push_text(&mut text, e.as_ref())?,
                Event::CData(e) => push_text(&mut text, e.as_ref())?,
                Event::GeneralRef(e) => push_entity(&mut text, &e)?,
                Event::Start(_) => self.skip(false)?,
                Event::End(_) => break,
                Event::Eof => {
                    return Err(GpxError::xml(format!(
                        "Unexpected end of document inside <{element}>"
                    )));
                }
                _ => {}
            }
        }
        Ok(text)
    }

    fn read_value<T: FromStr>(&mut self, element: &'static str, empty: bool) -> Result<T> {
        let text = self.read_text(element, empty)?;
        match text.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => Err(GpxError::InvalidValue { element, value: text }),
        }
    }

    fn read_time(&mut self, element: &'static str, empty: bool) -> Result<DateTime<Utc>> {
        let text = self.read_text(element, empty)?;
        parse_time(&text).ok_or(GpxError::InvalidValue { element, value: text })
    }

    fn parse_root(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<GpxFile> {
        if start.local_name().as_ref() != b"gpx" || !self.in_gpx_namespace(start) {
            let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
            return Err(GpxError::UnexpectedRoot(
                match self.src.resolve(start.name().as_ref()) {
                    Some(ns) => format!("{name} xmlns=\"{ns}\""),
                    None => name,
                },
            ));
        }

        let mut file = GpxFile::new();
        let mut version = None;
        for attr_result in start.attributes() {
            let attr = attr_result.map_err(|e| GpxError::XmlParse(e.into()))?;
            if let Some(prefix) = declared_prefix(attr.key.as_ref())? {
                file.namespaces.insert(prefix, attribute_value(&attr)?);
                continue;
            }
            match attr.key.local_name().as_ref() {
                b"version" => version = Some(attribute_value(&attr)?),
                b"creator" => file.creator = attribute_value(&attr)?,
                _ => {}
            }
        }

        let version = version.ok_or(GpxError::MissingAttribute {
            element: "gpx",
            attribute: "version",
        })?;
        if GpxVersion::from_tag(&version).is_none() {
            return Err(GpxError::InvalidAttribute {
                element: "gpx",
                attribute: "version",
                value: version,
            });
        }
        file.version = version.trim().to_string();

        if empty {
            return Ok(file);
        }

        let legacy = self.legacy();
        let mut legacy_meta: Option<Metadata> = None;
        let mut legacy_link = LegacyLink::default();

        while let Some((e, empty)) = self.next_child("gpx")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"metadata" => file.metadata = Some(self.parse_metadata(empty)?),
                b"wpt" => file.waypoints.push(self.parse_point(&e, "wpt", empty)?),
                b"rte" => file.routes.push(self.parse_route(empty)?),
                b"trk" => file.tracks.push(self.parse_track(empty)?),
                b"extensions" => file.extensions = Some(self.parse_extensions(empty)?),
                // GPX 1.0 keeps the document information directly on <gpx>
                b"name" if legacy => {
                    let text = self.read_text("name", empty)?;
                    legacy_meta.get_or_insert_with(Metadata::default).name = Some(text);
                }
                b"desc" if legacy => {
                    let text = self.read_text("desc", empty)?;
                    legacy_meta.get_or_insert_with(Metadata::default).desc = Some(text);
                }
                b"author" if legacy => {
                    let text = self.read_text("author", empty)?;
                    let meta = legacy_meta.get_or_insert_with(Metadata::default);
                    meta.author.get_or_insert_with(Person::default).name = Some(text);
                }
                b"email" if legacy => {
                    let text = self.read_text("email", empty)?;
                    let meta = legacy_meta.get_or_insert_with(Metadata::default);
                    meta.author.get_or_insert_with(Person::default).email = Email::parse(&text);
                }
                b"url" if legacy => legacy_link.url = Some(self.read_text("url", empty)?),
                b"urlname" if legacy => legacy_link.urlname = Some(self.read_text("urlname", empty)?),
                b"time" if legacy => {
                    let time = self.read_time("time", empty)?;
                    legacy_meta.get_or_insert_with(Metadata::default).time = Some(time);
                }
                b"keywords" if legacy => {
                    let text = self.read_text("keywords", empty)?;
                    legacy_meta.get_or_insert_with(Metadata::default).keywords = Some(text);
                }
                b"bounds" if legacy => {
                    let bounds = parse_bounds(&e)?;
                    self.skip(empty)?;
                    legacy_meta.get_or_insert_with(Metadata::default).bounds = Some(bounds);
                }
                _ => self.skip(empty)?,
            }
        }

        if let Some(link) = legacy_link.into_link() {
            legacy_meta.get_or_insert_with(Metadata::default).links.push(link);
        }
        if file.metadata.is_none() {
            file.metadata = legacy_meta;
        }

        Ok(file)
    }

    /// Parse a <metadata> element.
    fn parse_metadata(&mut self, empty: bool) -> Result<Metadata> {
        let mut meta = Metadata::default();
        if empty {
            return Ok(meta);
        }

        while let Some((e, empty)) = self.next_child("metadata")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"name" => meta.name = Some(self.read_text("name", empty)?),
                b"desc" => meta.desc = Some(self.read_text("desc", empty)?),
                b"author" => meta.author = Some(self.parse_person(empty)?),
                b"copyright" => meta.copyright = Some(self.parse_copyright(&e, empty)?),
                b"link" => meta.links.push(self.parse_link(&e, empty)?),
                b"time" => meta.time = Some(self.read_time("time", empty)?),
                b"keywords" => meta.keywords = Some(self.read_text("keywords", empty)?),
                b"bounds" => {
                    meta.bounds = Some(parse_bounds(&e)?);
                    self.skip(empty)?;
                }
                _ => self.skip(empty)?,
            }
        }

        Ok(meta)
    }

    /// Parse an <author> element.
    fn parse_person(&mut self, empty: bool) -> Result<Person> {
        let mut person = Person::default();
        if empty {
            return Ok(person);
        }

        while let Some((e, empty)) = self.next_child("author")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"name" => person.name = Some(self.read_text("name", empty)?),
                b"email" => {
                    person.email = Some(Email {
                        id: find_attribute(&e, "id")?.unwrap_or_default(),
                        domain: find_attribute(&e, "domain")?.unwrap_or_default(),
                    });
                    self.skip(empty)?;
                }
                b"link" => person.link = Some(self.parse_link(&e, empty)?),
                _ => self.skip(empty)?,
            }
        }

        Ok(person)
    }

    /// Parse a <copyright> element.
    fn parse_copyright(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<Copyright> {
        let mut copyright = Copyright {
            author: find_attribute(start, "author")?.unwrap_or_default(),
            ..Copyright::default()
        };
        if empty {
            return Ok(copyright);
        }

        while let Some((e, empty)) = self.next_child("copyright")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"year" => copyright.year = Some(self.read_value("year", empty)?),
                b"license" => copyright.license = Some(self.read_text("license", empty)?),
                _ => self.skip(empty)?,
            }
        }

        Ok(copyright)
    }

    /// Parse a <link> element.
    fn parse_link(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<GpxLink> {
        let mut link = GpxLink {
            href: find_attribute(start, "href")?.unwrap_or_default(),
            ..GpxLink::default()
        };
        if empty {
            return Ok(link);
        }

        while let Some((e, empty)) = self.next_child("link")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"text" => link.text = Some(self.read_text("text", empty)?),
                b"type" => link.link_type = Some(self.read_text("type", empty)?),
                _ => self.skip(empty)?,
            }
        }

        Ok(link)
    }

    /// Parse a point element (wpt, rtept, trkpt) and its children.
    fn parse_point(&mut self, start: &BytesStart<'_>, element: &'static str, empty: bool) -> Result<Waypoint> {
        let [lat, lon] = float_attributes(start, element, ["lat", "lon"])?;
        let mut point = Waypoint::new(lat, lon);
        if empty {
            return Ok(point);
        }

        let legacy = self.legacy();
        let mut legacy_link = LegacyLink::default();

        while let Some((e, empty)) = self.next_child(element)? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"ele" => point.ele = Some(self.read_value("ele", empty)?),
                b"time" => point.time = Some(self.read_time("time", empty)?),
                b"magvar" => point.magvar = Some(self.read_value("magvar", empty)?),
                b"geoidheight" => point.geoid_height = Some(self.read_value("geoidheight", empty)?),
                b"name" => point.name = Some(self.read_text("name", empty)?),
                b"cmt" => point.cmt = Some(self.read_text("cmt", empty)?),
                b"desc" => point.desc = Some(self.read_text("desc", empty)?),
                b"src" => point.src = Some(self.read_text("src", empty)?),
                b"link" => point.links.push(self.parse_link(&e, empty)?),
                b"sym" => point.sym = Some(self.read_text("sym", empty)?),
                b"type" => point.point_type = Some(self.read_text("type", empty)?),
                b"fix" => {
                    let text = self.read_text("fix", empty)?;
                    point.fix = Some(Fix::parse(&text).ok_or(GpxError::InvalidValue {
                        element: "fix",
                        value: text,
                    })?);
                }
                b"sat" => point.sat = Some(self.read_value("sat", empty)?),
                b"hdop" => point.hdop = Some(self.read_value("hdop", empty)?),
                b"vdop" => point.vdop = Some(self.read_value("vdop", empty)?),
                b"pdop" => point.pdop = Some(self.read_value("pdop", empty)?),
                b"ageofdgpsdata" => point.age_of_dgps_data = Some(self.read_value("ageofdgpsdata", empty)?),
                b"dgpsid" => point.dgps_id = Some(self.read_value("dgpsid", empty)?),
                b"extensions" => point.extensions = Some(self.parse_extensions(empty)?),
                b"url" if legacy => legacy_link.url = Some(self.read_text("url", empty)?),
                b"urlname" if legacy => legacy_link.urlname = Some(self.read_text("urlname", empty)?),
                _ => {
                    // Skip unknown elements (e.g. GPX 1.0 <course>/<speed>)
                    self.skip(empty)?
                }
            }
        }

        point.links.extend(legacy_link.into_link());
        Ok(point)
    }

    /// Parse a <rte> element.
    fn parse_route(&mut self, empty: bool) -> Result<Route> {
        let mut route = Route::default();
        if empty {
            return Ok(route);
        }

        let legacy = self.legacy();
        let mut legacy_link = LegacyLink::default();

        while let Some((e, empty)) = self.next_child("rte")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"name" => route.name = Some(self.read_text("name", empty)?),
                b"cmt" => route.cmt = Some(self.read_text("cmt", empty)?),
                b"desc" => route.desc = Some(self.read_text("desc", empty)?),
                b"src" => route.src = Some(self.read_text("src", empty)?),
                b"link" => route.links.push(self.parse_link(&e, empty)?),
                b"number" => route.number = Some(self.read_value("number", empty)?),
                b"type" => route.route_type = Some(self.read_text("type", empty)?),
                b"extensions" => route.extensions = Some(self.parse_extensions(empty)?),
                b"rtept" => route.points.push(self.parse_point(&e, "rtept", empty)?),
                b"url" if legacy => legacy_link.url = Some(self.read_text("url", empty)?),
                b"urlname" if legacy => legacy_link.urlname = Some(self.read_text("urlname", empty)?),
                _ => self.skip(empty)?,
            }
        }

        route.links.extend(legacy_link.into_link());
        Ok(route)
    }

    /// Parse a <trk> element.
    fn parse_track(&mut self, empty: bool) -> Result<Track> {
        let mut track = Track::default();
        if empty {
            return Ok(track);
        }

        let legacy = self.legacy();
        let mut legacy_link = LegacyLink::default();

        while let Some((e, empty)) = self.next_child("trk")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"name" => track.name = Some(self.read_text("name", empty)?),
                b"cmt" => track.cmt = Some(self.read_text("cmt", empty)?),
                b"desc" => track.desc = Some(self.read_text("desc", empty)?),
                b"src" => track.src = Some(self.read_text("src", empty)?),
                b"link" => track.links.push(self.parse_link(&e, empty)?),
                b"number" => track.number = Some(self.read_value("number", empty)?),
                b"type" => track.track_type = Some(self.read_text("type", empty)?),
                b"extensions" => track.extensions = Some(self.parse_extensions(empty)?),
                b"trkseg" => track.segments.push(self.parse_segment(empty)?),
                b"url" if legacy => legacy_link.url = Some(self.read_text("url", empty)?),
                b"urlname" if legacy => legacy_link.urlname = Some(self.read_text("urlname", empty)?),
                _ => self.skip(empty)?,
            }
        }

        track.links.extend(legacy_link.into_link());
        Ok(track)
    }

    /// Parse a <trkseg> element.
    fn parse_segment(&mut self, empty: bool) -> Result<TrackSegment> {
        let mut segment = TrackSegment::default();
        if empty {
            return Ok(segment);
        }

        while let Some((e, empty)) = self.next_child("trkseg")? {
            let local = e.local_name();
            let name: &[u8] = if self.in_gpx_namespace(&e) { local.as_ref() } else { b"" };
            match name {
                b"trkpt" => segment.points.push(self.parse_point(&e, "trkpt", empty)?),
                b"extensions" => segment.extensions = Some(self.parse_extensions(empty)?),
                _ => self.skip(empty)?,
            }
        }

        Ok(segment)
    }

    /// Parse an <extensions> element, decoding registered extension types.
    fn parse_extensions(&mut self, empty: bool) -> Result<Extensions> {
        let mut extensions = Extensions::new();
        if empty {
            return Ok(extensions);
        }

        while let Some((e, empty)) = self.next_child("extensions")? {
            let element = self.read_element(&e, empty)?;
            match self
                .binding
                .extension_type_for(element.namespace.as_deref(), &element.local_name)
            {
                Some(extension_type) => extensions.insert_payload(extension_type.decode(&element)?),
                None => extensions.push_unknown(element),
            }
        }

        Ok(extensions)
    }

    /// Read an arbitrary element subtree into an [`XmlElement`].
    fn read_element(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<XmlElement> {
        let namespace = self.src.resolve(start.name().as_ref());
        let qname = std::str::from_utf8(start.name().as_ref())?.to_string();
        let (prefix, local_name) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, qname.clone()),
        };

        let mut element = XmlElement {
            namespace,
            prefix,
            local_name,
            ..XmlElement::default()
        };

        for attr_result in start.attributes() {
            let attr = attr_result.map_err(|e| GpxError::XmlParse(e.into()))?;
            if declared_prefix(attr.key.as_ref())?.is_some() {
                continue;
            }
            element.attributes.push(XmlAttribute {
                namespace: self.src.resolve_attribute(attr.key.as_ref())?,
                name: std::str::from_utf8(attr.key.local_name().as_ref())?.to_string(),
                value: attribute_value(&attr)?,
            });
        }

        if empty {
            return Ok(element);
        }

        let mut text = String::new();
        loop {
            match self.src.next()? {
                Event::Start(e) => {
                    flush_text(&mut element, &mut text);
                    let child = self.read_element(&e, false)?;
                    element.children.push(XmlNode::Element(child));
                }
                Event::Empty(e) => {
                    flush_text(&mut element, &mut text);
                    let child = self.read_element(&e, true)?;
                    element.children.push(XmlNode::Element(child));
                }
                Event::Text(e) => push_text(&mut text, e.as_ref())?,
                Event::CData(e) => push_text(&mut text, e.as_ref())?,
                Event::GeneralRef(e) => push_entity(&mut text, &e)?,
                Event::End(_) => break,
                Event::Eof => {
                    return Err(GpxError::xml(format!(
                        "Unexpected end of document inside <{qname}>"
                    )));
                }
                _ => {}
            }
        }
        flush_text(&mut element, &mut text);

        // Indentation between child elements is not content.
        if element.child_elements().next().is_some() {
            element
                .children
                .retain(|node| !matches!(node, XmlNode::Text(t) if t.trim().is_empty()));
        }

        Ok(element)
    }
}

fn flush_text(element: &mut XmlElement, text: &mut String) {
    if !text.is_empty() {
        element.children.push(XmlNode::Text(std::mem::take(text)));
    }
}

fn parse_bounds(e: &BytesStart<'_>) -> Result<Bounds> {
    let [min_lat, min_lon, max_lat, max_lon] =
        float_attributes(e, "bounds", ["minlat", "minlon", "maxlat", "maxlon"])?;
    Ok(Bounds {
        min_lat,
        min_lon,
        max_lat,
        max_lon,
    })
}
