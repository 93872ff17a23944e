use std::fmt::Display;
use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::extensions::{Extensions, XmlElement, XmlNode};
use crate::gpx_types::*;
use crate::options::SaveOptions;
use crate::save::PreparedFile;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Write a prepared document as GPX 1.1, elements in schema order.
pub fn write_gpx<W: Write>(file: &PreparedFile<'_>, sink: W, options: &SaveOptions) -> Result<()> {
    let xml = if options.indent > 0 {
        Writer::new_with_indent(sink, b' ', options.indent)
    } else {
        Writer::new(sink)
    };
    let mut out = GpxWriter {
        xml,
        namespaces: &file.namespaces,
    };

    if options.xml_declaration {
        out.xml
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    }
    out.write_root(file)
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

struct GpxWriter<'n, W: Write> {
    xml: Writer<W>,
    /// Declarations on the root element.
    namespaces: &'n Namespaces,
}

impl<'n, W: Write> GpxWriter<'n, W> {
    fn start(&mut self, name: &str) -> Result<()> {
        self.xml.write_event(Event::Start(BytesStart::new(name)))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.xml.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start(name)?;
        self.xml.write_event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn opt_text(&mut self, name: &str, value: &Option<String>) -> Result<()> {
        match value {
            Some(text) => self.text_element(name, text),
            None => Ok(()),
        }
    }

    fn opt_value<T: Display>(&mut self, name: &str, value: &Option<T>) -> Result<()> {
        match value {
            Some(v) => self.text_element(name, &v.to_string()),
            None => Ok(()),
        }
    }

    fn opt_time(&mut self, value: &Option<DateTime<Utc>>) -> Result<()> {
        match value {
            Some(time) => self.text_element("time", &format_time(time)),
            None => Ok(()),
        }
    }

    fn write_root(&mut self, file: &PreparedFile<'_>) -> Result<()> {
        let mut root = BytesStart::new("gpx");
        root.push_attribute(("version", file.version));
        root.push_attribute(("creator", file.creator));
        for decl in file.namespaces.iter() {
            if decl.prefix.is_empty() {
                root.push_attribute(("xmlns", decl.uri.as_str()));
            } else {
                let key = format!("xmlns:{}", decl.prefix);
                root.push_attribute((key.as_str(), decl.uri.as_str()));
            }
        }
        self.xml.write_event(Event::Start(root))?;

        if let Some(metadata) = file.metadata {
            self.write_metadata(metadata)?;
        }
        for waypoint in file.waypoints {
            self.write_point("wpt", waypoint)?;
        }
        for route in file.routes {
            self.write_route(route)?;
        }
        for track in file.tracks {
            self.write_track(track)?;
        }
        if let Some(extensions) = file.extensions {
            self.write_extensions(extensions)?;
        }

        self.end("gpx")
    }

    fn write_metadata(&mut self, meta: &Metadata) -> Result<()> {
        self.start("metadata")?;
        self.opt_text("name", &meta.name)?;
        self.opt_text("desc", &meta.desc)?;
        if let Some(author) = &meta.author {
            self.write_person(author)?;
        }
        if let Some(copyright) = &meta.copyright {
            self.write_copyright(copyright)?;
        }
        for link in &meta.links {
            self.write_link(link)?;
        }
        self.opt_time(&meta.time)?;
        self.opt_text("keywords", &meta.keywords)?;
        if let Some(bounds) = &meta.bounds {
            self.write_bounds(bounds)?;
        }
        self.end("metadata")
    }

    fn write_person(&mut self, person: &Person) -> Result<()> {
        self.start("author")?;
        self.opt_text("name", &person.name)?;
        if let Some(email) = &person.email {
            let mut tag = BytesStart::new("email");
            tag.push_attribute(("id", email.id.as_str()));
            tag.push_attribute(("domain", email.domain.as_str()));
            self.xml.write_event(Event::Empty(tag))?;
        }
        if let Some(link) = &person.link {
            self.write_link(link)?;
        }
        self.end("author")
    }

    fn write_copyright(&mut self, copyright: &Copyright) -> Result<()> {
        let mut tag = BytesStart::new("copyright");
        tag.push_attribute(("author", copyright.author.as_str()));
        if copyright.year.is_none() && copyright.license.is_none() {
            self.xml.write_event(Event::Empty(tag))?;
            return Ok(());
        }
        self.xml.write_event(Event::Start(tag))?;
        self.opt_value("year", &copyright.year)?;
        self.opt_text("license", &copyright.license)?;
        self.end("copyright")
    }

    fn write_link(&mut self, link: &GpxLink) -> Result<()> {
        let mut tag = BytesStart::new("link");
        tag.push_attribute(("href", link.href.as_str()));
        if link.text.is_none() && link.link_type.is_none() {
            self.xml.write_event(Event::Empty(tag))?;
            return Ok(());
        }
        self.xml.write_event(Event::Start(tag))?;
        self.opt_text("text", &link.text)?;
        self.opt_text("type", &link.link_type)?;
        self.end("link")
    }

    fn write_bounds(&mut self, bounds: &Bounds) -> Result<()> {
        let mut tag = BytesStart::new("bounds");
        tag.push_attribute(("minlat", bounds.min_lat.to_string().as_str()));
        tag.push_attribute(("minlon", bounds.min_lon.to_string().as_str()));
        tag.push_attribute(("maxlat", bounds.max_lat.to_string().as_str()));
        tag.push_attribute(("maxlon", bounds.max_lon.to_string().as_str()));
        self.xml.write_event(Event::Empty(tag))?;
        Ok(())
    }

    fn write_point(&mut self, name: &str, point: &Waypoint) -> Result<()> {
        let mut tag = BytesStart::new(name);
        tag.push_attribute(("lat", point.lat.to_string().as_str()));
        tag.push_attribute(("lon", point.lon.to_string().as_str()));
        if *point == Waypoint::new(point.lat, point.lon) {
            self.xml.write_event(Event::Empty(tag))?;
            return Ok(());
        }
        self.xml.write_event(Event::Start(tag))?;

        self.opt_value("ele", &point.ele)?;
        self.opt_time(&point.time)?;
        self.opt_value("magvar", &point.magvar)?;
        self.opt_value("geoidheight", &point.geoid_height)?;
        self.opt_text("name", &point.name)?;
        self.opt_text("cmt", &point.cmt)?;
        self.opt_text("desc", &point.desc)?;
        self.opt_text("src", &point.src)?;
        for link in &point.links {
            self.write_link(link)?;
        }
        self.opt_text("sym", &point.sym)?;
        self.opt_text("type", &point.point_type)?;
        if let Some(fix) = point.fix {
            self.text_element("fix", fix.as_str())?;
        }
        self.opt_value("sat", &point.sat)?;
        self.opt_value("hdop", &point.hdop)?;
        self.opt_value("vdop", &point.vdop)?;
        self.opt_value("pdop", &point.pdop)?;
        self.opt_value("ageofdgpsdata", &point.age_of_dgps_data)?;
        self.opt_value("dgpsid", &point.dgps_id)?;
        if let Some(extensions) = &point.extensions {
            self.write_extensions(extensions)?;
        }

        self.end(name)
    }

    fn write_route(&mut self, route: &Route) -> Result<()> {
        self.start("rte")?;
        self.opt_text("name", &route.name)?;
        self.opt_text("cmt", &route.cmt)?;
        self.opt_text("desc", &route.desc)?;
        self.opt_text("src", &route.src)?;
        for link in &route.links {
            self.write_link(link)?;
        }
        self.opt_value("number", &route.number)?;
        self.opt_text("type", &route.route_type)?;
        if let Some(extensions) = &route.extensions {
            self.write_extensions(extensions)?;
        }
        for point in &route.points {
            self.write_point("rtept", point)?;
        }
        self.end("rte")
    }

    fn write_track(&mut self, track: &Track) -> Result<()> {
        self.start("trk")?;
        self.opt_text("name", &track.name)?;
        self.opt_text("cmt", &track.cmt)?;
        self.opt_text("desc", &track.desc)?;
        self.opt_text("src", &track.src)?;
        for link in &track.links {
            self.write_link(link)?;
        }
        self.opt_value("number", &track.number)?;
        self.opt_text("type", &track.track_type)?;
        if let Some(extensions) = &track.extensions {
            self.write_extensions(extensions)?;
        }
        for segment in &track.segments {
            self.start("trkseg")?;
            for point in &segment.points {
                self.write_point("trkpt", point)?;
            }
            if let Some(extensions) = &segment.extensions {
                self.write_extensions(extensions)?;
            }
            self.end("trkseg")?;
        }
        self.end("trk")
    }

    fn write_extensions(&mut self, extensions: &Extensions) -> Result<()> {
        let elements = extensions.to_elements();
        if elements.is_empty() {
            return Ok(());
        }
        let namespaces = self.namespaces;
        let default_namespace = namespaces.get("");
        self.start("extensions")?;
        for element in &elements {
            self.write_element(element, default_namespace)?;
        }
        self.end("extensions")
    }

    /// Write an extension element tree. Namespaces bound on the root are
    /// written with their prefix; anything else gets a local default
    /// namespace declaration.
    fn write_element<'e>(&mut self, element: &'e XmlElement, default_namespace: Option<&'e str>) -> Result<()> {
        let namespaces = self.namespaces;
        let mut child_default = default_namespace;
        let mut declare_default = None;

        let qname = match element.namespace.as_deref() {
            Some(ns) if Some(ns) == default_namespace => element.local_name.clone(),
            Some(ns) => match namespaces.prefix_for(ns) {
                Some(prefix) => format!("{prefix}:{}", element.local_name),
                None => {
                    declare_default = Some(ns);
                    child_default = Some(ns);
                    element.local_name.clone()
                }
            },
            None if default_namespace.is_some() => {
                // undeclare the inherited default namespace
                declare_default = Some("");
                child_default = None;
                element.local_name.clone()
            }
            None => element.local_name.clone(),
        };

        let attribute_names = AttributeNames::of(element, namespaces);
        let mut tag = BytesStart::new(qname.as_str());
        if let Some(uri) = declare_default {
            tag.push_attribute(("xmlns", uri));
        }
        for (prefix, uri) in &attribute_names.declarations {
            tag.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
        for (attribute, name) in element.attributes.iter().zip(&attribute_names.names) {
            tag.push_attribute((name.as_str(), attribute.value.as_str()));
        }

        if element.children.is_empty() {
            self.xml.write_event(Event::Empty(tag))?;
            return Ok(());
        }

        self.xml.write_event(Event::Start(tag))?;
        for node in &element.children {
            match node {
                XmlNode::Element(child) => self.write_element(child, child_default)?,
                XmlNode::Text(text) => {
                    self.xml.write_event(Event::Text(BytesText::new(text)))?;
                }
            }
        }
        self.end(&qname)
    }
}

/// Qualified attribute names for one extension element, plus the local
/// `xmlns:nsN` declarations needed for namespaces not bound on the root.
struct AttributeNames {
    names: Vec<String>,
    declarations: Vec<(String, String)>,
}

impl AttributeNames {
    fn of(element: &XmlElement, namespaces: &Namespaces) -> Self {
        let mut declarations: Vec<(String, String)> = Vec::new();
        let mut next = 0usize;
        let names = element
            .attributes
            .iter()
            .map(|attribute| {
                let Some(uri) = attribute.namespace.as_deref() else {
                    return attribute.name.clone();
                };
                let prefix = if uri == XML_NAMESPACE {
                    "xml".to_string()
                } else if let Some(prefix) = namespaces.prefix_for(uri) {
                    prefix.to_string()
                } else if let Some(index) = declarations.iter().position(|(_, u)| u.as_str() == uri) {
                    declarations[index].0.clone()
                } else {
                    // skip prefixes bound on the root so they stay visible below
                    let prefix = loop {
                        let candidate = format!("ns{next}");
                        next += 1;
                        if namespaces.get(&candidate).is_none() {
                            break candidate;
                        }
                    };
                    declarations.push((prefix.clone(), uri.to_string()));
                    prefix
                };
                format!("{prefix}:{}", attribute.name)
            })
            .collect();
        Self { names, declarations }
    }
}
