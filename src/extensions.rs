//! Extension elements: a generic element tree for the wire form and a
//! type-keyed bag for caller-defined payloads.

use std::any::{Any, TypeId};
use std::fmt;

use crate::error::Result;

/// A generic XML element as found inside `<extensions>`.
///
/// The prefix is kept for writing only; equality ignores it, since the same
/// element may be re-prefixed on save.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local_name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

/// An attribute by namespace and local name. Attributes without a prefix
/// are in no namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl PartialEq for XmlElement {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.local_name == other.local_name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl XmlElement {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
            ..Self::default()
        }
    }

    /// An element in no namespace.
    pub fn unqualified(local_name: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            namespace: None,
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_attribute_ns(
        mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(XmlAttribute {
            namespace: Some(namespace.into()),
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a text-only child element in this element's namespace.
    pub fn with_text_child(mut self, local_name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut child = XmlElement {
            namespace: self.namespace.clone(),
            prefix: self.prefix.clone(),
            local_name: local_name.into(),
            ..Self::default()
        };
        child.children.push(XmlNode::Text(text.into()));
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn matches(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.local_name == local_name
    }

    /// Value of an unqualified attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attribute_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name, in any namespace.
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.local_name == local_name)
    }

    /// Concatenated text content of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    pub fn child_text(&self, local_name: &str) -> Option<String> {
        self.child(local_name).map(XmlElement::text)
    }
}

/// A caller-defined extension payload.
///
/// Implementors are registered with
/// [`Gpx::register_extension_type`](crate::context::Gpx::register_extension_type)
/// before loading, so that matching elements inside `<extensions>` are decoded
/// into `Self` instead of being kept as [`XmlElement`] trees.
pub trait GpxExtension: Any + Clone + fmt::Debug + Send + Sync {
    const NAMESPACE: &'static str;
    const LOCAL_NAME: &'static str;

    fn from_element(element: &XmlElement) -> Result<Self>;

    /// Encode into an element named `LOCAL_NAME` in `NAMESPACE`.
    fn to_element(&self) -> XmlElement;
}

pub(crate) trait ExtensionPayload: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn encode(&self) -> XmlElement;
    fn clone_box(&self) -> Box<dyn ExtensionPayload>;
}

impl<T: GpxExtension> ExtensionPayload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn encode(&self) -> XmlElement {
        GpxExtension::to_element(self)
    }

    fn clone_box(&self) -> Box<dyn ExtensionPayload> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn ExtensionPayload> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

type DecodeFn = fn(&XmlElement) -> Result<Box<dyn ExtensionPayload>>;

/// Schema hint for one registered extension type.
#[derive(Clone)]
pub struct ExtensionType {
    type_id: TypeId,
    type_name: &'static str,
    namespace: &'static str,
    local_name: &'static str,
    decode: DecodeFn,
}

impl ExtensionType {
    pub fn of<T: GpxExtension>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            namespace: T::NAMESPACE,
            local_name: T::LOCAL_NAME,
            decode: decode_as::<T>,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn local_name(&self) -> &'static str {
        self.local_name
    }

    pub(crate) fn decode(&self, element: &XmlElement) -> Result<Box<dyn ExtensionPayload>> {
        (self.decode)(element)
    }
}

impl fmt::Debug for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionType")
            .field("type_name", &self.type_name)
            .field("namespace", &self.namespace)
            .field("local_name", &self.local_name)
            .finish()
    }
}

fn decode_as<T: GpxExtension>(element: &XmlElement) -> Result<Box<dyn ExtensionPayload>> {
    Ok(Box::new(T::from_element(element)?))
}

#[derive(Debug, Clone)]
enum Entry {
    Typed(Box<dyn ExtensionPayload>),
    Unknown(XmlElement),
}

impl Entry {
    fn holds(&self, type_id: TypeId) -> bool {
        match self {
            Entry::Typed(payload) => payload.as_any().type_id() == type_id,
            Entry::Unknown(_) => false,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entry::Typed(a), Entry::Typed(b)) => {
                a.as_any().type_id() == b.as_any().type_id() && a.encode() == b.encode()
            }
            (Entry::Unknown(a), Entry::Unknown(b)) => a == b,
            _ => false,
        }
    }
}

/// Type-keyed container behind every `<extensions>` element.
///
/// Holds at most one payload per extension type; [`Extensions::insert`]
/// replaces an existing payload of the same type. Elements that matched no
/// registered type are kept in document order next to the typed payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    entries: Vec<Entry>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains<T: GpxExtension>(&self) -> bool {
        self.position::<T>().is_some()
    }

    pub fn try_get_single<T: GpxExtension>(&self) -> Option<&T> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Typed(payload) => payload.as_any().downcast_ref::<T>(),
            Entry::Unknown(_) => None,
        })
    }

    pub fn get_mut<T: GpxExtension>(&mut self) -> Option<&mut T> {
        self.entries.iter_mut().find_map(|entry| match entry {
            Entry::Typed(payload) => payload.as_any_mut().downcast_mut::<T>(),
            Entry::Unknown(_) => None,
        })
    }

    pub fn get_or_create<T: GpxExtension + Default>(&mut self) -> &mut T {
        let index = match self.position::<T>() {
            Some(index) => index,
            None => {
                self.entries.push(Entry::Typed(Box::new(T::default())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[index] {
            Entry::Typed(payload) => payload
                .as_any_mut()
                .downcast_mut::<T>()
                .unwrap_or_else(|| unreachable!("entry at {index} holds {}", std::any::type_name::<T>())),
            Entry::Unknown(_) => unreachable!("typed position points at an unknown element"),
        }
    }

    /// Store `value`, returning the payload of the same type it replaced.
    pub fn insert<T: GpxExtension>(&mut self, value: T) -> Option<T> {
        match self.position::<T>() {
            Some(index) => {
                let previous = std::mem::replace(&mut self.entries[index], Entry::Typed(Box::new(value)));
                take_typed::<T>(previous)
            }
            None => {
                self.entries.push(Entry::Typed(Box::new(value)));
                None
            }
        }
    }

    pub fn remove<T: GpxExtension>(&mut self) -> Option<T> {
        let index = self.position::<T>()?;
        take_typed::<T>(self.entries.remove(index))
    }

    /// Elements that matched no registered extension type.
    pub fn unknown(&self) -> impl Iterator<Item = &XmlElement> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Unknown(element) => Some(element),
            Entry::Typed(_) => None,
        })
    }

    pub fn push_unknown(&mut self, element: XmlElement) {
        self.entries.push(Entry::Unknown(element));
    }

    /// Every entry in its wire form, in document order.
    pub fn to_elements(&self) -> Vec<XmlElement> {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Typed(payload) => payload.encode(),
                Entry::Unknown(element) => element.clone(),
            })
            .collect()
    }

    pub(crate) fn insert_payload(&mut self, payload: Box<dyn ExtensionPayload>) {
        let type_id = payload.as_any().type_id();
        match self.entries.iter().position(|e| e.holds(type_id)) {
            Some(index) => self.entries[index] = Entry::Typed(payload),
            None => self.entries.push(Entry::Typed(payload)),
        }
    }

    fn position<T: GpxExtension>(&self) -> Option<usize> {
        let type_id = TypeId::of::<T>();
        self.entries.iter().position(|e| e.holds(type_id))
    }
}

fn take_typed<T: GpxExtension>(entry: Entry) -> Option<T> {
    match entry {
        Entry::Typed(payload) => payload.into_any().downcast::<T>().ok().map(|b| *b),
        Entry::Unknown(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://example.com/ext/";

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Heart {
        bpm: u32,
    }

    impl GpxExtension for Heart {
        const NAMESPACE: &'static str = NS;
        const LOCAL_NAME: &'static str = "Heart";

        fn from_element(element: &XmlElement) -> Result<Self> {
            let bpm = element
                .child_text("bpm")
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or_default();
            Ok(Self { bpm })
        }

        fn to_element(&self) -> XmlElement {
            XmlElement::new(NS, "Heart").with_text_child("bpm", self.bpm.to_string())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Flag;

    impl GpxExtension for Flag {
        const NAMESPACE: &'static str = NS;
        const LOCAL_NAME: &'static str = "Flag";

        fn from_element(_: &XmlElement) -> Result<Self> {
            Ok(Self)
        }

        fn to_element(&self) -> XmlElement {
            XmlElement::new(NS, "Flag")
        }
    }

    #[test]
    fn test_get_or_create_returns_same_instance() {
        let mut ext = Extensions::new();
        ext.get_or_create::<Heart>().bpm = 120;
        ext.get_or_create::<Heart>().bpm += 1;
        assert_eq!(ext.len(), 1);
        assert_eq!(ext.try_get_single::<Heart>(), Some(&Heart { bpm: 121 }));
    }

    #[test]
    fn test_try_get_single_absent() {
        let mut ext = Extensions::new();
        ext.get_or_create::<Flag>();
        assert!(ext.try_get_single::<Heart>().is_none());
        assert!(ext.contains::<Flag>());
    }

    #[test]
    fn test_insert_replaces_same_type() {
        let mut ext = Extensions::new();
        assert_eq!(ext.insert(Heart { bpm: 90 }), None);
        assert_eq!(ext.insert(Heart { bpm: 100 }), Some(Heart { bpm: 90 }));
        assert_eq!(ext.len(), 1);
        assert_eq!(ext.remove::<Heart>(), Some(Heart { bpm: 100 }));
        assert!(ext.is_empty());
    }

    #[test]
    fn test_unknown_elements_keep_order() {
        let mut ext = Extensions::new();
        ext.push_unknown(XmlElement::new("http://other/", "a"));
        ext.insert(Flag);
        ext.push_unknown(XmlElement::new("http://other/", "b"));
        let names: Vec<String> = ext.to_elements().into_iter().map(|e| e.local_name).collect();
        assert_eq!(names, ["a", "Flag", "b"]);
        assert_eq!(ext.unknown().count(), 2);
    }

    #[test]
    fn test_equality_compares_wire_form() {
        let mut a = Extensions::new();
        a.insert(Heart { bpm: 60 });
        let mut b = a.clone();
        assert_eq!(a, b);
        b.get_mut::<Heart>().unwrap().bpm = 61;
        assert_ne!(a, b);
    }

    #[test]
    fn test_element_equality_ignores_prefix() {
        let mut a = XmlElement::new(NS, "x").with_text_child("y", "1");
        a.prefix = Some("p".to_string());
        let b = XmlElement::new(NS, "x").with_text_child("y", "1");
        assert_eq!(a, b);
        assert_eq!(a.child_text("y").as_deref(), Some("1"));
    }

    #[test]
    fn test_attribute_lookup_by_namespace() {
        let e = XmlElement::new(NS, "x")
            .with_attribute("k", "plain")
            .with_attribute_ns("http://other/", "k", "qualified");
        assert_eq!(e.attribute("k"), Some("plain"));
        assert_eq!(e.attribute_ns("http://other/", "k"), Some("qualified"));
        assert_eq!(e.attribute_ns(NS, "k"), None);
    }
}
