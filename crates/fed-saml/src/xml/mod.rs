//! Minimal namespace-aware XML tree.
//!
//! The handlers need to manipulate documents in place: insert a signature
//! after the `Issuer`, swap an `Assertion` for an `EncryptedAssertion`,
//! strip a signature back out for verification. This module provides an
//! owned element tree over quick-xml for exactly that.
//!
//! Serialization is deterministic: attributes are written in stored order,
//! no whitespace is added between elements and whitespace-only text is
//! dropped when parsing. A document parsed from the output of
//! [`Element::to_xml`] serializes to the same bytes, which is what the
//! signature digest is computed over.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{SamlError, SamlResult};

/// An XML attribute, keyed by its qualified name as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name, e.g. `ID` or `xmlns:saml`.
    pub name: String,
    /// Unescaped value.
    pub value: String,
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data.
    Text(String),
}

/// An XML element with its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Namespace prefix as written.
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    /// Resolved namespace URI.
    pub namespace: Option<String>,
    /// Attributes, including namespace declarations.
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element in a namespace.
    #[must_use]
    pub fn new(prefix: Option<&str>, name: &str, namespace: Option<&str>) -> Self {
        Self {
            prefix: prefix.map(str::to_string),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a prefixed element and declares its namespace on it.
    #[must_use]
    pub fn declared(prefix: &str, name: &str, namespace: &str) -> Self {
        Self::new(Some(prefix), name, Some(namespace))
            .with_attribute(format!("xmlns:{prefix}"), namespace)
    }

    /// Returns the qualified name (`prefix:name`).
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Checks the namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Adds an attribute if the value is present.
    #[must_use]
    pub fn with_optional_attribute(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_attribute(name, value),
            None => self,
        }
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Appends a text node.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Sets or replaces an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    /// Returns an attribute value by qualified name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Iterates over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(namespace, name))
    }

    /// Iterates over child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| e.is(namespace, name))
    }

    /// Concatenated text of the direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Text of the first child node, if that node is text.
    #[must_use]
    pub fn first_child_text(&self) -> Option<&str> {
        match self.children.first() {
            Some(Node::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Text of a named child element.
    #[must_use]
    pub fn child_text(&self, namespace: &str, name: &str) -> Option<String> {
        self.child(namespace, name).map(Element::text)
    }

    /// Depth-first search for an element, including `self`.
    #[must_use]
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Element> {
        let path = self.find_path(namespace, name)?;
        self.element_at(&path)
    }

    /// Depth-first search returning the child index path to the element.
    ///
    /// An empty path denotes `self`.
    #[must_use]
    pub fn find_path(&self, namespace: &str, name: &str) -> Option<Vec<usize>> {
        if self.is(namespace, name) {
            return Some(Vec::new());
        }
        for (index, node) in self.children.iter().enumerate() {
            if let Node::Element(child) = node {
                if let Some(mut path) = child.find_path(namespace, name) {
                    path.insert(0, index);
                    return Some(path);
                }
            }
        }
        None
    }

    /// Returns the element at a child index path.
    #[must_use]
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self.children.get(*first)? {
            Node::Element(child) => child.element_at(rest),
            Node::Text(_) => None,
        }
    }

    /// Returns the element at a child index path, mutably.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let Some((first, rest)) = path.split_first() else {
            return Some(self);
        };
        match self.children.get_mut(*first)? {
            Node::Element(child) => child.element_at_mut(rest),
            Node::Text(_) => None,
        }
    }

    /// Replaces the element at a non-empty path, returning the old element.
    pub fn replace_at(&mut self, path: &[usize], replacement: Element) -> Option<Element> {
        let (last, parent_path) = path.split_last()?;
        let parent = self.element_at_mut(parent_path)?;
        let slot = parent.children.get_mut(*last)?;
        if !matches!(slot, Node::Element(_)) {
            return None;
        }
        match std::mem::replace(slot, Node::Element(replacement)) {
            Node::Element(old) => Some(old),
            Node::Text(_) => None,
        }
    }

    /// Copies the element at `path` and adds the namespace declarations it
    /// inherits from its ancestors, so it can stand alone as a document.
    #[must_use]
    pub fn detached(&self, path: &[usize]) -> Option<Element> {
        let mut inherited: Vec<Attribute> = Vec::new();
        let mut current = self;
        for index in path {
            for decl in current.attributes.iter().filter(|a| is_namespace_declaration(&a.name)) {
                inherited.retain(|a| a.name != decl.name);
                inherited.push(decl.clone());
            }
            current = match current.children.get(*index)? {
                Node::Element(child) => child,
                Node::Text(_) => return None,
            };
        }

        let mut element = current.clone();
        for decl in inherited {
            if element.attribute(&decl.name).is_none() {
                element.attributes.push(decl);
            }
        }
        Some(element)
    }

    /// Removes and returns the first direct child with the given name.
    pub fn remove_child(&mut self, namespace: &str, name: &str) -> Option<Element> {
        let index = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.is(namespace, name)))?;
        match self.children.remove(index) {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    /// Inserts `child` immediately after the first direct child with the
    /// given name, or as the first child if there is none.
    pub fn insert_after(&mut self, namespace: &str, name: &str, child: Element) {
        let index = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(e) if e.is(namespace, name)))
            .map_or(0, |i| i + 1);
        self.children.insert(index, Node::Element(child));
    }

    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::XmlParse`] for malformed XML, unbound prefixes,
    /// or documents without exactly one root element.
    pub fn parse(xml: &str) -> SamlResult<Element> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (namespace, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&namespace, &start)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&namespace, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text.unescape()?.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let bytes = data.into_inner();
                        parent.children.push(Node::Text(std::str::from_utf8(&bytes)?.to_string()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(SamlError::XmlParse("unclosed element".to_string()));
        }
        root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
    }

    /// Serializes the element and its subtree.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) {
        let name = self.qualified_name();
        out.push('<');
        out.push_str(&name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            out.push_str(&escape(attr.value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(out),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&name);
        out.push('>');
    }
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

fn element_from_start(namespace: &ResolveResult<'_>, start: &BytesStart<'_>) -> SamlResult<Element> {
    let qname = start.name();
    let name = std::str::from_utf8(qname.local_name().as_ref())?.to_string();
    let prefix = match qname.prefix() {
        Some(prefix) => Some(std::str::from_utf8(prefix.as_ref())?.to_string()),
        None => None,
    };
    let namespace = match namespace {
        ResolveResult::Bound(Namespace(uri)) => Some(std::str::from_utf8(uri)?.to_string()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(SamlError::XmlParse(format!(
                "unbound namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            )));
        }
    };

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        attributes.push(Attribute {
            name: std::str::from_utf8(attr.key.as_ref())?.to_string(),
            value: attr.unescape_value()?.into_owned(),
        });
    }

    Ok(Element {
        prefix,
        name,
        namespace,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> SamlResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_some() => {
            return Err(SamlError::XmlParse("multiple root elements".to_string()));
        }
        None => *root = Some(element),
    }
    Ok(())
}
