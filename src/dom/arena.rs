//! Arena-based DOM shared by the HTML and XML parsers.
//!
//! All nodes live in one vector; parent/child/sibling links are indices.
//! Removing a node only unlinks it, so ids stay valid for the lifetime of
//! the arena.

use html5ever::{LocalName, Namespace, QualName, ns};

use super::Dialect;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element { name: QualName, attrs: Vec<Attribute> },
    /// Text content.
    Text(String),
    /// Comment.
    Comment(String),
    /// Document type declaration.
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
}

/// Element attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

impl Attribute {
    /// Attribute name as written, including any prefix (`epub:type`).
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.name)
    }
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
#[derive(Debug)]
pub struct ArenaDom {
    nodes: Vec<Node>,
    document: NodeId,
    dialect: Dialect,
}

impl ArenaDom {
    /// Create a new empty DOM with a document root.
    pub fn new(dialect: Dialect) -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
            dialect,
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// The markup dialect this tree was parsed as.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(Node::new(NodeData::Element { name, attrs }))
    }

    /// Create an element in the XHTML namespace with unprefixed attributes.
    pub fn create_html_element(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: value.to_string(),
            })
            .collect();
        self.create_element(QualName::new(None, ns!(html), LocalName::from(tag)), attrs)
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    /// Create a new comment node.
    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    /// Create a doctype node.
    pub fn create_doctype(&mut self, name: String, public_id: String, system_id: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype {
            name,
            public_id,
            system_id,
        }))
    }

    /// Append a child to a parent node. The child must be detached.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a detached node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let parent = self.get(sibling).map(|n| n.parent).unwrap_or(NodeId::NONE);
        let prev = self.get(sibling).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Insert a detached node after a sibling.
    pub fn insert_after(&mut self, sibling: NodeId, new_node: NodeId) {
        let next = self.next_sibling(sibling);
        if next.is_some() {
            self.insert_before(next, new_node);
        } else {
            let parent = self.parent(sibling);
            self.append(parent, new_node);
        }
    }

    /// Unlink a node (and its subtree) from its parent.
    pub fn detach(&mut self, target: NodeId) {
        let (parent, prev, next) = match self.get(target) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(p) = self.get_mut(parent) {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(target) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Detach every child of `parent`.
    pub fn clear_children(&mut self, parent: NodeId) {
        let children: Vec<_> = self.children(parent).collect();
        for child in children {
            self.detach(child);
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Get the number of allocated nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the DOM is empty (only has document root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE)
    }

    pub fn prev_sibling(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.prev_sibling).unwrap_or(NodeId::NONE)
    }

    pub fn next_sibling(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.next_sibling).unwrap_or(NodeId::NONE)
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self.get(parent).map(|n| n.first_child).unwrap_or(NodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Iterate over element children of a node.
    pub fn element_children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).filter(|&c| self.is_element(c))
    }

    /// Pre-order iterator over the descendants of `root`, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(root).collect();
        stack.reverse();
        Descendants { dom: self, stack }
    }

    /// Find the first element matching a predicate (DFS).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.descendants(self.document)
            .find(|&id| self.get(id).is_some_and(&predicate))
    }

    /// Find element by local tag name (first match).
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| match &node.data {
            NodeData::Element { name, .. } => name.local.as_ref() == tag,
            _ => false,
        })
    }

    /// Check whether a node is still attached under the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while current.is_some() {
            if current == self.document {
                return true;
            }
            current = self.parent(current);
        }
        false
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a ArenaDom,
    current: NodeId,
}

impl Iterator for ChildrenIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self.dom.next_sibling(id);
        Some(id)
    }
}

/// Pre-order descendant iterator.
pub struct Descendants<'a> {
    dom: &'a ArenaDom,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(self.dom.children(id));
        self.stack[start..].reverse();
        Some(id)
    }
}

/// Convenience methods for element nodes.
impl ArenaDom {
    /// Get element's qualified name.
    pub fn element_qual_name(&self, id: NodeId) -> Option<&QualName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    /// Get element's local name (tag).
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.element_qual_name(id).map(|name| &name.local)
    }

    /// Get element's namespace.
    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.element_qual_name(id).map(|name| &name.ns)
    }

    /// Element tag as written (`dc:title`, `navPoint`).
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.element_qual_name(id).map(qualified_name)
    }

    /// Check whether `id` is an element with this local name.
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.element_name(id).is_some_and(|n| n.as_ref() == tag)
    }

    /// Check whether the element's local name is one of `tags`.
    pub fn is_any_tag(&self, id: NodeId, tags: &[&str]) -> bool {
        self.element_name(id).is_some_and(|n| tags.contains(&n.as_ref()))
    }

    /// All attributes of an element.
    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Get an attribute value by name as written (`href`, `xlink:href`).
    ///
    /// Matches either the qualified name or, for namespaced attributes,
    /// the local name when `attr_name` carries no prefix.
    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        let attrs = self.attrs(id);
        attrs
            .iter()
            .find(|a| attr_matches(a, attr_name))
            .map(|a| a.value.as_str())
    }

    /// Get an attribute by exact local name in the empty namespace.
    pub fn get_plain_attr(&self, id: NodeId, local: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.prefix.is_none() && a.name.local.as_ref() == local)
            .map(|a| a.value.as_str())
    }

    /// Set (or replace) an unprefixed attribute.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element { attrs, .. } = &mut node.data
        {
            if let Some(existing) = attrs.iter_mut().find(|a| attr_matches(a, attr_name)) {
                existing.value = value.to_string();
            } else {
                attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: value.to_string(),
                });
            }
        }
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) -> Option<String> {
        let node = self.get_mut(id)?;
        let NodeData::Element { attrs, .. } = &mut node.data else {
            return None;
        };
        let pos = attrs.iter().position(|a| attr_matches(a, attr_name))?;
        Some(attrs.remove(pos).value)
    }

    /// Get element's id attribute.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get_plain_attr(id, "id")
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Check if node is a text node.
    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Get text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_string();
        }
        let mut out = String::new();
        for desc in self.descendants(id) {
            if let Some(text) = self.text(desc) {
                out.push_str(text);
            }
        }
        out
    }

    /// Check whether the tree carries a parse-error marker element.
    pub fn has_parse_error(&self) -> bool {
        self.find_by_tag(PARSE_ERROR_TAG).is_some()
    }

    /// Message carried by the parse-error marker, if any.
    pub fn parse_error(&self) -> Option<String> {
        self.find_by_tag(PARSE_ERROR_TAG)
            .map(|id| self.text_content(id))
    }
}

/// Tag name of the marker element appended when strict parsing fails.
pub const PARSE_ERROR_TAG: &str = "parsererror";

fn qualified_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix.as_ref(), name.local.as_ref()),
        _ => name.local.to_string(),
    }
}

fn attr_matches(attr: &Attribute, attr_name: &str) -> bool {
    match attr_name.split_once(':') {
        Some(_) => attr.qualified_name() == attr_name,
        None => attr.name.local.as_ref() == attr_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_elements() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let div = dom.create_html_element("div", &[("id", "main")]);
        dom.append(dom.document(), div);

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert!(dom.is_tag(div, "div"));
    }

    #[test]
    fn test_append_children() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let parent = dom.create_html_element("div", &[]);
        let child1 = dom.create_html_element("p", &[]);
        let child2 = dom.create_html_element("p", &[]);

        dom.append(dom.document(), parent);
        dom.append(parent, child1);
        dom.append(parent, child2);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![child1, child2]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let p = dom.create_html_element("p", &[]);
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text(children[0]), Some("Hello, World!"));
    }

    #[test]
    fn test_detach_and_insert() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let body = dom.create_html_element("body", &[]);
        dom.append(dom.document(), body);
        let a = dom.create_html_element("a", &[]);
        let b = dom.create_html_element("b", &[]);
        let c = dom.create_html_element("i", &[]);
        dom.append(body, a);
        dom.append(body, b);

        dom.detach(a);
        assert_eq!(dom.children(body).collect::<Vec<_>>(), vec![b]);
        assert!(!dom.is_attached(a));

        dom.insert_before(b, a);
        dom.insert_after(b, c);
        assert_eq!(dom.children(body).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(dom.prev_sibling(c), b);
        assert_eq!(dom.next_sibling(a), b);

        dom.detach(c);
        assert_eq!(dom.get(body).unwrap().last_child, b);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let root = dom.create_html_element("div", &[]);
        let p1 = dom.create_html_element("p", &[]);
        let em = dom.create_html_element("em", &[]);
        let p2 = dom.create_html_element("p", &[]);
        dom.append(dom.document(), root);
        dom.append(root, p1);
        dom.append(p1, em);
        dom.append(root, p2);

        let order: Vec<_> = dom.descendants(root).collect();
        assert_eq!(order, vec![p1, em, p2]);
    }

    #[test]
    fn test_attribute_editing() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let img = dom.create_html_element("img", &[("src", "a.png")]);
        dom.set_attr(img, "src", "/b.png");
        dom.set_attr(img, "alt", "b");
        assert_eq!(dom.get_attr(img, "src"), Some("/b.png"));
        assert_eq!(dom.remove_attr(img, "alt"), Some("b".to_string()));
        assert_eq!(dom.get_attr(img, "alt"), None);
    }

    #[test]
    fn test_text_content() {
        let mut dom = ArenaDom::new(Dialect::Html);
        let p = dom.create_html_element("p", &[]);
        let em = dom.create_html_element("em", &[]);
        dom.append(dom.document(), p);
        dom.append_text(p, "a ");
        dom.append(p, em);
        dom.append_text(em, "b");
        assert_eq!(dom.text_content(p), "a b");
    }
}
