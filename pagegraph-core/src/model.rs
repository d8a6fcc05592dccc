use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type PageGraphId = String;
pub type BlinkId = String;
pub type FrameId = String;
pub type RequestId = i64;

/// Raw attribute names used by PageGraph GraphML files.
pub mod attrs {
    pub const NODE_TYPE: &str = "node type";
    pub const EDGE_TYPE: &str = "edge type";
    pub const BLINK_ID: &str = "node id";
    pub const FRAME_ID: &str = "frame id";
    pub const METHOD: &str = "method";
    pub const SCRIPT_TYPE: &str = "script type";
    pub const SOURCE: &str = "source";
    pub const TIMESTAMP: &str = "timestamp";
    pub const TAG: &str = "tag name";
    pub const URL: &str = "url";
    pub const ARGS: &str = "args";
    pub const BEFORE_BLINK_ID: &str = "before";
    pub const HASH: &str = "response hash";
    pub const HEADERS: &str = "headers";
    pub const PARENT_BLINK_ID: &str = "parent";
    pub const REQUEST_ID: &str = "request id";
    pub const RESOURCE_TYPE: &str = "resource type";
    pub const SIZE: &str = "size";
    pub const VALUE: &str = "value";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    AdsShields,
    CookieJar,
    DomRoot,
    Extensions,
    FingerprintingShields,
    FrameOwner,
    HtmlElement,
    JsBuiltin,
    JsShields,
    LocalStorage,
    Parser,
    Resource,
    Script,
    SessionStorage,
    Shields,
    Storage,
    TextNode,
    TrackersShields,
    WebApi,
}

impl NodeType {
    pub const ALL: [NodeType; 19] = [
        NodeType::AdsShields,
        NodeType::CookieJar,
        NodeType::DomRoot,
        NodeType::Extensions,
        NodeType::FingerprintingShields,
        NodeType::FrameOwner,
        NodeType::HtmlElement,
        NodeType::JsBuiltin,
        NodeType::JsShields,
        NodeType::LocalStorage,
        NodeType::Parser,
        NodeType::Resource,
        NodeType::Script,
        NodeType::SessionStorage,
        NodeType::Shields,
        NodeType::Storage,
        NodeType::TextNode,
        NodeType::TrackersShields,
        NodeType::WebApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::AdsShields => "shieldsAds shield",
            NodeType::CookieJar => "cookie jar",
            NodeType::DomRoot => "DOM root",
            NodeType::Extensions => "extensions",
            NodeType::FingerprintingShields => "fingerprintingV2 shield",
            NodeType::FrameOwner => "frame owner",
            NodeType::HtmlElement => "HTML element",
            NodeType::JsBuiltin => "JS builtin",
            NodeType::JsShields => "javascript shield",
            NodeType::LocalStorage => "local storage",
            NodeType::Parser => "parser",
            NodeType::Resource => "resource",
            NodeType::Script => "script",
            NodeType::SessionStorage => "session storage",
            NodeType::Shields => "Brave Shields",
            NodeType::Storage => "storage",
            NodeType::TextNode => "text node",
            NodeType::TrackersShields => "trackers shield",
            NodeType::WebApi => "web API",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        NodeType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Node types that live in a document tree and carry a blink id.
    pub fn is_dom_node(&self) -> bool {
        matches!(
            self,
            NodeType::DomRoot | NodeType::HtmlElement | NodeType::TextNode | NodeType::FrameOwner
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    AttributeDelete,
    AttributeSet,
    CrossDom,
    Execute,
    ExecuteFromAttribute,
    NodeCreate,
    NodeInsert,
    NodeRemove,
    Structure,
    RequestStart,
    RequestComplete,
    RequestError,
    RequestRedirect,
    EventListener,
    EventListenerAdd,
    EventListenerRemove,
    Shield,
    StorageBucket,
    StorageReadCall,
    StorageReadResult,
    StorageClear,
    StorageSet,
    StorageDelete,
    JsCall,
    JsResult,
}

impl EdgeType {
    pub const ALL: [EdgeType; 25] = [
        EdgeType::AttributeDelete,
        EdgeType::AttributeSet,
        EdgeType::CrossDom,
        EdgeType::Execute,
        EdgeType::ExecuteFromAttribute,
        EdgeType::NodeCreate,
        EdgeType::NodeInsert,
        EdgeType::NodeRemove,
        EdgeType::Structure,
        EdgeType::RequestStart,
        EdgeType::RequestComplete,
        EdgeType::RequestError,
        EdgeType::RequestRedirect,
        EdgeType::EventListener,
        EdgeType::EventListenerAdd,
        EdgeType::EventListenerRemove,
        EdgeType::Shield,
        EdgeType::StorageBucket,
        EdgeType::StorageReadCall,
        EdgeType::StorageReadResult,
        EdgeType::StorageClear,
        EdgeType::StorageSet,
        EdgeType::StorageDelete,
        EdgeType::JsCall,
        EdgeType::JsResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::AttributeDelete => "delete attribute",
            EdgeType::AttributeSet => "set attribute",
            EdgeType::CrossDom => "cross DOM",
            EdgeType::Execute => "execute",
            EdgeType::ExecuteFromAttribute => "execute from attribute",
            EdgeType::NodeCreate => "create node",
            EdgeType::NodeInsert => "insert node",
            EdgeType::NodeRemove => "remove node",
            EdgeType::Structure => "structure",
            EdgeType::RequestStart => "request start",
            EdgeType::RequestComplete => "request complete",
            EdgeType::RequestError => "request error",
            EdgeType::RequestRedirect => "request redirect",
            EdgeType::EventListener => "event listener",
            EdgeType::EventListenerAdd => "add event listener",
            EdgeType::EventListenerRemove => "remove event listener",
            EdgeType::Shield => "shield",
            EdgeType::StorageBucket => "storage bucket",
            EdgeType::StorageReadCall => "read storage call",
            EdgeType::StorageReadResult => "storage read result",
            EdgeType::StorageClear => "clear storage",
            EdgeType::StorageSet => "storage set",
            EdgeType::StorageDelete => "delete storage",
            EdgeType::JsCall => "js call",
            EdgeType::JsResult => "js result",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        EdgeType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn is_request_edge(&self) -> bool {
        matches!(
            self,
            EdgeType::RequestStart
                | EdgeType::RequestComplete
                | EdgeType::RequestError
                | EdgeType::RequestRedirect
        )
    }

    pub fn is_js_edge(&self) -> bool {
        matches!(self, EdgeType::JsCall | EdgeType::JsResult)
    }

    /// Edges that define the parent/child relation between nodes.
    pub fn is_structural(&self) -> bool {
        !self.is_request_edge() && !self.is_js_edge()
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, EdgeType::Execute | EdgeType::ExecuteFromAttribute)
    }

    pub fn is_request_result(&self) -> bool {
        matches!(self, EdgeType::RequestComplete | EdgeType::RequestError)
    }
}

// Values defined by Blink in `Resource::ResourceTypeToString`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    AttributionResource,
    Audio,
    CssResource,
    CssResourceUa,
    CssStylesheet,
    Dictionary,
    Document,
    Fetch,
    Font,
    Icon,
    Image,
    InternalResource,
    LinkElementResource,
    LinkPrefetch,
    Manifest,
    Mock,
    ProcessingInstruction,
    Raw,
    Request,
    Script,
    SpeculationRule,
    Svg,
    SvgUseElementResource,
    TextTrack,
    Track,
    Video,
    XmlHttpRequest,
    XmlResource,
    XslStylesheet,
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 30] = [
        ResourceType::AttributionResource,
        ResourceType::Audio,
        ResourceType::CssResource,
        ResourceType::CssResourceUa,
        ResourceType::CssStylesheet,
        ResourceType::Dictionary,
        ResourceType::Document,
        ResourceType::Fetch,
        ResourceType::Font,
        ResourceType::Icon,
        ResourceType::Image,
        ResourceType::InternalResource,
        ResourceType::LinkElementResource,
        ResourceType::LinkPrefetch,
        ResourceType::Manifest,
        ResourceType::Mock,
        ResourceType::ProcessingInstruction,
        ResourceType::Raw,
        ResourceType::Request,
        ResourceType::Script,
        ResourceType::SpeculationRule,
        ResourceType::Svg,
        ResourceType::SvgUseElementResource,
        ResourceType::TextTrack,
        ResourceType::Track,
        ResourceType::Video,
        ResourceType::XmlHttpRequest,
        ResourceType::XmlResource,
        ResourceType::XslStylesheet,
        ResourceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::AttributionResource => "Attribution resource",
            ResourceType::Audio => "Audio",
            ResourceType::CssResource => "CSS resource",
            ResourceType::CssResourceUa => "User Agent CSS resource",
            ResourceType::CssStylesheet => "CSS stylesheet",
            ResourceType::Dictionary => "Dictionary",
            ResourceType::Document => "Document",
            ResourceType::Fetch => "Fetch",
            ResourceType::Font => "Font",
            ResourceType::Icon => "Icon",
            ResourceType::Image => "Image",
            ResourceType::InternalResource => "Internal resource",
            ResourceType::LinkElementResource => "Link element resource",
            ResourceType::LinkPrefetch => "Link prefetch resource",
            ResourceType::Manifest => "Manifest",
            ResourceType::Mock => "Mock",
            ResourceType::ProcessingInstruction => "Processing instruction",
            ResourceType::Raw => "Raw",
            ResourceType::Request => "Request",
            ResourceType::Script => "Script",
            ResourceType::SpeculationRule => "SpeculationRule",
            ResourceType::Svg => "SVG document",
            ResourceType::SvgUseElementResource => "SVG Use element resource",
            ResourceType::TextTrack => "Text track",
            ResourceType::Track => "Track",
            ResourceType::Video => "Video",
            ResourceType::XmlHttpRequest => "XMLHttpRequest",
            ResourceType::XmlResource => "XML resource",
            ResourceType::XslStylesheet => "XSL stylesheet",
            ResourceType::Other => "Other",
        }
    }

    /// Unknown initiator names fall back to `Other`.
    pub fn parse(s: &str) -> Self {
        ResourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or(ResourceType::Other)
    }
}

// As defined by Blink's `ScriptSourceLocationType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    Eval,
    EvalScheduled,
    External,
    Inline,
    InlineDocWrite,
    InlineElement,
    Inspector,
    Internal,
    JsUrl,
    Module,
    Unknown,
}

impl ScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptType::Eval => "eval",
            ScriptType::EvalScheduled => "eval for scheduled action",
            ScriptType::External => "external file",
            ScriptType::Inline => "inline",
            ScriptType::InlineDocWrite => "inline inside document write",
            ScriptType::InlineElement => "inline inside generated element",
            ScriptType::Inspector => "inspector",
            ScriptType::Internal => "internal",
            ScriptType::JsUrl => "javascript url",
            ScriptType::Module => "module",
            ScriptType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "eval" => ScriptType::Eval,
            "eval for scheduled action" => ScriptType::EvalScheduled,
            "external file" => ScriptType::External,
            "inline" => ScriptType::Inline,
            "inline inside document write" => ScriptType::InlineDocWrite,
            "inline inside generated element" => ScriptType::InlineElement,
            "inspector" => ScriptType::Inspector,
            "internal" => ScriptType::Internal,
            "javascript url" => ScriptType::JsUrl,
            "module" => ScriptType::Module,
            _ => ScriptType::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub id: PageGraphId,
    pub node_type: NodeType,
    pub attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct EdgeData {
    pub id: PageGraphId,
    pub edge_type: EdgeType,
    pub attrs: HashMap<String, String>,
}

/// Numeric part of an `n##` / `e##` id.
pub fn int_id(id: &str) -> Option<u64> {
    id.get(1..)?.parse().ok()
}

impl NodeData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn int_id(&self) -> Option<u64> {
        int_id(&self.id)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.attr(attrs::TIMESTAMP)?.trim().parse().ok()
    }

    pub fn blink_id(&self) -> Option<&str> {
        self.attr(attrs::BLINK_ID)
    }

    pub fn url(&self) -> Option<&str> {
        self.attr(attrs::URL)
    }

    pub fn tag_name(&self) -> &str {
        if self.node_type == NodeType::TextNode {
            return "<text>";
        }
        self.attr(attrs::TAG).unwrap_or("")
    }

    pub fn method_name(&self) -> &str {
        self.attr(attrs::METHOD).unwrap_or("")
    }

    pub fn script_type(&self) -> ScriptType {
        self.attr(attrs::SCRIPT_TYPE)
            .map(ScriptType::parse)
            .unwrap_or(ScriptType::Unknown)
    }

    pub fn source(&self) -> &str {
        self.attr(attrs::SOURCE).unwrap_or("")
    }

    pub fn is(&self, node_type: NodeType) -> bool {
        self.node_type == node_type
    }
}

impl EdgeData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn int_id(&self) -> Option<u64> {
        int_id(&self.id)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.attr(attrs::TIMESTAMP)?.trim().parse().ok()
    }

    pub fn frame_id(&self) -> Option<&str> {
        self.attr(attrs::FRAME_ID)
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.attr(attrs::REQUEST_ID)?.trim().parse().ok()
    }

    pub fn resource_type(&self) -> ResourceType {
        self.attr(attrs::RESOURCE_TYPE)
            .map(ResourceType::parse)
            .unwrap_or(ResourceType::Other)
    }

    pub fn size(&self) -> Option<i64> {
        self.attr(attrs::SIZE)?.trim().parse().ok()
    }

    pub fn response_hash(&self) -> Option<&str> {
        self.attr(attrs::HASH)
    }

    pub fn headers(&self) -> Option<&str> {
        self.attr(attrs::HEADERS)
    }

    pub fn is(&self, edge_type: EdgeType) -> bool {
        self.edge_type == edge_type
    }
}
