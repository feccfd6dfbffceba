//! Link annotations and their actions

use crate::coords::BoundBox;
use crate::engine::{NativeEngine, RawHandle};

/// Initial URI buffer; grown to the reported length when too small.
const URI_BUFFER_LEN: usize = 256;

/// PDF annotation subtypes as numbered by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationSubtype {
    Unknown,
    Text,
    Link,
    FreeText,
    Line,
    Square,
    Circle,
    Polygon,
    Polyline,
    Highlight,
    Underline,
    Squiggly,
    Strikeout,
    Stamp,
    Caret,
    Ink,
    Popup,
    FileAttachment,
    Sound,
    Movie,
    Widget,
    Screen,
    PrinterMark,
    TrapNet,
    Watermark,
    ThreeD,
    RichMedia,
    XfaWidget,
}

impl AnnotationSubtype {
    pub fn from_raw(value: i32) -> Self {
        use AnnotationSubtype::*;
        match value {
            1 => Text,
            2 => Link,
            3 => FreeText,
            4 => Line,
            5 => Square,
            6 => Circle,
            7 => Polygon,
            8 => Polyline,
            9 => Highlight,
            10 => Underline,
            11 => Squiggly,
            12 => Strikeout,
            13 => Stamp,
            14 => Caret,
            15 => Ink,
            16 => Popup,
            17 => FileAttachment,
            18 => Sound,
            19 => Movie,
            20 => Widget,
            21 => Screen,
            22 => PrinterMark,
            23 => TrapNet,
            24 => Watermark,
            25 => ThreeD,
            26 => RichMedia,
            27 => XfaWidget,
            _ => Unknown,
        }
    }
}

/// What activating a link does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Unsupported,
    GoTo,
    RemoteGoTo,
    Uri,
    Launch,
}

impl ActionType {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 => ActionType::GoTo,
            2 => ActionType::RemoteGoTo,
            3 => ActionType::Uri,
            4 => ActionType::Launch,
            _ => ActionType::Unsupported,
        }
    }
}

/// A link annotation pointing at a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriAnnotation {
    pub uri: String,
    /// Annotation rectangle in device pixels.
    pub bounds: BoundBox,
}

/// URI of `action`, or `None` if it has none.
pub(crate) fn read_action_uri(
    engine: &mut dyn NativeEngine,
    document: RawHandle,
    action: RawHandle,
) -> Option<String> {
    let mut buffer = vec![0u8; URI_BUFFER_LEN];
    let mut needed = engine.action_uri_path(document, action, &mut buffer);
    if needed == 0 {
        return None;
    }
    if needed > buffer.len() {
        buffer = vec![0u8; needed];
        needed = engine.action_uri_path(document, action, &mut buffer);
        if needed == 0 || needed > buffer.len() {
            return None;
        }
    }

    buffer.truncate(needed);
    while buffer.last() == Some(&0) {
        buffer.pop();
    }
    Some(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_from_raw() {
        assert_eq!(AnnotationSubtype::from_raw(2), AnnotationSubtype::Link);
        assert_eq!(AnnotationSubtype::from_raw(20), AnnotationSubtype::Widget);
        assert_eq!(AnnotationSubtype::from_raw(0), AnnotationSubtype::Unknown);
        assert_eq!(AnnotationSubtype::from_raw(99), AnnotationSubtype::Unknown);
    }

    #[test]
    fn test_action_type_from_raw() {
        assert_eq!(ActionType::from_raw(3), ActionType::Uri);
        assert_eq!(ActionType::from_raw(1), ActionType::GoTo);
        assert_eq!(ActionType::from_raw(0), ActionType::Unsupported);
    }
}
