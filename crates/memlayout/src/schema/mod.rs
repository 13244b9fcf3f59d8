//! Predefined composite types, addressable by name.

pub mod cocos;

use crate::layout::CompositeType;
use crate::string::{refcounted, sso};

/// Names accepted by [`lookup`], in listing order
pub fn names() -> &'static [&'static str] {
    &[
        "CCPoint",
        "CCSize",
        "CCRect",
        "CCAffineTransform",
        "Matrix4",
        "CCObject",
        "CCArrayData",
        "CCArray",
        "CCNode",
        "std_string",
        "std_string_content",
        "old_std_string",
        "std_string_header",
    ]
}

/// Find a predefined type by name (case-insensitive)
pub fn lookup(name: &str) -> Option<CompositeType> {
    let ty: &CompositeType = match name.to_ascii_lowercase().as_str() {
        "ccpoint" => &cocos::CC_POINT,
        "ccsize" => &cocos::CC_SIZE,
        "ccrect" => &cocos::CC_RECT,
        "ccaffinetransform" => &cocos::CC_AFFINE_TRANSFORM,
        "matrix4" => &cocos::MATRIX4,
        "ccobject" => &cocos::CC_OBJECT,
        "ccarraydata" => &cocos::CC_ARRAY_DATA,
        "ccarray" => &cocos::CC_ARRAY,
        "ccnode" => &cocos::CC_NODE,
        "std_string" => sso::std_string_type(),
        "std_string_content" => sso::content_type(),
        "old_std_string" => refcounted::old_std_string_type(),
        "std_string_header" => refcounted::header_type(),
        _ => return None,
    };
    Some(ty.clone())
}
