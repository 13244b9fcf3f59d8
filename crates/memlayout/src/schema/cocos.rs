//! Cocos2d-x types as laid out by the game client.

use std::sync::LazyLock;

use crate::field::Field;
use crate::layout::{CompositeType, Definition};

pub static CC_POINT: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCPoint",
        Definition::new().field("x", Field::FLOAT).field("y", Field::FLOAT),
    )
});

pub static CC_SIZE: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCSize",
        Definition::new()
            .field("width", Field::FLOAT)
            .field("height", Field::FLOAT),
    )
});

pub static CC_RECT: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCRect",
        Definition::new()
            .field("origin", Field::composite(&CC_POINT))
            .field("size", Field::composite(&CC_SIZE)),
    )
});

/// 4x4 float matrix
pub static MATRIX4: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "Matrix4",
        Definition::new().field("matrix", Field::array(Field::FLOAT, 16)),
    )
});

pub static CC_AFFINE_TRANSFORM: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCAffineTransform",
        Definition::new()
            .field("a", Field::FLOAT)
            .field("b", Field::FLOAT)
            .field("c", Field::FLOAT)
            .field("d", Field::FLOAT)
            .field("translate_x", Field::FLOAT)
            .field("translate_y", Field::FLOAT),
    )
});

pub static CC_OBJECT: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCObject",
        Definition::new()
            .vtable()
            .field("id", Field::UINT)
            .field("ref_id", Field::INT)
            .field("tag", Field::UINT)
            .field("object_type", Field::INT)
            .field("ref_count", Field::UINT)
            .field("auto_release_count", Field::UINT)
            .field("padding", Field::UINT),
    )
});

pub static CC_ARRAY_DATA: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCArrayData",
        Definition::new()
            .field("length", Field::UINT)
            .field("capacity", Field::UINT)
            .field(
                "array",
                Field::pointer(Field::unsized_array(Field::pointer(Field::composite(
                    &CC_OBJECT,
                )))),
            ),
    )
});

pub static CC_ARRAY: LazyLock<CompositeType> = LazyLock::new(|| {
    CompositeType::new_struct(
        "CCArray",
        Definition::new()
            .base(&CC_OBJECT)
            .field("data", Field::pointer(Field::composite(&CC_ARRAY_DATA))),
    )
});

pub static CC_NODE: LazyLock<CompositeType> = LazyLock::new(|| {
    let opaque = || Field::pointer(Field::Void);

    CompositeType::cyclic_struct("CCNode", |this| {
        Definition::new()
            .base(&CC_OBJECT)
            .field("rotation_x", Field::FLOAT)
            .field("rotation_y", Field::FLOAT)
            .field("scale_x", Field::FLOAT)
            .field("scale_y", Field::FLOAT)
            .field("vertex_z", Field::FLOAT)
            .field("position", Field::composite(&CC_POINT))
            .field("skew_x", Field::FLOAT)
            .field("skew_y", Field::FLOAT)
            .field("anchor_in_points", Field::composite(&CC_POINT))
            .field("anchor", Field::composite(&CC_POINT))
            .field("content_size", Field::composite(&CC_SIZE))
            .field("additional_transform", Field::composite(&CC_AFFINE_TRANSFORM))
            .field("transform", Field::composite(&CC_AFFINE_TRANSFORM))
            .field("inverse", Field::composite(&CC_AFFINE_TRANSFORM))
            .field("camera", opaque())
            .field("grid", opaque())
            .field("z_order", Field::INT)
            .field("children", Field::pointer(Field::composite(&CC_ARRAY)))
            .field("parent", Field::pointer(Field::composite(this)))
            .field("user_data", opaque())
            .field("user_object", Field::pointer(Field::composite(&CC_OBJECT)))
            .field("shader_program", opaque())
            .field("server_state", Field::INT)
            .field("order_of_arrival", Field::UINT)
            .field("scheduler", opaque())
            .field("action_manager", opaque())
            .field("running", Field::BOOL)
            .field("transform_dirty", Field::BOOL)
            .field("inverse_dirty", Field::BOOL)
            .field("additional_transform_dirty", Field::BOOL)
            .field("visible", Field::BOOL)
            .field("ignore_anchor_point_for_position", Field::BOOL)
            .field("reorder_child_dirty", Field::BOOL)
            .field("script_handler", Field::INT)
            .field("update_script_handler", Field::INT)
            .field("script_type", Field::INT)
            .field("component_container", opaque())
    })
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Bits, ByteOrder, OsFamily, PlatformConfig};
    use crate::state::{AbstractState, BufferState};
    use crate::util::VTABLE_FIELD;

    fn windows32() -> PlatformConfig {
        PlatformConfig::new(Bits::B32, OsFamily::Windows).with_byte_order(ByteOrder::Little)
    }

    #[test]
    fn test_geometry_sizes() {
        let config = windows32();
        assert_eq!(CC_POINT.compute_layout(&config).unwrap().size(), 8);
        assert_eq!(CC_RECT.compute_layout(&config).unwrap().size(), 16);
        assert_eq!(MATRIX4.compute_layout(&config).unwrap().size(), 64);
        assert_eq!(CC_AFFINE_TRANSFORM.compute_layout(&config).unwrap().size(), 24);
    }

    #[test]
    fn test_object_layout() {
        let layout = CC_OBJECT.compute_layout(&windows32()).unwrap();
        assert_eq!(layout.fields()[0].name, VTABLE_FIELD);
        assert_eq!(layout.get("id").unwrap().offset, 4);
        assert_eq!(layout.size(), 32);

        let layout = CC_OBJECT
            .compute_layout(&PlatformConfig::new(Bits::B64, OsFamily::Android))
            .unwrap();
        assert_eq!(layout.get("id").unwrap().offset, 8);
        assert_eq!(layout.size(), 40);
    }

    #[test]
    fn test_node_layout_resolves() {
        let config = windows32();
        let layout = CC_NODE.compute_layout(&config).unwrap();

        assert_eq!(layout.get("ref_count").unwrap().offset, 20);
        assert_eq!(layout.get("rotation_x").unwrap().offset, 32);
        assert_eq!(layout.get("position").unwrap().offset, 52);
        assert_eq!(layout.get("running").unwrap().offset, 212);
        assert_eq!(layout.get("reorder_child_dirty").unwrap().offset, 218);
        assert_eq!(layout.get("script_handler").unwrap().offset, 220);
        assert_eq!(layout.get("component_container").unwrap().offset, 232);
        assert_eq!(layout.size(), 236);
        assert_eq!(layout.size() % layout.alignment(), 0);
    }

    #[test]
    fn test_node_flags_read_as_bool() {
        let config = windows32();
        let layout = CC_NODE.compute_layout(&config).unwrap();
        let visible = layout.get("visible").unwrap().offset as u64;

        let state = BufferState::builder(config)
            .u8_at(0x1000 + visible, 1)
            .size(layout.size())
            .build();
        let node = CC_NODE.instance(&state, 0x1000).unwrap();

        assert!(node.get_as::<bool>("visible").unwrap());
        assert!(!node.get_as::<bool>("running").unwrap());

        node.set("running", true).unwrap();
        assert_eq!(state.read_u8(0x1000 + 212, ByteOrder::Native).unwrap(), 1);
    }

    #[test]
    fn test_node_parent_chain() {
        let config = windows32();
        let layout = CC_NODE.compute_layout(&config).unwrap();
        let parent_offset = layout.get("parent").unwrap().offset as u64;
        let tag_offset = layout.get("tag").unwrap().offset as u64;

        let child = 0x1000;
        let parent = 0x1000 + layout.size() as u64;
        let state = BufferState::builder(config)
            .u32_at(child + tag_offset, 7)
            .usize_at(child + parent_offset, parent)
            .u32_at(parent + tag_offset, 1)
            .size(layout.size() * 2)
            .build();

        let node = CC_NODE.instance(&state, child).unwrap();
        assert_eq!(node.get_as::<u32>("tag").unwrap(), 7);

        let up = node
            .get("parent")
            .unwrap()
            .into_pointer()
            .unwrap()
            .value()
            .unwrap()
            .into_instance()
            .unwrap();
        assert_eq!(up.address(), parent);
        assert_eq!(up.get_as::<u32>("tag").unwrap(), 1);
        assert!(up.get("parent").unwrap().into_pointer().unwrap().is_null().unwrap());
    }

    #[test]
    fn test_array_children() {
        let config = windows32();
        let state = BufferState::builder(config)
            // CCArrayData at 0x1000
            .u32_at(0x1000, 2)
            .u32_at(0x1004, 4)
            .usize_at(0x1008, 0x1010)
            // two object pointers
            .usize_at(0x1010, 0x1020)
            .usize_at(0x1014, 0x1040)
            .u32_at(0x1020 + 12, 11)
            .u32_at(0x1040 + 12, 22)
            .size(0x60)
            .build();

        let data = CC_ARRAY_DATA.instance(&state, 0x1000).unwrap();
        let length: usize = data.get_as("length").unwrap();
        let objects = data
            .get("array")
            .unwrap()
            .into_pointer()
            .unwrap()
            .value()
            .unwrap()
            .into_array()
            .unwrap()
            .take(length);

        let tags: Vec<u32> = objects
            .iter()
            .unwrap()
            .map(|object| {
                object
                    .unwrap()
                    .into_pointer()
                    .unwrap()
                    .value()
                    .unwrap()
                    .into_instance()
                    .unwrap()
                    .get_as::<u32>("tag")
                    .unwrap()
            })
            .collect();
        assert_eq!(tags, vec![11, 22]);
    }
}
