//! Ready-made mapping sets and address helpers

use crate::config::{CharacterRecord, GenericRecord, MappingConfig};
use crate::mapping::target::PropertyTarget;

/// ARKit-style facial blend shape names, as sent by common face trackers
#[rustfmt::skip]
pub const FACE_SHAPE_KEYS: &[&str] = &[
    "eyeLookUpLeft", "eyeLookUpRight", "eyeLookDownLeft", "eyeLookDownRight",
    "eyeLookInLeft", "eyeLookInRight", "eyeLookOutLeft", "eyeLookOutRight",
    "eyeBlinkLeft", "eyeBlinkRight", "eyeSquintLeft", "eyeSquintRight",
    "eyeWideLeft", "eyeWideRight", "jawForward", "jawLeft", "jawRight", "jawOpen",
    "mouthClose", "mouthFunnel", "mouthPucker", "mouthLeft", "mouthRight",
    "mouthSmileLeft", "mouthSmileRight", "mouthFrownLeft", "mouthFrownRight",
    "mouthDimpleLeft", "mouthDimpleRight", "mouthStretchLeft", "mouthStretchRight",
    "mouthRollLower", "mouthRollUpper", "mouthShrugUpper", "mouthShrugLower",
    "mouthPressLeft", "mouthPressRight", "mouthLowerDownLeft", "mouthLowerDownRight",
    "mouthUpperUpLeft", "mouthUpperUpRight", "browDownLeft", "browDownRight",
    "browInnerUp", "browOuterUpLeft", "browOuterUpRight", "cheekPuff",
    "cheekSquintLeft", "cheekSquintRight", "noseSneerLeft", "noseSneerRight",
];

/// Append one `/<name>` shape key record per facial blend shape.
///
/// Returns how many records were added.
pub fn add_face_shape_keys(mappings: &mut MappingConfig, mesh: &str) -> usize {
    mappings.character.extend(
        FACE_SHAPE_KEYS
            .iter()
            .map(|name| CharacterRecord::shape_key(mesh, name)),
    );
    FACE_SHAPE_KEYS.len()
}

/// Suggest a short OSC address for a property target, e.g.
/// `objects['Cube'].location[0]` → `/Cube/location`.
pub fn suggest_address(target: &PropertyTarget) -> String {
    match target {
        PropertyTarget::TimelineFrame => "/timeline/frame".to_string(),
        PropertyTarget::TimelinePlayback => "/timeline/play".to_string(),
        PropertyTarget::Scalar { owner, property, .. }
        | PropertyTarget::ArrayElement { owner, property, .. } => {
            let leaf = property.rsplit('.').next().unwrap_or(property);
            format!("/{}/{}", owner, compact(leaf))
        }
        PropertyTarget::ModifierInput { owner, socket, .. } => {
            let mut name = compact(socket.trim_start_matches("Socket_"));
            if name.is_empty() {
                name = "param".to_string();
            }
            if name.starts_with(|c: char| c.is_ascii_digit()) {
                name.insert_str(0, "socket");
            }
            format!("/{owner}/{name}")
        }
        PropertyTarget::NodeInput {
            owner, node, input, ..
        } => format!("/{}/{}/{}", owner, compact(node), input),
        PropertyTarget::Unresolved(_) => "/param".to_string(),
    }
}

/// Generic record for a data path with a suggested address
pub fn generic_record_for(data_path: &str) -> GenericRecord {
    let target = PropertyTarget::parse_lenient(data_path);
    GenericRecord {
        address: suggest_address(&target),
        data_path: target.to_string(),
        ..Default::default()
    }
}

fn compact(name: &str) -> String {
    name.chars().filter(|c| *c != '_' && !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::table::RoutingTable;

    #[test]
    fn test_face_preset() {
        let mut mappings = MappingConfig::default();
        let added = add_face_shape_keys(&mut mappings, "HG_Body");
        assert_eq!(added, 51);
        assert_eq!(mappings.character.len(), 51);

        let table = RoutingTable::build(&mappings).unwrap();
        assert_eq!(table.address_count(), 51);
        let jaw = &table.lookup("/jawOpen").unwrap()[0];
        assert_eq!(jaw.targets().count(), 1);
    }

    #[test]
    fn test_suggest_address() {
        let cases = [
            ("objects['Cube'].location[0]", "/Cube/location"),
            ("objects['Camera'].data.lens", "/Camera/lens"),
            ("objects['Cube'].hide_viewport", "/Cube/hideviewport"),
            ("objects['Cube'].modifiers['GeometryNodes']['Socket_2']", "/Cube/socket2"),
            ("objects['Cube'].modifiers['GN']['Input_Scale']", "/Cube/InputScale"),
            ("node_groups['G'].nodes['Math Node'].inputs[1]", "/G/MathNode/1"),
            ("scene.frame_current", "/timeline/frame"),
            ("???", "/param"),
        ];
        for (path, expected) in cases {
            let target = PropertyTarget::parse_lenient(path);
            assert_eq!(suggest_address(&target), expected, "for {path}");
        }
    }

    #[test]
    fn test_generic_record_for() {
        let record = generic_record_for("bpy.data.objects['Cube'].scale[2]");
        assert_eq!(record.address, "/Cube/scale");
        assert_eq!(record.data_path, "objects['Cube'].scale[2]");
        assert!(record.clamp);
    }

    #[test]
    fn test_generic_record_keeps_node_tree_path() {
        let record = generic_record_for(
            "bpy.data.materials['Skin'].node_tree.nodes['N'].inputs[0].default_value",
        );
        assert_eq!(record.address, "/Skin/N/0");
        assert_eq!(
            record.data_path,
            "materials['Skin'].node_tree.nodes['N'].inputs[0].default_value"
        );
        assert_eq!(
            PropertyTarget::parse_lenient(&record.data_path),
            PropertyTarget::parse_lenient(
                "materials['Skin'].node_tree.nodes['N'].inputs[0].default_value"
            )
        );
    }
}
