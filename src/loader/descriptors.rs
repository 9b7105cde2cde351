//! Name and descriptor grammar for class files (JVMS §4.2, §4.3).
//!
//! All functions work on internal-form names (`java/lang/Object`).

/// Maximum number of array dimensions a descriptor may carry.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// `true` for a legal unqualified name (field or method name).
///
/// Method names may additionally be exactly `<init>` or `<clinit>`; callers
/// check that separately.
pub fn is_unqualified_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', ';', '[', '/'])
}

/// `true` for a legal method name: unqualified, without angle brackets
/// unless it is one of the two special initializer names.
pub fn is_method_name(name: &str) -> bool {
    name == "<init>" || name == "<clinit>" || (is_unqualified_name(name) && !name.contains(['<', '>']))
}

/// `true` for a legal internal-form class name such as `a/b/Foo`.
pub fn is_class_name(name: &str) -> bool {
    !name.is_empty() && name.split('/').all(is_unqualified_name)
}

/// `true` for the name stored in a `CONSTANT_Class`: a class name or an
/// array descriptor.
pub fn is_class_constant_name(name: &str) -> bool {
    if name.starts_with('[') {
        field_type_end(name.as_bytes(), 0) == Some(name.len())
    } else {
        is_class_name(name)
    }
}

/// `true` for a complete field descriptor (`I`, `Ljava/lang/String;`, `[[J`).
pub fn is_field_descriptor(descriptor: &str) -> bool {
    field_type_end(descriptor.as_bytes(), 0) == Some(descriptor.len())
}

/// A parsed method descriptor: argument slot count and whether it returns void.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodShape {
    /// Local variable slots taken by the declared parameters (long/double take two).
    pub arg_slots: usize,
    pub returns_void: bool,
}

/// Parse a method descriptor such as `(IJ[Ljava/lang/String;)V`.
pub fn method_shape(descriptor: &str) -> Option<MethodShape> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut pos = 1;
    let mut arg_slots = 0;
    while *bytes.get(pos)? != b')' {
        let end = field_type_end(bytes, pos)?;
        arg_slots += if end == pos + 1 && matches!(bytes[pos], b'J' | b'D') {
            2
        } else {
            1
        };
        pos = end;
    }
    pos += 1;
    let returns_void = bytes.get(pos) == Some(&b'V');
    let end = if returns_void {
        pos + 1
    } else {
        field_type_end(bytes, pos)?
    };
    (end == bytes.len()).then_some(MethodShape {
        arg_slots,
        returns_void,
    })
}

/// Index one past the field type starting at `pos`, if one is there.
fn field_type_end(bytes: &[u8], pos: usize) -> Option<usize> {
    let mut pos = pos;
    let mut dims = 0;
    while bytes.get(pos) == Some(&b'[') {
        dims += 1;
        pos += 1;
    }
    if dims > MAX_ARRAY_DIMENSIONS {
        return None;
    }
    match *bytes.get(pos)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => Some(pos + 1),
        b'L' => {
            let rest = &bytes[pos + 1..];
            let semi = rest.iter().position(|&b| b == b';')?;
            let name = std::str::from_utf8(&rest[..semi]).ok()?;
            is_class_name(name).then_some(pos + 1 + semi + 1)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names() {
        assert!(is_class_name("java/lang/Object"));
        assert!(is_class_name("Foo$Bar"));
        assert!(!is_class_name(""));
        assert!(!is_class_name("a//b"));
        assert!(!is_class_name("a.b.C"));
        assert!(!is_class_name("a/b;"));
        assert!(!is_class_name("/a"));
    }

    #[test]
    fn class_constant_allows_arrays() {
        assert!(is_class_constant_name("[Ljava/lang/String;"));
        assert!(is_class_constant_name("[[I"));
        assert!(!is_class_constant_name("[V"));
        assert!(!is_class_constant_name("[Ljava/lang/String"));
    }

    #[test]
    fn method_names() {
        assert!(is_method_name("<init>"));
        assert!(is_method_name("<clinit>"));
        assert!(is_method_name("run"));
        assert!(!is_method_name("<run>"));
        assert!(!is_method_name("a.b"));
    }

    #[test]
    fn field_descriptors() {
        assert!(is_field_descriptor("I"));
        assert!(is_field_descriptor("[[J"));
        assert!(is_field_descriptor("Ljava/util/List;"));
        assert!(!is_field_descriptor("V"));
        assert!(!is_field_descriptor("II"));
        assert!(!is_field_descriptor("L;"));
        assert!(!is_field_descriptor(""));
        let deep = format!("{}I", "[".repeat(256));
        assert!(!is_field_descriptor(&deep));
    }

    #[test]
    fn method_descriptors() {
        assert_eq!(
            method_shape("()V"),
            Some(MethodShape {
                arg_slots: 0,
                returns_void: true
            })
        );
        assert_eq!(
            method_shape("(IJ[DLjava/lang/String;)Ljava/lang/Object;"),
            Some(MethodShape {
                arg_slots: 5,
                returns_void: false
            })
        );
        assert_eq!(method_shape("(V)V"), None);
        assert_eq!(method_shape("()"), None);
        assert_eq!(method_shape("()VV"), None);
        assert_eq!(method_shape("I)V"), None);
    }
}
