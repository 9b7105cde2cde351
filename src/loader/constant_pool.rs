//! The constant pool: parsing, cross-reference validation, typed lookups.

#![allow(missing_docs)]

use crate::loader::classfile::{FormatError, JAVA_7, JAVA_8, JAVA_9, JAVA_11, MemberKind};
use crate::loader::descriptors;
use crate::loader::reader::Reader;

/// Newest major version whose constant pool may use the pre-1.2 UTF-8 leniency.
const LENIENT_UTF8_MAJOR: u16 = 47;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemberRef {
    class: u16,
    name_and_type: u16,
}

impl MemberRef {
    fn read(r: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            class: r.u2()?,
            name_and_type: r.u2()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Constant {
    /// Slot 0 and the upper half of long/double entries.
    Unusable,
    Utf8(String),
    Integer,
    Float,
    Long,
    Double,
    Class(u16),
    String(u16),
    FieldRef(MemberRef),
    MethodRef(MemberRef),
    InterfaceMethodRef(MemberRef),
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

/// Lowest major version allowed to use a constant pool tag.
const fn min_major_for_tag(tag: u8) -> Option<u16> {
    match tag {
        15 | 16 | 18 => Some(JAVA_7),
        19 | 20 => Some(JAVA_9),
        17 => Some(JAVA_11),
        _ => None,
    }
}

#[derive(Debug)]
pub(crate) struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub(crate) fn parse(r: &mut Reader<'_>, major: u16) -> Result<Self, FormatError> {
        let count = r.u2()?;
        if count == 0 {
            return Err(FormatError::ConstantPool {
                index: 0,
                details: "constant pool count is zero".to_string(),
            });
        }
        let strict_utf8 = major > LENIENT_UTF8_MAJOR;
        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);

        let mut index: u16 = 1;
        while index < count {
            let fail = |details: String| FormatError::ConstantPool { index, details };
            let tag = r.u1()?;
            if let Some(min) = min_major_for_tag(tag)
                && major < min
            {
                return Err(fail(format!(
                    "tag {tag} requires class file version {min} or later"
                )));
            }
            let entry = match tag {
                1 => {
                    let length = r.u2()?;
                    let bytes = r.take(usize::from(length))?;
                    let text = decode_modified_utf8(bytes, strict_utf8)
                        .ok_or_else(|| fail("illegal modified UTF-8 string".to_string()))?;
                    Constant::Utf8(text)
                }
                3 => {
                    r.take(4)?;
                    Constant::Integer
                }
                4 => {
                    r.take(4)?;
                    Constant::Float
                }
                5 => {
                    r.take(8)?;
                    Constant::Long
                }
                6 => {
                    r.take(8)?;
                    Constant::Double
                }
                7 => Constant::Class(r.u2()?),
                8 => Constant::String(r.u2()?),
                9 => Constant::FieldRef(MemberRef::read(r)?),
                10 => Constant::MethodRef(MemberRef::read(r)?),
                11 => Constant::InterfaceMethodRef(MemberRef::read(r)?),
                12 => Constant::NameAndType {
                    name: r.u2()?,
                    descriptor: r.u2()?,
                },
                15 => Constant::MethodHandle {
                    kind: r.u1()?,
                    reference: r.u2()?,
                },
                16 => Constant::MethodType(r.u2()?),
                17 | 18 => {
                    let bootstrap = r.u2()?;
                    let name_and_type = r.u2()?;
                    if tag == 17 {
                        Constant::Dynamic {
                            bootstrap,
                            name_and_type,
                        }
                    } else {
                        Constant::InvokeDynamic {
                            bootstrap,
                            name_and_type,
                        }
                    }
                }
                19 => Constant::Module(r.u2()?),
                20 => Constant::Package(r.u2()?),
                other => return Err(fail(format!("unknown tag {other}"))),
            };

            let wide = matches!(entry, Constant::Long | Constant::Double);
            entries.push(entry);
            index += 1;
            if wide {
                if index >= count {
                    return Err(FormatError::ConstantPool {
                        index: index - 1,
                        details: "8-byte constant in the last slot".to_string(),
                    });
                }
                entries.push(Constant::Unusable);
                index += 1;
            }
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.entries.get(usize::from(index))
    }

    pub(crate) fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Utf8(text)) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => None,
        }
    }

    pub(crate) fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Some((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => None,
        }
    }

    pub(crate) fn is_method_handle(&self, index: u16) -> bool {
        matches!(self.get(index), Some(Constant::MethodHandle { .. }))
    }

    /// Entries an `ldc` or a bootstrap argument may name.
    pub(crate) fn is_loadable(&self, index: u16) -> bool {
        matches!(
            self.get(index),
            Some(
                Constant::Integer
                    | Constant::Float
                    | Constant::Long
                    | Constant::Double
                    | Constant::Class(_)
                    | Constant::String(_)
                    | Constant::MethodHandle { .. }
                    | Constant::MethodType(_)
                    | Constant::Dynamic { .. }
            )
        )
    }

    /// Highest bootstrap method index named by a dynamic entry.
    pub(crate) fn max_bootstrap_index(&self) -> Option<u16> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Constant::Dynamic { bootstrap, .. } | Constant::InvokeDynamic { bootstrap, .. } => {
                    Some(*bootstrap)
                }
                _ => None,
            })
            .max()
    }

    /// First `CONSTANT_Module` or `CONSTANT_Package` slot. Only module
    /// descriptors may carry these.
    pub(crate) fn first_module_entry(&self) -> Option<u16> {
        (0..=u16::MAX)
            .zip(&self.entries)
            .find(|(_, entry)| matches!(entry, Constant::Module(_) | Constant::Package(_)))
            .map(|(index, _)| index)
    }

    /// Cross-reference checks, run once every entry is known.
    pub(crate) fn validate(&self, major: u16) -> Result<(), FormatError> {
        for (index, entry) in (0..=u16::MAX).zip(&self.entries) {
            self.validate_entry(entry, major)
                .map_err(|details| FormatError::ConstantPool { index, details })?;
        }
        Ok(())
    }

    fn validate_entry(&self, entry: &Constant, major: u16) -> Result<(), String> {
        let utf8 = |index: u16| {
            self.utf8(index)
                .ok_or_else(|| format!("#{index} is not a UTF-8 entry"))
        };
        match entry {
            Constant::Unusable
            | Constant::Utf8(_)
            | Constant::Integer
            | Constant::Float
            | Constant::Long
            | Constant::Double => Ok(()),
            Constant::Class(name) => {
                let name = utf8(*name)?;
                if descriptors::is_class_constant_name(name) {
                    Ok(())
                } else {
                    Err(format!("illegal class name {name:?}"))
                }
            }
            Constant::String(index) | Constant::Module(index) | Constant::Package(index) => {
                utf8(*index).map(|_| ())
            }
            Constant::MethodType(index) => {
                let descriptor = utf8(*index)?;
                descriptors::method_shape(descriptor)
                    .map(|_| ())
                    .ok_or_else(|| format!("illegal method descriptor {descriptor:?}"))
            }
            Constant::NameAndType { name, descriptor } => {
                let (name, descriptor) = (utf8(*name)?, utf8(*descriptor)?);
                if is_legal_name_and_type(name, descriptor) {
                    Ok(())
                } else {
                    Err(format!("illegal name and type {name}:{descriptor}"))
                }
            }
            Constant::FieldRef(member) => self.validate_member_ref(*member, MemberKind::Field),
            Constant::MethodRef(member) => {
                self.validate_member_ref(*member, MemberKind::Method)?;
                let (name, _) = self.member_name_and_type(*member)?;
                if name.starts_with('<') && name != "<init>" {
                    return Err(format!("method reference to {name}"));
                }
                Ok(())
            }
            Constant::InterfaceMethodRef(member) => {
                self.validate_member_ref(*member, MemberKind::Method)
            }
            Constant::MethodHandle { kind, reference } => {
                self.validate_method_handle(*kind, *reference, major)
            }
            Constant::Dynamic { name_and_type, .. } => {
                let (name, descriptor) = self.dynamic_name_and_type(*name_and_type)?;
                if descriptors::is_field_descriptor(descriptor) {
                    Ok(())
                } else {
                    Err(format!("dynamic constant {name} has method type {descriptor}"))
                }
            }
            Constant::InvokeDynamic { name_and_type, .. } => {
                let (name, descriptor) = self.dynamic_name_and_type(*name_and_type)?;
                if descriptors::method_shape(descriptor).is_some() {
                    Ok(())
                } else {
                    Err(format!("invokedynamic {name} has field type {descriptor}"))
                }
            }
        }
    }

    fn dynamic_name_and_type(&self, index: u16) -> Result<(&str, &str), String> {
        self.name_and_type(index)
            .ok_or_else(|| format!("#{index} is not a name-and-type entry"))
    }

    fn member_name_and_type(&self, member: MemberRef) -> Result<(&str, &str), String> {
        self.name_and_type(member.name_and_type)
            .ok_or_else(|| format!("#{} is not a name-and-type entry", member.name_and_type))
    }

    fn validate_member_ref(&self, member: MemberRef, kind: MemberKind) -> Result<(), String> {
        if self.class_name(member.class).is_none() {
            return Err(format!("#{} is not a class entry", member.class));
        }
        let (name, descriptor) = self.member_name_and_type(member)?;
        let legal = match kind {
            MemberKind::Field => !descriptor.starts_with('('),
            MemberKind::Method => descriptor.starts_with('('),
        };
        if legal {
            Ok(())
        } else {
            Err(format!("illegal {kind} reference {name}:{descriptor}"))
        }
    }

    fn validate_method_handle(&self, kind: u8, reference: u16, major: u16) -> Result<(), String> {
        let target = self.get(reference);
        let member = match (kind, target) {
            (1..=4, Some(Constant::FieldRef(_))) => return Ok(()),
            (5 | 8, Some(Constant::MethodRef(member)))
            | (6 | 7, Some(Constant::MethodRef(member)))
            | (9, Some(Constant::InterfaceMethodRef(member))) => *member,
            (6 | 7, Some(Constant::InterfaceMethodRef(member))) if major >= JAVA_8 => *member,
            _ => {
                return Err(format!(
                    "method handle kind {kind} cannot refer to #{reference}"
                ));
            }
        };
        let (name, _) = self.member_name_and_type(member)?;
        let constructor = name == "<init>";
        if (kind == 8) == constructor {
            Ok(())
        } else {
            Err(format!("method handle kind {kind} cannot target {name}"))
        }
    }
}

/// Name and descriptor legality of a `CONSTANT_NameAndType`, decided by
/// whether the descriptor is a method or a field type.
fn is_legal_name_and_type(name: &str, descriptor: &str) -> bool {
    if descriptor.starts_with('(') {
        descriptors::is_method_name(name)
            && descriptors::method_shape(descriptor)
                .is_some_and(|shape| shape.returns_void || !name.starts_with('<'))
    } else {
        descriptors::is_unqualified_name(name) && descriptors::is_field_descriptor(descriptor)
    }
}

/// Decode the JVM's modified UTF-8 (no raw NUL, no 4-byte forms). `strict`
/// also rejects overlong encodings other than the two-byte NUL.
pub(crate) fn decode_modified_utf8(bytes: &[u8], strict: bool) -> Option<String> {
    let continuation = |b: Option<&u8>| b.copied().filter(|b| b & 0xC0 == 0x80);
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7F => {
                units.push(u16::from(b));
                i += 1;
            }
            0xC0..=0xDF => {
                let b2 = continuation(bytes.get(i + 1))?;
                let unit = (u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F);
                if strict && unit != 0 && unit < 0x80 {
                    return None;
                }
                units.push(unit);
                i += 2;
            }
            0xE0..=0xEF => {
                let b2 = continuation(bytes.get(i + 1))?;
                let b3 = continuation(bytes.get(i + 2))?;
                let unit =
                    (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F);
                if strict && unit < 0x800 {
                    return None;
                }
                units.push(unit);
                i += 3;
            }
            _ => return None,
        }
    }
    Some(String::from_utf16_lossy(&units))
}
