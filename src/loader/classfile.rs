//! Structural parser for JVM class files.
//!
//! Defining a class happens in stages, in the order a JVM applies them:
//! [`ClassReader::open`] reads up to the class's own name, so a caller can
//! compare it with the requested name before anything else is looked at;
//! [`Supertypes`] hands out each direct superinterface as soon as it is
//! read, so it can be resolved before the rest of the file is checked; and
//! [`Supertypes::finish`] checks members, attributes and trailing bytes.
//! [`ClassFile::parse`] runs all stages back to back.
//!
//! Every violation is a [`FormatError`]; the loading context turns it into a
//! corrupt outcome, except [`FormatError::NotAClass`].

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::core::config::MIN_MAJOR_VERSION;
use crate::loader::attributes::AttributeChecker;
use crate::loader::constant_pool::ConstantPool;
use crate::loader::descriptors;
use crate::loader::reader::Reader;

/// First four bytes of every class file.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Access flag bits shared by classes, fields and methods (JVMS §4.1, §4.5, §4.6).
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const BRIDGE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const STRICT: u16 = 0x0800;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
    pub const MODULE: u16 = 0x8000;
}

pub(crate) const JAVA_5: u16 = 49;
pub(crate) const JAVA_6: u16 = 50;
pub(crate) const JAVA_7: u16 = 51;
pub(crate) const JAVA_8: u16 = 52;
pub(crate) const JAVA_9: u16 = 53;
pub(crate) const JAVA_11: u16 = 55;
pub(crate) const JAVA_12: u16 = 56;
pub(crate) const JAVA_16: u16 = 60;
pub(crate) const JAVA_17: u16 = 61;

const PREVIEW_MINOR_VERSION: u16 = 0xFFFF;
pub(crate) const MAX_CODE_LENGTH: u32 = 65_536;
const OBJECT: &str = "java/lang/Object";

/// Class flag bits the JVM keeps; the rest are dropped before any check.
const CLASS_FLAGS: u16 = access::PUBLIC
    | access::FINAL
    | access::SUPER
    | access::INTERFACE
    | access::ABSTRACT
    | access::SYNTHETIC
    | access::ANNOTATION
    | access::ENUM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Field => "field",
            Self::Method => "method",
        })
    }
}

/// Why a byte sequence is not a well-formed class file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("truncated class file: {needed} more byte(s) needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("incompatible magic value {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// `ACC_MODULE` is set: a module descriptor, not a class. A JVM reports
    /// this as a missing definition rather than a format error.
    #[error("not a class: ACC_MODULE is set")]
    NotAClass,

    #[error("invalid constant pool entry #{index}: {details}")]
    ConstantPool { index: u16, details: String },

    #[error("invalid {what} index #{index}")]
    BadIndex { what: &'static str, index: u16 },

    #[error("illegal class modifiers {0:#06x}")]
    ClassModifiers(u16),

    #[error("illegal class name {0:?}")]
    ClassName(String),

    #[error("invalid superclass: {0}")]
    Superclass(String),

    #[error("duplicate interface {0}")]
    DuplicateInterface(String),

    #[error("illegal {kind} modifiers {flags:#06x} on {name}")]
    MemberModifiers {
        kind: MemberKind,
        name: String,
        flags: u16,
    },

    #[error("illegal {kind} name {name:?}")]
    MemberName { kind: MemberKind, name: String },

    #[error("illegal {kind} descriptor {descriptor:?} for {name}")]
    Descriptor {
        kind: MemberKind,
        name: String,
        descriptor: String,
    },

    #[error("duplicate {kind} {name} {descriptor}")]
    DuplicateMember {
        kind: MemberKind,
        name: String,
        descriptor: String,
    },

    #[error("invalid Code attribute in method {method}: {details}")]
    Code { method: String, details: String },

    #[error("invalid {attribute} attribute on {owner}: {details}")]
    Attribute {
        attribute: &'static str,
        owner: String,
        details: String,
    },

    #[error("{0} extra byte(s) after the end of the class file")]
    TrailingBytes(usize),
}

/// A field or method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

impl Member {
    pub(crate) const fn has(&self, flag: u16) -> bool {
        self.access_flags & flag != 0
    }
}

/// The parts of a structurally valid class file the loader needs.
///
/// Class names are kept in internal form (`a/b/Foo`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub major_version: u16,
    pub minor_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    /// Classes named by `PermittedSubclasses`; empty unless the class is sealed.
    pub permitted_subclasses: Vec<String>,
}

impl ClassFile {
    /// Parse and structurally check `bytes`, accepting major versions up to
    /// `max_major_version`.
    pub fn parse(bytes: &[u8], max_major_version: u16) -> Result<Self, FormatError> {
        let mut supertypes = ClassReader::open(bytes, max_major_version)?.read_supertypes()?;
        while supertypes.next_interface()?.is_some() {}
        supertypes.finish()
    }

    #[must_use]
    pub const fn is_interface(&self) -> bool {
        self.access_flags & access::INTERFACE != 0
    }

    #[must_use]
    pub const fn is_final(&self) -> bool {
        self.access_flags & access::FINAL != 0
    }

    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.access_flags & access::PUBLIC != 0
    }

    /// Dotted name of this class.
    #[must_use]
    pub fn binary_name(&self) -> String {
        internal_to_binary(&self.this_class)
    }

    #[must_use]
    pub fn super_binary_name(&self) -> Option<String> {
        self.super_class.as_deref().map(internal_to_binary)
    }

    pub fn interface_binary_names(&self) -> impl Iterator<Item = String> + '_ {
        self.interfaces.iter().map(|name| internal_to_binary(name))
    }

    pub fn permitted_binary_names(&self) -> impl Iterator<Item = String> + '_ {
        self.permitted_subclasses
            .iter()
            .map(|name| internal_to_binary(name))
    }
}

/// A class file read as far as its own name: header, constant pool, class
/// modifiers and `this_class`.
#[derive(Debug)]
pub struct ClassReader<'b> {
    r: Reader<'b>,
    pool: ConstantPool,
    major_version: u16,
    minor_version: u16,
    access_flags: u16,
    this_class: String,
}

impl<'b> ClassReader<'b> {
    /// Check everything up to and including `this_class`.
    pub fn open(bytes: &'b [u8], max_major_version: u16) -> Result<Self, FormatError> {
        let mut r = Reader::new(bytes);
        let magic = r.u4()?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic(magic));
        }
        let minor_version = r.u2()?;
        let major_version = r.u2()?;
        check_version(major_version, minor_version, max_major_version)?;

        let pool = ConstantPool::parse(&mut r, major_version)?;
        // Module constants stop the pool checks: the flags decide whether
        // the file is a module descriptor or a malformed class.
        let module_entry = pool.first_module_entry();
        if module_entry.is_none() {
            pool.validate(major_version)?;
        }

        let access_flags = check_class_modifiers(r.u2()?, major_version, false)?;
        if let Some(index) = module_entry {
            return Err(FormatError::ConstantPool {
                index,
                details: "module constants are only legal in module descriptors".to_string(),
            });
        }

        let this_index = r.u2()?;
        let this_class = pool
            .class_name(this_index)
            .ok_or(FormatError::BadIndex {
                what: "this_class",
                index: this_index,
            })?
            .to_owned();
        if !descriptors::is_class_name(&this_class) {
            return Err(FormatError::ClassName(this_class));
        }

        Ok(Self {
            r,
            pool,
            major_version,
            minor_version,
            access_flags,
            this_class,
        })
    }

    /// Dotted name the file declares for itself.
    #[must_use]
    pub fn binary_name(&self) -> String {
        internal_to_binary(&self.this_class)
    }

    /// Read `super_class` and the interface count.
    pub fn read_supertypes(mut self) -> Result<Supertypes<'b>, FormatError> {
        let super_class = read_super_class(&mut self.r, &self.pool, &self.this_class)?;
        let remaining = self.r.u2()?;
        Ok(Supertypes {
            header: self,
            super_class,
            remaining,
            interfaces: Vec::with_capacity(usize::from(remaining)),
        })
    }
}

/// A class file read through its superclass, handing out interfaces one by one.
#[derive(Debug)]
pub struct Supertypes<'b> {
    header: ClassReader<'b>,
    super_class: Option<String>,
    remaining: u16,
    interfaces: Vec<String>,
}

impl Supertypes<'_> {
    /// Internal name of the declared superclass; `None` only for `java/lang/Object`.
    #[must_use]
    pub fn super_class(&self) -> Option<&str> {
        self.super_class.as_deref()
    }

    /// Read the next direct superinterface, in internal form.
    pub fn next_interface(&mut self) -> Result<Option<&str>, FormatError> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let index = self.header.r.u2()?;
        let name = self
            .header
            .pool
            .class_name(index)
            .filter(|name| !name.starts_with('['))
            .ok_or(FormatError::BadIndex {
                what: "interface",
                index,
            })?;
        self.interfaces.push(name.to_owned());
        Ok(self.interfaces.last().map(String::as_str))
    }

    /// Read whatever interfaces are left, then members, class attributes
    /// and the end of the file.
    pub fn finish(mut self) -> Result<ClassFile, FormatError> {
        while self.next_interface()?.is_some() {}
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.interfaces.iter().find(|name| !seen.insert(*name)) {
            return Err(FormatError::DuplicateInterface(internal_to_binary(duplicate)));
        }

        let ClassReader {
            mut r,
            pool,
            major_version,
            minor_version,
            access_flags,
            this_class,
        } = self.header;
        let checker = AttributeChecker::new(&pool, major_version, minor_version);
        let fields = read_fields(&mut r, &pool, checker, access_flags, major_version)?;
        let methods = read_methods(&mut r, &pool, checker, access_flags, major_version)?;
        let attributes =
            checker.class(&mut r, &this_class, access_flags, self.super_class.as_deref())?;
        if r.remaining() > 0 {
            return Err(FormatError::TrailingBytes(r.remaining()));
        }

        if access_flags & access::INTERFACE != 0 && self.super_class.as_deref() != Some(OBJECT) {
            return Err(FormatError::Superclass(format!(
                "interface {this_class} must extend {OBJECT}"
            )));
        }

        Ok(ClassFile {
            major_version,
            minor_version,
            access_flags,
            this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields,
            methods,
            permitted_subclasses: attributes.permitted_subclasses,
        })
    }
}

/// `a/b/Foo` → `a.b.Foo`.
#[must_use]
pub fn internal_to_binary(name: &str) -> String {
    name.replace('/', ".")
}

/// `a.b.Foo` → `a/b/Foo`.
#[must_use]
pub fn binary_to_internal(name: &str) -> String {
    name.replace('.', "/")
}

fn check_version(major: u16, minor: u16, max_major: u16) -> Result<(), FormatError> {
    let in_range = (MIN_MAJOR_VERSION..=max_major).contains(&major);
    let minor_ok = major < JAVA_12 || minor == 0 || minor == PREVIEW_MINOR_VERSION;
    if in_range && minor_ok {
        Ok(())
    } else {
        Err(FormatError::UnsupportedVersion { major, minor })
    }
}

/// Mask class flags (or an `InnerClasses` entry's flags when `inner`) to the
/// bits the JVM recognizes and apply its legality rules.
pub(crate) fn check_class_modifiers(raw: u16, major: u16, inner: bool) -> Result<u16, FormatError> {
    let mut recognized = CLASS_FLAGS;
    if inner {
        recognized |= access::PRIVATE | access::PROTECTED | access::STATIC;
    }
    if major >= JAVA_9 {
        recognized |= access::MODULE;
    }
    let mut flags = raw & recognized;
    if flags & access::INTERFACE != 0 && major < JAVA_6 {
        flags |= access::ABSTRACT;
    }
    if flags & access::MODULE != 0 {
        return Err(FormatError::NotAClass);
    }
    if legal_class_modifiers(flags, major) {
        Ok(flags)
    } else {
        Err(FormatError::ClassModifiers(flags))
    }
}

fn read_super_class(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    this_class: &str,
) -> Result<Option<String>, FormatError> {
    let index = r.u2()?;
    if index == 0 {
        if this_class == OBJECT {
            return Ok(None);
        }
        return Err(FormatError::Superclass(format!(
            "{this_class} declares no superclass"
        )));
    }
    let name = pool.class_name(index).ok_or(FormatError::BadIndex {
        what: "super_class",
        index,
    })?;
    if name.starts_with('[') {
        return Err(FormatError::Superclass(format!(
            "array type {name} cannot be a superclass"
        )));
    }
    Ok(Some(name.to_owned()))
}

fn read_member(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    kind: MemberKind,
) -> Result<Member, FormatError> {
    let access_flags = r.u2()?;
    let name_index = r.u2()?;
    let name = pool.utf8(name_index).ok_or(FormatError::BadIndex {
        what: match kind {
            MemberKind::Field => "field name",
            MemberKind::Method => "method name",
        },
        index: name_index,
    })?;
    let descriptor_index = r.u2()?;
    let descriptor = pool.utf8(descriptor_index).ok_or(FormatError::BadIndex {
        what: "descriptor",
        index: descriptor_index,
    })?;
    Ok(Member {
        access_flags,
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
    })
}

fn read_fields(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    checker: AttributeChecker<'_>,
    class_flags: u16,
    major: u16,
) -> Result<Vec<Member>, FormatError> {
    let count = r.u2()?;
    let mut fields = Vec::with_capacity(usize::from(count));
    let mut seen = HashSet::new();
    for _ in 0..count {
        let field = read_member(r, pool, MemberKind::Field)?;
        if !descriptors::is_unqualified_name(&field.name) {
            return Err(FormatError::MemberName {
                kind: MemberKind::Field,
                name: field.name,
            });
        }
        if !legal_field_modifiers(field.access_flags, class_flags, major) {
            return Err(FormatError::MemberModifiers {
                kind: MemberKind::Field,
                name: field.name,
                flags: field.access_flags,
            });
        }
        if !descriptors::is_field_descriptor(&field.descriptor) {
            return Err(FormatError::Descriptor {
                kind: MemberKind::Field,
                name: field.name,
                descriptor: field.descriptor,
            });
        }
        checker.field(r, &field)?;
        if !seen.insert((field.name.clone(), field.descriptor.clone())) {
            return Err(FormatError::DuplicateMember {
                kind: MemberKind::Field,
                name: field.name,
                descriptor: field.descriptor,
            });
        }
        fields.push(field);
    }
    Ok(fields)
}

fn read_methods(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    checker: AttributeChecker<'_>,
    class_flags: u16,
    major: u16,
) -> Result<Vec<Member>, FormatError> {
    let count = r.u2()?;
    let mut methods = Vec::with_capacity(usize::from(count));
    let mut seen = HashSet::new();
    for _ in 0..count {
        let method = read_member(r, pool, MemberKind::Method)?;
        if !descriptors::is_method_name(&method.name) {
            return Err(FormatError::MemberName {
                kind: MemberKind::Method,
                name: method.name,
            });
        }
        if !legal_method_modifiers(&method, class_flags, major) {
            return Err(FormatError::MemberModifiers {
                kind: MemberKind::Method,
                name: method.name,
                flags: method.access_flags,
            });
        }
        let shape = descriptors::method_shape(&method.descriptor)
            .filter(|shape| shape.returns_void || !method.name.starts_with('<'));
        let Some(shape) = shape else {
            return Err(FormatError::Descriptor {
                kind: MemberKind::Method,
                name: method.name,
                descriptor: method.descriptor,
            });
        };
        checker.method(r, &method, shape)?;
        if !seen.insert((method.name.clone(), method.descriptor.clone())) {
            return Err(FormatError::DuplicateMember {
                kind: MemberKind::Method,
                name: method.name,
                descriptor: method.descriptor,
            });
        }
        methods.push(method);
    }
    Ok(methods)
}

fn legal_class_modifiers(flags: u16, major: u16) -> bool {
    let has = |flag: u16| flags & flag != 0;
    let interface = has(access::INTERFACE);
    let since_5 = major >= JAVA_5;

    let conflicting = (has(access::ABSTRACT) && has(access::FINAL))
        || (interface && !has(access::ABSTRACT))
        || (interface && since_5 && (has(access::SUPER) || has(access::ENUM)))
        || (!interface && since_5 && has(access::ANNOTATION));
    !conflicting
}

fn visibility_count(flags: u16) -> usize {
    [access::PUBLIC, access::PRIVATE, access::PROTECTED]
        .into_iter()
        .filter(|flag| flags & flag != 0)
        .count()
}

fn legal_field_modifiers(flags: u16, class_flags: u16, major: u16) -> bool {
    let has = |flag: u16| flags & flag != 0;
    if class_flags & access::INTERFACE != 0 {
        let required = access::PUBLIC | access::STATIC | access::FINAL;
        let forbidden = access::PRIVATE | access::PROTECTED | access::VOLATILE | access::TRANSIENT;
        flags & required == required
            && !has(forbidden)
            && !(major >= JAVA_5 && has(access::ENUM))
    } else {
        visibility_count(flags) <= 1 && !(has(access::FINAL) && has(access::VOLATILE))
    }
}

fn legal_method_modifiers(method: &Member, class_flags: u16, major: u16) -> bool {
    let has = |flag: u16| method.has(flag);
    match method.name.as_str() {
        "<clinit>" => return major < JAVA_7 || has(access::STATIC),
        "<init>" if class_flags & access::INTERFACE != 0 => return false,
        _ => {}
    }

    if class_flags & access::INTERFACE != 0 {
        if major >= JAVA_8 {
            let public_xor_private = has(access::PUBLIC) != has(access::PRIVATE);
            let forbidden =
                access::PROTECTED | access::FINAL | access::SYNCHRONIZED | access::NATIVE;
            let abstract_conflict = has(access::ABSTRACT)
                && (has(access::PRIVATE)
                    || has(access::STATIC)
                    || (major < JAVA_17 && has(access::STRICT)));
            return public_xor_private && !has(forbidden) && !abstract_conflict;
        }
        let forbidden = access::PRIVATE
            | access::PROTECTED
            | access::STATIC
            | access::FINAL
            | access::SYNCHRONIZED
            | access::NATIVE
            | if major >= JAVA_5 { access::STRICT } else { 0 };
        return has(access::PUBLIC) && has(access::ABSTRACT) && !has(forbidden);
    }

    if visibility_count(method.access_flags) > 1 {
        return false;
    }
    if method.name == "<init>" {
        let forbidden = access::STATIC
            | access::FINAL
            | access::SYNCHRONIZED
            | access::NATIVE
            | access::ABSTRACT
            | if major >= JAVA_5 { access::BRIDGE } else { 0 };
        return !has(forbidden);
    }
    if has(access::ABSTRACT) {
        let forbidden = access::FINAL
            | access::NATIVE
            | access::PRIVATE
            | access::STATIC
            | access::SYNCHRONIZED
            | if (JAVA_5..JAVA_17).contains(&major) {
                access::STRICT
            } else {
                0
            };
        return !has(forbidden);
    }
    true
}
