//! Test fixtures: a class-file builder, a locator for attributes inside
//! compiled class files, and temporary class trees.
//!
//! Compiled for unit tests and behind the `test-support` feature for
//! integration tests. Everything here panics on I/O failure.

#![allow(missing_docs, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::loader::classfile::{MAGIC, access, binary_to_internal};

/// One piece of a generated attribute body. Pool references are resolved
/// (and added to the pool) when the class is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    U1(u8),
    U2(u16),
    U4(u32),
    Bytes(Vec<u8>),
    /// Index of a `CONSTANT_Utf8`.
    Utf8(String),
    /// Index of a `CONSTANT_Class`, internal form.
    Class(String),
    /// Index of a `CONSTANT_Integer`.
    Integer(i32),
    /// Index of a `CONSTANT_NameAndType`.
    NameAndType(String, String),
    /// Index of a `CONSTANT_MethodHandle` to a `CONSTANT_Methodref`.
    MethodHandle {
        kind: u8,
        class: String,
        name: String,
        descriptor: String,
    },
    /// A complete nested attribute, header included.
    Attribute(AttributeSpec),
}

/// A generated attribute: name plus body; the length is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub body: Vec<Part>,
}

impl AttributeSpec {
    pub fn new(name: &str, body: Vec<Part>) -> Self {
        Self {
            name: name.to_string(),
            body,
        }
    }

    pub fn raw(name: &str, bytes: Vec<u8>) -> Self {
        Self::new(name, vec![Part::Bytes(bytes)])
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, Vec::new())
    }
}

/// Body of a generated `Code` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSpec {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// `[start_pc, end_pc, handler_pc, catch_type]`.
    pub handlers: Vec<[u16; 4]>,
    pub attributes: Vec<AttributeSpec>,
    /// Zero bytes appended after the declared contents.
    pub padding: usize,
}

impl CodeSpec {
    /// A single `return` instruction.
    pub fn returning() -> Self {
        Self {
            max_stack: 1,
            max_locals: 16,
            code: vec![0xB1],
            handlers: Vec::new(),
            attributes: Vec::new(),
            padding: 0,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Debug, Clone)]
struct FieldSpec {
    access: u16,
    name: String,
    descriptor: String,
    attributes: Vec<AttributeSpec>,
}

#[derive(Debug, Clone)]
struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    code: Option<CodeSpec>,
    attributes: Vec<AttributeSpec>,
}

#[derive(Debug, Clone)]
enum InterfaceRef {
    Named(String),
    Index(u16),
}

#[derive(Debug, Clone)]
enum ExtraConstant {
    Raw { bytes: Vec<u8>, slots: u16 },
    MethodType(String),
    /// `CONSTANT_Dynamic` (tag 17) or `CONSTANT_InvokeDynamic` (tag 18).
    Dynamic {
        tag: u8,
        bootstrap: u16,
        name: String,
        descriptor: String,
    },
    MethodHandle(Part),
}

/// Emits class-file bytes. Names are given in dotted form.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    magic: u32,
    minor: u16,
    major: u16,
    access: u16,
    this_class: String,
    this_index: Option<u16>,
    super_class: Option<String>,
    interfaces: Vec<InterfaceRef>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    attributes: Vec<AttributeSpec>,
    extras: Vec<ExtraConstant>,
    trailing: Vec<u8>,
}

impl ClassFileBuilder {
    /// `public class <name> extends java.lang.Object`, version 52.
    pub fn class(name: &str) -> Self {
        Self {
            magic: MAGIC,
            minor: 0,
            major: 52,
            access: access::PUBLIC | access::SUPER,
            this_class: binary_to_internal(name),
            this_index: None,
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            extras: Vec::new(),
            trailing: Vec::new(),
        }
    }

    /// `public interface <name>`, version 52.
    pub fn interface(name: &str) -> Self {
        Self::class(name).access(access::PUBLIC | access::INTERFACE | access::ABSTRACT)
    }

    /// Internal-form name of the class being built.
    pub fn internal_name(&self) -> &str {
        &self.this_class
    }

    #[must_use]
    pub fn extends(self, name: &str) -> Self {
        self.extends_internal(&binary_to_internal(name))
    }

    #[must_use]
    pub fn extends_internal(mut self, internal: &str) -> Self {
        self.super_class = Some(internal.to_string());
        self
    }

    #[must_use]
    pub fn no_super(mut self) -> Self {
        self.super_class = None;
        self
    }

    #[must_use]
    pub fn implements(mut self, name: &str) -> Self {
        self.interfaces
            .push(InterfaceRef::Named(binary_to_internal(name)));
        self
    }

    /// Declare a superinterface by raw constant pool index.
    #[must_use]
    pub fn implements_index(mut self, index: u16) -> Self {
        self.interfaces.push(InterfaceRef::Index(index));
        self
    }

    /// `PermittedSubclasses` naming `subclasses`; needs version 61.
    #[must_use]
    pub fn permits(self, subclasses: &[&str]) -> Self {
        let mut body = vec![Part::U2(u16::try_from(subclasses.len()).expect("too many"))];
        body.extend(
            subclasses
                .iter()
                .map(|name| Part::Class(binary_to_internal(name))),
        );
        self.class_attribute(AttributeSpec::new("PermittedSubclasses", body))
    }

    #[must_use]
    pub const fn version(mut self, major: u16) -> Self {
        self.major = major;
        self
    }

    #[must_use]
    pub const fn minor_version(mut self, minor: u16) -> Self {
        self.minor = minor;
        self
    }

    #[must_use]
    pub const fn access(mut self, flags: u16) -> Self {
        self.access = flags;
        self
    }

    #[must_use]
    pub const fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    /// Point `this_class` at an arbitrary constant pool index.
    #[must_use]
    pub const fn this_class_index(mut self, index: u16) -> Self {
        self.this_index = Some(index);
        self
    }

    #[must_use]
    pub fn trailing(mut self, bytes: &[u8]) -> Self {
        self.trailing.extend_from_slice(bytes);
        self
    }

    #[must_use]
    pub fn class_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn field(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.field_with(access, name, descriptor, Vec::new())
    }

    /// `static final` field initialized from an integer constant.
    #[must_use]
    pub fn constant_field(self, name: &str, descriptor: &str, value: i32) -> Self {
        self.field_with(
            access::PUBLIC | access::STATIC | access::FINAL,
            name,
            descriptor,
            vec![AttributeSpec::new(
                "ConstantValue",
                vec![Part::Integer(value)],
            )],
        )
    }

    #[must_use]
    pub fn field_with_attribute(
        self,
        access: u16,
        name: &str,
        descriptor: &str,
        attribute: &str,
        body: Vec<u8>,
    ) -> Self {
        self.field_with(
            access,
            name,
            descriptor,
            vec![AttributeSpec::raw(attribute, body)],
        )
    }

    #[must_use]
    pub fn field_with(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<AttributeSpec>,
    ) -> Self {
        self.fields.push(FieldSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes,
        });
        self
    }

    /// Method with a `return`-only body, or no body when abstract or native.
    #[must_use]
    pub fn method(self, access: u16, name: &str, descriptor: &str) -> Self {
        let code = (access & (access::ABSTRACT | access::NATIVE) == 0).then(CodeSpec::returning);
        self.method_with(access, name, descriptor, code, Vec::new())
    }

    #[must_use]
    pub fn method_with_code(self, access: u16, name: &str, descriptor: &str, code: CodeSpec) -> Self {
        self.method_with(access, name, descriptor, Some(code), Vec::new())
    }

    #[must_use]
    pub fn method_without_code(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.method_with(access, name, descriptor, None, Vec::new())
    }

    /// Method with `attributes` written after its `Code`, if any.
    #[must_use]
    pub fn method_with(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Option<CodeSpec>,
        attributes: Vec<AttributeSpec>,
    ) -> Self {
        self.methods.push(MethodSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            code,
            attributes,
        });
        self
    }

    /// Append raw constant pool bytes occupying `slots` entries.
    #[must_use]
    pub fn raw_constant(mut self, bytes: Vec<u8>, slots: u16) -> Self {
        self.extras.push(ExtraConstant::Raw { bytes, slots });
        self
    }

    /// Append a `CONSTANT_MethodType` for `descriptor`.
    #[must_use]
    pub fn raw_method_type(mut self, descriptor: &str) -> Self {
        self.extras
            .push(ExtraConstant::MethodType(descriptor.to_string()));
        self
    }

    /// Append a `CONSTANT_InvokeDynamic` using bootstrap method `bootstrap`.
    #[must_use]
    pub fn invoke_dynamic(self, bootstrap: u16, name: &str, descriptor: &str) -> Self {
        self.dynamic_entry(18, bootstrap, name, descriptor)
    }

    /// Append a `CONSTANT_Dynamic` using bootstrap method `bootstrap`.
    #[must_use]
    pub fn dynamic_constant(self, bootstrap: u16, name: &str, descriptor: &str) -> Self {
        self.dynamic_entry(17, bootstrap, name, descriptor)
    }

    fn dynamic_entry(mut self, tag: u8, bootstrap: u16, name: &str, descriptor: &str) -> Self {
        self.extras.push(ExtraConstant::Dynamic {
            tag,
            bootstrap,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    /// Append a `CONSTANT_MethodHandle` of `kind` to `class.name:descriptor`.
    #[must_use]
    pub fn method_handle(mut self, kind: u8, class: &str, name: &str, descriptor: &str) -> Self {
        self.extras.push(ExtraConstant::MethodHandle(Part::MethodHandle {
            kind,
            class: binary_to_internal(class),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Pool::new();
        let this_index = pool.class(&self.this_class);
        let compact_code = self.major == 45 && self.minor <= 2;

        let mut body = Vec::new();
        put_u2(&mut body, self.access);
        put_u2(&mut body, self.this_index.unwrap_or(this_index));
        let super_index = self
            .super_class
            .as_deref()
            .map_or(0, |name| pool.class(name));
        put_u2(&mut body, super_index);

        put_len(&mut body, self.interfaces.len());
        for interface in &self.interfaces {
            let index = match interface {
                InterfaceRef::Named(name) => pool.class(name),
                InterfaceRef::Index(index) => *index,
            };
            put_u2(&mut body, index);
        }

        put_len(&mut body, self.fields.len());
        for field in &self.fields {
            put_u2(&mut body, field.access);
            put_u2(&mut body, pool.utf8(&field.name));
            put_u2(&mut body, pool.utf8(&field.descriptor));
            put_attributes(&mut body, &mut pool, &field.attributes);
        }

        put_len(&mut body, self.methods.len());
        for method in &self.methods {
            put_u2(&mut body, method.access);
            put_u2(&mut body, pool.utf8(&method.name));
            put_u2(&mut body, pool.utf8(&method.descriptor));
            put_len(
                &mut body,
                usize::from(method.code.is_some()) + method.attributes.len(),
            );
            if let Some(code) = &method.code {
                put_u2(&mut body, pool.utf8("Code"));
                let encoded = encode_code(code, &mut pool, compact_code);
                put_u4(&mut body, u32::try_from(encoded.len()).expect("code too long"));
                body.extend_from_slice(&encoded);
            }
            for attribute in &method.attributes {
                put_attribute(&mut body, &mut pool, attribute);
            }
        }

        put_attributes(&mut body, &mut pool, &self.attributes);
        body.extend_from_slice(&self.trailing);

        for extra in &self.extras {
            match extra {
                ExtraConstant::Raw { bytes, slots } => pool.raw(bytes, *slots),
                ExtraConstant::MethodType(descriptor) => {
                    let [hi, lo] = pool.utf8(descriptor).to_be_bytes();
                    pool.raw(&[16, hi, lo], 1);
                }
                ExtraConstant::Dynamic {
                    tag,
                    bootstrap,
                    name,
                    descriptor,
                } => {
                    let [nhi, nlo] = pool.name_and_type(name, descriptor).to_be_bytes();
                    let [bhi, blo] = bootstrap.to_be_bytes();
                    pool.raw(&[*tag, bhi, blo, nhi, nlo], 1);
                }
                ExtraConstant::MethodHandle(handle) => {
                    put_part(&mut Vec::new(), &mut pool, handle);
                }
            }
        }

        let mut out = Vec::with_capacity(10 + pool.bytes.len() + body.len());
        put_u4(&mut out, self.magic);
        put_u2(&mut out, self.minor);
        put_u2(&mut out, self.major);
        put_u2(&mut out, pool.next);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

fn encode_code(code: &CodeSpec, pool: &mut Pool, compact: bool) -> Vec<u8> {
    let mut out = Vec::new();
    if compact {
        out.push(u8::try_from(code.max_stack).expect("max_stack exceeds u1"));
        out.push(u8::try_from(code.max_locals).expect("max_locals exceeds u1"));
        put_len(&mut out, code.code.len());
    } else {
        put_u2(&mut out, code.max_stack);
        put_u2(&mut out, code.max_locals);
        put_u4(&mut out, u32::try_from(code.code.len()).expect("code too long"));
    }
    out.extend_from_slice(&code.code);
    put_len(&mut out, code.handlers.len());
    for handler in &code.handlers {
        for value in handler {
            put_u2(&mut out, *value);
        }
    }
    put_attributes(&mut out, pool, &code.attributes);
    out.resize(out.len() + code.padding, 0);
    out
}

fn put_attributes(out: &mut Vec<u8>, pool: &mut Pool, attributes: &[AttributeSpec]) {
    put_len(out, attributes.len());
    for attribute in attributes {
        put_attribute(out, pool, attribute);
    }
}

fn put_attribute(out: &mut Vec<u8>, pool: &mut Pool, attribute: &AttributeSpec) {
    put_u2(out, pool.utf8(&attribute.name));
    let mut body = Vec::new();
    for part in &attribute.body {
        put_part(&mut body, pool, part);
    }
    put_u4(out, u32::try_from(body.len()).expect("attribute too long"));
    out.extend_from_slice(&body);
}

fn put_part(out: &mut Vec<u8>, pool: &mut Pool, part: &Part) {
    match part {
        Part::U1(value) => out.push(*value),
        Part::U2(value) => put_u2(out, *value),
        Part::U4(value) => put_u4(out, *value),
        Part::Bytes(bytes) => out.extend_from_slice(bytes),
        Part::Utf8(text) => put_u2(out, pool.utf8(text)),
        Part::Class(name) => put_u2(out, pool.class(name)),
        Part::Integer(value) => put_u2(out, pool.integer(*value)),
        Part::NameAndType(name, descriptor) => put_u2(out, pool.name_and_type(name, descriptor)),
        Part::MethodHandle {
            kind,
            class,
            name,
            descriptor,
        } => {
            let [hi, lo] = pool.method_ref(class, name, descriptor).to_be_bytes();
            let index = pool.next;
            pool.raw(&[15, *kind, hi, lo], 1);
            put_u2(out, index);
        }
        Part::Attribute(attribute) => put_attribute(out, pool, attribute),
    }
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    put_u2(out, u16::try_from(len).expect("count exceeds u16"));
}

/// Constant pool under construction; entries are deduplicated.
#[derive(Debug)]
struct Pool {
    bytes: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    name_and_types: HashMap<(String, String), u16>,
}

impl Pool {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            utf8: HashMap::new(),
            classes: HashMap::new(),
            name_and_types: HashMap::new(),
        }
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8.get(text) {
            return index;
        }
        let mut entry = vec![1];
        put_len(&mut entry, text.len());
        entry.extend_from_slice(text.as_bytes());
        let index = self.next;
        self.raw(&entry, 1);
        self.utf8.insert(text.to_string(), index);
        index
    }

    fn class(&mut self, internal: &str) -> u16 {
        if let Some(&index) = self.classes.get(internal) {
            return index;
        }
        let [hi, lo] = self.utf8(internal).to_be_bytes();
        let index = self.next;
        self.raw(&[7, hi, lo], 1);
        self.classes.insert(internal.to_string(), index);
        index
    }

    fn integer(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        let index = self.next;
        self.raw(&entry, 1);
        index
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let key = (name.to_string(), descriptor.to_string());
        if let Some(&index) = self.name_and_types.get(&key) {
            return index;
        }
        let [nhi, nlo] = self.utf8(name).to_be_bytes();
        let [dhi, dlo] = self.utf8(descriptor).to_be_bytes();
        let index = self.next;
        self.raw(&[12, nhi, nlo, dhi, dlo], 1);
        self.name_and_types.insert(key, index);
        index
    }

    fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let [chi, clo] = self.class(class).to_be_bytes();
        let [nhi, nlo] = self.name_and_type(name, descriptor).to_be_bytes();
        let index = self.next;
        self.raw(&[10, chi, clo, nhi, nlo], 1);
        index
    }

    fn raw(&mut self, bytes: &[u8], slots: u16) {
        self.bytes.extend_from_slice(bytes);
        self.next += slots;
    }
}

/// Write `value` big-endian at `offset`.
pub fn patch_u2(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Where one attribute sits inside a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSite {
    /// `class`, `field <name><descriptor>`, `method <name><descriptor>`, or
    /// `method <name><descriptor>/Code` for attributes nested in a `Code`.
    pub owner: String,
    pub name: String,
    /// Offset of the attribute's name index.
    pub offset: usize,
    /// Offset of the first body byte.
    pub body: usize,
    pub length: usize,
}

/// Offsets of the constant pool entries and attributes of a compiled class,
/// for mutating it in place.
#[derive(Debug, Clone)]
pub struct ClassLayout {
    utf8: HashMap<String, u16>,
    /// Offset of each UTF-8 entry's first text byte.
    utf8_text: HashMap<u16, usize>,
    classes: HashMap<u16, u16>,
    /// Offset of the `this_class` index.
    pub this_class: usize,
    /// Offsets of the interface indices, in order.
    pub interfaces: Vec<usize>,
    pub attributes: Vec<AttributeSite>,
}

struct Cursor<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u1(&mut self) -> u8 {
        let value = self.bytes[self.pos];
        self.pos += 1;
        value
    }

    fn u2(&mut self) -> u16 {
        let value = u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        value
    }

    fn u4(&mut self) -> u32 {
        let b = &self.bytes[self.pos..self.pos + 4];
        self.pos += 4;
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }
}

impl ClassLayout {
    /// Walk a well-formed class file.
    pub fn of(bytes: &[u8]) -> Self {
        let mut c = Cursor { bytes, pos: 8 };
        let mut names = HashMap::new();
        let mut utf8_text = HashMap::new();
        let mut classes = HashMap::new();
        let count = c.u2();
        let mut index = 1;
        while index < count {
            match c.u1() {
                1 => {
                    let len = usize::from(c.u2());
                    utf8_text.insert(index, c.pos);
                    let text = String::from_utf8_lossy(&bytes[c.pos..c.pos + len]).into_owned();
                    c.pos += len;
                    names.insert(index, text);
                }
                3 | 4 => c.pos += 4,
                5 | 6 => {
                    c.pos += 8;
                    index += 1;
                }
                7 => {
                    classes.insert(index, c.u2());
                }
                8 | 16 | 19 | 20 => c.pos += 2,
                9..=12 | 17 | 18 => c.pos += 4,
                15 => c.pos += 3,
                tag => panic!("unknown constant tag {tag}"),
            }
            index += 1;
        }

        let this_class = c.pos + 2;
        c.pos += 6;
        let interfaces = (0..c.u2()).map(|i| c.pos + 2 * usize::from(i)).collect::<Vec<_>>();
        c.pos += 2 * interfaces.len();
        let mut layout = Self {
            utf8: names.iter().map(|(i, text)| (text.clone(), *i)).collect(),
            utf8_text,
            classes,
            this_class,
            interfaces,
            attributes: Vec::new(),
        };
        let name = |index: u16| names.get(&index).cloned().unwrap_or_default();

        for kind in ["field", "method"] {
            for _ in 0..c.u2() {
                c.pos += 2;
                let member = name(c.u2());
                let descriptor = name(c.u2());
                let owner = format!("{kind} {member}{descriptor}");
                layout.read_attributes(&mut c, &owner, &name);
            }
        }
        layout.read_attributes(&mut c, "class", &name);
        layout
    }

    fn read_attributes(&mut self, c: &mut Cursor<'_>, owner: &str, name: &impl Fn(u16) -> String) {
        for _ in 0..c.u2() {
            let offset = c.pos;
            let attribute = name(c.u2());
            let length = c.u4() as usize;
            let body = c.pos;
            if attribute == "Code" {
                let mut code = Cursor {
                    bytes: c.bytes,
                    pos: body + 4,
                };
                let code_length = code.u4() as usize;
                code.pos += code_length;
                let handlers = usize::from(code.u2());
                code.pos += 8 * handlers;
                self.read_attributes(&mut code, &format!("{owner}/Code"), name);
            }
            self.attributes.push(AttributeSite {
                owner: owner.to_string(),
                name: attribute,
                offset,
                body,
                length,
            });
            c.pos = body + length;
        }
    }

    /// Index of the UTF-8 entry holding `text`.
    pub fn utf8(&self, text: &str) -> u16 {
        *self
            .utf8
            .get(text)
            .unwrap_or_else(|| panic!("no UTF-8 entry {text:?}"))
    }

    /// Offset of the first byte of the UTF-8 entry holding `text`.
    pub fn utf8_text(&self, text: &str) -> usize {
        self.utf8_text[&self.utf8(text)]
    }

    /// Index of the class entry naming `internal`.
    pub fn class(&self, internal: &str) -> u16 {
        let name = self.utf8(internal);
        self.classes
            .iter()
            .find(|(_, utf8)| **utf8 == name)
            .map(|(index, _)| *index)
            .unwrap_or_else(|| panic!("no class entry {internal:?}"))
    }

    /// The attribute `name` whose owner starts with `owner`.
    pub fn site(&self, owner: &str, name: &str) -> &AttributeSite {
        self.attributes
            .iter()
            .find(|site| site.owner.starts_with(owner) && site.name == name)
            .unwrap_or_else(|| panic!("no {name} attribute on {owner}"))
    }
}

/// A temporary directory populated with class files; removed on drop.
#[derive(Debug)]
pub struct ClassTree {
    _dir: TempDir,
    root: PathBuf,
}

impl Default for ClassTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonicalize temp dir");
        Self { _dir: dir, root }
    }

    /// A new tree holding a copy of every file under `source`.
    pub fn copy_from(source: &Path) -> Self {
        let tree = Self::new();
        let mut pending = vec![source.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir).expect("read fixture dir") {
                let path = entry.expect("read fixture entry").path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    let relative = path.strip_prefix(source).expect("path under source");
                    let bytes = fs::read(&path).expect("read fixture file");
                    tree.add_bytes(&relative.to_string_lossy(), &bytes);
                }
            }
        }
        tree
    }

    /// Canonical path of the tree's root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `class` where its own name says it lives.
    pub fn add(&self, class: &ClassFileBuilder) -> PathBuf {
        self.add_at(&format!("{}.class", class.internal_name()), class)
    }

    /// Write `class` at `relative`, whatever its declared name.
    pub fn add_at(&self, relative: &str, class: &ClassFileBuilder) -> PathBuf {
        self.add_bytes(relative, &class.build())
    }

    pub fn add_bytes(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, bytes).expect("write fixture");
        path
    }

    pub fn read(&self, relative: &str) -> Vec<u8> {
        fs::read(self.root.join(relative)).expect("read fixture")
    }

    pub fn mkdir(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        fs::create_dir_all(&path).expect("create dir");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::classfile::ClassFile;

    #[test]
    fn built_class_round_trips_through_the_parser() {
        let bytes = ClassFileBuilder::class("a.b.Foo")
            .implements("a.Api")
            .field(access::PRIVATE, "x", "J")
            .method(access::PUBLIC, "<init>", "()V")
            .build();
        let class = ClassFile::parse(&bytes, 69).unwrap();
        assert_eq!(class.binary_name(), "a.b.Foo");
        assert_eq!(class.interfaces, vec!["a/Api"]);
    }

    #[test]
    fn layout_finds_attributes_of_built_classes() {
        let bytes = ClassFileBuilder::class("a.Foo")
            .method_with_code(
                access::PUBLIC,
                "run",
                "()V",
                CodeSpec::returning().with_attribute(AttributeSpec::new(
                    "LineNumberTable",
                    vec![Part::U2(1), Part::U2(0), Part::U2(7)],
                )),
            )
            .class_attribute(AttributeSpec::new("SourceFile", vec![Part::Utf8("Foo.java".into())]))
            .build();
        let layout = ClassLayout::of(&bytes);

        let source = layout.site("class", "SourceFile");
        assert_eq!(source.length, 2);
        let index = u16::from_be_bytes([bytes[source.body], bytes[source.body + 1]]);
        assert_eq!(index, layout.utf8("Foo.java"));

        let lines = layout.site("method run", "LineNumberTable");
        assert_eq!(lines.owner, "method run()V/Code");
        assert_eq!(lines.length, 6);
        assert!(layout.class("a/Foo") > 0);
    }

    #[test]
    fn layout_finds_header_indices_and_names() {
        let bytes = ClassFileBuilder::class("a.Foo")
            .implements("a.Api")
            .implements("a.Other")
            .build();
        let layout = ClassLayout::of(&bytes);
        let at = |offset: usize| u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);

        assert_eq!(at(layout.this_class), layout.class("a/Foo"));
        assert_eq!(layout.interfaces.len(), 2);
        assert_eq!(at(layout.interfaces[1]), layout.class("a/Other"));
        let text = layout.utf8_text("a/Api");
        assert_eq!(&bytes[text..text + 5], b"a/Api");
    }

    #[test]
    fn tree_writes_classes_at_their_package_path() {
        let tree = ClassTree::new();
        let path = tree.add(&ClassFileBuilder::class("a.b.Foo"));
        assert_eq!(path, tree.root().join("a").join("b").join("Foo.class"));
        assert!(path.is_file());
    }

    #[test]
    fn copied_tree_mirrors_the_source() {
        let source = ClassTree::new();
        source.add(&ClassFileBuilder::class("a.b.Foo"));
        let copy = ClassTree::copy_from(source.root());
        assert_eq!(copy.read("a/b/Foo.class"), source.read("a/b/Foo.class"));
    }
}
