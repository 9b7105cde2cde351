//! Attribute rules a JVM enforces while defining a class.
//!
//! Only attributes the JVM interprets at define time are checked, and only
//! from the class file version that introduced them. Everything else is
//! skipped by length. Stack map frames are left alone: they are verified at
//! link time, not when the class is defined.

#![allow(missing_docs)]

use std::collections::HashSet;

use crate::loader::classfile::{
    FormatError, JAVA_5, JAVA_6, JAVA_7, JAVA_11, JAVA_16, JAVA_17, MAX_CODE_LENGTH, Member,
    access, check_class_modifiers, internal_to_binary,
};
use crate::loader::constant_pool::{Constant, ConstantPool};
use crate::loader::descriptors::{self, MethodShape};
use crate::loader::reader::Reader;

const CODE: &str = "Code";
const CONSTANT_VALUE: &str = "ConstantValue";
const EXCEPTIONS: &str = "Exceptions";
const METHOD_PARAMETERS: &str = "MethodParameters";
const SYNTHETIC: &str = "Synthetic";
const DEPRECATED: &str = "Deprecated";
const SIGNATURE: &str = "Signature";
const SOURCE_FILE: &str = "SourceFile";
const SOURCE_DEBUG_EXTENSION: &str = "SourceDebugExtension";
const INNER_CLASSES: &str = "InnerClasses";
const ENCLOSING_METHOD: &str = "EnclosingMethod";
const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
const NEST_HOST: &str = "NestHost";
const NEST_MEMBERS: &str = "NestMembers";
const RECORD: &str = "Record";
const PERMITTED_SUBCLASSES: &str = "PermittedSubclasses";
const LINE_NUMBER_TABLE: &str = "LineNumberTable";
const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
const STACK_MAP_TABLE: &str = "StackMapTable";

const RECORD_CLASS: &str = "java/lang/Record";

/// Annotation tables allowed once on classes, fields and record components.
const ANNOTATIONS: &[&str] = &[
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

/// Annotation tables allowed once on methods.
const METHOD_ANNOTATIONS: &[&str] = &[
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleParameterAnnotations",
    "RuntimeInvisibleParameterAnnotations",
    "AnnotationDefault",
    "RuntimeVisibleTypeAnnotations",
    "RuntimeInvisibleTypeAnnotations",
];

/// An attribute as stored: its resolved name and raw body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attribute<'p, 'b> {
    pub(crate) name: &'p str,
    pub(crate) body: &'b [u8],
}

/// Read one attribute header and body. The name must be a UTF-8 entry at
/// every level.
pub(crate) fn read_attribute<'p, 'b>(
    r: &mut Reader<'b>,
    pool: &'p ConstantPool,
) -> Result<Attribute<'p, 'b>, FormatError> {
    let name_index = r.u2()?;
    let name = pool.utf8(name_index).ok_or(FormatError::BadIndex {
        what: "attribute name",
        index: name_index,
    })?;
    let length = r.u4()? as usize;
    let body = r.take(length)?;
    Ok(Attribute { name, body })
}

/// Class-level attributes the loader keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ClassAttributes {
    /// Internal names listed by `PermittedSubclasses`. Empty when not sealed.
    pub(crate) permitted_subclasses: Vec<String>,
}

/// Tracks attributes that may appear at most once per owner.
#[derive(Debug, Default)]
struct Once(HashSet<&'static str>);

impl Once {
    fn check(&mut self, attribute: &'static str, owner: &str) -> Result<(), FormatError> {
        if self.0.insert(attribute) {
            Ok(())
        } else {
            Err(FormatError::Attribute {
                attribute,
                owner: owner.to_owned(),
                details: "appears more than once".to_string(),
            })
        }
    }
}

/// Cursor over one attribute body; every failure names the attribute.
struct Body<'a, 'b> {
    attribute: &'static str,
    owner: &'a str,
    pool: &'a ConstantPool,
    length: usize,
    r: Reader<'b>,
}

impl<'a, 'b> Body<'a, 'b> {
    const fn new(
        attribute: &'static str,
        owner: &'a str,
        pool: &'a ConstantPool,
        bytes: &'b [u8],
    ) -> Self {
        Self {
            attribute,
            owner,
            pool,
            length: bytes.len(),
            r: Reader::new(bytes),
        }
    }

    fn fail(&self, details: impl Into<String>) -> FormatError {
        FormatError::Attribute {
            attribute: self.attribute,
            owner: self.owner.to_owned(),
            details: details.into(),
        }
    }

    fn short(&self, err: &FormatError) -> FormatError {
        match err {
            FormatError::Truncated { needed, .. } => {
                self.fail(format!("body ends {needed} byte(s) early"))
            }
            other => self.fail(other.to_string()),
        }
    }

    fn u1(&mut self) -> Result<u8, FormatError> {
        self.r.u1().map_err(|err| self.short(&err))
    }

    fn u2(&mut self) -> Result<u16, FormatError> {
        self.r.u2().map_err(|err| self.short(&err))
    }

    fn attribute(&mut self) -> Result<Attribute<'a, 'b>, FormatError> {
        let pool = self.pool;
        read_attribute(&mut self.r, pool).map_err(|err| self.short(&err))
    }

    fn expect_length(&self, expected: usize) -> Result<(), FormatError> {
        if self.length == expected {
            Ok(())
        } else {
            Err(self.fail(format!("length {} (expected {expected})", self.length)))
        }
    }

    fn finish(&self) -> Result<(), FormatError> {
        match self.r.remaining() {
            0 => Ok(()),
            extra => Err(self.fail(format!("{extra} byte(s) past the declared contents"))),
        }
    }

    fn class(&mut self, what: &str) -> Result<&'a str, FormatError> {
        let pool = self.pool;
        let index = self.u2()?;
        pool.class_name(index)
            .ok_or_else(|| self.fail(format!("{what} #{index} is not a class entry")))
    }

    fn utf8(&mut self, what: &str) -> Result<&'a str, FormatError> {
        let pool = self.pool;
        let index = self.u2()?;
        pool.utf8(index)
            .ok_or_else(|| self.fail(format!("{what} #{index} is not a UTF-8 entry")))
    }
}

fn empty(attribute: &'static str, owner: &str, body: &[u8]) -> Result<(), FormatError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(FormatError::Attribute {
            attribute,
            owner: owner.to_owned(),
            details: format!("length {} (expected 0)", body.len()),
        })
    }
}

/// Applies the define-time attribute rules for one class file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttributeChecker<'a> {
    pool: &'a ConstantPool,
    major: u16,
    minor: u16,
}

impl<'a> AttributeChecker<'a> {
    pub(crate) const fn new(pool: &'a ConstantPool, major: u16, minor: u16) -> Self {
        Self { pool, major, minor }
    }

    /// `Signature` and the once-only annotation tables, from version 49 on.
    fn signature_and_annotations(
        &self,
        attribute: Attribute<'_, '_>,
        owner: &str,
        once: &mut Once,
        annotations: &[&'static str],
    ) -> Result<(), FormatError> {
        if self.major < JAVA_5 {
            return Ok(());
        }
        if attribute.name == SIGNATURE {
            once.check(SIGNATURE, owner)?;
            let mut body = Body::new(SIGNATURE, owner, self.pool, attribute.body);
            body.expect_length(2)?;
            body.utf8("signature")?;
        } else if let Some(table) = annotations.iter().copied().find(|a| *a == attribute.name) {
            once.check(table, owner)?;
        }
        Ok(())
    }

    /// Attributes of one field, read from `r`.
    pub(crate) fn field(&self, r: &mut Reader<'_>, field: &Member) -> Result<(), FormatError> {
        let owner = format!("field {}", field.name);
        let mut once = Once::default();
        for _ in 0..r.u2()? {
            let attribute = read_attribute(r, self.pool)?;
            match attribute.name {
                // The JVM ignores initial values on instance fields.
                CONSTANT_VALUE if field.has(access::STATIC) => {
                    once.check(CONSTANT_VALUE, &owner)?;
                    self.constant_value(field, &owner, attribute.body)?;
                }
                SYNTHETIC => empty(SYNTHETIC, &owner, attribute.body)?,
                DEPRECATED => empty(DEPRECATED, &owner, attribute.body)?,
                _ => self.signature_and_annotations(attribute, &owner, &mut once, ANNOTATIONS)?,
            }
        }
        Ok(())
    }

    fn constant_value(&self, field: &Member, owner: &str, body: &[u8]) -> Result<(), FormatError> {
        let mut body = Body::new(CONSTANT_VALUE, owner, self.pool, body);
        body.expect_length(2)?;
        let index = body.u2()?;
        let matches = match (self.pool.get(index), field.descriptor.as_str()) {
            (Some(Constant::Long), "J")
            | (Some(Constant::Float), "F")
            | (Some(Constant::Double), "D")
            | (Some(Constant::Integer), "I" | "S" | "C" | "B" | "Z")
            | (Some(Constant::String(_)), "Ljava/lang/String;") => true,
            (Some(_), _) => false,
            (None, _) => return Err(body.fail(format!("constant index #{index} out of range"))),
        };
        if matches {
            Ok(())
        } else {
            Err(body.fail(format!(
                "constant #{index} does not match descriptor {}",
                field.descriptor
            )))
        }
    }

    /// Attributes of one method, read from `r`, including its `Code`.
    pub(crate) fn method(
        &self,
        r: &mut Reader<'_>,
        method: &Member,
        shape: MethodShape,
    ) -> Result<(), FormatError> {
        let owner = format!("method {}", method.name);
        let code_error = |details: &str| FormatError::Code {
            method: method.name.clone(),
            details: details.to_string(),
        };
        let bodyless = method.has(access::ABSTRACT) || method.has(access::NATIVE);
        let mut once = Once::default();
        let mut has_code = false;
        for _ in 0..r.u2()? {
            let attribute = read_attribute(r, self.pool)?;
            match attribute.name {
                CODE => {
                    if bodyless {
                        return Err(code_error("abstract or native method has a Code attribute"));
                    }
                    if has_code {
                        return Err(code_error("multiple Code attributes"));
                    }
                    has_code = true;
                    self.code(method, shape, attribute.body)?;
                }
                EXCEPTIONS => {
                    once.check(EXCEPTIONS, &owner)?;
                    let mut body = Body::new(EXCEPTIONS, &owner, self.pool, attribute.body);
                    let count = body.u2()?;
                    body.expect_length(2 + 2 * usize::from(count))?;
                    for _ in 0..count {
                        body.class("exception")?;
                    }
                }
                METHOD_PARAMETERS => {
                    once.check(METHOD_PARAMETERS, &owner)?;
                    let mut body = Body::new(METHOD_PARAMETERS, &owner, self.pool, attribute.body);
                    let count = body.u1()?;
                    body.expect_length(1 + 4 * usize::from(count))?;
                }
                SYNTHETIC => empty(SYNTHETIC, &owner, attribute.body)?,
                DEPRECATED => empty(DEPRECATED, &owner, attribute.body)?,
                _ => self.signature_and_annotations(
                    attribute,
                    &owner,
                    &mut once,
                    METHOD_ANNOTATIONS,
                )?,
            }
        }
        if !bodyless && !has_code {
            return Err(code_error("missing Code attribute"));
        }
        Ok(())
    }

    /// Versions before 45.3 store `max_stack`, `max_locals` and the code
    /// length in four bytes instead of eight.
    const fn compact_code_header(&self) -> bool {
        self.major == 45 && self.minor <= 2
    }

    fn code(&self, method: &Member, shape: MethodShape, body: &[u8]) -> Result<(), FormatError> {
        let fail = |details: String| FormatError::Code {
            method: method.name.clone(),
            details,
        };
        let short = |err: FormatError| fail(err.to_string());

        let mut r = Reader::new(body);
        let (max_locals, code_length) = if self.compact_code_header() {
            let _max_stack = r.u1().map_err(short)?;
            let max_locals = u16::from(r.u1().map_err(short)?);
            (max_locals, u32::from(r.u2().map_err(short)?))
        } else {
            let _max_stack = r.u2().map_err(short)?;
            let max_locals = r.u2().map_err(short)?;
            (max_locals, r.u4().map_err(short)?)
        };

        let receiver = usize::from(!method.has(access::STATIC));
        if shape.arg_slots + receiver > usize::from(max_locals) {
            return Err(fail(format!(
                "arguments need {} local slot(s), max_locals is {max_locals}",
                shape.arg_slots + receiver
            )));
        }
        if code_length == 0 || code_length >= MAX_CODE_LENGTH {
            return Err(fail(format!("code length {code_length} out of range")));
        }
        r.take(code_length as usize).map_err(short)?;

        for _ in 0..r.u2().map_err(short)? {
            let start = u32::from(r.u2().map_err(short)?);
            let end = u32::from(r.u2().map_err(short)?);
            let handler = u32::from(r.u2().map_err(short)?);
            let catch_type = r.u2().map_err(short)?;
            if start >= end || end > code_length || handler >= code_length {
                return Err(fail(format!(
                    "exception handler [{start}, {end}) -> {handler} outside code"
                )));
            }
            if catch_type != 0 && self.pool.class_name(catch_type).is_none() {
                return Err(fail(format!("catch type #{catch_type} is not a class entry")));
            }
        }

        let owner = format!("Code of method {}", method.name);
        let frame = CodeFrame {
            code_length,
            max_locals,
        };
        let mut locals = LocalVariables::default();
        let mut once = Once::default();
        for _ in 0..r.u2().map_err(short)? {
            let attribute = read_attribute(&mut r, self.pool).map_err(short)?;
            match attribute.name {
                LINE_NUMBER_TABLE => self.line_numbers(&owner, attribute.body, frame)?,
                LOCAL_VARIABLE_TABLE => {
                    locals.read(self.pool, &owner, attribute.body, frame, false)?;
                }
                LOCAL_VARIABLE_TYPE_TABLE if self.major >= JAVA_5 => {
                    locals.read(self.pool, &owner, attribute.body, frame, true)?;
                }
                STACK_MAP_TABLE if self.major >= JAVA_6 => once.check(STACK_MAP_TABLE, &owner)?,
                _ => {}
            }
        }
        if r.remaining() > 0 {
            return Err(fail(format!("{} byte(s) past the declared contents", r.remaining())));
        }
        locals.cross_check(self.pool, &owner, self.major)
    }

    fn line_numbers(&self, owner: &str, body: &[u8], frame: CodeFrame) -> Result<(), FormatError> {
        let mut body = Body::new(LINE_NUMBER_TABLE, owner, self.pool, body);
        let count = body.u2()?;
        body.expect_length(2 + 4 * usize::from(count))?;
        for _ in 0..count {
            let start = body.u2()?;
            let _line = body.u2()?;
            if u32::from(start) >= frame.code_length {
                return Err(body.fail(format!("start_pc {start} outside code")));
            }
        }
        Ok(())
    }

    /// Class-level attributes, read from `r` once every member is parsed.
    pub(crate) fn class(
        &self,
        r: &mut Reader<'_>,
        this_class: &str,
        access_flags: u16,
        super_class: Option<&str>,
    ) -> Result<ClassAttributes, FormatError> {
        let owner = format!("class {}", internal_to_binary(this_class));
        let mut once = Once::default();
        let mut inner_classes = None;
        let mut nest = None;
        let mut has_bootstrap_methods = false;
        let mut attributes = ClassAttributes::default();

        for _ in 0..r.u2()? {
            let attribute = read_attribute(r, self.pool)?;
            let major = self.major;
            match attribute.name {
                SOURCE_FILE => {
                    once.check(SOURCE_FILE, &owner)?;
                    let mut body = Body::new(SOURCE_FILE, &owner, self.pool, attribute.body);
                    body.expect_length(2)?;
                    body.utf8("source file")?;
                }
                SOURCE_DEBUG_EXTENSION => once.check(SOURCE_DEBUG_EXTENSION, &owner)?,
                INNER_CLASSES => {
                    once.check(INNER_CLASSES, &owner)?;
                    inner_classes = Some(attribute.body);
                }
                SYNTHETIC => empty(SYNTHETIC, &owner, attribute.body)?,
                DEPRECATED => empty(DEPRECATED, &owner, attribute.body)?,
                ENCLOSING_METHOD if major >= JAVA_5 => {
                    once.check(ENCLOSING_METHOD, &owner)?;
                    self.enclosing_method(&owner, attribute.body)?;
                }
                BOOTSTRAP_METHODS if major >= JAVA_7 => {
                    once.check(BOOTSTRAP_METHODS, &owner)?;
                    self.bootstrap_methods(&owner, attribute.body)?;
                    has_bootstrap_methods = true;
                }
                NEST_HOST if major >= JAVA_11 => {
                    once.check(NEST_HOST, &owner)?;
                    check_nest_conflict(&mut nest, NEST_HOST, &owner)?;
                    let mut body = Body::new(NEST_HOST, &owner, self.pool, attribute.body);
                    body.expect_length(2)?;
                    body.class("nest host")?;
                }
                NEST_MEMBERS if major >= JAVA_11 => {
                    once.check(NEST_MEMBERS, &owner)?;
                    check_nest_conflict(&mut nest, NEST_MEMBERS, &owner)?;
                    self.class_list(NEST_MEMBERS, &owner, attribute.body, "nest member")?;
                }
                RECORD if major >= JAVA_16 && super_class == Some(RECORD_CLASS) => {
                    once.check(RECORD, &owner)?;
                    self.record(&owner, attribute.body)?;
                }
                PERMITTED_SUBCLASSES if major >= JAVA_17 => {
                    once.check(PERMITTED_SUBCLASSES, &owner)?;
                    if access_flags & access::FINAL != 0 {
                        return Err(FormatError::Attribute {
                            attribute: PERMITTED_SUBCLASSES,
                            owner,
                            details: "final classes cannot be sealed".to_string(),
                        });
                    }
                    attributes.permitted_subclasses = self.class_list(
                        PERMITTED_SUBCLASSES,
                        &owner,
                        attribute.body,
                        "permitted subclass",
                    )?;
                }
                _ => self.signature_and_annotations(attribute, &owner, &mut once, ANNOTATIONS)?,
            }
        }

        if let Some(body) = inner_classes {
            self.inner_classes(&owner, body)?;
        }
        if let Some(max) = self.pool.max_bootstrap_index()
            && !has_bootstrap_methods
        {
            return Err(FormatError::Attribute {
                attribute: BOOTSTRAP_METHODS,
                owner,
                details: format!("missing, but the constant pool refers to bootstrap method {max}"),
            });
        }
        Ok(attributes)
    }

    /// A `u2` count followed by that many class entries; returns the names.
    fn class_list(
        &self,
        attribute: &'static str,
        owner: &str,
        body: &[u8],
        what: &str,
    ) -> Result<Vec<String>, FormatError> {
        let mut body = Body::new(attribute, owner, self.pool, body);
        let count = body.u2()?;
        body.expect_length(2 + 2 * usize::from(count))?;
        (0..count)
            .map(|_| body.class(what).map(str::to_owned))
            .collect()
    }

    fn enclosing_method(&self, owner: &str, body: &[u8]) -> Result<(), FormatError> {
        let mut body = Body::new(ENCLOSING_METHOD, owner, self.pool, body);
        body.expect_length(4)?;
        body.class("enclosing class")?;
        let method = body.u2()?;
        if method != 0 && !matches!(self.pool.get(method), Some(Constant::NameAndType { .. })) {
            return Err(body.fail(format!("method #{method} is not a name-and-type entry")));
        }
        Ok(())
    }

    fn bootstrap_methods(&self, owner: &str, body: &[u8]) -> Result<(), FormatError> {
        let mut body = Body::new(BOOTSTRAP_METHODS, owner, self.pool, body);
        let count = body.u2()?;
        if let Some(max) = self.pool.max_bootstrap_index()
            && max >= count
        {
            return Err(body.fail(format!(
                "{count} method(s), but the constant pool refers to bootstrap method {max}"
            )));
        }
        for _ in 0..count {
            let method = body.u2()?;
            if !self.pool.is_method_handle(method) {
                return Err(body.fail(format!("bootstrap method #{method} is not a method handle")));
            }
            for _ in 0..body.u2()? {
                let argument = body.u2()?;
                if !self.pool.is_loadable(argument) {
                    return Err(body.fail(format!(
                        "argument #{argument} is not a loadable constant"
                    )));
                }
            }
        }
        body.finish()
    }

    fn record(&self, owner: &str, body: &[u8]) -> Result<(), FormatError> {
        let mut body = Body::new(RECORD, owner, self.pool, body);
        for _ in 0..body.u2()? {
            let name = body.utf8("component name")?;
            if !descriptors::is_unqualified_name(name) {
                return Err(body.fail(format!("illegal component name {name:?}")));
            }
            let descriptor = body.utf8("component descriptor")?;
            if !descriptors::is_field_descriptor(descriptor) {
                return Err(body.fail(format!(
                    "illegal descriptor {descriptor:?} for component {name}"
                )));
            }
            let component = format!("record component {name}");
            let mut once = Once::default();
            for _ in 0..body.u2()? {
                let attribute = body.attribute()?;
                self.signature_and_annotations(attribute, &component, &mut once, ANNOTATIONS)?;
            }
        }
        body.finish()
    }

    fn inner_classes(&self, owner: &str, body: &[u8]) -> Result<(), FormatError> {
        let mut body = Body::new(INNER_CLASSES, owner, self.pool, body);
        let count = body.u2()?;
        let mut entries = HashSet::new();
        for _ in 0..count {
            let inner = body.u2()?;
            if self.pool.class_name(inner).is_none() {
                return Err(body.fail(format!("inner class #{inner} is not a class entry")));
            }
            let outer = body.u2()?;
            if outer != 0 {
                let name = self.pool.class_name(outer).ok_or_else(|| {
                    body.fail(format!("outer class #{outer} is not a class entry"))
                })?;
                if name.starts_with('[') {
                    return Err(body.fail(format!("outer class {name} is an array")));
                }
            }
            let inner_name = body.u2()?;
            if inner_name != 0 && self.pool.utf8(inner_name).is_none() {
                return Err(body.fail(format!("inner name #{inner_name} is not a UTF-8 entry")));
            }
            if inner == outer {
                return Err(body.fail(format!("#{inner} is both the inner and the outer class")));
            }
            let flags = body.u2()?;
            check_class_modifiers(flags, self.major, true)?;
            if !entries.insert((inner, outer, inner_name)) && self.major >= JAVA_5 {
                return Err(body.fail(format!("duplicate entry for #{inner}")));
            }
        }
        if self.major >= JAVA_5 {
            body.expect_length(2 + 8 * usize::from(count))?;
        }
        Ok(())
    }
}

fn check_nest_conflict(
    nest: &mut Option<&'static str>,
    attribute: &'static str,
    owner: &str,
) -> Result<(), FormatError> {
    match nest.replace(attribute) {
        Some(other) => Err(FormatError::Attribute {
            attribute,
            owner: owner.to_owned(),
            details: format!("conflicts with {other}"),
        }),
        None => Ok(()),
    }
}

/// Bounds a local variable entry must respect.
#[derive(Debug, Clone, Copy)]
struct CodeFrame {
    code_length: u32,
    max_locals: u16,
}

/// Start pc, length, name index and slot: what identifies a local variable.
type LocalKey = (u16, u16, u16, u16);

/// Local variable entries of one `Code` attribute, across all its tables.
#[derive(Debug, Default)]
struct LocalVariables {
    plain: Vec<LocalKey>,
    typed: Vec<LocalKey>,
}

impl LocalVariables {
    fn read(
        &mut self,
        pool: &ConstantPool,
        owner: &str,
        body: &[u8],
        frame: CodeFrame,
        typed: bool,
    ) -> Result<(), FormatError> {
        let attribute = if typed {
            LOCAL_VARIABLE_TYPE_TABLE
        } else {
            LOCAL_VARIABLE_TABLE
        };
        let mut body = Body::new(attribute, owner, pool, body);
        let count = body.u2()?;
        body.expect_length(2 + 10 * usize::from(count))?;
        for _ in 0..count {
            let start = body.u2()?;
            let length = body.u2()?;
            let name_index = body.u2()?;
            let descriptor_index = body.u2()?;
            let slot = body.u2()?;

            if u32::from(start) >= frame.code_length {
                return Err(body.fail(format!("start_pc {start} outside code")));
            }
            if u32::from(start) + u32::from(length) > frame.code_length {
                return Err(body.fail(format!("range {start}+{length} runs past the code")));
            }
            let name = pool
                .utf8(name_index)
                .filter(|name| descriptors::is_unqualified_name(name))
                .ok_or_else(|| body.fail(format!("illegal variable name #{name_index}")))?;
            let descriptor = pool
                .utf8(descriptor_index)
                .ok_or_else(|| body.fail(format!("descriptor #{descriptor_index} of {name} is not a UTF-8 entry")))?;
            let mut wide = 0;
            if !typed {
                if !descriptors::is_field_descriptor(descriptor) {
                    return Err(body.fail(format!("illegal descriptor {descriptor:?} for {name}")));
                }
                if matches!(descriptor, "J" | "D") {
                    wide = 1;
                }
            }
            if u32::from(slot) + wide >= u32::from(frame.max_locals) {
                return Err(body.fail(format!(
                    "slot {slot} of {name} outside max_locals {}",
                    frame.max_locals
                )));
            }

            let key = (start, length, name_index, slot);
            if typed {
                self.typed.push(key);
            } else {
                self.plain.push(key);
            }
        }
        Ok(())
    }

    /// Duplicate entries, and type entries without a matching plain entry.
    /// Only checked when a plain table is present.
    fn cross_check(&self, pool: &ConstantPool, owner: &str, major: u16) -> Result<(), FormatError> {
        if self.plain.is_empty() {
            return Ok(());
        }
        let fail = |attribute: &'static str, key: &LocalKey, details: &str| {
            let name = pool.utf8(key.2).unwrap_or_default();
            FormatError::Attribute {
                attribute,
                owner: owner.to_owned(),
                details: format!("{details} for {name}"),
            }
        };

        let mut plain = HashSet::new();
        for key in &self.plain {
            if !plain.insert(*key) && major >= JAVA_5 {
                return Err(fail(LOCAL_VARIABLE_TABLE, key, "duplicate entry"));
            }
        }
        let mut typed = HashSet::new();
        for key in &self.typed {
            if !plain.contains(key) {
                return Err(fail(
                    LOCAL_VARIABLE_TYPE_TABLE,
                    key,
                    "no matching LocalVariableTable entry",
                ));
            }
            if !typed.insert(*key) {
                return Err(fail(LOCAL_VARIABLE_TYPE_TABLE, key, "duplicate entry"));
            }
        }
        Ok(())
    }
}
