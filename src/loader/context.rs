//! Loading contexts: the seam between the scan and whatever resolves names.
//!
//! A [`ContextProvider`] opens one [`LoadingContext`] per root. The context
//! sees only its own root (plus whatever it treats as platform-provided) and
//! caches what it resolved until it is dropped.
//!
//! [`ClassPathContext`] is the JVM flavour: it resolves `a.b.Foo` to
//! `<root>/a/b/Foo.class`, checks the bytes structurally, and resolves the
//! superclass and interfaces through itself, the way a class loader scoped to
//! one directory would.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::{Config, LoaderConfig};
use crate::core::errors::{Result, VciError};
use crate::core::paths::resolve_root;
use crate::loader::classfile::{ClassFile, ClassReader, FormatError, internal_to_binary};
use crate::loader::outcome::LoadOutcome;

/// Resolves logical names within one root.
pub trait LoadingContext {
    /// Resolve `name`, which must be a dotted logical name.
    ///
    /// Content problems come back as [`LoadOutcome`] values; an `Err` means
    /// the scan cannot continue.
    fn resolve(&mut self, name: &str) -> Result<LoadOutcome>;
}

/// Factory for per-root loading contexts.
pub trait ContextProvider {
    type Context: LoadingContext;

    /// Open a fresh context that sees only `root`.
    fn open(&self, root: &Path) -> Result<Self::Context>;
}

impl<P: ContextProvider + ?Sized> ContextProvider for &P {
    type Context = P::Context;

    fn open(&self, root: &Path) -> Result<Self::Context> {
        (**self).open(root)
    }
}

/// Provider of [`ClassPathContext`]s.
#[derive(Debug, Clone)]
pub struct ClassPathProvider {
    config: LoaderConfig,
    extension: String,
}

impl Default for ClassPathProvider {
    fn default() -> Self {
        Self::new(LoaderConfig::default(), "class")
    }
}

impl ClassPathProvider {
    #[must_use]
    pub fn new(config: LoaderConfig, extension: impl Into<String>) -> Self {
        Self {
            config,
            extension: extension.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.loader.clone(), config.scan.extension.clone())
    }
}

impl ContextProvider for ClassPathProvider {
    type Context = ClassPathContext;

    fn open(&self, root: &Path) -> Result<ClassPathContext> {
        Ok(ClassPathContext {
            root: resolve_root(root)?,
            config: self.config.clone(),
            extension: self.extension.clone(),
            slots: HashMap::new(),
        })
    }
}

/// What the linker needs to know about a successfully defined class.
#[derive(Debug, Clone)]
struct Shape {
    interface: bool,
    is_final: bool,
    is_public: bool,
    /// Binary names of permitted subclasses; empty unless sealed.
    permitted: Vec<String>,
}

impl Shape {
    fn of(class: &ClassFile) -> Self {
        Self {
            interface: class.is_interface(),
            is_final: class.is_final(),
            is_public: class.is_public(),
            permitted: class.permitted_binary_names().collect(),
        }
    }

    /// Whether `subtype` may extend or implement the class named `name`.
    fn permits(&self, name: &str, subtype: &str, subtype_is_public: bool) -> bool {
        if self.permitted.is_empty() {
            return true;
        }
        (subtype_is_public || package_of(subtype) == package_of(name))
            && self.permitted.iter().any(|permitted| permitted == subtype)
    }
}

#[derive(Debug, Clone)]
struct Resolution {
    outcome: LoadOutcome,
    /// `None` for platform names, which are taken on trust.
    shape: Option<Shape>,
}

impl Resolution {
    const fn platform() -> Self {
        Self {
            outcome: LoadOutcome::Loaded,
            shape: None,
        }
    }

    fn missing(name: &str) -> Self {
        Self {
            outcome: LoadOutcome::unresolved(name),
            shape: None,
        }
    }

    fn corrupt(reason: String) -> Self {
        Self {
            outcome: LoadOutcome::corrupt(reason),
            shape: None,
        }
    }

    /// `name` failed to parse. A module descriptor is not a class at all, so
    /// the name stays undefined.
    fn rejected(name: &str, err: &FormatError) -> Self {
        match err {
            FormatError::NotAClass => Self::missing(name),
            other => Self::corrupt(other.to_string()),
        }
    }
}

/// A supertype after resolution.
#[derive(Debug)]
enum Linked {
    /// It did not load; the dependent class inherits this.
    Failed(Resolution),
    Ready(Option<Shape>),
}

#[derive(Debug)]
enum Slot {
    InProgress,
    Done(Resolution),
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Superclass,
    Interface,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Superclass => "superclass",
            Self::Interface => "interface",
        })
    }
}

/// Class loader scoped to one directory.
#[derive(Debug)]
pub struct ClassPathContext {
    root: PathBuf,
    config: LoaderConfig,
    extension: String,
    slots: HashMap<String, Slot>,
}

impl ClassPathContext {
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of names this context has finished resolving.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Done(_)))
            .count()
    }

    fn is_platform(&self, name: &str) -> bool {
        self.config
            .platform_packages
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// `<root>/a/b/Foo.<ext>` for `a.b.Foo`; `None` when the name has empty segments.
    fn class_file_path(&self, name: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }
        let (last, packages) = segments.split_last()?;
        let mut path = self.root.clone();
        path.extend(packages);
        path.push(format!("{last}.{}", self.extension));
        Some(path)
    }

    fn load(&mut self, name: &str) -> Result<Resolution> {
        match self.slots.get(name) {
            Some(Slot::Done(resolution)) => return Ok(resolution.clone()),
            Some(Slot::InProgress) => {
                return Err(VciError::load_infrastructure(name, "class circularity"));
            }
            None => {}
        }
        if self.is_platform(name) {
            let resolution = Resolution::platform();
            self.slots
                .insert(name.to_owned(), Slot::Done(resolution.clone()));
            return Ok(resolution);
        }

        self.slots.insert(name.to_owned(), Slot::InProgress);
        match self.define(name) {
            Ok(resolution) => {
                self.slots
                    .insert(name.to_owned(), Slot::Done(resolution.clone()));
                Ok(resolution)
            }
            Err(err) => {
                self.slots.remove(name);
                Err(err)
            }
        }
    }

    /// Define `name` from its file, in the order a JVM does: the declared
    /// name first, then each interface as it is read, then the rest of the
    /// file, then the superclass, and finally the access checks.
    fn define(&mut self, name: &str) -> Result<Resolution> {
        let Some(path) = self.class_file_path(name) else {
            return Ok(Resolution::missing(name));
        };
        if !path.is_file() {
            return Ok(Resolution::missing(name));
        }
        let bytes = fs::read(&path).map_err(|source| VciError::io(&path, source))?;

        let reader = match ClassReader::open(&bytes, self.config.max_major_version) {
            Ok(reader) => reader,
            Err(err) => return Ok(Resolution::rejected(name, &err)),
        };
        // A file that defines some other name is not the class asked for.
        if reader.binary_name() != name {
            return Ok(Resolution::missing(name));
        }
        let mut supertypes = match reader.read_supertypes() {
            Ok(supertypes) => supertypes,
            Err(err) => return Ok(Resolution::rejected(name, &err)),
        };

        let mut interfaces = Vec::new();
        loop {
            let interface = match supertypes.next_interface() {
                Ok(Some(interface)) => internal_to_binary(interface),
                Ok(None) => break,
                Err(err) => return Ok(Resolution::rejected(name, &err)),
            };
            match self.link(name, &interface, Role::Interface)? {
                Linked::Failed(failed) => return Ok(failed),
                Linked::Ready(shape) => interfaces.push((interface, shape)),
            }
        }

        let class = match supertypes.finish() {
            Ok(class) => class,
            Err(err) => return Ok(Resolution::rejected(name, &err)),
        };
        let superclass = match class.super_binary_name() {
            Some(superclass) => match self.link(name, &superclass, Role::Superclass)? {
                Linked::Failed(failed) => return Ok(failed),
                Linked::Ready(shape) => Some((superclass, shape)),
            },
            None => None,
        };

        if let Some((superclass, Some(shape))) = &superclass {
            check_supertype(name, &class, superclass, shape, Role::Superclass)?;
        }
        for (interface, shape) in &interfaces {
            if let Some(shape) = shape {
                check_supertype(name, &class, interface, shape, Role::Interface)?;
            }
        }

        Ok(Resolution {
            outcome: LoadOutcome::Loaded,
            shape: Some(Shape::of(&class)),
        })
    }

    /// Resolve a supertype of `name` and check it is the right kind of type.
    fn link(&mut self, name: &str, dependency: &str, role: Role) -> Result<Linked> {
        let resolved = self.load(dependency)?;
        match resolved.outcome {
            LoadOutcome::Loaded => {}
            LoadOutcome::Corrupt { reason } => {
                return Ok(Linked::Failed(Resolution::corrupt(format!(
                    "{role} {dependency} is corrupt: {reason}"
                ))));
            }
            LoadOutcome::UnresolvedReference { missing } => {
                return Ok(Linked::Failed(Resolution::missing(&missing)));
            }
        }

        let wrong_kind = resolved.shape.as_ref().is_some_and(|shape| match role {
            Role::Superclass => shape.interface,
            Role::Interface => !shape.interface,
        });
        if !wrong_kind {
            return Ok(Linked::Ready(resolved.shape));
        }
        let details = match role {
            Role::Superclass => format!("class {name} has interface {dependency} as super class"),
            Role::Interface => {
                format!("class {name} cannot implement {dependency}, because it is not an interface")
            }
        };
        Err(VciError::load_infrastructure(name, details))
    }
}

/// Final, sealed and access checks of one direct supertype of `class`.
fn check_supertype(
    name: &str,
    class: &ClassFile,
    dependency: &str,
    shape: &Shape,
    role: Role,
) -> Result<()> {
    let sealed = !shape.permits(dependency, name, class.is_public());
    let hidden = !shape.is_public && package_of(dependency) != package_of(name);
    let details = match role {
        Role::Superclass if shape.is_final => {
            format!("class {name} cannot inherit from final class {dependency}")
        }
        Role::Superclass if sealed => {
            format!("class {name} cannot inherit from sealed class {dependency}")
        }
        Role::Interface if sealed => {
            format!("class {name} cannot implement sealed interface {dependency}")
        }
        Role::Superclass if hidden => {
            format!("class {name} cannot access its superclass {dependency}")
        }
        Role::Interface if hidden => {
            format!("class {name} cannot access its superinterface {dependency}")
        }
        Role::Superclass | Role::Interface => return Ok(()),
    };
    Err(VciError::load_infrastructure(name, details))
}

/// `a.b` for `a.b.Foo`; empty for the unnamed package.
fn package_of(name: &str) -> &str {
    name.rsplit_once('.').map_or("", |(package, _)| package)
}

impl LoadingContext for ClassPathContext {
    fn resolve(&mut self, name: &str) -> Result<LoadOutcome> {
        Ok(self.load(name)?.outcome)
    }
}
