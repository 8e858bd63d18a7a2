// Class lookup for the analyzer: the merged archive first, then the runtime classpath

use crate::archive::{Archive, VirtualArchive};
use crate::classfile::descriptor::class_path;
use crate::classfile::BinaryUnit;
use crate::error::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Anything class files can be read from
pub trait ClassSource {
    /// Label used in error messages
    fn describe(&self) -> String;

    /// Raw bytes of `class_name` (dotted), if this source has it
    fn find_class(&self, class_name: &str) -> Result<Option<Cow<'_, [u8]>>>;
}

impl ClassSource for VirtualArchive {
    fn describe(&self) -> String {
        "archive".to_string()
    }

    fn find_class(&self, class_name: &str) -> Result<Option<Cow<'_, [u8]>>> {
        Ok(self.read(&class_path(class_name)).ok().map(Cow::Borrowed))
    }
}

/// A class directory read lazily from disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn find_class(&self, class_name: &str) -> Result<Option<Cow<'_, [u8]>>> {
        let path = self.root.join(class_path(class_name));
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Cow::Owned(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }
}

/// A jar or jmod held in memory; jmods keep their classes below `classes/`
#[derive(Debug, Clone)]
pub struct JarSource {
    label: String,
    data: VirtualArchive,
    prefix: &'static str,
}

impl JarSource {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        let label = path.display().to_string();
        // jmod: 4 byte "JM" header in front of a plain zip
        let (zip, prefix) = match bytes.get(..4) {
            Some([b'J', b'M', _, _]) => (&bytes[4..], "classes/"),
            _ => (&bytes[..], ""),
        };
        let archive = Archive::from_bytes(zip, &label)?;
        Ok(Self {
            label,
            data: archive.data,
            prefix,
        })
    }
}

impl ClassSource for JarSource {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn find_class(&self, class_name: &str) -> Result<Option<Cow<'_, [u8]>>> {
        let path = format!("{}{}", self.prefix, class_path(class_name));
        Ok(self.data.read(&path).ok().map(Cow::Borrowed))
    }
}

/// Open a runtime classpath entry: a directory or a jar/jmod file
pub fn open_runtime(path: &Path) -> Result<Box<dyn ClassSource>> {
    if path.is_dir() {
        Ok(Box::new(DirectorySource::new(path)))
    } else {
        Ok(Box::new(JarSource::load(path)?))
    }
}

/// Where a resolved unit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The archive being stripped
    Archive,
    /// Runtime classpath; resolvable, never stripped
    Runtime,
}

/// Parsed-unit cache over the archive and the runtime classpath
pub struct ClassPool<'a> {
    archive: &'a VirtualArchive,
    runtime: Vec<Box<dyn ClassSource + 'a>>,
    cache: HashMap<String, Option<(Rc<BinaryUnit>, Origin)>>,
}

impl<'a> ClassPool<'a> {
    pub fn new(archive: &'a VirtualArchive) -> Self {
        Self {
            archive,
            runtime: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn with_runtime(mut self, source: Box<dyn ClassSource + 'a>) -> Self {
        self.runtime.push(source);
        self
    }

    pub fn add_runtime(&mut self, source: Box<dyn ClassSource + 'a>) {
        self.runtime.push(source);
    }

    /// Resolve a class by dotted name; `Ok(None)` when no source has it
    pub fn get(&mut self, class_name: &str) -> Result<Option<Rc<BinaryUnit>>> {
        Ok(self.lookup(class_name)?.map(|(unit, _)| unit))
    }

    pub fn origin(&mut self, class_name: &str) -> Result<Option<Origin>> {
        Ok(self.lookup(class_name)?.map(|(_, origin)| origin))
    }

    fn lookup(&mut self, class_name: &str) -> Result<Option<(Rc<BinaryUnit>, Origin)>> {
        if let Some(cached) = self.cache.get(class_name) {
            return Ok(cached.clone());
        }
        let found = self.load(class_name)?;
        self.cache.insert(class_name.to_string(), found.clone());
        Ok(found)
    }

    fn load(&self, class_name: &str) -> Result<Option<(Rc<BinaryUnit>, Origin)>> {
        let archive: &dyn ClassSource = self.archive;
        let sources = std::iter::once((archive, Origin::Archive))
            .chain(self.runtime.iter().map(|s| (s.as_ref() as &dyn ClassSource, Origin::Runtime)));
        for (source, origin) in sources {
            if let Some(bytes) = source.find_class(class_name)? {
                let unit = BinaryUnit::parse(&bytes).map_err(|e| {
                    Error::class_format(format!("{}!{}", source.describe(), class_path(class_name)), e)
                })?;
                debug!("loaded {} from {}", class_name, source.describe());
                return Ok(Some((Rc::new(unit), origin)));
            }
        }
        Ok(None)
    }
}
