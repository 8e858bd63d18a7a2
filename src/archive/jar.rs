use super::manifest::{Manifest, MANIFEST_PATH};
use super::tree::VirtualArchive;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A jar: its file tree plus the manifest, kept apart from the tree
#[derive(Debug, Clone, Default)]
pub struct Archive {
    pub data: VirtualArchive,
    pub manifest: Manifest,
}

impl Archive {
    pub fn new() -> Self {
        Self {
            data: VirtualArchive::new(),
            manifest: Manifest::new(),
        }
    }

    /// Load a jar file or an exploded directory
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            let data = VirtualArchive::from_directory(path)?;
            return Self::from_tree(data, &path.display().to_string());
        }
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn from_bytes(bytes: &[u8], label: &str) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes), label)
    }

    fn from_reader<R: Read + Seek>(reader: R, label: &str) -> Result<Self> {
        let zip_err = |source| Error::Archive {
            path: label.to_string(),
            source,
        };
        let mut zip = ZipArchive::new(reader).map_err(zip_err)?;
        let mut data = VirtualArchive::new();
        for idx in 0..zip.len() {
            let mut entry = zip.by_index(idx).map_err(zip_err)?;
            let name = entry.name().to_string();
            if name.split('/').any(|segment| segment == "..") {
                warn!("{}: skipping entry outside the archive root: {}", label, name);
                continue;
            }
            if entry.is_dir() {
                data.mkdir(&name)?;
            } else {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| Error::io(format!("{}!{}", label, name), e))?;
                data.write(&name, bytes)?;
            }
        }
        Self::from_tree(data, label)
    }

    fn from_tree(mut data: VirtualArchive, label: &str) -> Result<Self> {
        let manifest = match data.take(MANIFEST_PATH) {
            Some(bytes) => Manifest::parse(&bytes).map_err(|source| Error::Manifest {
                path: format!("{}!{}", label, MANIFEST_PATH),
                source,
            })?,
            None => Manifest::new(),
        };
        debug!("{}: {} entries", label, data.len());
        Ok(Self { data, manifest })
    }

    /// Write as a jar: manifest first, then directories, then files, each sorted
    pub fn save<W: Write + Seek>(&self, writer: W, label: &str) -> Result<W> {
        let zip_err = |source| Error::Archive {
            path: label.to_string(),
            source,
        };
        let io_err = |source| Error::io(label, source);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);

        zip.add_directory("META-INF/", options).map_err(zip_err)?;
        zip.start_file(MANIFEST_PATH, options).map_err(zip_err)?;
        zip.write_all(&self.manifest.to_bytes()).map_err(io_err)?;

        for dir in self.data.directories() {
            if dir != "META-INF" {
                zip.add_directory(format!("{}/", dir), options).map_err(zip_err)?;
            }
        }
        for (path, bytes) in self.data.files() {
            zip.start_file(path, options).map_err(zip_err)?;
            zip.write_all(bytes).map_err(io_err)?;
        }
        zip.finish().map_err(zip_err)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.save(Cursor::new(Vec::new()), "<memory>")?.into_inner())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut file = self.save(file, &path.display().to_string())?;
        file.flush().map_err(|e| Error::io(path, e))
    }
}
