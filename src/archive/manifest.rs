//! `META-INF/MANIFEST.MF` model
//!
//! Header names are case-insensitive and keep their first spelling. Values
//! are written with the usual 72-byte line limit, continuation lines
//! starting with a single space.

use thiserror::Error;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const MANIFEST_VERSION: &str = "Manifest-Version";
pub const MAIN_CLASS: &str = "Main-Class";

const LINE_LIMIT: usize = 72;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("line {0}: expected 'Name: value'")]
    MissingSeparator(usize),

    #[error("line {0}: continuation line without a header")]
    OrphanContinuation(usize),

    #[error("line {0}: section does not start with a Name header")]
    UnnamedSection(usize),
}

/// Ordered header list with case-insensitive names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Insert or replace; a replaced header keeps its position
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Later values win
    pub fn merge(&mut self, other: &Attributes) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }
}

/// Header a continuation line extends
enum Continued {
    Header(String),
    SectionName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    sections: Vec<(String, Attributes)>,
}

impl Manifest {
    pub fn new() -> Self {
        let mut manifest = Self::default();
        manifest.main.set(MANIFEST_VERSION, "1.0");
        manifest
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        let text = String::from_utf8_lossy(bytes);
        let mut manifest = Self::default();
        let mut current: Option<(Option<String>, Attributes)> = None;
        let mut last: Option<Continued> = None;
        let mut first_block = true;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.is_empty() {
                if let Some(block) = current.take() {
                    manifest.push_block(block, first_block, line_no)?;
                    first_block = false;
                }
                last = None;
                continue;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                match (&last, current.as_mut()) {
                    (Some(Continued::Header(name)), Some((_, attributes))) => {
                        let mut value = attributes.get(name).unwrap_or_default().to_string();
                        value.push_str(rest);
                        attributes.set(name, value);
                    }
                    (Some(Continued::SectionName), Some((Some(section), _))) => section.push_str(rest),
                    _ => return Err(ManifestError::OrphanContinuation(line_no)),
                }
                continue;
            }

            let (name, value) = line
                .split_once(": ")
                .or_else(|| line.strip_suffix(':').map(|name| (name, "")))
                .ok_or(ManifestError::MissingSeparator(line_no))?;

            let block = current.get_or_insert_with(|| (None, Attributes::new()));
            if !first_block && block.0.is_none() && block.1.is_empty() {
                if !name.eq_ignore_ascii_case("Name") {
                    return Err(ManifestError::UnnamedSection(line_no));
                }
                block.0 = Some(value.to_string());
                last = Some(Continued::SectionName);
                continue;
            }
            block.1.set(name, value);
            last = Some(Continued::Header(name.to_string()));
        }

        if let Some(block) = current.take() {
            let line_no = text.lines().count();
            manifest.push_block(block, first_block, line_no)?;
        }
        Ok(manifest)
    }

    fn push_block(
        &mut self,
        (name, attributes): (Option<String>, Attributes),
        first_block: bool,
        line_no: usize,
    ) -> Result<(), ManifestError> {
        if first_block {
            self.main = attributes;
            return Ok(());
        }
        match name {
            Some(name) => {
                self.section_mut(&name).merge(&attributes);
                Ok(())
            }
            None => Err(ManifestError::UnnamedSection(line_no)),
        }
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    pub fn main_attributes_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.main.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.main.set(name, value);
    }

    pub fn section(&self, name: &str) -> Option<&Attributes> {
        self.sections.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn section_mut(&mut self, name: &str) -> &mut Attributes {
        let idx = match self.sections.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.sections.push((name.to_string(), Attributes::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx].1
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.sections.iter().map(|(n, a)| (n.as_str(), a))
    }

    /// Merge `other` into this manifest; on a header collision `other` wins
    pub fn merge(&mut self, other: &Manifest) {
        self.main.merge(&other.main);
        for (name, attributes) in &other.sections {
            self.section_mut(name).merge(attributes);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(
            &mut out,
            MANIFEST_VERSION,
            self.main.get(MANIFEST_VERSION).unwrap_or("1.0"),
        );
        for (name, value) in self.main.iter() {
            if !name.eq_ignore_ascii_case(MANIFEST_VERSION) {
                write_header(&mut out, name, value);
            }
        }
        out.extend_from_slice(b"\r\n");
        for (section, attributes) in &self.sections {
            write_header(&mut out, "Name", section);
            for (name, value) in attributes.iter() {
                write_header(&mut out, name, value);
            }
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
    let line = format!("{}: {}", name, value);
    let mut rest = line.as_str();
    let mut limit = LINE_LIMIT;
    loop {
        if rest.len() <= limit {
            out.extend_from_slice(rest.as_bytes());
            out.extend_from_slice(b"\r\n");
            return;
        }
        let mut split = limit;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        out.extend_from_slice(rest[..split].as_bytes());
        out.extend_from_slice(b"\r\n ");
        rest = &rest[split..];
        // continuation lines lose one byte to the leading space
        limit = LINE_LIMIT - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_main_and_sections() {
        let text = "Manifest-Version: 1.0\r\nCreated-By: test\r\n\r\nName: a/B.class\r\nSHA-256-Digest: abc\r\n\r\n";
        let manifest = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(manifest.get("created-by"), Some("test"));
        assert_eq!(manifest.section("a/B.class").unwrap().get("SHA-256-Digest"), Some("abc"));
    }

    #[test]
    fn test_continuation_lines() {
        let text = "Manifest-Version: 1.0\nClass-Path: a.jar\n  b.jar\n";
        let manifest = Manifest::parse(text.as_bytes()).unwrap();
        assert_eq!(manifest.get("Class-Path"), Some("a.jar b.jar"));
    }

    #[test]
    fn test_long_values_wrap_at_72_bytes() {
        let mut manifest = Manifest::new();
        let long = "x".repeat(200);
        manifest.set("Long-Value", long.clone());
        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes.clone()).unwrap();

        assert!(text.split("\r\n").all(|line| line.len() <= 72));
        assert!(text.starts_with("Manifest-Version: 1.0\r\n"));
        assert_eq!(Manifest::parse(&bytes).unwrap().get("Long-Value"), Some(long.as_str()));
    }

    #[test]
    fn test_long_section_name_round_trips() {
        let name = format!("org/example/{}/VeryLongClassName.class", "deep/package/path".repeat(4));
        let mut manifest = Manifest::new();
        manifest.section_mut(&name).set("SHA-256-Digest", "abc");
        let bytes = manifest.to_bytes();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\r\n "));

        let parsed = Manifest::parse(&bytes).unwrap();
        assert_eq!(parsed.section(&name).unwrap().get("SHA-256-Digest"), Some("abc"));
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_merge_later_wins() {
        let mut dest = Manifest::parse(b"Manifest-Version: 1.0\nBuilt-By: first\nKeep: me\n").unwrap();
        let source = Manifest::parse(b"Manifest-Version: 1.0\nbuilt-by: second\n").unwrap();
        dest.merge(&source);
        assert_eq!(dest.get("Built-By"), Some("second"));
        assert_eq!(dest.get("Keep"), Some("me"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            Manifest::parse(b"Manifest-Version: 1.0\nnot a header\n"),
            Err(ManifestError::MissingSeparator(2))
        );
        assert_eq!(
            Manifest::parse(b" orphan\n"),
            Err(ManifestError::OrphanContinuation(1))
        );
    }
}
