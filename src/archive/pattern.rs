use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// A set of ant-style path patterns.
///
/// `**` matches any number of directories, `*` and `?` stay within one path
/// segment. A trailing `/` names the directory itself, so it never matches
/// the files below it.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(&normalize(pattern))
                .literal_separator(true)
                .backslash_escape(true)
                .build()?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_match(&self, path: &str) -> bool {
        !self.patterns.is_empty() && self.set.is_match(path)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::empty()
    }
}

fn normalize(pattern: &str) -> String {
    pattern.trim_start_matches('/').trim_end_matches('/').to_string()
}
