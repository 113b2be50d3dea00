use crate::model::{DataValue, DecodeError};

/// Path syntax used to split a candidate string into components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSyntax {
    /// `/` separators only.
    Posix,
    /// `\` and `/` separators, optional drive prefix (`C:`).
    Windows,
}

impl PathSyntax {
    pub fn for_platform(platform: &str) -> Self {
        if platform.contains("windows") {
            PathSyntax::Windows
        } else {
            PathSyntax::Posix
        }
    }

    fn is_separator(self, c: char) -> bool {
        match self {
            PathSyntax::Posix => c == '/',
            PathSyntax::Windows => c == '/' || c == '\\',
        }
    }

    /// Final component of `path`, ignoring trailing separators and any drive prefix.
    pub fn file_name(self, path: &str) -> &str {
        let path = match self {
            PathSyntax::Windows => strip_drive(path),
            PathSyntax::Posix => path,
        };
        let trimmed = path.trim_end_matches(|c| self.is_separator(c));
        match trimmed.rfind(|c| self.is_separator(c)) {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Extension of the final component including its leading dot.
    ///
    /// A name made only of a leading dot plus text (`.rs`) is a hidden file with no
    /// extension; so are names ending in a dot and the `.` / `..` entries.
    pub fn extension(self, path: &str) -> Option<&str> {
        let name = self.file_name(path);
        if name == "." || name == ".." {
            return None;
        }
        let idx = name.rfind('.')?;
        if idx == 0 || idx + 1 == name.len() {
            return None;
        }
        Some(&name[idx..])
    }
}

fn strip_drive(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        &path[2..]
    } else {
        path
    }
}

/// Decides whether decoded string data names a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClassifier {
    extensions: Vec<String>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new([".rs"])
    }
}

impl PathClassifier {
    /// Build a classifier for the given extensions; a missing leading dot is added.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty() && e != ".")
            .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Case-sensitive extension match of `text` under the platform's path syntax.
    pub fn classify_text(&self, platform: &str, text: &str) -> bool {
        PathSyntax::for_platform(platform)
            .extension(text)
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    /// Decode `value` as UTF-8 and classify it.
    pub fn classify(&self, platform: &str, value: &DataValue) -> Result<bool, DecodeError> {
        let text = value.decode_text()?;
        Ok(self.classify_text(platform, &text))
    }
}

/// Classify with the default `.rs` extension set.
pub fn classify(platform: &str, value: &DataValue) -> Result<bool, DecodeError> {
    PathClassifier::default().classify(platform, value)
}
