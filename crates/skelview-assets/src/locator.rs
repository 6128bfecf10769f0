//! Resource locators - the keys assets are requested and cached under.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Opaque path identifying one logical asset within a loading session.
///
/// Locators compare by exact string value. No case folding or path
/// normalization is applied; the only rewrite is the cache's optional fixed
/// prefix, applied once when a caller's path enters the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(Arc<str>);

impl Locator {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    /// Locator for `path` with `prefix` prepended verbatim.
    pub fn with_prefix(prefix: &str, path: &str) -> Self {
        if prefix.is_empty() {
            Self::new(path)
        } else {
            Self::new(format!("{}{}", prefix, path))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the last `/`, or `None` for a bare name.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }

    /// Last `/`-separated segment.
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Extension of the file name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.')
            .filter(|&idx| idx > 0)
            .map(|idx| &name[idx + 1..])
    }

    /// A sibling locator: `name` placed in this locator's directory.
    pub fn sibling(&self, name: &str) -> Locator {
        match self.parent() {
            Some(parent) if !parent.is_empty() => Locator::new(format!("{}/{}", parent, name)),
            _ => Locator::new(name),
        }
    }

    /// Whether this locator looks like a URL the network tier can fetch.
    pub fn is_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Locator {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Locator {
    fn from(path: &str) -> Self {
        Locator::new(path)
    }
}

impl From<String> for Locator {
    fn from(path: String) -> Self {
        Self(Arc::from(path))
    }
}

impl From<&Locator> for Locator {
    fn from(locator: &Locator) -> Self {
        locator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_equality_no_normalization() {
        assert_eq!(Locator::new("a/hero.png"), Locator::from("a/hero.png"));
        assert_ne!(Locator::new("a/Hero.png"), Locator::new("a/hero.png"));
        assert_ne!(Locator::new("a//hero.png"), Locator::new("a/hero.png"));
    }

    #[test]
    fn test_prefix() {
        assert_eq!(Locator::with_prefix("", "hero.skel").as_str(), "hero.skel");
        assert_eq!(
            Locator::with_prefix("assets/", "hero.skel").as_str(),
            "assets/hero.skel"
        );
    }

    #[test]
    fn test_parent_and_file_name() {
        let loc = Locator::new("chars/hero/hero.atlas");
        assert_eq!(loc.parent(), Some("chars/hero"));
        assert_eq!(loc.file_name(), "hero.atlas");
        assert_eq!(loc.extension(), Some("atlas"));

        let bare = Locator::new("hero.atlas");
        assert_eq!(bare.parent(), None);
        assert_eq!(bare.file_name(), "hero.atlas");
    }

    #[test]
    fn test_sibling() {
        assert_eq!(
            Locator::new("chars/hero.atlas").sibling("hero2.png").as_str(),
            "chars/hero2.png"
        );
        assert_eq!(Locator::new("hero.atlas").sibling("hero.png").as_str(), "hero.png");
        assert_eq!(Locator::new("/hero.atlas").sibling("hero.png").as_str(), "hero.png");
    }

    #[test]
    fn test_extension_of_dotfile() {
        assert_eq!(Locator::new("dir/.hidden").extension(), None);
    }
}
