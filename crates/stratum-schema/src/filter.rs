//! Include/exclude filtering of relative paths with component-wise globs.
//!
//! Patterns are split on `/` and matched right-anchored against the path
//! components: `folder/*.py` matches `deep/folder/file.py` but `src/*.py`
//! does not match `src/test/main.py`. A `**` component matches any number of
//! components, including none.
//!
//! An anchored filter instead matches patterns from the first component and
//! treats a match of the leading components as a match of the whole path, so
//! `python/pip*` covers `python/pip/__init__.py` but not
//! `python/mylib/python/pip_compat.py`.

use crate::SchemaError;
use glob::Pattern;

#[derive(Debug, Clone)]
enum Component {
    AnyDepth,
    Glob(Pattern),
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    components: Vec<Component>,
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Result<Self, SchemaError> {
        let components = pattern
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| {
                if c == "**" {
                    Ok(Component::AnyDepth)
                } else {
                    Pattern::new(c)
                        .map(Component::Glob)
                        .map_err(|e| SchemaError::Pattern {
                            pattern: pattern.to_owned(),
                            message: e.msg.to_owned(),
                        })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if components.is_empty() {
            return Err(SchemaError::Pattern {
                pattern: pattern.to_owned(),
                message: "empty pattern".to_owned(),
            });
        }
        Ok(Self { components })
    }

    fn matches(&self, parts: &[&str], anchored: bool) -> bool {
        if parts.is_empty() {
            return false;
        }
        if anchored {
            match_prefix(&self.components, parts)
        } else {
            match_from_end(&self.components, parts)
        }
    }
}

fn match_from_end(pattern: &[Component], parts: &[&str]) -> bool {
    match pattern.split_last() {
        None => true,
        Some((Component::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| match_from_end(rest, &parts[..parts.len() - skip]))
        }
        Some((Component::Glob(glob), rest)) => match parts.split_last() {
            Some((last, prefix)) if glob.matches(last) => match_from_end(rest, prefix),
            _ => false,
        },
    }
}

fn match_prefix(pattern: &[Component], parts: &[&str]) -> bool {
    match pattern.split_first() {
        None => true,
        Some((Component::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| match_prefix(rest, &parts[skip..]))
        }
        Some((Component::Glob(glob), rest)) => match parts.split_first() {
            Some((first, tail)) if glob.matches(first) => match_prefix(rest, tail),
            _ => false,
        },
    }
}

/// Compiled include/exclude pattern sets.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<CompiledPattern>,
    exclude: Vec<CompiledPattern>,
    anchored: bool,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, SchemaError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| CompiledPattern::compile(p.as_ref()))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| CompiledPattern::compile(p.as_ref()))
                .collect::<Result<_, _>>()?,
            anchored: false,
        })
    }

    /// Filter that keeps everything except what `exclude` matches.
    pub fn excluding<S: AsRef<str>>(exclude: &[S]) -> Result<Self, SchemaError> {
        let include: &[S] = &[];
        Self::new(include, exclude)
    }

    /// Exclusion-only filter whose patterns are matched from the root of the
    /// path. A path is dropped when its leading components match a pattern.
    pub fn anchored_excluding<S: AsRef<str>>(exclude: &[S]) -> Result<Self, SchemaError> {
        Ok(Self {
            anchored: true,
            ..Self::excluding(exclude)?
        })
    }

    /// Exclusions always win; an empty include set admits every path.
    pub fn is_match(&self, parts: &[&str]) -> bool {
        if self.exclude.iter().any(|p| p.matches(parts, self.anchored)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(parts, self.anchored))
    }
}

/// One-shot form of [`PathFilter::is_match`].
pub fn is_match(parts: &[&str], include: &[&str], exclude: &[&str]) -> Result<bool, SchemaError> {
    Ok(PathFilter::new(include, exclude)?.is_match(parts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(parts: &[&str], include: &[&str], exclude: &[&str]) -> bool {
        is_match(parts, include, exclude).unwrap()
    }

    #[test]
    fn empty_include_admits_everything_not_excluded() {
        assert!(check(&["file.txt"], &[], &[]));
        assert!(check(&["folder", "file.py"], &[], &[]));
        assert!(!check(&["file.txt"], &[], &["*.txt"]));
        assert!(check(&["file.py"], &[], &["*.txt"]));
        assert!(!check(&["folder", "file.txt"], &[], &["*.txt"]));
    }

    #[test]
    fn directory_exclusion_is_right_anchored() {
        assert!(!check(&["__pycache__", "script.py"], &[], &["__pycache__/*"]));
        assert!(!check(
            &["folder", "__pycache__", "script.py"],
            &[],
            &["__pycache__/*"]
        ));
    }

    #[test]
    fn include_restricts_matches() {
        assert!(!check(&["file.txt"], &["*.py"], &[]));
        assert!(check(&["file.py"], &["*.py"], &[]));
        assert!(check(&["folder", "file.py"], &["*.py"], &[]));
        assert!(!check(&["folder", "file.txt"], &["*.py"], &[]));
    }

    #[test]
    fn exclude_beats_include() {
        assert!(!check(&["test_file.py"], &["*.py"], &["test_*.py"]));
        assert!(check(&["module.py"], &["*.py"], &["test_*.py"]));
        assert!(!check(&["folder", "file.py"], &["*.py", "**/*.py"], &["folder/*.py"]));
        assert!(check(&["other", "file.py"], &["*.py", "**/*.py"], &["folder/*.py"]));
        assert!(!check(
            &["deep", "folder", "file.py"],
            &["*.py", "**/*.py"],
            &["folder/*.py"]
        ));
        assert!(!check(&["test_main.py"], &["*.py"], &["test_*"]));
        assert!(check(&["main_test.py"], &["*.py"], &["test_*"]));
        assert!(!check(&["test.py"], &["*.py"], &["*test*"]));
    }

    #[test]
    fn multiple_patterns_on_both_sides() {
        let include = ["*.py", "**/*.py", "*.md", "**/*.md"];
        let exclude = ["test_*.py", "**/test_*.py", "temp/*", "**/temp/*"];
        assert!(check(&["file.py"], &include, &exclude));
        assert!(check(&["docs", "file.md"], &include, &exclude));
        assert!(!check(&["test_file.py"], &include, &exclude));
        assert!(!check(&["temp", "file.py"], &include, &exclude));
        assert!(!check(&["folder", "temp", "file.md"], &include, &exclude));
    }

    #[test]
    fn nested_patterns() {
        assert!(check(&["src", "main.py"], &["src/*.py"], &[]));
        assert!(!check(&["src", "test", "main.py"], &["src/*.py"], &[]));
        assert!(check(&["src", "test", "main.py"], &["src/**/*.py"], &[]));
        assert!(check(&["src", "tests", "test.py"], &["src/**/*.py"], &[]));
    }

    #[test]
    fn empty_path_never_matches_a_pattern() {
        assert!(check(&[], &[], &[]));
        assert!(!check(&[], &["*.py"], &[]));
        assert!(check(&[], &[], &["*"]));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(
            is_match(&["a"], &["[unclosed"], &[]),
            Err(SchemaError::Pattern { .. })
        ));
        assert!(is_match(&["a"], &[], &["/"]).is_err());
    }

    #[test]
    fn excluding_builds_exclusion_only_filter() {
        let filter = PathFilter::excluding(&["python/boto3*"]).unwrap();
        assert!(!filter.is_match(&["python", "boto3"]));
        assert!(!filter.is_match(&["python", "boto3-1.34.0.dist-info"]));
        assert!(filter.is_match(&["python", "requests"]));
    }

    #[test]
    fn anchored_exclusion_only_matches_from_the_root() {
        let filter = PathFilter::anchored_excluding(&["python/pip*", "python/wheel*"]).unwrap();
        assert!(!filter.is_match(&["python", "pip"]));
        assert!(!filter.is_match(&["python", "pip", "__init__.py"]));
        assert!(!filter.is_match(&["python", "wheel-0.43.0.dist-info", "RECORD"]));
        assert!(filter.is_match(&["python", "mylib", "python", "pip_compat.py"]));
        assert!(filter.is_match(&["vendor", "python", "wheel_utils.py"]));
        assert!(filter.is_match(&["python"]));
    }

    #[test]
    fn anchored_any_depth_component() {
        let filter = PathFilter::anchored_excluding(&["python/**/tests"]).unwrap();
        assert!(!filter.is_match(&["python", "tests", "a.py"]));
        assert!(!filter.is_match(&["python", "pkg", "tests", "a.py"]));
        assert!(filter.is_match(&["lib", "tests", "a.py"]));
    }
}
