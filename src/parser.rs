use crate::ast::GoFile;
use crate::error::{Error, Result};
use crate::scanner::FileScanner;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Parser, Tree};

/// Parser turning Go source files into `tree-sitter-go` syntax trees.
///
/// # Example
///
/// ```no_run
/// use openapi_from_go::parser::AstParser;
/// use std::path::Path;
///
/// let packages = AstParser::parse_dir(Path::new("./internal/api"), false).unwrap();
/// for package in &packages {
///     println!("{}: {} files", package.name, package.files.len());
/// }
/// ```
pub struct AstParser;

/// A parsed Go file and the source its tree points into.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

impl ParsedFile {
    /// Parses `source`. A leading byte order mark is dropped, as `go/scanner` does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Grammar`] if the Go grammar cannot be loaded and [`Error::Parse`] if the
    /// parser yields no tree.
    pub fn from_source(path: PathBuf, source: String) -> Result<Self> {
        let source = match source.strip_prefix('\u{feff}') {
            Some(rest) => rest.to_string(),
            None => source,
        };

        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| Error::Parse { file: path.clone() })?;

        Ok(Self { path, source, tree })
    }

    pub fn syntax(&self) -> GoFile<'_> {
        GoFile::new(&self.tree, &self.source)
    }
}

/// The files of one directory that share a package clause.
#[derive(Debug)]
pub struct GoPackage {
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<ParsedFile>,
}

impl GoPackage {
    pub fn syntax_trees(&self) -> impl Iterator<Item = GoFile<'_>> {
        self.files.iter().map(ParsedFile::syntax)
    }
}

impl AstParser {
    /// Reads and parses one Go source file.
    ///
    /// Syntax errors do not fail the file: the parser recovers, the first error is logged, and
    /// the declarations around it stay usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let parsed = ParsedFile::from_source(path.to_path_buf(), content)?;

        if let Some(error) = parsed.syntax().first_error() {
            warn!(
                "Syntax error in {}:{}:{}, keeping the declarations that parsed",
                path.display(),
                error.line(),
                error.column()
            );
        }
        Ok(parsed)
    }

    /// Parses several files, logging failures and continuing with the rest.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).inspect_err(|e| warn!("Failed to parse {}: {}", path.display(), e))
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }

    /// Parses a package directory and groups its files by directory and package clause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoGoFiles`] when the directory is missing or holds no readable Go file
    /// with a package clause.
    pub fn parse_dir(dir: &Path, recursive: bool) -> Result<Vec<GoPackage>> {
        let scan = FileScanner::new(dir.to_path_buf()).recursive(recursive).scan();

        let mut grouped: BTreeMap<(PathBuf, String), Vec<ParsedFile>> = BTreeMap::new();
        for parsed in Self::parse_files(&scan.go_files).into_iter().flatten() {
            let parent = parsed
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let Some(name) = parsed.syntax().package_name().map(str::to_string) else {
                warn!("No package clause in {}, skipping", parsed.path.display());
                continue;
            };
            grouped.entry((parent, name)).or_default().push(parsed);
        }

        if grouped.is_empty() {
            return Err(Error::NoGoFiles {
                dir: dir.to_path_buf(),
            });
        }

        Ok(grouped
            .into_iter()
            .map(|((dir, name), files)| GoPackage { name, dir, files })
            .collect())
    }
}

/// Loads every directory in `paths`, skipping (and logging) the ones that fail.
///
/// The caller decides whether an empty result is fatal.
pub fn load_packages<P: AsRef<Path>>(paths: &[P], recursive: bool) -> Vec<GoPackage> {
    let mut packages = Vec::new();
    for path in paths {
        let path = path.as_ref();
        match AstParser::parse_dir(path, recursive) {
            Ok(loaded) => {
                info!("Loaded {} package(s) from {}", loaded.len(), path.display());
                packages.extend(loaded);
            }
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let file_path = dir.join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_go_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(
            temp_dir.path(),
            "user.go",
            r#"package models

type User struct {
    ID   string `json:"id"`
    Name string `json:"name"`
}
"#,
        );

        let parsed = AstParser::parse_file(&file_path).unwrap();
        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.syntax().package_name(), Some("models"));
        assert_eq!(parsed.syntax().type_specs().count(), 1);
        assert!(parsed.syntax().first_error().is_none());
    }

    #[test]
    fn test_parse_file_with_syntax_error_keeps_declarations() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(
            temp_dir.path(),
            "broken.go",
            "package x\n\ntype Kept struct{}\n\nfunc broken( {\n",
        );

        let parsed = AstParser::parse_file(&file_path).unwrap();
        assert!(parsed.syntax().first_error().is_some());
        let names: Vec<&str> = parsed.syntax().type_specs().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Kept"]);
    }

    #[test]
    fn test_parse_file_with_byte_order_mark() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(
            temp_dir.path(),
            "bom.go",
            "\u{feff}package api\n\n// @Router /ping [GET]\nfunc Ping(c *gin.Context) {}\n",
        );

        let parsed = AstParser::parse_file(&file_path).unwrap();
        assert!(parsed.syntax().first_error().is_none());
        assert_eq!(parsed.syntax().package_name(), Some("api"));
        let ping = parsed.syntax().func_decls().next().unwrap();
        assert_eq!(ping.name(), "Ping");
        assert_eq!(ping.doc().unwrap().lines(), vec!["@Router /ping [GET]"]);
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err = AstParser::parse_file(Path::new("/nonexistent/file.go")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_parse_files_batch() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = create_temp_file(temp_dir.path(), "a.go", "package p\n\nfunc A() {}\n");
        let file2 = create_temp_file(temp_dir.path(), "b.go", "package p\n\ntype B int\n");
        let missing = temp_dir.path().join("c.go");

        let results = AstParser::parse_files(&[file1.clone(), file2, missing]);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
        assert_eq!(results[0].as_ref().unwrap().path, file1);
    }

    #[test]
    fn test_parse_dir_groups_by_package() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(temp_dir.path(), "a.go", "package api\n");
        create_temp_file(temp_dir.path(), "b.go", "package api\n");
        create_temp_file(temp_dir.path(), "doc.go", "package api_docs\n");

        let packages = AstParser::parse_dir(temp_dir.path(), false).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "api");
        assert_eq!(packages[0].files.len(), 2);
        assert_eq!(packages[1].name, "api_docs");
    }

    #[test]
    fn test_parse_dir_without_go_files() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(temp_dir.path(), "notes.txt", "nothing here");

        let err = AstParser::parse_dir(temp_dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::NoGoFiles { .. }));
    }

    #[test]
    fn test_load_packages_skips_failures() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(temp_dir.path(), "a.go", "package api\n");

        let packages = load_packages(
            &[temp_dir.path().to_path_buf(), PathBuf::from("/nonexistent/pkg")],
            false,
        );
        assert_eq!(packages.len(), 1);
    }
}
