use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// File scanner for Go package directories.
///
/// A Go package is one directory, so by default only the files directly inside the root are
/// listed. With [`FileScanner::recursive`] sub-directories are walked as well. Test files
/// (`_test.go`), hidden entries and the `vendor` and `testdata` directories are always skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_from_go::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./internal/api"));
/// let result = scanner.scan();
/// println!("Found {} Go files", result.go_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    recursive: bool,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Paths of the discovered `.go` files, sorted
    pub go_files: Vec<PathBuf>,
    /// Warning messages for entries that could not be read
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            recursive: false,
        }
    }

    /// Also descend into sub-directories.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Lists the Go source files below the root.
    ///
    /// Inaccessible entries are logged and reported in [`ScanResult::warnings`]; scanning never
    /// fails as a whole. A missing root shows up as a warning and an empty file list.
    pub fn scan(&self) -> ScanResult {
        let mut go_files = Vec::new();
        let mut warnings = Vec::new();

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root_path)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                let skipped_dir =
                    e.file_type().is_dir() && (file_name == "vendor" || file_name == "testdata");
                !file_name.starts_with('.') && !file_name.starts_with('_') && !skipped_dir
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let file_name = entry.file_name().to_string_lossy();
                    if entry.file_type().is_file()
                        && file_name.ends_with(".go")
                        && !file_name.ends_with("_test.go")
                    {
                        go_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        ScanResult { go_files, warnings }
    }
}
