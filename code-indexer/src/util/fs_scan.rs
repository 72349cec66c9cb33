//! File discovery and skip rules for repository scans.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Extensions processed by the code pipeline.
pub const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "svelte", "vue", "html", "css", "scss", "sass", "sql",
];

/// Extensions processed by the documentation pipeline.
pub const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt"];

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Gemfile.lock",
    "go.sum",
    "pnpm-lock.yaml",
];

const BUILD_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".next",
    "target",
    "vendor",
    ".venv",
    "venv",
    ".git",
    ".svn",
    "staticfiles",
    "static",
];

const DOC_SKIP_NAMES: &[&str] = &[
    "changelog.md",
    "changelog.txt",
    "license.md",
    "license.txt",
    "license",
    "authors.md",
    "authors.txt",
    "contributors.md",
    "code_of_conduct.md",
    "security.md",
];

/// Whether a file should be skipped during ingestion.
///
/// Skips minified files and bundles, source maps, lock files, build
/// directories, generated code, and very large files (likely bundled).
pub fn should_skip_file(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = file_name.to_lowercase();

    if lower.ends_with(".min.js") || lower.ends_with(".min.css") {
        return true;
    }
    if ["bundle", "vendor", "chunk", "runtime"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return true;
    }
    if lower.ends_with(".map") {
        return true;
    }
    if LOCK_FILES.contains(&file_name.as_str()) {
        return true;
    }
    if BUILD_DIRS
        .iter()
        .any(|dir| path_str.contains(&format!("/{dir}/")) || path_str.starts_with(&format!("{dir}/")))
    {
        return true;
    }
    if lower.contains("generated") || lower.contains("codegen") {
        return true;
    }
    if lower.ends_with(".pb.go") || lower.ends_with(".g.dart") {
        return true;
    }

    // Very large files are almost always minified or bundled.
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() > 500_000 {
            debug!(file = %file_name, size = meta.len(), "skipping large file");
            return true;
        }
        // Long single lines in sizeable JS/CSS point at minification.
        if (lower.ends_with(".js") || lower.ends_with(".css")) && meta.len() > 50_000 {
            if let Ok(sample) = read_prefix(path, 10_000) {
                if sample.lines().take(10).any(|l| l.len() > 500) {
                    debug!(file = %file_name, "skipping minified file (long lines)");
                    return true;
                }
            }
        }
    }

    false
}

/// Additional filters specific to documentation files.
pub fn should_skip_doc(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    DOC_SKIP_NAMES.contains(&name.as_str())
}

/// Discover all code files under a repository root.
pub fn discover_code_files(root: &Path) -> Vec<PathBuf> {
    discover(root, CODE_EXTENSIONS, |p| should_skip_file(p))
}

/// Discover all documentation files under a repository root.
pub fn discover_doc_files(root: &Path) -> Vec<PathBuf> {
    discover(root, DOC_EXTENSIONS, |p| {
        should_skip_file(p) || should_skip_doc(p)
    })
}

fn discover(root: &Path, extensions: &[&str], skip: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let p = entry.path();
        let ext = p.extension().and_then(|x| x.to_str()).unwrap_or("");
        if !extensions.contains(&ext) {
            continue;
        }
        if skip(p) {
            continue;
        }
        out.push(p.to_path_buf());
    }
    out.sort();
    out
}

fn read_prefix(path: &Path, max: usize) -> std::io::Result<String> {
    use std::io::Read;
    let mut buf = vec![0u8; max];
    let mut f = std::fs::File::open(path)?;
    let n = f.read(&mut buf)?;
    buf.truncate(n);
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_minified_locks_and_build_dirs() {
        assert!(should_skip_file(Path::new("app/main.min.js")));
        assert!(should_skip_file(Path::new("package-lock.json")));
        assert!(should_skip_file(Path::new("node_modules/x/index.js")));
        assert!(should_skip_file(Path::new("src/gen/api_generated.py")));
        assert!(!should_skip_file(Path::new("src/app/models.py")));
    }

    #[test]
    fn discovers_only_supported_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi\n").unwrap();

        let code = discover_code_files(dir.path());
        assert_eq!(code.len(), 1);
        assert!(code[0].ends_with("a.py"));

        let docs = discover_doc_files(dir.path());
        assert_eq!(docs.len(), 1);
        assert!(docs[0].ends_with("README.md"));
    }

    #[test]
    fn doc_skip_names() {
        assert!(should_skip_doc(Path::new("LICENSE.md")));
        assert!(!should_skip_doc(Path::new("docs/guide.md")));
    }
}
