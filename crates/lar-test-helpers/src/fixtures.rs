//! Test fixtures - script trees and packed archives

use lar_core::Packer;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Entry script that pulls in `util` and records a global
pub fn main_requiring_util() -> &'static str {
    r#"local util = require("util")
result = util.double(21)
"#
}

pub fn util_module() -> &'static str {
    r#"local M = {}
function M.double(x)
    return x * 2
end
return M
"#
}

/// Write `files` (relative path, content) below `root`, creating directories
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

/// Script tree in a fresh temporary directory
pub fn script_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_tree(dir.path(), files);
    dir
}

/// Pack `files` into an in-memory archive
pub fn packed(files: &[(&str, &str)]) -> Vec<u8> {
    let tree = script_tree(files);
    Packer::default().pack_to_vec(tree.path()).unwrap()
}

/// Pack `files` into `<out_dir>/<name>` and return the archive path
pub fn packed_file(out_dir: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let tree = script_tree(files);
    let dst = out_dir.join(name);
    Packer::default().pack(&dst, tree.path()).unwrap();
    dst
}
