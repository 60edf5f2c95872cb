//! Workspace adapter implementations and shared output extraction.

pub mod local;
pub mod mock;

pub use local::LocalWorkspace;
pub use mock::MockWorkspace;

use crate::domain::ports::FilePatch;

/// Extract file blocks from agent output.
///
/// A file block is a fenced code block whose info string carries a
/// `path=` annotation, e.g. an opening fence of three backticks followed
/// by `rust path=src/lib.rs`. Content runs until the closing fence.
/// Fences without a path annotation are ordinary code samples and are
/// skipped, as is an unterminated fence and any block whose path fails
/// [`is_safe_relative_path`].
pub fn extract_file_blocks(output: &str) -> Vec<FilePatch> {
    let mut patches = Vec::new();
    let mut lines = output.lines();

    while let Some(line) = lines.next() {
        let Some(info) = line.trim_start().strip_prefix("```") else {
            continue;
        };

        let path = info
            .split_whitespace()
            .find_map(|token| token.strip_prefix("path="))
            .map(|p| p.trim_matches('"').to_string());

        // Consume the body up to the closing fence regardless, so a
        // pathless block's contents cannot open a phantom block.
        let mut content = String::new();
        let mut closed = false;
        for body_line in lines.by_ref() {
            if body_line.trim_start().starts_with("```") {
                closed = true;
                break;
            }
            content.push_str(body_line);
            content.push('\n');
        }

        if !closed {
            break;
        }

        if let Some(path) = path {
            if is_safe_relative_path(&path) {
                patches.push(FilePatch { path, content });
            }
        }
    }

    patches
}

/// Whether a path may be written into a project working area: relative,
/// no parent-directory components, nothing hidden at the top level.
pub fn is_safe_relative_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }

    let path = std::path::Path::new(path);
    if path.is_absolute() {
        return false;
    }

    for component in path.components() {
        match component {
            std::path::Component::Normal(_) => {}
            _ => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_annotated_blocks_and_skips_plain_ones() {
        let output = concat!(
            "Implemented the endpoint.\n",
            "```rust path=src/api.rs\n",
            "pub fn health() {}\n",
            "```\n",
            "For comparison:\n",
            "```rust\n",
            "fn sample() {}\n",
            "```\n",
        );

        let patches = extract_file_blocks(output);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].path, "src/api.rs");
        assert_eq!(patches[0].content, "pub fn health() {}\n");
    }

    #[test]
    fn unterminated_fence_yields_nothing() {
        let output = "```rust path=src/api.rs\npub fn health() {}\n";
        assert!(extract_file_blocks(output).is_empty());
    }

    #[test]
    fn traversal_and_absolute_paths_are_rejected() {
        assert!(!is_safe_relative_path("../outside.rs"));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("src/../../outside.rs"));
        assert!(!is_safe_relative_path(""));
        assert!(is_safe_relative_path("src/nested/module.rs"));
    }

    #[test]
    fn multiple_blocks_extract_in_document_order() {
        let output = concat!(
            "```rust path=src/a.rs\n",
            "// a\n",
            "```\n",
            "```toml path=Cargo.toml\n",
            "[package]\n",
            "```\n",
        );

        let patches = extract_file_blocks(output);
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].path, "src/a.rs");
        assert_eq!(patches[1].path, "Cargo.toml");
    }
}
